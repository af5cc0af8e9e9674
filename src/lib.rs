//! Hot-reloadable tweak variables read straight from source literals.
//!
//! A program declares tweakable constants in its source, for example
//!
//! ```text
//! TWEAK(float, gravity) = 9.81;
//! ```
//!
//! registers them with a [`Tweaks`] context, and reads them through typed
//! accessors. Whenever the file is saved, a background thread re-reads the
//! literal and the next read returns the new value, no restart needed.
//!
//! ```no_run
//! use tweakwatch::{TweakType, Tweaks};
//!
//! # fn main() -> Result<(), tweakwatch::TweakError> {
//! let tweaks = Tweaks::with_defaults();
//! let gravity = tweaks.register("gravity", "src/physics.c", TweakType::Float)?;
//!
//! let g = tweaks.float(gravity).unwrap_or(9.81);
//! # let _ = g;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod logging;
pub mod registry;
pub mod value;
pub mod watcher;

pub use config::Settings;
pub use engine::Tweaks;
pub use error::{ReloadError, TweakError, TweakResult};
pub use extract::{Extractor, MarkerScanner};
pub use registry::{TweakId, TweakInfo};
pub use value::{TweakType, TweakValue};
