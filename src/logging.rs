//! Logging setup and event macros.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the host. [`init_with_config`] is what the `tweakwatch` binary uses.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! engine = "info"     # every reload (same as tweakwatch::engine)
//! watcher = "debug"   # watch registrations and wakeups
//! ```
//!
//! `RUST_LOG` replaces the configured filter entirely:
//! ```bash
//! RUST_LOG=tweakwatch=debug tweakwatch watch src/game.c --var speed:float
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Wall clock with milliseconds; reload logs are read against editor saves.
struct WallClock;

impl FormatTime for WallClock {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Install a stderr subscriber built from `config`, unless `RUST_LOG` is set.
///
/// Only the first call does anything. If the host already installed a
/// subscriber, that one is kept.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) => EnvFilter::new(directives(config)),
        };

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(WallClock)
            .with_filter(filter);

        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
}

/// Filter directives for `config`. Bare module names such as `engine` are
/// scoped to this crate; anything containing `::` (or the crate name
/// itself) is taken as a full target.
fn directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut out = config.default.clone();
    for (module, level) in modules {
        let target = if module == env!("CARGO_CRATE_NAME") || module.contains("::") {
            module.clone()
        } else {
            format!("{}::{module}", env!("CARGO_CRATE_NAME"))
        };
        out.push_str(&format!(",{target}={level}"));
    }
    out
}

/// Info-level event tagged with the emitting component.
///
/// ```ignore
/// log_event!("engine", "reloaded", "{name} = {value}");
/// log_event!("engine", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!(component = $component, "{}", $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, "{}: {}", $event, format_args!($($arg)*))
    };
}

/// Debug-level counterpart of [`log_event!`].
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!(component = $component, "{}", $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, "{}: {}", $event, format_args!($($arg)*))
    };
}
