//! File change multiplexing for the reload engine.
//!
//! # Architecture
//!
//! ```text
//! register()                         reload thread
//!     |                                   |
//! WatchMultiplexer  --- wakeup --->  EventStream::wait()
//!   - notify::RecommendedWatcher        - notify events
//!   - WatchTable (file -> handle)       - wakeup channel
//!                                       - stop signal
//!                                       - Debouncer
//! ```

mod debouncer;
mod multiplexer;
mod table;

pub use debouncer::Debouncer;
pub use multiplexer::{EventStream, StopSignal, Wake, WatchMultiplexer};
pub use table::{WatchHandle, WatchTable, watch_key};
