//! Burst coalescing for file change events.
//!
//! Editors often touch a file several times per save (truncate, write,
//! close, rename). Each path is only handed out once it has been quiet for
//! the configured duration, so the reload reads the settled content.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Debounces file change events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> last change timestamp.
    pending: HashMap<PathBuf, Instant>,
    /// How long a file must be stable before processing.
    duration: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given duration in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record a change. Resets the timer for this path.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    /// Take all paths that have been stable for the debounce duration.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, last_change| {
            if now.duration_since(*last_change) >= self.duration {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        ready.sort();
        ready
    }

    /// Time until the oldest pending path becomes ready, if any are pending.
    pub fn next_ready_in(&self) -> Option<Duration> {
        let now = Instant::now();
        self.pending
            .values()
            .map(|last| (*last + self.duration).saturating_duration_since(now))
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_debouncer_basic() {
        let mut debouncer = Debouncer::new(50);

        let path = PathBuf::from("/test/tweaks.c");
        debouncer.record(path.clone());

        assert!(debouncer.take_ready().is_empty());
        assert!(debouncer.next_ready_in().is_some());

        sleep(Duration::from_millis(60));

        let ready = debouncer.take_ready();
        assert_eq!(ready, vec![path]);
        assert_eq!(debouncer.next_ready_in(), None);
    }

    #[test]
    fn test_burst_collapses_to_one() {
        let mut debouncer = Debouncer::new(40);
        let path = PathBuf::from("/test/tweaks.c");

        for _ in 0..5 {
            debouncer.record(path.clone());
            sleep(Duration::from_millis(5));
        }

        sleep(Duration::from_millis(50));
        assert_eq!(debouncer.take_ready().len(), 1);
        assert!(debouncer.take_ready().is_empty());
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let mut debouncer = Debouncer::new(0);
        debouncer.record(PathBuf::from("/a"));
        debouncer.record(PathBuf::from("/b"));

        assert_eq!(debouncer.next_ready_in(), Some(Duration::ZERO));
        assert_eq!(
            debouncer.take_ready(),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_next_ready_in() {
        let mut debouncer = Debouncer::new(1_000);
        assert_eq!(debouncer.next_ready_in(), None);

        debouncer.record(PathBuf::from("/a"));
        let wait = debouncer.next_ready_in().unwrap();
        assert!(wait > Duration::from_millis(900));
        assert!(wait <= Duration::from_millis(1_000));
    }
}
