//! One wait point for all watched files.
//!
//! The multiplexer is split in two halves. [`WatchMultiplexer`] owns the
//! `notify` watcher and the watch table; it sits behind the engine lock and
//! is used by registration. [`EventStream`] is owned by the reload thread and
//! blocks in [`EventStream::wait`] on three sources at once: file events,
//! the self-wakeup channel, and the stop signal.

use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender, TrySendError, after, bounded, never, select, unbounded};
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::debouncer::Debouncer;
use super::table::{WatchHandle, WatchTable, watch_key};
use crate::error::{TweakError, TweakResult};

/// What woke [`EventStream::wait`] up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    /// These files finished changing and should be re-read.
    Changed(Vec<PathBuf>),
    /// A watch was added; pending wakeups have been drained.
    Woken,
    /// The stop signal fired or every sender is gone.
    Stopped,
}

/// Cooperative stop signal for an [`EventStream`].
///
/// Sending or dropping it makes the next (or current) `wait` return
/// [`Wake::Stopped`].
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Sender<()>,
}

impl StopSignal {
    pub fn stop(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Registration half: the OS watcher plus the path -> handle table.
pub struct WatchMultiplexer {
    watcher: RecommendedWatcher,
    table: WatchTable,
    wakeup: Sender<()>,
}

/// Waiting half, owned by the reload thread.
pub struct EventStream {
    events: Receiver<notify::Result<Event>>,
    wakeup: Receiver<()>,
    stop: Receiver<()>,
    debouncer: Debouncer,
}

impl WatchMultiplexer {
    /// Open the notification facility and the wakeup and stop channels.
    pub fn open(debounce_ms: u64) -> TweakResult<(WatchMultiplexer, EventStream, StopSignal)> {
        let (event_tx, event_rx) = unbounded();
        // A single slot is enough: one pending wakeup already forces a re-wait.
        let (wakeup_tx, wakeup_rx) = bounded(1);
        let (stop_tx, stop_rx) = bounded(1);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })?;

        let mux = WatchMultiplexer {
            watcher,
            table: WatchTable::new(),
            wakeup: wakeup_tx,
        };
        let stream = EventStream {
            events: event_rx,
            wakeup: wakeup_rx,
            stop: stop_rx,
            debouncer: Debouncer::new(debounce_ms),
        };

        Ok((mux, stream, StopSignal { tx: stop_tx }))
    }

    /// Start watching `path`, reusing the existing watch for known files.
    ///
    /// Interrupts a concurrent [`EventStream::wait`] so the new file is
    /// part of the next wait cycle.
    pub fn add_watch(&mut self, path: &Path) -> TweakResult<WatchHandle> {
        let key = watch_key(path)?;
        if let Some(handle) = self.table.handle_for(&key) {
            return Ok(handle);
        }

        if let Some(dir) = key.parent().filter(|d| self.table.needs_dir(d)) {
            self.watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| TweakError::PathWatchFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            crate::debug_event!("watcher", "watching", "{}", dir.display());
        }

        let handle = self.table.insert(key);
        self.wake();
        Ok(handle)
    }

    /// Handle for a path as reported by a change event.
    pub fn resolve(&self, path: &Path) -> Option<WatchHandle> {
        self.table.handle_for(path)
    }

    pub fn path_of(&self, handle: WatchHandle) -> Option<&Path> {
        self.table.path_for(handle)
    }

    pub fn file_count(&self) -> usize {
        self.table.file_count()
    }

    pub fn dir_count(&self) -> usize {
        self.table.dir_count()
    }

    fn wake(&self) {
        match self.wakeup.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                crate::debug_event!("watcher", "wakeup dropped", "reload thread gone");
            }
        }
    }
}

impl EventStream {
    /// Block until files changed, a wakeup arrived, or the stream stopped.
    ///
    /// Change events are debounced per path: a burst of events on one file
    /// produces a single entry in [`Wake::Changed`] once it has settled.
    pub fn wait(&mut self) -> Wake {
        loop {
            let settle = match self.debouncer.next_ready_in() {
                Some(delay) => after(delay),
                None => never(),
            };

            let event = select! {
                recv(self.stop) -> _ => return Wake::Stopped,
                recv(self.wakeup) -> msg => {
                    if msg.is_err() {
                        return Wake::Stopped;
                    }
                    while self.wakeup.try_recv().is_ok() {}
                    return Wake::Woken;
                }
                recv(self.events) -> msg => match msg {
                    Ok(Ok(event)) => Some(event),
                    Ok(Err(e)) => {
                        tracing::warn!("[watcher] file watch error: {e}");
                        None
                    }
                    Err(_) => return Wake::Stopped,
                },
                recv(settle) -> _ => None,
            };

            if let Some(event) = event {
                self.record(event);
            }

            let ready = self.debouncer.take_ready();
            if !ready.is_empty() {
                return Wake::Changed(ready);
            }
        }
    }

    fn record(&mut self, event: Event) {
        if !is_write_complete(&event.kind) {
            return;
        }
        for path in event.paths {
            self.debouncer.record(path);
        }
    }
}

/// Event kinds after which a file's content may be read back.
fn is_write_complete(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
    )
}
