//! Reload engine: registration, the background reload thread, and reads.
//!
//! A [`Tweaks`] context owns everything. Shared state (registry plus the
//! registration half of the watch multiplexer) is created on first
//! registration and lives behind a single `parking_lot::Mutex`. The reload
//! thread blocks in [`EventStream::wait`] without holding the lock and takes
//! the lock once per entry to store a new value. Readers take the same lock
//! just long enough to copy a value out.
//!
//! Reloading a file (read, extract, store) is serialized by a second lock,
//! the reload gate, shared by the reload thread and manual reloads. Whoever
//! reads a file last also stores last, so a slow reload of older content can
//! never overwrite a newer value.
//!
//! ```text
//! register() --lock--> Registry + WatchMultiplexer --wakeup--+
//!                                                           v
//! int()/float()/string() --lock--> copy      reload thread: wait() -> read file
//!                                                           -> extract -> lock -> store
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::config::Settings;
use crate::error::{ReloadError, TweakError, TweakResult};
use crate::extract::{Extractor, MarkerScanner, read_source};
use crate::registry::{Registry, TweakId, TweakInfo};
use crate::value::{TweakType, TweakValue, parse_literal};
use crate::watcher::{EventStream, StopSignal, Wake, WatchMultiplexer, watch_key};

/// State guarded by the engine lock.
struct Shared {
    registry: Registry,
    mux: WatchMultiplexer,
}

/// Held for the whole read -> extract -> store of one file.
type ReloadGate = Arc<Mutex<()>>;

type StartFn = fn(&Settings, Arc<dyn Extractor>) -> TweakResult<Engine>;

const RELOAD_THREAD: &str = "tweakwatch-reload";

/// Lazily started part of a [`Tweaks`] context.
struct Engine {
    shared: Arc<Mutex<Shared>>,
    gate: ReloadGate,
    stop: StopSignal,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// A set of hot-reloadable tweak variables.
///
/// Nothing is started until the first [`register`](Tweaks::register) call.
/// If that start fails, the failure is remembered and every later
/// registration reports it too.
pub struct Tweaks {
    settings: Settings,
    extractor: Arc<dyn Extractor>,
    engine: OnceLock<Result<Engine, TweakError>>,
    closed: AtomicBool,
    start: StartFn,
}

impl Tweaks {
    /// Context using the marker and limits from `settings`.
    pub fn new(settings: Settings) -> Self {
        let scanner = MarkerScanner::new(settings.marker.clone());
        Self::with_extractor(settings, scanner)
    }

    /// Context with default settings.
    pub fn with_defaults() -> Self {
        Self::new(Settings::default())
    }

    /// Context using a custom literal extractor.
    pub fn with_extractor(settings: Settings, extractor: impl Extractor + 'static) -> Self {
        Self {
            settings,
            extractor: Arc::new(extractor),
            engine: OnceLock::new(),
            closed: AtomicBool::new(false),
            start: Engine::start,
        }
    }

    /// Register a tweak declared in `file` and seed its value from disk.
    ///
    /// Every call allocates a new id, even for a (name, file) pair seen
    /// before. Registering a known pair with a different type fails with
    /// [`TweakError::TypeConflict`].
    pub fn register(
        &self,
        name: &str,
        file: impl AsRef<Path>,
        ty: TweakType,
    ) -> TweakResult<TweakId> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TweakError::ShutDown);
        }
        let engine = self.engine()?;
        let file = file.as_ref();

        let mut shared = engine.shared.lock();
        shared.registry.ensure_room()?;

        let watch = shared.mux.add_watch(file)?;
        let key = shared
            .mux
            .path_of(watch)
            .map(Path::to_path_buf)
            .ok_or_else(|| TweakError::PathWatchFailed {
                path: file.to_path_buf(),
                reason: "watch handle has no path".to_string(),
            })?;

        let id = shared.registry.insert(name, &key, ty, watch)?;

        let seeded =
            read_source(&key).and_then(|text| refresh(self.extractor.as_ref(), &text, name, ty));
        match seeded {
            Ok(value) => {
                shared.registry.store(id, value);
            }
            Err(e) => tracing::warn!("[engine] no initial value for '{name}': {e}"),
        }

        crate::debug_event!(
            "engine",
            "registered",
            "{id} {name}: {ty} in {} ({} files, {} dirs watched)",
            key.display(),
            shared.mux.file_count(),
            shared.mux.dir_count()
        );
        Ok(id)
    }

    /// Current value of an entry.
    pub fn value(&self, id: TweakId) -> Option<TweakValue> {
        self.with_registry(|r| r.get(id).map(|e| e.value.clone()))
            .flatten()
    }

    /// Current value of an `Int` tweak. `None` for unknown ids or other types.
    pub fn int(&self, id: TweakId) -> Option<i64> {
        self.with_registry(|r| r.get(id).and_then(|e| e.value.as_int()))
            .flatten()
    }

    /// Current value of a `Float` tweak. `None` for unknown ids or other types.
    pub fn float(&self, id: TweakId) -> Option<f64> {
        self.with_registry(|r| r.get(id).and_then(|e| e.value.as_float()))
            .flatten()
    }

    /// Current value of a `String` tweak. `None` for unknown ids or other types.
    pub fn string(&self, id: TweakId) -> Option<String> {
        self.with_registry(|r| {
            r.get(id)
                .and_then(|e| e.value.as_str().map(str::to_string))
        })
        .flatten()
    }

    /// Number of successful value changes since registration.
    pub fn generation(&self, id: TweakId) -> Option<u64> {
        self.with_registry(|r| r.get(id).map(|e| e.generation))
            .flatten()
    }

    /// Snapshot of one entry.
    pub fn entry(&self, id: TweakId) -> Option<TweakInfo> {
        self.with_registry(|r| r.get(id).map(TweakInfo::from))
            .flatten()
    }

    /// Snapshot of every entry in registration order.
    pub fn entries(&self) -> Vec<TweakInfo> {
        self.with_registry(|r| r.iter().map(TweakInfo::from).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.with_registry(Registry::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-read one file now and update every tweak declared in it.
    ///
    /// Returns how many values changed. Failures keep the previous values.
    pub fn reload_file(&self, file: impl AsRef<Path>) -> usize {
        let Some(engine) = self.running() else {
            return 0;
        };
        match watch_key(file.as_ref()) {
            Ok(key) => engine.reload(self.extractor.as_ref(), &key),
            Err(e) => {
                tracing::warn!("[engine] cannot reload {}: {e}", file.as_ref().display());
                0
            }
        }
    }

    /// Re-read every watched file now. Returns how many values changed.
    pub fn reload_all(&self) -> usize {
        let Some(engine) = self.running() else {
            return 0;
        };
        let files = engine.shared.lock().registry.files();
        files
            .iter()
            .map(|file| engine.reload(self.extractor.as_ref(), file))
            .sum()
    }

    /// Stop the reload thread and wait for it to exit.
    ///
    /// Values stay readable; further registrations fail with
    /// [`TweakError::ShutDown`]. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(engine) = self.running() {
            engine.stop();
        }
    }

    /// Whether the reload thread is still running.
    pub fn is_running(&self) -> bool {
        self.running()
            .is_some_and(|engine| engine.thread.lock().as_ref().is_some_and(|t| !t.is_finished()))
    }

    fn engine(&self) -> TweakResult<&Engine> {
        self.engine
            .get_or_init(|| (self.start)(&self.settings, Arc::clone(&self.extractor)))
            .as_ref()
            .map_err(Clone::clone)
    }

    fn running(&self) -> Option<&Engine> {
        self.engine.get().and_then(|r| r.as_ref().ok())
    }

    fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> Option<R> {
        let engine = self.running()?;
        let shared = engine.shared.lock();
        Some(f(&shared.registry))
    }
}

impl Default for Tweaks {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Engine {
    fn start(settings: &Settings, extractor: Arc<dyn Extractor>) -> TweakResult<Engine> {
        let (mux, stream, stop) = WatchMultiplexer::open(settings.debounce_ms)?;

        let shared = Arc::new(Mutex::new(Shared {
            registry: Registry::new(settings.capacity),
            mux,
        }));

        let gate = ReloadGate::default();

        let thread_shared = Arc::clone(&shared);
        let thread_gate = Arc::clone(&gate);
        let thread = thread::Builder::new()
            .name(RELOAD_THREAD.to_string())
            .spawn(move || reload_loop(stream, thread_shared, thread_gate, extractor))
            .map_err(|e| TweakError::InitFailed {
                reason: format!("cannot spawn reload thread: {e}"),
            })?;

        crate::log_event!(
            "engine",
            "started",
            "capacity {}, debounce {}ms",
            settings.capacity,
            settings.debounce_ms
        );

        Ok(Engine {
            shared,
            gate,
            stop,
            thread: Mutex::new(Some(thread)),
        })
    }

    fn reload(&self, extractor: &dyn Extractor, path: &Path) -> usize {
        reload_path(&self.shared, &self.gate, extractor, path)
    }

    fn stop(&self) {
        self.stop.stop();
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("[engine] reload thread panicked");
            } else {
                crate::log_event!("engine", "stopped");
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the reload thread. Runs until the stop signal fires.
fn reload_loop(
    mut stream: EventStream,
    shared: Arc<Mutex<Shared>>,
    gate: ReloadGate,
    extractor: Arc<dyn Extractor>,
) {
    loop {
        match stream.wait() {
            Wake::Stopped => break,
            Wake::Woken => crate::debug_event!("engine", "woken", "watch set changed"),
            Wake::Changed(paths) => {
                for path in paths {
                    reload_path(&shared, &gate, extractor.as_ref(), &path);
                }
            }
        }
    }
}

/// Re-read `path` and update every entry bound to it.
///
/// Runs entirely under the reload gate. The file is read once without
/// holding the state lock; each entry then takes the state lock only to
/// store its new value. Returns how many values changed.
fn reload_path(
    shared: &Mutex<Shared>,
    gate: &Mutex<()>,
    extractor: &dyn Extractor,
    path: &Path,
) -> usize {
    let _gate = gate.lock();

    let targets: Vec<(TweakId, String, TweakType)> = {
        let shared = shared.lock();
        let Some(watch) = shared.mux.resolve(path) else {
            return 0;
        };
        shared
            .registry
            .bound_to(watch)
            .map(|e| (e.id, e.name.clone(), e.ty))
            .collect()
    };
    if targets.is_empty() {
        return 0;
    }

    let text = match read_source(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("[engine] keeping previous values: {e}");
            return 0;
        }
    };

    let mut changed = 0;
    for (id, name, ty) in targets {
        match refresh(extractor, &text, &name, ty) {
            Ok(value) => {
                let mut shared = shared.lock();
                if shared.registry.store(id, value.clone()) {
                    changed += 1;
                    crate::log_event!("engine", "reloaded", "{name} = {value}");
                }
            }
            Err(e) => tracing::warn!("[engine] keeping previous value: {e}"),
        }
    }
    changed
}

/// Extract and parse one tweak's literal from file text.
fn refresh(
    extractor: &dyn Extractor,
    text: &str,
    name: &str,
    ty: TweakType,
) -> Result<TweakValue, ReloadError> {
    let literal = extractor
        .extract(text, name)
        .ok_or_else(|| ReloadError::ExtractionMiss {
            name: name.to_string(),
        })?;

    parse_literal(ty, literal).ok_or_else(|| ReloadError::ParseFailure {
        name: name.to_string(),
        literal: literal.to_string(),
        expected: ty,
    })
}
