//! Watch table: one handle per watched file, one OS watch per directory.
//!
//! Files are watched through their parent directory so that editors which
//! save by writing a temporary file and renaming it over the original keep
//! being observed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{TweakError, TweakResult};

/// Opaque identifier for a watched file. Shared by every tweak in that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(u32);

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Maps watched files to handles and tracks which directories are watched.
#[derive(Debug, Default)]
pub struct WatchTable {
    files: HashMap<PathBuf, WatchHandle>,
    paths: Vec<PathBuf>,
    dirs: HashSet<PathBuf>,
}

impl WatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for an already watched file.
    pub fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.files.get(path).copied()
    }

    /// File a handle refers to.
    pub fn path_for(&self, handle: WatchHandle) -> Option<&Path> {
        self.paths.get(handle.0 as usize).map(PathBuf::as_path)
    }

    /// Whether `dir` still needs an OS-level watch.
    pub fn needs_dir(&self, dir: &Path) -> bool {
        !self.dirs.contains(dir)
    }

    /// Record a file. Idempotent: the same path always gets the same handle.
    pub fn insert(&mut self, path: PathBuf) -> WatchHandle {
        if let Some(handle) = self.files.get(&path) {
            return *handle;
        }

        if let Some(parent) = path.parent() {
            self.dirs.insert(parent.to_path_buf());
        }

        let handle = WatchHandle(self.paths.len() as u32);
        self.paths.push(path.clone());
        self.files.insert(path, handle);
        handle
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }
}

/// Normalize a file path into the form change events will report.
///
/// The parent directory is canonicalized and the file name re-attached, so
/// the key exists even while the file itself is briefly missing during a
/// rename-based save.
pub fn watch_key(path: &Path) -> TweakResult<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| TweakError::PathWatchFailed {
        path: path.to_path_buf(),
        reason: "path has no file name".to_string(),
    })?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let dir = std::fs::canonicalize(parent).map_err(|e| TweakError::PathWatchFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(dir.join(file_name))
}
