//! Fixed-capacity table of tweak entries.
//!
//! Ids are indices assigned in registration order and never reused. Every
//! entry is bound to the watch handle of its file, so one change event can
//! be fanned out to all tweaks declared in that file.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{TweakError, TweakResult};
use crate::value::{TweakType, TweakValue};
use crate::watcher::WatchHandle;

/// Default number of entries a registry can hold.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Stable identifier of a registered tweak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TweakId(u32);

impl TweakId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TweakId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One registered tweak variable.
#[derive(Debug, Clone)]
pub struct TweakEntry {
    pub id: TweakId,
    pub name: String,
    pub file: PathBuf,
    pub ty: TweakType,
    pub value: TweakValue,
    pub watch: WatchHandle,
    /// Bumped every time a reload stores a different value.
    pub generation: u64,
}

/// Read-only snapshot of an entry, handed out to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweakInfo {
    pub id: TweakId,
    pub name: String,
    pub file: PathBuf,
    pub ty: TweakType,
    pub value: TweakValue,
    pub generation: u64,
}

impl From<&TweakEntry> for TweakInfo {
    fn from(entry: &TweakEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            file: entry.file.clone(),
            ty: entry.ty,
            value: entry.value.clone(),
            generation: entry.generation,
        }
    }
}

#[derive(Debug)]
pub struct Registry {
    entries: Vec<TweakEntry>,
    capacity: usize,
    /// Watch handle -> entries reading from that file.
    bindings: HashMap<WatchHandle, Vec<TweakId>>,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            bindings: HashMap::new(),
        }
    }

    /// Fails once the table is full.
    pub fn ensure_room(&self) -> TweakResult<()> {
        if self.entries.len() >= self.capacity {
            return Err(TweakError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Add an entry holding the zero value of `ty`.
    ///
    /// Re-registering a known (name, file) pair with the same type allocates
    /// a new id; with a different type it is rejected.
    pub fn insert(
        &mut self,
        name: &str,
        file: &Path,
        ty: TweakType,
        watch: WatchHandle,
    ) -> TweakResult<TweakId> {
        self.ensure_room()?;

        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.name == name && e.file == file && e.ty != ty)
        {
            return Err(TweakError::TypeConflict {
                name: name.to_string(),
                file: file.to_path_buf(),
                existing: existing.ty,
                requested: ty,
            });
        }

        let id = TweakId(self.entries.len() as u32);
        self.entries.push(TweakEntry {
            id,
            name: name.to_string(),
            file: file.to_path_buf(),
            ty,
            value: ty.zero(),
            watch,
            generation: 0,
        });
        self.bindings.entry(watch).or_default().push(id);
        Ok(id)
    }

    pub fn get(&self, id: TweakId) -> Option<&TweakEntry> {
        self.entries.get(id.index())
    }

    /// Entries bound to a watched file, in registration order.
    pub fn bound_to(&self, watch: WatchHandle) -> impl Iterator<Item = &TweakEntry> {
        self.bindings
            .get(&watch)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get(*id))
    }

    /// Store a freshly parsed value. Returns `true` if the value changed.
    ///
    /// Values of the wrong type are ignored so an entry's type never drifts.
    pub fn store(&mut self, id: TweakId, value: TweakValue) -> bool {
        let Some(entry) = self.entries.get_mut(id.index()) else {
            return false;
        };
        if entry.ty != value.kind() {
            tracing::warn!(
                "[registry] refusing {} value for {} tweak '{}'",
                value.kind(),
                entry.ty,
                entry.name
            );
            return false;
        }
        if entry.value.same_as(&value) {
            return false;
        }
        entry.value = value;
        entry.generation += 1;
        true
    }

    /// Distinct watched files, one per handle.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut handles: Vec<_> = self.bindings.keys().copied().collect();
        handles.sort();
        handles
            .into_iter()
            .filter_map(|h| self.bound_to(h).next().map(|e| e.file.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TweakEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::WatchTable;

    fn handles(n: usize) -> Vec<WatchHandle> {
        let mut table = WatchTable::new();
        (0..n)
            .map(|i| table.insert(PathBuf::from(format!("/src/file{i}.c"))))
            .collect()
    }

    #[test]
    fn test_ids_follow_registration_order() {
        let w = handles(1)[0];
        let mut registry = Registry::new(8);

        let a = registry.insert("a", Path::new("/src/file0.c"), TweakType::Int, w).unwrap();
        let b = registry.insert("b", Path::new("/src/file0.c"), TweakType::Float, w).unwrap();

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap().value, TweakValue::Int(0));
        assert_eq!(registry.get(b).unwrap().value, TweakValue::Float(0.0));
    }

    #[test]
    fn test_capacity_exceeded_is_explicit() {
        let w = handles(1)[0];
        let mut registry = Registry::new(2);
        let file = Path::new("/src/file0.c");

        registry.insert("a", file, TweakType::Int, w).unwrap();
        registry.insert("b", file, TweakType::Int, w).unwrap();
        let err = registry.insert("c", file, TweakType::Int, w).unwrap_err();

        assert_eq!(err, TweakError::CapacityExceeded { capacity: 2 });
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_same_type_reregistration_allocates_new_id() {
        let w = handles(1)[0];
        let mut registry = Registry::new(8);
        let file = Path::new("/src/file0.c");

        let first = registry.insert("x", file, TweakType::Int, w).unwrap();
        let second = registry.insert("x", file, TweakType::Int, w).unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.bound_to(w).count(), 2);
    }

    #[test]
    fn test_type_conflict_rejected() {
        let w = handles(1)[0];
        let mut registry = Registry::new(8);
        let file = Path::new("/src/file0.c");

        registry.insert("x", file, TweakType::Int, w).unwrap();
        let err = registry.insert("x", file, TweakType::String, w).unwrap_err();

        assert!(matches!(
            err,
            TweakError::TypeConflict {
                existing: TweakType::Int,
                requested: TweakType::String,
                ..
            }
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_name_other_file_is_independent() {
        let hs = handles(2);
        let mut registry = Registry::new(8);

        registry.insert("x", Path::new("/src/file0.c"), TweakType::Int, hs[0]).unwrap();
        registry.insert("x", Path::new("/src/file1.c"), TweakType::Float, hs[1]).unwrap();

        assert_eq!(registry.files().len(), 2);
        assert_eq!(registry.bound_to(hs[0]).count(), 1);
        assert_eq!(registry.bound_to(hs[1]).count(), 1);
    }

    #[test]
    fn test_store_tracks_generation() {
        let w = handles(1)[0];
        let mut registry = Registry::new(8);
        let id = registry.insert("x", Path::new("/src/file0.c"), TweakType::Int, w).unwrap();

        assert!(registry.store(id, TweakValue::Int(42)));
        assert!(!registry.store(id, TweakValue::Int(42)));
        assert!(!registry.store(id, TweakValue::Float(1.0)));

        let entry = registry.get(id).unwrap();
        assert_eq!(entry.value, TweakValue::Int(42));
        assert_eq!(entry.generation, 1);
    }
}
