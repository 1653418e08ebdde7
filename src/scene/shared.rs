//! Cache of read-only scene handles keyed by absolute file name.
//!
//! The cache never notices files changing on disk; callers that rewrite a
//! file must [`SharedSceneInterfaces::erase`] or
//! [`SharedSceneInterfaces::clear`] it themselves.

use std::collections::{HashMap, VecDeque};
use std::path::{Path as FsPath, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::core::{OpenMode, SceneRef};
use crate::util::Result;

use super::SceneFormatRegistry;

/// Capacity used by [`SharedSceneInterfaces::new`].
pub const DEFAULT_MAX_SCENES: usize = 200;

#[derive(Default)]
struct SceneTable {
    scenes: HashMap<PathBuf, SceneRef>,
    /// Insertion order, oldest first.
    order: VecDeque<PathBuf>,
}

/// Shared read handles, opened through a [`SceneFormatRegistry`] on first
/// use. Oldest entries are evicted beyond `max_scenes`.
pub struct SharedSceneInterfaces {
    registry: SceneFormatRegistry,
    max_scenes: usize,
    table: Mutex<SceneTable>,
}

fn absolute(path: &FsPath) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl SharedSceneInterfaces {
    pub fn new() -> Self {
        Self::with_registry(SceneFormatRegistry::default(), DEFAULT_MAX_SCENES)
    }

    pub fn with_registry(registry: SceneFormatRegistry, max_scenes: usize) -> Self {
        Self {
            registry,
            max_scenes: max_scenes.max(1),
            table: Mutex::new(SceneTable::default()),
        }
    }

    /// Shared handle to the root of `path`, opened for reading.
    pub fn get(&self, path: impl AsRef<FsPath>) -> Result<SceneRef> {
        let key = absolute(path.as_ref());
        if let Some(scene) = self.table.lock().scenes.get(&key) {
            return Ok(scene.clone());
        }

        // Open without holding the lock; a racing open of the same file
        // keeps whichever handle was inserted first.
        let scene = self.registry.create_scene(&key, OpenMode::Read)?;

        let mut table = self.table.lock();
        if let Some(existing) = table.scenes.get(&key) {
            return Ok(existing.clone());
        }
        while table.scenes.len() >= self.max_scenes {
            let Some(oldest) = table.order.pop_front() else {
                break;
            };
            table.scenes.remove(&oldest);
            debug!(file = %oldest.display(), "evicted shared scene");
        }
        table.order.push_back(key.clone());
        table.scenes.insert(key, scene.clone());
        Ok(scene)
    }

    /// Drop every cached handle.
    pub fn clear(&self) {
        let mut table = self.table.lock();
        table.scenes.clear();
        table.order.clear();
    }

    /// Drop the handle of one file. Returns true if it was cached.
    pub fn erase(&self, path: impl AsRef<FsPath>) -> bool {
        let key = absolute(path.as_ref());
        let mut table = self.table.lock();
        table.order.retain(|p| p != &key);
        table.scenes.remove(&key).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.lock().scenes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn max_scenes(&self) -> usize {
        self.max_scenes
    }

    pub fn registry(&self) -> &SceneFormatRegistry {
        &self.registry
    }
}

impl Default for SharedSceneInterfaces {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SceneInterface;
    use crate::scene::SceneCache;
    use std::sync::Arc;

    fn write_empty(path: &FsPath) {
        SceneCache::open(path, OpenMode::Write).unwrap().flush().unwrap();
    }

    #[test]
    fn test_get_caches_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.scc");
        write_empty(&path);

        let shared = SharedSceneInterfaces::new();
        let a = shared.get(&path).unwrap();
        let b = shared.get(dir.path().join(".").join("a.scc")).unwrap();
        assert_eq!(shared.len(), 1);
        assert!(Arc::ptr_eq(&a, &shared.get(&path).unwrap()));
        assert_eq!(a.file_name(), b.file_name());

        assert!(shared.erase(&path));
        assert!(!shared.erase(&path));
        assert!(shared.is_empty());
    }

    #[test]
    fn test_eviction_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedSceneInterfaces::with_registry(SceneFormatRegistry::default(), 2);
        for name in ["a.scc", "b.scc", "c.scc"] {
            let path = dir.path().join(name);
            write_empty(&path);
            shared.get(&path).unwrap();
        }
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.max_scenes(), 2);
        // Oldest went first.
        assert!(!shared.erase(dir.path().join("a.scc")));
        shared.clear();
        assert!(shared.is_empty());
    }

    #[test]
    fn test_missing_file_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedSceneInterfaces::new();
        assert!(shared.get(dir.path().join("missing.scc")).is_err());
        assert!(shared.is_empty());
    }
}
