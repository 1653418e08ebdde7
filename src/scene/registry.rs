//! Scene file formats by extension.

use std::path::Path as FsPath;
use std::sync::Arc;

use crate::core::{OpenMode, SceneRef};
use crate::util::{Error, Result};

use super::{LinkedScene, SceneCache};

/// Opens a scene file of one format.
pub type SceneCreator = fn(&FsPath, OpenMode) -> Result<SceneRef>;

#[derive(Clone)]
struct FormatEntry {
    /// Lowercase, without the leading dot.
    extension: String,
    readable: bool,
    writable: bool,
    creator: SceneCreator,
}

/// Maps file extensions to scene implementations.
#[derive(Clone)]
pub struct SceneFormatRegistry {
    formats: Vec<FormatEntry>,
}

fn open_scene_cache(path: &FsPath, mode: OpenMode) -> Result<SceneRef> {
    Ok(Arc::new(SceneCache::open(path, mode)?))
}

fn open_linked_scene(path: &FsPath, mode: OpenMode) -> Result<SceneRef> {
    Ok(Arc::new(LinkedScene::open(path, mode)?))
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

impl SceneFormatRegistry {
    /// Registry without any format.
    pub fn empty() -> Self {
        Self { formats: Vec::new() }
    }

    /// Register (or replace) a format.
    pub fn register(&mut self, extension: &str, readable: bool, writable: bool, creator: SceneCreator) {
        let extension = normalize_extension(extension);
        self.formats.retain(|f| f.extension != extension);
        self.formats.push(FormatEntry {
            extension,
            readable,
            writable,
            creator,
        });
    }

    fn lookup(&self, path: &FsPath, mode: OpenMode) -> Option<&FormatEntry> {
        let extension = normalize_extension(path.extension()?.to_str()?);
        self.formats.iter().find(|f| {
            f.extension == extension && if mode.is_write() { f.writable } else { f.readable }
        })
    }

    pub fn is_supported(&self, path: impl AsRef<FsPath>, mode: OpenMode) -> bool {
        self.lookup(path.as_ref(), mode).is_some()
    }

    /// Open `path` with the format registered for its extension.
    pub fn create_scene(&self, path: impl AsRef<FsPath>, mode: OpenMode) -> Result<SceneRef> {
        let path = path.as_ref();
        let format = self.lookup(path, mode).ok_or_else(|| {
            Error::usage(format!(
                "no scene format registered for '{}' in {mode:?} mode",
                path.display()
            ))
        })?;
        (format.creator)(path, mode)
    }

    /// Extensions (with the leading dot) usable in `mode`, sorted.
    pub fn supported_extensions(&self, mode: OpenMode) -> Vec<String> {
        let mut out: Vec<String> = self
            .formats
            .iter()
            .filter(|f| if mode.is_write() { f.writable } else { f.readable })
            .map(|f| format!(".{}", f.extension))
            .collect();
        out.sort();
        out
    }
}

impl Default for SceneFormatRegistry {
    /// `.scc` files open as [`SceneCache`], `.lscc` files as [`LinkedScene`].
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("scc", true, true, open_scene_cache);
        registry.register("lscc", true, true, open_linked_scene);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_formats() {
        let registry = SceneFormatRegistry::default();
        assert_eq!(registry.supported_extensions(OpenMode::Read), vec![".lscc", ".scc"]);
        assert!(registry.is_supported("a/b.SCC", OpenMode::Write));
        assert!(!registry.is_supported("a/b.abc", OpenMode::Read));
        assert!(!registry.is_supported("noext", OpenMode::Read));
    }

    #[test]
    fn test_unknown_extension() {
        let registry = SceneFormatRegistry::default();
        let err = registry.create_scene("scene.usd", OpenMode::Read).err().unwrap();
        assert!(err.is_invalid_usage());
    }

    #[test]
    fn test_register_read_only() {
        let mut registry = SceneFormatRegistry::empty();
        registry.register(".tst", true, false, open_scene_cache);
        assert_eq!(registry.supported_extensions(OpenMode::Read), vec![".tst"]);
        assert!(registry.supported_extensions(OpenMode::Write).is_empty());
    }
}
