//! Error types for scene cache operations.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scene cache operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File already exists and the open mode forbids replacing it
    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid scene cache file: expected SccIO magic bytes")]
    InvalidMagic,

    /// Unsupported container version
    #[error("Unsupported scene cache version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// Child location not found
    #[error("Child '{name}' not found under {parent}")]
    ChildNotFound { parent: String, name: String },

    /// Location not found by path
    #[error("Scene location not found: {0}")]
    SceneNotFound(String),

    /// Attribute not found by name
    #[error("Attribute '{name}' not found at {path}")]
    AttributeNotFound { path: String, name: String },

    /// Location has no object
    #[error("No object stored at {0}")]
    ObjectNotFound(String),

    /// Named entry missing from the indexed container
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Scene opened for reading only
    #[error("Scene is read-only")]
    ReadOnly,

    /// Operation only available when reading
    #[error("Function not supported when writing a scene file: {0}")]
    WriteOnly(&'static str),

    /// Samples written out of time order
    #[error("Times must be incremental amongst calls to write {channel}: {time} follows {previous}")]
    NonMonotonicTime {
        channel: String,
        previous: f64,
        time: f64,
    },

    /// Child created twice under the same parent
    #[error("Child already exists: {0}")]
    DuplicateChild(String),

    /// Object type changed between samples of one location
    #[error("Object type changed at {path}: expected {expected}, got {actual}")]
    ObjectTypeChanged {
        path: String,
        expected: String,
        actual: String,
    },

    /// Scene was already written to disk
    #[error("This scene has already been flushed to disk")]
    Flushed,

    /// Any other API misuse
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Linked file could not be resolved
    #[error("Cannot resolve link to '{file}': {reason}")]
    LinkResolution { file: String, reason: String },

    /// Type mismatch when reading data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create an invalid usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::InvalidUsage(msg.into())
    }

    /// Create a type mismatch error.
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True for lookups of entities that do not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_)
                | Self::ChildNotFound { .. }
                | Self::SceneNotFound(_)
                | Self::AttributeNotFound { .. }
                | Self::ObjectNotFound(_)
                | Self::EntryNotFound(_)
        )
    }

    /// True for programming errors of the caller.
    pub fn is_invalid_usage(&self) -> bool {
        matches!(
            self,
            Self::ReadOnly
                | Self::WriteOnly(_)
                | Self::NonMonotonicTime { .. }
                | Self::DuplicateChild(_)
                | Self::ObjectTypeChanged { .. }
                | Self::Flushed
                | Self::InvalidUsage(_)
                | Self::FileExists(_)
        )
    }
}

/// Result type alias for scene cache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::NonMonotonicTime {
            channel: "transform".into(),
            previous: 2.0,
            time: 1.0,
        };
        assert!(e.to_string().contains("transform"));
        assert!(e.to_string().contains('2'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_taxonomy() {
        let missing = Error::AttributeNotFound {
            path: "/a".into(),
            name: "user:x".into(),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_invalid_usage());

        assert!(Error::DuplicateChild("a".into()).is_invalid_usage());
        assert!(!Error::mismatch("MeshPrimitive", "IntVectorData").is_not_found());
    }
}
