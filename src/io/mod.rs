//! Indexed, hierarchical container files.
//!
//! - [`format`] - header layout and offset tagging
//! - [`IArchive`] / [`IDirectory`] / [`IData`] - random access reading
//! - [`OArchive`] / [`ODirectory`] - one-shot tree writing
//! - [`codec`] - value encoding inside data blocks

pub mod codec;
pub mod compression;
pub mod format;
mod reader;
mod writer;

pub use reader::{IArchive, IData, IDirectory, IStreams};
pub use writer::{OArchive, ODirectory, OEntry, OStream, DEFAULT_COMPRESSION_LEVEL};
