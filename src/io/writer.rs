//! Container writer.
//!
//! The whole tree is assembled in memory as an [`ODirectory`] and serialized
//! in one pass: children before the directory that references them, header
//! patched last.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::compression::compress;
use super::format::*;
use crate::util::{Error, Result};

/// Output stream with position tracking.
pub struct OStream {
    writer: BufWriter<File>,
    pos: u64,
}

impl OStream {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::from_file(file))
    }

    /// Create the file at `path`, failing when it already exists.
    pub fn create_new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::FileExists(path.to_path_buf())
                } else {
                    Error::Io(e)
                }
            })?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: File) -> Self {
        Self {
            writer: BufWriter::with_capacity(2 * 1024 * 1024, file),
            pos: 0,
        }
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.writer.write_u16::<LittleEndian>(value)?;
        self.pos += 2;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    /// Seek to a position and return it.
    pub fn seek(&mut self, pos: u64) -> Result<u64> {
        self.writer.flush()?;
        let new_pos = self.writer.seek(SeekFrom::Start(pos))?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    /// Flush the buffer and sync the file to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Entry of an in-memory directory.
#[derive(Debug, Clone)]
pub enum OEntry {
    Directory(ODirectory),
    Data(Vec<u8>),
}

/// In-memory directory awaiting serialization.
#[derive(Debug, Clone, Default)]
pub struct ODirectory {
    entries: BTreeMap<String, OEntry>,
}

impl ODirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Get or create a sub-directory. An existing data entry of the same
    /// name is replaced.
    pub fn directory_mut(&mut self, name: &str) -> &mut ODirectory {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| OEntry::Directory(ODirectory::new()));
        if let OEntry::Data(_) = entry {
            *entry = OEntry::Directory(ODirectory::new());
        }
        match entry {
            OEntry::Directory(dir) => dir,
            OEntry::Data(_) => unreachable!("entry was just replaced by a directory"),
        }
    }

    /// Insert a finished sub-directory.
    pub fn insert_directory(&mut self, name: &str, dir: ODirectory) {
        self.entries.insert(name.to_string(), OEntry::Directory(dir));
    }

    /// Store a data block.
    pub fn put(&mut self, name: &str, data: Vec<u8>) {
        self.entries.insert(name.to_string(), OEntry::Data(data));
    }

    pub fn get(&self, name: &str) -> Option<&OEntry> {
        self.entries.get(name)
    }
}

/// Compression used unless configured otherwise.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Serializes an [`ODirectory`] tree into a container file.
pub struct OArchive {
    stream: OStream,
    compression_level: u32,
}

impl OArchive {
    /// Create (or truncate) the file and reserve the header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_stream(OStream::create(path)?)
    }

    /// Like [`OArchive::create`] but fails with `FileExists`.
    pub fn create_new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_stream(OStream::create_new(path)?)
    }

    fn with_stream(mut stream: OStream) -> Result<Self> {
        stream.write_bytes(SCC_MAGIC)?;
        stream.write_u8(NOT_FROZEN_FLAG)?;
        stream.write_u16(CURRENT_VERSION)?;
        stream.write_u64(0)?;
        Ok(Self {
            stream,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        })
    }

    /// Zlib level 0-9 for data blocks; 0 stores everything raw.
    pub fn set_compression_level(&mut self, level: u32) {
        self.compression_level = level.min(9);
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Write the tree, patch the root position and freeze the header.
    pub fn finish(mut self, root: &ODirectory) -> Result<()> {
        let root_pos = self.write_directory(root)?;

        self.stream.seek(FROZEN_OFFSET as u64)?;
        self.stream.write_u8(FROZEN_FLAG)?;
        self.stream.seek(ROOT_POS_OFFSET as u64)?;
        self.stream.write_u64(root_pos)?;
        self.stream.flush()
    }

    fn write_directory(&mut self, dir: &ODirectory) -> Result<u64> {
        let mut offsets = Vec::with_capacity(dir.entries.len());
        for (name, entry) in &dir.entries {
            let offset = match entry {
                OEntry::Directory(sub) => make_directory_offset(self.write_directory(sub)?),
                OEntry::Data(bytes) => make_data_offset(self.write_block(bytes)?),
            };
            offsets.push((name, offset));
        }

        let pos = self.stream.pos();
        self.stream.write_u64(offsets.len() as u64)?;
        for (name, offset) in offsets {
            let len = u32::try_from(name.len())
                .map_err(|_| Error::invalid(format!("entry name too long: {} bytes", name.len())))?;
            self.stream.write_u64(offset)?;
            self.stream.write_u32(len)?;
            self.stream.write_bytes(name.as_bytes())?;
        }
        Ok(pos)
    }

    fn write_block(&mut self, bytes: &[u8]) -> Result<u64> {
        let pos = self.stream.pos();
        match compress(bytes, self.compression_level)? {
            Some(packed) => {
                self.stream.write_u64(packed.len() as u64)?;
                self.stream.write_u8(CODEC_ZLIB)?;
                self.stream.write_bytes(&packed)?;
            }
            None => {
                self.stream.write_u64(bytes.len() as u64)?;
                self.stream.write_u8(CODEC_RAW)?;
                self.stream.write_bytes(bytes)?;
            }
        }
        Ok(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::IArchive;

    #[test]
    fn test_write_read_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.scc");

        let mut root = ODirectory::new();
        root.put("header", b"title=test".to_vec());
        let node = root.directory_mut("root");
        node.put("zeros", vec![0u8; 4096]);
        node.directory_mut("children").directory_mut("b");
        node.directory_mut("children").directory_mut("a").put("x", vec![1, 2, 3]);

        let archive = OArchive::create(&path).unwrap();
        archive.finish(&root).unwrap();

        let archive = IArchive::open(&path).unwrap();
        let top = archive.root();
        assert_eq!(top.read("header").unwrap(), b"title=test");
        assert!(top.has_directory("root"));
        assert!(!top.has_data("root"));

        let node = top.directory("root").unwrap();
        let zeros = node.data("zeros").unwrap();
        assert!(zeros.is_compressed());
        assert_eq!(zeros.read_all().unwrap(), vec![0u8; 4096]);

        let children = node.directory("children").unwrap();
        assert_eq!(children.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(children.directory("a").unwrap().read("x").unwrap(), vec![1, 2, 3]);
        assert!(children.directory("b").unwrap().is_empty());
        assert!(matches!(children.read("c"), Err(Error::EntryNotFound(_))));
        assert!(matches!(children.data("a"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_unfinished_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.scc");
        let archive = OArchive::create(&path).unwrap();
        drop(archive);
        assert!(IArchive::open(&path).is_err());
    }

    #[test]
    fn test_create_new_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.scc");
        std::fs::write(&path, b"x").unwrap();
        assert!(matches!(OArchive::create_new(&path), Err(Error::FileExists(_))));
    }
}
