//! Container reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::RwLock;

use super::compression::decompress;
use super::format::*;
use crate::util::{Error, Result};

/// Input streams for reading container data.
/// Supports both memory-mapped and buffered I/O modes.
pub struct IStreams {
    inner: StreamsInner,
    path: PathBuf,
    version: u16,
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    /// Memory-mapped file (preferred for large files)
    Mmap(Mmap),
    /// Buffered file access (fallback)
    File(Arc<RwLock<File>>),
}

impl IStreams {
    /// Open a file, memory mapped when the `mmap` feature is enabled.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, cfg!(feature = "mmap"))
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let inner = if use_mmap {
            // Safety: the file is opened read-only; writers replace files
            // wholesale and never patch a file that is being read.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            StreamsInner::Mmap(mmap)
        } else {
            StreamsInner::File(Arc::new(RwLock::new(file)))
        };

        let (version, frozen) = match &inner {
            StreamsInner::Mmap(mmap) => Self::parse_header(mmap)?,
            StreamsInner::File(file) => {
                let mut f = file.write();
                let mut header = [0u8; HEADER_SIZE];
                f.seek(SeekFrom::Start(0))?;
                f.read_exact(&mut header)?;
                Self::parse_header(&header)?
            }
        };

        Ok(Self {
            inner,
            path: path.to_path_buf(),
            version,
            frozen,
            size,
        })
    }

    /// Parse and validate the container header.
    fn parse_header(data: &[u8]) -> Result<(u16, bool)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }
        if &data[0..5] != SCC_MAGIC {
            return Err(Error::InvalidMagic);
        }
        let frozen = data[FROZEN_OFFSET] == FROZEN_FLAG;
        let version = u16::from_le_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);
        if version > CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok((version, frozen))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file was completely written.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Get the total file size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the root directory position from the header.
    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    /// Read bytes at a specific position.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let end = pos
            .checked_add(len as u64)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.size {
            return Err(Error::UnexpectedEof(end));
        }
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read bytes into an existing buffer.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let end = pos
            .checked_add(buf.len() as u64)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.size {
            return Err(Error::UnexpectedEof(end));
        }

        match &self.inner {
            StreamsInner::Mmap(mmap) => {
                buf.copy_from_slice(&mmap[pos as usize..end as usize]);
                Ok(())
            }
            StreamsInner::File(file) => {
                let mut f = file.write();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }

    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_u32(&self, pos: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_into(pos, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u8(&self, pos: u64) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_into(pos, &mut buf)?;
        Ok(buf[0])
    }
}

/// An opened container file.
pub struct IArchive {
    streams: Arc<IStreams>,
    root: IDirectory,
}

impl IArchive {
    /// Open a container for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let streams = Arc::new(IStreams::open(path)?);
        if !streams.is_frozen() {
            return Err(Error::invalid(format!(
                "{} was not completely written",
                streams.path().display()
            )));
        }
        let root_pos = streams.root_pos()?;
        let root = IDirectory::new(streams.clone(), root_pos)?;
        Ok(Self { streams, root })
    }

    #[inline]
    pub fn root(&self) -> &IDirectory {
        &self.root
    }

    #[inline]
    pub fn streams(&self) -> &Arc<IStreams> {
        &self.streams
    }
}

/// A parsed directory: named entries pointing at sub-directories or data.
#[derive(Clone)]
pub struct IDirectory {
    streams: Arc<IStreams>,
    pos: u64,
    /// Sorted by name (writers emit them sorted).
    entries: Vec<(String, u64)>,
}

impl IDirectory {
    /// Parse the directory at `pos`.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let count = streams.read_u64(pos)?;
        // Each entry needs at least 12 bytes.
        if count.saturating_mul(12) > streams.size() {
            return Err(Error::invalid(format!("directory at {pos} claims {count} entries")));
        }

        let mut entries = Vec::with_capacity(count as usize);
        let mut cursor = pos + 8;
        for _ in 0..count {
            let offset = streams.read_u64(cursor)?;
            let name_len = streams.read_u32(cursor + 8)? as usize;
            let name = String::from_utf8(streams.read_bytes(cursor + 12, name_len)?)?;
            cursor += 12 + name_len as u64;
            entries.push((name, offset));
        }
        if !entries.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(Error::invalid(format!("directory at {pos} is not sorted")));
        }

        Ok(Self { streams, pos, entries })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    fn offset(&self, name: &str) -> Option<u64> {
        self.entries
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.offset(name).is_some()
    }

    pub fn has_directory(&self, name: &str) -> bool {
        self.offset(name).is_some_and(is_directory_offset)
    }

    pub fn has_data(&self, name: &str) -> bool {
        self.offset(name).is_some_and(is_data_offset)
    }

    /// Open a sub-directory.
    pub fn directory(&self, name: &str) -> Result<IDirectory> {
        let offset = self
            .offset(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        if !is_directory_offset(offset) {
            return Err(Error::mismatch("directory", "data"));
        }
        IDirectory::new(self.streams.clone(), extract_offset(offset))
    }

    /// Locate a data block.
    pub fn data(&self, name: &str) -> Result<IData> {
        let offset = self
            .offset(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        if !is_data_offset(offset) {
            return Err(Error::mismatch("data", "directory"));
        }
        IData::new(self.streams.clone(), extract_offset(offset))
    }

    /// Read and decode a data block in one step.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.data(name)?.read_all()
    }
}

/// Data block in the container.
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
    codec: u8,
}

impl IData {
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let size = streams.read_u64(pos)?;
        let codec = streams.read_u8(pos + 8)?;
        if codec != CODEC_RAW && codec != CODEC_ZLIB {
            return Err(Error::invalid(format!("unknown codec {codec} at {pos}")));
        }
        Ok(Self { streams, pos, size, codec })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Stored (possibly compressed) size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.codec == CODEC_ZLIB
    }

    /// Read the payload, decompressing when needed.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let len = usize::try_from(self.size)
            .map_err(|_| Error::invalid(format!("block at {} is too large", self.pos)))?;
        let raw = self.streams.read_bytes(self.pos + BLOCK_PREFIX_SIZE, len)?;
        if self.is_compressed() {
            decompress(&raw)
        } else {
            Ok(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parsing() {
        let mut header = [0u8; 16];
        header[0..5].copy_from_slice(SCC_MAGIC);
        header[FROZEN_OFFSET] = FROZEN_FLAG;
        header[VERSION_OFFSET] = 1;

        let (version, frozen) = IStreams::parse_header(&header).unwrap();
        assert_eq!(version, 1);
        assert!(frozen);
    }

    #[test]
    fn test_invalid_magic() {
        let header = [0u8; 16];
        assert!(matches!(IStreams::parse_header(&header), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_future_version() {
        let mut header = [0u8; 16];
        header[0..5].copy_from_slice(SCC_MAGIC);
        header[VERSION_OFFSET] = 9;
        assert!(matches!(
            IStreams::parse_header(&header),
            Err(Error::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = IArchive::open(dir.path().join("nope.scc")).err().unwrap();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.scc");
        std::fs::write(&path, b"SccIO").unwrap();
        assert!(matches!(IArchive::open(&path), Err(Error::UnexpectedEof(5))));
    }
}
