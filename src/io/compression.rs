//! Zlib compression of data block payloads.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Compress data using zlib.
///
/// `level` ranges 0-9; 0 disables compression. Returns `None` when
/// compression is off or does not save space, otherwise
/// `[uncompressed_size: u64 LE][zlib stream]`.
pub fn compress(data: &[u8], level: u32) -> Result<Option<Vec<u8>>> {
    if level == 0 || data.is_empty() {
        return Ok(None);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    if compressed.len() + 8 >= data.len() {
        return Ok(None);
    }

    let mut result = Vec::with_capacity(8 + compressed.len());
    result.extend_from_slice(&(data.len() as u64).to_le_bytes());
    result.extend_from_slice(&compressed);
    Ok(Some(result))
}

/// Decompress a payload produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(Error::invalid("compressed block shorter than its size prefix"));
    }
    let mut size = [0u8; 8];
    size.copy_from_slice(&data[..8]);
    let uncompressed_size = u64::from_le_bytes(size) as usize;

    let mut decoder = ZlibDecoder::new(&data[8..]);
    // zlib cannot expand beyond ~1032:1, so cap the reservation by the input.
    let capacity = uncompressed_size.min(data.len().saturating_mul(1032));
    let mut decompressed = Vec::with_capacity(capacity);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::invalid(format!("corrupt compressed block: {e}")))?;

    if decompressed.len() != uncompressed_size {
        return Err(Error::invalid(format!(
            "decompressed {} bytes, expected {}",
            decompressed.len(),
            uncompressed_size
        )));
    }
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original = b"Hello, World! This is some test data that should compress well. ".repeat(100);
        let compressed = compress(&original, 6).unwrap().unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_skips_incompressible() {
        assert!(compress(b"abc", 9).unwrap().is_none());
        assert!(compress(&[7u8; 1000], 0).unwrap().is_none());
    }

    #[test]
    fn test_corrupt() {
        let mut bad = 100u64.to_le_bytes().to_vec();
        bad.extend_from_slice(b"not zlib");
        assert!(decompress(&bad).is_err());
    }

    #[test]
    fn test_huge_size_prefix() {
        let mut bad = u64::MAX.to_le_bytes().to_vec();
        bad.extend_from_slice(&compress(&[1u8; 64], 9).unwrap().unwrap()[8..]);
        assert!(decompress(&bad).is_err());
    }
}
