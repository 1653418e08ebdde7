//! Container format constants and offset helpers.
//!
//! Layout:
//! - 16 byte header: magic, frozen flag, version, root directory position.
//! - Directory: `[u64 count]` then `count` entries of
//!   `[u64 tagged offset][u32 name length][name bytes]`, sorted by name.
//! - Data block: `[u64 payload length][u8 codec][payload]`.

/// Magic bytes at the start of a scene cache file.
pub const SCC_MAGIC: &[u8; 5] = b"SccIO";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Offset of the frozen flag in the header.
pub const FROZEN_OFFSET: usize = 5;

/// Offset of the version in the header.
pub const VERSION_OFFSET: usize = 6;

/// Offset of the root directory position in the header.
pub const ROOT_POS_OFFSET: usize = 8;

/// Current container version.
pub const CURRENT_VERSION: u16 = 1;

/// Frozen flag value once the writer has finished.
pub const FROZEN_FLAG: u8 = 0xFF;

/// Frozen flag value while the file is being written.
pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// MSB of an entry offset: set for data, clear for a directory.
pub const TYPE_FLAG_MASK: u64 = 1 << 63;

/// Mask to extract the actual position from an entry offset.
pub const OFFSET_MASK: u64 = !(1 << 63);

/// Payload stored as is.
pub const CODEC_RAW: u8 = 0;

/// Payload is `[u64 uncompressed length][zlib stream]`.
pub const CODEC_ZLIB: u8 = 1;

/// Size of a data block prefix (length + codec).
pub const BLOCK_PREFIX_SIZE: u64 = 9;

#[inline]
pub const fn is_directory_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) == 0
}

#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) != 0
}

/// Extract the actual position from an entry offset.
#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

#[inline]
pub const fn make_directory_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | TYPE_FLAG_MASK
}
