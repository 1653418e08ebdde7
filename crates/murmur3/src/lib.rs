//! MurmurHash3 x64_128 with seed chaining.
//!
//! Original algorithm by Austin Appleby. [`MurmurHash`] accumulates a digest
//! over many appends by feeding the running state back in as the seed, the
//! same way scene hashes are built incrementally from channels and samples.

use std::fmt;

const C1: u64 = 0x87c37b91114253d5;
const C2: u64 = 0x4cf5ad432745937f;

/// Compute MurmurHash3 x64_128 of `data` starting from the given seed pair.
///
/// Returns the 128-bit hash as (h1, h2).
pub fn hash128_seeded(data: &[u8], seed: (u64, u64)) -> (u64, u64) {
    let len = data.len();
    let nblocks = len / 16;

    let (mut h1, mut h2) = seed;

    // Body - process 16-byte blocks
    for block in data.chunks_exact(16) {
        let mut k1 = read_u64_le(&block[..8]);
        let mut k2 = read_u64_le(&block[8..]);

        k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1.rotate_left(27).wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x52dce729);

        k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        h2 ^= k2;
        h2 = h2.rotate_left(31).wrapping_add(h1);
        h2 = h2.wrapping_mul(5).wrapping_add(0x38495ab5);
    }

    // Tail - little endian assembly of the remaining bytes
    let tail = &data[nblocks * 16..];
    let mut k1: u64 = 0;
    let mut k2: u64 = 0;
    for (i, &b) in tail.iter().enumerate().rev() {
        if i >= 8 {
            k2 ^= (b as u64) << ((i - 8) * 8);
        } else {
            k1 ^= (b as u64) << (i * 8);
        }
    }
    if tail.len() > 8 {
        k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        h2 ^= k2;
    }
    if !tail.is_empty() {
        k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        h1 ^= k1;
    }

    // Finalization
    h1 ^= len as u64;
    h2 ^= len as u64;

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 = fmix64(h1);
    h2 = fmix64(h2);

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    (h1, h2)
}

/// Compute MurmurHash3 x64_128 with a zero seed.
#[inline]
pub fn hash128(data: &[u8]) -> (u64, u64) {
    hash128_seeded(data, (0, 0))
}

#[inline]
fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51afd7ed558ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ceb9fe1a85ec53);
    h ^= h >> 33;
    h
}

/// Incremental 128-bit hash.
///
/// Appends are order dependent: `a` then `b` differs from `b` then `a`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MurmurHash {
    h1: u64,
    h2: u64,
}

impl MurmurHash {
    /// Fresh hash with a zero state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash built from explicit halves.
    pub fn from_parts(h1: u64, h2: u64) -> Self {
        Self { h1, h2 }
    }

    /// Feed raw bytes.
    pub fn append_bytes(&mut self, data: &[u8]) -> &mut Self {
        let (h1, h2) = hash128_seeded(data, (self.h1, self.h2));
        self.h1 = h1;
        self.h2 = h2;
        self
    }

    /// Feed a string (length prefixed so that "ab","c" != "a","bc").
    pub fn append_str(&mut self, s: &str) -> &mut Self {
        self.append_u64(s.len() as u64);
        self.append_bytes(s.as_bytes())
    }

    pub fn append_u64(&mut self, v: u64) -> &mut Self {
        self.append_bytes(&v.to_le_bytes())
    }

    pub fn append_i32(&mut self, v: i32) -> &mut Self {
        self.append_bytes(&v.to_le_bytes())
    }

    /// Feed a float; `-0.0` and `0.0` hash identically.
    pub fn append_f64(&mut self, v: f64) -> &mut Self {
        let v = if v == 0.0 { 0.0 } else { v };
        self.append_bytes(&v.to_le_bytes())
    }

    pub fn append_f32(&mut self, v: f32) -> &mut Self {
        let v = if v == 0.0 { 0.0 } else { v };
        self.append_bytes(&v.to_le_bytes())
    }

    /// Feed another digest.
    pub fn append_hash(&mut self, other: &MurmurHash) -> &mut Self {
        self.append_u64(other.h1);
        self.append_u64(other.h2)
    }

    /// The two 64-bit halves.
    #[inline]
    pub fn parts(&self) -> (u64, u64) {
        (self.h1, self.h2)
    }

    /// Digest as 16 little-endian bytes.
    pub fn digest(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.h1.to_le_bytes());
        out[8..].copy_from_slice(&self.h2.to_le_bytes());
        out
    }

    /// Lowercase hex of the digest.
    pub fn to_hex(&self) -> String {
        format!("{:016x}{:016x}", self.h1, self.h2)
    }
}

impl fmt::Debug for MurmurHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MurmurHash({})", self.to_hex())
    }
}

impl fmt::Display for MurmurHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
