//! 32-bit FNV-1a over UTF-8 bytes.
//!
//! Selector hashes, invalidation-mask bit positions and the binary record
//! keys all derive from this function; it must stay byte-stable across hosts.

const OFFSET_BASIS: u32 = 0x811c_9dc5;
const PRIME: u32 = 0x0100_0193;

/// Hash a byte slice with 32-bit FNV-1a.
#[inline]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Hash a selector string.
#[inline]
pub fn selector_hash(selector: &str) -> u32 {
    fnv1a_32(selector.as_bytes())
}
