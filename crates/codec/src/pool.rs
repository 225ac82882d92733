//! Deduplicated string pool with deterministic index assignment.
//!
//! The pool is a two-phase builder: interning happens in any order and only
//! `finalize` assigns indices, by sorting the interned set lexicographically
//! on UTF-8 bytes. Output is therefore byte-identical for semantically equal
//! inputs regardless of encounter order.

use crate::error::{CodecError, Result};
use std::collections::{BTreeSet, HashMap};

/// Reserved reference meaning null/empty.
pub const NULL_REF: u32 = 0xFF_FFFF;
/// Pool section magic.
pub const POOL_MAGIC: [u8; 4] = *b"SOMP";
/// Pool format version.
pub const POOL_VERSION: u8 = 1;

const MAX_ENTRIES: usize = (NULL_REF - 1) as usize;
const MAX_STRING_BYTES: usize = u16::MAX as usize;

/// Common property names interned unconditionally so indices stay stable
/// across incremental changes that add or remove individual property uses.
const SEED_VOCABULARY: &[&str] = &[
    "align-content",
    "align-items",
    "align-self",
    "background",
    "background-color",
    "background-image",
    "background-position",
    "background-size",
    "border",
    "border-color",
    "border-radius",
    "border-style",
    "border-width",
    "bottom",
    "box-shadow",
    "box-sizing",
    "color",
    "container-type",
    "cursor",
    "display",
    "flex",
    "flex-basis",
    "flex-direction",
    "flex-grow",
    "flex-shrink",
    "flex-wrap",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "gap",
    "grid-template-columns",
    "grid-template-rows",
    "height",
    "inset",
    "justify-content",
    "left",
    "letter-spacing",
    "line-height",
    "margin",
    "margin-bottom",
    "margin-left",
    "margin-right",
    "margin-top",
    "max-height",
    "max-width",
    "min-height",
    "min-width",
    "opacity",
    "overflow",
    "padding",
    "padding-bottom",
    "padding-left",
    "padding-right",
    "padding-top",
    "position",
    "right",
    "text-align",
    "text-decoration",
    "top",
    "transform",
    "transition",
    "visibility",
    "white-space",
    "width",
    "z-index",
];

/// Two-phase string interner.
#[derive(Clone, Debug)]
pub struct ConstantPool {
    entries: BTreeSet<String>,
    assigned: HashMap<String, u32>,
    finalized: bool,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create a pool pre-seeded with the fixed property vocabulary.
    pub fn new() -> Self {
        let mut pool = Self {
            entries: BTreeSet::new(),
            assigned: HashMap::new(),
            finalized: false,
        };
        for word in SEED_VOCABULARY {
            pool.intern(word);
        }
        pool
    }

    /// Intern a string. The empty string maps to [`NULL_REF`] and is not
    /// stored.
    ///
    /// # Panics
    /// Panics when called after `finalize`, when the entry limit is exceeded
    /// or when a single string exceeds 65 535 UTF-8 bytes. All of these are
    /// programmer errors, not input errors.
    pub fn intern(&mut self, text: &str) {
        assert!(!self.finalized, "intern after finalize");
        if text.is_empty() {
            return;
        }
        assert!(
            text.len() <= MAX_STRING_BYTES,
            "pool string exceeds {MAX_STRING_BYTES} bytes"
        );
        if self.entries.insert(text.to_owned()) {
            assert!(self.entries.len() <= MAX_ENTRIES, "pool entry limit exceeded");
        }
    }

    /// Assign indices. Index order is the lexicographic byte order of the
    /// interned strings.
    pub fn finalize(&mut self) {
        for (position, text) in self.entries.iter().enumerate() {
            self.assigned.insert(text.clone(), position as u32);
        }
        self.finalized = true;
    }

    /// Reference for an interned string; [`NULL_REF`] for the empty string.
    ///
    /// # Panics
    /// Panics before `finalize`, and for strings that were never interned.
    pub fn reference(&self, text: &str) -> u32 {
        assert!(self.finalized, "reference before finalize");
        if text.is_empty() {
            return NULL_REF;
        }
        match self.assigned.get(text) {
            Some(&index) => index,
            None => panic!("string not interned: {text:?}"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the pool section: a 16-byte header followed by entries in
    /// sorted-index order.
    ///
    /// # Panics
    /// Panics before `finalize`.
    pub fn serialize(&self) -> Vec<u8> {
        assert!(self.finalized, "serialize before finalize");
        let mut data = Vec::new();
        for (position, text) in self.entries.iter().enumerate() {
            write_u24(&mut data, position as u32);
            data.extend_from_slice(&(text.len() as u16).to_le_bytes());
            data.extend_from_slice(text.as_bytes());
        }

        let mut out = Vec::with_capacity(16 + data.len());
        out.extend_from_slice(&POOL_MAGIC);
        out.push(POOL_VERSION);
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&data);
        out
    }
}

/// Write a 24-bit little-endian reference.
pub(crate) fn write_u24(out: &mut Vec<u8>, value: u32) {
    debug_assert!(value <= NULL_REF);
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Read-only view over a serialized pool.
#[derive(Clone, Debug)]
pub struct PoolReader<'a> {
    strings: Vec<&'a str>,
}

impl<'a> PoolReader<'a> {
    /// Parse a pool section from the start of `bytes`. Returns the reader and
    /// the number of bytes consumed.
    pub fn parse(bytes: &'a [u8]) -> Result<(Self, usize)> {
        if bytes.len() < 16 {
            return Err(CodecError::UnexpectedEof { context: "pool header" });
        }
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != POOL_MAGIC {
            return Err(CodecError::InvalidMagic {
                section: "pool",
                found: magic,
            });
        }
        if bytes[4] != POOL_VERSION {
            return Err(CodecError::UnsupportedVersion {
                section: "pool",
                found: bytes[4],
            });
        }
        let entry_count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let data_size = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        let data_end = 16usize
            .checked_add(data_size)
            .filter(|&end| end <= bytes.len())
            .ok_or(CodecError::UnexpectedEof { context: "pool data" })?;

        let mut strings: Vec<Option<&str>> = vec![None; entry_count];
        let mut cursor = 16;
        for _ in 0..entry_count {
            if cursor + 5 > data_end {
                return Err(CodecError::UnexpectedEof { context: "pool entry" });
            }
            let index =
                u32::from_le_bytes([bytes[cursor], bytes[cursor + 1], bytes[cursor + 2], 0]);
            let length =
                u16::from_le_bytes([bytes[cursor + 3], bytes[cursor + 4]]) as usize;
            cursor += 5;
            if cursor + length > data_end {
                return Err(CodecError::UnexpectedEof { context: "pool entry bytes" });
            }
            let slot = strings
                .get_mut(index as usize)
                .ok_or(CodecError::PoolIndexOutOfRange { index })?;
            if slot.is_some() {
                return Err(CodecError::DuplicatePoolIndex { index });
            }
            let text = std::str::from_utf8(&bytes[cursor..cursor + length])
                .map_err(|_| CodecError::InvalidUtf8 { index })?;
            *slot = Some(text);
            cursor += length;
        }
        if cursor != data_end {
            return Err(CodecError::SectionSizeMismatch { section: "pool" });
        }

        let mut resolved = Vec::with_capacity(entry_count);
        for (position, slot) in strings.into_iter().enumerate() {
            resolved.push(slot.ok_or(CodecError::MissingPoolIndex {
                index: position as u32,
            })?);
        }
        Ok((Self { strings: resolved }, data_end))
    }

    /// Resolve a pool reference. [`NULL_REF`] and out-of-range references
    /// resolve to `None`.
    pub fn resolve(&self, reference: u32) -> Option<&'a str> {
        if reference == NULL_REF {
            return None;
        }
        self.strings.get(reference as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_independent_of_interning_order() {
        let mut first = ConstantPool::new();
        first.intern("zebra");
        first.intern("apple");
        first.finalize();

        let mut second = ConstantPool::new();
        second.intern("apple");
        second.intern("zebra");
        second.finalize();

        assert_eq!(first.serialize(), second.serialize());
        assert_eq!(first.reference("apple"), second.reference("apple"));
    }

    #[test]
    fn empty_string_is_the_null_reference() {
        let mut pool = ConstantPool::new();
        pool.finalize();
        assert_eq!(pool.reference(""), NULL_REF);
    }

    #[test]
    fn round_trips_through_the_reader() {
        let mut pool = ConstantPool::new();
        pool.intern(".btn");
        pool.intern("8px 16px");
        pool.finalize();
        let bytes = pool.serialize();

        let (reader, consumed) = PoolReader::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(reader.len(), pool.len());
        assert_eq!(reader.resolve(pool.reference(".btn")), Some(".btn"));
        assert_eq!(reader.resolve(pool.reference("8px 16px")), Some("8px 16px"));
        assert_eq!(reader.resolve(NULL_REF), None);
    }

    #[test]
    fn seed_vocabulary_is_always_present() {
        let mut pool = ConstantPool::new();
        pool.finalize();
        assert!(pool.len() >= 60);
        let bytes = pool.serialize();
        let (reader, _) = PoolReader::parse(&bytes).unwrap();
        assert_eq!(reader.resolve(pool.reference("display")), Some("display"));
    }

    #[test]
    fn corrupt_magic_is_rejected() {
        let mut pool = ConstantPool::new();
        pool.finalize();
        let mut bytes = pool.serialize();
        bytes[0] = b'X';
        assert!(matches!(
            PoolReader::parse(&bytes),
            Err(CodecError::InvalidMagic { section: "pool", .. })
        ));
    }

    #[test]
    fn truncated_data_is_rejected() {
        let mut pool = ConstantPool::new();
        pool.intern(".btn");
        pool.finalize();
        let bytes = pool.serialize();
        assert!(PoolReader::parse(&bytes[..bytes.len() - 2]).is_err());
    }
}
