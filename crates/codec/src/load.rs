//! Artifact loader.
//!
//! Consumes an immutable byte buffer: validates the file header, parses the
//! pool and static tier eagerly, builds the dynamic index, and parses dynamic
//! records lazily on first touch. Repeated lookups return identity-equal
//! records through a per-instance cache.

use crate::emit::{
    FILE_MAGIC, FILE_VERSION, INDEX_MAGIC, RECORD_BOUNDARY, RECORD_NONDETERMINISTIC,
    RECORD_RULE_SET, STATIC_MAGIC,
};
use crate::error::{CodecError, Result};
use crate::pool::PoolReader;
use som_analysis::hash::selector_hash;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

/// One static tier record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticRecord {
    pub selector_hash: u32,
    pub selector_ref: u32,
    /// (name_ref, value_ref) pairs sorted by name_ref.
    pub properties: Vec<(u32, u32)>,
}

/// One dependency entry of a boundary record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryDep {
    pub kind: u8,
    pub property_ref: u32,
    pub container_hash: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundaryRecord {
    pub selector_hash: u32,
    pub selector_ref: u32,
    pub flags: u8,
    pub deps: Vec<BoundaryDep>,
    /// Selector hashes of the subgraph members in source order.
    pub subgraph: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSetRecord {
    pub selector_hash: u32,
    pub selector_ref: u32,
    pub boundary_hash: u32,
    pub properties: Vec<(u32, u32)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NondeterministicRecord {
    pub selector_hash: u32,
    pub selector_ref: u32,
    pub flags: u8,
}

/// A lazily parsed dynamic record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DynamicRecord {
    Boundary(BoundaryRecord),
    RuleSet(RuleSetRecord),
    Nondeterministic(NondeterministicRecord),
}

/// Loader statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoaderStats {
    pub file_size: usize,
    pub pool_entries: usize,
    pub static_count: usize,
    pub dynamic_indexed: usize,
    pub parse_micros: u128,
}

/// Bounds-checked cursor over a byte slice.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn read_exact(&mut self, len: usize, context: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CodecError::UnexpectedEof { context })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.read_exact(1, context)?[0])
    }

    fn read_u16(&mut self, context: &'static str) -> Result<u16> {
        let bytes = self.read_exact(2, context)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u24(&mut self, context: &'static str) -> Result<u32> {
        let bytes = self.read_exact(3, context)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }

    fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        let bytes = self.read_exact(4, context)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// A loaded artifact over a borrowed buffer.
pub struct CompiledStyles<'a> {
    data: &'a [u8],
    pool: PoolReader<'a>,
    static_map: HashMap<u32, StaticRecord>,
    dynamic_index: HashMap<u32, (u32, u32)>,
    dynamic_tier_start: usize,
    dynamic_cache: RefCell<HashMap<u32, Rc<DynamicRecord>>>,
    stats: LoaderStats,
}

impl<'a> CompiledStyles<'a> {
    /// Validate headers and build the lookup structures. Dynamic records stay
    /// unparsed until first touch.
    pub fn load(data: &'a [u8]) -> Result<Self> {
        let started = Instant::now();
        let mut cursor = Cursor::new(data, 0);

        let magic_bytes = cursor.read_exact(4, "file magic")?;
        let magic = [magic_bytes[0], magic_bytes[1], magic_bytes[2], magic_bytes[3]];
        if magic != FILE_MAGIC {
            return Err(CodecError::InvalidMagic {
                section: "file",
                found: magic,
            });
        }
        let version = cursor.read_u8("file version")?;
        if version != FILE_VERSION {
            return Err(CodecError::UnsupportedVersion {
                section: "file",
                found: version,
            });
        }
        cursor.read_exact(3, "file reserved bytes")?;
        let _flags = cursor.read_u32("file flags")?;
        let section_count = cursor.read_u32("file section count")?;
        if section_count != 3 {
            return Err(CodecError::UnexpectedSectionCount {
                found: section_count,
            });
        }

        let (pool, pool_len) = PoolReader::parse(&data[cursor.pos..])?;
        cursor.pos += pool_len;

        let static_map = parse_static_tier(&mut cursor)?;
        let dynamic_index = parse_dynamic_index(&mut cursor)?;
        let dynamic_tier_start = cursor.pos;

        let stats = LoaderStats {
            file_size: data.len(),
            pool_entries: pool.len(),
            static_count: static_map.len(),
            dynamic_indexed: dynamic_index.len(),
            parse_micros: started.elapsed().as_micros(),
        };

        Ok(Self {
            data,
            pool,
            static_map,
            dynamic_index,
            dynamic_tier_start,
            dynamic_cache: RefCell::new(HashMap::new()),
            stats,
        })
    }

    /// Static record for a selector, if present.
    pub fn get_static(&self, selector: &str) -> Option<&StaticRecord> {
        self.get_static_by_hash(selector_hash(selector))
    }

    pub fn get_static_by_hash(&self, hash: u32) -> Option<&StaticRecord> {
        self.static_map.get(&hash)
    }

    /// Indexed dynamic record for a selector. Rule-set records are reachable
    /// only through their boundary's subgraph list, not through the index.
    pub fn get_dynamic(&self, selector: &str) -> Result<Option<Rc<DynamicRecord>>> {
        self.get_dynamic_by_hash(selector_hash(selector))
    }

    pub fn get_dynamic_by_hash(&self, hash: u32) -> Result<Option<Rc<DynamicRecord>>> {
        let Some(&(_, offset)) = self.dynamic_index.get(&hash) else {
            return Ok(None);
        };
        if let Some(cached) = self.dynamic_cache.borrow().get(&hash) {
            return Ok(Some(Rc::clone(cached)));
        }
        let (record, _) = self.parse_dynamic_at(offset as usize)?;
        let record = Rc::new(record);
        self.dynamic_cache
            .borrow_mut()
            .insert(hash, Rc::clone(&record));
        Ok(Some(record))
    }

    /// Resolve a pool reference.
    pub fn resolve_string(&self, reference: u32) -> Option<&'a str> {
        self.pool.resolve(reference)
    }

    pub fn stats(&self) -> &LoaderStats {
        &self.stats
    }

    /// Walk every record of the dynamic tier in file order.
    pub fn iter_dynamic_records(&self) -> DynamicRecordIter<'_, 'a> {
        DynamicRecordIter {
            loader: self,
            offset: 0,
        }
    }

    /// Parse one dynamic record at an offset from the tier start. Returns the
    /// record and the offset of the next record.
    fn parse_dynamic_at(&self, offset: usize) -> Result<(DynamicRecord, usize)> {
        let tier = &self.data[self.dynamic_tier_start..];
        let mut cursor = Cursor::new(tier, offset);
        let record_type = cursor.read_u8("dynamic record type")?;
        let record = match record_type {
            RECORD_BOUNDARY => {
                let selector_hash = cursor.read_u32("boundary hash")?;
                let selector_ref = cursor.read_u24("boundary selector ref")?;
                let dep_count = cursor.read_u8("boundary dep count")?;
                let flags = cursor.read_u8("boundary flags")?;
                let subgraph_count = cursor.read_u16("boundary subgraph count")?;
                let mut deps = Vec::with_capacity(dep_count as usize);
                for _ in 0..dep_count {
                    deps.push(BoundaryDep {
                        kind: cursor.read_u8("dep kind")?,
                        property_ref: cursor.read_u24("dep property ref")?,
                        container_hash: cursor.read_u32("dep container hash")?,
                    });
                }
                let mut subgraph = Vec::with_capacity(subgraph_count as usize);
                for _ in 0..subgraph_count {
                    subgraph.push(cursor.read_u32("subgraph hash")?);
                }
                DynamicRecord::Boundary(BoundaryRecord {
                    selector_hash,
                    selector_ref,
                    flags,
                    deps,
                    subgraph,
                })
            }
            RECORD_RULE_SET => {
                let selector_hash = cursor.read_u32("rule set hash")?;
                let selector_ref = cursor.read_u24("rule set selector ref")?;
                let prop_count = cursor.read_u8("rule set prop count")?;
                let boundary_hash = cursor.read_u32("rule set boundary hash")?;
                let properties = read_properties(&mut cursor, prop_count)?;
                DynamicRecord::RuleSet(RuleSetRecord {
                    selector_hash,
                    selector_ref,
                    boundary_hash,
                    properties,
                })
            }
            RECORD_NONDETERMINISTIC => {
                let selector_hash = cursor.read_u32("nondeterministic hash")?;
                let selector_ref = cursor.read_u24("nondeterministic selector ref")?;
                let flags = cursor.read_u8("nondeterministic flags")?;
                DynamicRecord::Nondeterministic(NondeterministicRecord {
                    selector_hash,
                    selector_ref,
                    flags,
                })
            }
            found => return Err(CodecError::UnknownRecordType { found }),
        };
        Ok((record, cursor.pos))
    }

    fn dynamic_tier_len(&self) -> usize {
        self.data.len() - self.dynamic_tier_start
    }
}

/// Sequential iterator over the dynamic tier.
pub struct DynamicRecordIter<'l, 'a> {
    loader: &'l CompiledStyles<'a>,
    offset: usize,
}

impl Iterator for DynamicRecordIter<'_, '_> {
    type Item = Result<DynamicRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.loader.dynamic_tier_len() {
            return None;
        }
        match self.loader.parse_dynamic_at(self.offset) {
            Ok((record, next)) => {
                self.offset = next;
                Some(Ok(record))
            }
            Err(error) => {
                // Stop after a malformed record; a truncated tier never
                // yields a partial record.
                self.offset = usize::MAX;
                Some(Err(error))
            }
        }
    }
}

fn read_properties(cursor: &mut Cursor<'_>, count: u8) -> Result<Vec<(u32, u32)>> {
    let mut properties = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_ref = cursor.read_u24("property name ref")?;
        let value_ref = cursor.read_u24("property value ref")?;
        properties.push((name_ref, value_ref));
    }
    Ok(properties)
}

fn parse_static_tier(cursor: &mut Cursor<'_>) -> Result<HashMap<u32, StaticRecord>> {
    let magic_bytes = cursor.read_exact(4, "static tier magic")?;
    let magic = [magic_bytes[0], magic_bytes[1], magic_bytes[2], magic_bytes[3]];
    if magic != STATIC_MAGIC {
        return Err(CodecError::InvalidMagic {
            section: "static tier",
            found: magic,
        });
    }
    let count = cursor.read_u32("static tier count")?;
    let size = cursor.read_u32("static tier size")? as usize;
    let section_end = cursor
        .pos
        .checked_add(size)
        .filter(|&end| end <= cursor.bytes.len())
        .ok_or(CodecError::UnexpectedEof {
            context: "static tier records",
        })?;

    let mut map = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let selector_hash = cursor.read_u32("static record hash")?;
        let selector_ref = cursor.read_u24("static record selector ref")?;
        let prop_count = cursor.read_u8("static record prop count")?;
        let properties = read_properties(cursor, prop_count)?;
        map.insert(
            selector_hash,
            StaticRecord {
                selector_hash,
                selector_ref,
                properties,
            },
        );
    }
    if cursor.pos != section_end {
        return Err(CodecError::SectionSizeMismatch {
            section: "static tier",
        });
    }
    Ok(map)
}

fn parse_dynamic_index(cursor: &mut Cursor<'_>) -> Result<HashMap<u32, (u32, u32)>> {
    let magic_bytes = cursor.read_exact(4, "dynamic index magic")?;
    let magic = [magic_bytes[0], magic_bytes[1], magic_bytes[2], magic_bytes[3]];
    if magic != INDEX_MAGIC {
        return Err(CodecError::InvalidMagic {
            section: "dynamic index",
            found: magic,
        });
    }
    let count = cursor.read_u32("dynamic index count")?;
    let size = cursor.read_u32("dynamic index size")? as usize;
    let section_end = cursor
        .pos
        .checked_add(size)
        .filter(|&end| end <= cursor.bytes.len())
        .ok_or(CodecError::UnexpectedEof {
            context: "dynamic index entries",
        })?;

    let mut map = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let hash = cursor.read_u32("index entry hash")?;
        let selector_ref = cursor.read_u24("index entry selector ref")?;
        let offset = cursor.read_u32("index entry offset")?;
        map.insert(hash, (selector_ref, offset));
    }
    if cursor.pos != section_end {
        return Err(CodecError::SectionSizeMismatch {
            section: "dynamic index",
        });
    }
    Ok(map)
}
