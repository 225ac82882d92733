//! Binary emitter.
//!
//! Serializes an analysis into the four file sections: string pool, static
//! tier, dynamic index and dynamic tier. Rules are ordered by ascending
//! unsigned selector hash within each tier; hash ties break on the selector's
//! lexicographic byte order so output stays byte-stable.

use crate::pool::{write_u24, ConstantPool};
use som_analysis::hash::selector_hash;
use som_analysis::model::{BoundaryManifest, ComponentNode, EmitType};
use som_analysis::Analysis;

/// File magic.
pub const FILE_MAGIC: [u8; 4] = *b"BSOM";
/// File format version.
pub const FILE_VERSION: u8 = 1;
/// Static tier magic.
pub const STATIC_MAGIC: [u8; 4] = *b"SOMS";
/// Dynamic index magic.
pub const INDEX_MAGIC: [u8; 4] = *b"SOMD";

/// Dynamic record type tags.
pub const RECORD_BOUNDARY: u8 = 0x01;
pub const RECORD_RULE_SET: u8 = 0x02;
pub const RECORD_NONDETERMINISTIC: u8 = 0x03;

/// Boundary flag bits.
pub const FLAG_PORTAL_DEP: u8 = 1 << 0;
pub const FLAG_THEME_DEP: u8 = 1 << 1;

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Serialize a complete artifact.
pub fn emit(analysis: &Analysis) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    intern_strings(analysis, &mut pool);
    pool.finalize();

    let static_tier = encode_static_tier(analysis, &pool);
    let (dynamic_tier, index_entries) = encode_dynamic_tier(analysis, &pool);
    let dynamic_index = encode_dynamic_index(&index_entries);
    let pool_bytes = pool.serialize();

    let mut out = Vec::with_capacity(
        16 + pool_bytes.len() + static_tier.len() + dynamic_index.len() + dynamic_tier.len(),
    );
    out.extend_from_slice(&FILE_MAGIC);
    out.push(FILE_VERSION);
    out.extend_from_slice(&[0, 0, 0]);
    write_u32(&mut out, 0); // flags
    write_u32(&mut out, 3); // section count
    out.extend_from_slice(&pool_bytes);
    out.extend_from_slice(&static_tier);
    out.extend_from_slice(&dynamic_index);
    out.extend_from_slice(&dynamic_tier);
    out
}

/// Phase one: intern every string the records will reference.
fn intern_strings(analysis: &Analysis, pool: &mut ConstantPool) {
    for node in &analysis.rules {
        pool.intern(&node.selector);
        match node.emit_type {
            EmitType::ResolvedStyleBlock | EmitType::DynamicBoundary | EmitType::RuleSet => {
                for (name, value) in &node.normalized_declarations {
                    if name.starts_with("--") {
                        continue;
                    }
                    pool.intern(name);
                    pool.intern(value);
                }
            }
            EmitType::NondeterministicFallback => {}
        }
    }
    for manifest in &analysis.manifests {
        for dep in &manifest.entries {
            pool.intern(&dep.property);
        }
    }
}

/// Property entries of a rule: (name_ref, value_ref) pairs with custom
/// properties omitted, sorted by name_ref, clamped to 255.
fn rule_properties(node: &ComponentNode, pool: &ConstantPool) -> Vec<(u32, u32)> {
    let mut properties: Vec<(u32, u32)> = node
        .normalized_declarations
        .iter()
        .filter(|(name, _)| !name.starts_with("--"))
        .map(|(name, value)| (pool.reference(name), pool.reference(value)))
        .collect();
    properties.sort_unstable();
    properties.truncate(255);
    properties
}

fn write_properties(out: &mut Vec<u8>, properties: &[(u32, u32)]) {
    for &(name_ref, value_ref) in properties {
        write_u24(out, name_ref);
        write_u24(out, value_ref);
    }
}

fn encode_static_tier(analysis: &Analysis, pool: &ConstantPool) -> Vec<u8> {
    let mut rules: Vec<&ComponentNode> = analysis
        .rules
        .iter()
        .filter(|node| node.emit_type == EmitType::ResolvedStyleBlock)
        .collect();
    rules.sort_by(|a, b| {
        (selector_hash(&a.selector), a.selector.as_bytes())
            .cmp(&(selector_hash(&b.selector), b.selector.as_bytes()))
    });

    let mut records = Vec::new();
    for node in &rules {
        let properties = rule_properties(node, pool);
        write_u32(&mut records, selector_hash(&node.selector));
        write_u24(&mut records, pool.reference(&node.selector));
        records.push(properties.len() as u8);
        write_properties(&mut records, &properties);
    }

    let mut out = Vec::with_capacity(12 + records.len());
    out.extend_from_slice(&STATIC_MAGIC);
    write_u32(&mut out, rules.len() as u32);
    write_u32(&mut out, records.len() as u32);
    out.extend_from_slice(&records);
    out
}

/// An entry destined for the dynamic index.
struct IndexEntry {
    hash: u32,
    selector_ref: u32,
    offset: u32,
}

/// Encode the dynamic tier. Indexed records (boundary markers and
/// nondeterministic markers) are laid out in hash order; each boundary marker
/// is immediately followed by the rule-set records of its subgraph members in
/// source order, reachable through the subgraph hash list.
fn encode_dynamic_tier(analysis: &Analysis, pool: &ConstantPool) -> (Vec<u8>, Vec<IndexEntry>) {
    enum Indexed<'a> {
        Boundary(&'a BoundaryManifest),
        Nondeterministic(&'a ComponentNode),
    }

    let mut indexed: Vec<(u32, &str, Indexed)> = Vec::new();
    for manifest in &analysis.manifests {
        let node = &analysis.rules[manifest.boundary.index()];
        indexed.push((
            selector_hash(&node.selector),
            node.selector.as_str(),
            Indexed::Boundary(manifest),
        ));
    }
    for node in &analysis.rules {
        if node.emit_type == EmitType::NondeterministicFallback {
            indexed.push((
                selector_hash(&node.selector),
                node.selector.as_str(),
                Indexed::Nondeterministic(node),
            ));
        }
    }
    indexed.sort_by(|a, b| (a.0, a.1.as_bytes()).cmp(&(b.0, b.1.as_bytes())));

    let mut tier = Vec::new();
    let mut entries = Vec::new();
    for (hash, selector, record) in indexed {
        let offset = tier.len() as u32;
        entries.push(IndexEntry {
            hash,
            selector_ref: pool.reference(selector),
            offset,
        });
        match record {
            Indexed::Boundary(manifest) => {
                encode_boundary(analysis, manifest, pool, &mut tier);
            }
            Indexed::Nondeterministic(node) => {
                tier.push(RECORD_NONDETERMINISTIC);
                write_u32(&mut tier, hash);
                write_u24(&mut tier, pool.reference(selector));
                tier.push(0); // flags, reserved
            }
        }
    }
    (tier, entries)
}

fn encode_boundary(
    analysis: &Analysis,
    manifest: &BoundaryManifest,
    pool: &ConstantPool,
    tier: &mut Vec<u8>,
) {
    let boundary_node = &analysis.rules[manifest.boundary.index()];
    let boundary_hash = selector_hash(&boundary_node.selector);

    let mut flags = 0u8;
    if manifest.flags.portal_dependency {
        flags |= FLAG_PORTAL_DEP;
    }
    if manifest.flags.theme_dep {
        flags |= FLAG_THEME_DEP;
    }

    let deps = &manifest.entries[..manifest.entries.len().min(255)];
    let subgraph = &manifest.subgraph[..manifest.subgraph.len().min(u16::MAX as usize)];

    tier.push(RECORD_BOUNDARY);
    write_u32(tier, boundary_hash);
    write_u24(tier, pool.reference(&boundary_node.selector));
    tier.push(deps.len() as u8);
    tier.push(flags);
    write_u16(tier, subgraph.len() as u16);
    for dep in deps {
        tier.push(dep.kind.code());
        write_u24(tier, pool.reference(&dep.property));
        let container_hash = dep
            .container
            .map(|container| selector_hash(&analysis.rules[container.index()].selector))
            .unwrap_or(0);
        write_u32(tier, container_hash);
    }
    for &member in subgraph {
        write_u32(tier, selector_hash(&analysis.rules[member.index()].selector));
    }

    // Rule-set records for the subgraph members, in source order. They are
    // reachable only through the subgraph list above.
    for &member in subgraph {
        let node = &analysis.rules[member.index()];
        if !matches!(node.emit_type, EmitType::DynamicBoundary | EmitType::RuleSet) {
            continue;
        }
        let properties = rule_properties(node, pool);
        tier.push(RECORD_RULE_SET);
        write_u32(tier, selector_hash(&node.selector));
        write_u24(tier, pool.reference(&node.selector));
        tier.push(properties.len() as u8);
        write_u32(tier, boundary_hash);
        write_properties(tier, &properties);
    }
}

fn encode_dynamic_index(entries: &[IndexEntry]) -> Vec<u8> {
    let mut records = Vec::with_capacity(entries.len() * 11);
    for entry in entries {
        write_u32(&mut records, entry.hash);
        write_u24(&mut records, entry.selector_ref);
        write_u32(&mut records, entry.offset);
    }
    let mut out = Vec::with_capacity(12 + records.len());
    out.extend_from_slice(&INDEX_MAGIC);
    write_u32(&mut out, entries.len() as u32);
    write_u32(&mut out, records.len() as u32);
    out.extend_from_slice(&records);
    out
}
