//! Contamination propagation, boundary identification and manifest assembly.
//!
//! Final classes flow along effective-parent edges as a memoized walk over a
//! graph that portal severance keeps acyclic in practice; any residual cycle
//! is broken with a warning and the rule keeps its local class.

use crate::model::{
    BoundaryManifest, Classification, ComponentNode, DepKind, EmitType, ManifestFlags, RuleId,
};
use crate::warnings::{Warning, WarningKind};
use log::debug;
use std::collections::HashSet;

const UNVISITED: u8 = 0;
const IN_PROGRESS: u8 = 1;
const DONE: u8 = 2;

/// Compute final classes and contamination sources for every rule.
pub fn propagate(arena: &mut Vec<ComponentNode>) {
    let mut states = vec![UNVISITED; arena.len()];
    for position in 0..arena.len() {
        resolve_final(arena, &mut states, position);
    }
}

fn resolve_final(arena: &mut Vec<ComponentNode>, states: &mut [u8], position: usize) {
    if states[position] == DONE {
        return;
    }
    states[position] = IN_PROGRESS;
    arena[position].final_class = arena[position].local_class;

    if let Some(parent) = arena[position].effective_parent {
        let parent_position = parent.index();
        if states[parent_position] == IN_PROGRESS {
            let mut warning = Warning::new(
                WarningKind::DepWarning,
                format!(
                    "effective-parent chain through {} is cyclic",
                    arena[position].selector
                ),
            );
            warning.node = Some(RuleId(position as u32));
            arena[position].warnings.push(warning);
        } else {
            resolve_final(arena, states, parent_position);
            let parent_final = arena[parent_position].final_class;
            if parent_final > arena[position].local_class {
                arena[position].final_class = parent_final;
                arena[position].contamination_source = arena[parent_position]
                    .contamination_source
                    .or(Some(parent));
            }
        }
    }
    states[position] = DONE;
}

/// Assign each dynamic rule to its boundary: the rule itself when it has no
/// dynamic effective parent, else the boundary inherited transitively through
/// the effective-parent chain.
pub fn assign_boundaries(arena: &mut Vec<ComponentNode>) {
    for position in 0..arena.len() {
        if !arena[position].final_class.is_dynamic() {
            continue;
        }
        let mut visited: HashSet<usize> = HashSet::new();
        let mut current = position;
        let boundary = loop {
            if !visited.insert(current) {
                // Cycle already warned about during propagation.
                break RuleId(position as u32);
            }
            match arena[current].effective_parent {
                Some(parent) if arena[parent.index()].final_class.is_dynamic() => {
                    current = parent.index();
                }
                _ => break RuleId(current as u32),
            }
        };
        arena[position].boundary = Some(boundary);
    }
}

/// Collect a boundary's subgraph: a depth-first walk over tree children,
/// skipping portal-declaring children, non-dynamic children and children
/// owned by a different boundary. Rules arriving through a portal edge
/// targeting a member join the subgraph of the target instead of their tree
/// ancestor's. Members are in source order.
fn collect_subgraph(
    arena: &[ComponentNode],
    boundary: RuleId,
    portal_children: &[Vec<RuleId>],
) -> Vec<RuleId> {
    let mut seen: HashSet<RuleId> = HashSet::from([boundary]);
    let mut members = vec![boundary];
    let mut stack = vec![boundary];
    while let Some(current) = stack.pop() {
        for &child in &arena[current.index()].tree_children {
            let node = &arena[child.index()];
            if node.declares_portal() {
                continue;
            }
            if !node.final_class.is_dynamic() {
                continue;
            }
            if node.boundary != Some(boundary) {
                continue;
            }
            if seen.insert(child) {
                members.push(child);
                stack.push(child);
            }
        }
        for &arrival in &portal_children[current.index()] {
            let node = &arena[arrival.index()];
            if node.final_class.is_dynamic()
                && node.boundary == Some(boundary)
                && seen.insert(arrival)
            {
                members.push(arrival);
                stack.push(arrival);
            }
        }
    }
    members.sort_by_key(|id| arena[id.index()].source_order);
    members
}

/// Build the dependency manifest for every deterministic boundary.
/// Nondeterministic rules are carried whole by the textual fallback, so their
/// boundaries have no manifest to emit.
pub fn build_manifests(arena: &[ComponentNode]) -> Vec<BoundaryManifest> {
    let mut portal_children: Vec<Vec<RuleId>> = vec![Vec::new(); arena.len()];
    for (position, node) in arena.iter().enumerate() {
        if let Some(target) = node.portal_target {
            portal_children[target.index()].push(RuleId(position as u32));
        }
    }

    let mut manifests = Vec::new();
    for (position, node) in arena.iter().enumerate() {
        let rid = RuleId(position as u32);
        if node.boundary != Some(rid) || node.final_class != Classification::Deterministic {
            continue;
        }
        let subgraph = collect_subgraph(arena, rid, &portal_children);
        let mut flags = ManifestFlags::default();
        let mut seen: HashSet<(RuleId, String, DepKind, Option<RuleId>)> = HashSet::new();
        let mut entries = Vec::new();
        for &member in &subgraph {
            let member_node = &arena[member.index()];
            if member_node.declares_portal() {
                flags.portal_dependency = true;
            }
            for dep in &member_node.deps {
                if dep.kind == DepKind::Theme {
                    flags.theme_dep = true;
                    continue;
                }
                let key = (dep.owner, dep.property.clone(), dep.kind, dep.container);
                if seen.insert(key) {
                    entries.push(dep.clone());
                }
            }
        }
        flags.contamination_only = entries.is_empty();
        debug!(
            "boundary {} with {} members, {} manifest entries",
            node.selector,
            subgraph.len(),
            entries.len()
        );
        manifests.push(BoundaryManifest {
            boundary: rid,
            subgraph,
            entries,
            flags,
        });
    }
    manifests
}

/// Assign the artifact representation of every rule.
pub fn assign_emit_types(arena: &mut [ComponentNode]) {
    for position in 0..arena.len() {
        let rid = RuleId(position as u32);
        let node = &mut arena[position];
        node.emit_type = match node.final_class {
            Classification::Static => EmitType::ResolvedStyleBlock,
            Classification::Nondeterministic => EmitType::NondeterministicFallback,
            Classification::Deterministic => {
                if node.boundary == Some(rid) {
                    EmitType::DynamicBoundary
                } else {
                    EmitType::RuleSet
                }
            }
        };
    }
}
