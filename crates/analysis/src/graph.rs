//! Rule graph construction: tree parents, portal severance and the
//! container registry.

use crate::model::{ComponentNode, DepKind, RuleId};
use crate::warnings::{Warning, WarningKind};
use log::trace;
use som_parser::selector;
use std::collections::HashMap;

/// Wire up tree parents, resolve portal targets and fill in container
/// ancestors for container-size dependencies.
pub fn build(arena: &mut Vec<ComponentNode>, index: &HashMap<String, RuleId>) {
    link_tree_parents(arena, index);
    resolve_portals(arena, index);
    fill_containers(arena);
}

/// Derive each rule's tree parent by repeatedly dropping the trailing
/// compound until a known selector is found.
fn link_tree_parents(arena: &mut Vec<ComponentNode>, index: &HashMap<String, RuleId>) {
    let mut links: Vec<(usize, RuleId)> = Vec::new();
    for (position, node) in arena.iter().enumerate() {
        let mut candidate = selector::parent_selector(&node.selector);
        while let Some(parent_text) = candidate {
            if let Some(&parent) = index.get(&parent_text) {
                links.push((position, parent));
                break;
            }
            candidate = selector::parent_selector(&parent_text);
        }
    }
    for (child, parent) in links {
        arena[child].tree_parent = Some(parent);
        arena[parent.index()].tree_children.push(RuleId(child as u32));
    }
}

/// Resolve a raw portal destination against the rule set. Matches, in order:
/// rule id, selector, `.<id>`, `#<id>`, and lower-cased id-stem aliases.
fn resolve_portal_target(
    target: &str,
    index: &HashMap<String, RuleId>,
    by_id: &HashMap<String, RuleId>,
    aliases: &HashMap<String, RuleId>,
) -> Option<RuleId> {
    if let Some(&found) = by_id.get(target) {
        return Some(found);
    }
    if let Some(&found) = index.get(target) {
        return Some(found);
    }
    if let Some(&found) = index.get(&format!(".{target}")) {
        return Some(found);
    }
    if let Some(&found) = index.get(&format!("#{target}")) {
        return Some(found);
    }
    aliases.get(&target.to_ascii_lowercase()).copied()
}

/// Resolve declared portal targets and assign effective parents. A declared
/// but unresolvable portal severs the rule from its tree parent entirely.
fn resolve_portals(arena: &mut Vec<ComponentNode>, index: &HashMap<String, RuleId>) {
    let mut by_id: HashMap<String, RuleId> = HashMap::new();
    let mut aliases: HashMap<String, RuleId> = HashMap::new();
    for (position, node) in arena.iter().enumerate() {
        let rid = RuleId(position as u32);
        by_id.insert(node.id.clone(), rid);
        aliases.entry(node.id.to_ascii_lowercase()).or_insert(rid);
    }

    for position in 0..arena.len() {
        let Some(target_raw) = arena[position].portal_target_raw.clone() else {
            arena[position].effective_parent = arena[position].tree_parent;
            continue;
        };
        let resolved = resolve_portal_target(target_raw.trim(), index, &by_id, &aliases);
        match resolved {
            Some(target) => {
                trace!(
                    "portal {} -> {}",
                    arena[position].selector,
                    arena[target.index()].selector
                );
                arena[position].portal_target = Some(target);
                arena[position].effective_parent = Some(target);
            }
            None => {
                let mut warning = Warning::new(
                    WarningKind::PortalMissing,
                    format!(
                        "portal target {target_raw:?} of {} does not resolve to a rule",
                        arena[position].selector
                    ),
                );
                warning.node = Some(RuleId(position as u32));
                arena[position].warnings.push(warning);
                arena[position].effective_parent = None;
            }
        }
    }
}

/// Fill `container` on container-size dependencies by walking the
/// tree-parent chain (not the effective-parent chain) to the nearest
/// registered container.
fn fill_containers(arena: &mut Vec<ComponentNode>) {
    let mut assignments: Vec<(usize, usize, Option<RuleId>)> = Vec::new();
    for (position, node) in arena.iter().enumerate() {
        for (dep_position, dep) in node.deps.iter().enumerate() {
            if dep.kind != DepKind::ContainerSize {
                continue;
            }
            let mut ancestor = node.tree_parent;
            let mut found = None;
            while let Some(current) = ancestor {
                if arena[current.index()].is_container_boundary {
                    found = Some(current);
                    break;
                }
                ancestor = arena[current.index()].tree_parent;
            }
            assignments.push((position, dep_position, found));
        }
    }
    for (position, dep_position, found) in assignments {
        if found.is_none() {
            let property = arena[position].deps[dep_position].property.clone();
            let mut warning = Warning::new(
                WarningKind::MissingContainer,
                format!(
                    "{} uses container units on {property} with no container ancestor",
                    arena[position].selector
                ),
            );
            warning.node = Some(RuleId(position as u32));
            warning.property = Some(property);
            arena[position].warnings.push(warning);
        }
        arena[position].deps[dep_position].container = found;
    }
}
