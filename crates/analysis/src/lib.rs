//! Static analysis of parsed stylesheet rules.
//!
//! Builds the rule arena from parsed rules, classifies every declaration,
//! resolves token chains, wires the rule graph, propagates contamination and
//! assembles boundary manifests. All passes are synchronous and side-effect
//! free; two runs over semantically equal inputs produce identical arenas.

#![forbid(unsafe_code)]

pub mod classify;
pub mod color;
pub mod contamination;
pub mod graph;
pub mod hash;
pub mod media;
pub mod model;
pub mod tokens;
pub mod warnings;

use crate::model::{ComponentNode, DepEntry, RuleId};
use crate::tokens::{RawTokenTable, TokenResolver, TokenTable};
use crate::warnings::Warning;
use log::info;
use som_parser::{selector, RawRule};
use std::collections::HashMap;

pub use crate::model::{BoundaryManifest, Classification, DepKind, EmitType, ManifestFlags};

/// Result of analyzing one rule set.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// Rule arena; `RuleId` values index into it.
    pub rules: Vec<ComponentNode>,
    /// Selector text to arena index.
    pub index: HashMap<String, RuleId>,
    /// One manifest per deterministic boundary, in source order.
    pub manifests: Vec<BoundaryManifest>,
    /// Flattened token table.
    pub tokens: TokenTable,
}

impl Analysis {
    pub fn rule(&self, id: RuleId) -> &ComponentNode {
        &self.rules[id.index()]
    }

    /// Look up a rule by its normalized selector text.
    pub fn find(&self, selector: &str) -> Option<&ComponentNode> {
        self.index.get(selector).map(|&id| self.rule(id))
    }

    /// All warnings, in arena order then per-rule attachment order.
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.rules.iter().flat_map(|node| node.warnings.iter())
    }
}

/// Analyze parsed rules against a raw token table.
pub fn analyze(parsed: &[RawRule], raw_tokens: &RawTokenTable) -> Analysis {
    let (mut arena, index) = build_arena(parsed);
    info!("analyzing {} rules", arena.len());

    classify_rules(&mut arena, raw_tokens);
    graph::build(&mut arena, &index);
    contamination::propagate(&mut arena);
    contamination::assign_boundaries(&mut arena);
    let manifests = contamination::build_manifests(&arena);
    contamination::assign_emit_types(&mut arena);

    Analysis {
        rules: arena,
        index,
        manifests,
        tokens: tokens::flatten(raw_tokens),
    }
}

/// Create one arena entry per unique normalized selector, merging
/// declarations last-write-wins and accumulating distinct media conditions.
fn build_arena(parsed: &[RawRule]) -> (Vec<ComponentNode>, HashMap<String, RuleId>) {
    let mut arena: Vec<ComponentNode> = Vec::new();
    let mut index: HashMap<String, RuleId> = HashMap::new();
    let mut stem_counts: HashMap<String, u32> = HashMap::new();
    let mut order: u32 = 0;

    for rule in parsed {
        for sel in &rule.selectors {
            let rid = match index.get(sel) {
                Some(&existing) => existing,
                None => {
                    let stem = selector::id_stem(&selector::rightmost_compound(sel));
                    let count = stem_counts.entry(stem.clone()).or_insert(0);
                    *count += 1;
                    let id = if *count == 1 {
                        stem
                    } else {
                        format!("{stem}_{count}")
                    };
                    let rid = RuleId(arena.len() as u32);
                    arena.push(ComponentNode::new(id, sel.clone(), order));
                    index.insert(sel.clone(), rid);
                    rid
                }
            };
            order = order.saturating_add(1);

            let node = &mut arena[rid.index()];
            for declaration in &rule.declarations {
                node.declarations
                    .insert(declaration.name.clone(), declaration.value.clone());
            }
            if let Some(query) = &rule.media_query {
                if !node.media_queries.contains(query) {
                    node.media_queries.push(query.clone());
                }
            }
        }
    }
    (arena, index)
}

/// Classify every declaration, attach structural and media-derived deps and
/// settle each rule's local class.
fn classify_rules(arena: &mut [ComponentNode], raw_tokens: &RawTokenTable) {
    let mut resolver = TokenResolver::new(raw_tokens);
    for position in 0..arena.len() {
        let rid = RuleId(position as u32);
        let declarations: Vec<(String, String)> = arena[position]
            .declarations
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        for (name, value) in declarations {
            let outcome = classify::classify_declaration(&name, &value, &mut resolver);
            let node = &mut arena[position];
            node.normalized_declarations
                .insert(name.clone(), outcome.normalized);
            if let Some(target) = outcome.portal_target {
                node.portal_target_raw = Some(target);
            }
            if outcome.container_boundary {
                node.is_container_boundary = true;
            }
            for (kind, expression) in outcome.deps {
                node.add_dep(DepEntry::new(rid, &name, kind, &expression));
            }
            for mut warning in outcome.warnings {
                warning.node = Some(rid);
                if warning.property.is_none() {
                    warning.property = Some(name.clone());
                }
                node.warnings.push(warning);
            }
            node.local_class = node.local_class.join(outcome.classification);
        }

        attach_structural_dep(&mut arena[position], rid);
        attach_media_deps(&mut arena[position], rid);
    }
}

fn attach_structural_dep(node: &mut ComponentNode, rid: RuleId) {
    let Some(pseudo) = classify::structural_pseudo(&node.selector) else {
        return;
    };
    let dep = DepEntry::new(
        rid,
        model::SELECTOR_PROPERTY,
        DepKind::Structure,
        &node.selector,
    );
    node.add_dep(dep);
    let mut warning = Warning::new(
        warnings::WarningKind::StructuralDynamic,
        format!("selector {} uses structural pseudo-class {pseudo}", node.selector),
    );
    warning.node = Some(rid);
    node.warnings.push(warning);
    node.local_class = node.local_class.join(Classification::Nondeterministic);
}

fn attach_media_deps(node: &mut ComponentNode, rid: RuleId) {
    let queries = node.media_queries.clone();
    for query in queries {
        for (kind, property, expression) in media::synthesize(&query) {
            node.add_dep(DepEntry::new(rid, &property, kind, &expression));
            node.local_class = node.local_class.join(kind.classification());
        }
    }
}
