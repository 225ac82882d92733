//! Quantified invariants checked over a mixed corpus.

use som::{CompileOptions, Classification, DepKind, Source};
use som_analysis::hash::selector_hash;
use som_codec::{emit, CompiledStyles, DynamicRecord};

const CORPUS: &str = r#"
:root { --accent: #2563EB; --pad: var(--accent); }
.btn { color: var(--accent); padding: 8px 16px; }
.layout { width: 100%; }
.layout .panel { color: blue; }
.layout .panel .label { font-size: 0.9rem; }
.sidebar { width: 30vw; }
.sidebar .modal { portal_id: overlay; background: #fff; }
.overlay { display: block; }
.card { container-type: inline-size; width: 50%; }
.card .title { font-size: max(14px, 2cqw); }
.table tr:nth-child(even) { background: #f8fafc; }
.list li:last-child { border: none; }
@media (min-width: 600px) { .responsive { padding: 2vh; } }
@media (prefers-reduced-motion) { .animated { transition: none; } }
.pile { width: min(100px, 200px); height: max-content; }
"#;

fn corpus_analysis() -> som::Analysis {
    let _ = env_logger::builder().is_test(true).try_init();
    let sources = [Source::new("corpus.css", CORPUS)];
    som::analyze_sources(&sources, &CompileOptions::default())
}

#[test]
fn static_rules_carry_no_runtime_dependencies() {
    let analysis = corpus_analysis();
    for node in &analysis.rules {
        if node.final_class != Classification::Static {
            continue;
        }
        for dep in &node.deps {
            assert_eq!(
                dep.kind,
                DepKind::Theme,
                "{} is static but depends on {:?}",
                node.selector,
                dep.kind
            );
        }
        assert!(node.boundary.is_none(), "{} is static with a boundary", node.selector);
    }
}

#[test]
fn dynamic_rules_have_exactly_one_boundary() {
    let analysis = corpus_analysis();
    for node in &analysis.rules {
        assert_eq!(
            node.boundary.is_some(),
            node.final_class.is_dynamic(),
            "{} boundary presence disagrees with its class",
            node.selector
        );
    }
    for (position, node) in analysis.rules.iter().enumerate() {
        let rid = som_analysis::model::RuleId(position as u32);
        let memberships = analysis
            .manifests
            .iter()
            .filter(|manifest| manifest.subgraph.contains(&rid))
            .count();
        assert!(
            memberships <= 1,
            "{} appears in {memberships} subgraphs",
            node.selector
        );
    }
}

#[test]
fn portal_rules_never_join_a_tree_ancestor_subgraph() {
    let analysis = corpus_analysis();
    for (position, node) in analysis.rules.iter().enumerate() {
        if !node.declares_portal() {
            continue;
        }
        let rid = som_analysis::model::RuleId(position as u32);
        let mut ancestor = node.tree_parent;
        while let Some(current) = ancestor {
            if let Some(manifest) = analysis
                .manifests
                .iter()
                .find(|manifest| manifest.boundary == current)
            {
                assert!(
                    !manifest.subgraph.contains(&rid),
                    "{} leaked into a tree ancestor subgraph",
                    node.selector
                );
            }
            ancestor = analysis.rule(current).tree_parent;
        }
    }
}

#[test]
fn every_rule_is_reachable_in_the_artifact() {
    let analysis = corpus_analysis();
    let bytes = emit(&analysis);
    let loader = CompiledStyles::load(&bytes).unwrap();

    let mut rule_set_hashes: Vec<u32> = loader
        .iter_dynamic_records()
        .map(Result::unwrap)
        .filter_map(|record| match record {
            DynamicRecord::RuleSet(rule_set) => Some(rule_set.selector_hash),
            _ => None,
        })
        .collect();
    rule_set_hashes.sort_unstable();

    for node in &analysis.rules {
        let hash = selector_hash(&node.selector);
        match node.final_class {
            Classification::Static => {
                assert!(loader.get_static_by_hash(hash).is_some(), "{}", node.selector);
            }
            Classification::Deterministic => {
                let indexed = loader.get_dynamic_by_hash(hash).unwrap().is_some();
                let in_tier = rule_set_hashes.binary_search(&hash).is_ok();
                assert!(
                    indexed || in_tier,
                    "{} unreachable in the dynamic tier",
                    node.selector
                );
            }
            Classification::Nondeterministic => {
                let record = loader.get_dynamic_by_hash(hash).unwrap();
                assert!(
                    matches!(
                        record.as_deref(),
                        Some(DynamicRecord::Nondeterministic(_))
                    ),
                    "{} should be a nondeterministic marker",
                    node.selector
                );
            }
        }
    }
}

#[test]
fn subgraph_hashes_resolve_to_tier_records() {
    let analysis = corpus_analysis();
    let bytes = emit(&analysis);
    let loader = CompiledStyles::load(&bytes).unwrap();

    let tier_hashes: Vec<u32> = loader
        .iter_dynamic_records()
        .map(Result::unwrap)
        .map(|record| match record {
            DynamicRecord::Boundary(boundary) => boundary.selector_hash,
            DynamicRecord::RuleSet(rule_set) => rule_set.selector_hash,
            DynamicRecord::Nondeterministic(marker) => marker.selector_hash,
        })
        .collect();

    for record in loader.iter_dynamic_records().map(Result::unwrap) {
        let DynamicRecord::Boundary(boundary) = record else {
            continue;
        };
        assert!(boundary.subgraph.contains(&boundary.selector_hash));
        for hash in &boundary.subgraph {
            assert!(
                tier_hashes.contains(hash),
                "subgraph member {hash:#010x} has no tier record"
            );
        }
    }
}

#[test]
fn selector_spellings_do_not_change_hashes() {
    let analysis = corpus_analysis();
    for node in &analysis.rules {
        assert_eq!(
            selector_hash(&node.selector),
            selector_hash(node.selector.clone().as_str())
        );
    }
    assert_eq!(selector_hash(""), 0x811c_9dc5);
}
