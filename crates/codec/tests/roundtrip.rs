use som_analysis::analyze;
use som_analysis::hash::selector_hash;
use som_codec::{emit, CodecError, CompiledStyles, DynamicRecord};
use som_parser::parse_stylesheet;
use std::rc::Rc;

fn compile(css: &str) -> Vec<u8> {
    let _ = env_logger::builder().is_test(true).try_init();
    let sheet = parse_stylesheet(css);
    let analysis = analyze(&sheet.rules, &sheet.raw_tokens);
    emit(&analysis)
}

#[test]
fn empty_input_produces_a_valid_minimum_binary() {
    let bytes = compile("");
    let loader = CompiledStyles::load(&bytes).unwrap();
    let stats = loader.stats();
    assert_eq!(stats.static_count, 0);
    assert_eq!(stats.dynamic_indexed, 0);
    // Only the seed vocabulary lives in the pool.
    assert!(stats.pool_entries >= 60);
    assert_eq!(stats.file_size, bytes.len());
}

#[test]
fn static_rules_round_trip_through_the_loader() {
    let bytes = compile(".btn { color: #fff; padding: 8px 16px; }");
    let loader = CompiledStyles::load(&bytes).unwrap();

    let record = loader.get_static(".btn").expect("static record");
    assert_eq!(record.selector_hash, selector_hash(".btn"));
    assert_eq!(loader.resolve_string(record.selector_ref), Some(".btn"));

    let mut pairs: Vec<(&str, &str)> = record
        .properties
        .iter()
        .map(|&(name, value)| {
            (
                loader.resolve_string(name).unwrap(),
                loader.resolve_string(value).unwrap(),
            )
        })
        .collect();
    pairs.sort_unstable();
    assert_eq!(pairs, vec![("color", "#FFFFFFFF"), ("padding", "8px 16px")]);
}

#[test]
fn boundary_records_carry_deps_and_subgraph() {
    let bytes = compile(
        ".layout { width: 100%; } .layout .panel { color: blue; }",
    );
    let loader = CompiledStyles::load(&bytes).unwrap();

    let record = loader.get_dynamic(".layout").unwrap().expect("boundary");
    let DynamicRecord::Boundary(boundary) = record.as_ref() else {
        panic!("expected a boundary record");
    };
    assert_eq!(boundary.selector_hash, selector_hash(".layout"));
    assert_eq!(
        boundary.subgraph,
        vec![selector_hash(".layout"), selector_hash(".layout .panel")]
    );
    assert_eq!(boundary.deps.len(), 1);
    assert_eq!(
        loader.resolve_string(boundary.deps[0].property_ref),
        Some("width")
    );

    // The member rule sets follow the marker and reference the boundary.
    let rule_sets: Vec<_> = loader
        .iter_dynamic_records()
        .map(Result::unwrap)
        .filter_map(|record| match record {
            DynamicRecord::RuleSet(rule_set) => Some(rule_set),
            _ => None,
        })
        .collect();
    assert_eq!(rule_sets.len(), 2);
    for rule_set in &rule_sets {
        assert_eq!(rule_set.boundary_hash, selector_hash(".layout"));
    }
}

#[test]
fn rule_sets_are_not_reachable_through_the_index() {
    let bytes = compile(".layout { width: 100%; } .layout .panel { color: blue; }");
    let loader = CompiledStyles::load(&bytes).unwrap();
    assert!(loader.get_dynamic(".layout .panel").unwrap().is_none());
}

#[test]
fn nondeterministic_records_are_indexed() {
    let bytes = compile(".table tr:nth-child(even) { background: #f8fafc; }");
    let loader = CompiledStyles::load(&bytes).unwrap();
    let record = loader
        .get_dynamic(".table tr:nth-child(even)")
        .unwrap()
        .expect("nondeterministic record");
    let DynamicRecord::Nondeterministic(marker) = record.as_ref() else {
        panic!("expected a nondeterministic record");
    };
    assert_eq!(
        loader.resolve_string(marker.selector_ref),
        Some(".table tr:nth-child(even)")
    );
    assert!(loader.get_static(".table tr:nth-child(even)").is_none());
}

#[test]
fn custom_property_rules_emit_empty_static_blocks() {
    let bytes = compile(":root { --c: #2563EB; --pad: 8px; }");
    let loader = CompiledStyles::load(&bytes).unwrap();
    let record = loader.get_static(":root").expect(":root record");
    assert!(record.properties.is_empty());
}

#[test]
fn repeated_lookups_return_identity_equal_records() {
    let bytes = compile(".layout { width: 100%; }");
    let loader = CompiledStyles::load(&bytes).unwrap();
    let first = loader.get_dynamic(".layout").unwrap().unwrap();
    let second = loader.get_dynamic(".layout").unwrap().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn source_order_does_not_change_the_bytes() {
    let forward = compile(".a { color: red; } .b { width: 50%; } .c { height: 2rem; }");
    let reversed = compile(".c { height: 2rem; } .b { width: 50%; } .a { color: red; }");
    assert_eq!(forward, reversed);
}

#[test]
fn bad_file_magic_is_rejected() {
    let mut bytes = compile(".a { color: red; }");
    bytes[0] = b'X';
    assert!(matches!(
        CompiledStyles::load(&bytes),
        Err(CodecError::InvalidMagic { section: "file", .. })
    ));
}

#[test]
fn unsupported_version_is_rejected() {
    let mut bytes = compile(".a { color: red; }");
    bytes[4] = 9;
    assert!(matches!(
        CompiledStyles::load(&bytes),
        Err(CodecError::UnsupportedVersion { section: "file", found: 9 })
    ));
}

#[test]
fn truncated_files_never_load() {
    // Cuts inside the header, pool and static tier. The dynamic tier itself
    // is lazily parsed, so truncation there surfaces on first record touch
    // instead of at load time.
    let bytes = compile(".a { color: red; } .b { width: 50%; }");
    for cut in [4usize, 15, 40, 120] {
        assert!(
            CompiledStyles::load(&bytes[..cut]).is_err(),
            "cut at {cut} should fail"
        );
    }
}

#[test]
fn container_hash_points_at_the_container_selector() {
    let bytes = compile(
        ".card { container-type: inline-size; width: 100%; } \
         .card .title { font-size: max(14px, 2cqw); }",
    );
    let loader = CompiledStyles::load(&bytes).unwrap();
    let record = loader.get_dynamic(".card").unwrap().expect("boundary");
    let DynamicRecord::Boundary(boundary) = record.as_ref() else {
        panic!("expected a boundary record");
    };
    let container_dep = boundary
        .deps
        .iter()
        .find(|dep| dep.container_hash != 0)
        .expect("container-size dep");
    assert_eq!(container_dep.container_hash, selector_hash(".card"));
}
