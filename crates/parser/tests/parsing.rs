use som_parser::{parse_stylesheet, selector};

#[test]
fn selector_lists_split_only_at_top_level() {
    let _ = env_logger::builder().is_test(true).try_init();
    let sheet = parse_stylesheet(":is(.a, .b), .c { color: red; }");
    assert_eq!(sheet.rules.len(), 1);
    assert_eq!(sheet.rules[0].selectors, vec![":is(.a, .b)", ".c"]);
}

#[test]
fn attribute_commas_do_not_split_selector_lists() {
    let sheet = parse_stylesheet("[data-tags=\"a,b\"] { color: red; }");
    assert_eq!(sheet.rules[0].selectors, vec!["[data-tags=\"a,b\"]"]);
}

#[test]
fn comments_inside_values_are_removed() {
    let sheet = parse_stylesheet(".a { width: /* half */ 50%; }");
    assert_eq!(sheet.rules[0].declarations[0].value, "50%");
}

#[test]
fn deep_nesting_expands_through_every_level() {
    let sheet = parse_stylesheet(".a { color: red; .b { color: blue; &:hover { color: green; } } }");
    let selectors: Vec<&str> = sheet
        .rules
        .iter()
        .flat_map(|rule| rule.selectors.iter().map(String::as_str))
        .collect();
    assert_eq!(selectors, vec![".a", ".a .b", ".a .b:hover"]);
}

#[test]
fn media_wrapped_nested_rules_carry_the_condition() {
    let sheet = parse_stylesheet(
        "@media (min-width: 600px) { .a { color: red; .b { color: blue; } } }",
    );
    assert_eq!(sheet.rules.len(), 2);
    for rule in &sheet.rules {
        assert_eq!(rule.media_query.as_deref(), Some("(min-width: 600px)"));
    }
}

#[test]
fn import_statements_are_discarded() {
    let sheet = parse_stylesheet("@import url(\"theme.css\"); .a { color: red; }");
    assert_eq!(sheet.rules.len(), 1);
}

#[test]
fn font_face_blocks_do_not_produce_rules() {
    let sheet = parse_stylesheet("@font-face { font-family: X; src: url(x.woff2); }");
    assert!(sheet.rules.is_empty());
}

#[test]
fn duplicate_properties_are_preserved_in_parse_order() {
    let sheet = parse_stylesheet(".a { color: red; color: blue; }");
    let decls = &sheet.rules[0].declarations;
    assert_eq!(decls.len(), 2);
    assert_eq!(decls[0].value, "red");
    assert_eq!(decls[1].value, "blue");
}

#[test]
fn normalization_makes_spellings_canonical() {
    assert_eq!(selector::normalize(".nav>.item"), ".nav > .item");
    assert_eq!(selector::normalize(".nav\n   .item"), ".nav .item");
}
