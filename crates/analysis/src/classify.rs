//! Per-declaration value classification and dependency detection.
//! Spec: <https://www.w3.org/TR/css-values-4/>
//!
//! A declaration value is walked once. Dimension tokens, function calls and
//! sizing keywords contribute typed dependency edges; the declaration's
//! classification is the join over everything found. `var()` references are
//! resolved through the token table and adopt the dependencies of the chain
//! leaf.

use crate::color;
use crate::model::{Classification, DepKind};
use crate::tokens::{split_var_args, ChainOutcome, TokenResolver};
use crate::warnings::{Warning, WarningKind};

/// Functions whose percentage arguments are color channels, not sizes.
/// Extending this list changes rule classification and therefore requires a
/// binary version bump.
const OPAQUE_COLOR_FUNCTIONS: &[&str] = &[
    "rgb", "rgba", "hsl", "hsla", "hwb", "lab", "lch", "oklch", "oklab", "color", "color-mix",
    "light-dark",
];

/// Math functions subject to the mixed-operand rule.
const MATH_FUNCTIONS: &[&str] = &["calc", "min", "max", "clamp"];

/// Keywords that resolve against the element's intrinsic content size.
const INTRINSIC_KEYWORDS: &[&str] = &["min-content", "max-content", "fit-content", "stretch"];

const VIEWPORT_UNITS: &[&str] = &[
    "vw", "vh", "vi", "vb", "vmin", "vmax", "svw", "svh", "svi", "svb", "svmin", "svmax", "lvw",
    "lvh", "lvi", "lvb", "lvmin", "lvmax", "dvw", "dvh", "dvi", "dvb", "dvmin", "dvmax",
];

const FONT_UNITS: &[&str] = &[
    "em", "rem", "ex", "rex", "ch", "rch", "cap", "rcap", "ic", "ric", "lh", "rlh",
];

const CONTAINER_UNITS: &[&str] = &["cqw", "cqh", "cqi", "cqb", "cqmin", "cqmax"];

/// Structural pseudo-classes that force a rule nondeterministic.
const STRUCTURAL_PSEUDOS: &[&str] = &[
    ":nth-child",
    ":nth-last-child",
    ":nth-of-type",
    ":nth-last-of-type",
    ":first-child",
    ":last-child",
    ":only-child",
    ":has",
    ":empty",
];

/// Result of classifying one declaration.
#[derive(Clone, Debug)]
pub struct ValueOutcome {
    pub classification: Classification,
    /// Dependency kind plus diagnostic expression; the owning property is
    /// attached by the caller.
    pub deps: Vec<(DepKind, String)>,
    pub normalized: String,
    pub warnings: Vec<Warning>,
    /// Set when the declaration names a portal destination.
    pub portal_target: Option<String>,
    /// Set when the declaration establishes a container boundary.
    pub container_boundary: bool,
}

/// First structural pseudo-class found in a selector, if any.
pub fn structural_pseudo(selector: &str) -> Option<&'static str> {
    STRUCTURAL_PSEUDOS
        .iter()
        .copied()
        .find(|pseudo| selector.contains(pseudo))
}

/// Classify one declaration against the raw token table.
pub fn classify_declaration(
    property: &str,
    value: &str,
    resolver: &mut TokenResolver<'_>,
) -> ValueOutcome {
    let mut outcome = ValueOutcome {
        classification: Classification::Static,
        deps: Vec::new(),
        normalized: color::normalize_value(value),
        warnings: Vec::new(),
        portal_target: None,
        container_boundary: false,
    };

    if property.eq_ignore_ascii_case("portal_id") || property.eq_ignore_ascii_case("portal-id") {
        outcome.portal_target = Some(value.trim().to_owned());
    }
    if property == "container-type" && value.contains("size") {
        outcome.container_boundary = true;
    }

    // Custom-property definitions classify at their use sites.
    if property.starts_with("--") {
        return outcome;
    }
    // Vendor-prefixed properties are opaque strings.
    if property.starts_with("-webkit-") || property.starts_with("-moz-") || property.starts_with("-ms-")
    {
        return outcome;
    }

    let mut scan = ValueScan {
        resolver,
        property,
        deps: Vec::new(),
        warnings: Vec::new(),
        chain: Vec::new(),
    };
    scan.scan(value, false);
    outcome.deps = scan.deps;
    outcome.warnings = scan.warnings;
    outcome.classification = outcome
        .deps
        .iter()
        .fold(Classification::Static, |class, (kind, _)| {
            class.join(kind.classification())
        });
    outcome
}

/// Operand summary of a scanned span, for the mixed-operand rule.
#[derive(Clone, Copy, Debug, Default)]
struct Operands {
    absolute: bool,
    runtime: bool,
}

impl Operands {
    fn merge(&mut self, other: Operands) {
        self.absolute |= other.absolute;
        self.runtime |= other.runtime;
    }
}

struct ValueScan<'r, 'a> {
    resolver: &'r mut TokenResolver<'a>,
    property: &'r str,
    deps: Vec<(DepKind, String)>,
    warnings: Vec<Warning>,
    /// Token names whose leaf values are on the current resolution path.
    chain: Vec<String>,
}

impl ValueScan<'_, '_> {
    fn push_dep(&mut self, kind: DepKind, expression: String) {
        self.deps.push((kind, expression));
    }

    /// Walk one text span. `opaque` is true inside an opaque color function,
    /// where percentages are channels rather than size dependencies.
    fn scan(&mut self, text: &str, opaque: bool) -> Operands {
        let bytes = text.as_bytes();
        let mut ops = Operands::default();
        let mut index = 0;
        while index < bytes.len() {
            let byte = bytes[index];
            match byte {
                b'"' | b'\'' => index = skip_string(bytes, index),
                b'#' => index = skip_hex(bytes, index),
                _ if starts_number(bytes, index) => {
                    let (number_ops, next) = self.consume_dimension(text, index, opaque);
                    ops.merge(number_ops);
                    index = next;
                }
                _ if starts_ident(byte) => {
                    let (ident_ops, next) = self.consume_ident(text, index, opaque);
                    ops.merge(ident_ops);
                    index = next;
                }
                _ => index += 1,
            }
        }
        ops
    }

    /// Consume a number plus optional unit starting at `index`.
    fn consume_dimension(&mut self, text: &str, index: usize, opaque: bool) -> (Operands, usize) {
        let bytes = text.as_bytes();
        let start = index;
        let mut cursor = index;
        if matches!(bytes[cursor], b'+' | b'-') {
            cursor += 1;
        }
        while cursor < bytes.len() && (bytes[cursor].is_ascii_digit() || bytes[cursor] == b'.') {
            cursor += 1;
        }
        let unit_start = cursor;
        if cursor < bytes.len() && bytes[cursor] == b'%' {
            cursor += 1;
        } else {
            while cursor < bytes.len() && bytes[cursor].is_ascii_alphabetic() {
                cursor += 1;
            }
        }
        let token = &text[start..cursor];
        let unit = text[unit_start..cursor].to_ascii_lowercase();

        let mut ops = Operands::default();
        match unit.as_str() {
            "%" => {
                if opaque {
                    // Color channel percentage; contributes nothing.
                } else {
                    self.push_dep(DepKind::ParentSize, token.to_owned());
                    ops.runtime = true;
                }
            }
            unit if VIEWPORT_UNITS.contains(&unit) => {
                self.push_dep(DepKind::Viewport, token.to_owned());
                ops.runtime = true;
            }
            unit if FONT_UNITS.contains(&unit) => {
                self.push_dep(DepKind::FontMetrics, token.to_owned());
                ops.runtime = true;
            }
            unit if CONTAINER_UNITS.contains(&unit) => {
                self.push_dep(DepKind::ContainerSize, token.to_owned());
                ops.runtime = true;
            }
            _ => ops.absolute = true,
        }
        (ops, cursor)
    }

    /// Consume an identifier or function call starting at `index`.
    fn consume_ident(&mut self, text: &str, index: usize, opaque: bool) -> (Operands, usize) {
        let bytes = text.as_bytes();
        let mut cursor = index;
        while cursor < bytes.len() && ident_byte(bytes[cursor]) {
            cursor += 1;
        }
        let ident = text[index..cursor].to_ascii_lowercase();

        if bytes.get(cursor) == Some(&b'(') {
            let close = matching_paren(bytes, cursor);
            let inner = &text[cursor + 1..close];
            let next = (close + 1).min(text.len());
            let ops = self.enter_function(&ident, inner, opaque);
            return (ops, next);
        }

        let mut ops = Operands::default();
        if INTRINSIC_KEYWORDS.contains(&ident.as_str()) {
            self.push_dep(DepKind::IntrinsicSize, ident);
            ops.runtime = true;
        }
        (ops, cursor)
    }

    fn enter_function(&mut self, name: &str, inner: &str, opaque: bool) -> Operands {
        if name == "var" {
            return self.resolve_var(inner, opaque);
        }

        if name == "env" {
            // Environment names are not lengths and the fallback is only
            // consulted by the runtime; neither contributes operands.
            self.push_dep(DepKind::Env, format!("env({inner})"));
            return Operands {
                absolute: false,
                runtime: true,
            };
        }

        let mut ops = Operands::default();
        if INTRINSIC_KEYWORDS.contains(&name) {
            // fit-content(...) in its functional form.
            self.push_dep(DepKind::IntrinsicSize, format!("{name}({inner})"));
            ops.runtime = true;
        }

        let inner_opaque = opaque || OPAQUE_COLOR_FUNCTIONS.contains(&name);
        let inner_ops = self.scan(inner, inner_opaque);
        if MATH_FUNCTIONS.contains(&name) && inner_ops.absolute && inner_ops.runtime {
            let mut warning = Warning::new(
                WarningKind::MixedOperands,
                format!("{name}() on {} mixes absolute and runtime operands", self.property),
            );
            warning.property = Some(self.property.to_owned());
            self.warnings.push(warning);
        }
        ops.merge(inner_ops);
        ops
    }

    /// Handle one `var(...)` reference: always a theme edge, plus whatever
    /// the resolved chain contributes.
    fn resolve_var(&mut self, args: &str, opaque: bool) -> Operands {
        let (name, fallback) = split_var_args(args);
        if !name.starts_with("--") {
            // Not a custom-property reference; classify the fallback if any.
            return match fallback {
                Some(text) => self.scan(&text, opaque),
                None => Operands::default(),
            };
        }
        self.push_dep(DepKind::Theme, format!("var({name})"));

        match self.resolver.walk_chain(&name, fallback.as_deref()) {
            ChainOutcome::Cycle => {
                self.resolver.report_cycle(&name, &mut self.warnings);
                // The cycle collapses to an opaque static value.
                Operands {
                    absolute: true,
                    runtime: false,
                }
            }
            ChainOutcome::Missing { missing, fallback } => {
                if missing == name && fallback.is_none() {
                    let mut warning = Warning::new(
                        WarningKind::UndefinedToken,
                        format!("var({name}) references a token that is never defined"),
                    );
                    warning.token_name = Some(name);
                    self.warnings.push(warning);
                    return Operands::default();
                }
                self.resolver
                    .report_unresolved(&name, &missing, &mut self.warnings);
                match fallback {
                    Some(text) => self.scan(&text, opaque),
                    None => Operands::default(),
                }
            }
            ChainOutcome::Leaf { name: leaf, value } => {
                if self.chain.contains(&leaf) {
                    self.resolver.report_cycle(&name, &mut self.warnings);
                    return Operands {
                        absolute: true,
                        runtime: false,
                    };
                }
                self.chain.push(leaf);
                let adopted_from = self.deps.len();
                let mut ops = self.scan(&value, opaque);
                // Adopted dependencies are attributed to the reference, not
                // to the leaf's own text.
                let sentinel = format!("var({name})");
                for dep in &mut self.deps[adopted_from..] {
                    dep.1 = sentinel.clone();
                }
                self.chain.pop();
                if !ops.runtime {
                    // An absolute leaf counts as an absolute operand even if
                    // it is not a dimension (keywords, colors).
                    ops.absolute = true;
                }
                ops
            }
        }
    }
}

#[inline]
fn ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

#[inline]
fn starts_ident(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

/// True when a number token starts at `index`. A sign only starts a number
/// when a digit or dot follows.
fn starts_number(bytes: &[u8], index: usize) -> bool {
    match bytes[index] {
        b'0'..=b'9' => true,
        b'.' => bytes
            .get(index + 1)
            .is_some_and(|next| next.is_ascii_digit()),
        b'+' | b'-' => bytes
            .get(index + 1)
            .is_some_and(|next| next.is_ascii_digit() || *next == b'.'),
        _ => false,
    }
}

/// Skip a quoted string starting at `index`; returns the index after the
/// closing quote (or end of input).
fn skip_string(bytes: &[u8], index: usize) -> usize {
    let quote = bytes[index];
    let mut cursor = index + 1;
    while cursor < bytes.len() {
        match bytes[cursor] {
            b'\\' => cursor += 2,
            byte if byte == quote => return cursor + 1,
            _ => cursor += 1,
        }
    }
    bytes.len()
}

/// Skip a hex color literal starting at `#`.
fn skip_hex(bytes: &[u8], index: usize) -> usize {
    let mut cursor = index + 1;
    while cursor < bytes.len() && bytes[cursor].is_ascii_alphanumeric() {
        cursor += 1;
    }
    cursor
}

/// Index of the `)` matching the `(` at `open`, respecting nesting and
/// strings. Returns the input length when unbalanced, so the unterminated
/// call swallows the rest of the value.
fn matching_paren(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0u32;
    let mut cursor = open;
    while cursor < bytes.len() {
        match bytes[cursor] {
            b'"' | b'\'' => {
                cursor = skip_string(bytes, cursor);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return cursor;
                }
            }
            _ => {}
        }
        cursor += 1;
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::RawTokenTable;

    fn classify(property: &str, value: &str) -> ValueOutcome {
        let table = RawTokenTable::new();
        let mut resolver = TokenResolver::new(&table);
        classify_declaration(property, value, &mut resolver)
    }

    fn classify_with(property: &str, value: &str, entries: &[(&str, &str)]) -> ValueOutcome {
        let table: RawTokenTable = entries
            .iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect();
        let mut resolver = TokenResolver::new(&table);
        classify_declaration(property, value, &mut resolver)
    }

    fn kinds(outcome: &ValueOutcome) -> Vec<DepKind> {
        outcome.deps.iter().map(|(kind, _)| *kind).collect()
    }

    #[test]
    fn absolute_values_are_static() {
        let outcome = classify("padding", "8px 16px");
        assert_eq!(outcome.classification, Classification::Static);
        assert!(outcome.deps.is_empty());
    }

    #[test]
    fn percentage_is_a_parent_size_dependency() {
        let outcome = classify("width", "100%");
        assert_eq!(outcome.classification, Classification::Deterministic);
        assert_eq!(kinds(&outcome), vec![DepKind::ParentSize]);
        assert_eq!(outcome.deps[0].1, "100%");
    }

    #[test]
    fn viewport_and_font_units_are_detected() {
        assert_eq!(kinds(&classify("width", "30vw")), vec![DepKind::Viewport]);
        assert_eq!(kinds(&classify("width", "4dvh")), vec![DepKind::Viewport]);
        assert_eq!(kinds(&classify("margin", "1.5rem")), vec![DepKind::FontMetrics]);
        assert_eq!(kinds(&classify("width", "10ch")), vec![DepKind::FontMetrics]);
    }

    #[test]
    fn container_units_are_detected() {
        assert_eq!(
            kinds(&classify("font-size", "2cqw")),
            vec![DepKind::ContainerSize]
        );
    }

    #[test]
    fn intrinsic_keywords_are_detected() {
        assert_eq!(
            kinds(&classify("width", "max-content")),
            vec![DepKind::IntrinsicSize]
        );
        assert_eq!(
            kinds(&classify("width", "fit-content(200px)")),
            vec![DepKind::IntrinsicSize]
        );
    }

    #[test]
    fn env_function_is_detected() {
        let outcome = classify("padding-top", "env(safe-area-inset-top)");
        assert_eq!(kinds(&outcome), vec![DepKind::Env]);
    }

    #[test]
    fn color_function_percentages_are_suppressed() {
        let outcome = classify("color", "rgb(50% 20% 10%)");
        assert!(outcome.deps.is_empty());
        let outcome = classify("color", "color-mix(in srgb, red 50%, blue)");
        assert!(outcome.deps.is_empty());
    }

    #[test]
    fn gradient_percentages_still_count() {
        let outcome = classify("background", "linear-gradient(red, blue 50%)");
        assert_eq!(kinds(&outcome), vec![DepKind::ParentSize]);
    }

    #[test]
    fn all_absolute_math_is_static() {
        let outcome = classify("width", "max(200px, 400px)");
        assert_eq!(outcome.classification, Classification::Static);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn mixed_operand_math_is_dynamic_with_warning() {
        let outcome = classify("width", "max(200px, 50%)");
        assert_eq!(outcome.classification, Classification::Deterministic);
        assert_eq!(kinds(&outcome), vec![DepKind::ParentSize]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::MixedOperands);
    }

    #[test]
    fn container_units_in_math_dominate() {
        let outcome = classify("font-size", "max(14px, 2cqw)");
        assert_eq!(kinds(&outcome), vec![DepKind::ContainerSize]);
        assert_eq!(outcome.classification, Classification::Deterministic);
    }

    #[test]
    fn vendor_prefixed_properties_are_opaque() {
        let outcome = classify("-webkit-mask-size", "50% 50%");
        assert_eq!(outcome.classification, Classification::Static);
        assert!(outcome.deps.is_empty());
    }

    #[test]
    fn var_always_adds_a_theme_dependency() {
        let outcome = classify_with("color", "var(--c)", &[("--c", "#2563EB")]);
        assert_eq!(kinds(&outcome), vec![DepKind::Theme]);
        assert_eq!(outcome.classification, Classification::Static);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn var_adopts_leaf_dependencies_with_sentinel_expression() {
        let outcome = classify_with("width", "var(--w)", &[("--w", "50%")]);
        assert_eq!(
            kinds(&outcome),
            vec![DepKind::Theme, DepKind::ParentSize]
        );
        assert_eq!(outcome.deps[1].1, "var(--w)");
        assert_eq!(outcome.classification, Classification::Deterministic);
    }

    #[test]
    fn undefined_var_without_fallback_warns() {
        let outcome = classify("color", "var(--missing)");
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::UndefinedToken);
        assert_eq!(outcome.classification, Classification::Static);
    }

    #[test]
    fn missing_var_with_absolute_fallback_is_static() {
        let outcome = classify("width", "var(--u, 16px)");
        assert_eq!(outcome.classification, Classification::Static);
        assert_eq!(outcome.warnings[0].kind, WarningKind::UnresolvedToken);
    }

    #[test]
    fn missing_var_with_runtime_fallback_is_dynamic() {
        let outcome = classify("width", "var(--u, 1rem)");
        assert_eq!(outcome.classification, Classification::Deterministic);
        assert!(kinds(&outcome).contains(&DepKind::FontMetrics));
    }

    #[test]
    fn token_cycles_fall_back_to_static() {
        let outcome = classify_with(
            "color",
            "var(--a)",
            &[("--a", "var(--b)"), ("--b", "var(--a)")],
        );
        assert_eq!(outcome.classification, Classification::Static);
        assert_eq!(outcome.warnings[0].kind, WarningKind::TokenCycle);
    }

    #[test]
    fn indirect_cycles_through_math_are_broken() {
        let outcome = classify_with(
            "width",
            "var(--a)",
            &[("--a", "calc(var(--b) + 1px)"), ("--b", "var(--a)")],
        );
        assert_eq!(outcome.classification, Classification::Static);
        assert!(outcome
            .warnings
            .iter()
            .any(|warning| warning.kind == WarningKind::TokenCycle));
    }

    #[test]
    fn portal_and_container_signals() {
        let outcome = classify("portal_id", "root");
        assert_eq!(outcome.portal_target.as_deref(), Some("root"));
        let outcome = classify("container-type", "inline-size");
        assert!(outcome.container_boundary);
        let outcome = classify("container-type", "normal");
        assert!(!outcome.container_boundary);
    }

    #[test]
    fn structural_pseudo_detection() {
        assert_eq!(structural_pseudo("tr:nth-child(even)"), Some(":nth-child"));
        assert_eq!(structural_pseudo(".a:has(> img)"), Some(":has"));
        assert_eq!(structural_pseudo(".a:hover"), None);
    }
}
