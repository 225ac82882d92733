//! Textual fallback emitters.
//!
//! Nondeterministic rules cannot be captured statically; they are carried as
//! stylesheet text plus a hash-to-selector map so the runtime can inject and
//! address them.

use som_analysis::hash::selector_hash;
use som_analysis::model::{ComponentNode, EmitType};
use som_analysis::Analysis;

/// Nondeterministic rules ordered by selector hash ascending, ties broken by
/// the selector's lexicographic order.
fn nondeterministic_rules(analysis: &Analysis) -> Vec<&ComponentNode> {
    let mut rules: Vec<&ComponentNode> = analysis
        .rules
        .iter()
        .filter(|node| node.emit_type == EmitType::NondeterministicFallback)
        .collect();
    rules.sort_by(|a, b| {
        (selector_hash(&a.selector), a.selector.as_bytes())
            .cmp(&(selector_hash(&b.selector), b.selector.as_bytes()))
    });
    rules
}

/// Emit the fallback stylesheet text. Declarations appear in insertion order
/// after merge, exactly as originally parsed.
pub fn emit_text(analysis: &Analysis) -> String {
    let mut out = String::new();
    for node in nondeterministic_rules(analysis) {
        out.push_str(&node.selector);
        out.push_str(" {\n");
        for (name, value) in &node.declarations {
            out.push_str("  ");
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(";\n");
        }
        out.push_str("}\n");
    }
    out
}

/// Emit the fallback map: `0x<hex-hash>` to original selector, one entry per
/// nondeterministic rule, in the same order as the text.
pub fn emit_map(analysis: &Analysis) -> Vec<(String, String)> {
    nondeterministic_rules(analysis)
        .into_iter()
        .map(|node| {
            (
                format!("0x{:x}", selector_hash(&node.selector)),
                node.selector.clone(),
            )
        })
        .collect()
}
