//! Top-level rule extraction, at-rule scoping and native-nesting expansion.
//! Spec: <https://www.w3.org/TR/css-syntax-3/#parsing>
//! Spec: <https://www.w3.org/TR/css-nesting-1/>

use crate::decl::{self, Declaration};
use crate::scanner;
use crate::selector;
use crate::RawRule;
use log::trace;

/// Walk the contents of the stylesheet (or of a transparent at-rule block)
/// and append extracted rules to `out`.
pub(crate) fn parse_sheet_contents(text: &str, media: Option<&str>, out: &mut Vec<RawRule>) {
    let mut cursor = 0;
    while cursor < text.len() {
        let Some((position, byte)) = scanner::find_at_top(text, cursor, &[b';', b'{']) else {
            break;
        };
        if byte == b';' {
            // At-statements (`@import ...;`, stray semicolons) carry no rules.
            cursor = position + 1;
            continue;
        }
        // Stray closing braces before the prelude are tolerated.
        let prelude = text[cursor..position].trim().trim_start_matches('}').trim_start();
        let (body, next) = match scanner::matching_brace(text, position) {
            Some(close) => (&text[position + 1..close], close + 1),
            // Unterminated block: take everything to end-of-input.
            None => (&text[position + 1..], text.len()),
        };
        dispatch_block(prelude, body, media, out);
        cursor = next;
    }
}

/// Handle one `prelude { body }` block found at sheet level.
fn dispatch_block(prelude: &str, body: &str, media: Option<&str>, out: &mut Vec<RawRule>) {
    if prelude.is_empty() {
        // Stray block with no prelude. Skip its contents entirely.
        return;
    }
    if let Some(rest) = prelude.strip_prefix('@') {
        let name = rest
            .split(|ch: char| ch.is_ascii_whitespace() || ch == '(')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match name.as_str() {
            "media" => {
                let condition = rest["media".len()..].trim();
                let combined = combine_media(media, condition);
                parse_sheet_contents(body, combined.as_deref(), out);
            }
            // Transparent wrappers: the condition is not propagated.
            "layer" | "supports" => parse_sheet_contents(body, media, out),
            // Parsed for safety but their inner blocks are not lifted.
            _ => {
                trace!("skipping @{name} block");
            }
        }
        return;
    }
    let selectors: Vec<String> = scanner::split_at_top(prelude, b',')
        .into_iter()
        .map(selector::normalize)
        .filter(|sel| !sel.is_empty())
        .collect();
    if selectors.is_empty() {
        return;
    }
    parse_rule_body(body, &selectors, media, out);
}

/// Parse a rule body: accumulate declarations, then expand nested blocks
/// against the current selector list.
fn parse_rule_body(body: &str, selectors: &[String], media: Option<&str>, out: &mut Vec<RawRule>) {
    let mut declaration_text = String::new();
    let mut nested: Vec<(String, String, Option<String>)> = Vec::new();
    let mut cursor = 0;

    while cursor < body.len() {
        let Some((position, _)) = scanner::find_at_top(body, cursor, &[b'{']) else {
            declaration_text.push_str(&body[cursor..]);
            break;
        };
        let before = &body[cursor..position];
        // The nested prelude starts after the last top-level `;` before `{`.
        let (decls, prelude) = match scanner::rfind_at_top(before, b';') {
            Some(split) => (&before[..=split], before[split + 1..].trim()),
            None => ("", before.trim()),
        };
        declaration_text.push_str(decls);
        let (inner, next) = match scanner::matching_brace(body, position) {
            Some(close) => (&body[position + 1..close], close + 1),
            None => (&body[position + 1..], body.len()),
        };
        nested.push((
            prelude.to_owned(),
            inner.to_owned(),
            media.map(str::to_owned),
        ));
        cursor = next;
    }

    let declarations = decl::parse_declarations(&declaration_text);
    emit_rule(selectors, declarations, media, out);

    for (prelude, inner, inherited) in nested {
        let inherited = inherited.as_deref();
        if let Some(rest) = prelude.strip_prefix('@') {
            let name = rest
                .split(|ch: char| ch.is_ascii_whitespace() || ch == '(')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            match name.as_str() {
                "media" => {
                    let condition = rest["media".len()..].trim();
                    let combined = combine_media(inherited, condition);
                    parse_rule_body(&inner, selectors, combined.as_deref(), out);
                }
                "layer" | "supports" => parse_rule_body(&inner, selectors, inherited, out),
                _ => trace!("skipping nested @{name} block"),
            }
            continue;
        }
        let inner_list: Vec<&str> = scanner::split_at_top(&prelude, b',')
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        let expanded = expand_nesting(selectors, &inner_list);
        if !expanded.is_empty() {
            parse_rule_body(&inner, &expanded, inherited, out);
        }
    }
}

/// Expand a nested prelude list against a parent selector list, producing the
/// cartesian product as independent selectors.
fn expand_nesting(parents: &[String], inner: &[&str]) -> Vec<String> {
    let mut expanded = Vec::with_capacity(parents.len() * inner.len());
    for parent in parents {
        for part in inner {
            let combined = if part.contains('&') {
                part.replace('&', parent)
            } else {
                // Leading-combinator and bare preludes both concatenate with
                // a space after the parent.
                format!("{parent} {part}")
            };
            let normalized = selector::normalize(&combined);
            if !normalized.is_empty() {
                expanded.push(normalized);
            }
        }
    }
    expanded
}

/// Combine nested media conditions with ` and `.
fn combine_media(outer: Option<&str>, condition: &str) -> Option<String> {
    let condition = condition.trim();
    if condition.is_empty() {
        return outer.map(str::to_owned);
    }
    match outer {
        Some(outer) => Some(format!("{outer} and {condition}")),
        None => Some(condition.to_owned()),
    }
}

fn emit_rule(
    selectors: &[String],
    declarations: Vec<Declaration>,
    media: Option<&str>,
    out: &mut Vec<RawRule>,
) {
    if declarations.is_empty() {
        return;
    }
    out.push(RawRule {
        selectors: selectors.to_vec(),
        declarations,
        media_query: media.map(str::to_owned),
    });
}
