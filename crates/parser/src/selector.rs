//! Selector normalization and segmentation.
//! Spec: <https://www.w3.org/TR/selectors-4/#structure>
//!
//! Selectors are segmented into compounds joined by combinators using
//! depth-aware scanning, so combinators inside functional pseudo-classes
//! (`:is(...)`, `:where(...)`, `:has(...)`) never split.

use crate::scanner::{collapse_whitespace, ScanState};

/// Combinator joining two compound selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace.
    Descendant,
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    SubsequentSibling,
}

impl Combinator {
    /// Canonical rendering, including surrounding spaces.
    fn render(self) -> &'static str {
        match self {
            Self::Descendant => " ",
            Self::Child => " > ",
            Self::NextSibling => " + ",
            Self::SubsequentSibling => " ~ ",
        }
    }
}

/// One compound selector and the combinator that attaches it to the previous
/// compound. The first segment's combinator is meaningless.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub combinator: Combinator,
    pub compound: String,
}

/// Segment a selector into compounds at zero depth.
pub fn segment(selector: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut state = ScanState::default();
    let mut pending: Option<Combinator> = None;
    let mut current = String::new();
    let mut attach = Combinator::Descendant;

    for ch in selector.chars() {
        let top = state.at_top();
        if ch.is_ascii() {
            state.step(ch as u8);
        }
        if top {
            let explicit = match ch {
                '>' => Some(Combinator::Child),
                '+' => Some(Combinator::NextSibling),
                '~' => Some(Combinator::SubsequentSibling),
                _ => None,
            };
            if let Some(comb) = explicit {
                pending = Some(comb);
                continue;
            }
            if ch.is_ascii_whitespace() {
                if !current.is_empty() && pending.is_none() {
                    pending = Some(Combinator::Descendant);
                }
                continue;
            }
        }
        if let Some(comb) = pending.take() {
            if !current.is_empty() {
                segments.push(Segment {
                    combinator: attach,
                    compound: std::mem::take(&mut current),
                });
            }
            attach = comb;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        segments.push(Segment {
            combinator: attach,
            compound: current,
        });
    }
    segments
}

/// Canonical, whitespace-normalized form of a selector.
///
/// Runs of whitespace collapse, combinators are rendered with single
/// surrounding spaces, and the result is trimmed. Two spellings of the same
/// selector (`.a>.b`, `.a  >  .b`) normalize identically.
pub fn normalize(selector: &str) -> String {
    let collapsed = collapse_whitespace(selector.trim());
    let segments = segment(&collapsed);
    let mut out = String::with_capacity(collapsed.len());
    for (index, seg) in segments.iter().enumerate() {
        if index > 0 {
            out.push_str(seg.combinator.render());
        }
        out.push_str(&seg.compound);
    }
    out
}

/// Drop the trailing compound and its leading combinator, yielding the
/// selector of the nearest potential tree parent. `None` when the selector
/// is a single compound.
pub fn parent_selector(selector: &str) -> Option<String> {
    let segments = segment(selector);
    if segments.len() <= 1 {
        return None;
    }
    let mut out = String::new();
    for (index, seg) in segments[..segments.len() - 1].iter().enumerate() {
        if index > 0 {
            out.push_str(seg.combinator.render());
        }
        out.push_str(&seg.compound);
    }
    Some(out)
}

/// The rightmost compound of a selector, or the selector itself when it has
/// a single compound.
pub fn rightmost_compound(selector: &str) -> String {
    segment(selector)
        .pop()
        .map(|seg| seg.compound)
        .unwrap_or_default()
}

/// Derive a stable identifier stem from a compound selector: leading
/// `.`/`#`/`:`/`*`/`[` markers are skipped and the first identifier run is
/// kept. Falls back to `"rule"` when nothing identifier-like remains.
pub fn id_stem(compound: &str) -> String {
    let trimmed = compound.trim_start_matches(['.', '#', ':', '*', '[']);
    let stem: String = trimmed
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
        .collect();
    if stem.is_empty() {
        "rule".to_owned()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_spacing_around_combinators() {
        assert_eq!(normalize(".a>.b"), ".a > .b");
        assert_eq!(normalize(".a   .b"), ".a .b");
        assert_eq!(normalize("  .a +.b  "), ".a + .b");
    }

    #[test]
    fn combinators_inside_pseudo_classes_do_not_segment() {
        let segs = segment(".a:is(.b > .c) .d");
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].compound, ".a:is(.b > .c)");
        assert_eq!(segs[1].compound, ".d");
    }

    #[test]
    fn parent_selector_drops_trailing_compound() {
        assert_eq!(parent_selector(".a .b").as_deref(), Some(".a"));
        assert_eq!(parent_selector(".a > .b > .c").as_deref(), Some(".a > .b"));
        assert_eq!(parent_selector(".a"), None);
    }

    #[test]
    fn id_stems() {
        assert_eq!(id_stem(".layout"), "layout");
        assert_eq!(id_stem("#main"), "main");
        assert_eq!(id_stem(":root"), "root");
        assert_eq!(id_stem("tr:nth-child(even)"), "tr");
        assert_eq!(id_stem("*"), "rule");
        assert_eq!(id_stem("[data-x]"), "data-x");
    }
}
