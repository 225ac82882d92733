//! Depth-aware scanning primitives.
//!
//! Structural characters (braces, semicolons, commas, combinators) are only
//! recognized at zero nesting depth and outside string literals. Scanning is
//! byte-wise; every character that matters is ASCII, so multi-byte UTF-8
//! sequences pass through untouched.

/// Nesting state carried across the bytes of a single scan.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanState {
    /// Open parenthesis depth.
    paren: u32,
    /// Open square-bracket depth.
    bracket: u32,
    /// Active string delimiter when inside a quoted literal.
    quote: Option<u8>,
    /// Whether the previous byte was a backslash inside a string.
    escape: bool,
}

impl ScanState {
    /// True when outside parentheses, brackets and strings.
    #[inline]
    pub fn at_top(&self) -> bool {
        self.paren == 0 && self.bracket == 0 && self.quote.is_none()
    }

    /// True when inside a quoted string literal.
    #[inline]
    pub fn in_string(&self) -> bool {
        self.quote.is_some()
    }

    /// Advance the state over one byte.
    pub fn step(&mut self, byte: u8) {
        if self.quote.is_some() {
            if self.escape {
                self.escape = false;
            } else if byte == b'\\' {
                self.escape = true;
            } else if Some(byte) == self.quote {
                self.quote = None;
            }
            return;
        }
        match byte {
            b'(' => self.paren = self.paren.saturating_add(1),
            b')' => self.paren = self.paren.saturating_sub(1),
            b'[' => self.bracket = self.bracket.saturating_add(1),
            b']' => self.bracket = self.bracket.saturating_sub(1),
            b'"' | b'\'' => self.quote = Some(byte),
            _ => {}
        }
    }
}

/// Remove block comments (`/* ... */`) outside of string literals.
/// String contents are preserved verbatim. An unterminated comment swallows
/// the rest of the input.
pub fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = ScanState::default();
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        if !state.in_string() && byte == b'/' && bytes.get(index + 1) == Some(&b'*') {
            let mut end = index + 2;
            while end < bytes.len() {
                if bytes[end] == b'*' && bytes.get(end + 1) == Some(&b'/') {
                    end += 2;
                    break;
                }
                end += 1;
            }
            index = end;
            continue;
        }
        state.step(byte);
        out.push(byte);
        index += 1;
    }
    // Input was valid UTF-8 and only whole ASCII sequences were removed.
    String::from_utf8(out).unwrap_or_default()
}

/// Find the next occurrence of any target byte at zero depth, starting at
/// `from`. Returns the byte offset and the byte found.
pub fn find_at_top(text: &str, from: usize, targets: &[u8]) -> Option<(usize, u8)> {
    let bytes = text.as_bytes();
    let mut state = ScanState::default();
    for (offset, &byte) in bytes.iter().enumerate().skip(from) {
        if state.at_top() && targets.contains(&byte) {
            return Some((offset, byte));
        }
        state.step(byte);
    }
    None
}

/// Locate the `}` matching the `{` at byte offset `open`, counting braces
/// while respecting strings and bracket depth. Returns `None` for an
/// unterminated block.
pub fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.get(open), Some(&b'{'));
    let mut state = ScanState::default();
    let mut depth: u32 = 0;
    for (offset, &byte) in bytes.iter().enumerate().skip(open) {
        if !state.in_string() {
            match byte {
                b'{' => depth = depth.saturating_add(1),
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(offset);
                    }
                }
                _ => {}
            }
        }
        state.step(byte);
    }
    None
}

/// Split `text` on a delimiter byte at zero depth. Commas inside `:is(...)`,
/// `[attr="a,b"]` and similar constructs do not split.
pub fn split_at_top(text: &str, delim: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut state = ScanState::default();
    let mut parts = Vec::new();
    let mut start = 0;
    for (offset, &byte) in bytes.iter().enumerate() {
        if state.at_top() && byte == delim {
            parts.push(&text[start..offset]);
            start = offset + 1;
        }
        state.step(byte);
    }
    parts.push(&text[start..]);
    parts
}

/// Position of the last occurrence of `delim` at zero depth, if any.
pub fn rfind_at_top(text: &str, delim: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut state = ScanState::default();
    let mut found = None;
    for (offset, &byte) in bytes.iter().enumerate() {
        if state.at_top() && byte == delim {
            found = Some(offset);
        }
        state.step(byte);
    }
    found
}

/// Collapse runs of whitespace outside string literals into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::default();
    let mut pending_space = false;
    for ch in text.chars() {
        let is_ws = !state.in_string() && ch.is_ascii_whitespace();
        if is_ws {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        }
        if ch.is_ascii() {
            state.step(ch as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_stripped_outside_strings() {
        let out = strip_comments(".a { color: red; /* note */ }");
        assert_eq!(out, ".a { color: red;  }");
        let out = strip_comments(".a { content: \"/* keep */\"; }");
        assert_eq!(out, ".a { content: \"/* keep */\"; }");
    }

    #[test]
    fn unterminated_comment_is_swallowed() {
        assert_eq!(strip_comments(".a { } /* tail"), ".a { } ");
    }

    #[test]
    fn split_respects_functional_pseudo_classes() {
        let parts = split_at_top(":is(.a, .b), .c", b',');
        assert_eq!(parts, vec![":is(.a, .b)", " .c"]);
        let parts = split_at_top("[data-x=\"a,b\"], .d", b',');
        assert_eq!(parts, vec!["[data-x=\"a,b\"]", " .d"]);
    }

    #[test]
    fn matching_brace_counts_nested_blocks() {
        let text = ".a { .b { } .c { } }";
        let open = text.find('{').unwrap();
        assert_eq!(matching_brace(text, open), Some(text.len() - 1));
    }

    #[test]
    fn matching_brace_ignores_braces_in_strings() {
        let text = ".a { content: \"}\"; }";
        let open = text.find('{').unwrap();
        assert_eq!(matching_brace(text, open), Some(text.len() - 1));
    }

    #[test]
    fn collapse_whitespace_preserves_strings() {
        assert_eq!(
            collapse_whitespace(".a   >\t.b  [x=\"a  b\"]"),
            ".a > .b [x=\"a  b\"]"
        );
    }
}
