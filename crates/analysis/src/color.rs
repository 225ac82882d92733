//! Value normalization.
//! Spec: <https://www.w3.org/TR/css-color-4/#typedef-color>
//!
//! Hex colors expand to 8-digit upper-case RGBA and named colors map to
//! their fixed RGBA constants. Everything else is whitespace-collapsed.

use csscolorparser::Color;

/// Expand a whole-value color to `#RRGGBBAA`, if the value is a hex literal
/// or a color keyword.
fn normalize_color(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if let Some(digits) = trimmed.strip_prefix('#') {
        if !matches!(digits.len(), 3 | 4 | 6 | 8) || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return None;
        }
    } else if !trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
        // Only hex literals and bare keywords normalize; functional color
        // notation is left to the runtime.
        return None;
    }
    let parsed: Color = trimmed.parse().ok()?;
    let [red, green, blue, alpha] = parsed.to_rgba8();
    Some(format!("#{red:02X}{green:02X}{blue:02X}{alpha:02X}"))
}

/// Collapse whitespace runs in a value to single spaces.
fn collapse(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize one declaration value.
pub fn normalize_value(value: &str) -> String {
    normalize_color(value).unwrap_or_else(|| collapse(value))
}
