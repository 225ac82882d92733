//! Synthetic dependencies for media-scoped rules.
//! Spec: <https://www.w3.org/TR/mediaqueries-5/>
//!
//! A rule wrapped by a media condition re-evaluates when the queried inputs
//! change: dimensional queries become viewport dependencies and preference
//! queries become user-preference dependencies keyed by the full query text.

use crate::model::{DepKind, MEDIA_PROPERTY};

/// Features that make a query depend on viewport geometry.
const DIMENSIONAL_FEATURES: &[&str] = &[
    "min-width",
    "max-width",
    "min-height",
    "max-height",
    "min-aspect-ratio",
    "max-aspect-ratio",
    "device-width",
    "device-height",
    "orientation",
    "resolution",
];

/// Features that make a query depend on user preferences.
const PREFERENCE_FEATURES: &[&str] = &["prefers-", "forced-colors", "inverted-colors"];

/// Synthesize dependency edges for one media condition. Returns
/// (kind, property, expression) triples; a query mentioning both feature
/// families yields both deps.
pub fn synthesize(query: &str) -> Vec<(DepKind, String, String)> {
    let lowered = query.to_ascii_lowercase();
    let mut out = Vec::new();
    if DIMENSIONAL_FEATURES
        .iter()
        .any(|feature| lowered.contains(feature))
    {
        out.push((
            DepKind::Viewport,
            MEDIA_PROPERTY.to_owned(),
            query.to_owned(),
        ));
    }
    if PREFERENCE_FEATURES
        .iter()
        .any(|feature| lowered.contains(feature))
    {
        out.push((DepKind::UserPref, query.to_owned(), query.to_owned()));
    }
    out
}
