//! Snapshot diffing for watch-mode drivers.

use crate::options::DiffSnapshot;
use som_analysis::hash::fnv1a_32;
use som_analysis::Analysis;

/// Selectors added, removed or changed relative to a previous snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Digest of a rule's normalized declarations, stable across runs.
fn rule_digest(declarations: impl Iterator<Item = (String, String)>) -> u32 {
    let mut joined = String::new();
    for (name, value) in declarations {
        joined.push_str(&name);
        joined.push(':');
        joined.push_str(&value);
        joined.push(';');
    }
    fnv1a_32(joined.as_bytes())
}

/// Capture the current analysis as a snapshot for a later diff.
pub fn snapshot(analysis: &Analysis) -> DiffSnapshot {
    let mut snapshot = DiffSnapshot::default();
    for node in &analysis.rules {
        snapshot.entries.insert(
            node.selector.clone(),
            rule_digest(
                node.normalized_declarations
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            ),
        );
    }
    snapshot
}

/// Compare a previous snapshot against the current analysis.
pub fn compare(previous: &DiffSnapshot, analysis: &Analysis) -> DiffReport {
    let current = snapshot(analysis);
    let mut report = DiffReport::default();
    for (selector, digest) in &current.entries {
        match previous.entries.get(selector) {
            None => report.added.push(selector.clone()),
            Some(old) if old != digest => report.changed.push(selector.clone()),
            Some(_) => {}
        }
    }
    for selector in previous.entries.keys() {
        if !current.entries.contains_key(selector) {
            report.removed.push(selector.clone());
        }
    }
    report
}
