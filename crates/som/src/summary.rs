//! Summary record emitted alongside the binary.

use crate::options::Source;
use serde::Serialize;
use som_analysis::model::Classification;
use som_analysis::Analysis;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Rule counts by final class.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct RuleCounts {
    #[serde(rename = "static")]
    pub static_count: usize,
    pub deterministic: usize,
    pub nondeterministic: usize,
    pub total: usize,
}

/// Percentage breakdown by final class, rounded to one decimal. The rounded
/// values sum to at least 99 for any non-empty rule set.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq)]
pub struct Percentages {
    #[serde(rename = "static")]
    pub static_pct: f64,
    pub deterministic: f64,
    pub nondeterministic: f64,
}

/// One warning as a typed object.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SummaryWarning {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

/// Summary of one compilation.
#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub generated_unix_ms: u64,
    pub sources: Vec<String>,
    pub binary_bytes: usize,
    pub fallback_bytes: usize,
    pub rule_counts: RuleCounts,
    pub percentages: Percentages,
    pub boundary_count: usize,
    pub dependency_histogram: BTreeMap<String, usize>,
    pub warnings: Vec<SummaryWarning>,
}

impl Summary {
    /// Serialize for the JSON output mode.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Build the summary for a finished analysis.
pub fn build(
    analysis: &Analysis,
    sources: &[Source],
    binary_bytes: usize,
    fallback_bytes: usize,
) -> Summary {
    let mut counts = RuleCounts::default();
    let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
    for node in &analysis.rules {
        counts.total += 1;
        match node.final_class {
            Classification::Static => counts.static_count += 1,
            Classification::Deterministic => counts.deterministic += 1,
            Classification::Nondeterministic => counts.nondeterministic += 1,
        }
        for dep in &node.deps {
            *histogram.entry(dep.kind.name().to_owned()).or_insert(0) += 1;
        }
    }

    let percentages = if counts.total == 0 {
        Percentages::default()
    } else {
        let total = counts.total as f64;
        Percentages {
            static_pct: round1(counts.static_count as f64 * 100.0 / total),
            deterministic: round1(counts.deterministic as f64 * 100.0 / total),
            nondeterministic: round1(counts.nondeterministic as f64 * 100.0 / total),
        }
    };

    let warnings = analysis
        .warnings()
        .map(|warning| SummaryWarning {
            kind: warning.kind.name().to_owned(),
            selector: warning
                .node
                .map(|node| analysis.rule(node).selector.clone()),
            message: warning.message.clone(),
            token_name: warning.token_name.clone(),
            referenced_token: warning.referenced_token.clone(),
            property: warning.property.clone(),
        })
        .collect();

    Summary {
        generated_unix_ms: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64,
        sources: sources.iter().map(|source| source.name.clone()).collect(),
        binary_bytes,
        fallback_bytes,
        rule_counts: counts,
        percentages,
        boundary_count: analysis.manifests.len()
            + analysis
                .rules
                .iter()
                .enumerate()
                .filter(|(position, node)| {
                    node.final_class == Classification::Nondeterministic
                        && node.boundary
                            == Some(som_analysis::model::RuleId(*position as u32))
                })
                .count(),
        dependency_histogram: histogram,
        warnings,
    }
}
