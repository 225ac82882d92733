//! Custom-property (token) resolution.
//! Spec: <https://www.w3.org/TR/css-variables-1/#using-variables>
//!
//! Token chains are walked with a visitation set for cycle detection, and the
//! raw table is independently flattened into a [`TokenTable`] that collapses
//! indirections down to their ultimate leaf.

use crate::warnings::{Warning, WarningKind};
use std::collections::{BTreeMap, HashSet};

/// Raw token table: custom-property name to raw value text.
pub type RawTokenTable = BTreeMap<String, String>;

/// Flattened record for one token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    /// Raw value as written.
    pub raw: String,
    /// Ultimate resolved value after collapsing indirections.
    pub resolved: String,
    /// Leaf token name when this token is a pointer, else None.
    pub pointer_to: Option<String>,
}

/// Flattened token table.
#[derive(Clone, Debug, Default)]
pub struct TokenTable {
    pub records: BTreeMap<String, TokenRecord>,
}

impl TokenTable {
    pub fn get(&self, name: &str) -> Option<&TokenRecord> {
        self.records.get(name)
    }
}

/// Split the argument text of a `var()` call into the referenced name and an
/// optional fallback. The comma split is depth-aware so nested function
/// arguments in the fallback stay intact.
pub fn split_var_args(args: &str) -> (String, Option<String>) {
    let bytes = args.as_bytes();
    let mut depth: u32 = 0;
    for (offset, &byte) in bytes.iter().enumerate() {
        match byte {
            b'(' => depth = depth.saturating_add(1),
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                return (
                    args[..offset].trim().to_owned(),
                    Some(args[offset + 1..].trim().to_owned()),
                );
            }
            _ => {}
        }
    }
    (args.trim().to_owned(), None)
}

/// If `value` is exactly one `var(...)` reference, return its arguments.
fn as_pure_var(value: &str) -> Option<(String, Option<String>)> {
    let trimmed = value.trim();
    let inner = trimmed.strip_prefix("var(")?.strip_suffix(')')?;
    // A trailing `)` belonging to a nested call means the value is not a
    // bare reference; depth must return to zero exactly at the end.
    let mut depth = 1u32;
    for byte in inner.bytes() {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    let (name, fallback) = split_var_args(inner);
    name.starts_with("--").then_some((name, fallback))
}

/// Outcome of walking one token chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Chain ended at a token with a concrete value.
    Leaf { name: String, value: String },
    /// Chain reached a token that was never defined. `fallback` is the
    /// nearest fallback text available along the chain, if any.
    Missing {
        missing: String,
        fallback: Option<String>,
    },
    /// Chain revisited a token.
    Cycle,
}

/// Stateful resolver shared across one analysis, carrying the per-analysis
/// warning dedup sets.
pub struct TokenResolver<'a> {
    table: &'a RawTokenTable,
    reported_unresolved: HashSet<(String, String)>,
    reported_cycles: HashSet<String>,
}

impl<'a> TokenResolver<'a> {
    pub fn new(table: &'a RawTokenTable) -> Self {
        Self {
            table,
            reported_unresolved: HashSet::new(),
            reported_cycles: HashSet::new(),
        }
    }

    pub fn table(&self) -> &'a RawTokenTable {
        self.table
    }

    /// Walk the chain starting at `name`. `consumer_fallback` is the fallback
    /// text of the referencing `var()` expression.
    pub fn walk_chain(&self, name: &str, consumer_fallback: Option<&str>) -> ChainOutcome {
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = name.to_owned();
        let mut nearest_fallback = consumer_fallback.map(str::to_owned);
        loop {
            if !visited.insert(current.clone()) {
                return ChainOutcome::Cycle;
            }
            let Some(value) = self.table.get(&current) else {
                return ChainOutcome::Missing {
                    missing: current,
                    fallback: nearest_fallback,
                };
            };
            match as_pure_var(value) {
                Some((next, link_fallback)) => {
                    if let Some(fallback) = link_fallback {
                        nearest_fallback = Some(fallback);
                    }
                    current = next;
                }
                None => {
                    return ChainOutcome::Leaf {
                        name: current,
                        value: value.clone(),
                    };
                }
            }
        }
    }

    /// Record an unresolved-token warning at most once per
    /// (token, missing token) pair per analysis.
    pub fn report_unresolved(
        &mut self,
        origin: &str,
        missing: &str,
        out: &mut Vec<Warning>,
    ) {
        let key = (origin.to_owned(), missing.to_owned());
        if !self.reported_unresolved.insert(key) {
            return;
        }
        let mut warning = Warning::new(
            WarningKind::UnresolvedToken,
            format!("var({origin}) chains to missing token {missing}"),
        );
        warning.token_name = Some(origin.to_owned());
        warning.referenced_token = Some(missing.to_owned());
        out.push(warning);
    }

    /// Record a token-cycle warning at most once per starting token.
    pub fn report_cycle(&mut self, origin: &str, out: &mut Vec<Warning>) {
        if !self.reported_cycles.insert(origin.to_owned()) {
            return;
        }
        let mut warning = Warning::new(
            WarningKind::TokenCycle,
            format!("token chain through {origin} is cyclic"),
        );
        warning.token_name = Some(origin.to_owned());
        out.push(warning);
    }
}

/// Flatten the raw table: absolute leaves keep `pointer_to = None`, pointer
/// tokens inherit the ultimate resolved value and record the leaf name.
/// Cycles and broken chains fall back to the raw text.
pub fn flatten(table: &RawTokenTable) -> TokenTable {
    let resolver = TokenResolver::new(table);
    let mut records = BTreeMap::new();
    for (name, raw) in table {
        let record = match as_pure_var(raw) {
            None => TokenRecord {
                raw: raw.clone(),
                resolved: raw.clone(),
                pointer_to: None,
            },
            Some((target, fallback)) => match resolver.walk_chain(&target, fallback.as_deref()) {
                ChainOutcome::Leaf { name: leaf, value } => TokenRecord {
                    raw: raw.clone(),
                    resolved: value,
                    pointer_to: Some(leaf),
                },
                ChainOutcome::Missing { fallback, .. } => TokenRecord {
                    raw: raw.clone(),
                    resolved: fallback.unwrap_or_else(|| raw.clone()),
                    pointer_to: None,
                },
                ChainOutcome::Cycle => TokenRecord {
                    raw: raw.clone(),
                    resolved: raw.clone(),
                    pointer_to: None,
                },
            },
        };
        records.insert(name.clone(), record);
    }
    TokenTable { records }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str)]) -> RawTokenTable {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn pure_var_detection() {
        assert_eq!(
            as_pure_var("var(--a)"),
            Some(("--a".to_owned(), None))
        );
        assert_eq!(
            as_pure_var(" var(--a, 10px) "),
            Some(("--a".to_owned(), Some("10px".to_owned())))
        );
        assert_eq!(as_pure_var("calc(var(--a) + 1px)"), None);
        assert_eq!(as_pure_var("var(--a) var(--b)"), None);
    }

    #[test]
    fn chains_collapse_to_the_leaf() {
        let raw = table(&[("--a", "var(--b)"), ("--b", "var(--c)"), ("--c", "16px")]);
        let flat = flatten(&raw);
        let a = flat.get("--a").unwrap();
        assert_eq!(a.resolved, "16px");
        assert_eq!(a.pointer_to.as_deref(), Some("--c"));
        let c = flat.get("--c").unwrap();
        assert_eq!(c.pointer_to, None);
    }

    #[test]
    fn cycles_fall_back_to_raw_text() {
        let raw = table(&[("--a", "var(--b)"), ("--b", "var(--a)")]);
        let flat = flatten(&raw);
        assert_eq!(flat.get("--a").unwrap().resolved, "var(--b)");
        assert_eq!(flat.get("--a").unwrap().pointer_to, None);
    }

    #[test]
    fn missing_targets_use_the_nearest_fallback() {
        let raw = table(&[("--a", "var(--missing, 4px)")]);
        let flat = flatten(&raw);
        assert_eq!(flat.get("--a").unwrap().resolved, "4px");
    }

    #[test]
    fn unresolved_warnings_dedup_per_pair() {
        let raw = table(&[]);
        let mut resolver = TokenResolver::new(&raw);
        let mut warnings = Vec::new();
        resolver.report_unresolved("--a", "--b", &mut warnings);
        resolver.report_unresolved("--a", "--b", &mut warnings);
        resolver.report_unresolved("--a", "--c", &mut warnings);
        assert_eq!(warnings.len(), 2);
    }
}
