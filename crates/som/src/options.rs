//! Compile options and exit statuses.
//!
//! The command-line driver is an external collaborator; this is the contract
//! it programs against.

use std::collections::BTreeMap;

/// One stylesheet source.
#[derive(Clone, Debug)]
pub struct Source {
    /// Display name (usually a file name) carried into the summary.
    pub name: String,
    pub text: String,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Output mode requested by the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable report.
    Report,
    /// Summary as JSON.
    Json,
    /// Binary artifact plus fallback outputs.
    #[default]
    Binary,
    /// Compare against a previous snapshot.
    Diff,
}

/// Snapshot of a previous run, for watch-mode diffing. Maps each selector to
/// a digest of its normalized declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffSnapshot {
    pub entries: BTreeMap<String, u32>,
}

/// Options accepted by the compile entry point.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// External token table merged beneath stylesheet-defined tokens.
    pub external_tokens: BTreeMap<String, String>,
    /// Previous-run snapshot to diff against.
    pub diff_snapshot: Option<DiffSnapshot>,
    pub mode: OutputMode,
}

/// Process exit statuses for the external driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// Success, no nondeterministic rules.
    Clean,
    /// Success, but some rules fell back to text.
    NondeterministicPresent,
    /// The invocation itself was invalid.
    InvocationError,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::NondeterministicPresent => 1,
            Self::InvocationError => 2,
        }
    }
}
