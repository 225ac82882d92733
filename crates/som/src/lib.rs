//! Stylesheet analyzer and binary compiler pipeline.
//!
//! Ties the stages together: parse, classify, resolve tokens, build the rule
//! graph, propagate contamination, assemble manifests and emit the binary
//! artifact along with the textual fallback, the fallback map and the summary
//! record. Everything is synchronous and deterministic; two invocations over
//! semantically equal inputs produce byte-identical binaries.

#![forbid(unsafe_code)]

mod diff;
mod fallback;
mod options;
mod report;
mod summary;

pub use diff::{compare, snapshot, DiffReport};
pub use options::{CompileOptions, DiffSnapshot, ExitStatus, OutputMode, Source};
pub use report::render as render_report;
pub use summary::{Percentages, RuleCounts, Summary, SummaryWarning};

pub use som_analysis::{Analysis, BoundaryManifest, Classification, DepKind, EmitType};

use anyhow::{bail, Result};
use log::info;
use som_parser::parse_stylesheet;

/// Everything one compilation produces.
#[derive(Clone, Debug)]
pub struct CompiledArtifact {
    /// The binary artifact (pool, static tier, dynamic index, dynamic tier).
    pub binary: Vec<u8>,
    /// Fallback stylesheet text for nondeterministic rules.
    pub fallback_css: String,
    /// `0x<hex-hash>` to selector, ordered like the fallback text.
    pub fallback_map: Vec<(String, String)>,
    pub summary: Summary,
    /// Present when a diff snapshot was supplied.
    pub diff: Option<DiffReport>,
}

impl CompiledArtifact {
    /// Exit status for the external driver.
    pub fn exit_status(&self) -> ExitStatus {
        if self.summary.rule_counts.nondeterministic > 0 {
            ExitStatus::NondeterministicPresent
        } else {
            ExitStatus::Clean
        }
    }
}

/// Parse and analyze sources without emitting anything.
pub fn analyze_sources(sources: &[Source], options: &CompileOptions) -> Analysis {
    let mut rules = Vec::new();
    // External tokens sit beneath stylesheet definitions: a token declared in
    // the stylesheet wins over one supplied by the driver.
    let mut raw_tokens = options.external_tokens.clone();
    for source in sources {
        let sheet = parse_stylesheet(&source.text);
        info!("{}: {} rules", source.name, sheet.rules.len());
        rules.extend(sheet.rules);
        for (name, value) in sheet.raw_tokens {
            raw_tokens.insert(name, value);
        }
    }
    som_analysis::analyze(&rules, &raw_tokens)
}

/// Compile sources into the full artifact set.
pub fn compile(sources: &[Source], options: &CompileOptions) -> Result<CompiledArtifact> {
    if sources.is_empty() {
        bail!("at least one stylesheet source is required");
    }
    let analysis = analyze_sources(sources, options);
    let binary = som_codec::emit(&analysis);
    let fallback_css = fallback::emit_text(&analysis);
    let fallback_map = fallback::emit_map(&analysis);
    let summary = summary::build(&analysis, sources, binary.len(), fallback_css.len());
    let diff = options
        .diff_snapshot
        .as_ref()
        .map(|previous| diff::compare(previous, &analysis));
    info!(
        "compiled {} rules into {} bytes ({} fallback)",
        summary.rule_counts.total,
        binary.len(),
        fallback_css.len()
    );
    Ok(CompiledArtifact {
        binary,
        fallback_css,
        fallback_map,
        summary,
        diff,
    })
}
