//! Human-readable report for the report output mode.

use crate::summary::Summary;
use crate::CompiledArtifact;
use std::fmt::Write;

fn heading(out: &mut String, title: &str) {
    out.push_str(title);
    out.push('\n');
    for _ in 0..title.len() {
        out.push('-');
    }
    out.push('\n');
}

fn classification_lines(out: &mut String, summary: &Summary) {
    let counts = summary.rule_counts;
    let percentages = summary.percentages;
    let _ = writeln!(
        out,
        "  static            {:>6}  ({:.1}%)",
        counts.static_count, percentages.static_pct
    );
    let _ = writeln!(
        out,
        "  deterministic     {:>6}  ({:.1}%)",
        counts.deterministic, percentages.deterministic
    );
    let _ = writeln!(
        out,
        "  nondeterministic  {:>6}  ({:.1}%)",
        counts.nondeterministic, percentages.nondeterministic
    );
    let _ = writeln!(out, "  total             {:>6}", counts.total);
}

/// Render one compilation as a report.
pub fn render(artifact: &CompiledArtifact) -> String {
    let summary = &artifact.summary;
    let mut out = String::new();

    heading(&mut out, "Stylesheet compilation");
    for source in &summary.sources {
        let _ = writeln!(out, "  source: {source}");
    }
    let _ = writeln!(out, "  binary: {} bytes", summary.binary_bytes);
    let _ = writeln!(out, "  fallback: {} bytes", summary.fallback_bytes);
    let _ = writeln!(out, "  boundaries: {}", summary.boundary_count);
    out.push('\n');

    heading(&mut out, "Rules by class");
    classification_lines(&mut out, summary);
    out.push('\n');

    if !summary.dependency_histogram.is_empty() {
        heading(&mut out, "Dependencies");
        for (kind, count) in &summary.dependency_histogram {
            let _ = writeln!(out, "  {kind:<16} {count:>6}");
        }
        out.push('\n');
    }

    if !summary.warnings.is_empty() {
        heading(&mut out, "Warnings");
        for warning in &summary.warnings {
            match &warning.selector {
                Some(selector) => {
                    let _ = writeln!(out, "  [{}] {selector}: {}", warning.kind, warning.message);
                }
                None => {
                    let _ = writeln!(out, "  [{}] {}", warning.kind, warning.message);
                }
            }
        }
        out.push('\n');
    }

    if let Some(diff) = &artifact.diff {
        heading(&mut out, "Changes since snapshot");
        if diff.is_empty() {
            out.push_str("  none\n");
        }
        for selector in &diff.added {
            let _ = writeln!(out, "  + {selector}");
        }
        for selector in &diff.removed {
            let _ = writeln!(out, "  - {selector}");
        }
        for selector in &diff.changed {
            let _ = writeln!(out, "  ~ {selector}");
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, CompileOptions, Source};

    #[test]
    fn report_covers_counts_and_warnings() {
        let _ = env_logger::builder().is_test(true).try_init();
        let sources = [Source::new(
            "app.css",
            ".a { width: 50%; } .b:first-child { color: var(--missing); }",
        )];
        let artifact = compile(&sources, &CompileOptions::default()).unwrap();
        let report = render(&artifact);
        assert!(report.contains("source: app.css"));
        assert!(report.contains("deterministic"));
        assert!(report.contains("STRUCTURAL_DYNAMIC"));
        assert!(report.contains("UNDEFINED_TOKEN"));
        assert!(report.contains("PARENT_SIZE"));
    }

    #[test]
    fn clean_reports_omit_empty_sections() {
        let _ = env_logger::builder().is_test(true).try_init();
        let sources = [Source::new("app.css", ".a { color: red; }")];
        let artifact = compile(&sources, &CompileOptions::default()).unwrap();
        let report = render(&artifact);
        assert!(!report.contains("Warnings"));
        assert!(!report.contains("Changes since snapshot"));
    }
}
