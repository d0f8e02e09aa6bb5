//! Plain-text compatibility report.
//!
//! The text depends only on its inputs (no timestamps, sorted sections) so
//! repeated runs over the same tree produce identical reports.

use crate::core::{CompatibilityReport, ConversionOutcome, OutcomeCounts};
use std::collections::BTreeMap;
use std::fmt::Write;

pub const REPORT_TITLE: &str = "Cython Compatibility Analysis Report";

/// Aggregate numbers shown at the top of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ReportTotals {
    pub scanned: usize,
    pub with_issues: usize,
    pub excluded: usize,
    pub converted: usize,
    pub fell_back: usize,
}

impl ReportTotals {
    pub fn compute(report: &CompatibilityReport, outcomes: &[ConversionOutcome]) -> Self {
        let counts = OutcomeCounts::tally(outcomes);
        let fell_back: Vec<String> = outcomes
            .iter()
            .filter(|o| o.error.is_some())
            .map(ConversionOutcome::key)
            .collect();
        let with_issues = report
            .scanned
            .iter()
            .filter(|unit| {
                report.diagnostics.contains_key(unit.as_str()) || fell_back.contains(unit)
            })
            .count();
        Self {
            scanned: report.scanned.len(),
            with_issues,
            excluded: report.excluded.len(),
            converted: counts.converted,
            fell_back: counts.fell_back,
        }
    }

    pub fn issue_percentage(&self) -> f64 {
        if self.scanned == 0 {
            0.0
        } else {
            self.with_issues as f64 / self.scanned as f64 * 100.0
        }
    }
}

/// Render the report. Never fails; empty inputs give a placeholder body.
pub fn render_report(report: &CompatibilityReport, outcomes: &[ConversionOutcome]) -> String {
    let totals = ReportTotals::compute(report, outcomes);
    let failures: BTreeMap<String, &str> = outcomes
        .iter()
        .filter_map(|o| o.error.as_deref().map(|e| (o.key(), e)))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "{}", REPORT_TITLE);
    let _ = writeln!(out, "{}\n", "=".repeat(REPORT_TITLE.len()));
    let _ = writeln!(out, "Total Python files scanned: {}", totals.scanned);
    let _ = writeln!(out, "Files with compatibility issues: {}", totals.with_issues);
    let _ = writeln!(out, "Non-convertible files: {}", totals.excluded);
    let _ = writeln!(out, "Converted files: {}", totals.converted);
    let _ = writeln!(out, "Fell back to Python: {}", totals.fell_back);
    let _ = writeln!(
        out,
        "Percentage of files with issues: {:.2}%\n",
        totals.issue_percentage()
    );

    if report.scanned.is_empty() {
        out.push_str("No Python files were scanned.\n");
        return out;
    }

    out.push_str("Non-convertible Files:\n");
    out.push_str("----------------------\n");
    for unit in &report.excluded {
        let _ = writeln!(out, "  - {}", unit);
    }
    out.push('\n');

    for unit in &report.scanned {
        let _ = writeln!(out, "File: {}", unit);
        let _ = writeln!(out, "{}", "-".repeat(unit.chars().count() + 6));

        if report.excluded.contains(unit) {
            out.push_str(
                "  This file is non-convertible and will be excluded from Cython conversion.\n",
            );
            out.push('\n');
            continue;
        }

        let groups = report.diagnostics_for(unit);
        for (kind, diagnostics) in groups.into_iter().flatten() {
            let _ = writeln!(out, "  {}:", kind.label());
            for diagnostic in diagnostics {
                let _ = writeln!(out, "    - Line {}: {}", diagnostic.line, diagnostic.message);
            }
        }

        let failure = failures.get(unit);
        if let Some(error) = failure {
            out.push_str("  Conversion failed; kept as Python source:\n");
            let first_line = error.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            let _ = writeln!(out, "    {}", first_line.trim());
        }

        if groups.is_none() && failure.is_none() {
            if report.analyzed {
                out.push_str("  No compatibility issues found.\n");
            } else {
                out.push_str("  Compatibility analysis was not run.\n");
            }
        }
        out.push('\n');
    }
    out
}
