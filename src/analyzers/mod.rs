//! Project-level compatibility analysis.

pub mod python;

use crate::core::{CompatibilityReport, Diagnostic, SourceUnit, UnitDiagnostics};
use rayon::prelude::*;

pub use python::analyze_source;

/// Analyze every unit not excluded from conversion.
///
/// Units are independent, so they are processed in parallel; the resulting
/// report is ordered by unit key regardless of scheduling.
pub fn analyze_units(units: &[SourceUnit]) -> CompatibilityReport {
    let mut report = inventory(units);
    report.analyzed = true;

    let per_unit: Vec<(String, Vec<Diagnostic>)> = units
        .par_iter()
        .filter(|unit| !unit.excluded_from_conversion)
        .map(|unit| {
            let key = unit.key();
            let diagnostics = analyze_source(&key, &unit.text);
            (key, diagnostics)
        })
        .collect();

    for (key, diagnostics) in per_unit {
        if diagnostics.is_empty() {
            continue;
        }
        tracing::debug!(unit = %key, count = diagnostics.len(), "compatibility issues found");
        report.diagnostics.insert(key, group_by_kind(diagnostics));
    }
    report
}

/// Report that only records which units exist and which are excluded.
pub fn inventory(units: &[SourceUnit]) -> CompatibilityReport {
    let mut report = CompatibilityReport::default();
    for unit in units {
        let key = unit.key();
        if unit.excluded_from_conversion {
            report.excluded.insert(key.clone());
        }
        report.scanned.insert(key);
    }
    report
}

fn group_by_kind(diagnostics: Vec<Diagnostic>) -> UnitDiagnostics {
    let mut groups = UnitDiagnostics::new();
    for diagnostic in diagnostics {
        groups.entry(diagnostic.kind).or_default().push(diagnostic);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|d| d.line);
    }
    groups
}
