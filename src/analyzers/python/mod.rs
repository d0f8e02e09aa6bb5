//! Cython compatibility analysis of a single Python unit.

pub mod detectors;
pub mod parser;
pub mod semantic;

use crate::core::{Diagnostic, FeatureKind};
use detectors::DETECTORS;
use parser::parse_source;
use semantic::ModuleModel;

/// Run every detector over one unit.
///
/// Never fails: a unit that does not parse yields exactly one
/// [`FeatureKind::ParseError`] diagnostic and no others. Diagnostics come back
/// ordered by line, then kind.
pub fn analyze_source(unit: &str, text: &str) -> Vec<Diagnostic> {
    let syntax = match parse_source(text) {
        Ok(tree) => tree,
        Err(failure) => {
            tracing::debug!(unit, line = failure.line, "unit does not parse");
            return vec![Diagnostic {
                kind: FeatureKind::ParseError,
                unit: unit.to_string(),
                line: failure.line,
                message: failure.message,
            }];
        }
    };
    let model = ModuleModel::build(&syntax);

    let mut diagnostics: Vec<Diagnostic> = DETECTORS
        .iter()
        .flat_map(|detector| {
            detector
                .run(&syntax, &model)
                .into_iter()
                .map(move |(line, message)| Diagnostic {
                    kind: detector.kind,
                    unit: unit.to_string(),
                    line,
                    message,
                })
        })
        .collect();
    diagnostics.sort_by(|a, b| a.line.cmp(&b.line).then(a.kind.cmp(&b.kind)));
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(diagnostics: &[Diagnostic]) -> Vec<FeatureKind> {
        diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_clean_unit_has_no_diagnostics() {
        let source = indoc! {"
            import math

            def area(r):
                return math.pi * r * r
        "};
        assert!(analyze_source("geometry.py", source).is_empty());
    }

    #[test]
    fn test_parse_failure_is_a_single_diagnostic() {
        let diagnostics = analyze_source("broken.py", "def f(:\n    eval('x')\n");
        assert_eq!(kinds(&diagnostics), vec![FeatureKind::ParseError]);
        assert_eq!(diagnostics[0].unit, "broken.py");
        assert!(!diagnostics[0].message.is_empty());
    }

    #[test]
    fn test_mixed_features_sorted_by_line() {
        let source = indoc! {"
            class Both(A, B, metaclass=M):
                pass

            try:
                exec(code)
            except:
                pass
        "};
        let diagnostics = analyze_source("mixed.py", source);
        assert_eq!(
            kinds(&diagnostics),
            vec![
                FeatureKind::Metaclass,
                FeatureKind::MultipleInheritance,
                FeatureKind::DynamicCodeExecution,
                FeatureKind::BareExceptionHandler,
            ]
        );
        let lines: Vec<_> = diagnostics.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![1, 1, 5, 6]);
        assert!(diagnostics.iter().all(|d| d.unit == "mixed.py"));
    }
}
