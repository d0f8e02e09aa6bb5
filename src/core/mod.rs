pub mod errors;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension of interpretable Python sources.
pub const SOURCE_EXTENSION: &str = "py";
/// Extension of the translation-ready Cython copy.
pub const DIALECT_EXTENSION: &str = "pyx";
/// Extension of the C file produced by the Cython translator.
pub const GENERATED_C_EXTENSION: &str = "c";

/// One Python file subject to analysis and conversion.
///
/// Identity is the path relative to the tree it was discovered in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub text: String,
    pub excluded_from_conversion: bool,
    pub excluded_from_copy: bool,
}

impl SourceUnit {
    /// Report key for this unit (forward slashes on every platform).
    pub fn key(&self) -> String {
        unit_key(&self.path)
    }

    pub fn module_name(&self) -> String {
        module_name(&self.path)
    }
}

/// Forward-slash rendering of a relative unit path.
pub fn unit_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Dotted module name for a relative unit path: `employees/views.py` -> `employees.views`.
pub fn module_name(path: &Path) -> String {
    path.with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

/// Closed set of Python features that Cython handles differently or not at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    ParseError,
    GeneratorDelegation,
    AsyncControlFlow,
    InlineTypeAnnotationStatement,
    Metaclass,
    MultipleInheritance,
    DynamicAttributeBag,
    RuntimeIntrospection,
    DynamicCodeExecution,
    BareExceptionHandler,
}

impl FeatureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::GeneratorDelegation => "Yield from",
            Self::AsyncControlFlow => "Async",
            Self::InlineTypeAnnotationStatement => "Annotation",
            Self::Metaclass => "Metaclass",
            Self::MultipleInheritance => "Multiple inheritance",
            Self::DynamicAttributeBag => "Dynamic attributes",
            Self::RuntimeIntrospection => "Introspection",
            Self::DynamicCodeExecution => "Eval/exec",
            Self::BareExceptionHandler => "Bare except",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single detected instance of an incompatible feature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: FeatureKind,
    pub unit: String,
    pub line: usize,
    pub message: String,
}

/// Diagnostics of one unit grouped by feature kind, in line order within each group.
pub type UnitDiagnostics = BTreeMap<FeatureKind, Vec<Diagnostic>>;

/// Result of one analysis pass over a project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    /// Every discovered unit, excluded or not.
    pub scanned: BTreeSet<String>,
    /// Units excluded from conversion. Never analyzed.
    pub excluded: BTreeSet<String>,
    /// Only units with at least one diagnostic appear here.
    pub diagnostics: BTreeMap<String, UnitDiagnostics>,
    /// False when analysis was disabled and only the inventory was recorded.
    pub analyzed: bool,
}

impl CompatibilityReport {
    pub fn diagnostics_for(&self, unit: &str) -> Option<&UnitDiagnostics> {
        self.diagnostics.get(unit)
    }

    pub fn count_of(&self, unit: &str, kind: FeatureKind) -> usize {
        self.diagnostics_for(unit)
            .and_then(|groups| groups.get(&kind))
            .map_or(0, Vec::len)
    }

    pub fn total_diagnostics(&self) -> usize {
        self.diagnostics
            .values()
            .flat_map(|groups| groups.values())
            .map(Vec::len)
            .sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Converted,
    FellBack,
    /// Not attempted because the run was cancelled first.
    Skipped,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converted => write!(f, "converted"),
            Self::FellBack => write!(f, "fell back"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Compiled module to be produced by the batched native build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub module_name: String,
    /// Unit the artifact was compiled from, relative to the staging root.
    pub unit: PathBuf,
    /// Generated C file, relative to the staging root.
    pub c_source: PathBuf,
}

impl BuildArtifact {
    pub fn for_unit(unit: &Path) -> Self {
        Self {
            module_name: module_name(unit),
            unit: unit.to_path_buf(),
            c_source: unit.with_extension(GENERATED_C_EXTENSION),
        }
    }

    /// File stem the compiled module will carry (`views` for `views.cpython-312-x86_64-linux-gnu.so`).
    pub fn stem(&self) -> String {
        self.unit
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Authoritative per-unit record of one conversion attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub unit: PathBuf,
    pub status: ConversionStatus,
    pub error: Option<String>,
    /// Present exactly when `status` is `Converted`.
    pub artifact: Option<BuildArtifact>,
}

impl ConversionOutcome {
    pub fn converted(unit: &Path) -> Self {
        Self {
            unit: unit.to_path_buf(),
            status: ConversionStatus::Converted,
            error: None,
            artifact: Some(BuildArtifact::for_unit(unit)),
        }
    }

    pub fn fell_back(unit: &Path, error: impl Into<String>) -> Self {
        Self {
            unit: unit.to_path_buf(),
            status: ConversionStatus::FellBack,
            error: Some(error.into()),
            artifact: None,
        }
    }

    pub fn skipped(unit: &Path) -> Self {
        Self {
            unit: unit.to_path_buf(),
            status: ConversionStatus::Skipped,
            error: None,
            artifact: None,
        }
    }

    pub fn key(&self) -> String {
        unit_key(&self.unit)
    }

    pub fn is_converted(&self) -> bool {
        self.status == ConversionStatus::Converted
    }
}

/// Counts derived from a finished set of outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub converted: usize,
    pub fell_back: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    pub fn tally(outcomes: &[ConversionOutcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut acc, outcome| {
                match outcome.status {
                    ConversionStatus::Converted => acc.converted += 1,
                    ConversionStatus::FellBack => acc.fell_back += 1,
                    ConversionStatus::Skipped => acc.skipped += 1,
                }
                acc
            })
    }
}
