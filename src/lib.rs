// Export modules for library usage
pub mod analyzers;
pub mod build;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conversion;
pub mod core;
pub mod io;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod testkit;
pub mod toolchain;

// Re-export commonly used types
pub use crate::core::errors::{BuildError, ConfigError, PipelineError, StagingError};
pub use crate::core::{
    BuildArtifact, CompatibilityReport, ConversionOutcome, ConversionStatus, Diagnostic,
    FeatureKind, SourceUnit,
};

pub use crate::analyzers::{analyze_source, analyze_units};
pub use crate::config::BuildConfig;
pub use crate::pipeline::{CancellationToken, Pipeline, PipelineState, RunSummary};
pub use crate::report::render_report;
pub use crate::toolchain::{CythonToolchain, Toolchain};
