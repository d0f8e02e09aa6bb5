//! Shared error types for the application

use crate::pipeline::PipelineState;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration could not be loaded or is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration value for `{field}`: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure while materializing the staging tree. Always fatal.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Failed to clear previous staging tree {path}")]
    Clear {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {from} to {to}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("Source root {0} does not exist or is not a directory")]
    MissingSource(PathBuf),
}

/// Failure of the batched native build. Always fatal.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Required tool `{tool}` was not found on PATH")]
    ToolNotFound {
        tool: String,
        #[source]
        source: which::Error,
    },

    #[error("Failed to launch {program}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write build script {path}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Native build exited with {status}; see the build log for details")]
    Failed { status: String, output: String },

    #[error("Native build did not produce a compiled module for {module}")]
    MissingModule { module: String },

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

/// Run-aborting pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Staging failed")]
    Staging(#[from] StagingError),

    #[error("Batched native build failed")]
    Build(#[from] BuildError),

    #[error("Run cancelled after reaching state {state:?}")]
    Cancelled { state: PipelineState },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// `err` followed by each of its sources, joined with `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
