//! Every external process the pipeline runs goes through [`Toolchain`].

pub mod cython;

pub use cython::CythonToolchain;

use crate::core::errors::BuildError;
use crate::core::BuildArtifact;
use std::path::Path;
use std::process::Output;

/// Outcome of translating one `.pyx` unit to C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateResult {
    pub success: bool,
    /// Captured compiler output. Never empty on failure.
    pub diagnostics: String,
}

impl TranslateResult {
    pub fn succeeded(diagnostics: impl Into<String>) -> Self {
        Self {
            success: true,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        let diagnostics = diagnostics.into();
        Self {
            success: false,
            diagnostics: if diagnostics.trim().is_empty() {
                "translation failed without diagnostic output".to_string()
            } else {
                diagnostics
            },
        }
    }
}

/// What the batched native build printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildLog {
    pub command: String,
    pub output: String,
}

pub trait Toolchain: Send + Sync {
    /// Translate a single unit. Must not print to the console.
    fn translate(&self, pyx: &Path, c_out: &Path, language_level: &str) -> TranslateResult;

    /// Compile every artifact's C file into an extension module next to its
    /// unit, in one invocation.
    fn build_extensions(
        &self,
        root: &Path,
        artifacts: &[BuildArtifact],
    ) -> Result<BuildLog, BuildError>;
}

/// Stdout and stderr of a finished process as one trimmed string.
pub(crate) fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut text = stdout.trim_end().to_string();
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim_end());
    }
    text
}
