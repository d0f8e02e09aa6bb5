//! Decide per unit whether the compiled module or the Python source survives.

use crate::build::compiled_modules;
use crate::core::errors::StagingError;
use crate::core::{ConversionOutcome, ConversionStatus, DIALECT_EXTENSION, GENERATED_C_EXTENSION};
use crate::io::remove_if_exists;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub removed_sources: usize,
    pub removed_intermediates: usize,
}

/// Apply outcomes to the staging tree. Must only run after a successful build.
///
/// Converted units lose their `.py` (and, unless `keep_intermediates`, their
/// `.pyx` and `.c`). Every other unit keeps its `.py` and loses anything
/// compiled or generated for it. Units without an outcome are not touched.
pub fn reconcile(
    root: &Path,
    outcomes: &[ConversionOutcome],
    keep_intermediates: bool,
) -> Result<ReconcileSummary, StagingError> {
    let mut summary = ReconcileSummary::default();
    for outcome in outcomes {
        let source = root.join(&outcome.unit);
        let intermediates = [
            source.with_extension(DIALECT_EXTENSION),
            source.with_extension(GENERATED_C_EXTENSION),
        ];

        match outcome.status {
            ConversionStatus::Converted => {
                if remove(&source)? {
                    summary.removed_sources += 1;
                }
                if !keep_intermediates {
                    for path in &intermediates {
                        if remove(path)? {
                            summary.removed_intermediates += 1;
                        }
                    }
                }
            }
            ConversionStatus::FellBack | ConversionStatus::Skipped => {
                summary.removed_intermediates += remove_generated(root, &outcome.unit)?;
            }
        }
    }
    tracing::info!(
        removed_sources = summary.removed_sources,
        removed_intermediates = summary.removed_intermediates,
        "staging tree reconciled"
    );
    Ok(summary)
}

/// Remove compiled modules, `.pyx` and `.c` files already sitting next to
/// each unit before conversion starts. They come from the source tree
/// (stale in-place builds) and would otherwise pass for fresh build output.
pub fn clear_stale_outputs(root: &Path, units: &[PathBuf]) -> Result<usize, StagingError> {
    let mut removed = 0;
    for unit in units {
        removed += remove_generated(root, unit)?;
    }
    if removed > 0 {
        tracing::info!(removed, "removed stale compiled outputs from staging tree");
    }
    Ok(removed)
}

/// Delete everything conversion or the build could have produced for `unit`.
fn remove_generated(root: &Path, unit: &Path) -> Result<usize, StagingError> {
    let source = root.join(unit);
    let modules = compiled_modules(root, unit).map_err(|e| StagingError::Walk {
        path: source.clone(),
        message: e.to_string(),
    })?;
    let mut removed = 0;
    for path in [
        source.with_extension(DIALECT_EXTENSION),
        source.with_extension(GENERATED_C_EXTENSION),
    ]
    .iter()
    .chain(modules.iter())
    {
        if remove(path)? {
            removed += 1;
        }
    }
    Ok(removed)
}

fn remove(path: &Path) -> Result<bool, StagingError> {
    remove_if_exists(path).map_err(|source| StagingError::Clear {
        path: path.to_path_buf(),
        source,
    })
}
