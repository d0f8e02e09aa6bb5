//! Per-unit conversion: rewrite, produce the `.pyx` copy, translate to C.
//!
//! A failing unit never affects the others. Every failure, including a
//! panic inside the toolchain, becomes a `FellBack` outcome whose partial
//! artifacts have already been removed.

pub mod rewrite;

pub use rewrite::rewrite_imports;

use crate::core::errors::PipelineError;
use crate::core::{ConversionOutcome, ConversionStatus, DIALECT_EXTENSION, GENERATED_C_EXTENSION};
use crate::io::remove_if_exists;
use crate::pipeline::CancellationToken;
use crate::progress::ProgressObserver;
use crate::toolchain::Toolchain;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Name prefix of conversion worker threads.
pub const WORKER_THREAD_PREFIX: &str = "pyxbuild-convert-";

/// Settings shared by every conversion in a run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub language_level: String,
    /// Worker threads; 0 uses the available parallelism.
    pub jobs: usize,
}

/// Convert one unit, given relative to `root`.
pub fn convert_unit(
    root: &Path,
    unit: &Path,
    toolchain: &dyn Toolchain,
    language_level: &str,
) -> ConversionOutcome {
    let source = root.join(unit);
    let pyx = source.with_extension(DIALECT_EXTENSION);
    let c_out = source.with_extension(GENERATED_C_EXTENSION);

    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        translate_unit(&source, &pyx, &c_out, toolchain, language_level)
    }));
    let failure = match attempt {
        Ok(Ok(())) => return ConversionOutcome::converted(unit),
        Ok(Err(message)) => message,
        Err(payload) => format!("Conversion panicked: {}", panic_message(payload.as_ref())),
    };

    for partial in [&pyx, &c_out] {
        if let Err(e) = remove_if_exists(partial) {
            tracing::warn!(path = %partial.display(), error = %e, "failed to remove partial artifact");
        }
    }
    ConversionOutcome::fell_back(unit, failure)
}

fn translate_unit(
    source: &Path,
    pyx: &Path,
    c_out: &Path,
    toolchain: &dyn Toolchain,
    language_level: &str,
) -> Result<(), String> {
    let text = fs::read_to_string(source)
        .map_err(|e| format!("Failed to read {}: {}", source.display(), e))?;
    fs::write(pyx, rewrite_imports(&text))
        .map_err(|e| format!("Failed to write {}: {}", pyx.display(), e))?;

    let result = toolchain.translate(pyx, c_out, language_level);
    if result.success {
        if !result.diagnostics.trim().is_empty() {
            tracing::debug!(
                unit = %source.display(),
                diagnostics = %result.diagnostics,
                "translator output"
            );
        }
        Ok(())
    } else {
        Err(result.diagnostics)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Convert all units on a bounded worker pool.
///
/// Units not yet started when `token` is cancelled come back `Skipped`.
/// Outcomes are returned sorted by unit path.
pub fn convert_all(
    root: &Path,
    units: &[PathBuf],
    toolchain: &dyn Toolchain,
    options: &ConvertOptions,
    token: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<Vec<ConversionOutcome>, PipelineError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .thread_name(|i| format!("{}{}", WORKER_THREAD_PREFIX, i))
        .build()
        .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

    let outcomes = Mutex::new(Vec::with_capacity(units.len()));
    pool.install(|| {
        units.par_iter().for_each(|unit| {
            let outcome = if token.is_cancelled() {
                ConversionOutcome::skipped(unit)
            } else {
                convert_unit(root, unit, toolchain, &options.language_level)
            };
            log_outcome(&outcome);
            observer.unit_finished(unit, outcome.status);
            outcomes.lock().push(outcome);
        })
    });

    let mut outcomes = outcomes.into_inner();
    outcomes.sort_by(|a, b| a.unit.cmp(&b.unit));
    Ok(outcomes)
}

fn log_outcome(outcome: &ConversionOutcome) {
    let unit = outcome.key();
    match outcome.status {
        ConversionStatus::Converted => tracing::info!(%unit, "converted to Cython"),
        ConversionStatus::FellBack => tracing::error!(
            %unit,
            error = outcome.error.as_deref().unwrap_or_default(),
            "conversion failed, keeping Python source"
        ),
        ConversionStatus::Skipped => tracing::info!(%unit, "skipped after cancellation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopObserver;
    use crate::testkit::{
        capture_logs, ScriptedToolchain, FAIL_MARKER, PANIC_MARKER, SCRIPTED_WARNING, WARN_MARKER,
    };
    use tempfile::TempDir;
    use tracing::Level;

    fn options() -> ConvertOptions {
        ConvertOptions {
            language_level: "3".to_string(),
            jobs: 2,
        }
    }

    #[test]
    fn test_successful_unit_keeps_source_and_intermediates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "from m import x, y\n").unwrap();

        let outcome = convert_unit(dir.path(), Path::new("a.py"), &ScriptedToolchain::new(), "3");

        assert_eq!(outcome.status, ConversionStatus::Converted);
        assert!(dir.path().join("a.py").exists());
        assert!(dir.path().join("a.c").exists());
        let pyx = fs::read_to_string(dir.path().join("a.pyx")).unwrap();
        assert_eq!(pyx, "from m import x\nfrom m import y\n");
    }

    #[test]
    fn test_translator_warnings_are_logged_for_converted_units() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("w.py"), format!("x = 1  # {}\n", WARN_MARKER)).unwrap();
        let toolchain = ScriptedToolchain::new();

        let (outcome, logs) = capture_logs(Level::DEBUG, || {
            convert_unit(dir.path(), Path::new("w.py"), &toolchain, "3")
        });

        assert_eq!(outcome.status, ConversionStatus::Converted);
        assert!(logs.contains("translator output"));
        assert!(logs.contains(SCRIPTED_WARNING));
        assert!(logs.contains("w.py"));
    }

    #[test]
    fn test_failed_unit_falls_back_without_partials() {
        let dir = TempDir::new().unwrap();
        let text = format!("x = 1  # {}\n", FAIL_MARKER);
        fs::write(dir.path().join("c.py"), &text).unwrap();

        let outcome = convert_unit(dir.path(), Path::new("c.py"), &ScriptedToolchain::new(), "3");

        assert_eq!(outcome.status, ConversionStatus::FellBack);
        assert!(!outcome.error.as_deref().unwrap_or("").is_empty());
        assert!(!dir.path().join("c.pyx").exists());
        assert!(!dir.path().join("c.c").exists());
        assert_eq!(fs::read_to_string(dir.path().join("c.py")).unwrap(), text);
    }

    #[test]
    fn test_panicking_toolchain_is_contained() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("p.py"), PANIC_MARKER).unwrap();

        let outcome = convert_unit(dir.path(), Path::new("p.py"), &ScriptedToolchain::new(), "3");

        assert_eq!(outcome.status, ConversionStatus::FellBack);
        assert!(outcome.error.unwrap().contains("panicked"));
        assert!(!dir.path().join("p.pyx").exists());
    }

    #[test]
    fn test_unreadable_unit_falls_back() {
        let dir = TempDir::new().unwrap();
        let outcome = convert_unit(dir.path(), Path::new("gone.py"), &ScriptedToolchain::new(), "3");
        assert_eq!(outcome.status, ConversionStatus::FellBack);
        assert!(outcome.error.unwrap().contains("Failed to read"));
    }

    #[test]
    fn test_convert_all_is_sorted_and_complete() {
        let dir = TempDir::new().unwrap();
        let units: Vec<PathBuf> = ["b.py", "a.py", "c.py"].iter().map(PathBuf::from).collect();
        for unit in &units {
            fs::write(dir.path().join(unit), "x = 1\n").unwrap();
        }

        let outcomes = convert_all(
            dir.path(),
            &units,
            &ScriptedToolchain::new(),
            &options(),
            &CancellationToken::new(),
            &NoopObserver,
        )
        .unwrap();

        let keys: Vec<_> = outcomes.iter().map(|o| o.key()).collect();
        assert_eq!(keys, vec!["a.py", "b.py", "c.py"]);
        assert!(outcomes.iter().all(|o| o.is_converted()));
    }

    #[test]
    fn test_cancelled_run_skips_every_unit() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let outcomes = convert_all(
            dir.path(),
            &[PathBuf::from("a.py")],
            &ScriptedToolchain::new(),
            &options(),
            &token,
            &NoopObserver,
        )
        .unwrap();

        assert_eq!(outcomes[0].status, ConversionStatus::Skipped);
        assert!(!dir.path().join("a.pyx").exists());
    }
}
