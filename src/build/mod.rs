//! Batched native build of every converted unit.

use crate::core::errors::BuildError;
use crate::core::BuildArtifact;
use crate::toolchain::{BuildLog, Toolchain};
use std::path::{Path, PathBuf};

/// Native extension suffixes: Linux/macOS and Windows.
const MODULE_SUFFIXES: &[&str] = &["so", "pyd"];

#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    /// Compiled module of each artifact, in artifact order.
    pub modules: Vec<PathBuf>,
    /// `None` when there was nothing to build.
    pub log: Option<BuildLog>,
}

/// Compile all artifacts in one toolchain invocation, then check that each
/// produced its module. A missing module fails the build.
pub fn build(
    root: &Path,
    artifacts: &[BuildArtifact],
    toolchain: &dyn Toolchain,
) -> Result<BuildSummary, BuildError> {
    if artifacts.is_empty() {
        tracing::info!("no converted units, skipping native build");
        return Ok(BuildSummary::default());
    }

    tracing::info!(modules = artifacts.len(), "starting batched native build");
    let log = toolchain.build_extensions(root, artifacts).inspect_err(|e| {
        if let BuildError::Failed { status, output } = e {
            tracing::error!(%status, %output, "native build failed");
        }
    })?;

    let mut modules = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let found = compiled_modules(root, &artifact.unit)?;
        match found.into_iter().next() {
            Some(module) => modules.push(module),
            None => {
                return Err(BuildError::MissingModule {
                    module: artifact.module_name.clone(),
                })
            }
        }
    }
    tracing::info!(modules = modules.len(), "native build complete");
    Ok(BuildSummary {
        modules,
        log: Some(log),
    })
}

/// Compiled modules on disk for `unit` (relative to `root`), sorted.
///
/// Matches `<stem>.so`, `<stem>.pyd` and the ABI-tagged `<stem>.<tag>.so` /
/// `<stem>.<tag>.pyd` forms in the unit's directory.
pub fn compiled_modules(root: &Path, unit: &Path) -> Result<Vec<PathBuf>, glob::PatternError> {
    let source = root.join(unit);
    let dir = source.parent().unwrap_or(root);
    let stem = match source.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => return Ok(Vec::new()),
    };
    let prefix = glob::Pattern::escape(&dir.join(&stem).to_string_lossy());

    let mut found = Vec::new();
    for suffix in MODULE_SUFFIXES {
        for pattern in [format!("{}.{}", prefix, suffix), format!("{}.*.{}", prefix, suffix)] {
            found.extend(
                glob::glob(&pattern)?
                    .filter_map(Result::ok)
                    .filter(|path| path.is_file()),
            );
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{capture_logs, ScriptedToolchain, SCRIPTED_BUILD_ERROR};
    use std::fs;
    use tempfile::TempDir;
    use tracing::Level;

    #[test]
    fn test_finds_plain_and_abi_tagged_modules() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        for name in [
            "pkg/views.cpython-312-x86_64-linux-gnu.so",
            "pkg/views.pyd",
            "pkg/views.py",
            "pkg/viewsets.so",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let found = compiled_modules(dir.path(), Path::new("pkg/views.py")).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["views.cpython-312-x86_64-linux-gnu.so", "views.pyd"]);
    }

    #[test]
    fn test_empty_batch_never_invokes_toolchain() {
        let dir = TempDir::new().unwrap();
        let toolchain = ScriptedToolchain::new();
        let summary = build(dir.path(), &[], &toolchain).unwrap();
        assert!(summary.log.is_none());
        assert_eq!(toolchain.builds(), 0);
    }

    #[test]
    fn test_single_invocation_for_all_artifacts() {
        let dir = TempDir::new().unwrap();
        let artifacts = vec![
            BuildArtifact::for_unit(Path::new("a.py")),
            BuildArtifact::for_unit(Path::new("b.py")),
        ];
        let toolchain = ScriptedToolchain::new();
        let summary = build(dir.path(), &artifacts, &toolchain).unwrap();
        assert_eq!(toolchain.builds(), 1);
        assert_eq!(summary.modules.len(), 2);
    }

    #[test]
    fn test_missing_module_is_fatal() {
        let dir = TempDir::new().unwrap();
        let artifacts = vec![
            BuildArtifact::for_unit(Path::new("a.py")),
            BuildArtifact::for_unit(Path::new("b.py")),
        ];
        let toolchain = ScriptedToolchain::new().omitting_module("b");
        let err = build(dir.path(), &artifacts, &toolchain).unwrap_err();
        assert!(matches!(err, BuildError::MissingModule { module } if module == "b"));
    }

    #[test]
    fn test_failed_build_output_is_logged_at_info() {
        let dir = TempDir::new().unwrap();
        let artifacts = vec![BuildArtifact::for_unit(Path::new("a.py"))];
        let toolchain = ScriptedToolchain::new().failing_build();

        let (result, logs) =
            capture_logs(Level::INFO, || build(dir.path(), &artifacts, &toolchain));

        assert!(result.is_err());
        assert!(logs.contains("native build failed"));
        assert!(logs.contains(SCRIPTED_BUILD_ERROR));
    }

    #[test]
    fn test_toolchain_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let artifacts = vec![BuildArtifact::for_unit(Path::new("a.py"))];
        let toolchain = ScriptedToolchain::new().failing_build();
        assert!(matches!(
            build(dir.path(), &artifacts, &toolchain),
            Err(BuildError::Failed { .. })
        ));
    }
}
