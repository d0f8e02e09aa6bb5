use crate::cli::BuildArgs;
use crate::config::{load_config, BuildConfig};
use crate::observability::{init_logging, install_panic_hook};
use crate::pipeline::{Pipeline, RunSummary};
use crate::progress::{IndicatifObserver, ProgressConfig};
use crate::toolchain::CythonToolchain;
use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::path::Path;

/// Apply command-line overrides on top of the loaded configuration.
pub fn apply_overrides(mut config: BuildConfig, args: &BuildArgs) -> BuildConfig {
    if let Some(output) = &args.output {
        config.build.path = output.clone();
    }
    if let Some(jobs) = args.jobs {
        config.build.jobs = jobs;
    }
    if args.no_analyze {
        config.build.analyze = false;
    }
    if args.keep_intermediates {
        config.build.keep_intermediates = true;
    }
    if let Some(report) = &args.report {
        config.report.path = report.clone();
    }
    config
}

pub fn run_build(args: BuildArgs) -> Result<()> {
    let invocation_dir = std::env::current_dir().context("Failed to determine current directory")?;
    let config = load_config(&invocation_dir, args.config.as_deref())?;
    let config = apply_overrides(config, &args);
    config.validate()?;
    config.validate_roots(&args.source, &invocation_dir)?;

    let log_file = init_logging(&config.logging, &config.log_dir(&invocation_dir), args.verbose)?;
    install_panic_hook();

    let toolchain = CythonToolchain::locate(&config.cython)?;
    let observer = IndicatifObserver::new(ProgressConfig::from_env(args.quiet));
    let pipeline = Pipeline::new(&config, &args.source, &invocation_dir, &toolchain)?
        .with_observer(&observer);

    let result = pipeline.run();
    let _ = observer.clear();
    let summary =
        result.with_context(|| format!("Build failed; see {} for details", log_file.display()))?;

    print!("{}", format_summary(&summary, &invocation_dir));
    Ok(())
}

/// Console summary printed after a successful run.
pub fn format_summary(summary: &RunSummary, invocation_dir: &Path) -> String {
    let output = pathdiff::diff_paths(&summary.staging_root, invocation_dir)
        .filter(|relative| !relative.as_os_str().is_empty())
        .unwrap_or_else(|| summary.staging_root.clone());

    let mut out = String::new();
    let _ = writeln!(out, "{}", "Build process completed successfully.".green().bold());
    let _ = writeln!(out, "Output: {}", output.display());
    let _ = writeln!(
        out,
        "Converted: {}  Fell back: {}  Excluded: {}",
        summary.counts.converted, summary.counts.fell_back, summary.totals.excluded
    );
    if let Some(report) = &summary.report_path {
        let _ = writeln!(out, "Report: {}", report.display());
    }

    let fell_back = summary.fell_back();
    if !fell_back.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            format!(
                "Note: {} files could not be converted to Cython and remain as Python files.",
                fell_back.len()
            )
            .yellow()
        );
        for unit in fell_back {
            let _ = writeln!(out, "  - {}", unit);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_overrides_replace_config_values() {
        let args = BuildArgs {
            output: Some(PathBuf::from("dist")),
            jobs: Some(3),
            no_analyze: true,
            keep_intermediates: true,
            report: Some(PathBuf::from("out/report.txt")),
            ..BuildArgs::default()
        };
        let config = apply_overrides(BuildConfig::default(), &args);
        assert_eq!(config.build.path, PathBuf::from("dist"));
        assert_eq!(config.build.jobs, 3);
        assert!(!config.build.analyze);
        assert!(config.build.keep_intermediates);
        assert_eq!(config.report.path, PathBuf::from("out/report.txt"));
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let config = apply_overrides(BuildConfig::default(), &BuildArgs::default());
        assert_eq!(config, BuildConfig::default());
    }
}
