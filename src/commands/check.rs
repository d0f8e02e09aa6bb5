use crate::analyzers::analyze_units;
use crate::cli::{CheckArgs, CheckFormat};
use crate::config::load_config;
use crate::io::{self, load_units, ExclusionPolicy, UnitWalker};
use crate::report::render_report;
use anyhow::{Context, Result};
use std::fs;

/// Analyze the source tree in place and print or save the report.
pub fn run_check(args: CheckArgs) -> Result<()> {
    let invocation_dir = std::env::current_dir().context("Failed to determine current directory")?;
    let config = load_config(&invocation_dir, args.config.as_deref())?;
    let policy = ExclusionPolicy::from_config(&config.exclude);

    let source = invocation_dir.join(&args.source);
    let source = fs::canonicalize(&source)
        .with_context(|| format!("Source directory {} not found", source.display()))?;

    let mut walker = UnitWalker::new(source.clone(), &policy).prune_copy_excluded(true);
    if let Ok(build_root) = fs::canonicalize(config.build_root(&invocation_dir)) {
        walker = walker.with_skip_dir(build_root);
    }
    let paths = walker.walk()?;
    let units = load_units(&source, &paths, &policy)?;
    let report = analyze_units(&units);

    let rendered = match args.format {
        CheckFormat::Text => render_report(&report, &[]),
        CheckFormat::Json => serde_json::to_string_pretty(&report)? + "\n",
    };

    match &args.output {
        Some(path) => {
            io::write_file(path, &rendered)?;
            println!("Report saved to {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
