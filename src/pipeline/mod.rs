//! Run orchestration: stage, analyze, convert, build, reconcile, report.
//!
//! Each phase takes its inputs by reference and hands its results to the
//! next through return values. The [`StateMachine`] only moves forward, and
//! the only way to end a run early is [`PipelineState::Failed`], which is
//! reachable only before reconciliation has deleted anything.
//!
//! A state is entered once the phase producing it has succeeded, so the
//! history names the last completed phase rather than the failing one:
//! `Init → Failed` is a staging failure and `Converted → Failed` is either
//! cancellation at the build barrier or a failed batched build.

pub mod cancel;
pub mod state;

pub use cancel::CancellationToken;
pub use state::{PipelineState, StateMachine};

use crate::analyzers::{analyze_units, inventory};
use crate::build::build;
use crate::config::BuildConfig;
use crate::conversion::{convert_all, ConvertOptions};
use crate::core::errors::{error_chain, ConfigError, PipelineError};
use crate::core::{BuildArtifact, CompatibilityReport, ConversionOutcome, OutcomeCounts, SourceUnit};
use crate::io::{discover_units, stage, ExclusionPolicy};
use crate::progress::{NoopObserver, Phase, ProgressObserver};
use crate::reconcile::{clear_stale_outputs, reconcile, ReconcileSummary};
use crate::report::{render_report, ReportTotals};
use crate::toolchain::Toolchain;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info_span;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub staging_root: PathBuf,
    pub outcomes: Vec<ConversionOutcome>,
    pub analysis: CompatibilityReport,
    pub report_text: String,
    /// `None` when writing the report file failed (logged, not fatal).
    pub report_path: Option<PathBuf>,
    pub totals: ReportTotals,
    pub counts: OutcomeCounts,
    pub reconciled: ReconcileSummary,
    pub history: Vec<PipelineState>,
}

impl RunSummary {
    /// Units that fell back, in path order.
    pub fn fell_back(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.error.is_some())
            .map(ConversionOutcome::key)
            .collect()
    }
}

pub struct Pipeline<'a> {
    config: &'a BuildConfig,
    source_root: PathBuf,
    invocation_dir: PathBuf,
    toolchain: &'a dyn Toolchain,
    observer: &'a dyn ProgressObserver,
    token: CancellationToken,
}

impl<'a> Pipeline<'a> {
    /// Relative paths (`source_root` and the configured ones) resolve against
    /// `invocation_dir`.
    pub fn new(
        config: &'a BuildConfig,
        source_root: &Path,
        invocation_dir: &Path,
        toolchain: &'a dyn Toolchain,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        config.validate_roots(source_root, invocation_dir)?;
        Ok(Self {
            config,
            source_root: invocation_dir.join(source_root),
            invocation_dir: invocation_dir.to_path_buf(),
            toolchain,
            observer: &NoopObserver,
            token: CancellationToken::new(),
        })
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut machine = StateMachine::new();
        self.execute(&mut machine)
    }

    /// Run from `Init`, recording every transition in `machine`.
    pub fn execute(&self, machine: &mut StateMachine) -> Result<RunSummary, PipelineError> {
        let result = self.drive(machine);
        if let Err(e) = &result {
            machine.fail();
            tracing::error!(error = %error_chain(e), "build run failed");
        }
        result
    }

    fn drive(&self, machine: &mut StateMachine) -> Result<RunSummary, PipelineError> {
        let policy = ExclusionPolicy::from_config(&self.config.exclude);
        let build_root = self.config.build_root(&self.invocation_dir);

        let staged = self.phase(Phase::Staging, 0, || -> Result<_, PipelineError> {
            let tree = stage(&self.source_root, &build_root, &policy)?;
            let units = discover_units(&tree.root, &policy)?;
            let convertible: Vec<PathBuf> = units
                .iter()
                .filter(|unit| !unit.excluded_from_conversion)
                .map(|unit| unit.path.clone())
                .collect();
            clear_stale_outputs(&tree.root, &convertible)?;
            Ok((tree.root, units, convertible))
        });
        let (staging_root, units, convertible) = staged?;
        machine.advance(PipelineState::Staged);

        let analysis = self.phase(Phase::Analysis, 0, || self.analyze(&units));

        let options = ConvertOptions {
            language_level: self.config.cython.language_level.clone(),
            jobs: self.config.build.jobs,
        };
        let outcomes = self.phase(Phase::Conversion, convertible.len(), || {
            convert_all(
                &staging_root,
                &convertible,
                self.toolchain,
                &options,
                &self.token,
                self.observer,
            )
        })?;
        machine.advance(PipelineState::Converted);

        if self.token.is_cancelled() {
            return Err(PipelineError::Cancelled {
                state: machine.current(),
            });
        }

        let artifacts: Vec<BuildArtifact> = outcomes
            .iter()
            .filter_map(|o| o.artifact.clone())
            .collect();
        self.phase(Phase::Build, 0, || {
            build(&staging_root, &artifacts, self.toolchain)
        })?;
        machine.advance(PipelineState::Built);

        let reconciled = self.phase(Phase::Reconcile, 0, || {
            reconcile(&staging_root, &outcomes, self.config.build.keep_intermediates)
        })?;
        machine.advance(PipelineState::Reconciled);

        let (report_text, report_path) =
            self.phase(Phase::Report, 0, || self.write_report(&analysis, &outcomes));
        machine.advance(PipelineState::Reported);

        let totals = ReportTotals::compute(&analysis, &outcomes);
        let counts = OutcomeCounts::tally(&outcomes);
        tracing::info!(
            converted = counts.converted,
            fell_back = counts.fell_back,
            excluded = totals.excluded,
            "build run complete"
        );
        machine.advance(PipelineState::Done);

        Ok(RunSummary {
            staging_root,
            outcomes,
            analysis,
            report_text,
            report_path,
            totals,
            counts,
            reconciled,
            history: machine.history().to_vec(),
        })
    }

    fn phase<T>(&self, phase: Phase, work_items: usize, body: impl FnOnce() -> T) -> T {
        let _span = info_span!("phase", name = ?phase).entered();
        tracing::info!("{}", phase);
        self.observer.phase_started(phase, work_items);
        let result = body();
        self.observer.phase_finished(phase);
        result
    }

    fn analyze(&self, units: &[SourceUnit]) -> CompatibilityReport {
        if self.config.build.analyze {
            let report = analyze_units(units);
            tracing::info!(
                units = report.scanned.len(),
                diagnostics = report.total_diagnostics(),
                "compatibility analysis complete"
            );
            report
        } else {
            tracing::info!("compatibility analysis disabled");
            inventory(units)
        }
    }

    fn write_report(
        &self,
        analysis: &CompatibilityReport,
        outcomes: &[ConversionOutcome],
    ) -> (String, Option<PathBuf>) {
        let text = render_report(analysis, outcomes);
        let path = self.config.report_path(&self.invocation_dir);
        match fs::write(&path, &text) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "report saved");
                (text, Some(path))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to write report");
                (text, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConversionStatus;
    use crate::testkit::{
        capture_logs, write_project, ScriptedToolchain, FAIL_MARKER, SCRIPTED_BUILD_ERROR,
    };
    use tempfile::TempDir;
    use tracing::Level;

    fn config() -> BuildConfig {
        let mut config = BuildConfig::default();
        config.build.jobs = 2;
        config
    }

    #[test]
    fn test_happy_path_reaches_done() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), &[("src/app.py", "x = 1\n")]);
        let config = config();
        let toolchain = ScriptedToolchain::new();

        let pipeline = Pipeline::new(&config, Path::new("src"), dir.path(), &toolchain).unwrap();
        let summary = pipeline.run().unwrap();

        assert_eq!(summary.history.last(), Some(&PipelineState::Done));
        assert_eq!(summary.counts.converted, 1);
        assert!(summary.report_path.unwrap().exists());
    }

    #[test]
    fn test_build_failure_fails_before_reconcile() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), &[("src/app.py", "x = 1\n")]);
        let config = config();
        let toolchain = ScriptedToolchain::new().failing_build();

        let pipeline = Pipeline::new(&config, Path::new("src"), dir.path(), &toolchain).unwrap();
        let mut machine = StateMachine::new();
        let err = pipeline.execute(&mut machine).unwrap_err();

        assert!(matches!(err, PipelineError::Build(_)));
        assert_eq!(
            machine.history(),
            &[
                PipelineState::Init,
                PipelineState::Staged,
                PipelineState::Converted,
                PipelineState::Failed
            ]
        );
        assert!(dir.path().join("build/app.py").exists());
    }

    #[test]
    fn test_build_failure_logs_cause_and_compiler_output() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), &[("src/app.py", "x = 1\n")]);
        let config = config();
        let toolchain = ScriptedToolchain::new().failing_build();

        let pipeline = Pipeline::new(&config, Path::new("src"), dir.path(), &toolchain).unwrap();
        let (result, logs) = capture_logs(Level::INFO, || pipeline.run());

        assert!(result.is_err());
        assert!(logs.contains(SCRIPTED_BUILD_ERROR));
        assert!(logs.contains("Native build exited with exit status: 1"));
    }

    #[test]
    fn test_missing_source_fails_in_staging() {
        let dir = TempDir::new().unwrap();
        let config = config();
        let toolchain = ScriptedToolchain::new();

        let pipeline = Pipeline::new(&config, Path::new("nope"), dir.path(), &toolchain).unwrap();
        let mut machine = StateMachine::new();
        let err = pipeline.execute(&mut machine).unwrap_err();

        assert!(matches!(err, PipelineError::Staging(_)));
        assert_eq!(machine.history(), &[PipelineState::Init, PipelineState::Failed]);
    }

    #[test]
    fn test_cancelled_run_keeps_every_source() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), &[("src/a.py", "x = 1\n"), ("src/b.py", "y = 2\n")]);
        let config = config();
        let toolchain = ScriptedToolchain::new();
        let token = CancellationToken::new();
        token.cancel();

        let pipeline = Pipeline::new(&config, Path::new("src"), dir.path(), &toolchain)
            .unwrap()
            .with_cancellation(token);
        let err = pipeline.run().unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Cancelled {
                state: PipelineState::Converted
            }
        ));
        assert_eq!(toolchain.translations(), 0);
        assert_eq!(toolchain.builds(), 0);
        assert!(dir.path().join("build/a.py").exists());
        assert!(dir.path().join("build/b.py").exists());
    }

    #[test]
    fn test_fallback_does_not_fail_the_run() {
        let dir = TempDir::new().unwrap();
        let broken = format!("x = 1  # {}\n", FAIL_MARKER);
        write_project(dir.path(), &[("src/ok.py", "x = 1\n"), ("src/bad.py", &broken)]);
        let config = config();
        let toolchain = ScriptedToolchain::new();

        let pipeline = Pipeline::new(&config, Path::new("src"), dir.path(), &toolchain).unwrap();
        let summary = pipeline.run().unwrap();

        let statuses: Vec<_> = summary.outcomes.iter().map(|o| o.status).collect();
        assert_eq!(statuses, vec![ConversionStatus::FellBack, ConversionStatus::Converted]);
        assert_eq!(summary.fell_back(), vec!["bad.py"]);
        assert_eq!(fs::read_to_string(dir.path().join("build/bad.py")).unwrap(), broken);
    }

    #[test]
    fn test_build_root_containing_source_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.build.path = PathBuf::from(".");
        let toolchain = ScriptedToolchain::new();
        assert!(Pipeline::new(&config, Path::new("src"), dir.path(), &toolchain).is_err());
    }
}
