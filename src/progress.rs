//! Progress feedback for pipeline runs.
//!
//! The orchestrator reports phase boundaries and finished units to a
//! [`ProgressObserver`]. Observers carry no pipeline logic: [`NoopObserver`]
//! is used by tests and `--quiet`, [`IndicatifObserver`] drives the console.
//!
//! # Progress Behavior
//!
//! - **Quiet Mode**: No progress output (`PYXBUILD_QUIET` env var or `--quiet`)
//! - **Non-TTY**: Bars are hidden in CI and piped output

use crate::core::ConversionStatus;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const TEMPLATE_CONVERSION: &str =
    "{spinner} {msg} [{bar:30}] {pos}/{len} files ({percent}%) - {eta}";
pub const TEMPLATE_SPINNER: &str = "{spinner} {msg}";

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Pipeline phases visible to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Staging,
    Analysis,
    Conversion,
    Build,
    Reconcile,
    Report,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Staging => "Copying project files",
            Self::Analysis => "Checking Cython compatibility",
            Self::Conversion => "Converting files to Cython",
            Self::Build => "Building native extensions",
            Self::Reconcile => "Cleaning up build tree",
            Self::Report => "Writing compatibility report",
        };
        f.write_str(label)
    }
}

pub trait ProgressObserver: Send + Sync {
    /// `work_items` is the number of `unit_finished` calls to expect, 0 if none.
    fn phase_started(&self, _phase: Phase, _work_items: usize) {}
    fn unit_finished(&self, _unit: &Path, _status: ConversionStatus) {}
    fn phase_finished(&self, _phase: Phase) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Configuration for progress display behavior
#[derive(Debug, Clone, Default)]
pub struct ProgressConfig {
    pub quiet_mode: bool,
}

impl ProgressConfig {
    pub fn from_env(quiet: bool) -> Self {
        let env_quiet = std::env::var("PYXBUILD_QUIET").is_ok();
        Self {
            quiet_mode: quiet || env_quiet,
        }
    }

    pub fn should_show_progress(&self) -> bool {
        if self.quiet_mode {
            return false;
        }
        use std::io::IsTerminal;
        std::io::stderr().is_terminal()
    }
}

/// Console observer: a spinner per phase, a bar for per-unit phases.
pub struct IndicatifObserver {
    multi: MultiProgress,
    config: ProgressConfig,
    current: Mutex<Option<ProgressBar>>,
}

impl IndicatifObserver {
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            multi: MultiProgress::new(),
            config,
            current: Mutex::new(None),
        }
    }

    fn create_bar(&self, len: u64) -> ProgressBar {
        if !self.config.should_show_progress() {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(len));
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE_CONVERSION) {
            pb.set_style(style.progress_chars("█▓▒░  ").tick_chars(TICK_CHARS));
        }
        pb
    }

    fn create_spinner(&self) -> ProgressBar {
        if !self.config.should_show_progress() {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template(TEMPLATE_SPINNER) {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Remove every bar before the summary is printed.
    pub fn clear(&self) -> std::io::Result<()> {
        self.multi.clear()
    }
}

impl ProgressObserver for IndicatifObserver {
    fn phase_started(&self, phase: Phase, work_items: usize) {
        let pb = if work_items > 0 {
            self.create_bar(work_items as u64)
        } else {
            self.create_spinner()
        };
        pb.set_message(phase.to_string());
        if let Some(previous) = self.current.lock().replace(pb) {
            previous.finish_and_clear();
        }
    }

    fn unit_finished(&self, _unit: &Path, _status: ConversionStatus) {
        if let Some(pb) = self.current.lock().as_ref() {
            pb.inc(1);
        }
    }

    fn phase_finished(&self, _phase: Phase) {
        if let Some(pb) = self.current.lock().take() {
            pb.finish_and_clear();
        }
    }
}
