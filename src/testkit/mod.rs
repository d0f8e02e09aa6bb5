//! Test support: a scripted toolchain and project fixtures.
//!
//! [`ScriptedToolchain`] stands in for Cython and setuptools so pipeline tests
//! run without either installed. Translation fails for units containing
//! [`FAIL_MARKER`], panics for [`PANIC_MARKER`], succeeds with warning text
//! for [`WARN_MARKER`], and every build writes a fake `<stem>.cpython-test.so`
//! next to each artifact's unit. [`capture_logs`] records the tracing events
//! emitted on the calling thread.

use crate::core::errors::BuildError;
use crate::core::BuildArtifact;
use crate::toolchain::{BuildLog, Toolchain, TranslateResult};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

pub const FAIL_MARKER: &str = "pyxbuild-test: fail translation";
pub const PANIC_MARKER: &str = "pyxbuild-test: panic in translation";
pub const WARN_MARKER: &str = "pyxbuild-test: translation warning";
pub const SCRIPTED_WARNING: &str = "warning: scripted translator warning";
pub const SCRIPTED_BUILD_ERROR: &str = "error: command 'gcc' failed with exit code 1";
pub const FAKE_MODULE_SUFFIX: &str = "cpython-test.so";

#[derive(Debug, Default)]
pub struct ScriptedToolchain {
    fail_build: bool,
    omit_module: Option<String>,
    translations: AtomicUsize,
    builds: AtomicUsize,
}

impl ScriptedToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the batched build exit with a failure.
    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    /// Report build success without producing `module`.
    pub fn omitting_module(mut self, module: &str) -> Self {
        self.omit_module = Some(module.to_string());
        self
    }

    pub fn translations(&self) -> usize {
        self.translations.load(Ordering::SeqCst)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl Toolchain for ScriptedToolchain {
    fn translate(&self, pyx: &Path, c_out: &Path, _language_level: &str) -> TranslateResult {
        self.translations.fetch_add(1, Ordering::SeqCst);
        let text = match fs::read_to_string(pyx) {
            Ok(text) => text,
            Err(e) => return TranslateResult::failed(e.to_string()),
        };
        if text.contains(PANIC_MARKER) {
            panic!("scripted translation panic for {}", pyx.display());
        }
        if text.contains(FAIL_MARKER) {
            return TranslateResult::failed(format!(
                "Error compiling Cython file:\n{}:1:0: scripted failure",
                pyx.display()
            ));
        }
        let warnings = if text.contains(WARN_MARKER) {
            format!("{}:1:0: {}", pyx.display(), SCRIPTED_WARNING)
        } else {
            String::new()
        };
        match fs::write(c_out, format!("/* generated from {} */\n", pyx.display())) {
            Ok(()) => TranslateResult::succeeded(warnings),
            Err(e) => TranslateResult::failed(e.to_string()),
        }
    }

    fn build_extensions(
        &self,
        root: &Path,
        artifacts: &[BuildArtifact],
    ) -> Result<BuildLog, BuildError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_build {
            return Err(BuildError::Failed {
                status: "exit status: 1".to_string(),
                output: SCRIPTED_BUILD_ERROR.to_string(),
            });
        }
        for artifact in artifacts {
            if self.omit_module.as_deref() == Some(artifact.module_name.as_str()) {
                continue;
            }
            let module = root
                .join(&artifact.unit)
                .with_file_name(format!("{}.{}", artifact.stem(), FAKE_MODULE_SUFFIX));
            fs::write(&module, b"\x7fELF").map_err(|source| BuildError::Script {
                path: module.clone(),
                source,
            })?;
        }
        Ok(BuildLog {
            command: "scripted build_ext".to_string(),
            output: format!("built {} extensions", artifacts.len()),
        })
    }
}

/// Write `files` (relative path, contents) under `root`.
pub fn write_project(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture directory");
        }
        fs::write(&path, contents).expect("write fixture file");
    }
}

/// Every regular file under `root`, keyed by forward-slash relative path.
pub fn snapshot_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let contents = fs::read(entry.path()).ok()?;
            Some((crate::core::unit_key(relative), contents))
        })
        .collect()
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<parking_lot::Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `body` with a plain-text subscriber at `level` and return what it logged.
///
/// Only events from the calling thread are captured; rayon workers log to
/// the global subscriber instead.
pub fn capture_logs<T>(level: tracing::Level, body: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, body);
    let text = String::from_utf8_lossy(&buffer.0.lock()).into_owned();
    (result, text)
}
