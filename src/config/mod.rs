//! Build configuration.
//!
//! Loaded once at startup from `pyxbuild.yaml` and passed by reference into
//! every component. Nothing in the crate reads configuration from globals.

mod loader;

pub use loader::{
    default_config_yaml, load_config, load_config_from_path, parse_and_validate_config,
    CONFIG_FILE_NAME,
};

use crate::core::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub build: BuildSettings,
    pub exclude: ExcludeConfig,
    pub cython: CythonConfig,
    pub logging: LoggingConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Staging/output tree. Relative paths resolve against the invocation directory.
    pub path: PathBuf,
    /// Keep `.pyx` and `.c` files next to compiled modules.
    pub keep_intermediates: bool,
    /// Conversion workers; 0 selects the available parallelism.
    pub jobs: usize,
    /// Run the compatibility analyzer before conversion.
    pub analyze: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("build"),
            keep_intermediates: false,
            jobs: 0,
            analyze: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeConfig {
    /// File names never converted (entry points, settings, routing).
    pub files: Vec<String>,
    /// Directory names whose direct children are never converted.
    pub dirs: Vec<String>,
    /// File names never copied into the staging tree.
    pub copying_files: Vec<String>,
    /// Directory names pruned from the staging copy at any depth.
    pub copying_dirs: Vec<String>,
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            files: default_exclude_files(),
            dirs: vec!["migrations".into(), "tests".into()],
            copying_files: vec![CONFIG_FILE_NAME.into()],
            copying_dirs: default_copying_dirs(),
        }
    }
}

fn default_exclude_files() -> Vec<String> {
    [
        "__init__.py",
        "manage.py",
        "settings.py",
        "urls.py",
        "wsgi.py",
        "asgi.py",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_copying_dirs() -> Vec<String> {
    [
        ".git",
        ".github",
        "venv",
        ".venv",
        "env",
        "virtualenv",
        "__pycache__",
        ".pytest_cache",
        "node_modules",
        "logs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CythonConfig {
    pub language_level: String,
    /// Cython translator; looked up on PATH when unset.
    pub executable: Option<PathBuf>,
    /// Python interpreter driving `build_ext`; looked up on PATH when unset.
    pub python: Option<PathBuf>,
}

impl Default for CythonConfig {
    fn default() -> Self {
        Self {
            language_level: "3".into(),
            executable: None,
            python: None,
        }
    }
}

const LANGUAGE_LEVELS: &[&str] = &["2", "3", "3str"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    /// `{timestamp}` is replaced with the local start time.
    pub filename: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            filename: "build_{timestamp}.log".into(),
        }
    }
}

impl LoggingConfig {
    pub fn file_name_at(&self, timestamp: &chrono::DateTime<chrono::Local>) -> String {
        self.filename
            .replace("{timestamp}", &timestamp.format("%Y%m%d_%H%M%S").to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cython_compatibility_report.txt"),
        }
    }
}

impl BuildConfig {
    /// Staging root as an absolute path.
    pub fn build_root(&self, invocation_dir: &Path) -> PathBuf {
        absolutize(&self.build.path, invocation_dir)
    }

    pub fn report_path(&self, invocation_dir: &Path) -> PathBuf {
        absolutize(&self.report.path, invocation_dir)
    }

    pub fn log_dir(&self, invocation_dir: &Path) -> PathBuf {
        absolutize(&self.logging.dir, invocation_dir)
    }

    /// Field-level checks that do not depend on the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LANGUAGE_LEVELS.contains(&self.cython.language_level.as_str()) {
            return Err(ConfigError::invalid(
                "cython.language_level",
                format!(
                    "`{}` is not one of {}",
                    self.cython.language_level,
                    LANGUAGE_LEVELS.join(", ")
                ),
            ));
        }
        if self.logging.filename.trim().is_empty() {
            return Err(ConfigError::invalid("logging.filename", "must not be empty"));
        }
        if self.build.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("build.path", "must not be empty"));
        }
        Ok(())
    }

    /// The staging root is destroyed on every run, so it may neither be the
    /// source root nor contain it.
    pub fn validate_roots(&self, source_root: &Path, invocation_dir: &Path) -> Result<(), ConfigError> {
        let build_root = normalize(&self.build_root(invocation_dir));
        let source_root = normalize(&absolutize(source_root, invocation_dir));
        if source_root.starts_with(&build_root) {
            return Err(ConfigError::invalid(
                "build.path",
                format!(
                    "{} would contain the source tree {}",
                    build_root.display(),
                    source_root.display()
                ),
            ));
        }
        Ok(())
    }
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Lexical normalization (`.` and `..`) without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_language_level() {
        let mut config = BuildConfig::default();
        config.cython.language_level = "4".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cython.language_level"));
    }

    #[test]
    fn test_build_root_resolves_against_invocation_dir() {
        let config = BuildConfig::default();
        assert_eq!(
            config.build_root(Path::new("/work/project")),
            PathBuf::from("/work/project/build")
        );
    }

    #[test]
    fn test_build_root_nested_in_source_is_allowed() {
        let config = BuildConfig::default();
        assert!(config
            .validate_roots(Path::new("."), Path::new("/work/project"))
            .is_ok());
    }

    #[test]
    fn test_build_root_equal_to_source_is_rejected() {
        let mut config = BuildConfig::default();
        config.build.path = PathBuf::from(".");
        assert!(config
            .validate_roots(Path::new("."), Path::new("/work/project"))
            .is_err());
    }

    #[test]
    fn test_build_root_containing_source_is_rejected() {
        let mut config = BuildConfig::default();
        config.build.path = PathBuf::from("..");
        assert!(config
            .validate_roots(Path::new("."), Path::new("/work/project"))
            .is_err());
    }

    #[test]
    fn test_log_file_name_substitutes_timestamp() {
        use chrono::TimeZone;
        let at = chrono::Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            LoggingConfig::default().file_name_at(&at),
            "build_20240309_140507.log"
        );
    }
}
