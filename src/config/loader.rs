use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::BuildConfig;
use crate::core::errors::ConfigError;

pub const CONFIG_FILE_NAME: &str = "pyxbuild.yaml";

/// Pure function to read config file contents
fn read_config_file(path: &Path) -> Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Pure function to parse and validate config from a YAML string
pub fn parse_and_validate_config(contents: &str, origin: &Path) -> Result<BuildConfig, ConfigError> {
    // An empty document deserializes to null; treat it as "all defaults".
    let config = if contents.trim().is_empty() {
        BuildConfig::default()
    } else {
        serde_yaml::from_str::<BuildConfig>(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?
    };
    config.validate()?;
    Ok(config)
}

/// Load an explicitly named configuration file. A missing file is an error.
pub fn load_config_from_path(path: &Path) -> Result<BuildConfig, ConfigError> {
    let contents = read_config_file(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_and_validate_config(&contents, path)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load `pyxbuild.yaml` from the invocation directory, or `explicit` when given.
///
/// Without an explicit path a missing file yields the defaults.
pub fn load_config(invocation_dir: &Path, explicit: Option<&Path>) -> Result<BuildConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from_path(path);
    }

    let path: PathBuf = invocation_dir.join(CONFIG_FILE_NAME);
    match read_config_file(&path) {
        Ok(contents) => {
            let config = parse_and_validate_config(&contents, &path)?;
            tracing::debug!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No {} in {}. Using default config.",
                CONFIG_FILE_NAME,
                invocation_dir.display()
            );
            Ok(BuildConfig::default())
        }
        Err(source) => Err(ConfigError::Read { path, source }),
    }
}

/// Commented default configuration written by `pyxbuild init`.
pub fn default_config_yaml() -> &'static str {
    r#"# pyxbuild configuration

build:
  # Staging/output tree; destroyed and rebuilt on every run
  path: build
  keep_intermediates: false
  # 0 = use all available cores
  jobs: 0
  analyze: true

exclude:
  # Never converted, always kept as Python
  files:
    - __init__.py
    - manage.py
    - settings.py
    - urls.py
    - wsgi.py
    - asgi.py
  dirs:
    - migrations
    - tests
  # Never copied into the build tree
  copying_files:
    - pyxbuild.yaml
  copying_dirs:
    - .git
    - .github
    - venv
    - .venv
    - env
    - virtualenv
    - __pycache__
    - .pytest_cache
    - node_modules
    - logs

cython:
  language_level: "3"

logging:
  dir: logs
  filename: "build_{timestamp}.log"

report:
  path: cython_compatibility_report.txt
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use tempfile::TempDir;

    #[test]
    fn test_default_yaml_matches_default_struct() {
        let parsed = parse_and_validate_config(default_config_yaml(), Path::new("init")).unwrap();
        assert_eq!(parsed, BuildConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let yaml = indoc! {r#"
            build:
              path: out
            cython:
              language_level: "3str"
        "#};
        let config = parse_and_validate_config(yaml, Path::new("x.yaml")).unwrap();
        assert_eq!(config.build.path, PathBuf::from("out"));
        assert_eq!(config.cython.language_level, "3str");
        assert_eq!(config.exclude, super::super::ExcludeConfig::default());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = parse_and_validate_config("  \n", Path::new("x.yaml")).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn test_invalid_yaml_names_file() {
        let err = parse_and_validate_config("build: [", Path::new("broken.yaml")).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_missing_implicit_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(matches!(
            load_config(dir.path(), Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_loads_file_from_invocation_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "build:\n  jobs: 3\n").unwrap();
        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.build.jobs, 3);
    }
}
