//! `cython` + setuptools `build_ext` backed toolchain.

use super::{combined_output, BuildLog, Toolchain, TranslateResult};
use crate::config::CythonConfig;
use crate::core::errors::BuildError;
use crate::core::{unit_key, BuildArtifact};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Throw-away setuptools script written into the staging root.
pub const SETUP_SCRIPT_NAME: &str = ".pyxbuild_setup.py";
/// Object-file directory handed to `build_ext --build-temp`.
pub const BUILD_TEMP_DIR: &str = ".pyxbuild-temp";

const COMMON_COMPILE_ARGS: &[&str] = &[
    "-Wno-unreachable-code",
    "-Wno-unused-function",
    "-Wno-unused-variable",
];
const MACOS_COMPILE_ARGS: &[&str] = &["-Wno-unreachable-code-fallthrough", "-Wno-unused-private-field"];

#[derive(Debug, Clone)]
pub struct CythonToolchain {
    cython: PathBuf,
    python: PathBuf,
}

impl CythonToolchain {
    /// Resolve both executables, preferring configured paths over `PATH`.
    pub fn locate(config: &CythonConfig) -> Result<Self, BuildError> {
        let cython = match &config.executable {
            Some(path) => path.clone(),
            None => which::which("cython").map_err(|source| BuildError::ToolNotFound {
                tool: "cython".to_string(),
                source,
            })?,
        };
        let python = match &config.python {
            Some(path) => path.clone(),
            None => which::which("python3")
                .or_else(|_| which::which("python"))
                .map_err(|source| BuildError::ToolNotFound {
                    tool: "python3".to_string(),
                    source,
                })?,
        };
        tracing::debug!(cython = %cython.display(), python = %python.display(), "toolchain located");
        Ok(Self { cython, python })
    }

    pub fn new(cython: PathBuf, python: PathBuf) -> Self {
        Self { cython, python }
    }
}

impl Toolchain for CythonToolchain {
    fn translate(&self, pyx: &Path, c_out: &Path, language_level: &str) -> TranslateResult {
        let output = Command::new(&self.cython)
            .arg("-X")
            .arg(format!("language_level={}", language_level))
            .arg("-o")
            .arg(c_out)
            .arg(pyx)
            .output();

        match output {
            Ok(output) => {
                let text = combined_output(&output);
                if output.status.success() {
                    TranslateResult::succeeded(text)
                } else if text.is_empty() {
                    TranslateResult::failed(format!("cython exited with {}", output.status))
                } else {
                    TranslateResult::failed(text)
                }
            }
            Err(e) => TranslateResult::failed(format!(
                "Failed to launch {}: {}",
                self.cython.display(),
                e
            )),
        }
    }

    fn build_extensions(
        &self,
        root: &Path,
        artifacts: &[BuildArtifact],
    ) -> Result<BuildLog, BuildError> {
        let script = root.join(SETUP_SCRIPT_NAME);
        fs::write(&script, setup_script(artifacts)).map_err(|source| BuildError::Script {
            path: script.clone(),
            source,
        })?;

        let args = [
            SETUP_SCRIPT_NAME,
            "build_ext",
            "--inplace",
            "--build-temp",
            BUILD_TEMP_DIR,
        ];
        let command = format!("{} {}", self.python.display(), args.join(" "));
        tracing::debug!(%command, modules = artifacts.len(), "running batched native build");

        let result = Command::new(&self.python)
            .args(args)
            .current_dir(root)
            .output();

        cleanup(root, &script);

        let output = result.map_err(|source| BuildError::Spawn {
            program: self.python.clone(),
            source,
        })?;
        let text = combined_output(&output);
        if !output.status.success() {
            return Err(BuildError::Failed {
                status: output.status.to_string(),
                output: text,
            });
        }
        tracing::debug!(output = %text, "native build output");
        Ok(BuildLog {
            command,
            output: text,
        })
    }
}

fn cleanup(root: &Path, script: &Path) {
    if let Err(e) = crate::io::remove_if_exists(script) {
        tracing::warn!(path = %script.display(), error = %e, "failed to remove build script");
    }
    let temp = root.join(BUILD_TEMP_DIR);
    if temp.exists() {
        if let Err(e) = fs::remove_dir_all(&temp) {
            tracing::warn!(path = %temp.display(), error = %e, "failed to remove build temp dir");
        }
    }
}

fn compile_args() -> Vec<&'static str> {
    let mut args = COMMON_COMPILE_ARGS.to_vec();
    if cfg!(target_os = "macos") {
        args.extend_from_slice(MACOS_COMPILE_ARGS);
    }
    args
}

/// Python string literal for `value`. JSON string syntax is a subset of Python's.
fn py_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
}

/// Render the setuptools script compiling every artifact's C file.
pub fn setup_script(artifacts: &[BuildArtifact]) -> String {
    let args = compile_args()
        .iter()
        .map(|arg| py_str(arg))
        .collect::<Vec<_>>()
        .join(", ");

    let mut script = String::from("from setuptools import Extension, setup\n\n");
    script.push_str(&format!("COMPILE_ARGS = [{}]\n\n", args));
    script.push_str("EXTENSIONS = [\n");
    for artifact in artifacts {
        script.push_str(&format!(
            "    Extension({}, [{}], extra_compile_args=COMPILE_ARGS),\n",
            py_str(&artifact.module_name),
            py_str(&unit_key(&artifact.c_source)),
        ));
    }
    script.push_str("]\n\n");
    script.push_str("setup(name=\"pyxbuild-extensions\", ext_modules=EXTENSIONS)\n");
    script
}
