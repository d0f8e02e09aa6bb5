//! Materializes the working copy of a project that conversion and build run in.

use super::exclusion::ExclusionPolicy;
use crate::core::errors::StagingError;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Working copy of the project, rebuilt from scratch on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTree {
    pub root: PathBuf,
    /// Copied regular files, relative to `root`, in walk order.
    pub files: Vec<PathBuf>,
}

impl StagingTree {
    pub fn path_of(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Mirror `source_root` into `dest_root`.
///
/// Any previous content of `dest_root` is removed first. Paths matching the
/// copy exclusions are pruned, and so is `dest_root` itself when it lives
/// inside `source_root`. Any single copy failure aborts staging.
pub fn stage(
    source_root: &Path,
    dest_root: &Path,
    policy: &ExclusionPolicy,
) -> Result<StagingTree, StagingError> {
    if !source_root.is_dir() {
        return Err(StagingError::MissingSource(source_root.to_path_buf()));
    }
    let source_root = canonical(source_root)?;

    if dest_root.exists() {
        info!("Removing existing build directory: {}", dest_root.display());
        fs::remove_dir_all(dest_root).map_err(|source| StagingError::Clear {
            path: dest_root.to_path_buf(),
            source,
        })?;
    }
    create_dir(dest_root)?;
    let dest_root = canonical(dest_root)?;

    info!(
        "Copying project {} to {}",
        source_root.display(),
        dest_root.display()
    );

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let walker = WalkDir::new(&source_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.path() == dest_root.as_path() {
                return false;
            }
            let relative = entry.path().strip_prefix(&source_root).unwrap_or(entry.path());
            !policy.excluded_from_copy(relative)
        });

    for entry in walker {
        let entry = entry.map_err(|e| StagingError::Walk {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| source_root.clone()),
            message: e.to_string(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(&source_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());

        let file_type = entry.file_type();
        if file_type.is_dir() {
            dirs.push(relative);
        } else if file_type.is_file() {
            files.push(relative);
        } else if file_type.is_symlink() {
            if entry.path().is_file() {
                files.push(relative);
            } else {
                warn!("Skipping symlink {} (not a regular file)", entry.path().display());
            }
        }
    }

    for dir in &dirs {
        create_dir(&dest_root.join(dir))?;
    }

    files
        .par_iter()
        .try_for_each(|relative| copy_file(&source_root.join(relative), &dest_root.join(relative)))?;

    info!("Copied {} files into {}", files.len(), dest_root.display());
    Ok(StagingTree {
        root: dest_root,
        files,
    })
}

fn canonical(path: &Path) -> Result<PathBuf, StagingError> {
    path.canonicalize().map_err(|source| StagingError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Idempotent; safe to race from several workers.
fn create_dir(path: &Path) -> Result<(), StagingError> {
    fs::create_dir_all(path).map_err(|source| StagingError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy content, permissions and timestamps.
fn copy_file(from: &Path, to: &Path) -> Result<(), StagingError> {
    if let Some(parent) = to.parent() {
        create_dir(parent)?;
    }
    let copy_err = |source| StagingError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    fs::copy(from, to).map_err(copy_err)?;

    let metadata = fs::metadata(from).map_err(copy_err)?;
    let mut times = fs::FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    fs::File::options()
        .write(true)
        .open(to)
        .and_then(|file| file.set_times(times))
        .map_err(copy_err)?;

    debug!("Copied {}", from.display());
    Ok(())
}
