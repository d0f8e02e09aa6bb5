use super::exclusion::ExclusionPolicy;
use crate::core::errors::StagingError;
use crate::core::{SourceUnit, SOURCE_EXTENSION};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds Python units beneath a root, returning paths relative to it.
pub struct UnitWalker<'a> {
    root: PathBuf,
    policy: &'a ExclusionPolicy,
    prune_copy_excluded: bool,
    skip_dirs: Vec<PathBuf>,
}

impl<'a> UnitWalker<'a> {
    pub fn new(root: PathBuf, policy: &'a ExclusionPolicy) -> Self {
        Self {
            root,
            policy,
            prune_copy_excluded: false,
            skip_dirs: vec![],
        }
    }

    /// Apply the copy exclusions while walking (used when scanning an unstaged source tree).
    pub fn prune_copy_excluded(mut self, prune: bool) -> Self {
        self.prune_copy_excluded = prune;
        self
    }

    pub fn with_skip_dir(mut self, dir: PathBuf) -> Self {
        self.skip_dirs.push(dir);
        self
    }

    pub fn walk(&self) -> Result<Vec<PathBuf>, StagingError> {
        let mut units = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.should_descend(entry.path()));

        for entry in walker {
            let entry = entry.map_err(|e| StagingError::Walk {
                path: self.root.clone(),
                message: e.to_string(),
            })?;
            if entry.file_type().is_file() && is_python_source(entry.path()) {
                if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                    units.push(relative.to_path_buf());
                }
            }
        }

        Ok(units)
    }

    fn should_descend(&self, path: &Path) -> bool {
        if self.skip_dirs.iter().any(|skip| skip == path) {
            return false;
        }
        if !self.prune_copy_excluded {
            return true;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        !self.policy.excluded_from_copy(relative)
    }
}

fn is_python_source(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy() == SOURCE_EXTENSION)
}

/// Read every unit's text and tag it with the exclusion policy.
pub fn load_units(
    root: &Path,
    relative_paths: &[PathBuf],
    policy: &ExclusionPolicy,
) -> Result<Vec<SourceUnit>, StagingError> {
    relative_paths
        .par_iter()
        .map(|relative| -> Result<SourceUnit, StagingError> {
            let full = root.join(relative);
            let bytes = std::fs::read(&full).map_err(|source| StagingError::Read {
                path: full.clone(),
                source,
            })?;
            Ok(SourceUnit {
                path: relative.clone(),
                text: String::from_utf8_lossy(&bytes).into_owned(),
                excluded_from_conversion: policy.excluded_from_conversion(relative),
                excluded_from_copy: policy.excluded_from_copy(relative),
            })
        })
        .collect()
}

/// Discover and load every unit below `root`.
pub fn discover_units(root: &Path, policy: &ExclusionPolicy) -> Result<Vec<SourceUnit>, StagingError> {
    let paths = UnitWalker::new(root.to_path_buf(), policy).walk()?;
    load_units(root, &paths, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExcludeConfig;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "pass\n").unwrap();
    }

    #[test]
    fn test_finds_only_python_files_sorted() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b/views.py");
        write(dir.path(), "a.py");
        write(dir.path(), "b/README.md");
        write(dir.path(), "b/module.pyx");

        let policy = ExclusionPolicy::default();
        let units = UnitWalker::new(dir.path().to_path_buf(), &policy).walk().unwrap();
        assert_eq!(units, vec![PathBuf::from("a.py"), PathBuf::from("b/views.py")]);
    }

    #[test]
    fn test_prunes_copy_excluded_dirs_when_asked() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py");
        write(dir.path(), "venv/lib/site.py");
        let policy = ExclusionPolicy::from_config(&ExcludeConfig {
            copying_dirs: vec!["venv".into()],
            ..ExcludeConfig::default()
        });

        let all = UnitWalker::new(dir.path().to_path_buf(), &policy).walk().unwrap();
        let pruned = UnitWalker::new(dir.path().to_path_buf(), &policy)
            .prune_copy_excluded(true)
            .walk()
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(pruned, vec![PathBuf::from("app.py")]);
    }

    #[test]
    fn test_loaded_units_carry_exclusion_flags() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "manage.py");
        write(dir.path(), "shop/models.py");
        let policy = ExclusionPolicy::from_config(&ExcludeConfig::default());

        let units = discover_units(dir.path(), &policy).unwrap();
        let manage = units.iter().find(|u| u.key() == "manage.py").unwrap();
        let models = units.iter().find(|u| u.key() == "shop/models.py").unwrap();
        assert!(manage.excluded_from_conversion);
        assert!(!models.excluded_from_conversion);
        assert_eq!(models.text, "pass\n");
    }
}
