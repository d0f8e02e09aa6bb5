//! Pure predicates deciding which paths are never copied and which are never converted.

use crate::config::ExcludeConfig;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    convert_files: HashSet<String>,
    convert_dirs: HashSet<String>,
    copy_files: HashSet<String>,
    copy_dirs: HashSet<String>,
}

fn to_set(names: &[String]) -> HashSet<String> {
    names.iter().cloned().collect()
}

fn name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

impl ExclusionPolicy {
    pub fn from_config(config: &ExcludeConfig) -> Self {
        Self {
            convert_files: to_set(&config.files),
            convert_dirs: to_set(&config.dirs),
            copy_files: to_set(&config.copying_files),
            copy_dirs: to_set(&config.copying_dirs),
        }
    }

    /// True when the base name is an always-exclude file name, or the directory
    /// directly containing the file is an always-exclude directory name.
    pub fn excluded_from_conversion(&self, path: &Path) -> bool {
        let file_excluded = name_of(path).is_some_and(|name| self.convert_files.contains(&name));
        let dir_excluded = path
            .parent()
            .and_then(name_of)
            .is_some_and(|dir| self.convert_dirs.contains(&dir));
        file_excluded || dir_excluded
    }

    /// True when the base name is a copy-excluded file name, or any component
    /// of the path is a copy-excluded directory name.
    ///
    /// `path` should be relative to the source root so that the components of
    /// the root itself are not considered.
    pub fn excluded_from_copy(&self, path: &Path) -> bool {
        if name_of(path).is_some_and(|name| self.copy_files.contains(&name)) {
            return true;
        }
        path.components().any(|component| {
            self.copy_dirs
                .contains(component.as_os_str().to_string_lossy().as_ref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ExclusionPolicy {
        ExclusionPolicy::from_config(&ExcludeConfig {
            files: vec!["manage.py".into(), "settings.py".into()],
            dirs: vec!["migrations".into()],
            copying_files: vec!["secrets.env".into()],
            copying_dirs: vec![".git".into(), "venv".into()],
        })
    }

    #[test]
    fn test_excluded_file_name() {
        assert!(policy().excluded_from_conversion(Path::new("manage.py")));
        assert!(policy().excluded_from_conversion(Path::new("core/settings.py")));
        assert!(!policy().excluded_from_conversion(Path::new("core/views.py")));
    }

    #[test]
    fn test_excluded_parent_directory() {
        assert!(policy().excluded_from_conversion(Path::new("app/migrations/0001_initial.py")));
    }

    #[test]
    fn test_only_immediate_parent_counts_for_conversion() {
        assert!(!policy().excluded_from_conversion(Path::new("app/migrations/sub/helpers.py")));
    }

    #[test]
    fn test_copy_exclusion_matches_any_component() {
        assert!(policy().excluded_from_copy(Path::new("venv/lib/site.py")));
        assert!(policy().excluded_from_copy(Path::new("a/b/.git/config")));
        assert!(policy().excluded_from_copy(Path::new("deploy/secrets.env")));
        assert!(!policy().excluded_from_copy(Path::new("app/venvtools.py")));
    }

    #[test]
    fn test_predicates_are_independent() {
        let p = policy();
        assert!(p.excluded_from_conversion(Path::new("manage.py")));
        assert!(!p.excluded_from_copy(Path::new("manage.py")));
    }
}
