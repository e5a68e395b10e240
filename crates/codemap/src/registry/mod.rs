//! Project registry and path resolver.
//!
//! A pure filesystem scanner: discovers project roots by `.git` marker,
//! classifies them by manifest, and resolves arbitrary paths to their
//! owning project. Scans are stateless and produce a fresh, deterministically
//! ordered result every time — the only memoization layer is the [`crate::cache`]
//! module sitting in front of this one.

mod fingerprint;
mod git;
mod language;

pub use fingerprint::fingerprint;
pub use language::Language;

use crate::error::RegistryError;
use std::path::{Path, PathBuf};

/// A discovered code unit, rooted at a `.git`-bearing directory.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    pub language: Language,
    /// Basename of the parent directory of `path`; empty if `path` is the
    /// workspace root.
    pub group: String,
    pub git_branch: String,
}

/// An ordered scan result: stable total order over (group, name).
pub type ScanResult = Vec<Project>;

impl Project {
    fn build(path: PathBuf, group: String) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let language = language::classify(&path);
        let git_branch = git::branch_for(&path);
        Self {
            name,
            path,
            language,
            group,
            git_branch,
        }
    }
}

/// Scan `root` for projects: depth-1 group directories containing depth-2
/// project directories marked with `.git`, plus `root` itself if it is a
/// project. Sorted by (group asc, name asc); the workspace root (if itself
/// a project) is prepended.
pub fn scan(root: &Path) -> Result<ScanResult, RegistryError> {
    let root = absolutize(root)?;
    let mut projects = Vec::new();

    if git::has_git_marker(&root) {
        projects.push(Project::build(root.clone(), String::new()));
    }

    for depth1 in read_visible_subdirs(&root)? {
        let group_name = depth1
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for depth2 in read_visible_subdirs(&depth1)? {
            if git::has_git_marker(&depth2) {
                projects.push(Project::build(depth2, group_name.clone()));
            }
        }
    }

    projects.sort_by(|a, b| (&a.group, &a.name).cmp(&(&b.group, &b.name)));
    Ok(projects)
}

/// Resolve `path` to the Project that owns it: the nearest `.git`-bearing
/// ancestor.
pub fn resolve(path: &Path) -> Result<Project, RegistryError> {
    let path = absolutize(path)?;
    let project_dir = git::find_ancestor_with_git(&path)
        .ok_or_else(|| RegistryError::PathNotInProject(path.clone()))?;

    let group = project_dir
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Project::build(project_dir, group))
}

fn absolutize(path: &Path) -> Result<PathBuf, RegistryError> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        let cwd = std::env::current_dir().map_err(|source| RegistryError::ReadDir {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(normalize(&cwd.join(path)))
    }
}

/// Lexically collapse `.`/`..` components without touching the filesystem
/// (paths here may not exist yet, e.g. in resolver tests against synthetic
/// trees), matching the spirit of `std::fs::canonicalize` without requiring
/// the path to exist or resolving symlinks.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn read_visible_subdirs(dir: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RegistryError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            subdirs.push(entry.path());
        }
    }
    Ok(subdirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_project(root: &Path, group: &str, name: &str) {
        let dir = root.join(group).join(name);
        std::fs::create_dir_all(dir.join(".git")).unwrap();
    }

    #[test]
    fn scan_orders_by_group_then_name() {
        let root = tempfile::tempdir().unwrap();
        make_project(root.path(), "g2", "b");
        make_project(root.path(), "g1", "a");
        make_project(root.path(), "g1", "z");

        let result = scan(root.path()).unwrap();
        let names: Vec<(&str, &str)> = result
            .iter()
            .map(|p| (p.group.as_str(), p.name.as_str()))
            .collect();
        assert_eq!(names, vec![("g1", "a"), ("g1", "z"), ("g2", "b")]);
    }

    #[test]
    fn scan_prepends_root_project() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(".git")).unwrap();
        make_project(root.path(), "g1", "a");

        let result = scan(root.path()).unwrap();
        assert_eq!(result[0].group, "");
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn scan_skips_non_git_directories() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("g1").join("not-a-project")).unwrap();
        let result = scan(root.path()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn scan_is_deterministic() {
        let root = tempfile::tempdir().unwrap();
        make_project(root.path(), "g1", "a");
        make_project(root.path(), "g2", "b");
        assert_eq!(scan(root.path()).unwrap(), scan(root.path()).unwrap());
    }

    #[test]
    fn project_paths_are_always_absolute() {
        let root = tempfile::tempdir().unwrap();
        make_project(root.path(), "g1", "a");
        for project in scan(root.path()).unwrap() {
            assert!(project.path.is_absolute());
        }
    }

    #[test]
    fn resolve_finds_owning_project() {
        let root = tempfile::tempdir().unwrap();
        make_project(root.path(), "g1", "a");
        let file = root.path().join("g1").join("a").join("src").join("main.go");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "package main").unwrap();

        let project = resolve(&file).unwrap();
        assert_eq!(project.path, root.path().join("g1").join("a"));
    }

    #[test]
    fn resolve_round_trips_with_scan() {
        let root = tempfile::tempdir().unwrap();
        make_project(root.path(), "g1", "a");
        let scanned = scan(root.path()).unwrap();
        let project = &scanned[0];
        let file = project.path.join("src").join("main.rs");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "fn main() {}").unwrap();

        let resolved = resolve(&file).unwrap();
        assert_eq!(resolved.path, project.path);
    }

    #[test]
    fn resolve_without_git_ancestor_errors() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("no_git_here.txt");
        std::fs::write(&file, "x").unwrap();
        let err = resolve(&file).unwrap_err();
        assert!(matches!(err, RegistryError::PathNotInProject(_)));
    }
}
