//! Git marker detection and branch resolution.
//!
//! Deliberately does not depend on `git2`: detecting the presence of a
//! `.git` entry and reading one plumbing file (`HEAD`) inside it is, in
//! effect, a two-line text parse, so a full libgit2 binding would be dead
//! weight.

use std::path::{Path, PathBuf};

/// True if `dir` contains a `.git` entry (file or directory — worktrees use
/// a `.git` *file* pointing at the real git dir, which still counts as a
/// marker here).
pub fn has_git_marker(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Walk upward from `start` (inclusive) until a directory containing
/// `.git` is found. Returns the matching directory.
pub fn find_ancestor_with_git(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if has_git_marker(dir) {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Resolve the `HEAD` reference name (or abbreviated hash) for a project
/// rooted at `project_path`. Read errors yield an empty string rather than
/// propagating, since branch detection is advisory, not load-bearing.
pub fn branch_for(project_path: &Path) -> String {
    let git_entry = project_path.join(".git");
    let git_dir = resolve_git_dir(&git_entry);
    let head_path = git_dir.join("HEAD");

    let Ok(content) = std::fs::read_to_string(&head_path) else {
        return String::new();
    };
    let trimmed = content.trim();

    if let Some(branch) = trimmed.strip_prefix("ref: refs/heads/") {
        return branch.to_string();
    }

    if trimmed.len() >= 8 {
        trimmed[..8].to_string()
    } else {
        trimmed.to_string()
    }
}

/// `.git` is usually a directory, but in worktrees/submodules it's a file
/// containing `gitdir: <path>`. Resolve either form to the real git dir.
fn resolve_git_dir(git_entry: &Path) -> PathBuf {
    if git_entry.is_dir() {
        return git_entry.to_path_buf();
    }
    if let Ok(content) = std::fs::read_to_string(git_entry) {
        if let Some(path) = content.trim().strip_prefix("gitdir: ") {
            return PathBuf::from(path);
        }
    }
    git_entry.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_head(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir.join(".git")).unwrap();
        std::fs::write(dir.join(".git").join("HEAD"), content).unwrap();
    }

    #[test]
    fn branch_ref_form() {
        let dir = tempfile::tempdir().unwrap();
        write_head(dir.path(), "ref: refs/heads/main\n");
        assert_eq!(branch_for(dir.path()), "main");
    }

    #[test]
    fn detached_head_abbreviates_to_eight_chars() {
        let dir = tempfile::tempdir().unwrap();
        write_head(dir.path(), "a1b2c3d4e5f6\n");
        assert_eq!(branch_for(dir.path()), "a1b2c3d4");
    }

    #[test]
    fn short_content_returned_as_is() {
        let dir = tempfile::tempdir().unwrap();
        write_head(dir.path(), "abc\n");
        assert_eq!(branch_for(dir.path()), "abc");
    }

    #[test]
    fn missing_head_is_empty_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        assert_eq!(branch_for(dir.path()), "");
    }

    #[test]
    fn find_ancestor_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("src").join("pkg");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(
            find_ancestor_with_git(&nested),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn find_ancestor_none_without_git() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_ancestor_with_git(dir.path()), None);
    }
}
