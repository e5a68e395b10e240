//! Filesystem-mtime fingerprint for cache validation.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "go", "ts", "js", "rs", "java", "c", "h", "cpp", "hpp",
];

const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules", "__pycache__", "venv"];

/// Compute a deterministic fingerprint of `project_path`'s source tree:
/// SHA-256 over the sorted, joined `"path:mtime_ns"` entries of every
/// recognized source file, skipping hidden and conventional vendor/build
/// directories. Errors during the walk are swallowed (skip-entry policy) to
/// tolerate permission glitches; this never fails, it may just under-count.
pub fn fingerprint(project_path: &Path) -> String {
    let mut entries: Vec<(String, u128)> = Vec::new();

    let walker = WalkDir::new(project_path).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return false;
        }
        if entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()) {
            return false;
        }
        true
    });

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !SOURCE_EXTENSIONS.contains(&ext) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let Ok(duration) = modified.duration_since(UNIX_EPOCH) else {
            continue;
        };
        entries.push((
            entry.path().to_string_lossy().into_owned(),
            duration.as_nanos(),
        ));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (path, mtime_ns) in &entries {
        hasher.update(path.as_bytes());
        hasher.update(b":");
        hasher.update(mtime_ns.to_string().as_bytes());
        hasher.update(b"\n");
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn deterministic_on_unchanged_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        let first = fingerprint(dir.path());
        let second = fingerprint(dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn changes_when_a_source_file_is_touched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.rs");
        std::fs::write(&file, "fn main() {}").unwrap();
        let before = fingerprint(dir.path());

        sleep(Duration::from_millis(10));
        std::fs::write(&file, "fn main() { }").unwrap();
        let after = fingerprint(dir.path());

        assert_ne!(before, after);
    }

    #[test]
    fn ignores_vendor_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("vendor").join("dep.go"), "package vendor").unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("ignored.rs"), "x").unwrap();

        let empty = fingerprint(dir.path());

        std::fs::write(dir.path().join("real.go"), "package main").unwrap();
        let with_real_file = fingerprint(dir.path());

        assert_ne!(empty, with_real_file);
    }

    #[test]
    fn ignores_non_source_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.md"), "# hi").unwrap();
        let with_md_only = fingerprint(dir.path());
        let empty_dir = tempfile::tempdir().unwrap();
        assert_eq!(with_md_only, fingerprint(empty_dir.path()));
    }
}
