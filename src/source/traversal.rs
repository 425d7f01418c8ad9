//! Pruning directory traversal.
//!
//! Built on `walkdir` with `filter_entry`: a pruned directory is rejected
//! before it is read, so its subtree is never walked.

use std::collections::HashSet;
use std::path::Path;

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::error::{PackError, PerFileWarning, Result, WarningKind};

/// Walk configuration.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    /// Directory names never descended into
    pub prune_dirs: HashSet<String>,
    /// Relative directory paths never descended into (e.g. the output directory)
    pub prune_paths: HashSet<String>,
}

impl Traversal {
    pub fn new(prune_dirs: HashSet<String>) -> Self {
        Self {
            prune_dirs,
            prune_paths: HashSet::new(),
        }
    }

    /// Also skip the directory at this relative path.
    pub fn with_pruned_path(mut self, rel: impl Into<String>) -> Self {
        self.prune_paths.insert(rel.into());
        self
    }

    fn is_pruned(&self, root: &Path, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let by_name = entry
            .file_name()
            .to_str()
            .is_some_and(|name| self.prune_dirs.contains(name));
        by_name
            || relative(root, entry.path())
                .map(|rel| self.prune_paths.contains(&rel))
                .unwrap_or(false)
    }

    /// Walk `root`, returning relative file paths (unsorted) and per-entry warnings.
    ///
    /// Symlinks are never followed or returned. Only an unreadable root is fatal.
    pub fn walk(&self, root: &Path) -> Result<(Vec<String>, Vec<PerFileWarning>)> {
        if let Err(e) = std::fs::read_dir(root) {
            return Err(PackError::io(root, e));
        }

        let mut files = Vec::new();
        let mut warnings = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !self.is_pruned(root, entry));

        for item in walker {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| relative(root, p).unwrap_or_else(|lossy| lossy))
                        .filter(|rel| !rel.is_empty())
                        .unwrap_or_else(|| ".".to_string());
                    warn!(path = %path, error = %e, "Unreadable directory entry");
                    warnings.push(PerFileWarning::new(path, WarningKind::Unreadable, e.to_string()));
                    continue;
                }
            };

            // Without follow_links a symlink reports its own type, never `is_file`
            if !entry.file_type().is_file() {
                continue;
            }

            match relative(root, entry.path()) {
                Ok(rel) => files.push(rel),
                Err(lossy) => {
                    warn!(name = %lossy, "Skipping non UTF-8 file name");
                    warnings.push(PerFileWarning::new(
                        lossy,
                        WarningKind::Unreadable,
                        "file name is not valid UTF-8",
                    ));
                }
            }
        }

        Ok((files, warnings))
    }
}

/// `/`-joined path of `path` below `root`; the lossy form when a component
/// is not valid UTF-8.
fn relative(root: &Path, path: &Path) -> std::result::Result<String, String> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in rel.components() {
        match component.as_os_str().to_str() {
            Some(part) => parts.push(part),
            None => {
                let lossy: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                return Err(lossy.join("/"));
            }
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn prune(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_walk_prunes_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("node_modules/other")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join("node_modules/other/index.js"), "x").unwrap();

        let (mut files, warnings) = Traversal::new(prune(&["node_modules"])).walk(root).unwrap();
        files.sort();

        assert_eq!(files, vec!["src/main.rs"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_walk_prunes_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("out/pack")).unwrap();
        fs::create_dir_all(root.join("pack")).unwrap();
        fs::write(root.join("out/pack/PACK.txt"), "x").unwrap();
        fs::write(root.join("pack/keep.txt"), "x").unwrap();

        let (mut files, _) = Traversal::new(HashSet::new())
            .with_pruned_path("out/pack")
            .walk(root)
            .unwrap();
        files.sort();

        assert_eq!(files, vec!["pack/keep.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/a.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();
        std::os::unix::fs::symlink(root.join("real/a.txt"), root.join("b.txt")).unwrap();

        let (files, _) = Traversal::default().walk(root).unwrap();
        assert_eq!(files, vec!["real/a.txt"]);
    }

    #[test]
    fn test_walk_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = Traversal::default().walk(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, PackError::Io { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_walk_warns_on_non_utf8_name() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("ok.txt"), "x").unwrap();
        fs::write(root.join(std::ffi::OsStr::from_bytes(b"bad\xff.txt")), "x").unwrap();

        let (files, warnings) = Traversal::default().walk(root).unwrap();

        assert_eq!(files, vec!["ok.txt"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Unreadable);
        assert!(warnings[0].path.starts_with("bad"));
    }

    #[test]
    fn test_relative_joins_with_slash() {
        let root = Path::new("/repo");
        assert_eq!(relative(root, Path::new("/repo/a/b/c.rs")).unwrap(), "a/b/c.rs");
        assert_eq!(relative(root, Path::new("/repo")).unwrap(), "");
    }
}
