//! Source adapter: enumerates candidate files under a root.
//!
//! Tracked mode asks version control for tracked plus untracked, not-ignored
//! files; traversal mode walks the tree and prunes opaque directories. Both
//! return relative, `/`-separated, deduplicated and sorted paths without
//! symlinks.

pub mod traversal;
pub mod vcs;

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{PackError, PerFileWarning, Result, WarningKind};
use crate::types::{compare_paths, CompiledConfig, EnumerationMode};

pub use traversal::Traversal;
pub use vcs::{GitCli, VersionControl};

/// Paths returned by one enumeration.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// Relative paths, sorted and unique
    pub paths: Vec<String>,
    /// Mode actually used (`Tracked` or `Traversal`)
    pub mode: EnumerationMode,
    /// Entries that could not be read
    pub warnings: Vec<PerFileWarning>,
    /// Checked-out revision, tracked mode only
    pub commit: Option<String>,
}

/// Enumerates the files of a repository root.
pub struct SourceAdapter {
    vcs: Box<dyn VersionControl>,
    prune_dirs: HashSet<String>,
    prune_paths: HashSet<String>,
}

impl SourceAdapter {
    /// Adapter with the configured prune set and git as version control.
    ///
    /// The output directory joins the prune set when it lies inside `root`.
    pub fn new(config: &CompiledConfig, root: &Path) -> Self {
        let prune_dirs = config
            .raw
            .prune_dirs
            .iter()
            .map(|d| d.trim().trim_matches('/').to_string())
            .filter(|d| !d.is_empty())
            .collect();

        let mut prune_paths = HashSet::new();
        if let Some(rel) = relative_output_dir(root, &config.output_dir(root)) {
            prune_paths.insert(rel);
        }

        Self {
            vcs: Box::new(GitCli::default()),
            prune_dirs,
            prune_paths,
        }
    }

    /// Replace the version-control backend.
    pub fn with_vcs(mut self, vcs: Box<dyn VersionControl>) -> Self {
        self.vcs = vcs;
        self
    }

    /// Enumerate `root` in the requested mode.
    pub fn enumerate(&self, root: &Path, mode: EnumerationMode) -> Result<Enumeration> {
        if !root.is_dir() {
            return Err(PackError::Enumeration {
                root: root.to_path_buf(),
                reason: "root is not a directory".to_string(),
            });
        }

        let enumeration = match mode {
            EnumerationMode::Tracked => {
                if !self.vcs.is_repository(root) {
                    return Err(PackError::Enumeration {
                        root: root.to_path_buf(),
                        reason: format!("tracked mode requested but no {} repository found", self.vcs.name()),
                    });
                }
                self.tracked(root)?
            }
            EnumerationMode::Traversal => self.traversal(root)?,
            EnumerationMode::Auto => {
                if self.vcs.is_repository(root) {
                    match self.tracked(root) {
                        Ok(enumeration) => enumeration,
                        Err(e) => {
                            warn!(error = %e, "Tracked enumeration failed, falling back to traversal");
                            self.traversal(root)?
                        }
                    }
                } else {
                    self.traversal(root)?
                }
            }
        };

        info!(
            mode = %enumeration.mode,
            files = enumeration.paths.len(),
            warnings = enumeration.warnings.len(),
            "Enumeration complete"
        );

        Ok(enumeration)
    }

    fn tracked(&self, root: &Path) -> Result<Enumeration> {
        let listed = self.vcs.list_files(root)?;

        let mut paths = Vec::with_capacity(listed.len());
        let mut warnings = Vec::new();

        for path in listed.into_iter().filter(|p| !self.under_pruned_dir(p)) {
            match std::fs::symlink_metadata(root.join(&path)) {
                Ok(meta) if meta.file_type().is_file() => paths.push(path),
                // Symlinks and submodule directories
                Ok(_) => {}
                Err(_) if path.contains(char::REPLACEMENT_CHARACTER) => {
                    warn!(path = %path, "Skipping non UTF-8 tracked path");
                    warnings.push(PerFileWarning::new(
                        path,
                        WarningKind::Unreadable,
                        "file name is not valid UTF-8",
                    ));
                }
                // Deleted but still tracked
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path, error = %e, "Unreadable tracked path");
                    warnings.push(PerFileWarning::new(path, WarningKind::Unreadable, e.to_string()));
                }
            }
        }

        Ok(Enumeration {
            paths: sort_unique(paths),
            mode: EnumerationMode::Tracked,
            warnings,
            commit: self.vcs.head_commit(root),
        })
    }

    fn traversal(&self, root: &Path) -> Result<Enumeration> {
        let walker = Traversal {
            prune_dirs: self.prune_dirs.clone(),
            prune_paths: self.prune_paths.clone(),
        };
        let (paths, warnings) = walker.walk(root)?;

        Ok(Enumeration {
            paths: sort_unique(paths),
            mode: EnumerationMode::Traversal,
            warnings,
            commit: None,
        })
    }

    /// Whether any directory component of `path` is pruned.
    fn under_pruned_dir(&self, path: &str) -> bool {
        let mut prefix = String::new();
        let mut components = path.split('/').peekable();
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                // last component is the file name
                break;
            }
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(component);
            if self.prune_dirs.contains(component) || self.prune_paths.contains(&prefix) {
                return true;
            }
        }
        false
    }
}

/// Relative `/`-separated path of `output` when it lies strictly inside `root`.
fn relative_output_dir(root: &Path, output: &Path) -> Option<String> {
    let rel = output.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn sort_unique(mut paths: Vec<String>) -> Vec<String> {
    paths.sort_by(|a, b| compare_paths(a, b));
    paths.dedup();
    paths
}

/// Enumerate `root` with the default git backend.
pub fn enumerate(config: &CompiledConfig, root: &Path, mode: EnumerationMode) -> Result<Enumeration> {
    SourceAdapter::new(config, root).enumerate(root, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackConfig;
    use std::fs;

    struct NoRepo;

    impl VersionControl for NoRepo {
        fn name(&self) -> &str {
            "none"
        }
        fn is_repository(&self, _root: &Path) -> bool {
            false
        }
        fn list_files(&self, _root: &Path) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    /// Pretends every path it was built with is tracked.
    struct FixedRepo(Vec<String>);

    impl VersionControl for FixedRepo {
        fn name(&self) -> &str {
            "fixed"
        }
        fn is_repository(&self, _root: &Path) -> bool {
            true
        }
        fn list_files(&self, _root: &Path) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
        fn head_commit(&self, _root: &Path) -> Option<String> {
            Some("abc1234".to_string())
        }
    }

    fn adapter(root: &Path) -> SourceAdapter {
        let config = PackConfig::default().compile().unwrap();
        SourceAdapter::new(&config, root)
    }

    #[test]
    fn test_tracked_without_repository_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = adapter(dir.path())
            .with_vcs(Box::new(NoRepo))
            .enumerate(dir.path(), EnumerationMode::Tracked)
            .unwrap_err();
        assert!(matches!(err, PackError::Enumeration { .. }));
    }

    #[test]
    fn test_auto_falls_back_to_traversal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("A.txt"), "a").unwrap();

        let result = adapter(dir.path())
            .with_vcs(Box::new(NoRepo))
            .enumerate(dir.path(), EnumerationMode::Auto)
            .unwrap();

        assert_eq!(result.mode, EnumerationMode::Traversal);
        assert_eq!(result.paths, vec!["A.txt", "b.txt"]);
        assert_eq!(result.commit, None);
    }

    #[test]
    fn test_tracked_filters_pruned_missing_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("vendor/lib")).unwrap();
        fs::create_dir_all(root.join("ai-pack")).unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        fs::write(root.join("vendor/lib/x.c"), "").unwrap();
        fs::write(root.join("ai-pack/PACK.txt"), "").unwrap();

        let listed = vec![
            "src/lib.rs".to_string(),
            "src/lib.rs".to_string(),
            "vendor/lib/x.c".to_string(),
            "ai-pack/PACK.txt".to_string(),
            "deleted.rs".to_string(),
        ];
        let result = adapter(root)
            .with_vcs(Box::new(FixedRepo(listed)))
            .enumerate(root, EnumerationMode::Auto)
            .unwrap();

        assert_eq!(result.mode, EnumerationMode::Tracked);
        assert_eq!(result.paths, vec!["src/lib.rs"]);
        assert!(result.warnings.is_empty());
        assert_eq!(result.commit.as_deref(), Some("abc1234"));
    }

    #[test]
    fn test_tracked_counts_undecodable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("ok.txt"), "x").unwrap();

        let listed = vec!["ok.txt".to_string(), "bad\u{FFFD}.txt".to_string()];
        let result = adapter(root)
            .with_vcs(Box::new(FixedRepo(listed)))
            .enumerate(root, EnumerationMode::Tracked)
            .unwrap();

        assert_eq!(result.paths, vec!["ok.txt"]);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, WarningKind::Unreadable);
        assert_eq!(result.warnings[0].path, "bad\u{FFFD}.txt");
    }

    #[test]
    fn test_relative_output_dir() {
        let root = Path::new("/repo");
        assert_eq!(relative_output_dir(root, Path::new("/repo/ai-pack")).as_deref(), Some("ai-pack"));
        assert_eq!(relative_output_dir(root, Path::new("/repo/out/pack")).as_deref(), Some("out/pack"));
        assert_eq!(relative_output_dir(root, Path::new("/elsewhere")), None);
        assert_eq!(relative_output_dir(root, Path::new("/repo")), None);
    }
}
