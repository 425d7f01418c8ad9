//! Version-control data source.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{PackError, Result};

/// A version-control system that can list the files of a working tree.
pub trait VersionControl: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether `root` lies inside a working tree of this system.
    fn is_repository(&self, root: &Path) -> bool;

    /// Tracked plus untracked, not-ignored files, relative to `root`.
    fn list_files(&self, root: &Path) -> Result<Vec<String>>;

    /// Abbreviated identifier of the checked-out revision, when there is one.
    fn head_commit(&self, _root: &Path) -> Option<String> {
        None
    }
}

/// Git through its command-line client.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitCli {
    /// Use a specific git executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the git executable can be run at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn command(&self, root: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-C").arg(root);
        // Never pick up hooks or pagers from the inspected tree
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("GIT_PAGER", "cat");
        cmd
    }
}

impl VersionControl for GitCli {
    fn name(&self) -> &str {
        "git"
    }

    fn is_repository(&self, root: &Path) -> bool {
        let output = self
            .command(root)
            .args(["rev-parse", "--is-inside-work-tree"])
            .output();

        match output {
            Ok(o) if o.status.success() => String::from_utf8_lossy(&o.stdout).trim() == "true",
            Ok(o) => {
                debug!(status = %o.status, "Not a git working tree");
                false
            }
            Err(e) => {
                debug!(error = %e, "git unavailable");
                false
            }
        }
    }

    fn list_files(&self, root: &Path) -> Result<Vec<String>> {
        let output = self
            .command(root)
            .args(["ls-files", "--cached", "--others", "--exclude-standard", "-z"])
            .output()
            .map_err(|e| PackError::Enumeration {
                root: root.to_path_buf(),
                reason: format!("failed to run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(PackError::Enumeration {
                root: root.to_path_buf(),
                reason: format!(
                    "git ls-files failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(split_nul(&output.stdout))
    }

    fn head_commit(&self, root: &Path) -> Option<String> {
        let output = self
            .command(root)
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .ok()?;
        if !output.status.success() {
            // Fresh repository without commits
            debug!(status = %output.status, "No HEAD commit");
            return None;
        }
        let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!commit.is_empty()).then_some(commit)
    }
}

/// Split NUL-separated output into paths, dropping empty entries.
///
/// Undecodable bytes become U+FFFD; such paths never resolve on disk and are
/// reported by the adapter.
fn split_nul(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).replace('\\', "/"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_nul() {
        let out = b"src/main.rs\0docs/a b.md\0\0";
        assert_eq!(split_nul(out), vec!["src/main.rs", "docs/a b.md"]);
        assert!(split_nul(b"").is_empty());
    }

    #[test]
    fn test_missing_program_is_not_a_repository() {
        let git = GitCli::with_program("ctxpack-no-such-git-binary");
        let dir = tempfile::tempdir().unwrap();

        assert!(!git.is_available());
        assert!(!git.is_repository(dir.path()));
        assert!(git.list_files(dir.path()).is_err());
        assert_eq!(git.head_commit(dir.path()), None);
    }
}
