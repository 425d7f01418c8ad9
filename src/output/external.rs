//! Optional sections produced by external tools.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::ExternalToolConfig;

/// Maximum lines kept from one tool's output.
pub const MAX_SECTION_LINES: usize = 300;

/// Maximum bytes kept from one tool's output (128 KiB).
pub const MAX_SECTION_BYTES: usize = 128 * 1024;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    Present,
    /// The tool is missing or failed; not an error
    Absent,
}

/// Output of one external source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSection {
    pub label: String,
    pub status: SectionState,
    /// Clamped and scrubbed output, or the reason it is absent
    pub content: String,
}

impl ExternalSection {
    pub fn present(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: SectionState::Present,
            content: content.into(),
        }
    }

    pub fn absent(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: SectionState::Absent,
            content: reason.into(),
        }
    }
}

/// A producer of one optional pack section.
pub trait ExternalSource: Send + Sync {
    fn label(&self) -> &str;

    /// Never fails; unavailability is reported as an absent section.
    fn collect(&self, root: &Path) -> ExternalSection;
}

/// Runs a program in the repository root and captures stdout.
#[derive(Debug, Clone)]
pub struct CommandSource {
    label: String,
    program: String,
    args: Vec<String>,
    /// Relative directory to run in instead of the root
    working_dir: Option<String>,
    /// Keep non-empty stdout from a failing exit status
    any_status: bool,
}

impl CommandSource {
    pub fn new(label: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args,
            working_dir: None,
            any_status: false,
        }
    }

    /// Run in `dir` (relative to the root); empty means the root itself.
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        self.working_dir = (!dir.is_empty()).then_some(dir);
        self
    }

    /// Accept output from tools that report problems through the exit status
    /// (`npm ls` exits non-zero on unmet peers).
    pub fn with_any_status(mut self) -> Self {
        self.any_status = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn from_config(tool: &ExternalToolConfig) -> Self {
        Self::new(&tool.label, &tool.program, tool.args.clone())
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ExternalSource for CommandSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn collect(&self, root: &Path) -> ExternalSection {
        let dir = match &self.working_dir {
            Some(rel) => root.join(rel),
            None => root.to_path_buf(),
        };
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&dir)
            .output();

        match output {
            Ok(o) if o.status.success() || (self.any_status && !o.stdout.is_empty()) => {
                let text = String::from_utf8_lossy(&o.stdout).replace("\r\n", "\n");
                debug!(label = %self.label, bytes = text.len(), "External tool output captured");
                ExternalSection::present(&self.label, scrub(&clamp(&text, &self.label)))
            }
            Ok(o) => {
                warn!(label = %self.label, status = %o.status, "External tool failed");
                ExternalSection::absent(
                    &self.label,
                    format!("(tool failed or produced no output: {})", self.command_line()),
                )
            }
            Err(e) => {
                warn!(label = %self.label, error = %e, "External tool unavailable");
                ExternalSection::absent(
                    &self.label,
                    format!("(tool not found or not installed: {})", self.program),
                )
            }
        }
    }
}

/// Collect every configured source in order.
pub fn collect_all(sources: &[Arc<dyn ExternalSource>], root: &Path) -> Vec<ExternalSection> {
    sources.iter().map(|s| s.collect(root)).collect()
}

/// Truncate to [`MAX_SECTION_BYTES`] then [`MAX_SECTION_LINES`], noting each cut.
pub fn clamp(text: &str, label: &str) -> String {
    let mut out = if text.len() > MAX_SECTION_BYTES {
        let mut end = MAX_SECTION_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}\n... [truncated to {} bytes for {}]",
            &text[..end],
            MAX_SECTION_BYTES,
            label
        )
    } else {
        text.to_string()
    };

    let line_count = out.lines().count();
    if line_count > MAX_SECTION_LINES {
        let kept: Vec<&str> = out.lines().take(MAX_SECTION_LINES).collect();
        out = format!(
            "{}\n... [truncated to {} lines for {}]",
            kept.join("\n"),
            MAX_SECTION_LINES,
            label
        );
    }
    out
}

/// Replace e-mail addresses with `<email>`.
pub fn scrub(text: &str) -> String {
    EMAIL_RE.replace_all(text, "<email>").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_emails() {
        assert_eq!(
            scrub("maintainer: Jane <jane.doe@example.org>"),
            "maintainer: Jane <<email>>"
        );
        assert_eq!(scrub("no address here"), "no address here");
    }

    #[test]
    fn test_clamp_lines() {
        let text: String = (0..500).map(|i| format!("line {}\n", i)).collect();
        let clamped = clamp(&text, "deps");
        assert_eq!(clamped.lines().count(), MAX_SECTION_LINES + 1);
        assert!(clamped.ends_with("[truncated to 300 lines for deps]"));
    }

    #[test]
    fn test_clamp_bytes_on_char_boundary() {
        let text = "é".repeat(MAX_SECTION_BYTES);
        let clamped = clamp(&text, "wide");
        assert!(clamped.len() < MAX_SECTION_BYTES + 64);
        assert!(clamped.contains("truncated to 131072 bytes"));
    }

    #[test]
    fn test_missing_program_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let source = CommandSource::new("deps", "ctxpack-no-such-tool", vec!["--tree".into()]);
        let section = source.collect(dir.path());
        assert_eq!(section.status, SectionState::Absent);
        assert!(section.content.contains("ctxpack-no-such-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn test_working_dir_and_status() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("web")).unwrap();

        let pwd = CommandSource::new("pwd", "pwd", vec![]).with_working_dir("web");
        assert!(pwd.collect(dir.path()).content.trim_end().ends_with("web"));

        let failing = CommandSource::new("sh", "sh", vec!["-c".into(), "echo partial; exit 1".into()]);
        assert_eq!(failing.collect(dir.path()).status, SectionState::Absent);
        let tolerant = failing.with_any_status();
        assert_eq!(tolerant.collect(dir.path()).content, "partial\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_present_output_is_scrubbed() {
        let dir = tempfile::tempdir().unwrap();
        let source = CommandSource::new("echo", "echo", vec!["owner a@b.io".into()]);
        let section = source.collect(dir.path());
        assert_eq!(section.status, SectionState::Present);
        assert_eq!(section.content, "owner <email>\n");
    }
}
