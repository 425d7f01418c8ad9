//! Error taxonomy for the pack pipeline.
//!
//! Fatal conditions are [`PackError`] values and abort the run before the
//! output directory is touched. Per-file problems are [`PerFileWarning`]
//! records: they are logged, counted, and the file is treated as excluded.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal pipeline errors.
#[derive(Error, Debug)]
pub enum PackError {
    /// Invalid threshold, malformed regex or rule. Raised before any file is read.
    #[error("Configuration error in `{field}`: {reason}")]
    Configuration { field: String, reason: String },

    /// Tracked enumeration was requested but no repository was detected.
    #[error("Enumeration error at {root}: {reason}")]
    Enumeration { root: PathBuf, reason: String },

    /// I/O failure on a path the run cannot continue without.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background task panicked or was cancelled.
    #[error("Task failure: {0}")]
    Task(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PackError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PackError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from validating configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PackError::Configuration { .. })
    }
}

impl From<config::ConfigError> for PackError {
    fn from(e: config::ConfigError) -> Self {
        PackError::config("config", e.to_string())
    }
}

impl From<tokio::task::JoinError> for PackError {
    fn from(e: tokio::task::JoinError) -> Self {
        PackError::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PackError>;

/// Kind of a non-fatal, per-file problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The file or directory could not be read.
    Unreadable,
    /// Structural parsing failed.
    ParseFailure,
    /// The file exceeds the parse size ceiling.
    Oversized,
    /// The content looks binary despite a text extension.
    NotText,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::Unreadable => write!(f, "unreadable"),
            WarningKind::ParseFailure => write!(f, "parse_failure"),
            WarningKind::Oversized => write!(f, "oversized"),
            WarningKind::NotText => write!(f, "not_text"),
        }
    }
}

/// A per-file warning. The run continues and the file is treated as excluded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PerFileWarning {
    pub path: String,
    pub kind: WarningKind,
    pub detail: String,
}

impl PerFileWarning {
    pub fn new(path: impl Into<String>, kind: WarningKind, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for PerFileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_message() {
        let err = PackError::config("funnel.entropy_threshold", "must be within 0.0..=8.0");
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Configuration error in `funnel.entropy_threshold`: must be within 0.0..=8.0"
        );
    }

    #[test]
    fn test_warning_display() {
        let w = PerFileWarning::new("docs/big.bin", WarningKind::Oversized, "9000000 bytes");
        assert_eq!(w.to_string(), "[oversized] docs/big.bin: 9000000 bytes");
    }

    #[test]
    fn test_warnings_sort_by_path_first() {
        let mut ws = vec![
            PerFileWarning::new("b.txt", WarningKind::Unreadable, "x"),
            PerFileWarning::new("a.txt", WarningKind::ParseFailure, "y"),
        ];
        ws.sort();
        assert_eq!(ws[0].path, "a.txt");
    }
}
