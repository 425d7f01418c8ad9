//! Repository-relative path records.

use std::cmp::Ordering;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PerFileWarning, WarningKind};
use crate::processing::file_processor::{has_utf16_bom, is_binary_sample, BINARY_SAMPLE_BYTES};

/// Text/binary classification of a file's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextClass {
    Text,
    Binary,
}

/// A file that survived enumeration and filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPath {
    /// Path relative to the repository root, `/`-separated
    pub path: String,

    /// Size in bytes
    pub size: u64,

    /// Classification of the first bytes of the file
    pub class: TextClass,
}

impl RepoPath {
    pub fn new(path: impl Into<String>, size: u64, class: TextClass) -> Self {
        Self {
            path: path.into(),
            size,
            class,
        }
    }

    /// Read metadata and a leading sample of `root/rel`.
    ///
    /// Returns a warning instead of a record when the file cannot be read.
    pub fn inspect(root: &Path, rel: &str) -> std::result::Result<Self, PerFileWarning> {
        let full = root.join(rel);
        let unreadable = |e: std::io::Error| PerFileWarning::new(rel, WarningKind::Unreadable, e.to_string());

        let metadata = std::fs::metadata(&full).map_err(unreadable)?;
        if !metadata.is_file() {
            return Err(PerFileWarning::new(rel, WarningKind::Unreadable, "not a regular file"));
        }

        let mut sample = Vec::with_capacity(BINARY_SAMPLE_BYTES);
        File::open(&full)
            .and_then(|f| f.take(BINARY_SAMPLE_BYTES as u64).read_to_end(&mut sample))
            .map_err(unreadable)?;

        let class = if is_binary_sample(&sample) && !has_utf16_bom(&sample) {
            TextClass::Binary
        } else {
            TextClass::Text
        };

        Ok(Self::new(rel, metadata.len(), class))
    }

    pub fn is_text(&self) -> bool {
        self.class == TextClass::Text
    }

    /// File name component.
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(self.basename())
    }

    /// Parent directory (`""` for files at the root).
    pub fn parent(&self) -> &str {
        parent_of(&self.path)
    }

    pub fn absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }
}

/// Lowercased extension of a file name. Dotfiles like `.env` have none.
pub fn extension_of(name: &str) -> Option<String> {
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 < name.len() => Some(name[idx + 1..].to_lowercase()),
        Some(_) => None,
    }
}

/// Parent directory of a `/`-separated relative path.
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Case-insensitive ordering with the exact bytes as tie-break.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_and_basename() {
        let p = RepoPath::new("src/Lib.RS", 10, TextClass::Text);
        assert_eq!(p.basename(), "Lib.RS");
        assert_eq!(p.extension().as_deref(), Some("rs"));
        assert_eq!(p.parent(), "src");

        assert_eq!(extension_of(".env"), None);
        assert_eq!(extension_of("Makefile"), None);
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(parent_of("README.md"), "");
    }

    #[test]
    fn test_compare_paths() {
        let mut paths = vec!["b.rs", "A.rs", "a.rs", "C.rs"];
        paths.sort_by(|a, b| compare_paths(a, b));
        assert_eq!(paths, vec!["A.rs", "a.rs", "b.rs", "C.rs"]);
    }

    #[test]
    fn test_inspect() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("text.txt"), "hello\n").unwrap();
        std::fs::write(dir.path().join("blob.dat"), [0u8, 1, 2, 3, 0, 0]).unwrap();

        let text = RepoPath::inspect(dir.path(), "text.txt").unwrap();
        assert_eq!(text.size, 6);
        assert!(text.is_text());

        let blob = RepoPath::inspect(dir.path(), "blob.dat").unwrap();
        assert_eq!(blob.class, TextClass::Binary);

        let missing = RepoPath::inspect(dir.path(), "missing.txt").unwrap_err();
        assert_eq!(missing.kind, WarningKind::Unreadable);
    }
}
