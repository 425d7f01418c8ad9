//! Bounded file reading for the content-inspecting stages.
//!
//! Applies the parse size ceiling, rejects binary-looking content,
//! decodes the text and normalizes line endings. Every failure is a
//! [`PerFileWarning`] rather than an error: the file is simply skipped.

use std::str;

use crate::error::{PerFileWarning, WarningKind};
use crate::types::RepoPath;

/// Number of leading bytes examined for binary detection.
pub const BINARY_SAMPLE_BYTES: usize = 8192;

/// Check if a byte sample appears to be binary.
pub fn is_binary_sample(sample: &[u8]) -> bool {
    let sample = &sample[..sample.len().min(BINARY_SAMPLE_BYTES)];

    // Null bytes are a strong indicator of binary
    if sample.contains(&0) {
        return true;
    }

    // Ratio of control characters other than tab, newline, carriage return
    let non_printable = sample
        .iter()
        .filter(|&&b| b < 32 && !matches!(b, 9 | 10 | 12 | 13))
        .count();

    !sample.is_empty() && (non_printable as f64 / sample.len() as f64) > 0.1
}

/// A file read and decoded for inspection.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    /// Relative path
    pub path: String,
    /// Raw bytes as read from disk
    pub bytes: Vec<u8>,
    /// Decoded text with `\n` line endings
    pub content: String,
}

impl ProcessedFile {
    pub fn stats(&self) -> FileStats {
        FileStats::of(&self.content)
    }
}

/// File reader with a size ceiling.
#[derive(Debug, Clone)]
pub struct FileProcessor {
    max_bytes: u64,
}

impl FileProcessor {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Read `file` under `root`.
    ///
    /// Oversized files are rejected from their recorded size without being read.
    pub fn read(&self, root: &std::path::Path, file: &RepoPath) -> Result<ProcessedFile, PerFileWarning> {
        if file.size > self.max_bytes {
            return Err(PerFileWarning::new(
                &file.path,
                WarningKind::Oversized,
                format!("{} bytes exceeds the {} byte ceiling", file.size, self.max_bytes),
            ));
        }

        let bytes = std::fs::read(file.absolute(root))
            .map_err(|e| PerFileWarning::new(&file.path, WarningKind::Unreadable, e.to_string()))?;

        self.process(&file.path, bytes)
    }

    /// Validate and decode already-loaded content.
    pub fn process(&self, path: &str, bytes: Vec<u8>) -> Result<ProcessedFile, PerFileWarning> {
        if bytes.len() as u64 > self.max_bytes {
            return Err(PerFileWarning::new(
                path,
                WarningKind::Oversized,
                format!("{} bytes exceeds the {} byte ceiling", bytes.len(), self.max_bytes),
            ));
        }

        if is_binary_sample(&bytes) && !has_utf16_bom(&bytes) {
            return Err(PerFileWarning::new(
                path,
                WarningKind::NotText,
                "binary content detected",
            ));
        }

        let text = decode(&bytes);
        let content = normalize_line_endings(&text);

        Ok(ProcessedFile {
            path: path.to_string(),
            bytes,
            content,
        })
    }
}

pub(crate) fn has_utf16_bom(content: &[u8]) -> bool {
    content.len() >= 2 && matches!((content[0], content[1]), (0xFF, 0xFE) | (0xFE, 0xFF))
}

/// Decode content: UTF-8, then BOM-marked UTF-16, then Latin-1.
pub fn decode(content: &[u8]) -> String {
    if let Ok(s) = str::from_utf8(content) {
        return s.strip_prefix('\u{feff}').unwrap_or(s).to_string();
    }

    if has_utf16_bom(content) {
        let little_endian = content[0] == 0xFF;
        let utf16: Vec<u16> = content[2..]
            .chunks_exact(2)
            .map(|c| {
                if little_endian {
                    u16::from_le_bytes([c[0], c[1]])
                } else {
                    u16::from_be_bytes([c[0], c[1]])
                }
            })
            .collect();
        if let Ok(s) = String::from_utf16(&utf16) {
            return s;
        }
    }

    // Latin-1 always succeeds
    content.iter().map(|&b| b as char).collect()
}

/// Normalize line endings to Unix-style (LF).
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Statistics about a file's content.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStats {
    /// Total number of lines.
    pub total_lines: usize,
    /// Number of non-empty lines.
    pub non_empty_lines: usize,
    /// Total bytes.
    pub total_chars: usize,
}

impl FileStats {
    pub fn of(content: &str) -> Self {
        let mut total_lines = 0;
        let mut non_empty_lines = 0;
        for line in content.lines() {
            total_lines += 1;
            if !line.trim().is_empty() {
                non_empty_lines += 1;
            }
        }

        Self {
            total_lines,
            non_empty_lines,
            total_chars: content.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextClass;

    #[test]
    fn test_binary_detection() {
        assert!(!is_binary_sample(b"Hello, world!\n\tindented\r\n"));
        assert!(is_binary_sample(b"\x00\x01\x02\x03"));
        assert!(is_binary_sample(b"\x01\x02\x03\x04ab"));
        assert!(!is_binary_sample(b""));
    }

    #[test]
    fn test_reject_binary() {
        let processor = FileProcessor::new(1024);
        let err = processor.process("blob.txt", b"\x00\x01\x02\x03\x04\x05".to_vec()).unwrap_err();
        assert_eq!(err.kind, WarningKind::NotText);
    }

    #[test]
    fn test_size_ceiling() {
        let processor = FileProcessor::new(4);
        let err = processor.process("big.txt", b"12345".to_vec()).unwrap_err();
        assert_eq!(err.kind, WarningKind::Oversized);

        // Oversized files are never opened.
        let missing = RepoPath::new("does/not/exist.txt", 10, TextClass::Text);
        let err = processor.read(std::path::Path::new("/nonexistent"), &missing).unwrap_err();
        assert_eq!(err.kind, WarningKind::Oversized);
    }

    #[test]
    fn test_decoding() {
        assert_eq!(decode("\u{feff}plain".as_bytes()), "plain");
        assert_eq!(decode(&[0xFF, 0xFE, b'h', 0, b'i', 0]), "hi");
        assert_eq!(decode(&[b'c', b'a', b'f', 0xE9]), "caf\u{e9}");
    }

    #[test]
    fn test_line_ending_normalization() {
        assert_eq!(normalize_line_endings("line1\r\nline2\r\nline3"), "line1\nline2\nline3");
        assert_eq!(normalize_line_endings("line1\rline2\rline3"), "line1\nline2\nline3");
    }

    #[test]
    fn test_file_stats() {
        let stats = FileStats::of("line1\nline2\n\nline4\n");

        assert_eq!(stats.total_lines, 4);
        assert_eq!(stats.non_empty_lines, 3);
    }
}
