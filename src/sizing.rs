//! Size and token estimation for the heatmap.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{compare_paths, RepoPath};
use crate::TOKEN_DIVISOR;

/// Byte length and estimated tokens of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRecord {
    pub path: String,
    pub bytes: u64,
    pub tokens: u64,
}

impl SizeRecord {
    pub fn new(path: impl Into<String>, bytes: u64) -> Self {
        Self {
            path: path.into(),
            bytes,
            tokens: estimate_tokens(bytes),
        }
    }
}

/// `bytes / 3.5`, truncated.
pub fn estimate_tokens(bytes: u64) -> u64 {
    (bytes as f64 / TOKEN_DIVISOR) as u64
}

/// Totals over every filtered file, before truncation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeTotals {
    pub files: usize,
    pub bytes: u64,
    pub tokens: u64,
}

/// Ranks files by size.
#[derive(Debug, Clone)]
pub struct SizeEstimator {
    top_n: usize,
}

impl SizeEstimator {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// All records, largest first; ties ordered by case-insensitive path.
    pub fn rank(&self, files: &[RepoPath]) -> Vec<SizeRecord> {
        let mut records: Vec<SizeRecord> = files
            .iter()
            .map(|f| SizeRecord::new(f.path.clone(), f.size))
            .collect();
        records.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| compare_paths(&a.path, &b.path)));
        records
    }

    /// At most `top_n` records plus totals over every file.
    pub fn heatmap(&self, files: &[RepoPath]) -> (Vec<SizeRecord>, SizeTotals) {
        let bytes: u64 = files.iter().map(|f| f.size).sum();
        let totals = SizeTotals {
            files: files.len(),
            bytes,
            tokens: estimate_tokens(bytes),
        };

        let mut records = self.rank(files);
        records.truncate(self.top_n);
        debug!(files = totals.files, rows = records.len(), "Size heatmap built");

        (records, totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextClass;

    fn file(path: &str, size: u64) -> RepoPath {
        RepoPath::new(path, size, TextClass::Text)
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(7), 2);
        assert_eq!(estimate_tokens(10), 2);
        assert_eq!(SizeRecord::new("a", 35).tokens, 10);
    }

    #[test]
    fn test_ordering_and_ties() {
        let estimator = SizeEstimator::new(50);
        let ranked = estimator.rank(&[file("b.rs", 10), file("A.rs", 10), file("big.bin", 99), file("a.rs", 10)]);
        let paths: Vec<_> = ranked.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["big.bin", "A.rs", "a.rs", "b.rs"]);
    }

    #[test]
    fn test_heatmap_bound() {
        let estimator = SizeEstimator::new(3);
        let files: Vec<_> = (0..10).map(|i| file(&format!("f{}.txt", i), i * 100)).collect();
        let (rows, totals) = estimator.heatmap(&files);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].bytes, 900);
        assert_eq!(totals.files, 10);
        assert_eq!(totals.bytes, 4500);
        assert_eq!(totals.tokens, 1285);
    }
}
