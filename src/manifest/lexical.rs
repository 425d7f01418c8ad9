//! Layer 1: lexical screening.
//!
//! Cheap statistics over the raw bytes and text: Shannon entropy rejects
//! binary-like or compressed content, keyword density rejects prose and
//! ordinary source files.

use std::collections::HashSet;

use regex::Regex;

/// Shannon entropy of the byte distribution, in bits per byte (0.0..=8.0).
pub fn shannon_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }

    let len = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .fold(0.0, |acc, &c| {
            let p = c as f64 / len;
            acc - p * p.log2()
        })
}

/// Outcome of Layer 1 for one file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LexicalVerdict {
    /// Entropy above the threshold
    HighEntropy { entropy: f64 },
    /// Keyword density below the threshold
    LowDensity { entropy: f64, density: f64 },
    Pass { entropy: f64, density: f64 },
}

/// Layer 1 scorer.
#[derive(Debug, Clone)]
pub struct LexicalScorer {
    /// Word-bounded, case-insensitive keyword alternation
    keywords: Regex,
    entropy_threshold: f64,
    density_threshold: f64,
}

impl LexicalScorer {
    pub fn new(keywords: Regex, entropy_threshold: f64, density_threshold: f64) -> Self {
        Self {
            keywords,
            entropy_threshold,
            density_threshold,
        }
    }

    /// Distinct keywords present as whole words (case-insensitive).
    pub fn keyword_hits(&self, content: &str) -> usize {
        self.keywords
            .find_iter(content)
            .map(|m| m.as_str().to_lowercase())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Distinct keyword hits divided by `line_count + 1`.
    pub fn density(&self, content: &str, line_count: usize) -> f64 {
        self.keyword_hits(content) as f64 / (line_count as f64 + 1.0)
    }

    pub fn score(&self, bytes: &[u8], content: &str, line_count: usize) -> LexicalVerdict {
        let entropy = shannon_entropy(bytes);
        if entropy > self.entropy_threshold {
            return LexicalVerdict::HighEntropy { entropy };
        }

        let density = self.density(content, line_count);
        if density < self.density_threshold {
            return LexicalVerdict::LowDensity { entropy, density };
        }

        LexicalVerdict::Pass { entropy, density }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> LexicalScorer {
        let words: Vec<String> = ["find_package", "dependencies", "dependency", "version", "gem", "pip"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        LexicalScorer::new(crate::types::keyword_regex(&words).unwrap(), 6.0, 0.05)
    }

    #[test]
    fn test_entropy_bounds() {
        assert_eq!(shannon_entropy(b""), 0.0);
        assert_eq!(shannon_entropy(b"aaaa"), 0.0);
        assert!((shannon_entropy(b"abab") - 1.0).abs() < 1e-9);

        let all: Vec<u8> = (0..=255u8).collect();
        assert!((shannon_entropy(&all) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_density_counts_distinct_keywords() {
        let s = scorer();
        let content = "Find_Package(Boost)\nfind_package(ZLIB)\nversion 1.0\n";
        assert_eq!(s.keyword_hits(content), 2);
        assert!((s.density(content, 3) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_keywords_do_not_match_inside_longer_words() {
        let s = scorer();
        assert_eq!(s.keyword_hits("dependencies\nmanagement\npipeline\n"), 1);
        assert_eq!(s.keyword_hits("gem 'rails'\npip install x\n"), 2);
    }

    #[test]
    fn test_score_verdicts() {
        let s = scorer();

        let all: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        assert!(matches!(s.score(&all, "", 1), LexicalVerdict::HighEntropy { .. }));

        let prose = "just some words\n".repeat(50);
        assert!(matches!(
            s.score(prose.as_bytes(), &prose, 50),
            LexicalVerdict::LowDensity { .. }
        ));

        let manifest = "find_package(Boost)\ndependencies\n";
        assert!(matches!(
            s.score(manifest.as_bytes(), manifest, 2),
            LexicalVerdict::Pass { .. }
        ));
    }
}
