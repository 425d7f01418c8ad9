//! Security and noise filtering.
//!
//! Every predicate is independent and a path must pass all of them:
//! secret exclusion, binary/media extension denylist, user exclude patterns,
//! user include patterns, and the optional code-only restriction. Only the
//! path string is inspected here, never file content.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::processing::language::LanguageDetector;
use crate::types::{extension_of, CompiledConfig};

/// Why a path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterRejection {
    /// Credential or key material
    Secret,
    /// Binary or media extension
    BinaryExtension,
    /// Matched an exclude pattern
    Excluded,
    /// Matched no include pattern
    NotIncluded,
    /// Not a code/config/markup file while code-only is on
    NotCode,
}

impl FilterRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterRejection::Secret => "secret",
            FilterRejection::BinaryExtension => "binary_extension",
            FilterRejection::Excluded => "excluded",
            FilterRejection::NotIncluded => "not_included",
            FilterRejection::NotCode => "not_code",
        }
    }
}

impl std::fmt::Display for FilterRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of filtering a raw path list.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Surviving paths, in input order
    pub kept: Vec<String>,
    /// Number of input paths
    pub raw_count: usize,
    /// Rejections per predicate
    pub rejections: BTreeMap<FilterRejection, usize>,
}

impl FilterOutcome {
    pub fn filtered_count(&self) -> usize {
        self.kept.len()
    }

    /// Rejection counts keyed by their snake_case names.
    pub fn rejection_counts(&self) -> BTreeMap<String, usize> {
        self.rejections
            .iter()
            .map(|(reason, count)| (reason.as_str().to_string(), *count))
            .collect()
    }
}

fn default_binary_extensions() -> HashSet<String> {
    [
        // Images
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "icns", "svg", "webp", "tif", "tiff",
        "psd", "heic",
        // Fonts
        "woff", "woff2", "ttf", "otf", "eot",
        // Archives
        "zip", "tar", "gz", "tgz", "bz2", "xz", "zst", "7z", "rar", "jar", "war", "whl",
        // Audio/video
        "mp3", "mp4", "mov", "mkv", "avi", "wav", "flac", "ogg", "webm", "wmv",
        // Documents
        "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
        // Compiled objects
        "exe", "dll", "so", "dylib", "a", "lib", "o", "obj", "class", "pyc", "pyo", "pyd",
        "wasm", "bin",
        // Databases and data dumps
        "db", "sqlite", "sqlite3", "mdb", "parquet", "csv", "tsv",
        // Model weights
        "pkl", "pickle", "onnx", "pt", "pth", "torch", "safetensors", "h5", "ckpt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_secret_extensions() -> HashSet<String> {
    [
        "pem", "key", "p12", "pfx", "jks", "keystore", "crt", "cer", "der",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

const SECRET_KEY_NAMES: &[&str] = &["id_rsa", "id_ed25519", "id_ecdsa", "id_dsa"];

/// Whether a basename is a dotenv variant (`.env`, `.env.local`, `prod.env`).
fn is_dotenv(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == ".env" || lower == "env" || lower.starts_with(".env.") || lower.ends_with(".env")
}

/// Path filter built once per run from the compiled configuration.
pub struct FileFilter {
    binary_extensions: HashSet<String>,
    secret_extensions: HashSet<String>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    code_only: bool,
    languages: LanguageDetector,
}

impl FileFilter {
    pub fn new(config: &CompiledConfig) -> Self {
        Self {
            binary_extensions: default_binary_extensions(),
            secret_extensions: default_secret_extensions(),
            include: config.include.clone(),
            exclude: config.exclude.clone(),
            code_only: config.raw.code_only,
            languages: LanguageDetector::new(),
        }
    }

    /// Whether a relative path names secret material.
    pub fn is_secret(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        if is_dotenv(name) {
            return true;
        }
        let lower = name.to_lowercase();
        let stem = lower.strip_suffix(".pub").unwrap_or(&lower);
        if SECRET_KEY_NAMES.contains(&stem) {
            return true;
        }
        extension_of(name).map_or(false, |ext| self.secret_extensions.contains(&ext))
    }

    /// Whether a relative path has a binary/media extension.
    pub fn is_binary_extension(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        extension_of(name).map_or(false, |ext| self.binary_extensions.contains(&ext))
    }

    /// Check one path against every predicate.
    pub fn check(&self, path: &str) -> Result<(), FilterRejection> {
        if self.is_secret(path) {
            return Err(FilterRejection::Secret);
        }
        if self.is_binary_extension(path) {
            return Err(FilterRejection::BinaryExtension);
        }
        if self.exclude.iter().any(|re| re.is_match(path)) {
            return Err(FilterRejection::Excluded);
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(path)) {
            return Err(FilterRejection::NotIncluded);
        }
        if self.code_only && !self.languages.is_code_path(path) {
            return Err(FilterRejection::NotCode);
        }
        Ok(())
    }

    /// Filter a raw path list, keeping input order.
    pub fn apply(&self, paths: Vec<String>) -> FilterOutcome {
        let raw_count = paths.len();
        let mut rejections = BTreeMap::new();
        let mut kept = Vec::with_capacity(raw_count);

        for path in paths {
            match self.check(&path) {
                Ok(()) => kept.push(path),
                Err(reason) => {
                    debug!(path = %path, reason = %reason, "Path filtered");
                    *rejections.entry(reason).or_insert(0) += 1;
                }
            }
        }

        FilterOutcome {
            kept,
            raw_count,
            rejections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackConfig;

    fn filter_with(f: impl FnOnce(&mut PackConfig)) -> FileFilter {
        let mut cfg = PackConfig::default();
        f(&mut cfg);
        FileFilter::new(&cfg.compile().unwrap())
    }

    #[test]
    fn test_secrets() {
        let filter = filter_with(|_| {});

        for path in [
            ".env",
            "config/.env.local",
            "deploy/prod.env",
            "keys/id_rsa",
            "keys/id_ed25519.pub",
            "certs/server.pem",
            "certs/client.P12",
            "deploy/app.keystore",
        ] {
            assert_eq!(filter.check(path), Err(FilterRejection::Secret), "{}", path);
        }

        assert!(filter.check("src/environment.rs").is_ok());
        assert!(filter.check("docs/env.md").is_ok());
    }

    #[test]
    fn test_binary_extensions() {
        let filter = filter_with(|_| {});

        assert_eq!(filter.check("img/logo.PNG"), Err(FilterRejection::BinaryExtension));
        assert_eq!(filter.check("model/weights.onnx"), Err(FilterRejection::BinaryExtension));
        assert_eq!(filter.check("data/dump.sqlite"), Err(FilterRejection::BinaryExtension));
        assert!(filter.check("src/main.rs").is_ok());
    }

    #[test]
    fn test_include_and_exclude() {
        let filter = filter_with(|cfg| {
            cfg.include_patterns = vec!["^src/".to_string()];
            cfg.exclude_patterns = vec![r"_test\.go$".to_string()];
        });

        assert!(filter.check("src/lib.rs").is_ok());
        assert_eq!(filter.check("README.md"), Err(FilterRejection::NotIncluded));
        assert_eq!(filter.check("src/x_test.go"), Err(FilterRejection::Excluded));
    }

    #[test]
    fn test_code_only() {
        let filter = filter_with(|cfg| cfg.code_only = true);

        assert!(filter.check("src/main.rs").is_ok());
        assert!(filter.check("CMakeLists.txt").is_ok());
        assert!(filter.check("Makefile").is_ok());
        assert_eq!(filter.check("notes.txt"), Err(FilterRejection::NotCode));
        assert_eq!(filter.check("LICENSE"), Err(FilterRejection::NotCode));
    }

    #[test]
    fn test_apply_counts() {
        let filter = filter_with(|_| {});
        let outcome = filter.apply(vec![
            "src/main.rs".to_string(),
            ".env".to_string(),
            "logo.png".to_string(),
            "README.md".to_string(),
        ]);

        assert_eq!(outcome.raw_count, 4);
        assert_eq!(outcome.kept, vec!["src/main.rs", "README.md"]);
        assert_eq!(outcome.rejections.get(&FilterRejection::Secret), Some(&1));
        assert_eq!(outcome.rejection_counts().get("binary_extension"), Some(&1));
    }
}
