//! Configuration types for a pack run.
//!
//! Every threshold, keyword list and path rule lives here. A [`PackConfig`]
//! is loaded once (defaults, then an optional TOML file, then `CTXPACK_*`
//! environment variables) and compiled into an immutable [`CompiledConfig`]
//! before any file is touched.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};
use crate::{
    DEFAULT_DENSITY_THRESHOLD, DEFAULT_ENTROPY_THRESHOLD, DEFAULT_FINAL_THRESHOLD,
    DEFAULT_HEATMAP_TOP_N, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PARSE_BYTES, DEFAULT_OUTPUT_DIR,
};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CTXPACK";

/// Config file looked up in the repository root when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "ctxpack.toml";

/// How candidate paths are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationMode {
    /// Tracked mode when a repository is detected, traversal otherwise.
    #[default]
    Auto,
    /// Version-controlled files only. Fails when no repository is present.
    Tracked,
    /// Pruning directory traversal, ignoring version control entirely.
    Traversal,
}

impl std::fmt::Display for EnumerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnumerationMode::Auto => write!(f, "auto"),
            EnumerationMode::Tracked => write!(f, "tracked"),
            EnumerationMode::Traversal => write!(f, "traversal"),
        }
    }
}

/// Top-level configuration for a pack run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Output directory for the artifacts (relative paths resolve against the root)
    pub output_dir: PathBuf,

    /// Enumeration mode
    pub mode: EnumerationMode,

    /// Directory tree depth in the structure section (1..=10)
    pub max_depth: usize,

    /// Paths must match at least one of these regexes (when non-empty)
    pub include_patterns: Vec<String>,

    /// Paths matching any of these regexes are excluded
    pub exclude_patterns: Vec<String>,

    /// Keep only code/config/markup files and bare build files
    pub code_only: bool,

    /// Compute everything but write nothing
    pub dry_run: bool,

    /// Opaque directory names that are never descended into
    pub prune_dirs: Vec<String>,

    /// Number of partitions for per-file work
    pub concurrency: usize,

    /// Rows kept in the size heatmap
    pub heatmap_top_n: usize,

    /// Optional external tools whose output becomes a pack section
    pub external_tools: Vec<ExternalToolConfig>,

    /// Run the ecosystem dependency listers (`cargo tree`, `npm ls`, ...)
    /// for build systems found among the manifest candidates
    pub dependency_tools: bool,

    /// Manifest funnel tuning
    pub funnel: FunnelConfig,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            mode: EnumerationMode::Auto,
            max_depth: DEFAULT_MAX_DEPTH,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            code_only: false,
            dry_run: false,
            prune_dirs: default_prune_dirs(),
            concurrency: 4,
            heatmap_top_n: DEFAULT_HEATMAP_TOP_N,
            external_tools: Vec::new(),
            dependency_tools: true,
            funnel: FunnelConfig::default(),
        }
    }
}

fn default_prune_dirs() -> Vec<String> {
    [
        // Version control
        ".git",
        ".svn",
        ".hg",
        // Dependencies
        "node_modules",
        "vendor",
        "third_party",
        ".venv",
        "venv",
        "__pycache__",
        ".pytest_cache",
        ".mypy_cache",
        ".tox",
        // Build output
        "target",
        "build",
        "dist",
        "out",
        ".next",
        ".nuxt",
        // Caches
        ".cache",
        ".gradle",
        "coverage",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// An external tool invoked for an optional pack section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalToolConfig {
    /// Section label
    pub label: String,
    /// Program name or path
    pub program: String,
    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
}

/// Tuning for the three-layer manifest funnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelConfig {
    /// Layer 1: files above this entropy (bits/byte) are treated as binary-like
    pub entropy_threshold: f64,

    /// Layer 1: minimum distinct-keyword density
    pub density_threshold: f64,

    /// Layer 3: minimum final confidence
    pub final_threshold: f64,

    /// Files above this size are skipped without being read
    pub max_parse_bytes: u64,

    /// High-signal dependency/build vocabulary (matched case-insensitively)
    pub keywords: Vec<String>,

    /// Layer 2 queries; one match validates a candidate
    pub structural_queries: Vec<StructuralQuery>,

    /// Layer 3 rules, first match wins
    pub path_rules: Vec<PathRule>,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            entropy_threshold: DEFAULT_ENTROPY_THRESHOLD,
            density_threshold: DEFAULT_DENSITY_THRESHOLD,
            final_threshold: DEFAULT_FINAL_THRESHOLD,
            max_parse_bytes: DEFAULT_MAX_PARSE_BYTES,
            keywords: default_keywords(),
            structural_queries: default_structural_queries(),
            path_rules: default_path_rules(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    [
        // Generic dependency/build vocabulary
        "dependencies",
        "dependency",
        "require",
        "requires",
        "version",
        "build",
        "install",
        "package",
        "module",
        "library",
        "plugin",
        "include",
        "import",
        "target",
        "compile",
        // Build tool invocations
        "cmake_minimum_required",
        "find_package",
        "add_executable",
        "add_library",
        "add_subdirectory",
        "fetchcontent_declare",
        "pkg_check_modules",
        "cc_library",
        "cc_binary",
        "http_archive",
        "go_repository",
        // Link directives
        "target_link_libraries",
        "link_directories",
        "rustc-link-lib",
        "ldflags",
        "ldlibs",
        // Package manager calls
        "install_requires",
        "devdependencies",
        "implementation",
        "npm",
        "yarn",
        "pip",
        "cargo",
        "gradle",
        "maven",
        "conan",
        "bundler",
        "gem",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_structural_queries() -> Vec<StructuralQuery> {
    let names = [
        "cmake_minimum_required",
        "project",
        "find_package",
        "find_library",
        "add_executable",
        "add_library",
        "add_subdirectory",
        "target_link_libraries",
        "link_libraries",
        "pkg_check_modules",
        "fetchcontent_declare",
        "externalproject_add",
        "setup",
        "require",
        "gem",
        "gemspec",
        "pod",
        "implementation",
        "api",
        "compileonly",
        "runtimeonly",
        "testimplementation",
        "classpath",
        "cc_library",
        "cc_binary",
        "py_library",
        "http_archive",
        "git_repository",
        "go_repository",
        "maven_install",
        "depends_on",
    ];
    let keys = [
        "dependencies",
        "devdependencies",
        "peerdependencies",
        "optionaldependencies",
        "dev-dependencies",
        "build-dependencies",
        "install_requires",
        "setup_requires",
        "extras_require",
        "requires",
        "build_requires",
        "requirements",
        "require",
        "require-dev",
        "dependency",
        "dependencymanagement",
        "build-system",
        "deps",
        "ldflags",
        "ldlibs",
    ];
    vec![
        StructuralQuery::Invocation {
            names: names.iter().map(|s| s.to_string()).collect(),
        },
        StructuralQuery::Binding {
            keys: keys.iter().map(|s| s.to_string()).collect(),
            values: Vec::new(),
        },
    ]
}

fn default_path_rules() -> Vec<PathRule> {
    vec![
        PathRule::new(
            r"(?i)(^|/)(docs?|documentation|examples?|samples?|demos?|assets|static|public|fixtures|testdata)/",
            0.5,
        ),
        PathRule::new(r"(?i)(^|/)(tests?|specs?|__tests__)/", 0.7),
        PathRule::new(
            r"(?i)(^|/)(cmake|gradle|bazel|buildsystem|build-tools|buildscripts|\.cargo|\.mvn|conan)/",
            1.3,
        ),
        PathRule::new(r"^[^/]+$", 1.5),
    ]
}

/// A language-agnostic Layer 2 query over a parsed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralQuery {
    /// An invocation (call, command, directive) with one of these names.
    Invocation { names: Vec<String> },
    /// A key bound to a value. With `values` non-empty, the bound value must
    /// contain one of them.
    Binding {
        keys: Vec<String>,
        #[serde(default)]
        values: Vec<String>,
    },
}

/// A Layer 3 path-context rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRule {
    /// Regex matched against the `/`-separated relative path
    pub pattern: String,
    /// Confidence multiplier (> 0)
    pub multiplier: f64,
}

impl PathRule {
    pub fn new(pattern: &str, multiplier: f64) -> Self {
        Self {
            pattern: pattern.to_string(),
            multiplier,
        }
    }
}

impl PackConfig {
    /// Load configuration for `root`.
    ///
    /// Sources, later wins: defaults, the TOML file (`config_file`, or
    /// `ctxpack.toml` in the root when present), `CTXPACK_*` variables.
    pub fn load(root: &Path, config_file: Option<&Path>) -> Result<Self> {
        let (file, required) = match config_file {
            Some(path) => (path.to_path_buf(), true),
            None => (root.join(DEFAULT_CONFIG_FILE), false),
        };

        let settings = config::Config::builder()
            .add_source(
                config::File::from(file)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("include_patterns")
                    .with_list_parse_key("exclude_patterns")
                    .with_list_parse_key("prune_dirs"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse configuration from a TOML string, on top of the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Validate and compile every pattern into an immutable [`CompiledConfig`].
    pub fn compile(self) -> Result<CompiledConfig> {
        if !(1..=10).contains(&self.max_depth) {
            return Err(PackError::config(
                "max_depth",
                format!("{} is not within 1..=10", self.max_depth),
            ));
        }
        if self.concurrency == 0 {
            return Err(PackError::config("concurrency", "must be at least 1"));
        }
        if self.heatmap_top_n == 0 {
            return Err(PackError::config("heatmap_top_n", "must be at least 1"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(PackError::config("output_dir", "must not be empty"));
        }

        let funnel = &self.funnel;
        check_threshold("funnel.entropy_threshold", funnel.entropy_threshold, 0.0, 8.0)?;
        check_threshold("funnel.density_threshold", funnel.density_threshold, 0.0, f64::MAX)?;
        check_threshold("funnel.final_threshold", funnel.final_threshold, 0.0, f64::MAX)?;
        if funnel.max_parse_bytes == 0 {
            return Err(PackError::config("funnel.max_parse_bytes", "must be at least 1"));
        }

        let keywords = normalize_words(&funnel.keywords);
        if keywords.is_empty() {
            return Err(PackError::config("funnel.keywords", "keyword list is empty"));
        }
        let keyword_pattern = keyword_regex(&keywords)
            .map_err(|e| PackError::config("funnel.keywords", e.to_string()))?;

        if funnel.structural_queries.is_empty() {
            return Err(PackError::config(
                "funnel.structural_queries",
                "at least one query is required",
            ));
        }
        for (idx, query) in funnel.structural_queries.iter().enumerate() {
            let empty = match query {
                StructuralQuery::Invocation { names } => normalize_words(names).is_empty(),
                StructuralQuery::Binding { keys, .. } => normalize_words(keys).is_empty(),
            };
            if empty {
                return Err(PackError::config(
                    format!("funnel.structural_queries[{}]", idx),
                    "query has no names/keys",
                ));
            }
        }

        let mut path_rules = Vec::with_capacity(funnel.path_rules.len());
        for (idx, rule) in funnel.path_rules.iter().enumerate() {
            let field = format!("funnel.path_rules[{}]", idx);
            if !rule.multiplier.is_finite() || rule.multiplier <= 0.0 {
                return Err(PackError::config(
                    field,
                    format!("multiplier {} must be a positive number", rule.multiplier),
                ));
            }
            let regex = compile_pattern(&field, &rule.pattern)?;
            path_rules.push(CompiledPathRule {
                regex,
                multiplier: rule.multiplier,
            });
        }

        let include = compile_all("include_patterns", &self.include_patterns)?;
        let exclude = compile_all("exclude_patterns", &self.exclude_patterns)?;

        Ok(CompiledConfig {
            include,
            exclude,
            keywords,
            keyword_pattern,
            path_rules,
            raw: self,
        })
    }
}

fn check_threshold(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(PackError::config(
            field,
            format!("{} is not a valid threshold", value),
        ));
    }
    Ok(())
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PackError::config(field, e.to_string()))
}

fn compile_all(field: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(idx, p)| compile_pattern(&format!("{}[{}]", field, idx), p))
        .collect()
}

/// One case-insensitive alternation over `keywords`.
///
/// A keyword that starts or ends with a word character is anchored there by
/// `\b`, so `dependency` does not match inside `dependencies`.
pub(crate) fn keyword_regex(keywords: &[String]) -> std::result::Result<Regex, regex::Error> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| {
            let lead = if k.starts_with(is_word) { r"\b" } else { "" };
            let tail = if k.ends_with(is_word) { r"\b" } else { "" };
            format!("{}{}{}", lead, regex::escape(k), tail)
        })
        .collect();
    Regex::new(&format!("(?i)(?:{})", alternatives.join("|")))
}

/// Lowercase, trim and deduplicate a word list, keeping first-seen order.
pub(crate) fn normalize_words(words: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(words.len());
    for word in words {
        let w = word.trim().to_lowercase();
        if !w.is_empty() && !out.contains(&w) {
            out.push(w);
        }
    }
    out
}

/// A compiled Layer 3 rule.
#[derive(Debug, Clone)]
pub struct CompiledPathRule {
    pub regex: Regex,
    pub multiplier: f64,
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    /// The source configuration
    pub raw: PackConfig,
    /// Compiled include patterns
    pub include: Vec<Regex>,
    /// Compiled exclude patterns
    pub exclude: Vec<Regex>,
    /// Normalized keyword list
    pub keywords: Vec<String>,
    /// Word-bounded matcher over `keywords`
    pub keyword_pattern: Regex,
    /// Compiled path rules, in order
    pub path_rules: Vec<CompiledPathRule>,
}

impl CompiledConfig {
    pub fn funnel(&self) -> &FunnelConfig {
        &self.raw.funnel
    }

    /// Output directory resolved against `root`.
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        if self.raw.output_dir.is_absolute() {
            self.raw.output_dir.clone()
        } else {
            root.join(&self.raw.output_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_compile() {
        let compiled = PackConfig::default().compile().unwrap();
        assert_eq!(compiled.raw.funnel.entropy_threshold, 6.0);
        assert_eq!(compiled.raw.funnel.density_threshold, 0.05);
        assert_eq!(compiled.raw.heatmap_top_n, 50);
        assert!(compiled.keywords.contains(&"find_package".to_string()));
        assert_eq!(compiled.path_rules.len(), 4);
    }

    #[test]
    fn test_keyword_pattern_respects_word_boundaries() {
        let words = vec!["dependency".to_string(), "gem".to_string(), "pip".to_string(), "c++".to_string()];
        let re = keyword_regex(&words).unwrap();

        assert!(!re.is_match("dependencies management pipeline"));
        assert!(re.is_match("one Dependency"));
        assert!(re.is_match("gem 'rails'"));
        assert!(re.is_match("lang: c++"));
    }

    #[test]
    fn test_bad_regex_is_configuration_error() {
        let mut cfg = PackConfig::default();
        cfg.exclude_patterns = vec!["(unclosed".to_string()];
        let err = cfg.compile().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("exclude_patterns[0]"));
    }

    #[test]
    fn test_bad_path_rule_is_configuration_error() {
        let mut cfg = PackConfig::default();
        cfg.funnel.path_rules = vec![PathRule::new("[", 1.0)];
        assert!(cfg.compile().unwrap_err().is_configuration());

        let mut cfg = PackConfig::default();
        cfg.funnel.path_rules = vec![PathRule::new("^docs/", 0.0)];
        assert!(cfg.compile().unwrap_err().is_configuration());
    }

    #[test]
    fn test_threshold_ranges() {
        let mut cfg = PackConfig::default();
        cfg.funnel.entropy_threshold = 9.5;
        assert!(cfg.compile().is_err());

        let mut cfg = PackConfig::default();
        cfg.funnel.density_threshold = f64::NAN;
        assert!(cfg.compile().is_err());

        let mut cfg = PackConfig::default();
        cfg.max_depth = 0;
        assert!(cfg.compile().is_err());
    }

    #[test]
    fn test_toml_overrides() {
        let cfg = PackConfig::from_toml_str(
            r#"
mode = "traversal"
code_only = true
exclude_patterns = ["\\.lock$"]

[funnel]
density_threshold = 0.2

[[funnel.path_rules]]
pattern = "^ci/"
multiplier = 2.0

[[funnel.structural_queries]]
kind = "binding"
keys = ["language"]
values = ["cpp"]
"#,
        )
        .unwrap();

        assert_eq!(cfg.mode, EnumerationMode::Traversal);
        assert!(cfg.code_only);
        assert_eq!(cfg.funnel.density_threshold, 0.2);
        // untouched defaults survive
        assert_eq!(cfg.funnel.entropy_threshold, 6.0);
        assert_eq!(cfg.funnel.path_rules, vec![PathRule::new("^ci/", 2.0)]);
        assert_eq!(
            cfg.funnel.structural_queries,
            vec![StructuralQuery::Binding {
                keys: vec!["language".to_string()],
                values: vec!["cpp".to_string()],
            }]
        );
        assert!(cfg.compile().is_ok());
    }

    #[test]
    fn test_unparsable_threshold_is_configuration_error() {
        let err = PackConfig::from_toml_str("[funnel]\nentropy_threshold = \"high\"\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_normalize_words() {
        let words = vec!["Find_Package".to_string(), " find_package ".to_string(), "".to_string()];
        assert_eq!(normalize_words(&words), vec!["find_package".to_string()]);
    }
}
