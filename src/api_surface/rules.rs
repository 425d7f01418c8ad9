//! Per-language extraction rules.
//!
//! Each supported language is a plain [`ExtractionRule`] record: which files
//! it applies to, where its roots come from, and a list of line patterns
//! interpreted by one of four [`Strategy`] values.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::extension_of;

/// Languages with an API section, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiLanguage {
    Rust,
    #[serde(rename = "typescript")]
    TypeScript,
    Python,
    Go,
    Java,
}

impl ApiLanguage {
    pub const ALL: [ApiLanguage; 5] = [
        ApiLanguage::Rust,
        ApiLanguage::TypeScript,
        ApiLanguage::Python,
        ApiLanguage::Go,
        ApiLanguage::Java,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiLanguage::Rust => "rust",
            ApiLanguage::TypeScript => "typescript",
            ApiLanguage::Python => "python",
            ApiLanguage::Go => "go",
            ApiLanguage::Java => "java",
        }
    }

    /// Heading used in the text artifact.
    pub fn title(&self) -> &'static str {
        match self {
            ApiLanguage::Rust => "RUST",
            ApiLanguage::TypeScript => "TYPESCRIPT/JAVASCRIPT",
            ApiLanguage::Python => "PYTHON",
            ApiLanguage::Go => "GO",
            ApiLanguage::Java => "JAVA",
        }
    }
}

impl std::fmt::Display for ApiLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a declaration is known to be public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// A visibility keyword (`pub`, `pub(crate)`, `public`)
    ExplicitVisibility,
    /// `export` statements, or a column-0 capitalized function/class
    ConventionExport,
    /// Column-0 definitions whose name does not start with `_`
    UnderscoreConvention,
    /// Column-0 functions whose name starts with an upper-case letter
    CapitalizationExport,
}

/// Visibility recorded on an extracted symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Unrestricted keyword visibility
    Public,
    /// Restricted keyword visibility such as `pub(crate)`
    Scoped,
    /// Explicit `export`
    Exported,
    /// Public by naming convention only
    ConventionPublic,
}

/// Where a language's scan roots come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootScope {
    /// Every filtered file with a matching extension
    AllFiles,
    /// `<dir>/src` of every `Cargo.toml`, else `src`
    CargoCrates,
    /// Every `package.json` directory, else the first conventional web dir
    PackageDirs,
}

/// One line pattern and the visibility it implies.
#[derive(Debug, Clone)]
pub struct SymbolPattern {
    pub regex: Regex,
    pub visibility: Visibility,
}

impl SymbolPattern {
    fn new(regex: &Regex, visibility: Visibility) -> Self {
        Self {
            regex: regex.clone(),
            visibility,
        }
    }
}

/// Data describing one language's extraction.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub language: ApiLanguage,
    pub strategy: Strategy,
    pub scope: RootScope,
    /// Lowercased extensions without the dot
    pub extensions: &'static [&'static str],
    /// Path suffixes skipped even when the extension matches
    pub excluded_suffixes: &'static [&'static str],
    /// Tried in order; the first match decides the visibility
    pub patterns: Vec<SymbolPattern>,
}

lazy_static! {
    static ref RUST_PUB: Regex = Regex::new(
        r"^\s*pub\s+(?:(?:async|unsafe|const|extern(?:\s+\x22[^\x22]*\x22)?)\s+)*(?:fn|struct|enum|trait|type|const|static|use|mod|union)\b"
    )
    .expect("rust pub regex");
    static ref RUST_PUB_SCOPED: Regex = Regex::new(
        r"^\s*pub\s*\([^)]*\)\s*(?:(?:async|unsafe|const|extern(?:\s+\x22[^\x22]*\x22)?)\s+)*(?:fn|struct|enum|trait|type|const|static|use|mod|union)\b"
    )
    .expect("rust scoped pub regex");
    static ref JS_EXPORT: Regex = Regex::new(
        r"^\s*export\s+(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function|class|interface|type|enum|const|let|var|namespace)\b"
    )
    .expect("js export regex");
    static ref JS_EXPORT_DEFAULT: Regex =
        Regex::new(r"^\s*export\s+(?:default\b|\{|\*)").expect("js export default regex");
    static ref JS_CAPITALIZED: Regex =
        Regex::new(r"^(?:async\s+)?(?:function\*?|class)\s+[A-Z]").expect("js capitalized regex");
    static ref PY_DEF: Regex =
        Regex::new(r"^(?:async\s+)?(?:def|class)\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)").expect("python def regex");
    static ref GO_FUNC: Regex = Regex::new(
        r"^func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Z][A-Za-z0-9_]*)\s*[\[(]"
    )
    .expect("go func regex");
    static ref JAVA_PUBLIC: Regex = Regex::new(
        r"^\s*public\s+(?:(?:static|final|abstract|synchronized|sealed|default|native|strictfp)\s+)*[\w<>\[\],.?\s]*?\b(?:class|interface|enum|record|@interface|[\w<>\[\],.?]+\s+\w+\s*\()"
    )
    .expect("java public regex");
}

impl ExtractionRule {
    /// The built-in rule set, one rule per [`ApiLanguage`].
    pub fn defaults() -> Vec<ExtractionRule> {
        vec![
            ExtractionRule {
                language: ApiLanguage::Rust,
                strategy: Strategy::ExplicitVisibility,
                scope: RootScope::CargoCrates,
                extensions: &["rs"],
                excluded_suffixes: &[],
                patterns: vec![
                    SymbolPattern::new(&RUST_PUB, Visibility::Public),
                    SymbolPattern::new(&RUST_PUB_SCOPED, Visibility::Scoped),
                ],
            },
            ExtractionRule {
                language: ApiLanguage::TypeScript,
                strategy: Strategy::ConventionExport,
                scope: RootScope::PackageDirs,
                extensions: &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"],
                excluded_suffixes: &[".d.ts", ".min.js"],
                patterns: vec![
                    SymbolPattern::new(&JS_EXPORT, Visibility::Exported),
                    SymbolPattern::new(&JS_EXPORT_DEFAULT, Visibility::Exported),
                    SymbolPattern::new(&JS_CAPITALIZED, Visibility::ConventionPublic),
                ],
            },
            ExtractionRule {
                language: ApiLanguage::Python,
                strategy: Strategy::UnderscoreConvention,
                scope: RootScope::AllFiles,
                extensions: &["py", "pyi"],
                excluded_suffixes: &[],
                patterns: vec![SymbolPattern::new(&PY_DEF, Visibility::ConventionPublic)],
            },
            ExtractionRule {
                language: ApiLanguage::Go,
                strategy: Strategy::CapitalizationExport,
                scope: RootScope::AllFiles,
                extensions: &["go"],
                excluded_suffixes: &["_test.go"],
                patterns: vec![SymbolPattern::new(&GO_FUNC, Visibility::Public)],
            },
            ExtractionRule {
                language: ApiLanguage::Java,
                strategy: Strategy::ExplicitVisibility,
                scope: RootScope::AllFiles,
                extensions: &["java"],
                excluded_suffixes: &[],
                patterns: vec![SymbolPattern::new(&JAVA_PUBLIC, Visibility::Public)],
            },
        ]
    }

    /// Whether the rule applies to a relative path by extension.
    pub fn applies_to(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        let lower = name.to_lowercase();
        if self.excluded_suffixes.iter().any(|s| lower.ends_with(s)) {
            return false;
        }
        extension_of(name).is_some_and(|ext| self.extensions.contains(&ext.as_str()))
    }

    /// Visibility of `line` if it declares a public symbol.
    pub fn match_line(&self, line: &str) -> Option<Visibility> {
        for pattern in &self.patterns {
            let Some(caps) = pattern.regex.captures(line) else {
                continue;
            };
            if self.strategy == Strategy::UnderscoreConvention {
                let private = caps.name("name").is_some_and(|m| m.as_str().starts_with('_'));
                if private {
                    continue;
                }
            }
            return Some(pattern.visibility);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(language: ApiLanguage) -> ExtractionRule {
        ExtractionRule::defaults()
            .into_iter()
            .find(|r| r.language == language)
            .unwrap()
    }

    #[test]
    fn test_rust_visibility() {
        let rust = rule(ApiLanguage::Rust);
        assert_eq!(rust.match_line("pub fn parse() {}"), Some(Visibility::Public));
        assert_eq!(rust.match_line("    pub async fn run(&self) {"), Some(Visibility::Public));
        assert_eq!(rust.match_line("pub(crate) struct Inner;"), Some(Visibility::Scoped));
        assert_eq!(rust.match_line("pub(super) fn helper() {}"), Some(Visibility::Scoped));
        assert_eq!(rust.match_line("pub unsafe extern \"C\" fn ffi() {}"), Some(Visibility::Public));
        assert_eq!(rust.match_line("fn private() {}"), None);
        assert_eq!(rust.match_line("// pub fn commented()"), None);
    }

    #[test]
    fn test_js_export_and_capitalization() {
        let js = rule(ApiLanguage::TypeScript);
        assert_eq!(js.match_line("export function load() {}"), Some(Visibility::Exported));
        assert_eq!(js.match_line("export default class App {}"), Some(Visibility::Exported));
        assert_eq!(js.match_line("export const x = 1;"), Some(Visibility::Exported));
        assert_eq!(js.match_line("export interface Props {}"), Some(Visibility::Exported));
        assert_eq!(js.match_line("export { a, b };"), Some(Visibility::Exported));
        assert_eq!(js.match_line("function Widget() {}"), Some(Visibility::ConventionPublic));
        assert_eq!(js.match_line("class Store {}"), Some(Visibility::ConventionPublic));
        assert_eq!(js.match_line("function helper() {}"), None);
        assert_eq!(js.match_line("  function Nested() {}"), None);
    }

    #[test]
    fn test_python_underscore_rule() {
        let py = rule(ApiLanguage::Python);
        assert_eq!(py.match_line("def load(path):"), Some(Visibility::ConventionPublic));
        assert_eq!(py.match_line("async def fetch():"), Some(Visibility::ConventionPublic));
        assert_eq!(py.match_line("class Config:"), Some(Visibility::ConventionPublic));
        assert_eq!(py.match_line("def _private():"), None);
        assert_eq!(py.match_line("class _Hidden:"), None);
        assert_eq!(py.match_line("    def method(self):"), None);
    }

    #[test]
    fn test_go_capitalization() {
        let go = rule(ApiLanguage::Go);
        assert_eq!(go.match_line("func Serve(addr string) error {"), Some(Visibility::Public));
        assert_eq!(go.match_line("func (s *Server) Start() {"), Some(Visibility::Public));
        assert_eq!(go.match_line("func Map[T any](xs []T) {"), Some(Visibility::Public));
        assert_eq!(go.match_line("func serve() {"), None);
    }

    #[test]
    fn test_java_public() {
        let java = rule(ApiLanguage::Java);
        assert_eq!(java.match_line("public class Main {"), Some(Visibility::Public));
        assert_eq!(
            java.match_line("    public static void main(String[] args) {"),
            Some(Visibility::Public)
        );
        assert_eq!(java.match_line("    private int count;"), None);
    }

    #[test]
    fn test_applies_to() {
        let js = rule(ApiLanguage::TypeScript);
        assert!(js.applies_to("web/src/App.tsx"));
        assert!(!js.applies_to("web/types/index.d.ts"));
        assert!(!js.applies_to("web/README.md"));

        let go = rule(ApiLanguage::Go);
        assert!(go.applies_to("cmd/main.go"));
        assert!(!go.applies_to("cmd/main_test.go"));
    }
}
