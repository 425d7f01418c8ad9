//! Language detection from file names, extensions and shebangs.
//!
//! Drives three decisions: which files count as code under `code_only`,
//! which structural parser the manifest funnel uses, and how files are
//! grouped in the language snapshot.

use std::collections::{HashMap, HashSet};

use crate::types::extension_of;

/// Languages and file formats the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    // Source languages
    Python,
    JavaScript,
    TypeScript,
    TypeScriptReact,
    Go,
    Rust,
    Java,
    Kotlin,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Scala,
    Shell,
    Sql,

    // Markup/Config
    Html,
    Css,
    Markdown,
    Json,
    Yaml,
    Toml,
    Xml,
    Ini,

    // Build descriptions
    CMake,
    Make,
    Dockerfile,
    Starlark,
    Gradle,

    Unknown,
}

/// Tree-sitter grammar used for structural parsing of script-like files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptGrammar {
    Python,
    Ruby,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    /// Grammar for structural parsing, if this language is script-like.
    pub fn script_grammar(&self) -> Option<ScriptGrammar> {
        match self {
            Language::Python | Language::Starlark => Some(ScriptGrammar::Python),
            Language::Ruby => Some(ScriptGrammar::Ruby),
            Language::JavaScript => Some(ScriptGrammar::JavaScript),
            Language::TypeScript => Some(ScriptGrammar::TypeScript),
            Language::TypeScriptReact => Some(ScriptGrammar::Tsx),
            _ => None,
        }
    }

    /// Get a string representation of the language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::TypeScriptReact => "tsx",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Scala => "scala",
            Language::Shell => "shell",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Markdown => "markdown",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Xml => "xml",
            Language::Ini => "ini",
            Language::CMake => "cmake",
            Language::Make => "make",
            Language::Dockerfile => "dockerfile",
            Language::Starlark => "starlark",
            Language::Gradle => "gradle",
            Language::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bare file names recognized as build or dependency descriptions.
const BUILD_FILE_NAMES: &[(&str, Language)] = &[
    ("Makefile", Language::Make),
    ("makefile", Language::Make),
    ("GNUmakefile", Language::Make),
    ("Dockerfile", Language::Dockerfile),
    ("dockerfile", Language::Dockerfile),
    ("CMakeLists.txt", Language::CMake),
    ("BUILD", Language::Starlark),
    ("BUILD.bazel", Language::Starlark),
    ("WORKSPACE", Language::Starlark),
    ("WORKSPACE.bazel", Language::Starlark),
    ("MODULE.bazel", Language::Starlark),
    ("Gemfile", Language::Ruby),
    ("Rakefile", Language::Ruby),
    ("Podfile", Language::Ruby),
    ("Vagrantfile", Language::Ruby),
    ("Pipfile", Language::Toml),
    ("Jenkinsfile", Language::Gradle),
    ("go.mod", Language::Go),
    ("go.work", Language::Go),
    ("requirements.txt", Language::Unknown),
];

/// Extensions counted as code, config or markup under `code_only`.
const CODE_EXTENSIONS: &[&str] = &[
    "c", "h", "cc", "hh", "cpp", "hpp", "cxx", "hxx", "rs", "go", "py", "pyi", "js", "mjs",
    "cjs", "jsx", "ts", "tsx", "java", "kt", "kts", "rb", "gemspec", "php", "scala", "cs",
    "swift", "m", "mm", "lua", "sh", "bash", "zsh", "fish", "ps1", "sql", "html", "xhtml",
    "xml", "xsd", "xslt", "yaml", "yml", "toml", "ini", "cfg", "conf", "json", "ndjson",
    "md", "rst", "tex", "s", "asm", "cmake", "gradle", "proto", "graphql", "gql", "nix",
    "dart", "scss", "less", "css", "bzl", "mk",
];

/// Language detector using names, extensions and shebangs.
pub struct LanguageDetector {
    extension_map: HashMap<String, Language>,
    filename_map: HashMap<String, Language>,
    code_extensions: HashSet<String>,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector {
    /// Create a new language detector with default mappings.
    pub fn new() -> Self {
        let mut extension_map = HashMap::new();
        let mut insert = |exts: &[&str], lang: Language| {
            for ext in exts {
                extension_map.insert(ext.to_string(), lang);
            }
        };

        insert(&["py", "pyi", "pyx", "pyw"], Language::Python);
        insert(&["js", "mjs", "cjs", "jsx"], Language::JavaScript);
        insert(&["ts", "mts", "cts"], Language::TypeScript);
        insert(&["tsx"], Language::TypeScriptReact);
        insert(&["go"], Language::Go);
        insert(&["rs"], Language::Rust);
        insert(&["java"], Language::Java);
        insert(&["kt"], Language::Kotlin);
        insert(&["c", "h"], Language::C);
        insert(&["cpp", "cc", "cxx", "hpp", "hxx", "hh"], Language::Cpp);
        insert(&["cs"], Language::CSharp);
        insert(&["rb", "rake", "gemspec", "podspec"], Language::Ruby);
        insert(&["php"], Language::Php);
        insert(&["swift"], Language::Swift);
        insert(&["scala", "sc", "sbt"], Language::Scala);
        insert(&["sh", "bash", "zsh"], Language::Shell);
        insert(&["sql"], Language::Sql);
        insert(&["html", "htm"], Language::Html);
        insert(&["css", "scss", "less"], Language::Css);
        insert(&["md", "markdown"], Language::Markdown);
        insert(&["json"], Language::Json);
        insert(&["yaml", "yml"], Language::Yaml);
        insert(&["toml"], Language::Toml);
        insert(&["xml", "csproj", "vcxproj", "props", "targets"], Language::Xml);
        insert(&["ini", "cfg", "conf"], Language::Ini);
        insert(&["cmake"], Language::CMake);
        insert(&["mk"], Language::Make);
        insert(&["bzl", "star"], Language::Starlark);
        insert(&["gradle", "kts"], Language::Gradle);

        let filename_map = BUILD_FILE_NAMES
            .iter()
            .map(|(name, lang)| (name.to_string(), *lang))
            .collect();

        let code_extensions = CODE_EXTENSIONS.iter().map(|s| s.to_string()).collect();

        Self {
            extension_map,
            filename_map,
            code_extensions,
        }
    }

    /// Detect language from a relative path and optional content.
    pub fn detect(&self, path: &str, content: Option<&str>) -> Language {
        let filename = path.rsplit('/').next().unwrap_or(path);

        // Check filename first
        if let Some(&lang) = self.filename_map.get(filename) {
            return lang;
        }

        if let Some(ext) = extension_of(filename) {
            if let Some(&lang) = self.extension_map.get(&ext) {
                return lang;
            }
        }

        // Try shebang detection from content
        if let Some(content) = content {
            if content.starts_with("#!") {
                let first_line = content.lines().next().unwrap_or("");
                return self.detect_from_shebang(first_line);
            }
        }

        Language::Unknown
    }

    /// Detect language from shebang line.
    fn detect_from_shebang(&self, shebang: &str) -> Language {
        let lower = shebang.to_lowercase();

        if lower.contains("python") {
            Language::Python
        } else if lower.contains("node") || lower.contains("deno") {
            Language::JavaScript
        } else if lower.contains("ruby") {
            Language::Ruby
        } else if lower.contains("php") {
            Language::Php
        } else {
            Language::Shell
        }
    }

    /// Whether a path is a recognized bare build-file name.
    pub fn is_build_file(&self, path: &str) -> bool {
        let filename = path.rsplit('/').next().unwrap_or(path);
        self.filename_map.contains_key(filename)
    }

    /// Whether a path counts as code/config/markup for `code_only`.
    pub fn is_code_path(&self, path: &str) -> bool {
        if self.is_build_file(path) {
            return true;
        }
        let filename = path.rsplit('/').next().unwrap_or(path);
        extension_of(filename).map_or(false, |ext| self.code_extensions.contains(&ext))
    }

    /// Grouping key for the language snapshot: a bare build-file name,
    /// the lowercased extension, or `(noext)`.
    pub fn snapshot_kind(&self, path: &str) -> String {
        let filename = path.rsplit('/').next().unwrap_or(path);
        if self.filename_map.contains_key(filename) {
            return filename.to_string();
        }
        extension_of(filename).unwrap_or_else(|| "(noext)".to_string())
    }
}
