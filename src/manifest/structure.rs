//! Layer 2: structural validation.
//!
//! A candidate is parsed into a [`StructureDoc`] with the parser its format
//! calls for, then checked against the configured structural queries. A parse
//! failure counts as a validation failure. Documentation never validates.

use std::collections::HashSet;

use lazy_static::lazy_static;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::Deserialize;

use crate::ast_engine::{AstParser, StructureDoc};
use crate::processing::{Language, LanguageDetector, ScriptGrammar};
use crate::types::{extension_of, normalize_words, StructuralQuery};

lazy_static! {
    static ref CALL_RE: Regex = Regex::new(r"^\s*([A-Za-z_][\w.:-]*)\s*\((.*)$").expect("call regex");
    static ref COMMAND_RE: Regex = Regex::new(r#"^\s*([A-Za-z_][\w-]*)\s+["']"#).expect("command regex");
    static ref BINDING_RE: Regex =
        Regex::new(r#"^\s*["']?([A-Za-z_][\w.\-]*)["']?\s*(?:\?=|:=|\+=|=|:)\s*(.*)$"#).expect("binding regex");
    static ref SECTION_RE: Regex = Regex::new(r"^\s*\[\[?\s*([^\]]+?)\s*\]\]?\s*$").expect("section regex");
    static ref DIRECTIVE_RE: Regex = Regex::new(r"^[A-Z][A-Z0-9_]+\s+\S").expect("directive regex");
}

/// Document extensions that never describe a build.
const PROSE_EXTENSIONS: &[&str] = &[
    "md", "markdown", "mdx", "rst", "txt", "text", "adoc", "asciidoc", "rdoc", "org", "tex",
];

/// Bare names of conventional prose files.
const PROSE_NAMES: &[&str] = &[
    "README", "LICENSE", "LICENCE", "CHANGELOG", "CHANGES", "AUTHORS", "CONTRIBUTORS", "NOTICE",
    "COPYING", "HISTORY", "INSTALL", "TODO",
];

/// Unmatched lines with at least this many words read as sentences.
const PROSE_MIN_WORDS: usize = 4;

/// Parser selected for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Json,
    Toml,
    Yaml,
    Xml,
    Script(ScriptGrammar),
    Generic,
    /// Documentation and markup; carries no structure
    Prose,
}

impl StructureFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureFormat::Json => "json",
            StructureFormat::Toml => "toml",
            StructureFormat::Yaml => "yaml",
            StructureFormat::Xml => "xml",
            StructureFormat::Script(ScriptGrammar::Python) => "python",
            StructureFormat::Script(ScriptGrammar::Ruby) => "ruby",
            StructureFormat::Script(ScriptGrammar::JavaScript) => "javascript",
            StructureFormat::Script(ScriptGrammar::TypeScript) => "typescript",
            StructureFormat::Script(ScriptGrammar::Tsx) => "tsx",
            StructureFormat::Generic => "generic",
            StructureFormat::Prose => "prose",
        }
    }

    /// Pick the format from the path, falling back to content sniffing.
    pub fn detect(detector: &LanguageDetector, path: &str, content: &str) -> Self {
        if is_prose_path(detector, path) {
            return StructureFormat::Prose;
        }
        let language = detector.detect(path, Some(content));
        if let Some(grammar) = language.script_grammar() {
            return StructureFormat::Script(grammar);
        }
        match language {
            Language::Json => StructureFormat::Json,
            Language::Toml => StructureFormat::Toml,
            Language::Yaml => StructureFormat::Yaml,
            Language::Xml => StructureFormat::Xml,
            Language::Markdown | Language::Html => StructureFormat::Prose,
            _ => Self::sniff(content),
        }
    }

    fn sniff(content: &str) -> Self {
        let trimmed = content.trim_start();
        if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(content).is_ok() {
            StructureFormat::Json
        } else if trimmed.starts_with("<?xml") {
            StructureFormat::Xml
        } else {
            StructureFormat::Generic
        }
    }
}

/// Documentation by extension or conventional name. Recognized build files
/// (`CMakeLists.txt`), pip requirement lists and Conan files stay structured.
fn is_prose_path(detector: &LanguageDetector, path: &str) -> bool {
    if detector.is_build_file(path) {
        return false;
    }
    let filename = path.rsplit('/').next().unwrap_or(path);
    let lower = filename.to_lowercase();
    if ["requirements", "constraints", "conanfile"].iter().any(|p| lower.starts_with(p)) {
        return false;
    }
    match extension_of(filename) {
        Some(ext) => PROSE_EXTENSIONS.contains(&ext.as_str()),
        None => PROSE_NAMES.contains(&filename.to_uppercase().as_str()),
    }
}

/// Parse `content` in the given format.
pub fn parse_structure(format: StructureFormat, content: &str) -> Result<StructureDoc, String> {
    match format {
        StructureFormat::Json => {
            let value: serde_json::Value =
                serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))?;
            let mut doc = StructureDoc::default();
            walk_json(&value, &mut doc);
            Ok(doc)
        }
        StructureFormat::Toml => {
            let table: toml::Table = content.parse().map_err(|e| format!("invalid TOML: {}", e))?;
            let mut doc = StructureDoc::default();
            walk_toml_table(&table, &mut doc);
            Ok(doc)
        }
        StructureFormat::Yaml => {
            let mut doc = StructureDoc::default();
            for document in serde_yaml::Deserializer::from_str(content) {
                let value = serde_yaml::Value::deserialize(document)
                    .map_err(|e| format!("invalid YAML: {}", e))?;
                walk_yaml(&value, &mut doc);
            }
            Ok(doc)
        }
        StructureFormat::Xml => scan_xml(content),
        StructureFormat::Script(grammar) => AstParser::new().parse(content, grammar),
        StructureFormat::Generic => scan_generic(content),
        StructureFormat::Prose => Ok(StructureDoc::default()),
    }
}

/// Short lowercase summary of a value for value matching.
fn summarize_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map.keys().cloned().collect::<Vec<_>>().join(" "),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

fn walk_json(value: &serde_json::Value, doc: &mut StructureDoc) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                doc.push_binding(key, summarize_json(child));
                walk_json(child, doc);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                walk_json(item, doc);
            }
        }
        _ => {}
    }
}

fn summarize_toml(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(table) => table.keys().cloned().collect::<Vec<_>>().join(" "),
        toml::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

fn walk_toml_table(table: &toml::Table, doc: &mut StructureDoc) {
    for (key, child) in table {
        doc.push_binding(key, summarize_toml(child));
        walk_toml(child, doc);
    }
}

fn walk_toml(value: &toml::Value, doc: &mut StructureDoc) {
    match value {
        toml::Value::Table(table) => walk_toml_table(table, doc),
        toml::Value::Array(items) => {
            for item in items {
                walk_toml(item, doc);
            }
        }
        _ => {}
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn summarize_yaml(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Mapping(map) => map
            .keys()
            .filter_map(yaml_scalar)
            .collect::<Vec<_>>()
            .join(" "),
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .filter_map(yaml_scalar)
            .collect::<Vec<_>>()
            .join(" "),
        other => yaml_scalar(other).unwrap_or_default(),
    }
}

fn walk_yaml(value: &serde_yaml::Value, doc: &mut StructureDoc) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, child) in map {
                if let Some(key) = yaml_scalar(key) {
                    doc.push_binding(key, summarize_yaml(child));
                }
                walk_yaml(child, doc);
            }
        }
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                walk_yaml(item, doc);
            }
        }
        serde_yaml::Value::Tagged(tagged) => walk_yaml(&tagged.value, doc),
        _ => {}
    }
}

/// Element names become bindings (`<dependency>` binds `dependency`).
/// Malformed documents fail: mismatched or unclosed elements, bad syntax.
fn scan_xml(content: &str) -> Result<StructureDoc, String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut doc = StructureDoc::default();
    let mut depth: usize = 0;
    let mut elements = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => {
                depth += 1;
                elements += 1;
                doc.push_binding(&String::from_utf8_lossy(tag.local_name().as_ref()), "");
            }
            Ok(Event::Empty(tag)) => {
                elements += 1;
                doc.push_binding(&String::from_utf8_lossy(tag.local_name().as_ref()), "");
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "invalid XML at byte {}: {}",
                    reader.error_position(),
                    e
                ))
            }
        }
    }

    if depth != 0 {
        return Err(format!("invalid XML: {} unclosed element(s)", depth));
    }
    if elements == 0 {
        return Err("invalid XML: no root element".to_string());
    }
    Ok(doc)
}

fn is_comment(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with('#') || t.starts_with("//") || t.starts_with(';') || t.starts_with("--")
}

/// Paren depth after `line`, ignoring double-quoted strings; `None` when a
/// `)` has nothing to close.
fn paren_step(line: &str, mut depth: i64) -> Option<i64> {
    let mut in_quotes = false;
    let mut escaped = false;
    for c in line.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(depth)
}

/// Parenthesis balance outside double-quoted strings.
fn check_parens(content: &str) -> Result<(), String> {
    let mut depth: i64 = 0;
    for (idx, line) in content.lines().enumerate() {
        if is_comment(line) {
            continue;
        }
        depth = paren_step(line, depth).ok_or_else(|| format!("unbalanced ')' at line {}", idx + 1))?;
    }
    if depth != 0 {
        return Err(format!("{} unclosed '('", depth));
    }
    Ok(())
}

/// Text following the `)` that closes a call opened just before `rest`.
/// `None` when the call continues on later lines.
fn call_tail(rest: &str) -> Option<&str> {
    let mut depth = 1i64;
    let mut in_quotes = false;
    for (idx, c) in rest.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[idx + 1..]);
                }
            }
            _ => {}
        }
    }
    None
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// `Requirements: a recent compiler.` is a sentence, not a key binding.
fn is_sentence(value: &str) -> bool {
    let value = value.trim();
    word_count(value) >= 3 && value.ends_with(|c: char| matches!(c, '.' | '!' | '?'))
}

/// How one line of a generic file reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineShape {
    Structure,
    Neutral,
    Prose,
}

/// Line scanner for formats without a dedicated parser (CMake, Makefiles,
/// INI, go.mod, Dockerfiles, bespoke build descriptions).
///
/// Fails when sentences outnumber structural lines.
pub fn scan_generic(content: &str) -> Result<StructureDoc, String> {
    check_parens(content)?;

    let mut doc = StructureDoc::default();
    let mut depth: i64 = 0;
    let (mut structural, mut prose) = (0usize, 0usize);

    for line in content.lines() {
        if line.trim().is_empty() || is_comment(line) {
            continue;
        }
        let continued = depth > 0 || line.starts_with(char::is_whitespace);
        depth = paren_step(line, depth).unwrap_or(0);

        let shape = scan_line(line, &mut doc);
        match shape {
            LineShape::Structure => structural += 1,
            LineShape::Prose if !continued => prose += 1,
            _ => {}
        }
    }

    if prose > structural {
        return Err(format!(
            "{} of {} lines read as prose",
            prose,
            prose + structural
        ));
    }
    Ok(doc)
}

fn scan_line(line: &str, doc: &mut StructureDoc) -> LineShape {
    if let Some(cap) = SECTION_RE.captures(line) {
        doc.push_binding(&cap[1], "");
        return LineShape::Structure;
    }
    if let Some(cap) = CALL_RE.captures(line) {
        let tail = call_tail(&cap[2]).unwrap_or("");
        let tail = tail.split('#').next().unwrap_or(tail);
        if word_count(tail) < 3 {
            doc.push_invocation(&cap[1]);
            return LineShape::Structure;
        }
        return LineShape::Prose;
    }
    if let Some(cap) = COMMAND_RE.captures(line) {
        doc.push_invocation(&cap[1]);
        return LineShape::Structure;
    }
    if let Some(cap) = BINDING_RE.captures(line) {
        if is_sentence(&cap[2]) {
            return LineShape::Prose;
        }
        doc.push_binding(&cap[1], cap[2].trim());
        return LineShape::Structure;
    }
    if DIRECTIVE_RE.is_match(line) {
        return LineShape::Structure;
    }
    if word_count(line) >= PROSE_MIN_WORDS {
        LineShape::Prose
    } else {
        LineShape::Neutral
    }
}

/// A structural query with normalized name sets.
#[derive(Debug, Clone)]
pub enum CompiledQuery {
    Invocation {
        names: HashSet<String>,
    },
    Binding {
        keys: HashSet<String>,
        values: Vec<String>,
    },
}

impl CompiledQuery {
    pub fn from_config(query: &StructuralQuery) -> Self {
        match query {
            StructuralQuery::Invocation { names } => CompiledQuery::Invocation {
                names: normalize_words(names).into_iter().collect(),
            },
            StructuralQuery::Binding { keys, values } => CompiledQuery::Binding {
                keys: normalize_words(keys).into_iter().collect(),
                values: normalize_words(values),
            },
        }
    }
}

/// Evaluates structural queries against parsed documents.
#[derive(Debug, Clone)]
pub struct StructuralValidator {
    queries: Vec<CompiledQuery>,
}

impl StructuralValidator {
    pub fn new(queries: &[StructuralQuery]) -> Self {
        Self {
            queries: queries.iter().map(CompiledQuery::from_config).collect(),
        }
    }

    /// Evidence strings for every matching query element, sorted and unique.
    /// Empty means the document failed validation.
    pub fn evaluate(&self, doc: &StructureDoc) -> Vec<String> {
        let mut evidence = Vec::new();

        for query in &self.queries {
            match query {
                CompiledQuery::Invocation { names } => {
                    evidence.extend(
                        doc.invocations
                            .iter()
                            .filter(|name| names.contains(name.as_str()))
                            .map(|name| format!("invocation:{}", name)),
                    );
                }
                CompiledQuery::Binding { keys, values } => {
                    evidence.extend(
                        doc.bindings
                            .iter()
                            .filter(|b| keys.contains(&b.key))
                            .filter(|b| values.is_empty() || values.iter().any(|v| b.value.contains(v.as_str())))
                            .map(|b| format!("binding:{}", b.key)),
                    );
                }
            }
        }

        evidence.sort();
        evidence.dedup();
        evidence
    }
}
