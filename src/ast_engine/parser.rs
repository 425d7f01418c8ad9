//! Tree-sitter based structural parser.
//!
//! Parses script-like manifests (setup.py, Gemfile, BUILD, webpack configs)
//! and reduces the tree to the invocations and bindings it contains.

use tree_sitter::{Language, Node, Parser, Tree};
use tracing::debug;

use crate::ast_engine::languages::{get_node_rules, NodeRole};
use crate::ast_engine::{Binding, StructureDoc};
use crate::processing::ScriptGrammar;

/// Longest bound value kept for value matching.
const MAX_VALUE_CHARS: usize = 256;

/// Tree-sitter based structural parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct AstParser;

impl AstParser {
    pub fn new() -> Self {
        Self
    }

    /// Get the tree-sitter language for a grammar.
    fn get_language(grammar: ScriptGrammar) -> Language {
        match grammar {
            ScriptGrammar::Python => tree_sitter_python::language(),
            ScriptGrammar::Ruby => tree_sitter_ruby::language(),
            ScriptGrammar::JavaScript => tree_sitter_javascript::language(),
            ScriptGrammar::TypeScript => tree_sitter_typescript::language_typescript(),
            ScriptGrammar::Tsx => tree_sitter_typescript::language_tsx(),
        }
    }

    /// Parse `content` and collect its invocations and bindings.
    ///
    /// A tree containing error or missing nodes is a parse failure.
    pub fn parse(&self, content: &str, grammar: ScriptGrammar) -> Result<StructureDoc, String> {
        // A fresh parser per call keeps this safe to share across threads
        let mut parser = Parser::new();
        parser
            .set_language(&Self::get_language(grammar))
            .map_err(|e| format!("grammar unavailable: {}", e))?;

        let tree = parser
            .parse(content.as_bytes(), None)
            .ok_or_else(|| "parser produced no tree".to_string())?;

        if let Some(error) = first_parse_error(&tree) {
            return Err(error);
        }

        let doc = collect(&tree, content, grammar);
        debug!(
            grammar = ?grammar,
            invocations = doc.invocations.len(),
            bindings = doc.bindings.len(),
            "Parsed script structure"
        );
        Ok(doc)
    }
}

/// Position of the first error or missing node, if any.
fn first_parse_error(tree: &Tree) -> Option<String> {
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }

    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return Some(format!(
                "Parse error at line {}, column {}",
                pos.row + 1,
                pos.column
            ));
        }
        // Only descend into subtrees that contain the error
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return Some("Parse error".to_string());
            }
        }
    }
}

/// Walk the whole tree iteratively and apply the grammar's node rules.
fn collect(tree: &Tree, content: &str, grammar: ScriptGrammar) -> StructureDoc {
    let rules = get_node_rules(grammar);
    let source = content.as_bytes();
    let mut doc = StructureDoc::default();

    let mut cursor = tree.root_node().walk();
    'walk: loop {
        let node = cursor.node();
        if let Some(rule) = rules.get(node.kind()) {
            if let Some(name) = field_text(&node, rule.name_field, source).map(|t| normalize_name(&t)) {
                if !name.is_empty() {
                    match rule.role {
                        NodeRole::Invocation => doc.invocations.push(name),
                        NodeRole::Binding => {
                            let value = rule
                                .value_field
                                .and_then(|f| field_text(&node, f, source))
                                .map(|v| truncate_value(&v))
                                .unwrap_or_default();
                            doc.bindings.push(Binding { key: name, value });
                        }
                    }
                }
            }
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }

    doc
}

fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|child| child.utf8_text(source).ok())
        .map(|text| text.to_string())
}

/// Last path segment of a name, unquoted and lowercased
/// (`module.exports` -> `exports`, `"dependencies"` -> `dependencies`).
pub fn normalize_name(raw: &str) -> String {
    let unquoted = raw.trim().trim_matches(|c| matches!(c, '"' | '\'' | '`' | ':'));
    let last = unquoted
        .rsplit(|c| c == '.' || c == ':')
        .find(|s| !s.is_empty())
        .unwrap_or(unquoted);
    last.trim().to_lowercase()
}

fn truncate_value(raw: &str) -> String {
    raw.chars().take(MAX_VALUE_CHARS).collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setup_py() {
        let code = r#"
from setuptools import setup

setup(
    name="demo",
    install_requires=["requests>=2.0", "click"],
)
"#;
        let doc = AstParser::new().parse(code, ScriptGrammar::Python).unwrap();

        assert!(doc.invocations.contains(&"setup".to_string()));
        let binding = doc.bindings.iter().find(|b| b.key == "install_requires").unwrap();
        assert!(binding.value.contains("requests"));
    }

    #[test]
    fn test_parse_gemfile() {
        let code = "source \"https://rubygems.org\"\ngem \"rails\", \"~> 7.0\"\ngem 'puma'\n";
        let doc = AstParser::new().parse(code, ScriptGrammar::Ruby).unwrap();

        assert!(doc.invocations.contains(&"gem".to_string()));
        assert!(doc.invocations.contains(&"source".to_string()));
    }

    #[test]
    fn test_parse_javascript_object_keys() {
        let code = "module.exports = { dependencies: { react: '^18.0.0' } };\nconst x = require('path');\n";
        let doc = AstParser::new().parse(code, ScriptGrammar::JavaScript).unwrap();

        assert!(doc.bindings.iter().any(|b| b.key == "exports"));
        assert!(doc.bindings.iter().any(|b| b.key == "dependencies"));
        assert!(doc.invocations.contains(&"require".to_string()));
    }

    #[test]
    fn test_syntax_error_is_failure() {
        let err = AstParser::new()
            .parse("def broken(:\n    pass(\n", ScriptGrammar::Python)
            .unwrap_err();
        assert!(err.starts_with("Parse error"));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("module.exports"), "exports");
        assert_eq!(normalize_name("\"DevDependencies\""), "devdependencies");
        assert_eq!(normalize_name("Foo::Bar"), "bar");
        assert_eq!(normalize_name("plain"), "plain");
    }
}
