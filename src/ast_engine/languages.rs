//! Per-grammar node mappings for structural parsing.
//!
//! Maps tree-sitter node types to the role they play in a manifest: an
//! invocation (a call or command) or a binding (an assignment, keyword
//! argument or object key).

use std::collections::HashMap;

use crate::processing::ScriptGrammar;

/// Role of a node in a structure document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Invocation,
    Binding,
}

/// How to read one node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRule {
    pub role: NodeRole,
    /// Field holding the invoked name or the bound key
    pub name_field: &'static str,
    /// Field holding the bound value (bindings only)
    pub value_field: Option<&'static str>,
}

const fn invocation(name_field: &'static str) -> NodeRule {
    NodeRule {
        role: NodeRole::Invocation,
        name_field,
        value_field: None,
    }
}

const fn binding(name_field: &'static str, value_field: &'static str) -> NodeRule {
    NodeRule {
        role: NodeRole::Binding,
        name_field,
        value_field: Some(value_field),
    }
}

/// Get the node rules for a grammar.
pub fn get_node_rules(grammar: ScriptGrammar) -> HashMap<&'static str, NodeRule> {
    match grammar {
        ScriptGrammar::Python => python_node_rules(),
        ScriptGrammar::Ruby => ruby_node_rules(),
        ScriptGrammar::JavaScript | ScriptGrammar::TypeScript | ScriptGrammar::Tsx => {
            javascript_node_rules()
        }
    }
}

/// Python (and Starlark) node rules.
fn python_node_rules() -> HashMap<&'static str, NodeRule> {
    [
        ("call", invocation("function")),
        ("assignment", binding("left", "right")),
        ("keyword_argument", binding("name", "value")),
        ("pair", binding("key", "value")),
    ]
    .into_iter()
    .collect()
}

/// Ruby node rules. Command calls (`gem "rails"`) are `call` nodes too.
fn ruby_node_rules() -> HashMap<&'static str, NodeRule> {
    [
        ("call", invocation("method")),
        ("assignment", binding("left", "right")),
        ("pair", binding("key", "value")),
    ]
    .into_iter()
    .collect()
}

/// JavaScript/TypeScript node rules.
fn javascript_node_rules() -> HashMap<&'static str, NodeRule> {
    [
        ("call_expression", invocation("function")),
        ("assignment_expression", binding("left", "right")),
        ("variable_declarator", binding("name", "value")),
        ("pair", binding("key", "value")),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_rules() {
        let rules = get_node_rules(ScriptGrammar::Python);
        assert_eq!(rules.get("call"), Some(&invocation("function")));
        assert_eq!(rules.get("keyword_argument").map(|r| r.role), Some(NodeRole::Binding));
    }

    #[test]
    fn test_typescript_shares_javascript_rules() {
        assert_eq!(
            get_node_rules(ScriptGrammar::TypeScript),
            get_node_rules(ScriptGrammar::JavaScript)
        );
    }
}
