//! AST engine for structural manifest validation.
//!
//! This module provides:
//! - Tree-sitter parsing for script-like manifests (Python, Ruby, JS/TS)
//! - Per-grammar node rules mapping syntax to invocations and bindings
//! - [`StructureDoc`], the language-agnostic view every structural parser produces

pub mod languages;
pub mod parser;

use serde::{Deserialize, Serialize};

pub use languages::{get_node_rules, NodeRole, NodeRule};
pub use parser::{normalize_name, AstParser};

/// A key bound to a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Normalized (lowercased, unquoted) key
    pub key: String,
    /// Lowercased value text, possibly truncated
    pub value: String,
}

/// Language-agnostic structure of a parsed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureDoc {
    /// Normalized names of invoked functions, commands and directives
    pub invocations: Vec<String>,
    pub bindings: Vec<Binding>,
}

impl StructureDoc {
    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty() && self.bindings.is_empty()
    }

    pub fn push_binding(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.bindings.push(Binding {
            key: normalize_name(key.as_ref()),
            value: value.as_ref().to_lowercase(),
        });
    }

    pub fn push_invocation(&mut self, name: impl AsRef<str>) {
        let name = normalize_name(name.as_ref());
        if !name.is_empty() {
            self.invocations.push(name);
        }
    }
}
