use std::collections::HashMap;

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::nodes;
use crate::runtime::node::{Node, NodeDefinition};

/// Registry for node factories, keyed by kind name.
#[derive(Default)]
pub struct NodeRegistry {
    definitions: HashMap<String, Box<dyn NodeDefinition>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in node kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        nodes::register_builtins(&mut registry);
        registry
    }

    /// Registers a definition, replacing any previous one with the same name.
    pub fn register(&mut self, definition: Box<dyn NodeDefinition>) {
        self.definitions
            .insert(definition.name().to_string(), definition);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.definitions.contains_key(kind)
    }

    /// Sorted kind names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn prepare(&self, kind: &str, params: Value) -> Result<Box<dyn Node>> {
        let definition = self
            .definitions
            .get(kind)
            .ok_or_else(|| GraphError::UnknownNodeKind(kind.to_string()))?;
        definition.validate(&params)?;
        definition.prepare(params)
    }
}
