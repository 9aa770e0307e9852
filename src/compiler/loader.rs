use anyhow::{Context as AnyhowContext, Result};
use std::fs;
use std::path::Path;

use crate::config::FieldConfig;
use crate::dsl::Graph;

pub fn load_graph_from_yaml(file_path: impl AsRef<Path>) -> Result<Graph> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read YAML file from {}", file_path.display()))?;

    let graph: Graph = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize graph from {}", file_path.display()))?;

    Ok(graph)
}

/// Missing fields take their defaults.
pub fn load_config_from_yaml(file_path: impl AsRef<Path>) -> Result<FieldConfig> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read config file from {}", file_path.display()))?;

    // An empty document deserializes to null, not to an empty mapping.
    if yaml_content.trim().is_empty() {
        return Ok(FieldConfig::default());
    }

    let config: FieldConfig = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize config from {}", file_path.display()))?;

    Ok(config)
}
