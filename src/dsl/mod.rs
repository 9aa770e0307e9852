pub mod builder;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 原始 DSL 定义的 Graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Graph {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<GraphNode>,
    /// Value links, `"node.port"` to `"node.port"`.
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Flow links, `"node.slot"` to `"node"`.
    #[serde(default)]
    pub flows: Vec<Flow>,
}

/// DSL 中的节点
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

/// DSL 中的边
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flow {
    pub source: String,
    pub target: String,
}

/// Splits `"node.port"` at the last dot.
pub fn split_endpoint(endpoint: &str) -> Option<(&str, &str)> {
    let (node, port) = endpoint.rsplit_once('.')?;
    if node.is_empty() || port.is_empty() {
        return None;
    }
    Some((node, port))
}
