use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type NodeIndex = usize;

/// 编译后的蓝图 (中间表示，可序列化)
///
/// Node IDs and port names are resolved to indices; the runtime never looks
/// names up again except for logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Blueprint {
    pub id: String,
    pub name: String,
    pub nodes: Vec<BlueprintNode>,
    #[serde(default)]
    pub links: Vec<ValueLink>,
    #[serde(default)]
    pub flows: Vec<FlowLink>,
}

/// 蓝图节点配置
/// `params` is handed to `NodeDefinition::prepare` as is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlueprintNode {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeIndex,
    pub port: usize,
}

/// Output port `source` feeds input port `target`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueLink {
    pub source: PortRef,
    pub target: PortRef,
}

/// Flow slot `source` (port = slot index) triggers node `target`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowLink {
    pub source: PortRef,
    pub target: NodeIndex,
}

impl Blueprint {
    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.id == id)
    }
}
