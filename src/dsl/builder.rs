use crate::dsl::{Edge, Flow, Graph, GraphNode};
use serde_json::{Map, Value};

pub struct GraphBuilder {
    id: String,
    name: String,
    pub nodes: Vec<GraphNode>, // Made public for manual manipulation in tests if needed
    edges: Vec<Edge>,
    flows: Vec<Flow>,
}

impl GraphBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            flows: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Adds a node without params.
    pub fn node(mut self, id: &str, kind: &str) -> Self {
        self.nodes.push(GraphNode {
            id: id.to_string(),
            kind: kind.to_string(),
            params: Value::Null,
        });
        self
    }

    /// Starts a node that takes params; finish it with [`NodeBuilder::build`].
    pub fn with(self, id: &str, kind: &str) -> NodeBuilder {
        NodeBuilder {
            graph_builder: self,
            id: id.to_string(),
            kind: kind.to_string(),
            params: Map::new(),
        }
    }

    /// Links an output port to an input port: `link("a.value", "b.input")`.
    pub fn link(mut self, source: &str, target: &str) -> Self {
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
        });
        self
    }

    /// Links a flow slot to a node: `flow("a.next", "b")`.
    pub fn flow(mut self, source: &str, target: &str) -> Self {
        self.flows.push(Flow {
            source: source.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn build(self) -> Graph {
        Graph {
            id: self.id,
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
            flows: self.flows,
        }
    }
}

pub struct NodeBuilder {
    graph_builder: GraphBuilder,
    id: String,
    kind: String,
    params: Map<String, Value>,
}

impl NodeBuilder {
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn build(mut self) -> GraphBuilder {
        self.graph_builder.nodes.push(GraphNode {
            id: self.id,
            kind: self.kind,
            params: Value::Object(self.params),
        });
        self.graph_builder
    }
}
