use crate::dsl::{split_endpoint, Graph};
use crate::error::{GraphError, Result};
use crate::runtime::blueprint::{Blueprint, BlueprintNode, FlowLink, NodeIndex, PortRef, ValueLink};
use crate::runtime::node::NodeDescriptor;
use crate::runtime::registry::NodeRegistry;
use crate::runtime::validation::check_node_id;
use std::collections::HashMap;

/// Turns a [`Graph`] into a [`Blueprint`] by resolving node ids and port
/// names to indices.
pub struct Compiler<'r> {
    registry: &'r NodeRegistry,
    id_map: HashMap<String, NodeIndex>,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r NodeRegistry) -> Self {
        Self {
            registry,
            id_map: HashMap::new(),
        }
    }

    pub fn compile(&mut self, graph: Graph) -> Result<Blueprint> {
        self.id_map.clear();

        // 1. Pass 1: Indexing
        for (idx, node) in graph.nodes.iter().enumerate() {
            check_node_id(&node.id)?;
            if self.id_map.insert(node.id.clone(), idx).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        // 2. Pass 2: Port layouts, taken from prepared instances
        let mut descriptors = Vec::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let instance = self.registry.prepare(&node.kind, node.params.clone())?;
            descriptors.push(instance.descriptor().clone());
        }

        // 3. Pass 3: Links
        let mut links = Vec::with_capacity(graph.edges.len());
        for edge in &graph.edges {
            let source = self.resolve_port(&edge.source, &descriptors, Direction::Output)?;
            let target = self.resolve_port(&edge.target, &descriptors, Direction::Input)?;
            links.push(ValueLink { source, target });
        }

        let mut flows = Vec::with_capacity(graph.flows.len());
        for flow in &graph.flows {
            let source = self.resolve_port(&flow.source, &descriptors, Direction::Flow)?;
            let target = self.resolve_node(&flow.target)?;
            flows.push(FlowLink { source, target });
        }

        let nodes = graph
            .nodes
            .into_iter()
            .map(|n| BlueprintNode {
                id: n.id,
                kind: n.kind,
                params: n.params,
            })
            .collect();

        let name = if graph.name.is_empty() {
            graph.id.clone()
        } else {
            graph.name
        };

        Ok(Blueprint {
            id: graph.id,
            name,
            nodes,
            links,
            flows,
        })
    }

    fn resolve_port(&self, endpoint: &str, descriptors: &[NodeDescriptor], direction: Direction) -> Result<PortRef> {
        let (node_id, port_name) =
            split_endpoint(endpoint).ok_or_else(|| GraphError::MalformedEndpoint(endpoint.to_string()))?;
        let node = self.resolve_node(node_id)?;
        let descriptor = &descriptors[node];

        let port = match direction {
            Direction::Output => descriptor.output_index(port_name),
            Direction::Input => descriptor.input_index(port_name),
            Direction::Flow => descriptor.flow_index(port_name),
        };

        port.map(|port| PortRef { node, port }).ok_or_else(|| match direction {
            Direction::Flow => GraphError::UnknownFlowSlot {
                node: node_id.to_string(),
                slot: port_name.to_string(),
            },
            Direction::Output | Direction::Input => GraphError::UnknownPort {
                node: node_id.to_string(),
                port: port_name.to_string(),
                direction: direction.label(),
            },
        })
    }

    fn resolve_node(&self, node_id: &str) -> Result<NodeIndex> {
        self.id_map
            .get(node_id)
            .cloned()
            .ok_or_else(|| GraphError::UnknownNode(node_id.to_string()))
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Output,
    Input,
    Flow,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Output => "output",
            Direction::Input => "input",
            Direction::Flow => "flow",
        }
    }
}
