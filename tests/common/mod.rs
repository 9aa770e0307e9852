#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pulsegraph::compiler::core::Compiler;
use pulsegraph::dsl::Graph;
use pulsegraph::error::Result;
use pulsegraph::runtime::node::{FlowContinuation, ValueInput};
use pulsegraph::runtime::{Field, Node, NodeContext, NodeDefinition, NodeDescriptor, NodeRegistry, Ports, ReceivedParameter};
use pulsegraph::{FieldConfig, Value, ValueType};
use serde_json::Value as Json;
use std::sync::Arc;

/// Shared log of `(node id, value)` pairs written by `record` nodes.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<(String, Value)>>>);

impl Recorded {
    pub fn values(&self, node: &str) -> Vec<Value> {
        self.0
            .lock()
            .iter()
            .filter(|(id, _)| id == node)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn count(&self, node: &str) -> usize {
        self.values(node).len()
    }

    pub fn order(&self) -> Vec<String> {
        self.0.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}

/// Flow node that records its `value` input, then continues to `next`.
#[derive(Debug)]
struct RecordNode {
    descriptor: NodeDescriptor,
    value: ValueInput<Value>,
    next: FlowContinuation,
    log: Arc<Mutex<Vec<(String, Value)>>>,
}

pub struct RecordDefinition {
    pub log: Recorded,
}

impl NodeDefinition for RecordDefinition {
    fn name(&self) -> &str { "record" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.flow_input();
        let value = ports.input_of("value", ValueType::Any);
        let next = ports.continuation("next");
        Ok(Box::new(RecordNode {
            descriptor: ports.finish(),
            value,
            next,
            log: self.log.0.clone(),
        }))
    }
}

#[async_trait]
impl Node for RecordNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let value = ctx.read(&self.value).await?;
        self.log.lock().push((ctx.node_id().to_string(), value));
        ctx.continue_with(&self.next).await
    }
}

pub fn registry(log: &Recorded) -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins();
    registry.register(Box::new(RecordDefinition { log: log.clone() }));
    registry
}

pub fn load(graph: Graph, log: &Recorded) -> Field {
    load_with(graph, log, FieldConfig::default())
}

pub fn load_with(graph: Graph, log: &Recorded, config: FieldConfig) -> Field {
    let registry = registry(log);
    let blueprint = Compiler::new(&registry).compile(graph).expect("Compilation failed");
    Field::load(&blueprint, &registry, config).expect("Field load failed")
}

pub async fn send(field: &Field, name: &str, value: impl Into<Value>) -> usize {
    field
        .receive_parameter(ReceivedParameter::new(name, value))
        .await
}
