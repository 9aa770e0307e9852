//! Edge-triggered nodes driven by reactive inputs.
//!
//! `should_process` swaps the new input into a global store and compares it
//! with the value it replaced. The store is committed on every call, whether
//! or not the node goes on to process.

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::Result;
use crate::runtime::context::NodeContext;
use crate::runtime::node::{FlowContinuation, Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, param_type};
use crate::runtime::store::GlobalStore;
use crate::runtime::value::{Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// false -> true
    Rising,
    /// true -> false
    Falling,
}

impl Edge {
    fn crossed(self, previous: bool, current: bool) -> bool {
        match self {
            Edge::Rising => !previous && current,
            Edge::Falling => previous && !current,
        }
    }
}

// --- FIRE ON TRUE / FALSE ---

#[derive(Debug)]
pub struct FireOnEdgeNode {
    descriptor: NodeDescriptor,
    edge: Edge,
    input: ValueInput<bool>,
    next: FlowContinuation,
    previous: GlobalStore<bool>,
}

pub struct FireOnEdgeDefinition {
    pub edge: Edge,
}

impl NodeDefinition for FireOnEdgeDefinition {
    fn name(&self) -> &str {
        match self.edge {
            Edge::Rising => "fire_on_true",
            Edge::Falling => "fire_on_false",
        }
    }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        let input = ports.reactive("input");
        let next = ports.continuation("next");
        Ok(Box::new(FireOnEdgeNode {
            descriptor: ports.finish(),
            edge: self.edge,
            input,
            next,
            previous: GlobalStore::new(0),
        }))
    }
}

#[async_trait]
impl Node for FireOnEdgeNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn should_process(&self, ctx: &NodeContext<'_>) -> Result<bool> {
        let current = ctx.read(&self.input).await?;
        let previous = self.previous.replace(ctx, current);
        Ok(self.edge.crossed(previous, current))
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        ctx.continue_with(&self.next).await
    }
}

// --- FIRE ON CHANGE ---

#[derive(Debug)]
pub struct FireOnChangeNode {
    descriptor: NodeDescriptor,
    ty: ValueType,
    input: ValueInput<Value>,
    next: FlowContinuation,
    // None until the first observation; compared as the type default.
    previous: GlobalStore<Option<Value>>,
}

pub struct FireOnChangeDefinition;

impl NodeDefinition for FireOnChangeDefinition {
    fn name(&self) -> &str { "fire_on_change" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_type(self.name(), params, "type").map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let ty = param_type(self.name(), &params, "type")?;
        let mut ports = Ports::new();
        let input = ports.reactive_of("input", ty);
        let next = ports.continuation("next");
        Ok(Box::new(FireOnChangeNode {
            descriptor: ports.finish(),
            ty,
            input,
            next,
            previous: GlobalStore::new(0),
        }))
    }
}

#[async_trait]
impl Node for FireOnChangeNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn should_process(&self, ctx: &NodeContext<'_>) -> Result<bool> {
        let current = ctx.read(&self.input).await?;
        let previous = self
            .previous
            .replace(ctx, Some(current.clone()))
            .unwrap_or_else(|| self.ty.default_value());
        Ok(previous != current)
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        ctx.continue_with(&self.next).await
    }
}
