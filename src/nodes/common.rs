use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::info;

use crate::error::{GraphError, Result};
use crate::runtime::context::NodeContext;
use crate::runtime::node::{
    FlowContinuation, Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, ValueOutput, param_type,
};
use crate::runtime::value::{Value, ValueType};

// --- CONSTANT NODE ---

#[derive(Debug)]
pub struct ConstantNode {
    descriptor: NodeDescriptor,
    value: Value,
    output: ValueOutput<Value>,
}

pub struct ConstantDefinition;

impl NodeDefinition for ConstantDefinition {
    fn name(&self) -> &str { "constant" }
    fn validate(&self, params: &Json) -> Result<()> {
        let ty = param_type(self.name(), params, "type")?;
        Value::from_json(ty, params.get("value").unwrap_or(&Json::Null))
            .map(|_| ())
            .map_err(|e| GraphError::invalid_params(self.name(), e.to_string()))
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let ty = param_type(self.name(), &params, "type")?;
        let value = Value::from_json(ty, params.get("value").unwrap_or(&Json::Null))?;

        let mut ports = Ports::new();
        let output = ports.output_of("value", ty);
        Ok(Box::new(ConstantNode {
            descriptor: ports.finish(),
            value,
            output,
        }))
    }
}

#[async_trait]
impl Node for ConstantNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        ctx.write(&self.output, self.value.clone());
        Ok(())
    }
}

// --- LOG NODE ---

#[derive(Debug)]
pub struct LogNode {
    descriptor: NodeDescriptor,
    message: ValueInput<Value>,
    next: FlowContinuation,
}

pub struct LogDefinition;

impl NodeDefinition for LogDefinition {
    fn name(&self) -> &str { "log" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.flow_input();
        let message = ports.input_of("message", ValueType::Any);
        let next = ports.continuation("next");
        Ok(Box::new(LogNode {
            descriptor: ports.finish(),
            message,
            next,
        }))
    }
}

#[async_trait]
impl Node for LogNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let message = ctx.read(&self.message).await?;
        info!(node = %ctx.node_id(), "[LOG] {}", message);
        ctx.continue_with(&self.next).await
    }
}

// --- ON START NODE ---

#[derive(Debug)]
pub struct OnStartNode {
    descriptor: NodeDescriptor,
    next: FlowContinuation,
}

pub struct OnStartDefinition;

impl NodeDefinition for OnStartDefinition {
    fn name(&self) -> &str { "on_start" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.on_start();
        let next = ports.continuation("next");
        Ok(Box::new(OnStartNode {
            descriptor: ports.finish(),
            next,
        }))
    }
}

#[async_trait]
impl Node for OnStartNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        ctx.continue_with(&self.next).await
    }
}
