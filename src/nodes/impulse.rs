use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::runtime::context::NodeContext;
use crate::runtime::impulse::ImpulseDefinition;
use crate::runtime::node::{
    FlowContinuation, ImpulseRole, Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, ValueOutput, param_str,
    param_types,
};
use crate::runtime::value::Value;

/// Payload ports are named `value1`, `value2`, ...
fn payload_port(position: usize) -> String {
    format!("value{}", position + 1)
}

// --- IMPULSE SEND NODE ---

#[derive(Debug)]
pub struct ImpulseSendNode {
    descriptor: NodeDescriptor,
    name: String,
    values: Vec<ValueInput<Value>>,
    next: FlowContinuation,
}

pub struct ImpulseSendDefinition;

impl NodeDefinition for ImpulseSendDefinition {
    fn name(&self) -> &str { "impulse_send" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_str(self.name(), params, "name")?;
        param_types(self.name(), params, "types").map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let name = param_str(self.name(), &params, "name")?.to_string();
        let types = param_types(self.name(), &params, "types")?;

        let mut ports = Ports::new();
        ports.flow_input().impulse(ImpulseRole::Send, &name, &types);
        let values = types
            .iter()
            .enumerate()
            .map(|(i, ty)| ports.input_of(&payload_port(i), *ty))
            .collect();
        let next = ports.continuation("next");
        Ok(Box::new(ImpulseSendNode {
            descriptor: ports.finish(),
            name,
            values,
            next,
        }))
    }
}

#[async_trait]
impl Node for ImpulseSendNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let mut payload = Vec::with_capacity(self.values.len());
        for input in &self.values {
            payload.push(ctx.read(input).await?);
        }
        let receivers = ctx.trigger_impulse(ImpulseDefinition::new(self.name.clone(), payload))?;
        debug!(node = %ctx.node_id(), impulse = %self.name, receivers, "Impulse sent");
        ctx.continue_with(&self.next).await
    }
}

// --- IMPULSE RECEIVE NODE ---

#[derive(Debug)]
pub struct ImpulseReceiveNode {
    descriptor: NodeDescriptor,
    values: Vec<ValueOutput<Value>>,
    next: FlowContinuation,
}

pub struct ImpulseReceiveDefinition;

impl NodeDefinition for ImpulseReceiveDefinition {
    fn name(&self) -> &str { "impulse_receive" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_str(self.name(), params, "name")?;
        param_types(self.name(), params, "types").map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let name = param_str(self.name(), &params, "name")?.to_string();
        let types = param_types(self.name(), &params, "types")?;

        let mut ports = Ports::new();
        ports.impulse(ImpulseRole::Receive, &name, &types);
        let values = types
            .iter()
            .enumerate()
            .map(|(i, ty)| ports.output_of(&payload_port(i), *ty))
            .collect();
        let next = ports.continuation("next");
        Ok(Box::new(ImpulseReceiveNode {
            descriptor: ports.finish(),
            values,
            next,
        }))
    }
}

#[async_trait]
impl Node for ImpulseReceiveNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn receive_impulse(&self, ctx: &NodeContext<'_>, payload: &[Value]) -> Result<()> {
        // The field checks signatures before dispatch; this guards direct calls.
        if payload.len() != self.values.len() {
            let binding = self.descriptor.impulse.as_ref();
            return Err(GraphError::ImpulseMismatch {
                name: binding.map(|b| b.name.clone()).unwrap_or_default(),
                expected: binding.map(|b| b.types.clone()).unwrap_or_default(),
                actual: payload.iter().map(Value::value_type).collect(),
            });
        }
        for (output, value) in self.values.iter().zip(payload) {
            ctx.write(output, value.clone());
        }
        Ok(())
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        ctx.continue_with(&self.next).await
    }
}
