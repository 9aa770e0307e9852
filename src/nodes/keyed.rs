use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::Result;
use crate::runtime::context::NodeContext;
use crate::runtime::node::{
    FlowContinuation, Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, ValueOutput, param_type_or,
};
use crate::runtime::value::{Value, ValueType};

// --- WRITE KEYED STORE NODE ---

#[derive(Debug)]
pub struct WriteKeyedStoreNode {
    descriptor: NodeDescriptor,
    key: ValueInput<String>,
    value: ValueInput<Value>,
    next: FlowContinuation,
}

pub struct WriteKeyedStoreDefinition;

impl NodeDefinition for WriteKeyedStoreDefinition {
    fn name(&self) -> &str { "write_keyed_store" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.flow_input();
        let key = ports.input("key");
        let value = ports.input_of("value", ValueType::Any);
        let next = ports.continuation("next");
        Ok(Box::new(WriteKeyedStoreNode {
            descriptor: ports.finish(),
            key,
            value,
            next,
        }))
    }
}

#[async_trait]
impl Node for WriteKeyedStoreNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let key = ctx.read(&self.key).await?;
        let value = ctx.read(&self.value).await?;
        ctx.write_keyed_store(&key, value);
        ctx.continue_with(&self.next).await
    }
}

// --- READ KEYED STORE NODE ---

/// Reads a keyed store entry. Missing keys and values of another type read
/// as the type default.
#[derive(Debug)]
pub struct ReadKeyedStoreNode {
    descriptor: NodeDescriptor,
    ty: ValueType,
    key: ValueInput<String>,
    value: ValueOutput<Value>,
}

pub struct ReadKeyedStoreDefinition;

impl NodeDefinition for ReadKeyedStoreDefinition {
    fn name(&self) -> &str { "read_keyed_store" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_type_or(self.name(), params, "type", ValueType::Any).map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let ty = param_type_or(self.name(), &params, "type", ValueType::Any)?;
        let mut ports = Ports::new();
        let key = ports.input("key");
        let value = ports.output_of("value", ty);
        Ok(Box::new(ReadKeyedStoreNode {
            descriptor: ports.finish(),
            ty,
            key,
            value,
        }))
    }
}

#[async_trait]
impl Node for ReadKeyedStoreNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let key = ctx.read(&self.key).await?;
        let value = ctx
            .read_keyed_store::<Value>(&key)
            .filter(|v| v.fits(self.ty))
            .unwrap_or_else(|| self.ty.default_value());
        ctx.write(&self.value, value);
        Ok(())
    }
}
