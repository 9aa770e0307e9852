use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::Result;
use crate::runtime::context::NodeContext;
use crate::runtime::node::{FlowContinuation, Node, NodeDefinition, NodeDescriptor, Ports, ValueOutput, param_str, param_type};
use crate::runtime::parameter::ReceivedParameter;
use crate::runtime::store::LocalStore;
use crate::runtime::value::{Value, ValueType};

/// How a listener picks its parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterMatch {
    /// A fixed parameter name.
    Name(String),
    /// A lookup key resolved through `FieldConfig::registered_parameters`.
    Registered(String),
}

// --- PARAMETER RECEIVED NODE ---

/// Fires when a parameter with the matching name and type arrives.
#[derive(Debug)]
pub struct ParameterReceivedNode {
    descriptor: NodeDescriptor,
    matcher: ParameterMatch,
    ty: ValueType,
    value: ValueOutput<Value>,
    next: FlowContinuation,
    received: LocalStore<Option<ReceivedParameter>>,
}

impl ParameterReceivedNode {
    fn new(matcher: ParameterMatch, ty: ValueType) -> Self {
        let mut ports = Ports::new();
        ports.parameter_listener();
        let value = ports.output_of("value", ty);
        let next = ports.continuation("next");
        Self {
            descriptor: ports.finish(),
            matcher,
            ty,
            value,
            next,
            received: LocalStore::new(0),
        }
    }

    fn matches(&self, ctx: &NodeContext<'_>, param: &ReceivedParameter) -> bool {
        let name = match &self.matcher {
            ParameterMatch::Name(name) => Some(name.as_str()),
            ParameterMatch::Registered(lookup) => ctx.config().resolve_parameter(lookup),
        };
        name == Some(param.name.as_str()) && param.value_as(self.ty).is_some()
    }
}

pub struct OnParameterReceivedDefinition;

impl NodeDefinition for OnParameterReceivedDefinition {
    fn name(&self) -> &str { "on_parameter_received" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_str(self.name(), params, "name")?;
        param_type(self.name(), params, "type").map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let name = param_str(self.name(), &params, "name")?.to_string();
        let ty = param_type(self.name(), &params, "type")?;
        Ok(Box::new(ParameterReceivedNode::new(ParameterMatch::Name(name), ty)))
    }
}

pub struct RegisteredParameterReceivedDefinition;

impl NodeDefinition for RegisteredParameterReceivedDefinition {
    fn name(&self) -> &str { "registered_parameter_received" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_str(self.name(), params, "lookup")?;
        param_type(self.name(), params, "type").map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let lookup = param_str(self.name(), &params, "lookup")?.to_string();
        let ty = param_type(self.name(), &params, "type")?;
        Ok(Box::new(ParameterReceivedNode::new(ParameterMatch::Registered(lookup), ty)))
    }
}

#[async_trait]
impl Node for ParameterReceivedNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn on_parameter_received(&self, ctx: &NodeContext<'_>, param: &ReceivedParameter) -> Result<bool> {
        if !self.matches(ctx, param) {
            return Ok(false);
        }
        self.received.write(ctx, Some(param.clone()));
        Ok(true)
    }

    async fn should_process(&self, ctx: &NodeContext<'_>) -> Result<bool> {
        Ok(self.received.read(ctx).is_some())
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let Some(param) = self.received.read(ctx) else {
            return Ok(());
        };
        ctx.write(&self.value, param.value);
        ctx.continue_with(&self.next).await
    }
}

// --- PARAMETER SOURCE NODE ---

/// Value node exposing the last received value of a parameter, or the type
/// default when none of that type has arrived.
#[derive(Debug)]
pub struct ParameterSourceNode {
    descriptor: NodeDescriptor,
    name: String,
    ty: ValueType,
    value: ValueOutput<Value>,
}

pub struct ParameterSourceDefinition;

impl NodeDefinition for ParameterSourceDefinition {
    fn name(&self) -> &str { "parameter_source" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_str(self.name(), params, "name")?;
        param_type(self.name(), params, "type").map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let name = param_str(self.name(), &params, "name")?.to_string();
        let ty = param_type(self.name(), &params, "type")?;
        let mut ports = Ports::new();
        let value = ports.output_of("value", ty);
        Ok(Box::new(ParameterSourceNode {
            descriptor: ports.finish(),
            name,
            ty,
            value,
        }))
    }
}

#[async_trait]
impl Node for ParameterSourceNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let value = ctx
            .parameter(&self.name)
            .filter(|v| v.fits(self.ty))
            .unwrap_or_else(|| self.ty.default_value());
        ctx.write(&self.value, value);
        Ok(())
    }
}
