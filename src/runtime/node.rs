use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::{GraphError, Result};
use crate::runtime::context::NodeContext;
use crate::runtime::parameter::ReceivedParameter;
use crate::runtime::value::{PortValue, Value, ValueType};

/// Runtime node interface
///
/// A pulse reaching a node runs `should_process` and, when it returns true,
/// `process`. Which other hooks the field calls is decided by the node's
/// [`NodeDescriptor`], not by the trait.
#[async_trait]
pub trait Node: Send + Sync + Debug {
    fn descriptor(&self) -> &NodeDescriptor;

    async fn should_process(&self, _ctx: &NodeContext<'_>) -> Result<bool> {
        Ok(true)
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()>;

    /// Per-tick hook for nodes with an [`UpdateHook`]. Returning true starts a
    /// pulse at this node.
    async fn on_update(&self, _ctx: &NodeContext<'_>) -> Result<bool> {
        Ok(false)
    }

    /// Writes an impulse payload into the node's outputs before it processes.
    fn receive_impulse(&self, _ctx: &NodeContext<'_>, _payload: &[Value]) -> Result<()> {
        Ok(())
    }

    /// Offers an external parameter to the node. Returns whether the node
    /// took it and wants to process.
    fn on_parameter_received(&self, _ctx: &NodeContext<'_>, _param: &ReceivedParameter) -> Result<bool> {
        Ok(false)
    }
}

/// 节点工厂/定义接口
pub trait NodeDefinition: Send + Sync {
    fn name(&self) -> &str;
    fn validate(&self, params: &Json) -> Result<()>;
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub name: String,
    pub ty: ValueType,
    /// Changes on this input start a pulse at the node.
    pub reactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Forks the pulse and returns without waiting for the downstream chain.
    Call,
    /// Runs the downstream chain in the same pulse and waits for it.
    Continuation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSpec {
    pub name: String,
    pub kind: FlowKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateHook {
    /// Lower offsets run first within a tick.
    pub offset: i32,
    /// Active hooks may suspend; they are awaited one after another.
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpulseRole {
    Send,
    Receive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseBinding {
    pub role: ImpulseRole,
    pub name: String,
    pub types: Vec<ValueType>,
}

/// Ports and execution protocols a node takes part in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDescriptor {
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub flows: Vec<FlowSpec>,
    pub flow_input: bool,
    pub update: Option<UpdateHook>,
    pub impulse: Option<ImpulseBinding>,
    pub parameter_listener: bool,
    pub on_start: bool,
}

impl NodeDescriptor {
    /// Pure value nodes are evaluated lazily when a downstream input reads them.
    pub fn is_value_node(&self) -> bool {
        !self.flow_input
            && self.flows.is_empty()
            && self.update.is_none()
            && self.impulse.is_none()
            && !self.parameter_listener
            && !self.on_start
    }

    pub fn reactive_inputs(&self) -> impl Iterator<Item = usize> + '_ {
        self.inputs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.reactive)
            .map(|(i, _)| i)
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    pub fn flow_index(&self, name: &str) -> Option<usize> {
        self.flows.iter().position(|f| f.name == name)
    }
}

pub struct ValueInput<T> {
    pub(crate) index: usize,
    _marker: PhantomData<fn() -> T>,
}

pub struct ValueOutput<T> {
    pub(crate) index: usize,
    _marker: PhantomData<fn() -> T>,
}

#[derive(Debug, Clone, Copy)]
pub struct FlowCall {
    pub(crate) slot: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FlowContinuation {
    pub(crate) slot: usize,
}

macro_rules! port_handle_impls {
    ($handle:ident) => {
        impl<T> $handle<T> {
            fn new(index: usize) -> Self {
                Self {
                    index,
                    _marker: PhantomData,
                }
            }

            pub fn index(&self) -> usize {
                self.index
            }
        }

        impl<T> Clone for $handle<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $handle<T> {}

        impl<T> Debug for $handle<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($handle), self.index)
            }
        }
    };
}

port_handle_impls!(ValueInput);
port_handle_impls!(ValueOutput);

/// Builds a [`NodeDescriptor`] and hands out typed handles in declaration order.
#[derive(Debug, Default)]
pub struct Ports {
    descriptor: NodeDescriptor,
}

impl Ports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input<T: PortValue>(&mut self, name: &str) -> ValueInput<T> {
        self.push_input(name, T::TYPE, false)
    }

    /// A typed input whose changes start a pulse at the node.
    pub fn reactive<T: PortValue>(&mut self, name: &str) -> ValueInput<T> {
        self.push_input(name, T::TYPE, true)
    }

    /// An input whose type is chosen at prepare time.
    pub fn input_of(&mut self, name: &str, ty: ValueType) -> ValueInput<Value> {
        self.push_input(name, ty, false)
    }

    pub fn reactive_of(&mut self, name: &str, ty: ValueType) -> ValueInput<Value> {
        self.push_input(name, ty, true)
    }

    pub fn output<T: PortValue>(&mut self, name: &str) -> ValueOutput<T> {
        self.push_output(name, T::TYPE)
    }

    pub fn output_of(&mut self, name: &str, ty: ValueType) -> ValueOutput<Value> {
        self.push_output(name, ty)
    }

    pub fn call(&mut self, name: &str) -> FlowCall {
        FlowCall {
            slot: self.push_flow(name, FlowKind::Call),
        }
    }

    pub fn continuation(&mut self, name: &str) -> FlowContinuation {
        FlowContinuation {
            slot: self.push_flow(name, FlowKind::Continuation),
        }
    }

    pub fn flow_input(&mut self) -> &mut Self {
        self.descriptor.flow_input = true;
        self
    }

    pub fn update(&mut self, offset: i32, active: bool) -> &mut Self {
        self.descriptor.update = Some(UpdateHook { offset, active });
        self
    }

    pub fn impulse(&mut self, role: ImpulseRole, name: &str, types: &[ValueType]) -> &mut Self {
        self.descriptor.impulse = Some(ImpulseBinding {
            role,
            name: name.to_string(),
            types: types.to_vec(),
        });
        self
    }

    pub fn parameter_listener(&mut self) -> &mut Self {
        self.descriptor.parameter_listener = true;
        self
    }

    pub fn on_start(&mut self) -> &mut Self {
        self.descriptor.on_start = true;
        self
    }

    pub fn finish(self) -> NodeDescriptor {
        self.descriptor
    }

    fn push_input<T>(&mut self, name: &str, ty: ValueType, reactive: bool) -> ValueInput<T> {
        self.descriptor.inputs.push(PortSpec {
            name: name.to_string(),
            ty,
            reactive,
        });
        ValueInput::new(self.descriptor.inputs.len() - 1)
    }

    fn push_output<T>(&mut self, name: &str, ty: ValueType) -> ValueOutput<T> {
        self.descriptor.outputs.push(PortSpec {
            name: name.to_string(),
            ty,
            reactive: false,
        });
        ValueOutput::new(self.descriptor.outputs.len() - 1)
    }

    fn push_flow(&mut self, name: &str, kind: FlowKind) -> usize {
        self.descriptor.flows.push(FlowSpec {
            name: name.to_string(),
            kind,
        });
        self.descriptor.flows.len() - 1
    }
}

// --- Param helpers shared by node definitions ---

pub fn param_str<'a>(kind: &str, params: &'a Json, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GraphError::invalid_params(kind, format!("missing string param '{}'", key)))
}

pub fn param_type(kind: &str, params: &Json, key: &str) -> Result<ValueType> {
    let raw = params
        .get(key)
        .ok_or_else(|| GraphError::invalid_params(kind, format!("missing type param '{}'", key)))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| GraphError::invalid_params(kind, format!("invalid type '{}': {}", raw, e)))
}

pub fn param_type_or(kind: &str, params: &Json, key: &str, default: ValueType) -> Result<ValueType> {
    if params.get(key).is_some() {
        param_type(kind, params, key)
    } else {
        Ok(default)
    }
}

pub fn param_types(kind: &str, params: &Json, key: &str) -> Result<Vec<ValueType>> {
    match params.get(key) {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| GraphError::invalid_params(kind, format!("invalid type list '{}': {}", raw, e))),
    }
}

pub fn param_i32_or(params: &Json, key: &str, default: i32) -> i32 {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(default)
}
