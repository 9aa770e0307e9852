use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::FieldConfig;
use crate::error::Result;
use crate::runtime::blueprint::NodeIndex;
use crate::runtime::cancel::CancelToken;
use crate::runtime::field::Field;
use crate::runtime::impulse::ImpulseDefinition;
use crate::runtime::node::{FlowCall, FlowContinuation, ValueInput, ValueOutput};
use crate::runtime::store::StoreArena;
use crate::runtime::value::{PortValue, Value};

/// Per-pulse memory: output values, local stores and the value-node memo.
#[derive(Default)]
pub(crate) struct PulseMemory {
    outputs: DashMap<(NodeIndex, usize), Value>,
    locals: StoreArena,
    evaluated: DashSet<NodeIndex>,
}

impl PulseMemory {
    /// Copies outputs and local stores. The memo is dropped so forked
    /// pulses re-evaluate value nodes on first read.
    fn fork(&self) -> Self {
        Self {
            outputs: self.outputs.clone(),
            locals: self.locals.clone(),
            evaluated: DashSet::new(),
        }
    }
}

/// 运行时上下文 (Pulse Context)
///
/// One activation chain through the graph. The context is owned by the
/// task running the pulse, so it stays valid across every suspension point
/// of that chain.
pub struct PulseContext {
    id: Uuid,
    field: Field,
    cancel: CancelToken,
    memory: PulseMemory,
}

impl PulseContext {
    pub(crate) fn new(field: Field, cancel: CancelToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            field,
            cancel,
            memory: PulseMemory::default(),
        }
    }

    /// A new pulse that sees everything this pulse has written so far.
    pub(crate) fn fork(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            field: self.field.clone(),
            cancel: self.cancel.child(),
            memory: self.memory.fork(),
        }
    }

    /// A new pulse with empty memory that is cancelled together with this one.
    pub(crate) fn detach(&self) -> Self {
        Self::new(self.field.clone(), self.cancel.child())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub(crate) fn output(&self, node: NodeIndex, port: usize) -> Option<Value> {
        self.memory.outputs.get(&(node, port)).map(|v| v.value().clone())
    }

    pub(crate) fn set_output(&self, node: NodeIndex, port: usize, value: Value) {
        self.memory.outputs.insert((node, port), value);
    }

    pub(crate) fn locals(&self) -> &StoreArena {
        &self.memory.locals
    }

    pub(crate) fn is_evaluated(&self, node: NodeIndex) -> bool {
        self.memory.evaluated.contains(&node)
    }

    pub(crate) fn mark_evaluated(&self, node: NodeIndex) {
        self.memory.evaluated.insert(node);
    }

    pub(crate) fn invalidate_evaluated(&self) {
        self.memory.evaluated.clear();
    }
}

/// The view of a pulse from inside one node.
pub struct NodeContext<'a> {
    pulse: &'a PulseContext,
    node: NodeIndex,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(pulse: &'a PulseContext, node: NodeIndex) -> Self {
        Self { pulse, node }
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub fn node_id(&self) -> &str {
        self.pulse.field.node_id(self.node)
    }

    pub fn pulse(&self) -> &'a PulseContext {
        self.pulse
    }

    pub fn field(&self) -> &'a Field {
        &self.pulse.field
    }

    pub fn config(&self) -> &'a FieldConfig {
        self.pulse.field.config()
    }

    pub fn is_cancelled(&self) -> bool {
        self.pulse.is_cancelled()
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    pub async fn read<T: PortValue>(&self, input: &ValueInput<T>) -> Result<T> {
        let value = self.read_value(input.index).await?;
        T::from_value(value)
    }

    /// Reads an input by index: the linked output if this pulse has one,
    /// otherwise the type default.
    pub async fn read_value(&self, port: usize) -> Result<Value> {
        self.pulse
            .field
            .resolve_input(self.pulse, self.node, port)
            .await
    }

    pub fn write<T: PortValue>(&self, output: &ValueOutput<T>, value: T) {
        self.write_value(output.index, value.into_value());
    }

    pub fn write_value(&self, port: usize, value: Value) {
        if self.pulse.field.is_value_node(self.node) {
            self.pulse.set_output(self.node, port, value);
            return;
        }
        self.pulse.set_output(self.node, port, value.clone());
        // Value nodes may read this output; their memo is stale now.
        self.pulse.invalidate_evaluated();
        self.pulse
            .field
            .output_written(self.pulse, self.node, port, &value);
    }

    /// Starts the chain behind `flow` in a forked pulse and returns at once.
    pub fn call(&self, flow: &FlowCall) {
        self.pulse.field.spawn_flow(self.pulse, self.node, flow.slot);
    }

    /// Runs the chain behind `flow` in this pulse and waits for it.
    pub async fn continue_with(&self, flow: &FlowContinuation) -> Result<()> {
        self.pulse
            .field
            .continue_flow(self.pulse, self.node, flow.slot)
            .await
    }

    /// Sleeps for `duration`. Returns false when the pulse was cancelled
    /// before the time elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_cancelled(),
            _ = self.pulse.cancel.cancelled() => false,
        }
    }

    pub fn trigger_impulse(&self, impulse: ImpulseDefinition) -> Result<usize> {
        self.pulse.field.dispatch_impulse(Some(self.pulse), impulse)
    }

    pub fn write_keyed_store(&self, key: &str, value: Value) {
        self.pulse.field.write_keyed_store(key, value);
    }

    pub fn read_keyed_store<T: PortValue>(&self, key: &str) -> Option<T> {
        self.pulse.field.read_keyed_store(key)
    }

    /// Last value received for an external parameter.
    pub fn parameter(&self, name: &str) -> Option<Value> {
        self.pulse.field.parameter(name)
    }
}
