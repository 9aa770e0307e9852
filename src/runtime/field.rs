use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::FieldConfig;
use crate::error::{GraphError, Result};
use crate::runtime::blueprint::{Blueprint, NodeIndex, PortRef};
use crate::runtime::cancel::CancelToken;
use crate::runtime::context::{NodeContext, PulseContext};
use crate::runtime::impulse::ImpulseDefinition;
use crate::runtime::node::{ImpulseRole, Node, NodeDescriptor};
use crate::runtime::parameter::ReceivedParameter;
use crate::runtime::pulse::PulseTracker;
use crate::runtime::registry::NodeRegistry;
use crate::runtime::store::StoreArena;
use crate::runtime::validation;
use crate::runtime::value::{PortValue, Value};

/// A loaded graph and everything that outlives a single pulse: node
/// instances, global stores, the keyed store and the parameter cache.
///
/// Pulses run as tokio tasks and may overlap. Store cells are individually
/// synchronised and `replace` is atomic, but a node that reads a cell,
/// suspends and writes it back can interleave with another pulse.
#[derive(Clone)]
pub struct Field {
    inner: Arc<FieldInner>,
}

struct FieldInner {
    id: String,
    name: String,
    node_ids: Vec<String>,
    index_by_id: HashMap<String, NodeIndex>,
    nodes: Vec<Box<dyn Node>>,
    value_nodes: Vec<bool>,
    /// Input port -> the output port feeding it.
    sources: HashMap<PortRef, PortRef>,
    /// Flow slot -> the node it triggers.
    flow_targets: HashMap<PortRef, NodeIndex>,
    update_order: Vec<NodeIndex>,
    reactive_nodes: Vec<NodeIndex>,
    /// Flow-node output -> the reactive inputs it feeds. These inputs are
    /// checked when the output is written, not on tick.
    pushed_inputs: HashMap<PortRef, Vec<PortRef>>,
    receivers: HashMap<String, Vec<NodeIndex>>,
    listeners: Vec<NodeIndex>,
    starters: Vec<NodeIndex>,
    globals: StoreArena,
    keyed: DashMap<String, Value>,
    parameters: DashMap<String, Value>,
    /// Last observed value of each reactive input.
    snapshots: DashMap<PortRef, Value>,
    cancel: CancelToken,
    pulses: PulseTracker,
    config: FieldConfig,
}

impl Field {
    pub fn load(blueprint: &Blueprint, registry: &NodeRegistry, config: FieldConfig) -> Result<Field> {
        let mut nodes = Vec::with_capacity(blueprint.nodes.len());
        for bp_node in &blueprint.nodes {
            nodes.push(registry.prepare(&bp_node.kind, bp_node.params.clone())?);
        }

        let descriptors: Vec<&NodeDescriptor> = nodes.iter().map(|n| n.descriptor()).collect();
        validation::validate(blueprint, &descriptors)?;

        let count = descriptors.len();
        let value_nodes = descriptors.iter().map(|d| d.is_value_node()).collect();

        let mut update_order: Vec<NodeIndex> = (0..count)
            .filter(|&i| descriptors[i].update.is_some())
            .collect();
        update_order.sort_by_key(|&i| (descriptors[i].update.map(|h| h.offset).unwrap_or_default(), i));

        let reactive_nodes = (0..count)
            .filter(|&i| descriptors[i].reactive_inputs().next().is_some())
            .collect();

        let mut pushed_inputs: HashMap<PortRef, Vec<PortRef>> = HashMap::new();
        for link in &blueprint.links {
            let reactive = descriptors[link.target.node].inputs[link.target.port].reactive;
            if reactive && !descriptors[link.source.node].is_value_node() {
                pushed_inputs.entry(link.source).or_default().push(link.target);
            }
        }

        let mut receivers: HashMap<String, Vec<NodeIndex>> = HashMap::new();
        for (i, descriptor) in descriptors.iter().enumerate() {
            if let Some(binding) = &descriptor.impulse {
                if binding.role == ImpulseRole::Receive {
                    receivers.entry(binding.name.clone()).or_default().push(i);
                }
            }
        }

        let listeners = (0..count)
            .filter(|&i| descriptors[i].parameter_listener)
            .collect();
        let starters = (0..count).filter(|&i| descriptors[i].on_start).collect();

        let node_ids: Vec<String> = blueprint.nodes.iter().map(|n| n.id.clone()).collect();
        let index_by_id = node_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        info!(graph = %blueprint.id, nodes = count, links = blueprint.links.len(), flows = blueprint.flows.len(), "Field loaded");

        Ok(Field {
            inner: Arc::new(FieldInner {
                id: blueprint.id.clone(),
                name: blueprint.name.clone(),
                node_ids,
                index_by_id,
                nodes,
                value_nodes,
                sources: blueprint.links.iter().map(|l| (l.target, l.source)).collect(),
                flow_targets: blueprint.flows.iter().map(|f| (f.source, f.target)).collect(),
                update_order,
                reactive_nodes,
                pushed_inputs,
                receivers,
                listeners,
                starters,
                globals: StoreArena::default(),
                keyed: DashMap::new(),
                parameters: DashMap::new(),
                snapshots: DashMap::new(),
                cancel: CancelToken::new(),
                pulses: PulseTracker::new(),
                config,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &FieldConfig {
        &self.inner.config
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.inner.index_by_id.get(id).copied()
    }

    pub fn node_id(&self, index: NodeIndex) -> &str {
        self.inner.node_ids.get(index).map(String::as_str).unwrap_or("?")
    }

    pub(crate) fn is_value_node(&self, index: NodeIndex) -> bool {
        self.inner.value_nodes.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn globals(&self) -> &StoreArena {
        &self.inner.globals
    }

    /// A fresh pulse with empty memory, cancelled on shutdown.
    pub fn new_pulse(&self) -> PulseContext {
        PulseContext::new(self.clone(), self.inner.cancel.child())
    }

    /// Runs one pulse starting at `node_id` and waits for its continuations.
    /// Flow calls made along the way keep running; see [`Field::wait_idle`].
    pub async fn trigger(&self, node_id: &str) -> Result<()> {
        let index = self
            .node_index(node_id)
            .ok_or_else(|| GraphError::UnknownNode(node_id.to_string()))?;
        let pulse = self.new_pulse();
        let span = info_span!("pulse", id = %pulse.id(), root = %node_id);
        self.run_root(&pulse, index).instrument(span).await
    }

    /// Fires every start node. Returns how many pulses were started.
    pub fn start(&self) -> usize {
        for &index in &self.inner.starters {
            self.spawn_pulse(self.new_pulse(), index);
        }
        info!(graph = %self.inner.id, started = self.inner.starters.len(), "Field started");
        self.inner.starters.len()
    }

    /// One tick: update hooks in offset order, then reactive inputs.
    /// Returns how many pulses were started.
    pub async fn update(&self) -> usize {
        let mut started = 0;

        for &index in &self.inner.update_order {
            let pulse = self.new_pulse();
            let fire = {
                let ctx = NodeContext::new(&pulse, index);
                self.inner.nodes[index].on_update(&ctx).await
            };
            match fire {
                Ok(true) => {
                    self.spawn_pulse(pulse, index);
                    started += 1;
                }
                Ok(false) => {}
                Err(e) => error!(node = %self.node_id(index), error = %e, "Update hook failed"),
            }
        }

        started + self.propagate_reactive().await
    }

    /// Ticks at the configured rate until `stop` or the field is shut down.
    pub async fn run(&self, stop: CancelToken) {
        let mut ticker = tokio::time::interval(self.inner.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(graph = %self.inner.id, "Field running");

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = self.inner.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.update().await;
                }
            }
        }
        info!(graph = %self.inner.id, "Field stopped");
    }

    /// Records the parameter, offers it to every listener and re-checks
    /// reactive inputs. Returns how many listeners took it. A listener that
    /// fails is logged and skipped.
    pub async fn receive_parameter(&self, param: ReceivedParameter) -> usize {
        debug!(parameter = %param.name, value = %param.value, "Parameter received");
        self.inner
            .parameters
            .insert(param.name.clone(), param.value.clone());

        let mut matched = 0;
        for &index in &self.inner.listeners {
            let pulse = self.new_pulse();
            let taken = {
                let ctx = NodeContext::new(&pulse, index);
                self.inner.nodes[index].on_parameter_received(&ctx, &param)
            };
            match taken {
                Ok(true) => {
                    self.spawn_pulse(pulse, index);
                    matched += 1;
                }
                Ok(false) => {}
                Err(e) => error!(node = %self.node_id(index), parameter = %param.name, error = %e, "Parameter listener failed"),
            }
        }

        self.propagate_reactive().await;
        matched
    }

    /// Last value received for a parameter.
    pub fn parameter(&self, name: &str) -> Option<Value> {
        self.inner.parameters.get(name).map(|v| v.value().clone())
    }

    /// Broadcasts an impulse from outside any pulse.
    pub fn trigger_impulse(&self, impulse: ImpulseDefinition) -> Result<usize> {
        self.dispatch_impulse(None, impulse)
    }

    pub fn write_keyed_store(&self, key: &str, value: Value) {
        self.inner.keyed.insert(key.to_string(), value);
    }

    /// Returns None when the key is missing or holds another type.
    pub fn read_keyed_store<T: PortValue>(&self, key: &str) -> Option<T> {
        let value = self.inner.keyed.get(key)?.value().clone();
        T::from_value(value).ok()
    }

    pub fn active_pulses(&self) -> usize {
        self.inner.pulses.active()
    }

    /// Resolves once no spawned pulse is running.
    pub async fn wait_idle(&self) {
        self.inner.pulses.wait_idle().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Cancels every pulse, waits for them to unwind and stops the tick loop.
    pub async fn shutdown(&self) {
        info!(graph = %self.inner.id, active = self.active_pulses(), "Field shutting down");
        self.inner.cancel.cancel();
        self.wait_idle().await;
    }

    // --- pulse plumbing ---

    pub(crate) fn dispatch_impulse(&self, parent: Option<&PulseContext>, impulse: ImpulseDefinition) -> Result<usize> {
        let Some(receivers) = self.inner.receivers.get(&impulse.name) else {
            debug!(impulse = %impulse.name, "Impulse has no receivers");
            return Ok(0);
        };

        // All receivers are checked before any of them runs.
        for &index in receivers {
            if let Some(binding) = &self.inner.nodes[index].descriptor().impulse {
                impulse.check_signature(&binding.types)?;
            }
        }

        for &index in receivers {
            let pulse = match parent {
                Some(parent) => parent.detach(),
                None => self.new_pulse(),
            };
            {
                let ctx = NodeContext::new(&pulse, index);
                self.inner.nodes[index].receive_impulse(&ctx, &impulse.values)?;
            }
            self.spawn_pulse(pulse, index);
        }
        debug!(impulse = %impulse.name, receivers = receivers.len(), "Impulse dispatched");
        Ok(receivers.len())
    }

    pub(crate) fn spawn_flow(&self, pulse: &PulseContext, node: NodeIndex, slot: usize) {
        if pulse.is_cancelled() {
            return;
        }
        if let Some(&target) = self.inner.flow_targets.get(&PortRef { node, port: slot }) {
            self.spawn_pulse(pulse.fork(), target);
        }
    }

    pub(crate) fn continue_flow<'a>(
        &'a self,
        pulse: &'a PulseContext,
        node: NodeIndex,
        slot: usize,
    ) -> BoxFuture<'a, Result<()>> {
        match self.inner.flow_targets.get(&PortRef { node, port: slot }) {
            Some(&target) => self.run_node(pulse, target),
            None => futures::future::ready(Ok(())).boxed(),
        }
    }

    pub(crate) fn resolve_input<'a>(
        &'a self,
        pulse: &'a PulseContext,
        node: NodeIndex,
        port: usize,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            let input_ty = self.inner.nodes[node]
                .descriptor()
                .inputs
                .get(port)
                .map(|p| p.ty)
                .ok_or_else(|| GraphError::UnknownPort {
                    node: self.node_id(node).to_string(),
                    port: format!("#{}", port),
                    direction: "input",
                })?;

            let Some(&source) = self.inner.sources.get(&PortRef { node, port }) else {
                return Ok(input_ty.default_value());
            };

            if self.is_value_node(source.node) && !pulse.is_evaluated(source.node) {
                let ctx = NodeContext::new(pulse, source.node);
                self.inner.nodes[source.node].process(&ctx).await?;
                pulse.mark_evaluated(source.node);
            }

            let output_ty = self.inner.nodes[source.node].descriptor().outputs[source.port].ty;
            Ok(pulse
                .output(source.node, source.port)
                .unwrap_or_else(|| output_ty.default_value()))
        }
        .boxed()
    }

    /// Called after a flow node wrote `port`. Reactive inputs fed by that
    /// output are compared in the writing pulse; each changed one starts a
    /// fork of it at the reactive node.
    pub(crate) fn output_written(&self, pulse: &PulseContext, node: NodeIndex, port: usize, value: &Value) {
        let Some(targets) = self.inner.pushed_inputs.get(&PortRef { node, port }) else {
            return;
        };
        for &target in targets {
            if self.observe(target, value.clone()) && !pulse.is_cancelled() {
                debug!(node = %self.node_id(target.node), "Reactive input changed");
                self.spawn_pulse(pulse.fork(), target.node);
            }
        }
    }

    /// Stores the latest value of a reactive input. Returns whether it
    /// differs from the previous one; the first observation counts as a
    /// change.
    fn observe(&self, input: PortRef, value: Value) -> bool {
        match self.inner.snapshots.insert(input, value.clone()) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    /// Whether `input` is fed by a flow node, so only writes reach it.
    fn is_pushed(&self, input: PortRef) -> bool {
        self.inner
            .sources
            .get(&input)
            .is_some_and(|source| !self.is_value_node(source.node))
    }

    /// Samples the tick-observable reactive inputs of every node and starts
    /// a pulse where any of them changed.
    async fn propagate_reactive(&self) -> usize {
        let mut started = 0;

        'nodes: for &index in &self.inner.reactive_nodes {
            let pulse = self.new_pulse();
            let mut changed = false;
            for port in self.inner.nodes[index].descriptor().reactive_inputs() {
                let input = PortRef { node: index, port };
                if self.is_pushed(input) {
                    continue;
                }
                match self.resolve_input(&pulse, index, port).await {
                    Ok(value) => changed |= self.observe(input, value),
                    Err(e) => {
                        error!(node = %self.node_id(index), error = %e, "Reactive input failed");
                        continue 'nodes;
                    }
                }
            }
            if changed {
                debug!(node = %self.node_id(index), "Reactive input changed");
                self.spawn_pulse(pulse, index);
                started += 1;
            }
        }
        started
    }

    fn spawn_pulse(&self, pulse: PulseContext, index: NodeIndex) {
        let field = self.clone();
        let span = info_span!("pulse", id = %pulse.id(), root = %self.node_id(index));
        self.inner.pulses.spawn(
            async move {
                if let Err(e) = field.run_root(&pulse, index).await {
                    error!(error = %e, "Pulse failed");
                }
            }
            .instrument(span),
        );
    }

    async fn run_root(&self, pulse: &PulseContext, index: NodeIndex) -> Result<()> {
        let Some(limit) = self.inner.config.pulse_timeout() else {
            return self.run_node(pulse, index).await;
        };
        match timeout(limit, self.run_node(pulse, index)).await {
            Ok(result) => result,
            Err(_) => {
                // Stop anything the pulse forked as well.
                pulse.cancel_token().cancel();
                warn!(node = %self.node_id(index), "Pulse timed out after {:?}", limit);
                Err(GraphError::Timeout(limit.as_millis() as u64))
            }
        }
    }

    fn run_node<'a>(&'a self, pulse: &'a PulseContext, index: NodeIndex) -> BoxFuture<'a, Result<()>> {
        async move {
            if pulse.is_cancelled() {
                debug!(node = %self.node_id(index), "Pulse cancelled, skipping node");
                return Ok(());
            }
            let node = &self.inner.nodes[index];
            let ctx = NodeContext::new(pulse, index);
            if !node.should_process(&ctx).await? {
                return Ok(());
            }
            debug!(node = %self.node_id(index), "Processing");
            node.process(&ctx).await
        }
        .boxed()
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.inner.id)
            .field("nodes", &self.inner.nodes.len())
            .field("active_pulses", &self.inner.pulses.active())
            .finish()
    }
}
