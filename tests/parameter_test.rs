mod common;

use async_trait::async_trait;
use common::{Recorded, load, load_with, send};
use pulsegraph::compiler::core::Compiler;
use pulsegraph::dsl::builder::GraphBuilder;
use pulsegraph::error::Result;
use pulsegraph::runtime::{Field, Node, NodeContext, NodeDefinition, NodeDescriptor, Ports};
use pulsegraph::{FieldConfig, GraphError, ReceivedParameter, Value};
use serde_json::Value as Json;

/// Listener whose parameter hook always fails.
#[derive(Debug)]
struct FaultyListener {
    descriptor: NodeDescriptor,
}

struct FaultyListenerDefinition;

impl NodeDefinition for FaultyListenerDefinition {
    fn name(&self) -> &str { "faulty_listener" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.parameter_listener();
        Ok(Box::new(FaultyListener { descriptor: ports.finish() }))
    }
}

#[async_trait]
impl Node for FaultyListener {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn on_parameter_received(&self, _ctx: &NodeContext<'_>, param: &ReceivedParameter) -> Result<bool> {
        Err(GraphError::invalid_params("faulty_listener", format!("cannot take {}", param.name)))
    }

    async fn process(&self, _ctx: &NodeContext<'_>) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_on_parameter_received_matches_name_and_type() {
    let graph = GraphBuilder::new("param-named")
        .with("emote", "on_parameter_received").param("name", "VRCEmote").param("type", "int").build()
        .node("rec", "record")
        .link("emote.value", "rec.value")
        .flow("emote.next", "rec")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    assert_eq!(send(&field, "VRCEmote", 3).await, 1);
    assert_eq!(send(&field, "Other", 3).await, 0);
    assert_eq!(send(&field, "VRCEmote", "three").await, 0);
    field.wait_idle().await;

    assert_eq!(log.values("rec"), vec![Value::Int(3)]);
    assert_eq!(field.parameter("VRCEmote"), Some(Value::from("three")));
}

#[tokio::test]
async fn test_listeners_do_not_see_each_others_parameters() {
    let graph = GraphBuilder::new("param-isolated")
        .with("a", "on_parameter_received").param("name", "A").param("type", "bool").build()
        .with("b", "on_parameter_received").param("name", "B").param("type", "bool").build()
        .node("rec_a", "record")
        .node("rec_b", "record")
        .link("a.value", "rec_a.value")
        .link("b.value", "rec_b.value")
        .flow("a.next", "rec_a")
        .flow("b.next", "rec_b")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    send(&field, "A", true).await;
    send(&field, "A", false).await;
    field.wait_idle().await;

    assert_eq!(log.values("rec_a"), vec![Value::Bool(true), Value::Bool(false)]);
    assert_eq!(log.count("rec_b"), 0);
}

#[tokio::test]
async fn test_registered_parameter_resolves_through_config() {
    let graph = GraphBuilder::new("param-registered")
        .with("mute", "registered_parameter_received").param("lookup", "mute").param("type", "bool").build()
        .node("rec", "record")
        .link("mute.value", "rec.value")
        .flow("mute.next", "rec")
        .build();

    let log = Recorded::default();
    let config = FieldConfig::default().register_parameter("mute", "MuteSelf");
    let field = load_with(graph, &log, config);

    assert_eq!(send(&field, "mute", true).await, 0);
    assert_eq!(send(&field, "MuteSelf", true).await, 1);
    field.wait_idle().await;

    assert_eq!(log.values("rec"), vec![Value::Bool(true)]);
}

#[tokio::test]
async fn test_unregistered_lookup_never_matches() {
    let graph = GraphBuilder::new("param-unregistered")
        .with("mute", "registered_parameter_received").param("lookup", "mute").param("type", "bool").build()
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    assert_eq!(send(&field, "MuteSelf", true).await, 0);
}

#[tokio::test]
async fn test_parameter_source_reads_last_value() {
    let graph = GraphBuilder::new("param-source")
        .with("angle", "parameter_source").param("name", "Angle").param("type", "float").build()
        .node("rec", "record")
        .link("angle.value", "rec.value")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.trigger("rec").await.expect("Pulse failed");
    send(&field, "Angle", 0.5).await;
    field.trigger("rec").await.expect("Pulse failed");
    // Values of another type are ignored
    send(&field, "Angle", "wide").await;
    field.trigger("rec").await.expect("Pulse failed");

    assert_eq!(
        log.values("rec"),
        vec![Value::Float(0.0), Value::Float(0.5), Value::Float(0.0)]
    );
}

#[tokio::test]
async fn test_failing_listener_does_not_block_others() {
    // 1. Define Graph: the failing listener comes first
    let graph = GraphBuilder::new("param-faulty")
        .node("faulty", "faulty_listener")
        .with("flag", "on_parameter_received").param("name", "Flag").param("type", "bool").build()
        .with("source", "parameter_source").param("name", "Flag").param("type", "bool").build()
        .node("edge", "fire_on_true")
        .node("rec", "record")
        .node("rec_edge", "record")
        .link("flag.value", "rec.value")
        .link("source.value", "edge.input")
        .flow("flag.next", "rec")
        .flow("edge.next", "rec_edge")
        .build();

    // 2. Load
    let log = Recorded::default();
    let mut registry = common::registry(&log);
    registry.register(Box::new(FaultyListenerDefinition));
    let blueprint = Compiler::new(&registry).compile(graph).expect("Compilation failed");
    let field = Field::load(&blueprint, &registry, FieldConfig::default()).expect("Field load failed");

    // 3. Dispatch: later listeners and the reactive pass still run
    assert_eq!(send(&field, "Flag", true).await, 1);
    field.wait_idle().await;

    assert_eq!(log.values("rec"), vec![Value::Bool(true)]);
    assert_eq!(log.count("rec_edge"), 1);
}
