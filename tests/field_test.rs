mod common;

use common::{Recorded, load, load_with};
use pulsegraph::compiler::core::Compiler;
use pulsegraph::dsl::builder::GraphBuilder;
use pulsegraph::runtime::Field;
use pulsegraph::{FieldConfig, GraphError, Value};
use std::time::Duration;

#[tokio::test]
async fn test_continuation_runs_in_the_same_pulse() {
    // 1. Define Graph
    let graph = GraphBuilder::new("field-continuation")
        .node("start", "on_start")
        .with("seven", "constant").param("type", "int").param("value", 7).build()
        .node("rec", "record")
        .link("seven.value", "rec.value")
        .flow("start.next", "rec")
        .build();

    // 2. Load
    let log = Recorded::default();
    let field = load(graph, &log);

    // 3. Trigger and verify without waiting: continuations are awaited inline
    field.trigger("start").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::Int(7)]);
}

#[tokio::test]
async fn test_start_fires_every_start_node() {
    let graph = GraphBuilder::new("field-start")
        .node("a", "on_start")
        .node("b", "on_start")
        .node("rec_a", "record")
        .node("rec_b", "record")
        .flow("a.next", "rec_a")
        .flow("b.next", "rec_b")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    assert_eq!(field.start(), 2);
    field.wait_idle().await;
    assert_eq!(log.count("rec_a"), 1);
    assert_eq!(log.count("rec_b"), 1);
    assert_eq!(field.active_pulses(), 0);
}

#[tokio::test]
async fn test_value_nodes_evaluate_on_read() {
    let graph = GraphBuilder::new("field-values")
        .with("three", "constant").param("type", "int").param("value", 3).build()
        .node("text", "to_string")
        .node("rec", "record")
        .link("three.value", "text.value")
        .link("text.text", "rec.value")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.trigger("rec").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::from("3")]);
}

#[tokio::test]
async fn test_unlinked_input_reads_type_default() {
    let graph = GraphBuilder::new("field-default").node("rec", "record").build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.trigger("rec").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::Null]);
}

#[tokio::test]
async fn test_keyed_store_shared_between_nodes_and_host() {
    let graph = GraphBuilder::new("field-keyed")
        .node("start", "on_start")
        .with("key", "constant").param("type", "string").param("value", "score").build()
        .with("five", "constant").param("type", "int").param("value", 5).build()
        .node("write", "write_keyed_store")
        .with("read", "read_keyed_store").param("type", "int").build()
        .node("rec", "record")
        .link("key.value", "write.key")
        .link("five.value", "write.value")
        .link("key.value", "read.key")
        .link("read.value", "rec.value")
        .flow("start.next", "write")
        .flow("write.next", "rec")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.trigger("start").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::Int(5)]);
    assert_eq!(field.read_keyed_store::<i64>("score"), Some(5));
    assert_eq!(field.read_keyed_store::<String>("score"), None);

    // Host writes are visible to the next pulse
    field.write_keyed_store("score", Value::Int(9));
    field.trigger("rec").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::Int(5), Value::Int(9)]);
}

#[tokio::test(start_paused = true)]
async fn test_update_hooks_run_in_offset_order() {
    let graph = GraphBuilder::new("field-order")
        .with("hundred", "constant").param("type", "int").param("value", 100).build()
        .with("late", "fire_on_interval").param("offset", 5).build()
        .with("early", "fire_on_interval").param("offset", -1).build()
        .node("rec_late", "record")
        .node("rec_early", "record")
        .link("hundred.value", "late.delay")
        .link("hundred.value", "early.delay")
        .flow("late.next", "rec_late")
        .flow("early.next", "rec_early")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    assert_eq!(field.update().await, 2);
    field.wait_idle().await;
    assert_eq!(log.order(), vec!["rec_early".to_string(), "rec_late".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_delays() {
    let graph = GraphBuilder::new("field-shutdown")
        .node("start", "on_start")
        .with("second", "constant").param("type", "int").param("value", 1000).build()
        .node("wait", "delay")
        .node("rec", "record")
        .link("second.value", "wait.delay")
        .flow("start.next", "wait")
        .flow("wait.next", "rec")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(field.active_pulses(), 1);

    field.shutdown().await;
    assert!(field.is_shut_down());
    assert_eq!(field.active_pulses(), 0);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(log.count("rec"), 0);

    // Pulses started after shutdown are cancelled from the outset
    field.trigger("start").await.expect("Pulse failed");
    assert_eq!(log.count("rec"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pulse_timeout_aborts_root_pulse() {
    let graph = GraphBuilder::new("field-timeout")
        .node("start", "on_start")
        .with("second", "constant").param("type", "int").param("value", 1000).build()
        .node("wait", "delay")
        .node("rec", "record")
        .link("second.value", "wait.delay")
        .flow("start.next", "wait")
        .flow("wait.next", "rec")
        .build();

    let log = Recorded::default();
    let config = FieldConfig {
        pulse_timeout_ms: Some(50),
        ..FieldConfig::default()
    };
    let field = load_with(graph, &log, config);

    let err = field.trigger("start").await.expect_err("Pulse should time out");
    assert!(matches!(err, GraphError::Timeout(50)));
    assert_eq!(log.count("rec"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_ticks_until_stopped() {
    let graph = GraphBuilder::new("field-run")
        .with("period", "constant").param("type", "int").param("value", 100).build()
        .node("every", "fire_on_interval")
        .node("rec", "record")
        .link("period.value", "every.delay")
        .flow("every.next", "rec")
        .build();

    let log = Recorded::default();
    let config = FieldConfig {
        tick_rate_hz: 100.0,
        ..FieldConfig::default()
    };
    let field = load_with(graph, &log, config);

    let stop = pulsegraph::runtime::CancelToken::new();
    let runner = {
        let field = field.clone();
        let stop = stop.clone();
        tokio::spawn(async move { field.run(stop).await })
    };

    tokio::time::sleep(Duration::from_millis(350)).await;
    stop.cancel();
    runner.await.expect("Tick loop panicked");
    field.wait_idle().await;

    // Fires at 0, 100, 200 and 300 ms
    assert_eq!(log.count("rec"), 4);
}

#[test]
fn test_load_rejects_type_mismatch() {
    let graph = GraphBuilder::new("bad-types")
        .with("flag", "constant").param("type", "bool").param("value", true).build()
        .node("wait", "delay")
        .link("flag.value", "wait.delay")
        .build();

    let registry = common::registry(&Recorded::default());
    let blueprint = Compiler::new(&registry).compile(graph).expect("Compilation failed");
    let err = Field::load(&blueprint, &registry, FieldConfig::default()).expect_err("Load should fail");
    assert!(matches!(err, GraphError::LinkTypeMismatch { .. }));
}

#[test]
fn test_load_rejects_flow_into_value_node() {
    let graph = GraphBuilder::new("bad-flow")
        .node("start", "on_start")
        .node("text", "to_string")
        .flow("start.next", "text")
        .build();

    let registry = common::registry(&Recorded::default());
    let blueprint = Compiler::new(&registry).compile(graph).expect("Compilation failed");
    let err = Field::load(&blueprint, &registry, FieldConfig::default()).expect_err("Load should fail");
    assert!(matches!(err, GraphError::NotFlowTarget(id) if id == "text"));
}

#[test]
fn test_load_rejects_value_cycle() {
    let graph = GraphBuilder::new("bad-cycle")
        .node("text", "to_string")
        .node("format", "string_format")
        .link("text.text", "format.format")
        .link("format.text", "text.value")
        .build();

    let registry = common::registry(&Recorded::default());
    let blueprint = Compiler::new(&registry).compile(graph).expect("Compilation failed");
    let err = Field::load(&blueprint, &registry, FieldConfig::default()).expect_err("Load should fail");
    assert!(matches!(err, GraphError::Cycle(_)));
}

#[test]
fn test_load_rejects_input_linked_twice() {
    let graph = GraphBuilder::new("bad-fan-in")
        .with("a", "constant").param("type", "int").param("value", 1).build()
        .with("b", "constant").param("type", "int").param("value", 2).build()
        .node("rec", "record")
        .link("a.value", "rec.value")
        .link("b.value", "rec.value")
        .build();

    let registry = common::registry(&Recorded::default());
    let blueprint = Compiler::new(&registry).compile(graph).expect("Compilation failed");
    let err = Field::load(&blueprint, &registry, FieldConfig::default()).expect_err("Load should fail");
    assert!(matches!(err, GraphError::InputLinkedTwice(port) if port == "rec.value"));
}

#[test]
fn test_load_rejects_flow_output_into_tick_input() {
    let graph = GraphBuilder::new("bad-tick-input")
        .with("held", "on_parameter_received").param("name", "Held").param("type", "bool").build()
        .node("repeat", "fire_while_true")
        .link("held.value", "repeat.condition")
        .build();

    let registry = common::registry(&Recorded::default());
    let blueprint = Compiler::new(&registry).compile(graph).expect("Compilation failed");
    let err = Field::load(&blueprint, &registry, FieldConfig::default()).expect_err("Load should fail");
    assert!(matches!(err, GraphError::TickInputFromFlow(port) if port == "repeat.condition"));
}
