mod common;

use common::{Recorded, load};
use pulsegraph::Value;
use pulsegraph::dsl::builder::GraphBuilder;
use pulsegraph::dsl::Graph;
use serde_json::json;
use std::time::Duration;

fn tween_graph(ty: &str, from: serde_json::Value, to: serde_json::Value, duration: i64) -> Graph {
    GraphBuilder::new("tween")
        .with("from", "constant").param("type", ty).param("value", from).build()
        .with("to", "constant").param("type", ty).param("value", to).build()
        .with("ms", "constant").param("type", "int").param("value", duration).build()
        .with("tween", "tween").param("type", ty).build()
        .node("update", "record")
        .node("finished", "record")
        .link("from.value", "tween.from")
        .link("to.value", "tween.to")
        .link("ms.value", "tween.duration")
        .link("tween.value", "update.value")
        .link("tween.value", "finished.value")
        .flow("tween.on_update", "update")
        .flow("tween.on_finished", "finished")
        .build()
}

fn as_f64(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::as_f64).collect()
}

#[tokio::test(start_paused = true)]
async fn test_float_tween_is_monotonic_and_ends_on_target() {
    let log = Recorded::default();
    let field = load(tween_graph("float", json!(0.0), json!(10.0), 100), &log);

    field.trigger("tween").await.expect("Pulse failed");
    field.wait_idle().await;

    let updates = as_f64(&log.values("update"));
    assert!(updates.len() >= 2, "expected several samples, got {:?}", updates);
    assert!(updates[0] >= 0.0);
    assert!(updates.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {:?}", updates);
    assert_eq!(updates.last().copied(), Some(10.0));

    assert_eq!(log.values("finished"), vec![Value::Float(10.0)]);
}

#[tokio::test(start_paused = true)]
async fn test_int_tween_truncates_samples() {
    let log = Recorded::default();
    let field = load(tween_graph("int", json!(0), json!(10), 100), &log);

    field.trigger("tween").await.expect("Pulse failed");
    field.wait_idle().await;

    let updates = log.values("update");
    assert!(updates.iter().all(|v| matches!(v, Value::Int(0..=10))));
    assert_eq!(updates.last(), Some(&Value::Int(10)));
    assert_eq!(log.values("finished"), vec![Value::Int(10)]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_duration_tween_jumps_to_target() {
    let log = Recorded::default();
    let field = load(tween_graph("float", json!(2.0), json!(4.0), 0), &log);

    field.trigger("tween").await.expect("Pulse failed");
    field.wait_idle().await;

    assert_eq!(log.values("update"), vec![Value::Float(4.0)]);
    assert_eq!(log.count("finished"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_tween_never_finishes() {
    let log = Recorded::default();
    let field = load(tween_graph("float", json!(0.0), json!(10.0), 1000), &log);

    let running = {
        let field = field.clone();
        tokio::spawn(async move { field.trigger("tween").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    field.shutdown().await;
    running.await.expect("Task panicked").expect("Pulse failed");
    field.wait_idle().await;

    let sampled = log.count("update");
    assert!(sampled > 0);
    assert_eq!(log.count("finished"), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(log.count("update"), sampled);
}
