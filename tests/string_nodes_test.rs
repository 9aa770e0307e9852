mod common;

use common::{Recorded, load};
use pulsegraph::Value;
use pulsegraph::dsl::builder::GraphBuilder;
use serde_json::json;

fn constant(builder: GraphBuilder, id: &str, ty: &str, value: serde_json::Value) -> GraphBuilder {
    builder.with(id, "constant").param("type", ty).param("value", value).build()
}

#[tokio::test]
async fn test_to_string_writes_null_for_missing_value() {
    let graph = GraphBuilder::new("string-null")
        .node("text", "to_string")
        .node("rec", "record")
        .link("text.text", "rec.value")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.trigger("rec").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::from("null")]);
}

#[tokio::test]
async fn test_string_format_substitutes_arguments() {
    let builder = GraphBuilder::new("string-format");
    let builder = constant(builder, "fmt", "string", json!("{0} has {1} apples {{ok}}"));
    let builder = constant(builder, "who", "string", json!("Bob"));
    let builder = constant(builder, "count", "int", json!(3));
    let graph = builder
        .with("format", "string_format").param("args", 2).build()
        .node("rec", "record")
        .link("fmt.value", "format.format")
        .link("who.value", "format.value1")
        .link("count.value", "format.value2")
        .link("format.text", "rec.value")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.trigger("rec").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::from("Bob has 3 apples {ok}")]);
}

#[tokio::test]
async fn test_string_format_reports_invalid_format() {
    let builder = constant(GraphBuilder::new("string-format-bad"), "fmt", "string", json!("{2}"));
    let graph = builder
        .node("format", "string_format")
        .node("rec", "record")
        .link("fmt.value", "format.format")
        .link("format.text", "rec.value")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.trigger("rec").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::from("INVALID FORMAT")]);
}

#[tokio::test]
async fn test_regex_match() {
    let builder = GraphBuilder::new("regex-match");
    let builder = constant(builder, "text", "string", json!("hello world"));
    let builder = constant(builder, "good", "string", json!("w.rld"));
    let builder = constant(builder, "broken", "string", json!("(unclosed"));
    let graph = builder
        .node("matches", "regex_match")
        .node("invalid", "regex_match")
        .node("rec", "record")
        .node("rec_invalid", "record")
        .link("text.value", "matches.text")
        .link("good.value", "matches.pattern")
        .link("text.value", "invalid.text")
        .link("broken.value", "invalid.pattern")
        .link("matches.matched", "rec.value")
        .link("invalid.matched", "rec_invalid.value")
        .flow("rec.next", "rec_invalid")
        .build();

    let log = Recorded::default();
    let field = load(graph, &log);

    field.trigger("rec").await.expect("Pulse failed");
    assert_eq!(log.values("rec"), vec![Value::Bool(true)]);
    assert_eq!(log.values("rec_invalid"), vec![Value::Bool(false)]);
}

fn capture_graph(text: &str, pattern: &str) -> GraphBuilder {
    let builder = GraphBuilder::new("regex-capture");
    let builder = constant(builder, "text", "string", json!(text));
    let builder = constant(builder, "pattern", "string", json!(pattern));
    builder
        .with("capture", "regex_capture_value").param("type", "int").build()
        .node("ok", "record")
        .node("fail", "record")
        .link("text.value", "capture.text")
        .link("pattern.value", "capture.pattern")
        .link("capture.value", "ok.value")
        .flow("capture.on_success", "ok")
        .flow("capture.on_fail", "fail")
}

#[tokio::test]
async fn test_regex_capture_value_parses_group() {
    let log = Recorded::default();
    let field = load(capture_graph("level 42", r"level (\d+)").build(), &log);

    field.trigger("capture").await.expect("Pulse failed");
    assert_eq!(log.values("ok"), vec![Value::Int(42)]);
    assert_eq!(log.count("fail"), 0);
}

#[tokio::test]
async fn test_regex_capture_value_routes_failures() {
    for (text, pattern) in [("level x", r"level (\w+)"), ("nothing", r"level (\d+)"), ("level 1", "(")] {
        let log = Recorded::default();
        let field = load(capture_graph(text, pattern).build(), &log);

        field.trigger("capture").await.expect("Pulse failed");
        assert_eq!(log.count("ok"), 0, "{} / {}", text, pattern);
        assert_eq!(log.count("fail"), 1, "{} / {}", text, pattern);
    }
}

fn command_graph(text: &str) -> GraphBuilder {
    let builder = GraphBuilder::new("parse-command");
    let builder = constant(builder, "text", "string", json!(text));
    let builder = constant(builder, "command", "string", json!("!roll"));
    builder
        .with("parse", "parse_command").param("types", json!(["int", "int"])).build()
        .node("arg1", "record")
        .node("arg2", "record")
        .node("fail", "record")
        .link("text.value", "parse.text")
        .link("command.value", "parse.command")
        .link("parse.arg1", "arg1.value")
        .link("parse.arg2", "arg2.value")
        .link("parse.arg1", "fail.value")
        .flow("parse.on_success", "arg1")
        .flow("arg1.next", "arg2")
        .flow("parse.on_fail", "fail")
}

#[tokio::test]
async fn test_parse_command_success() {
    let log = Recorded::default();
    let field = load(command_graph("!roll 5 10").build(), &log);

    field.trigger("parse").await.expect("Pulse failed");
    assert_eq!(log.values("arg1"), vec![Value::Int(5)]);
    assert_eq!(log.values("arg2"), vec![Value::Int(10)]);
    assert_eq!(log.count("fail"), 0);
}

#[tokio::test]
async fn test_parse_command_failure_writes_no_outputs() {
    let log = Recorded::default();
    let field = load(command_graph("!roll abc 10").build(), &log);

    field.trigger("parse").await.expect("Pulse failed");
    assert_eq!(log.count("arg1"), 0);
    // The unwritten output still reads as the int default
    assert_eq!(log.values("fail"), vec![Value::Int(0)]);
}
