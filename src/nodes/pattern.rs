use async_trait::async_trait;
use regex::Regex;
use serde_json::Value as Json;
use tracing::warn;

use crate::error::Result;
use crate::runtime::context::NodeContext;
use crate::runtime::node::{
    FlowContinuation, Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, ValueOutput, param_type,
};
use crate::runtime::store::GlobalStore;
use crate::runtime::value::{Value, ValueType};

type RegexCache = GlobalStore<Option<(String, Regex)>>;

/// Compiles `pattern`, reusing the last compiled regex when the pattern has
/// not changed. Invalid patterns are logged and yield None.
fn compile_cached(cache: &RegexCache, ctx: &NodeContext<'_>, pattern: &str) -> Option<Regex> {
    if let Some((cached, regex)) = cache.read(ctx) {
        if cached == pattern {
            return Some(regex);
        }
    }
    match Regex::new(pattern) {
        Ok(regex) => {
            cache.write(ctx, Some((pattern.to_string(), regex.clone())));
            Some(regex)
        }
        Err(e) => {
            warn!(node = %ctx.node_id(), error = %e, "Invalid regex");
            None
        }
    }
}

// --- REGEX MATCH NODE ---

#[derive(Debug)]
pub struct RegexMatchNode {
    descriptor: NodeDescriptor,
    text: ValueInput<String>,
    pattern: ValueInput<String>,
    matched: ValueOutput<bool>,
    cache: RegexCache,
}

pub struct RegexMatchDefinition;

impl NodeDefinition for RegexMatchDefinition {
    fn name(&self) -> &str { "regex_match" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        let text = ports.input("text");
        let pattern = ports.input("pattern");
        let matched = ports.output("matched");
        Ok(Box::new(RegexMatchNode {
            descriptor: ports.finish(),
            text,
            pattern,
            matched,
            cache: GlobalStore::new(0),
        }))
    }
}

#[async_trait]
impl Node for RegexMatchNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let text = ctx.read(&self.text).await?;
        let pattern = ctx.read(&self.pattern).await?;
        let matched = compile_cached(&self.cache, ctx, &pattern).is_some_and(|re| re.is_match(&text));
        ctx.write(&self.matched, matched);
        Ok(())
    }
}

// --- REGEX CAPTURE VALUE NODE ---

/// Parses one capture group into a typed value. A bad pattern, no match, a
/// missing group or a failed parse all route to `on_fail`.
#[derive(Debug)]
pub struct RegexCaptureValueNode {
    descriptor: NodeDescriptor,
    ty: ValueType,
    group: usize,
    text: ValueInput<String>,
    pattern: ValueInput<String>,
    value: ValueOutput<Value>,
    on_success: FlowContinuation,
    on_fail: FlowContinuation,
    cache: RegexCache,
}

pub struct RegexCaptureValueDefinition;

impl NodeDefinition for RegexCaptureValueDefinition {
    fn name(&self) -> &str { "regex_capture_value" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_type(self.name(), params, "type").map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let ty = param_type(self.name(), &params, "type")?;
        let group = params.get("group").and_then(|v| v.as_u64()).unwrap_or(1) as usize;

        let mut ports = Ports::new();
        ports.flow_input();
        let text = ports.input("text");
        let pattern = ports.input("pattern");
        let value = ports.output_of("value", ty);
        let on_success = ports.continuation("on_success");
        let on_fail = ports.continuation("on_fail");
        Ok(Box::new(RegexCaptureValueNode {
            descriptor: ports.finish(),
            ty,
            group,
            text,
            pattern,
            value,
            on_success,
            on_fail,
            cache: GlobalStore::new(0),
        }))
    }
}

impl RegexCaptureValueNode {
    fn capture(&self, regex: &Regex, text: &str) -> Option<Value> {
        let captures = regex.captures(text)?;
        let group = captures.get(self.group)?;
        Value::parse(self.ty, group.as_str())
    }
}

#[async_trait]
impl Node for RegexCaptureValueNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let text = ctx.read(&self.text).await?;
        let pattern = ctx.read(&self.pattern).await?;

        let captured = compile_cached(&self.cache, ctx, &pattern).and_then(|re| self.capture(&re, &text));
        match captured {
            Some(value) => {
                ctx.write(&self.value, value);
                ctx.continue_with(&self.on_success).await
            }
            None => ctx.continue_with(&self.on_fail).await,
        }
    }
}
