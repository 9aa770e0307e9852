use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::Result;
use crate::runtime::context::NodeContext;
use crate::runtime::node::{Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, ValueOutput};
use crate::runtime::value::{Value, ValueType};

pub const INVALID_FORMAT: &str = "INVALID FORMAT";

/// Substitutes `{n}` with the n-th argument. `{{` and `}}` are literal
/// braces. Returns None for unbalanced braces, a non-numeric placeholder or
/// an index past the end of `args`.
pub fn format_template(template: &str, args: &[Value]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut index = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        d if d.is_ascii_digit() => index.push(d),
                        _ => return None,
                    }
                }
                let i: usize = index.parse().ok()?;
                out.push_str(&args.get(i)?.to_string());
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

// --- TO STRING NODE ---

#[derive(Debug)]
pub struct ToStringNode {
    descriptor: NodeDescriptor,
    value: ValueInput<Value>,
    text: ValueOutput<String>,
}

pub struct ToStringDefinition;

impl NodeDefinition for ToStringDefinition {
    fn name(&self) -> &str { "to_string" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        let value = ports.input_of("value", ValueType::Any);
        let text = ports.output("text");
        Ok(Box::new(ToStringNode {
            descriptor: ports.finish(),
            value,
            text,
        }))
    }
}

#[async_trait]
impl Node for ToStringNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let value = ctx.read(&self.value).await?;
        ctx.write(&self.text, value.to_string());
        Ok(())
    }
}

// --- STRING FORMAT NODE ---

#[derive(Debug)]
pub struct StringFormatNode {
    descriptor: NodeDescriptor,
    format: ValueInput<String>,
    args: Vec<ValueInput<Value>>,
    text: ValueOutput<String>,
}

pub struct StringFormatDefinition;

impl NodeDefinition for StringFormatDefinition {
    fn name(&self) -> &str { "string_format" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let count = params.get("args").and_then(|v| v.as_u64()).unwrap_or(1) as usize;

        let mut ports = Ports::new();
        let format = ports.input("format");
        let args = (0..count)
            .map(|i| ports.input_of(&format!("value{}", i + 1), ValueType::Any))
            .collect();
        let text = ports.output("text");
        Ok(Box::new(StringFormatNode {
            descriptor: ports.finish(),
            format,
            args,
            text,
        }))
    }
}

#[async_trait]
impl Node for StringFormatNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let format = ctx.read(&self.format).await?;
        let mut args = Vec::with_capacity(self.args.len());
        for input in &self.args {
            args.push(ctx.read(input).await?);
        }
        let text = format_template(&format, &args).unwrap_or_else(|| INVALID_FORMAT.to_string());
        ctx.write(&self.text, text);
        Ok(())
    }
}
