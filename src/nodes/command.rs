use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::Result;
use crate::runtime::context::NodeContext;
use crate::runtime::node::{
    FlowContinuation, Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, ValueOutput, param_types,
};
use crate::runtime::value::{Value, ValueType};

/// Parses `text` as `command arg1 arg2 ...`.
///
/// The command prefix matches case-insensitively. Arguments are split on
/// single spaces into at most `types.len()` parts, so the last argument keeps
/// any remaining spaces. Returns None unless every argument parses.
pub fn parse_command(text: &str, command: &str, types: &[ValueType]) -> Option<Vec<Value>> {
    let prefix = text.get(..command.len())?;
    if !prefix.eq_ignore_ascii_case(command) {
        return None;
    }

    let rest = text[command.len()..].trim_start_matches(' ');
    if types.is_empty() {
        return Some(Vec::new());
    }

    let parts: Vec<&str> = rest.splitn(types.len(), ' ').collect();
    if parts.len() != types.len() {
        return None;
    }

    types
        .iter()
        .zip(parts)
        .map(|(ty, part)| Value::parse(*ty, part))
        .collect()
}

#[derive(Debug)]
pub struct ParseCommandNode {
    descriptor: NodeDescriptor,
    types: Vec<ValueType>,
    text: ValueInput<String>,
    command: ValueInput<String>,
    args: Vec<ValueOutput<Value>>,
    on_success: FlowContinuation,
    on_fail: FlowContinuation,
}

pub struct ParseCommandDefinition;

impl NodeDefinition for ParseCommandDefinition {
    fn name(&self) -> &str { "parse_command" }
    fn validate(&self, params: &Json) -> Result<()> {
        param_types(self.name(), params, "types").map(|_| ())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let types = param_types(self.name(), &params, "types")?;

        let mut ports = Ports::new();
        ports.flow_input();
        let text = ports.input("text");
        let command = ports.input("command");
        let args = types
            .iter()
            .enumerate()
            .map(|(i, ty)| ports.output_of(&format!("arg{}", i + 1), *ty))
            .collect();
        let on_success = ports.continuation("on_success");
        let on_fail = ports.continuation("on_fail");
        Ok(Box::new(ParseCommandNode {
            descriptor: ports.finish(),
            types,
            text,
            command,
            args,
            on_success,
            on_fail,
        }))
    }
}

#[async_trait]
impl Node for ParseCommandNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let text = ctx.read(&self.text).await?;
        let command = ctx.read(&self.command).await?;

        // Outputs are only written once every argument has parsed.
        match parse_command(&text, &command, &self.types) {
            Some(values) => {
                for (output, value) in self.args.iter().zip(values) {
                    ctx.write(output, value);
                }
                ctx.continue_with(&self.on_success).await
            }
            None => ctx.continue_with(&self.on_fail).await,
        }
    }
}
