use async_trait::async_trait;
use serde_json::Value as Json;
use std::time::Duration;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::runtime::context::NodeContext;
use crate::runtime::node::{
    FlowCall, FlowContinuation, Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, ValueOutput, param_type,
};
use crate::runtime::value::{Value, ValueType};

const FRAME: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// Linear interpolation at `t`, clamped to `[0, 1]`.
pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Interpolates `from` to `to` over `duration` ms, writing `value` about 60
/// times a second. `on_update` is called after every write; `on_finished`
/// runs once the final value is written, unless the pulse was cancelled.
#[derive(Debug)]
pub struct TweenNode {
    descriptor: NodeDescriptor,
    ty: ValueType,
    from: ValueInput<Value>,
    to: ValueInput<Value>,
    duration: ValueInput<i64>,
    value: ValueOutput<Value>,
    on_update: FlowCall,
    on_finished: FlowContinuation,
}

pub struct TweenDefinition;

impl NodeDefinition for TweenDefinition {
    fn name(&self) -> &str { "tween" }
    fn validate(&self, params: &Json) -> Result<()> {
        let ty = param_type(self.name(), params, "type")?;
        if !ty.is_numeric() {
            return Err(GraphError::invalid_params(
                self.name(),
                format!("type must be int or float, got {}", ty),
            ));
        }
        Ok(())
    }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let ty = param_type(self.name(), &params, "type")?;
        let mut ports = Ports::new();
        ports.flow_input();
        let from = ports.input_of("from", ty);
        let to = ports.input_of("to", ty);
        let duration = ports.input("duration");
        let value = ports.output_of("value", ty);
        let on_update = ports.call("on_update");
        let on_finished = ports.continuation("on_finished");
        Ok(Box::new(TweenNode {
            descriptor: ports.finish(),
            ty,
            from,
            to,
            duration,
            value,
            on_update,
            on_finished,
        }))
    }
}

impl TweenNode {
    async fn read_number(&self, ctx: &NodeContext<'_>, input: &ValueInput<Value>) -> Result<f64> {
        let value = ctx.read(input).await?;
        value.as_f64().ok_or(GraphError::TypeMismatch {
            expected: self.ty,
            actual: value.value_type(),
        })
    }
}

#[async_trait]
impl Node for TweenNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let from = self.read_number(ctx, &self.from).await?;
        let to = self.read_number(ctx, &self.to).await?;
        let duration_ms = ctx.read(&self.duration).await?.max(0) as f64;
        let start = ctx.now();

        loop {
            let t = if duration_ms == 0.0 {
                1.0
            } else {
                (ctx.now().duration_since(start).as_secs_f64() * 1000.0 / duration_ms).clamp(0.0, 1.0)
            };

            ctx.write(&self.value, Value::from_f64(self.ty, lerp(from, to, t))?);
            ctx.call(&self.on_update);

            if 1.0 - t <= f64::EPSILON {
                break;
            }
            if !ctx.sleep(FRAME).await {
                debug!(node = %ctx.node_id(), "Tween cancelled");
                return Ok(());
            }
        }

        ctx.continue_with(&self.on_finished).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_clamps_t() {
        assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
        assert_eq!(lerp(0.0, 10.0, 1.5), 10.0);
        assert_eq!(lerp(10.0, 0.0, -1.0), 10.0);
    }

    #[test]
    fn int_tween_values_truncate() {
        let x = lerp(0.0, 10.0, 0.37);
        assert_eq!(Value::from_f64(ValueType::Int, x).unwrap(), Value::Int(3));
    }
}
