use async_trait::async_trait;
use serde_json::Value as Json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;
use crate::runtime::context::NodeContext;
use crate::runtime::node::{FlowContinuation, Node, NodeDefinition, NodeDescriptor, Ports, ValueInput, param_i32_or};
use crate::runtime::store::GlobalStore;

const WAIT_POLL: Duration = Duration::from_millis(10);

/// Whether `delay_ms` has passed since `last`. A missing timestamp counts as
/// elapsed; a non-positive delay never elapses.
pub(crate) fn interval_elapsed(last: Option<Instant>, now: Instant, delay_ms: i64) -> bool {
    if delay_ms <= 0 {
        return false;
    }
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= Duration::from_millis(delay_ms as u64),
    }
}

// --- IF NODE ---

#[derive(Debug)]
pub struct IfNode {
    descriptor: NodeDescriptor,
    condition: ValueInput<bool>,
    on_true: FlowContinuation,
    on_false: FlowContinuation,
}

pub struct IfDefinition;

impl NodeDefinition for IfDefinition {
    fn name(&self) -> &str { "if" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.flow_input();
        let condition = ports.input("condition");
        let on_true = ports.continuation("on_true");
        let on_false = ports.continuation("on_false");
        Ok(Box::new(IfNode {
            descriptor: ports.finish(),
            condition,
            on_true,
            on_false,
        }))
    }
}

#[async_trait]
impl Node for IfNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        if ctx.read(&self.condition).await? {
            ctx.continue_with(&self.on_true).await
        } else {
            ctx.continue_with(&self.on_false).await
        }
    }
}

// --- DELAY NODE ---

#[derive(Debug)]
pub struct DelayNode {
    descriptor: NodeDescriptor,
    delay: ValueInput<i64>,
    next: FlowContinuation,
}

pub struct DelayDefinition;

impl NodeDefinition for DelayDefinition {
    fn name(&self) -> &str { "delay" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.flow_input();
        let delay = ports.input("delay");
        let next = ports.continuation("next");
        Ok(Box::new(DelayNode {
            descriptor: ports.finish(),
            delay,
            next,
        }))
    }
}

#[async_trait]
impl Node for DelayNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let delay = ctx.read(&self.delay).await?.max(0) as u64;
        if !ctx.sleep(Duration::from_millis(delay)).await {
            debug!(node = %ctx.node_id(), "Delay cancelled");
            return Ok(());
        }
        ctx.continue_with(&self.next).await
    }
}

// --- FIRE ON INTERVAL NODE ---

#[derive(Debug)]
pub struct FireOnIntervalNode {
    descriptor: NodeDescriptor,
    delay: ValueInput<i64>,
    next: FlowContinuation,
    last_fired: GlobalStore<Option<Instant>>,
}

pub struct FireOnIntervalDefinition;

impl NodeDefinition for FireOnIntervalDefinition {
    fn name(&self) -> &str { "fire_on_interval" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.update(param_i32_or(&params, "offset", 0), false);
        let delay = ports.input("delay");
        let next = ports.continuation("next");
        Ok(Box::new(FireOnIntervalNode {
            descriptor: ports.finish(),
            delay,
            next,
            last_fired: GlobalStore::new(0),
        }))
    }
}

#[async_trait]
impl Node for FireOnIntervalNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    // Commits the fire time here so a second tick before the pulse runs
    // sees it.
    async fn on_update(&self, ctx: &NodeContext<'_>) -> Result<bool> {
        let delay = ctx.read(&self.delay).await?;
        let now = ctx.now();
        if !interval_elapsed(self.last_fired.read(ctx), now, delay) {
            return Ok(false);
        }
        self.last_fired.write(ctx, Some(now));
        Ok(true)
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        ctx.continue_with(&self.next).await
    }
}

// --- CONTINUE ON ELAPSED NODE ---

#[derive(Debug)]
pub struct ContinueOnElapsedNode {
    descriptor: NodeDescriptor,
    delay: ValueInput<i64>,
    next: FlowContinuation,
    last_passed: GlobalStore<Option<Instant>>,
}

pub struct ContinueOnElapsedDefinition;

impl NodeDefinition for ContinueOnElapsedDefinition {
    fn name(&self) -> &str { "continue_on_elapsed" }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.flow_input();
        let delay = ports.input("delay");
        let next = ports.continuation("next");
        Ok(Box::new(ContinueOnElapsedNode {
            descriptor: ports.finish(),
            delay,
            next,
            last_passed: GlobalStore::new(0),
        }))
    }
}

#[async_trait]
impl Node for ContinueOnElapsedNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let delay = ctx.read(&self.delay).await?;
        let now = ctx.now();
        if !interval_elapsed(self.last_passed.read(ctx), now, delay) {
            return Ok(());
        }
        self.last_passed.write(ctx, Some(now));
        ctx.continue_with(&self.next).await
    }
}

// --- WAIT UNTIL NODE ---

/// Suspends the pulse until the condition, sampled once per tick, equals
/// `expect`. A cancelled wait returns without firing `next`.
#[derive(Debug)]
pub struct WaitUntilNode {
    descriptor: NodeDescriptor,
    expect: bool,
    condition: ValueInput<bool>,
    next: FlowContinuation,
    sampled: GlobalStore<Option<bool>>,
}

pub struct WaitUntilDefinition {
    pub expect: bool,
}

impl NodeDefinition for WaitUntilDefinition {
    fn name(&self) -> &str {
        if self.expect { "wait_until_true" } else { "wait_until_false" }
    }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.flow_input().update(param_i32_or(&params, "offset", 0), false);
        let condition = ports.input("condition");
        let next = ports.continuation("next");
        Ok(Box::new(WaitUntilNode {
            descriptor: ports.finish(),
            expect: self.expect,
            condition,
            next,
            sampled: GlobalStore::new(0),
        }))
    }
}

#[async_trait]
impl Node for WaitUntilNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn on_update(&self, ctx: &NodeContext<'_>) -> Result<bool> {
        let condition = ctx.read(&self.condition).await?;
        self.sampled.write(ctx, Some(condition));
        Ok(false)
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        let condition = ctx.read(&self.condition).await?;
        self.sampled.write(ctx, Some(condition));

        while self.sampled.read(ctx) != Some(self.expect) {
            if !ctx.sleep(WAIT_POLL).await {
                debug!(node = %ctx.node_id(), "Wait cancelled");
                return Ok(());
            }
        }
        ctx.continue_with(&self.next).await
    }
}

// --- FIRE WHILE NODE ---

/// Fires on every tick where the condition equals `expect`, at most once per
/// `interval` ms. A non-positive interval fires on every such tick.
#[derive(Debug)]
pub struct FireWhileNode {
    descriptor: NodeDescriptor,
    expect: bool,
    condition: ValueInput<bool>,
    interval: ValueInput<i64>,
    next: FlowContinuation,
    last_fired: GlobalStore<Option<Instant>>,
}

pub struct FireWhileDefinition {
    pub expect: bool,
}

impl NodeDefinition for FireWhileDefinition {
    fn name(&self) -> &str {
        if self.expect { "fire_while_true" } else { "fire_while_false" }
    }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.update(param_i32_or(&params, "offset", 0), false);
        let condition = ports.input("condition");
        let interval = ports.input("interval");
        let next = ports.continuation("next");
        Ok(Box::new(FireWhileNode {
            descriptor: ports.finish(),
            expect: self.expect,
            condition,
            interval,
            next,
            last_fired: GlobalStore::new(0),
        }))
    }
}

#[async_trait]
impl Node for FireWhileNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn on_update(&self, ctx: &NodeContext<'_>) -> Result<bool> {
        if ctx.read(&self.condition).await? != self.expect {
            return Ok(false);
        }
        let interval = ctx.read(&self.interval).await?;
        let now = ctx.now();
        if interval > 0 && !interval_elapsed(self.last_fired.read(ctx), now, interval) {
            return Ok(false);
        }
        self.last_fired.write(ctx, Some(now));
        Ok(true)
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        ctx.continue_with(&self.next).await
    }
}

// --- FIRE IF NODE ---

#[derive(Debug)]
pub struct FireIfNode {
    descriptor: NodeDescriptor,
    expect: bool,
    condition: ValueInput<bool>,
    next: FlowContinuation,
}

pub struct FireIfDefinition {
    pub expect: bool,
}

impl NodeDefinition for FireIfDefinition {
    fn name(&self) -> &str {
        if self.expect { "fire_if_true" } else { "fire_if_false" }
    }
    fn validate(&self, _params: &Json) -> Result<()> { Ok(()) }
    fn prepare(&self, _params: Json) -> Result<Box<dyn Node>> {
        let mut ports = Ports::new();
        ports.flow_input();
        let condition = ports.input("condition");
        let next = ports.continuation("next");
        Ok(Box::new(FireIfNode {
            descriptor: ports.finish(),
            expect: self.expect,
            condition,
            next,
        }))
    }
}

#[async_trait]
impl Node for FireIfNode {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    async fn should_process(&self, ctx: &NodeContext<'_>) -> Result<bool> {
        Ok(ctx.read(&self.condition).await? == self.expect)
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<()> {
        ctx.continue_with(&self.next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_gate() {
        let now = Instant::now();
        assert!(interval_elapsed(None, now, 100));
        assert!(!interval_elapsed(None, now, 0));
        assert!(!interval_elapsed(None, now, -5));
        assert!(!interval_elapsed(Some(now), now + Duration::from_millis(99), 100));
        assert!(interval_elapsed(Some(now), now + Duration::from_millis(100), 100));
    }
}
