pub mod command;
pub mod common;
pub mod flow;
pub mod impulse;
pub mod keyed;
pub mod parameter;
pub mod pattern;
pub mod string;
pub mod trigger;
pub mod tween;

use crate::runtime::registry::NodeRegistry;
use trigger::Edge;

/// Registers every built-in node kind.
pub fn register_builtins(registry: &mut NodeRegistry) {
    registry.register(Box::new(common::ConstantDefinition));
    registry.register(Box::new(common::LogDefinition));
    registry.register(Box::new(common::OnStartDefinition));

    registry.register(Box::new(flow::IfDefinition));
    registry.register(Box::new(flow::DelayDefinition));
    registry.register(Box::new(flow::FireOnIntervalDefinition));
    registry.register(Box::new(flow::ContinueOnElapsedDefinition));
    for expect in [true, false] {
        registry.register(Box::new(flow::WaitUntilDefinition { expect }));
        registry.register(Box::new(flow::FireWhileDefinition { expect }));
        registry.register(Box::new(flow::FireIfDefinition { expect }));
    }
    registry.register(Box::new(tween::TweenDefinition));

    registry.register(Box::new(trigger::FireOnEdgeDefinition { edge: Edge::Rising }));
    registry.register(Box::new(trigger::FireOnEdgeDefinition { edge: Edge::Falling }));
    registry.register(Box::new(trigger::FireOnChangeDefinition));

    registry.register(Box::new(impulse::ImpulseSendDefinition));
    registry.register(Box::new(impulse::ImpulseReceiveDefinition));

    registry.register(Box::new(parameter::OnParameterReceivedDefinition));
    registry.register(Box::new(parameter::RegisteredParameterReceivedDefinition));
    registry.register(Box::new(parameter::ParameterSourceDefinition));

    registry.register(Box::new(string::ToStringDefinition));
    registry.register(Box::new(string::StringFormatDefinition));
    registry.register(Box::new(pattern::RegexMatchDefinition));
    registry.register(Box::new(pattern::RegexCaptureValueDefinition));
    registry.register(Box::new(command::ParseCommandDefinition));

    registry.register(Box::new(keyed::WriteKeyedStoreDefinition));
    registry.register(Box::new(keyed::ReadKeyedStoreDefinition));
}
