pub mod blueprint;
pub mod cancel;
pub mod context;
pub mod field;
pub mod impulse;
pub mod node;
pub mod parameter;
pub mod pulse;
pub mod registry;
pub mod store;
pub mod validation;
pub mod value;

pub use blueprint::{Blueprint, NodeIndex};
pub use cancel::CancelToken;
pub use context::{NodeContext, PulseContext};
pub use field::Field;
pub use impulse::ImpulseDefinition;
pub use node::{Node, NodeDefinition, NodeDescriptor, Ports};
pub use parameter::ReceivedParameter;
pub use registry::NodeRegistry;
pub use store::{GlobalStore, LocalStore};
pub use value::{PortValue, Value, ValueType};
