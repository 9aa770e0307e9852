pub mod compiler;
pub mod config;
pub mod dsl;
pub mod error;
pub mod nodes;
pub mod runtime;

pub use config::FieldConfig;
pub use error::{GraphError, Result};
pub use runtime::{Field, ImpulseDefinition, NodeRegistry, ReceivedParameter, Value, ValueType};
