//! Error types for the graph runtime

use thiserror::Error;

use crate::runtime::value::ValueType;

/// Result type alias using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while loading or running a graph.
///
/// Parse and conversion failures inside nodes are not errors: those nodes
/// route to their `on_fail` slot instead.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node definition not found: {0}")]
    UnknownNodeKind(String),

    #[error("Invalid params for node '{kind}': {message}")]
    InvalidParams { kind: String, message: String },

    #[error("Duplicate node ID: {0}")]
    DuplicateNode(String),

    #[error("Invalid node ID '{0}': IDs must be non-empty and must not contain '.'")]
    InvalidNodeId(String),

    #[error("Target node not found: {0}")]
    UnknownNode(String),

    #[error("Node '{node}' has no {direction} port '{port}'")]
    UnknownPort {
        node: String,
        port: String,
        direction: &'static str,
    },

    #[error("Node '{node}' has no flow slot '{slot}'")]
    UnknownFlowSlot { node: String, slot: String },

    #[error("Malformed endpoint '{0}': expected 'node.port'")]
    MalformedEndpoint(String),

    #[error("Cannot link {source_type} output '{source_port}' to {target_type} input '{target_port}'")]
    LinkTypeMismatch {
        source_port: String,
        source_type: ValueType,
        target_port: String,
        target_type: ValueType,
    },

    #[error("Input '{0}' is linked more than once")]
    InputLinkedTwice(String),

    #[error("Flow slot '{0}' is linked more than once")]
    FlowLinkedTwice(String),

    #[error("Input '{0}' is read on tick and cannot be fed by a flow node's output")]
    TickInputFromFlow(String),

    #[error("Node '{0}' does not accept flow")]
    NotFlowTarget(String),

    #[error("Value dependency cycle through node '{0}'")]
    Cycle(String),

    #[error("Impulse '{name}' signature mismatch: expected {expected:?}, got {actual:?}")]
    ImpulseMismatch {
        name: String,
        expected: Vec<ValueType>,
        actual: Vec<ValueType>,
    },

    #[error("Expected {expected} value, got {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Value out of range for {0}")]
    OutOfRange(ValueType),

    #[error("Pulse timed out after {0} ms")]
    Timeout(u64),
}

impl GraphError {
    pub fn invalid_params(kind: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}
