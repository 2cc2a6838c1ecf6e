//! Error types for the graph engine

use thiserror::Error;

use crate::types::NodeId;

/// Result type alias using GraphEngineError
pub type Result<T> = std::result::Result<T, GraphEngineError>;

/// Errors that can occur in the graph engine
///
/// The `Display` strings for the store validation variants are part of the
/// protocol surface; clients see them verbatim in rejection responses.
#[derive(Debug, Error)]
pub enum GraphEngineError {
    /// A node with this id is already present in the store
    #[error("Node `{0}` already exists")]
    DuplicateNode(NodeId),

    /// The referenced node is not in the store
    #[error("Node `{0}` does not exist")]
    NodeNotFound(NodeId),

    /// The node type has no registry entry
    #[error("Invalid node type `{0}`")]
    UnknownType(String),

    /// A value name not declared by the node type's template
    #[error("Unknown value `{name}` for node type `{node_type}`")]
    UnknownValue { node_type: String, name: String },

    /// The composite edge id could not be parsed
    #[error("Invalid edge id `{0}`")]
    InvalidEdgeId(String),

    /// The referenced port pair is not present
    #[error("Edge `{0}` does not exist")]
    EdgeNotFound(String),

    /// The graph contains at least one directed cycle
    #[error("Graph contains cycle")]
    CyclicGraph,

    /// A required input was not produced by any upstream node
    #[error("Missing input `{port}` for node `{node}`")]
    MissingInput { node: NodeId, port: String },

    /// Node execution failed
    #[error("Node execution failed: {0}")]
    ExecutionFailed(String),

    /// The node type is registered with a template only, no factory
    #[error("Node type `{0}` has no factory registered")]
    NoFactory(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphEngineError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }
}
