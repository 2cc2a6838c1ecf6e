//! Graph Engine - versioned collaborative graph model for Trellis
//!
//! This crate owns everything about the graph itself, with no network or
//! process code. It provides:
//!
//! - A versioned store where every applied mutation produces stamped change
//!   events for broadcast
//! - Folded edges: one edge per ordered node pair, carrying a set of port
//!   pairs with composite client-facing ids
//! - Node templates (ports + UI value components) and a registry populated
//!   at link time via `inventory`
//! - A deterministic scheduler: global cycle check, weak-component scoping,
//!   topological ordering with resolved input bindings
//!
//! # Example
//!
//! ```ignore
//! use graph_engine::{GraphMutation, GraphStore, NodeRegistry};
//!
//! let registry = Arc::new(NodeRegistry::with_builtins());
//! let mut store = GraphStore::new(registry);
//! let events = store.apply(GraphMutation::DeleteNode { id: 7 })?;
//! for event in events {
//!     hub.broadcast("graph", &event);
//! }
//! ```

pub mod builder;
pub mod error;
pub mod events;
pub mod registry;
pub mod schedule;
pub mod store;
pub mod template;
pub mod types;

// Re-export key types
pub use builder::GraphBuilder;
pub use error::{GraphEngineError, Result};
pub use events::{GraphEvent, GraphMutation, GraphRequest};
pub use registry::{ComputeNode, NodeDefinition, NodeFactory, NodeRegistry};
pub use schedule::{plan, InputBinding, Plan, PlanStep};
pub use store::GraphStore;
pub use template::{NodeTemplate, PortSchema, ValueComponent, ValueSchema};
pub use types::{
    compose_edge_id, parse_edge_id, DataType, GraphEdge, GraphNode, GraphSnapshot, NodeId, PortId,
    Position, ValueMap,
};
