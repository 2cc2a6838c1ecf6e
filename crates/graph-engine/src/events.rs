//! Mutation requests and versioned change events
//!
//! A [`GraphMutation`] is what a caller asks the store to do; a
//! [`GraphEvent`] is what the store reports after doing it, stamped with the
//! version that the event produced. One mutation may yield several events
//! (node removal cascades into per-port-pair edge removals), and each event
//! advances the version by exactly one.
//!
//! Both types serialize with an `action` tag so they can travel the `graph`
//! stream as-is.

use serde::{Deserialize, Serialize};

use crate::types::{GraphEdge, GraphNode, NodeId, Position, ValueMap};

/// A requested change to the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GraphMutation {
    /// Add a node with a client-assigned id
    CreateNode { node: GraphNode },
    /// Remove a node and every incident edge
    DeleteNode { id: NodeId },
    /// Move a node
    UpdatePositionNode { id: NodeId, position: Position },
    /// Merge values into a node, key by key
    UpdateValuesNode { id: NodeId, values: ValueMap },
    /// Connect one port pair between two nodes
    CreateEdge { edge: GraphEdge },
    /// Disconnect the port pair named by a composite edge id
    DeleteEdge { id: String },
}

/// A client mutation tagged with the client's last-known version
///
/// The version gate in the synchronization layer compares this against the
/// store before applying the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRequest {
    pub version: u64,
    #[serde(flatten)]
    pub mutation: GraphMutation,
}

/// An applied change, stamped with the version it produced
///
/// `SyncGraph` is the odd one out: it carries no version and is sent only to
/// a client whose mutation was rejected, telling it to re-fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GraphEvent {
    CreateNode {
        version: u64,
        node: GraphNode,
    },
    DeleteNode {
        version: u64,
        id: NodeId,
    },
    UpdatePositionNode {
        version: u64,
        id: NodeId,
        position: Position,
    },
    UpdateValuesNode {
        version: u64,
        id: NodeId,
        values: ValueMap,
    },
    CreateEdge {
        version: u64,
        edge: GraphEdge,
    },
    DeleteEdge {
        version: u64,
        id: String,
    },
    SyncGraph,
}

impl GraphEvent {
    /// The version this event produced, if it carries one
    pub fn version(&self) -> Option<u64> {
        match self {
            GraphEvent::CreateNode { version, .. }
            | GraphEvent::DeleteNode { version, .. }
            | GraphEvent::UpdatePositionNode { version, .. }
            | GraphEvent::UpdateValuesNode { version, .. }
            | GraphEvent::CreateEdge { version, .. }
            | GraphEvent::DeleteEdge { version, .. } => Some(*version),
            GraphEvent::SyncGraph => None,
        }
    }
}
