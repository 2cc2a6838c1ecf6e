//! Fluent builder for graph snapshots
//!
//! Mostly a test convenience: assembling a [`GraphSnapshot`] by hand means
//! spelling out every struct field, which buries what a test is actually
//! about. The builder skips store validation on purpose, so malformed
//! graphs (dangling edges, duplicate ids) can be constructed when a test
//! needs one.

use crate::types::{GraphEdge, GraphNode, GraphSnapshot, NodeId, Position, ValueMap};

/// Builder assembling a snapshot node by node
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with empty values at the origin
    pub fn node(self, id: NodeId, node_type: impl Into<String>) -> Self {
        self.node_with_values(id, node_type, ValueMap::new())
    }

    /// Add a node with the given values
    pub fn node_with_values(
        mut self,
        id: NodeId,
        node_type: impl Into<String>,
        values: ValueMap,
    ) -> Self {
        self.nodes.push(GraphNode {
            id,
            node_type: node_type.into(),
            values,
            position: Position::default(),
        });
        self
    }

    /// Connect one port pair between two nodes
    pub fn edge(
        mut self,
        source: NodeId,
        source_port: impl Into<String>,
        target: NodeId,
        target_port: impl Into<String>,
    ) -> Self {
        self.edges.push(GraphEdge::new(
            source,
            source_port.into(),
            target,
            target_port.into(),
        ));
        self
    }

    pub fn build(self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}
