//! Core types for compute graphs
//!
//! These types define the client-visible shape of a graph: node instances,
//! per-port-pair edge records, positions, and the snapshot handed to workers.

use serde::{Deserialize, Serialize};

use crate::error::{GraphEngineError, Result};

/// Unique identifier for a node, assigned by the client
pub type NodeId = u64;

/// Unique identifier for a port
pub type PortId = String;

/// Node value mapping (value name -> JSON data)
pub type ValueMap = serde_json::Map<String, serde_json::Value>;

/// The data type carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Accepts any type
    Any,
    /// Text string
    String,
    /// Numeric value
    Number,
    /// Boolean value
    Boolean,
    /// JSON object
    Object,
}

/// Display position of a node, not semantically meaningful
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type (key into the registry)
    #[serde(rename = "type")]
    pub node_type: String,
    /// Current values, keyed by value name
    pub values: ValueMap,
    /// Position in the editor
    pub position: Position,
}

/// One port connection between two nodes
///
/// The store folds all connections between an ordered node pair into a single
/// edge carrying a port map; a `GraphEdge` is the client-facing record for one
/// `(source port, target port)` pair of that map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Composite identifier, see [`compose_edge_id`]
    pub id: String,
    /// Source node ID
    pub source: NodeId,
    /// Source port ID
    pub source_handle: PortId,
    /// Target node ID
    pub target: NodeId,
    /// Target port ID
    pub target_handle: PortId,
}

impl GraphEdge {
    /// Create an edge record, deriving the composite id from its endpoints
    pub fn new(
        source: NodeId,
        source_handle: impl Into<PortId>,
        target: NodeId,
        target_handle: impl Into<PortId>,
    ) -> Self {
        let source_handle = source_handle.into();
        let target_handle = target_handle.into();
        Self {
            id: compose_edge_id(source, &source_handle, target, &target_handle),
            source,
            source_handle,
            target,
            target_handle,
        }
    }
}

/// Build the composite edge id `e<source><sourcePort>-<target><targetPort>`
pub fn compose_edge_id(
    source: NodeId,
    source_handle: &str,
    target: NodeId,
    target_handle: &str,
) -> String {
    format!("e{}{}-{}{}", source, source_handle, target, target_handle)
}

/// Parse a composite edge id back into `(source, sourcePort, target, targetPort)`
///
/// The id grammar is `e` + node id digits + port word characters, twice,
/// separated by `-`. The digit run is greedy: an all-digit half gives its last
/// digit back to the port, since a port is never empty. Ports may only contain
/// word characters, so they never swallow the separator.
pub fn parse_edge_id(id: &str) -> Result<(NodeId, PortId, NodeId, PortId)> {
    let invalid = || GraphEngineError::InvalidEdgeId(id.to_string());

    let rest = id.strip_prefix('e').ok_or_else(invalid)?;
    let (source_half, target_half) = rest.split_once('-').ok_or_else(invalid)?;

    let (source, source_handle) = split_half(source_half).ok_or_else(invalid)?;
    let (target, target_handle) = split_half(target_half).ok_or_else(invalid)?;

    Ok((source, source_handle, target, target_handle))
}

/// Split one id half into its leading node id digits and trailing port
fn split_half(half: &str) -> Option<(NodeId, PortId)> {
    let mut digits_end = half
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(half.len());
    if digits_end == half.len() {
        // All digits: the port takes the final one.
        digits_end = half.len().checked_sub(1)?;
    }

    let (digits, port) = half.split_at(digits_end);
    if digits.is_empty() || port.is_empty() {
        return None;
    }
    if !port.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    let id = digits.parse().ok()?;
    Some((id, port.to_string()))
}

/// A value snapshot of a graph, as handed to workers and read endpoints
///
/// Carries everything scheduling needs: node ids, types, values and the
/// flattened port maps. Never a live reference into the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    /// Nodes in the graph
    pub nodes: Vec<GraphNode>,
    /// One record per connected port pair
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    /// Find a node by ID
    pub fn find_node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get edge records coming into a node
    pub fn incoming_edges(&self, node_id: NodeId) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edge records going out of a node
    pub fn outgoing_edges(&self, node_id: NodeId) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Whether a node with this id exists
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }
}
