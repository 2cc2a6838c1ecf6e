//! Versioned graph store
//!
//! Owns the live graph: node instances, folded edges, and the version
//! counter. All changes go through [`GraphStore::apply`], which validates,
//! mutates, and returns the stamped change events for broadcast. Validation
//! failures leave the store untouched: no partial application, no version
//! bump.
//!
//! Edges are stored folded: one entry per ordered `(source, target)` pair
//! holding the set of connected port pairs. An entry with an empty port set
//! never exists. Client-facing snapshots explode each port pair back into
//! its own edge record with a composite id.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{GraphEngineError, Result};
use crate::events::{GraphEvent, GraphMutation};
use crate::registry::NodeRegistry;
use crate::types::{
    parse_edge_id, GraphEdge, GraphNode, GraphSnapshot, NodeId, PortId, Position, ValueMap,
};

/// The versioned directed graph
pub struct GraphStore {
    registry: Arc<NodeRegistry>,
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: BTreeMap<(NodeId, NodeId), BTreeSet<(PortId, PortId)>>,
    version: u64,
}

impl GraphStore {
    /// Create an empty store validating against the given registry
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            version: 0,
        }
    }

    /// Current graph version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Node instance by id
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// All node instances, keyed by id
    pub fn nodes(&self) -> &BTreeMap<NodeId, GraphNode> {
        &self.nodes
    }

    /// All folded edges, keyed by `(source, target)`
    pub fn edges(&self) -> &BTreeMap<(NodeId, NodeId), BTreeSet<(PortId, PortId)>> {
        &self.edges
    }

    /// Apply one mutation, returning the events it produced
    ///
    /// Each event advances the version by one and carries the version it
    /// produced. An idempotent `create_edge` (port pair already present)
    /// returns an empty vec and leaves the version unchanged.
    pub fn apply(&mut self, mutation: GraphMutation) -> Result<Vec<GraphEvent>> {
        let events = match mutation {
            GraphMutation::CreateNode { node } => self.create_node(node),
            GraphMutation::DeleteNode { id } => self.delete_node(id),
            GraphMutation::UpdatePositionNode { id, position } => {
                self.update_position(id, position)
            }
            GraphMutation::UpdateValuesNode { id, values } => self.update_values(id, values),
            GraphMutation::CreateEdge { edge } => self.create_edge(edge),
            GraphMutation::DeleteEdge { id } => self.delete_edge(&id),
        }?;
        log::debug!("applied mutation: {} event(s), version {}", events.len(), self.version);
        Ok(events)
    }

    /// Client-facing snapshot of the whole graph
    ///
    /// Edge records are exploded per port pair, in `(source, target)` then
    /// port order, so snapshots of equal graphs are byte-identical.
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self.nodes.values().cloned().collect();
        let mut edges = Vec::new();
        for (&(source, target), ports) in &self.edges {
            for (source_handle, target_handle) in ports {
                edges.push(GraphEdge::new(
                    source,
                    source_handle.clone(),
                    target,
                    target_handle.clone(),
                ));
            }
        }
        GraphSnapshot { nodes, edges }
    }

    fn stamp(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn create_node(&mut self, node: GraphNode) -> Result<Vec<GraphEvent>> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphEngineError::DuplicateNode(node.id));
        }
        let template = self
            .registry
            .get_template(&node.node_type)
            .ok_or_else(|| GraphEngineError::UnknownType(node.node_type.clone()))?;
        template.validate_values(&node.values)?;

        // Template defaults first, then the caller's values on top.
        let mut values = template.default_values();
        for (key, value) in node.values {
            values.insert(key, value);
        }
        let node = GraphNode { values, ..node };

        let version = self.stamp();
        self.nodes.insert(node.id, node.clone());
        Ok(vec![GraphEvent::CreateNode { version, node }])
    }

    fn delete_node(&mut self, id: NodeId) -> Result<Vec<GraphEvent>> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphEngineError::NodeNotFound(id));
        }

        // Cascade: one delete_edge event per incident port pair, then the
        // node itself. Map and set ordering keep the cascade deterministic.
        let incident: Vec<(NodeId, NodeId)> = self
            .edges
            .keys()
            .filter(|&&(source, target)| source == id || target == id)
            .copied()
            .collect();

        let mut events = Vec::new();
        for key in incident {
            let ports = self.edges.remove(&key).unwrap_or_default();
            for (source_handle, target_handle) in ports {
                let edge = GraphEdge::new(key.0, source_handle, key.1, target_handle);
                let version = self.stamp();
                events.push(GraphEvent::DeleteEdge {
                    version,
                    id: edge.id,
                });
            }
        }

        self.nodes.remove(&id);
        let version = self.stamp();
        events.push(GraphEvent::DeleteNode { version, id });
        Ok(events)
    }

    fn update_position(&mut self, id: NodeId, position: Position) -> Result<Vec<GraphEvent>> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(GraphEngineError::NodeNotFound(id))?;
        node.position = position;
        let version = self.stamp();
        Ok(vec![GraphEvent::UpdatePositionNode {
            version,
            id,
            position,
        }])
    }

    fn update_values(&mut self, id: NodeId, values: ValueMap) -> Result<Vec<GraphEvent>> {
        let node = self
            .nodes
            .get(&id)
            .ok_or(GraphEngineError::NodeNotFound(id))?;
        let template = self
            .registry
            .get_template(&node.node_type)
            .ok_or_else(|| GraphEngineError::UnknownType(node.node_type.clone()))?;
        template.validate_values(&values)?;

        let node = self.nodes.get_mut(&id).ok_or(GraphEngineError::NodeNotFound(id))?;
        // Partial update: merge key by key, never replace the whole map.
        for (key, value) in &values {
            node.values.insert(key.clone(), value.clone());
        }
        let version = self.stamp();
        Ok(vec![GraphEvent::UpdateValuesNode {
            version,
            id,
            values,
        }])
    }

    fn create_edge(&mut self, edge: GraphEdge) -> Result<Vec<GraphEvent>> {
        if !self.nodes.contains_key(&edge.source) {
            return Err(GraphEngineError::NodeNotFound(edge.source));
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(GraphEngineError::NodeNotFound(edge.target));
        }

        let pair = (edge.source_handle.clone(), edge.target_handle.clone());
        let ports = self.edges.entry((edge.source, edge.target)).or_default();
        if !ports.insert(pair) {
            // Port pair already connected; nothing changed.
            return Ok(Vec::new());
        }

        let edge = GraphEdge::new(edge.source, edge.source_handle, edge.target, edge.target_handle);
        let version = self.stamp();
        Ok(vec![GraphEvent::CreateEdge { version, edge }])
    }

    fn delete_edge(&mut self, composite_id: &str) -> Result<Vec<GraphEvent>> {
        let (source, source_handle, target, target_handle) = parse_edge_id(composite_id)?;

        let key = (source, target);
        let ports = self
            .edges
            .get_mut(&key)
            .ok_or_else(|| GraphEngineError::EdgeNotFound(composite_id.to_string()))?;
        if !ports.remove(&(source_handle.clone(), target_handle.clone())) {
            return Err(GraphEngineError::EdgeNotFound(composite_id.to_string()));
        }
        if ports.is_empty() {
            self.edges.remove(&key);
        }

        let edge = GraphEdge::new(source, source_handle, target, target_handle);
        let version = self.stamp();
        Ok(vec![GraphEvent::DeleteEdge {
            version,
            id: edge.id,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::NodeTemplate;
    use crate::template::ValueComponent;
    use serde_json::json;

    fn test_registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry.register_template(
            NodeTemplate::new("Constant", "Constant").value(
                "value",
                "Value",
                ValueComponent::TextBox {
                    default: "0".to_string(),
                    placeholder: String::new(),
                    maxlen: 64,
                    regex: String::new(),
                },
            ),
        );
        registry.register_template(NodeTemplate::new("Display", "Display"));
        Arc::new(registry)
    }

    fn test_node(id: NodeId, node_type: &str) -> GraphNode {
        GraphNode {
            id,
            node_type: node_type.to_string(),
            values: ValueMap::new(),
            position: Position::default(),
        }
    }

    fn test_edge(source: NodeId, source_handle: &str, target: NodeId, target_handle: &str) -> GraphEdge {
        GraphEdge::new(
            source,
            source_handle.to_string(),
            target,
            target_handle.to_string(),
        )
    }

    fn store_with_nodes(ids: &[NodeId]) -> GraphStore {
        let mut store = GraphStore::new(test_registry());
        for &id in ids {
            store
                .apply(GraphMutation::CreateNode {
                    node: test_node(id, "Display"),
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_version_advances_once_per_event() {
        let mut store = store_with_nodes(&[1, 2]);
        assert_eq!(store.version(), 2);

        let events = store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(1, "out", 2, "in"),
            })
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].version(), Some(3));
        assert_eq!(store.version(), 3);
    }

    #[test]
    fn test_create_node_applies_defaults() {
        let mut store = GraphStore::new(test_registry());
        let events = store
            .apply(GraphMutation::CreateNode {
                node: test_node(1, "Constant"),
            })
            .unwrap();

        let GraphEvent::CreateNode { node, .. } = &events[0] else {
            panic!("expected create_node event");
        };
        assert_eq!(node.values["value"], json!("0"));
        assert_eq!(store.node(1).unwrap().values["value"], json!("0"));
    }

    #[test]
    fn test_create_node_caller_values_win() {
        let mut store = GraphStore::new(test_registry());
        let mut node = test_node(1, "Constant");
        node.values.insert("value".to_string(), json!("42"));
        store.apply(GraphMutation::CreateNode { node }).unwrap();
        assert_eq!(store.node(1).unwrap().values["value"], json!("42"));
    }

    #[test]
    fn test_create_node_rejects_duplicate_and_unknown() {
        let mut store = store_with_nodes(&[1]);

        let err = store
            .apply(GraphMutation::CreateNode {
                node: test_node(1, "Display"),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Node `1` already exists");

        let err = store
            .apply(GraphMutation::CreateNode {
                node: test_node(2, "Missing"),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid node type `Missing`");

        // Neither rejection advanced the version.
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_create_node_rejects_unknown_value() {
        let mut store = GraphStore::new(test_registry());
        let mut node = test_node(1, "Constant");
        node.values.insert("bogus".to_string(), json!(1));
        let err = store.apply(GraphMutation::CreateNode { node }).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown value `bogus` for node type `Constant`"
        );
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_update_values_merges_partially() {
        let mut store = GraphStore::new(test_registry());
        let mut node = test_node(1, "Constant");
        node.values.insert("value".to_string(), json!("7"));
        store.apply(GraphMutation::CreateNode { node }).unwrap();

        let mut update = ValueMap::new();
        update.insert("value".to_string(), json!("8"));
        let events = store
            .apply(GraphMutation::UpdateValuesNode { id: 1, values: update })
            .unwrap();

        assert_eq!(events[0].version(), Some(2));
        assert_eq!(store.node(1).unwrap().values["value"], json!("8"));
    }

    #[test]
    fn test_update_missing_node() {
        let mut store = GraphStore::new(test_registry());
        let err = store
            .apply(GraphMutation::UpdatePositionNode {
                id: 9,
                position: Position { x: 1.0, y: 1.0 },
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Node `9` does not exist");
    }

    #[test]
    fn test_edge_folding() {
        let mut store = store_with_nodes(&[1, 2]);

        store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(1, "a", 2, "b"),
            })
            .unwrap();
        store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(1, "c", 2, "d"),
            })
            .unwrap();

        // One folded edge carrying both port pairs.
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[&(1, 2)].len(), 2);
        assert_eq!(store.snapshot().edges.len(), 2);

        // Removing one pair keeps the edge; removing the last deletes it.
        store
            .apply(GraphMutation::DeleteEdge {
                id: "e1a-2b".to_string(),
            })
            .unwrap();
        assert_eq!(store.edges()[&(1, 2)].len(), 1);

        store
            .apply(GraphMutation::DeleteEdge {
                id: "e1c-2d".to_string(),
            })
            .unwrap();
        assert!(store.edges().is_empty());
    }

    #[test]
    fn test_create_edge_idempotent() {
        let mut store = store_with_nodes(&[1, 2]);
        store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(1, "out", 2, "in"),
            })
            .unwrap();
        let version = store.version();

        let events = store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(1, "out", 2, "in"),
            })
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_create_edge_requires_endpoints() {
        let mut store = store_with_nodes(&[1]);
        let err = store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(1, "out", 9, "in"),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Node `9` does not exist");
    }

    #[test]
    fn test_delete_edge_errors() {
        let mut store = store_with_nodes(&[1, 2]);

        let err = store
            .apply(GraphMutation::DeleteEdge {
                id: "garbage".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid edge id `garbage`");

        let err = store
            .apply(GraphMutation::DeleteEdge {
                id: "e1out-2in".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Edge `e1out-2in` does not exist");
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_delete_node_cascades() {
        let mut store = store_with_nodes(&[1, 2, 3]);
        store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(1, "out", 2, "in"),
            })
            .unwrap();
        store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(3, "out", 1, "in"),
            })
            .unwrap();
        store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(3, "aux", 1, "aux"),
            })
            .unwrap();
        assert_eq!(store.version(), 6);

        let events = store.apply(GraphMutation::DeleteNode { id: 1 }).unwrap();

        // Three port pairs removed, then the node. Each event has its own
        // version.
        assert_eq!(events.len(), 4);
        let versions: Vec<_> = events.iter().map(|e| e.version().unwrap()).collect();
        assert_eq!(versions, vec![7, 8, 9, 10]);

        assert!(matches!(
            events[0],
            GraphEvent::DeleteEdge { ref id, .. } if id == "e1out-2in"
        ));
        assert!(matches!(events[3], GraphEvent::DeleteNode { id: 1, .. }));

        assert!(store.node(1).is_none());
        assert!(store.edges().is_empty());
        assert_eq!(store.version(), 10);
    }

    #[test]
    fn test_snapshot_deterministic() {
        let mut store = store_with_nodes(&[2, 1]);
        store
            .apply(GraphMutation::CreateEdge {
                edge: test_edge(1, "out", 2, "in"),
            })
            .unwrap();

        let snapshot = store.snapshot();
        let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(snapshot.edges[0].id, "e1out-2in");
    }
}
