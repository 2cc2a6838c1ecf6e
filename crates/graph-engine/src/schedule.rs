//! Job scheduling over graph snapshots
//!
//! Turns a snapshot and an optional target node into an ordered execution
//! plan:
//!
//! 1. Verify the whole graph is acyclic (Kahn's algorithm). A cycle anywhere
//!    fails the job, even outside the requested scope.
//! 2. Find weakly-connected components, ignoring edge direction.
//! 3. Pick the scope: the target's component, or the largest component when
//!    no target is given (first enumerated wins ties).
//! 4. Filter the global topological order down to the scope. Relative order
//!    is preserved, so the filtered order is topological for the scope too.
//!
//! Everything here is deterministic for a given snapshot: nodes are
//! enumerated in ascending id and neighbor sets are sorted, so equal inputs
//! plan identically.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{GraphEngineError, Result};
use crate::types::{GraphSnapshot, NodeId, PortId};

/// Where one input port gets its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    pub target_port: PortId,
    pub source: NodeId,
    pub source_port: PortId,
}

/// One node to execute, with its resolved input bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub id: NodeId,
    pub node_type: String,
    pub bindings: Vec<InputBinding>,
}

/// An ordered execution plan for one job
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

/// Compute the execution plan for a snapshot
///
/// An empty graph yields an empty plan. A target that is not in the graph
/// fails with a not-found error; a cycle anywhere fails with a cycle error
/// before any scope is selected.
pub fn plan(snapshot: &GraphSnapshot, target: Option<NodeId>) -> Result<Plan> {
    let node_ids: BTreeSet<NodeId> = snapshot.nodes.iter().map(|n| n.id).collect();
    if let Some(id) = target {
        if !node_ids.contains(&id) {
            return Err(GraphEngineError::NodeNotFound(id));
        }
    }

    let order = topological_order(snapshot, &node_ids)?;
    let components = weak_components(snapshot, &node_ids);
    let scope = match target {
        Some(id) => components
            .into_iter()
            .find(|c| c.contains(&id))
            .unwrap_or_default(),
        None => largest_component(components),
    };

    let steps = order
        .into_iter()
        .filter(|id| scope.contains(id))
        .filter_map(|id| snapshot.find_node(id))
        .map(|node| {
            let bindings = snapshot
                .incoming_edges(node.id)
                .map(|edge| InputBinding {
                    target_port: edge.target_handle.clone(),
                    source: edge.source,
                    source_port: edge.source_handle.clone(),
                })
                .collect();
            PlanStep {
                id: node.id,
                node_type: node.node_type.clone(),
                bindings,
            }
        })
        .collect();

    Ok(Plan { steps })
}

/// Global topological order via Kahn's algorithm
///
/// Fails when any node remains unvisited, which means a cycle.
fn topological_order(snapshot: &GraphSnapshot, node_ids: &BTreeSet<NodeId>) -> Result<Vec<NodeId>> {
    let mut in_degree: BTreeMap<NodeId, usize> = node_ids.iter().map(|&id| (id, 0)).collect();
    for edge in &snapshot.edges {
        if let Some(deg) = in_degree.get_mut(&edge.target) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(node_ids.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for edge in &snapshot.edges {
            if edge.source == id {
                if let Some(deg) = in_degree.get_mut(&edge.target) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(edge.target);
                    }
                }
            }
        }
    }

    if order.len() < node_ids.len() {
        return Err(GraphEngineError::CyclicGraph);
    }
    Ok(order)
}

/// Weakly-connected components, seeded in ascending node id
fn weak_components(snapshot: &GraphSnapshot, node_ids: &BTreeSet<NodeId>) -> Vec<BTreeSet<NodeId>> {
    let mut neighbors: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    for edge in &snapshot.edges {
        if node_ids.contains(&edge.source) && node_ids.contains(&edge.target) {
            neighbors.entry(edge.source).or_default().insert(edge.target);
            neighbors.entry(edge.target).or_default().insert(edge.source);
        }
    }

    let mut components = Vec::new();
    let mut seen: BTreeSet<NodeId> = BTreeSet::new();
    for &seed in node_ids {
        if seen.contains(&seed) {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(id) = queue.pop_front() {
            if !component.insert(id) {
                continue;
            }
            seen.insert(id);
            if let Some(adjacent) = neighbors.get(&id) {
                queue.extend(adjacent.iter().filter(|n| !component.contains(n)));
            }
        }
        components.push(component);
    }
    components
}

/// The largest component; the first enumerated wins ties
fn largest_component(components: Vec<BTreeSet<NodeId>>) -> BTreeSet<NodeId> {
    let mut best: BTreeSet<NodeId> = BTreeSet::new();
    for component in components {
        if component.len() > best.len() {
            best = component;
        }
    }
    best
}
