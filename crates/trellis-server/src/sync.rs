//! Graph mutation service shared by the websocket and HTTP surfaces
//!
//! Wraps the versioned store behind a lock and turns accepted mutations into
//! broadcasts on the `graph` stream. Events are broadcast while the store
//! lock is still held, so every client observes them in version order.
//!
//! Websocket mutations carry the version the client last saw; a mismatch or
//! a validation failure answers that client alone with `sync_graph`, telling
//! it to refetch. HTTP mutations skip the version gate and report failures
//! through the response instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use graph_engine::{
    GraphEdge, GraphEvent, GraphMutation, GraphNode, GraphRequest, GraphSnapshot, GraphStore,
    NodeRegistry, NodeTemplate,
};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::constants::streams;
use crate::hub::Hub;

/// Full graph state for clients joining or resyncing
#[derive(Debug, Serialize)]
pub struct GraphView {
    pub version: u64,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub templates: BTreeMap<String, NodeTemplate>,
}

pub struct GraphService {
    registry: Arc<NodeRegistry>,
    store: Mutex<GraphStore>,
    hub: Arc<Hub>,
}

impl GraphService {
    pub fn new(registry: Arc<NodeRegistry>, hub: Arc<Hub>) -> Self {
        let store = Mutex::new(GraphStore::new(registry.clone()));
        Self {
            registry,
            store,
            hub,
        }
    }

    pub fn version(&self) -> u64 {
        self.store.lock().version()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.store.lock().snapshot()
    }

    /// Handle one mutation request from a websocket client
    ///
    /// Rejected requests never bump the version or reach other clients; the
    /// originator gets a `sync_graph` and is expected to refetch.
    pub fn handle_request(&self, conn: Uuid, data: serde_json::Value) {
        let request: GraphRequest = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("client {} sent a malformed graph request: {}", conn, err);
                self.send_sync(conn);
                return;
            }
        };

        let mut store = self.store.lock();
        if request.version != store.version() {
            log::debug!(
                "client {} mutated version {} but the graph is at {}",
                conn,
                request.version,
                store.version()
            );
            self.send_sync(conn);
            return;
        }

        match store.apply(request.mutation) {
            Ok(events) => {
                for event in &events {
                    self.hub.broadcast(streams::GRAPH, event);
                }
            }
            Err(err) => {
                log::debug!("client {} sent a rejected mutation: {}", conn, err);
                self.send_sync(conn);
            }
        }
    }

    /// Apply a mutation without a version gate, broadcasting accepted events
    ///
    /// This is the HTTP path. Failures are returned to the caller rather
    /// than answered with `sync_graph`.
    pub fn apply(&self, mutation: GraphMutation) -> graph_engine::Result<Vec<GraphEvent>> {
        let mut store = self.store.lock();
        let events = store.apply(mutation)?;
        for event in &events {
            self.hub.broadcast(streams::GRAPH, event);
        }
        Ok(events)
    }

    pub fn read(&self) -> GraphView {
        let store = self.store.lock();
        let GraphSnapshot { nodes, edges } = store.snapshot();
        GraphView {
            version: store.version(),
            nodes,
            edges,
            templates: self.registry.templates(),
        }
    }

    fn send_sync(&self, conn: Uuid) {
        self.hub.send_to(conn, streams::GRAPH, &GraphEvent::SyncGraph);
    }
}
