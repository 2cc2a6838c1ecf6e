//! Shared application state
//!
//! Everything the HTTP handlers and websocket sessions need: the graph
//! service, the broadcast hub, and the pool of worker executors. Cloning is
//! cheap; all fields are shared handles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use executor::Executor;
use graph_engine::{NodeId, NodeRegistry};
use parking_lot::Mutex;

use crate::constants::streams;
use crate::hub::Hub;
use crate::sync::GraphService;

#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<GraphService>,
    pub hub: Arc<Hub>,
    executors: Arc<Mutex<Vec<Executor>>>,
    next_worker: Arc<AtomicUsize>,
}

impl AppState {
    /// Wire the hub and graph service together over a set of workers
    pub fn build(registry: Arc<NodeRegistry>, executors: Vec<Executor>) -> Self {
        let hub = Arc::new(Hub::new());
        let graph = Arc::new(GraphService::new(registry, hub.clone()));

        let service = graph.clone();
        hub.register_handler(streams::GRAPH, move |data, conn| {
            let service = service.clone();
            Box::pin(async move { service.handle_request(conn, data) })
        });

        Self {
            graph,
            hub,
            executors: Arc::new(Mutex::new(executors)),
            next_worker: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.executors.lock().len()
    }

    /// Queue a run of the current graph on the next worker in line
    ///
    /// Returns `None` when no workers were started at all, otherwise the
    /// enqueue result with the chosen worker's device name. A worker that
    /// has crashed stays in the rotation and reports the failure itself.
    pub fn submit(&self, target: Option<NodeId>) -> Option<executor::Result<String>> {
        let executors = self.executors.lock();
        if executors.is_empty() {
            return None;
        }
        let index = self.next_worker.fetch_add(1, Ordering::Relaxed) % executors.len();
        let executor = &executors[index];
        Some(
            executor
                .enqueue(target, self.graph.snapshot())
                .map(|()| executor.device().to_string()),
        )
    }

    /// Shut every worker down, waiting for each in turn
    pub async fn shutdown(&self) {
        let executors = std::mem::take(&mut *self.executors.lock());
        for executor in executors {
            let device = executor.device().to_string();
            if let Err(err) = executor.cleanup().await {
                log::warn!("worker cleanup for {} failed: {}", device, err);
            }
        }
    }
}
