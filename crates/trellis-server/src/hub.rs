//! Broadcast hub for connected clients
//!
//! Tracks which streams each connection is subscribed to and fans outbound
//! payloads out to the subscribers of a stream. Inbound messages carry a
//! `stream` tag; the hub runs every handler registered for that tag in
//! registration order. The reserved `streams` stream is handled by the hub
//! itself and carries subscribe/unsubscribe requests.
//!
//! Delivery is fire-and-forget: a connection whose send channel is gone is
//! removed on the next send, never surfaced as an error to the caller.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::constants::streams;

/// The one message shape both directions: a stream tag plus a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub stream: String,
    pub data: serde_json::Value,
}

/// Handler for inbound messages on one stream
///
/// Receives the envelope's `data` and the originating connection id.
pub type StreamHandler = Arc<dyn Fn(serde_json::Value, Uuid) -> BoxFuture<'static, ()> + Send + Sync>;

/// Subscribe/unsubscribe request on the reserved `streams` stream
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum StreamsRequest {
    Subscribe { streams: Vec<String> },
    Unsubscribe { streams: Vec<String> },
}

struct Connection {
    sender: mpsc::UnboundedSender<String>,
    streams: HashSet<String>,
}

/// Per-stream subscriber sets and inbound message routing
#[derive(Default)]
pub struct Hub {
    connections: RwLock<HashMap<Uuid, Connection>>,
    handlers: RwLock<HashMap<String, Vec<StreamHandler>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection, returning its id
    ///
    /// The connection starts with no subscriptions; it subscribes itself via
    /// the `streams` stream.
    pub fn register(&self, sender: mpsc::UnboundedSender<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.write().insert(
            id,
            Connection {
                sender,
                streams: HashSet::new(),
            },
        );
        id
    }

    /// Remove a connection and all its subscriptions
    pub fn unregister(&self, conn: Uuid) {
        self.connections.write().remove(&conn);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Register a handler for inbound messages on one stream
    ///
    /// Handlers for the same stream run in registration order, each awaited
    /// before the next.
    pub fn register_handler<F>(&self, stream: &str, handler: F)
    where
        F: Fn(serde_json::Value, Uuid) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(stream.to_string())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Send a payload to every connection subscribed to `stream`
    pub fn broadcast<T: Serialize>(&self, stream: &str, data: &T) {
        let Some(text) = encode_envelope(stream, data) else {
            return;
        };

        let mut dropped = Vec::new();
        {
            let connections = self.connections.read();
            for (id, connection) in connections.iter() {
                if !connection.streams.contains(stream) {
                    continue;
                }
                if connection.sender.send(text.clone()).is_err() {
                    dropped.push(*id);
                }
            }
        }
        self.drop_connections(&dropped);
    }

    /// Send a payload to a single connection, subscribed or not
    pub fn send_to<T: Serialize>(&self, conn: Uuid, stream: &str, data: &T) {
        let Some(text) = encode_envelope(stream, data) else {
            return;
        };

        let failed = {
            let connections = self.connections.read();
            match connections.get(&conn) {
                Some(connection) => connection.sender.send(text).is_err(),
                None => false,
            }
        };
        if failed {
            self.drop_connections(&[conn]);
        }
    }

    /// Route one inbound message to the handlers for its stream
    ///
    /// Per-connection ordering is the caller's responsibility: the socket
    /// loop awaits this before reading the next message.
    pub async fn dispatch(&self, conn: Uuid, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::warn!("client {} sent a malformed message: {}", conn, err);
                return;
            }
        };

        if envelope.stream == streams::STREAMS {
            self.handle_streams_request(conn, &envelope.data);
        }

        let handlers = {
            let table = self.handlers.read();
            table.get(&envelope.stream).cloned().unwrap_or_default()
        };
        if handlers.is_empty() && envelope.stream != streams::STREAMS {
            log::debug!("no handler for stream `{}`", envelope.stream);
        }
        for handler in handlers {
            handler(envelope.data.clone(), conn).await;
        }
    }

    fn handle_streams_request(&self, conn: Uuid, data: &serde_json::Value) {
        let request: StreamsRequest = match serde_json::from_value(data.clone()) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("client {} sent a malformed streams request: {}", conn, err);
                return;
            }
        };

        let mut connections = self.connections.write();
        let Some(connection) = connections.get_mut(&conn) else {
            return;
        };
        match request {
            StreamsRequest::Subscribe { streams } => {
                for stream in streams {
                    connection.streams.insert(stream);
                }
            }
            StreamsRequest::Unsubscribe { streams } => {
                // Unknown streams are ignored.
                for stream in streams {
                    connection.streams.remove(&stream);
                }
            }
        }
    }

    fn drop_connections(&self, ids: &[Uuid]) {
        if ids.is_empty() {
            return;
        }
        let mut connections = self.connections.write();
        for id in ids {
            if connections.remove(id).is_some() {
                log::debug!("client {} dropped during send", id);
            }
        }
    }
}

fn encode_envelope<T: Serialize>(stream: &str, data: &T) -> Option<String> {
    let result = serde_json::to_value(data)
        .map(|data| Envelope {
            stream: stream.to_string(),
            data,
        })
        .and_then(|envelope| serde_json::to_string(&envelope));
    match result {
        Ok(text) => Some(text),
        Err(err) => {
            log::error!("failed to encode `{}` payload: {}", stream, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope_text(stream: &str, data: serde_json::Value) -> String {
        serde_json::to_string(&json!({ "stream": stream, "data": data })).unwrap()
    }

    fn connect(hub: &Hub) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (hub.register(tx), rx)
    }

    async fn subscribe(hub: &Hub, conn: Uuid, streams: &[&str]) {
        let text = envelope_text(
            "streams",
            json!({ "action": "subscribe", "streams": streams }),
        );
        hub.dispatch(conn, &text).await;
    }

    fn recv_data(rx: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
        let text = rx.try_recv().expect("message pending");
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers_only() {
        let hub = Hub::new();
        let (subscribed, mut rx1) = connect(&hub);
        let (_other, mut rx2) = connect(&hub);
        subscribe(&hub, subscribed, &["graph"]).await;

        hub.broadcast("graph", &json!({ "action": "sync_graph" }));

        let received = recv_data(&mut rx1);
        assert_eq!(received["stream"], "graph");
        assert_eq!(received["data"]["action"], "sync_graph");
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let hub = Hub::new();
        let (conn, mut rx) = connect(&hub);
        subscribe(&hub, conn, &["graph", "files"]).await;

        let text = envelope_text(
            "streams",
            json!({ "action": "unsubscribe", "streams": ["graph", "never-subscribed"] }),
        );
        hub.dispatch(conn, &text).await;

        hub.broadcast("graph", &json!({ "n": 1 }));
        assert!(rx.try_recv().is_err());

        hub.broadcast("files", &json!({ "n": 2 }));
        assert_eq!(recv_data(&mut rx)["data"]["n"], 2);
    }

    #[tokio::test]
    async fn test_failed_send_is_implicit_disconnect() {
        let hub = Hub::new();
        let (conn, rx) = connect(&hub);
        subscribe(&hub, conn, &["graph"]).await;
        assert_eq!(hub.connection_count(), 1);

        drop(rx);
        hub.broadcast("graph", &json!({}));
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_send_to_targets_one_connection() {
        let hub = Hub::new();
        let (first, mut rx1) = connect(&hub);
        let (_second, mut rx2) = connect(&hub);

        // No subscription required for a directed send.
        hub.send_to(first, "graph", &json!({ "action": "sync_graph" }));

        assert_eq!(recv_data(&mut rx1)["data"]["action"], "sync_graph");
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let hub = Hub::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let order = order.clone();
            hub.register_handler("test", move |data, _conn| {
                let order = order.clone();
                Box::pin(async move {
                    order.lock().push((name, data["n"].as_u64().unwrap()));
                })
            });
        }

        let (conn, _rx) = connect(&hub);
        hub.dispatch(conn, &envelope_text("test", json!({ "n": 7 }))).await;

        assert_eq!(*order.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped() {
        let hub = Hub::new();
        let (conn, _rx) = connect(&hub);

        hub.dispatch(conn, "not json").await;
        hub.dispatch(conn, r#"{"data": {}}"#).await;
        hub.dispatch(conn, &envelope_text("streams", json!({ "action": "explode" }))).await;

        assert_eq!(hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_unregister_removes_subscriptions() {
        let hub = Hub::new();
        let (conn, mut rx) = connect(&hub);
        subscribe(&hub, conn, &["graph"]).await;

        hub.unregister(conn);
        hub.broadcast("graph", &json!({}));

        assert_eq!(hub.connection_count(), 0);
        assert!(rx.try_recv().is_err());
    }
}
