//! Wire types for the parent/worker pipe
//!
//! Everything crossing the process boundary travels as one JSON document per
//! line. The parent writes [`WorkerInbound`] to the worker's stdin; the
//! worker writes [`StatusMessage`] to its stdout. Stderr is left for the
//! worker's own diagnostics.

use serde::{Deserialize, Serialize};

use graph_engine::{GraphSnapshot, NodeId};

/// A message from the parent to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerInbound {
    /// Run one job: schedule the snapshot and execute the scoped nodes
    Job {
        target: Option<NodeId>,
        graph: GraphSnapshot,
    },
    /// Adjust the worker's control state
    Control { command: ControlCommand },
}

/// Process-level control, delivered in-band instead of via signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand {
    /// Hold execution at the next node boundary
    Pause,
    /// Continue after a pause
    Resume,
    /// Abandon the current job, keep the process alive
    Interrupt,
    /// Finish the current node and exit the worker loop
    Shutdown,
}

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusKind {
    Info,
    Warning,
    Error,
}

/// A typed status line from the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub msg: String,
}

impl StatusMessage {
    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            msg: msg.into(),
        }
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Warning,
            msg: msg.into(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            msg: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_engine::GraphBuilder;
    use serde_json::json;

    #[test]
    fn test_job_wire_shape() {
        let message = WorkerInbound::Job {
            target: Some(3),
            graph: GraphBuilder::new().node(3, "Constant").build(),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["kind"], "job");
        assert_eq!(value["target"], 3);
        assert_eq!(value["graph"]["nodes"][0]["id"], 3);
    }

    #[test]
    fn test_null_target_round_trip() {
        let message = WorkerInbound::Job {
            target: None,
            graph: GraphSnapshot::default(),
        };
        let text = serde_json::to_string(&message).unwrap();
        let back: WorkerInbound = serde_json::from_str(&text).unwrap();
        assert_eq!(message, back);
    }

    #[test]
    fn test_control_wire_shape() {
        let message = WorkerInbound::Control {
            command: ControlCommand::Interrupt,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"kind": "control", "command": "interrupt"}));
    }

    #[test]
    fn test_status_wire_shape() {
        let status = StatusMessage::warning("Job interrupted.");
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            json!({"type": "WARNING", "msg": "Job interrupted."})
        );

        let parsed: StatusMessage =
            serde_json::from_str(r#"{"type": "ERROR", "msg": "boom"}"#).unwrap();
        assert_eq!(parsed.kind, StatusKind::Error);
    }
}
