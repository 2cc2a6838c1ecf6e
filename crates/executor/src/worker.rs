//! Worker-side job loop
//!
//! Runs inside the worker process. Jobs and control messages arrive on
//! stdin, one JSON document per line; typed status messages leave on
//! stdout. A reader task demultiplexes stdin into a FIFO job queue and a
//! watched control state; the job loop consumes jobs one at a time and
//! observes control changes between nodes.
//!
//! Failure containment: a node that fails aborts the remainder of its job
//! with one error status and the loop moves on to the next job. The worker
//! process itself only exits on stdin EOF or a shutdown control message.
//!
//! The loop is generic over its input and output streams so tests can drive
//! it over in-memory pipes instead of a real process boundary.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use graph_engine::{
    plan, GraphEngineError, GraphSnapshot, NodeId, NodeRegistry, PlanStep,
};

use crate::error::Result;
use crate::ipc::{ControlCommand, StatusMessage, WorkerInbound};

/// Control state shared from the reader task into the job loop
///
/// `interrupts` is a counter rather than a flag: each job records the value
/// at its start, so an interrupt delivered between jobs is a no-op instead
/// of killing the next job.
#[derive(Debug, Clone, Copy, Default)]
struct ControlState {
    paused: bool,
    shutdown: bool,
    interrupts: u64,
}

/// What a node boundary decided
enum Boundary {
    Proceed,
    Interrupted,
    Shutdown,
}

/// Run the worker loop until stdin closes or shutdown is requested
pub async fn run<R, W>(registry: Arc<NodeRegistry>, input: R, output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel();
    let (control_tx, mut control_rx) = watch::channel(ControlState::default());

    tokio::spawn(read_inbound(input, jobs_tx, control_tx));

    let mut output = output;
    loop {
        if control_rx.borrow().shutdown {
            break;
        }
        tokio::select! {
            job = jobs_rx.recv() => match job {
                Some((target, graph)) => {
                    run_job(&registry, target, graph, &mut control_rx, &mut output).await?;
                }
                None => break,
            },
            result = control_rx.changed() => match result {
                Ok(()) => {
                    if control_rx.borrow().shutdown {
                        break;
                    }
                }
                Err(_) => {
                    // Reader gone; no further control can arrive. Drain what
                    // was already queued, then exit.
                    while let Some((target, graph)) = jobs_rx.recv().await {
                        run_job(&registry, target, graph, &mut control_rx, &mut output).await?;
                    }
                    break;
                }
            },
        }
    }
    Ok(())
}

/// Demultiplex stdin lines into the job queue and the control state
async fn read_inbound<R>(
    input: R,
    jobs: mpsc::UnboundedSender<(Option<NodeId>, GraphSnapshot)>,
    control: watch::Sender<ControlState>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WorkerInbound>(&line) {
            Ok(WorkerInbound::Job { target, graph }) => {
                if jobs.send((target, graph)).is_err() {
                    break;
                }
            }
            Ok(WorkerInbound::Control { command }) => {
                control.send_modify(|state| match command {
                    ControlCommand::Pause => state.paused = true,
                    ControlCommand::Resume => state.paused = false,
                    ControlCommand::Interrupt => state.interrupts += 1,
                    ControlCommand::Shutdown => state.shutdown = true,
                });
            }
            Err(e) => {
                log::warn!("ignoring malformed worker input: {}", e);
            }
        }
    }
}

/// Schedule and execute one job
///
/// Scheduling failures and node failures are reported as status messages,
/// never as loop errors; only pipe I/O can fail this function.
async fn run_job<W>(
    registry: &NodeRegistry,
    target: Option<NodeId>,
    graph: GraphSnapshot,
    control: &mut watch::Receiver<ControlState>,
    output: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let plan = match plan(&graph, target) {
        Ok(plan) => plan,
        Err(e) => {
            send_status(output, &StatusMessage::error(e.to_string())).await?;
            return Ok(());
        }
    };

    let baseline = control.borrow().interrupts;
    let mut outputs: HashMap<NodeId, HashMap<String, serde_json::Value>> = HashMap::new();

    for step in &plan.steps {
        match hold_at_boundary(control, baseline).await {
            Boundary::Proceed => {}
            Boundary::Interrupted => {
                send_status(output, &StatusMessage::warning("Job interrupted.")).await?;
                return Ok(());
            }
            Boundary::Shutdown => return Ok(()),
        }

        match execute_step(registry, &graph, step, &outputs).await {
            Ok(step_outputs) => {
                let rendered = render_outputs(&step_outputs)?;
                send_status(
                    output,
                    &StatusMessage::info(format!(
                        "Node '{}' ({}) completed: {}",
                        step.id, step.node_type, rendered
                    )),
                )
                .await?;
                outputs.insert(step.id, step_outputs);
            }
            Err(e) => {
                send_status(
                    output,
                    &StatusMessage::error(format!(
                        "Node '{}' ({}) raised an exception. {}",
                        step.id, step.node_type, e
                    )),
                )
                .await?;
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Wait out a pause, noticing interrupts and shutdown while held
async fn hold_at_boundary(
    control: &mut watch::Receiver<ControlState>,
    baseline: u64,
) -> Boundary {
    loop {
        let state = *control.borrow();
        if state.shutdown {
            return Boundary::Shutdown;
        }
        if state.interrupts > baseline {
            return Boundary::Interrupted;
        }
        if !state.paused {
            return Boundary::Proceed;
        }
        if control.changed().await.is_err() {
            return Boundary::Shutdown;
        }
    }
}

/// Instantiate one node, gather its inputs, and call it
async fn execute_step(
    registry: &NodeRegistry,
    graph: &GraphSnapshot,
    step: &PlanStep,
    outputs: &HashMap<NodeId, HashMap<String, serde_json::Value>>,
) -> graph_engine::Result<HashMap<String, serde_json::Value>> {
    let node = graph
        .find_node(step.id)
        .ok_or(GraphEngineError::NodeNotFound(step.id))?;
    let instance = registry.instantiate(&step.node_type, &node.values, node.position)?;

    let mut inputs = HashMap::new();
    for binding in &step.bindings {
        let value = outputs
            .get(&binding.source)
            .and_then(|produced| produced.get(&binding.source_port))
            .cloned()
            .ok_or_else(|| GraphEngineError::MissingInput {
                node: step.id,
                port: binding.target_port.clone(),
            })?;
        inputs.insert(binding.target_port.clone(), value);
    }

    instance.call(inputs).await
}

/// Render node outputs with stable key order for the completion message
fn render_outputs(outputs: &HashMap<String, serde_json::Value>) -> Result<String> {
    let ordered: BTreeMap<&String, &serde_json::Value> = outputs.iter().collect();
    Ok(serde_json::to_string(&ordered)?)
}

async fn send_status<W>(output: &mut W, status: &StatusMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = serde_json::to_string(status)?;
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::StatusKind;
    use graph_engine::{GraphBuilder, NodeTemplate, ValueMap};
    use serde_json::json;
    use tokio::io::{BufReader, DuplexStream, Lines};
    use tokio::task::JoinHandle;

    fn test_registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry.register_fn(NodeTemplate::new("Constant", "Constant"), |values, _inputs| {
            let value = values.get("value").cloned().unwrap_or(serde_json::Value::Null);
            Ok(HashMap::from([("out".to_string(), value)]))
        });
        registry.register_fn(NodeTemplate::new("Double", "Double"), |_values, inputs| {
            let x = inputs.get("in").and_then(|v| v.as_f64()).unwrap_or(0.0);
            Ok(HashMap::from([("out".to_string(), json!(x * 2.0))]))
        });
        registry.register_fn(NodeTemplate::new("Explode", "Explode"), |_values, _inputs| {
            Err(GraphEngineError::failed("deliberate failure"))
        });
        Arc::new(registry)
    }

    struct Harness {
        stdin: DuplexStream,
        stdout: Lines<BufReader<DuplexStream>>,
        worker: JoinHandle<Result<()>>,
    }

    impl Harness {
        fn start() -> Self {
            let (stdin_tx, stdin_rx) = tokio::io::duplex(64 * 1024);
            let (stdout_tx, stdout_rx) = tokio::io::duplex(64 * 1024);

            let worker = tokio::spawn(run(
                test_registry(),
                BufReader::new(stdin_rx),
                stdout_tx,
            ));
            Self {
                stdin: stdin_tx,
                stdout: BufReader::new(stdout_rx).lines(),
                worker,
            }
        }

        async fn send(&mut self, message: &WorkerInbound) {
            let mut line = serde_json::to_string(message).unwrap();
            line.push('\n');
            self.stdin.write_all(line.as_bytes()).await.unwrap();
        }

        async fn send_raw(&mut self, line: &str) {
            self.stdin.write_all(line.as_bytes()).await.unwrap();
            self.stdin.write_all(b"\n").await.unwrap();
        }

        async fn next_status(&mut self) -> StatusMessage {
            let line = self.stdout.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn finish(mut self) {
            self.stdin.shutdown().await.unwrap();
            drop(self.stdin);
            self.worker.await.unwrap().unwrap();
            assert!(self.stdout.next_line().await.unwrap().is_none());
        }
    }

    fn constant(value: serde_json::Value) -> ValueMap {
        let mut values = ValueMap::new();
        values.insert("value".to_string(), value);
        values
    }

    #[tokio::test]
    async fn test_executes_job_in_order() {
        let mut harness = Harness::start();
        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node_with_values(1, "Constant", constant(json!(3)))
                    .node(2, "Double")
                    .edge(1, "out", 2, "in")
                    .build(),
            })
            .await;

        let first = harness.next_status().await;
        assert_eq!(first.kind, StatusKind::Info);
        assert_eq!(first.msg, r#"Node '1' (Constant) completed: {"out":3}"#);

        let second = harness.next_status().await;
        assert_eq!(second.msg, r#"Node '2' (Double) completed: {"out":6.0}"#);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_node_failure_aborts_job_only() {
        let mut harness = Harness::start();
        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node_with_values(1, "Constant", constant(json!(1)))
                    .node(2, "Explode")
                    .node(3, "Double")
                    .edge(1, "out", 2, "in")
                    .edge(2, "out", 3, "in")
                    .build(),
            })
            .await;

        let first = harness.next_status().await;
        assert_eq!(first.kind, StatusKind::Info);

        let failure = harness.next_status().await;
        assert_eq!(failure.kind, StatusKind::Error);
        assert_eq!(
            failure.msg,
            "Node '2' (Explode) raised an exception. Node execution failed: deliberate failure"
        );

        // Node 3 never ran; the next job is served normally.
        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node_with_values(7, "Constant", constant(json!("ok")))
                    .build(),
            })
            .await;
        let next = harness.next_status().await;
        assert_eq!(next.msg, r#"Node '7' (Constant) completed: {"out":"ok"}"#);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_cycle_reported_and_loop_survives() {
        let mut harness = Harness::start();
        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node(1, "Double")
                    .node(2, "Double")
                    .edge(1, "out", 2, "in")
                    .edge(2, "out", 1, "in")
                    .build(),
            })
            .await;

        let failure = harness.next_status().await;
        assert_eq!(failure.kind, StatusKind::Error);
        assert_eq!(failure.msg, "Graph contains cycle");

        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node_with_values(1, "Constant", constant(json!(5)))
                    .build(),
            })
            .await;
        let next = harness.next_status().await;
        assert_eq!(next.kind, StatusKind::Info);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_pause_then_interrupt_abandons_job() {
        let mut harness = Harness::start();
        harness
            .send(&WorkerInbound::Control {
                command: ControlCommand::Pause,
            })
            .await;
        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node_with_values(1, "Constant", constant(json!(1)))
                    .node(2, "Double")
                    .edge(1, "out", 2, "in")
                    .build(),
            })
            .await;
        harness
            .send(&WorkerInbound::Control {
                command: ControlCommand::Interrupt,
            })
            .await;

        // Held at the first node boundary, so the interrupt wins before any
        // node runs.
        let interrupted = harness.next_status().await;
        assert_eq!(interrupted.kind, StatusKind::Warning);
        assert_eq!(interrupted.msg, "Job interrupted.");

        harness
            .send(&WorkerInbound::Control {
                command: ControlCommand::Resume,
            })
            .await;
        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node_with_values(4, "Constant", constant(json!(2)))
                    .build(),
            })
            .await;
        let next = harness.next_status().await;
        assert_eq!(next.msg, r#"Node '4' (Constant) completed: {"out":2}"#);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_interrupt_between_jobs_is_noop() {
        let mut harness = Harness::start();
        harness
            .send(&WorkerInbound::Control {
                command: ControlCommand::Interrupt,
            })
            .await;
        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node_with_values(1, "Constant", constant(json!(9)))
                    .build(),
            })
            .await;

        let status = harness.next_status().await;
        assert_eq!(status.kind, StatusKind::Info);
        assert_eq!(status.msg, r#"Node '1' (Constant) completed: {"out":9}"#);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_shutdown_exits_loop() {
        let mut harness = Harness::start();
        harness
            .send(&WorkerInbound::Control {
                command: ControlCommand::Shutdown,
            })
            .await;

        harness.worker.await.unwrap().unwrap();
        assert!(harness.stdout.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let mut harness = Harness::start();
        harness.send_raw("this is not json").await;
        harness
            .send(&WorkerInbound::Job {
                target: None,
                graph: GraphBuilder::new()
                    .node_with_values(1, "Constant", constant(json!(0)))
                    .build(),
            })
            .await;

        let status = harness.next_status().await;
        assert_eq!(status.kind, StatusKind::Info);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_target_scopes_job() {
        let mut harness = Harness::start();
        harness
            .send(&WorkerInbound::Job {
                target: Some(5),
                graph: GraphBuilder::new()
                    .node_with_values(1, "Constant", constant(json!(1)))
                    .node(2, "Double")
                    .node_with_values(5, "Constant", constant(json!(5)))
                    .edge(1, "out", 2, "in")
                    .build(),
            })
            .await;

        // Only the target's component runs, despite the larger one existing.
        let status = harness.next_status().await;
        assert_eq!(status.msg, r#"Node '5' (Constant) completed: {"out":5}"#);

        harness.finish().await;
    }
}
