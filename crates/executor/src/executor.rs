//! Parent-side worker supervision
//!
//! One [`Executor`] owns one worker process bound to one compute device. It
//! feeds jobs and control messages to the worker's stdin and relays the
//! worker's status lines into the parent's log, tagged with device and pid.
//!
//! Worker lifecycle: `Created -> Running -> (Stopped | Crashed)`. A worker
//! that exits while the executor is not shutting down is marked `Crashed`
//! and logged once at error level; there is no automatic restart, and
//! further submissions fail until a new executor is spawned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use graph_engine::{GraphSnapshot, NodeId};

use crate::error::{ExecutorError, Result};
use crate::ipc::{ControlCommand, StatusKind, StatusMessage, WorkerInbound};
use crate::process::{ProcessEvent, ProcessHandle, ProcessSpawner};

/// How long cleanup waits for the worker to exit before killing it
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle state of one worker process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Stopped,
    Crashed,
}

/// Supervisor for one worker process
pub struct Executor {
    device: String,
    pid: u32,
    handle: Box<dyn ProcessHandle>,
    state: Arc<Mutex<WorkerState>>,
    shutting_down: Arc<AtomicBool>,
    relay: JoinHandle<()>,
}

impl Executor {
    /// Spawn a worker bound to one device and start relaying its output
    pub async fn spawn(
        spawner: &dyn ProcessSpawner,
        program: &str,
        device: &str,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(WorkerState::Created));
        let shutting_down = Arc::new(AtomicBool::new(false));

        let (rx, handle) = spawner
            .spawn(program, &["--device", device])
            .await
            .map_err(|e| ExecutorError::Spawn(program.to_string(), e))?;
        let pid = handle.pid();

        *state.lock() = WorkerState::Running;
        let relay = tokio::spawn(relay_events(
            rx,
            device.to_string(),
            pid,
            state.clone(),
            shutting_down.clone(),
        ));
        log::info!("[{}]({}) :: worker started", device, pid);

        Ok(Self {
            device: device.to_string(),
            pid,
            handle,
            state,
            shutting_down,
            relay,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Queue one job; strict FIFO, no backlog limit
    pub fn enqueue(&self, target: Option<NodeId>, graph: GraphSnapshot) -> Result<()> {
        self.send(&WorkerInbound::Job { target, graph })
    }

    /// Hold the worker at its next node boundary
    pub fn pause(&self) -> Result<()> {
        self.send(&WorkerInbound::Control {
            command: ControlCommand::Pause,
        })
    }

    /// Continue a paused worker
    pub fn resume(&self) -> Result<()> {
        self.send(&WorkerInbound::Control {
            command: ControlCommand::Resume,
        })
    }

    /// Abandon the current job, keeping the worker alive
    pub fn interrupt(&self) -> Result<()> {
        self.send(&WorkerInbound::Control {
            command: ControlCommand::Interrupt,
        })
    }

    fn send(&self, message: &WorkerInbound) -> Result<()> {
        if self.state() != WorkerState::Running {
            return Err(ExecutorError::WorkerGone(self.device.clone()));
        }
        let line = serde_json::to_string(message)?;
        self.handle
            .write_line(line)
            .map_err(|_| ExecutorError::WorkerGone(self.device.clone()))
    }

    /// Orderly shutdown: ask the worker to exit, then escalate to kill
    ///
    /// Sends a shutdown control message, closes the worker's stdin, and
    /// waits up to [`SHUTDOWN_TIMEOUT`] for the process to exit before
    /// killing it. Queued jobs the worker has not started are dropped.
    pub async fn cleanup(mut self) -> Result<()> {
        self.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.send(&WorkerInbound::Control {
            command: ControlCommand::Shutdown,
        });
        self.handle.close_stdin();

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut self.relay)
            .await
            .is_err()
        {
            log::warn!(
                "[{}]({}) :: worker did not exit in time, killing",
                self.device,
                self.pid
            );
            let _ = self.handle.kill();
            let _ = (&mut self.relay).await;
        }
        Ok(())
    }
}

/// Drain process events, logging status lines and tracking termination
async fn relay_events(
    mut rx: mpsc::Receiver<ProcessEvent>,
    device: String,
    pid: u32,
    state: Arc<Mutex<WorkerState>>,
    shutting_down: Arc<AtomicBool>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            ProcessEvent::Stdout(line) => match serde_json::from_str::<StatusMessage>(&line) {
                Ok(status) => {
                    let text = format!("[{}]({}) :: {}", device, pid, status.msg);
                    match status.kind {
                        StatusKind::Info => log::info!("{}", text),
                        StatusKind::Warning => log::warn!("{}", text),
                        StatusKind::Error => log::error!("{}", text),
                    }
                }
                Err(_) => {
                    log::warn!("[{}]({}) :: unparsed worker output: {}", device, pid, line);
                }
            },
            ProcessEvent::Stderr(line) => {
                log::warn!("[{}]({}) :: {}", device, pid, line);
            }
            ProcessEvent::Error(e) => {
                log::error!("[{}]({}) :: {}", device, pid, e);
                *state.lock() = WorkerState::Crashed;
                break;
            }
            ProcessEvent::Terminated(code) => {
                if shutting_down.load(Ordering::SeqCst) {
                    log::info!("[{}]({}) :: worker exited with status {:?}", device, pid, code);
                    *state.lock() = WorkerState::Stopped;
                } else {
                    log::error!(
                        "[{}]({}) :: worker exited unexpectedly with status {:?}",
                        device,
                        pid,
                        code
                    );
                    *state.lock() = WorkerState::Crashed;
                }
                break;
            }
        }
    }
}
