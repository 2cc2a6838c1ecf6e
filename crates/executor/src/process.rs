//! Process spawning abstraction
//!
//! A trait seam between the executor and the OS so worker supervision can be
//! tested without real child processes. [`TokioProcessSpawner`] is the
//! production implementation on `tokio::process`; tests substitute a mock
//! spawner that scripts [`ProcessEvent`]s and captures written lines.
//!
//! # Example
//!
//! ```rust,ignore
//! use executor::process::{ProcessSpawner, TokioProcessSpawner};
//!
//! let spawner = TokioProcessSpawner;
//! let (mut rx, handle) = spawner.spawn("trellis-worker", &["--device", "cpu:0"]).await?;
//!
//! handle.write_line(job_json)?;
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         ProcessEvent::Stdout(line) => println!("worker says: {}", line),
//!         ProcessEvent::Terminated(code) => break,
//!         _ => {}
//!     }
//! }
//! ```

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Output event from a spawned process
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// One line written to stdout
    Stdout(String),
    /// One line written to stderr
    Stderr(String),
    /// Process error (e.g., wait failed)
    Error(String),
    /// Process terminated with optional exit code
    Terminated(Option<i32>),
}

/// Handle to a spawned process
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID
    fn pid(&self) -> u32;
    /// Write one line to the process's stdin
    fn write_line(&self, line: String) -> Result<(), String>;
    /// Close the process's stdin, delivering EOF
    fn close_stdin(&self);
    /// Kill the process
    fn kill(&self) -> Result<(), String>;
}

/// Trait for spawning worker processes
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Spawn a process with piped stdin/stdout/stderr
    ///
    /// Returns the event receiver and a handle for writing and killing.
    /// Stdout and stderr are delivered line by line.
    async fn spawn(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<(mpsc::Receiver<ProcessEvent>, Box<dyn ProcessHandle>), String>;
}

// ============================================================================
// Tokio process spawner
// ============================================================================

mod tokio_process {
    use super::*;
    use std::process::Stdio;

    use parking_lot::Mutex;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::process::Command;
    use tokio::sync::oneshot;

    /// Handle backed by channels into the child's I/O tasks
    struct TokioProcessHandle {
        pid: u32,
        stdin_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
        kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    }

    impl ProcessHandle for TokioProcessHandle {
        fn pid(&self) -> u32 {
            self.pid
        }

        fn write_line(&self, line: String) -> Result<(), String> {
            match self.stdin_tx.lock().as_ref() {
                Some(tx) => tx.send(line).map_err(|_| "worker stdin closed".to_string()),
                None => Err("worker stdin closed".to_string()),
            }
        }

        fn close_stdin(&self) {
            // Dropping the sender ends the writer task, which drops the pipe.
            self.stdin_tx.lock().take();
        }

        fn kill(&self) -> Result<(), String> {
            if let Some(tx) = self.kill_tx.lock().take() {
                let _ = tx.send(());
            }
            Ok(())
        }
    }

    /// Process spawner using `tokio::process`
    pub struct TokioProcessSpawner;

    #[async_trait]
    impl ProcessSpawner for TokioProcessSpawner {
        async fn spawn(
            &self,
            program: &str,
            args: &[&str],
        ) -> Result<(mpsc::Receiver<ProcessEvent>, Box<dyn ProcessHandle>), String> {
            let mut child = Command::new(program)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| format!("Failed to spawn {}: {}", program, e))?;

            let pid = child.id().unwrap_or(0);
            let stdin = child.stdin.take();
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let (tx, rx) = mpsc::channel(100);
            let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
            let (kill_tx, kill_rx) = oneshot::channel::<()>();

            // Stdin writer: one line per queued message, pipe closed when the
            // last sender is dropped.
            if let Some(mut stdin) = stdin {
                tokio::spawn(async move {
                    while let Some(line) = stdin_rx.recv().await {
                        if stdin.write_all(line.as_bytes()).await.is_err() {
                            break;
                        }
                        if stdin.write_all(b"\n").await.is_err() {
                            break;
                        }
                        if stdin.flush().await.is_err() {
                            break;
                        }
                    }
                });
            }

            // Stdout reader
            if let Some(stdout) = stdout {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let _ = tx.send(ProcessEvent::Stdout(line)).await;
                    }
                });
            }

            // Stderr reader
            if let Some(stderr) = stderr {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let _ = tx.send(ProcessEvent::Stderr(line)).await;
                    }
                });
            }

            // Monitor: waits for exit, or kills on request and then waits.
            tokio::spawn(async move {
                tokio::select! {
                    status = child.wait() => match status {
                        Ok(status) => {
                            let _ = tx.send(ProcessEvent::Terminated(status.code())).await;
                        }
                        Err(e) => {
                            let _ = tx.send(ProcessEvent::Error(format!("Wait error: {}", e))).await;
                        }
                    },
                    _ = kill_rx => {
                        let _ = child.start_kill();
                        match child.wait().await {
                            Ok(status) => {
                                let _ = tx.send(ProcessEvent::Terminated(status.code())).await;
                            }
                            Err(e) => {
                                let _ = tx.send(ProcessEvent::Error(format!("Wait error: {}", e))).await;
                            }
                        }
                    }
                }
            });

            let handle = TokioProcessHandle {
                pid,
                stdin_tx: Mutex::new(Some(stdin_tx)),
                kill_tx: Mutex::new(Some(kill_tx)),
            };

            Ok((rx, Box::new(handle)))
        }
    }
}

pub use tokio_process::TokioProcessSpawner;
