//! Executor - supervised worker processes for Trellis
//!
//! This crate owns everything on both sides of the job pipe:
//!
//! - A process spawning abstraction so supervision is testable without real
//!   child processes
//! - The parent-side `Executor`: one worker per compute device, fed over
//!   stdin, its status lines relayed into the parent's log
//! - The worker-side job loop: schedule, execute, report, survive node
//!   failures
//! - The line-delimited JSON wire types shared by both sides
//!
//! # Example
//!
//! ```ignore
//! use executor::{Executor, TokioProcessSpawner};
//!
//! let executor = Executor::spawn(&TokioProcessSpawner, "trellis-worker", "cpu:0").await?;
//! executor.enqueue(Some(target), store.snapshot())?;
//! // ...
//! executor.cleanup().await?;
//! ```

pub mod error;
pub mod executor;
pub mod ipc;
pub mod process;
pub mod worker;

// Re-export key types
pub use error::{ExecutorError, Result};
pub use executor::{Executor, WorkerState};
pub use ipc::{ControlCommand, StatusKind, StatusMessage, WorkerInbound};
pub use process::{ProcessEvent, ProcessHandle, ProcessSpawner, TokioProcessSpawner};
