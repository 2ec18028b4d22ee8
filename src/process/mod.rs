//! Child process management.
//!
//! - `supervisor`: agent process table, stderr capture, lifecycle events.
//! - `shell`: login-shell and `cmd.exe` command construction.
//! - `exit`: graceful termination and exit-status decoding.

pub mod exit;
pub mod shell;
pub mod supervisor;

pub use supervisor::{AgentProcessHandle, ProcessEvent, ProcessSupervisor, SpawnedAgent};
