#![forbid(unsafe_code)]

//! Client-side runtime for the Agent Client Protocol.
//!
//! Spawns coding-agent subprocesses, speaks NDJSON JSON-RPC with them over
//! stdio and brokers their file, terminal and permission requests back to
//! the host. [`coordinator::SessionCoordinator`] is the entry point.

pub mod acp;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod models;
pub mod process;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
