//! Capabilities the client offers to agents.
//!
//! - `router`: inbound method dispatch and session-update fan-out.
//! - `fs`: file reads and writes with unsaved-buffer overlay.
//! - `terminal`: agent-created command terminals.
//! - `permission`: FIFO permission prompts with auto-approve.

pub mod fs;
pub mod permission;
pub mod router;
pub mod terminal;

pub use router::{ClientCapabilityRouter, SessionUpdateListener};
