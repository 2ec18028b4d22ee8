//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

use crate::acp::protocol::RpcError;

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering every failure mode of the client core.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The agent process could not be started.
    Spawn(String),
    /// Handshake or transport failure on an agent connection.
    Connection(String),
    /// Framing or malformed-message failure on the NDJSON stream.
    Acp(String),
    /// The agent answered a call with a JSON-RPC error.
    Rpc(RpcError),
    /// The agent requires authentication before creating a session.
    AuthRequired(String),
    /// Authentication is required but the agent advertised no methods.
    NoAuthMethods(String),
    /// The user declined or dismissed the authentication prompt.
    AuthCancelled(String),
    /// The agent rejected authentication, or a session still could not be created.
    AuthFailed(String),
    /// No live session with the given identifier.
    SessionNotFound(String),
    /// No managed terminal with the given identifier.
    TerminalNotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Connection(msg) => write!(f, "connection: {msg}"),
            Self::Acp(msg) => write!(f, "acp: {msg}"),
            Self::Rpc(err) => write!(f, "rpc: {err}"),
            Self::AuthRequired(msg) => write!(f, "auth required: {msg}"),
            Self::NoAuthMethods(msg) => write!(f, "no auth methods: {msg}"),
            Self::AuthCancelled(msg) => write!(f, "auth cancelled: {msg}"),
            Self::AuthFailed(msg) => write!(f, "auth failed: {msg}"),
            Self::SessionNotFound(msg) => write!(f, "session not found: {msg}"),
            Self::TerminalNotFound(msg) => write!(f, "terminal not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Acp(format!("malformed json: {err}"))
    }
}
