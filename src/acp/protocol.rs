//! JSON-RPC 2.0 envelope types for the ACP wire.
//!
//! Every line on an agent's stdio is one JSON object that is either a
//! request (`method` + `id`), a notification (`method`, no `id`) or a
//! response (`id` + `result` | `error`). [`RpcMessage::parse`] turns a raw
//! line into one of those shapes; [`RpcMessage::to_value`] does the reverse
//! for the writer task.

use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{AppError, Result};

/// JSON-RPC protocol version carried on every outbound message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist on this side of the connection.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal error while handling a request.
pub const INTERNAL_ERROR: i64 = -32603;
/// ACP: the agent requires authentication before continuing.
pub const AUTH_REQUIRED: i64 = -32000;
/// ACP: a referenced resource (terminal, file) does not exist.
pub const RESOURCE_NOT_FOUND: i64 = -32002;

/// Error object carried in a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Construct an error with no `data` payload.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// `-32601` for a method this client does not implement.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    /// `-32602` for parameters that failed to deserialize.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    /// `-32603` for any other handler failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    /// Whether this error means "authenticate first".
    ///
    /// The dedicated code is authoritative; agents that report the condition
    /// with a generic code are recognised by their message text.
    #[must_use]
    pub fn is_auth_required(&self) -> bool {
        self.code == AUTH_REQUIRED || message_signals_auth_required(&self.message)
    }

    /// Convert into the crate error, lifting auth-required failures into
    /// [`AppError::AuthRequired`].
    #[must_use]
    pub fn into_app_error(self) -> AppError {
        if self.is_auth_required() {
            AppError::AuthRequired(self.message)
        } else {
            AppError::Rpc(self)
        }
    }
}

impl Display for RpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl From<AppError> for RpcError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Rpc(inner) => inner,
            AppError::TerminalNotFound(_) | AppError::SessionNotFound(_) => {
                Self::new(RESOURCE_NOT_FOUND, err.to_string())
            }
            AppError::AuthRequired(msg) => Self::new(AUTH_REQUIRED, msg),
            other => Self::internal(other.to_string()),
        }
    }
}

fn auth_required_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)(auth(entication)?[ _-]?required|not (logged in|authenticated)|unauthori[sz]ed|please (run )?/?log ?in)",
            )
            .ok()
        })
        .as_ref()
}

/// Fallback heuristic for agents that signal missing credentials only in text.
#[must_use]
pub fn message_signals_auth_required(message: &str) -> bool {
    auth_required_pattern().is_some_and(|re| re.is_match(message))
}

/// Request identifier as it appears on the wire.
///
/// Outbound calls always use numbers; inbound requests may use either form
/// and the exact value is echoed back in the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    Str(String),
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Shape of a message, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Has both `method` and `id`.
    Request,
    /// Has `method` but no `id`.
    Notification,
    /// Has `id` and either `result` or `error`.
    Response,
    /// Not valid JSON, or none of the above.
    Unparseable,
}

impl MessageKind {
    /// Classify a raw line without fully decoding it.
    #[must_use]
    pub fn of_line(line: &str) -> Self {
        serde_json::from_str::<Value>(line).map_or(Self::Unparseable, |v| Self::of_value(&v))
    }

    /// Classify an already-parsed JSON value.
    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Unparseable;
        };
        let has_method = obj.get("method").is_some_and(Value::is_string);
        let has_id = obj.get("id").is_some_and(|id| !id.is_null());
        let has_outcome = obj.contains_key("result") || obj.contains_key("error");

        match (has_method, has_id) {
            (true, true) => Self::Request,
            (true, false) => Self::Notification,
            (false, true) if has_outcome => Self::Response,
            _ => Self::Unparseable,
        }
    }

    /// Lower-case label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Notification => "notification",
            Self::Response => "response",
            Self::Unparseable => "unparseable",
        }
    }
}

/// One decoded JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    /// A call expecting a response.
    Request {
        /// Correlation id.
        id: RequestId,
        /// Method name.
        method: String,
        /// Parameters; `null` when absent.
        params: Value,
    },
    /// A fire-and-forget message.
    Notification {
        /// Method name.
        method: String,
        /// Parameters; `null` when absent.
        params: Value,
    },
    /// The answer to an earlier request.
    Response {
        /// Id of the request being answered.
        id: RequestId,
        /// `Ok(result)` or `Err(error)`.
        outcome: std::result::Result<Value, RpcError>,
    },
}

impl RpcMessage {
    /// Parse one NDJSON line.
    ///
    /// Returns `Ok(None)` for blank lines.
    ///
    /// # Errors
    ///
    /// - [`AppError::Acp`]`("malformed json: …")` if the line is not JSON.
    /// - [`AppError::Acp`]`("unrecognised message shape …")` for valid JSON that
    ///   is neither a request, a notification nor a response.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(trimmed)?;
        Self::from_value(value).map(Some)
    }

    /// Decode an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Acp`] when the value has no recognised shape.
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = MessageKind::of_value(&value);
        let Value::Object(mut obj) = value else {
            return Err(AppError::Acp("message is not a JSON object".into()));
        };

        match kind {
            MessageKind::Request => Ok(Self::Request {
                id: take_id(&mut obj)?,
                method: take_method(&mut obj),
                params: obj.remove("params").unwrap_or(Value::Null),
            }),
            MessageKind::Notification => Ok(Self::Notification {
                method: take_method(&mut obj),
                params: obj.remove("params").unwrap_or(Value::Null),
            }),
            MessageKind::Response => {
                let id = take_id(&mut obj)?;
                let outcome = match obj.remove("error") {
                    Some(err) if !err.is_null() => Err(serde_json::from_value(err.clone())
                        .unwrap_or_else(|_| RpcError {
                            code: INTERNAL_ERROR,
                            message: "agent returned a malformed error object".into(),
                            data: Some(err),
                        })),
                    _ => Ok(obj.remove("result").unwrap_or(Value::Null)),
                };
                Ok(Self::Response { id, outcome })
            }
            MessageKind::Unparseable => Err(AppError::Acp(format!(
                "unrecognised message shape: {}",
                Value::Object(obj)
            ))),
        }
    }

    /// Serialise into the JSON-RPC 2.0 wire object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Request { id, method, params } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "method": method,
                "params": params,
            }),
            Self::Notification { method, params } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": method,
                "params": params,
            }),
            Self::Response {
                id,
                outcome: Ok(result),
            } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "result": result,
            }),
            Self::Response {
                id,
                outcome: Err(error),
            } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "error": error,
            }),
        }
    }
}

fn take_id(obj: &mut Map<String, Value>) -> Result<RequestId> {
    let raw = obj.remove("id").unwrap_or(Value::Null);
    serde_json::from_value(raw).map_err(|e| AppError::Acp(format!("invalid request id: {e}")))
}

fn take_method(obj: &mut Map<String, Value>) -> String {
    match obj.remove("method") {
        Some(Value::String(method)) => method,
        _ => String::new(),
    }
}
