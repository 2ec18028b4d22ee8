//! Typed ACP payloads used by the client core.
//!
//! Only the messages this crate sends or handles are modelled; anything the
//! agent adds beyond these fields is ignored on decode. Field names follow
//! the camelCase wire format.

use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

// ── Method names ─────────────────────────────────────────────────────────────

/// Client → agent: protocol handshake.
pub const METHOD_INITIALIZE: &str = "initialize";
/// Client → agent: authenticate with an advertised method.
pub const METHOD_AUTHENTICATE: &str = "authenticate";
/// Client → agent: create a session.
pub const METHOD_SESSION_NEW: &str = "session/new";
/// Client → agent: run a prompt turn.
pub const METHOD_SESSION_PROMPT: &str = "session/prompt";
/// Client → agent (notification): cancel the running turn.
pub const METHOD_SESSION_CANCEL: &str = "session/cancel";
/// Client → agent: switch the session mode.
pub const METHOD_SESSION_SET_MODE: &str = "session/set_mode";
/// Client → agent: switch the session model.
pub const METHOD_SESSION_SET_MODEL: &str = "session/set_model";

/// Agent → client: ask the user to allow a tool call.
pub const METHOD_REQUEST_PERMISSION: &str = "session/request_permission";
/// Agent → client (notification): streamed session progress.
pub const METHOD_SESSION_UPDATE: &str = "session/update";
/// Agent → client: read a text file.
pub const METHOD_FS_READ: &str = "fs/read_text_file";
/// Agent → client: write a text file.
pub const METHOD_FS_WRITE: &str = "fs/write_text_file";
/// Agent → client: start a terminal command.
pub const METHOD_TERMINAL_CREATE: &str = "terminal/create";
/// Agent → client: read terminal output.
pub const METHOD_TERMINAL_OUTPUT: &str = "terminal/output";
/// Agent → client: wait for a terminal command to exit.
pub const METHOD_TERMINAL_WAIT: &str = "terminal/wait_for_exit";
/// Agent → client: kill a terminal command.
pub const METHOD_TERMINAL_KILL: &str = "terminal/kill";
/// Agent → client: release a terminal.
pub const METHOD_TERMINAL_RELEASE: &str = "terminal/release";

/// Protocol version this client speaks.
pub const PROTOCOL_VERSION: u16 = 1;

// ── Handshake ────────────────────────────────────────────────────────────────

/// Name and version of a protocol participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    /// Programmatic name.
    pub name: String,
    /// Version string.
    #[serde(default)]
    pub version: String,
    /// Optional display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// File-system capabilities offered to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemCapability {
    /// `fs/read_text_file` is available.
    pub read_text_file: bool,
    /// `fs/write_text_file` is available.
    pub write_text_file: bool,
}

/// Capabilities this client declares during `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// File-system methods.
    pub fs: FileSystemCapability,
    /// `terminal/*` methods are available.
    pub terminal: bool,
}

impl ClientCapabilities {
    /// Every capability the router implements.
    #[must_use]
    pub fn all() -> Self {
        Self {
            fs: FileSystemCapability {
                read_text_file: true,
                write_text_file: true,
            },
            terminal: true,
        }
    }
}

/// `initialize` parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Protocol version requested by the client.
    pub protocol_version: u16,
    /// Declared client capabilities.
    pub client_capabilities: ClientCapabilities,
    /// Client identification.
    pub client_info: Implementation,
}

/// An authentication method advertised by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMethod {
    /// Id passed back in `authenticate`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `initialize` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    /// Protocol version the agent agreed to.
    #[serde(default)]
    pub protocol_version: u16,
    /// Agent capabilities, kept opaque.
    #[serde(default)]
    pub agent_capabilities: Value,
    /// Authentication methods the agent supports.
    #[serde(default)]
    pub auth_methods: Vec<AuthMethod>,
    /// Agent identification, when provided.
    #[serde(default)]
    pub agent_info: Option<Implementation>,
}

/// `authenticate` parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    /// One of the advertised [`AuthMethod::id`] values.
    pub method_id: String,
}

// ── Sessions ─────────────────────────────────────────────────────────────────

/// `session/new` parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    /// Working directory for the session.
    pub cwd: PathBuf,
    /// MCP servers to attach; this client never attaches any.
    pub mcp_servers: Vec<Value>,
}

/// A mode the agent can operate in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMode {
    /// Mode id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Current and available modes for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionModeState {
    /// Mode in effect.
    pub current_mode_id: String,
    /// Modes the agent offers.
    #[serde(default)]
    pub available_modes: Vec<SessionMode>,
}

/// A model the agent can run the session on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model id.
    pub model_id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Current and available models for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionModelState {
    /// Model in effect.
    pub current_model_id: String,
    /// Models the agent offers.
    #[serde(default)]
    pub available_models: Vec<ModelInfo>,
}

/// `session/new` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    /// Agent-issued session id.
    pub session_id: String,
    /// Mode state, if the agent supports modes.
    #[serde(default)]
    pub modes: Option<SessionModeState>,
    /// Model state, if the agent supports model selection.
    #[serde(default)]
    pub models: Option<SessionModelState>,
}

/// A content block in prompts and streamed chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Base64 image.
    #[serde(rename_all = "camelCase")]
    Image {
        /// Base64 data.
        data: String,
        /// MIME type.
        mime_type: String,
    },
    /// Base64 audio.
    #[serde(rename_all = "camelCase")]
    Audio {
        /// Base64 data.
        data: String,
        /// MIME type.
        mime_type: String,
    },
    /// Link to a resource the agent can fetch.
    ResourceLink {
        /// Resource URI.
        uri: String,
        /// Display name.
        name: String,
    },
    /// Embedded resource, kept opaque.
    Resource {
        /// Resource payload.
        resource: Value,
    },
    /// A block type this client does not know.
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    /// Build a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text of a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// `session/prompt` parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Target session.
    pub session_id: String,
    /// Prompt content.
    pub prompt: Vec<ContentBlock>,
}

/// Token usage reported at the end of a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Input tokens.
    #[serde(default)]
    pub input_tokens: Option<u64>,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: Option<u64>,
    /// Total tokens.
    #[serde(default)]
    pub total_tokens: Option<u64>,
    /// Any other counters the agent reports.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `session/prompt` result: how the turn ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    /// `end_turn`, `max_tokens`, `max_turn_requests`, `refusal`, `cancelled`, …
    pub stop_reason: String,
    /// Usage metadata, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// `session/cancel` parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelNotification {
    /// Session whose turn to cancel.
    pub session_id: String,
}

/// `session/set_mode` parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionModeRequest {
    /// Target session.
    pub session_id: String,
    /// Mode to switch to.
    pub mode_id: String,
}

/// `session/set_model` parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionModelRequest {
    /// Target session.
    pub session_id: String,
    /// Model to switch to.
    pub model_id: String,
}

// ── Permissions ──────────────────────────────────────────────────────────────

/// What choosing an option means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOptionKind {
    /// Allow this one call.
    AllowOnce,
    /// Allow this and future calls.
    AllowAlways,
    /// Reject this one call.
    RejectOnce,
    /// Reject this and future calls.
    RejectAlways,
    /// A kind this client does not know.
    #[serde(other)]
    Other,
}

impl PermissionOptionKind {
    /// Whether the option grants permission.
    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::AllowOnce | Self::AllowAlways)
    }
}

/// One choice offered by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOption {
    /// Id echoed back in the outcome.
    pub option_id: String,
    /// Display label.
    pub name: String,
    /// Option semantics.
    pub kind: PermissionOptionKind,
}

/// `session/request_permission` parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPermissionRequest {
    /// Session the tool call belongs to.
    pub session_id: String,
    /// The tool call awaiting approval, kept opaque.
    #[serde(default)]
    pub tool_call: Value,
    /// Choices to present.
    pub options: Vec<PermissionOption>,
}

impl RequestPermissionRequest {
    /// Title of the tool call, when the agent supplied one.
    #[must_use]
    pub fn tool_title(&self) -> Option<&str> {
        self.tool_call.get("title").and_then(Value::as_str)
    }
}

/// Resolution of a permission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PermissionOutcome {
    /// The user (or policy) picked an option.
    Selected {
        /// The chosen [`PermissionOption::option_id`].
        #[serde(rename = "optionId")]
        option_id: String,
    },
    /// Nothing was chosen.
    Cancelled,
}

/// `session/request_permission` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPermissionResponse {
    /// The outcome.
    pub outcome: PermissionOutcome,
}

// ── File system ──────────────────────────────────────────────────────────────

/// `fs/read_text_file` parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileRequest {
    /// Requesting session.
    #[serde(default)]
    pub session_id: String,
    /// Absolute path.
    pub path: PathBuf,
    /// 1-based first line to return.
    #[serde(default)]
    pub line: Option<u32>,
    /// Maximum number of lines.
    #[serde(default)]
    pub limit: Option<u32>,
}

/// `fs/read_text_file` result.
#[derive(Debug, Clone, Serialize)]
pub struct ReadTextFileResponse {
    /// File content, sliced as requested.
    pub content: String,
}

/// `fs/write_text_file` parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTextFileRequest {
    /// Requesting session.
    #[serde(default)]
    pub session_id: String,
    /// Absolute path.
    pub path: PathBuf,
    /// New content.
    pub content: String,
}

// ── Terminals ────────────────────────────────────────────────────────────────

/// An environment variable for a terminal command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// `terminal/create` parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTerminalRequest {
    /// Requesting session.
    #[serde(default)]
    pub session_id: String,
    /// Command to run.
    pub command: String,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment.
    #[serde(default)]
    pub env: Vec<EnvVariable>,
    /// Working directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Output cap in bytes.
    #[serde(default)]
    pub output_byte_limit: Option<usize>,
}

/// `terminal/create` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTerminalResponse {
    /// Id for follow-up terminal calls.
    pub terminal_id: String,
}

/// Parameters shared by output / wait / kill / release.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalRequest {
    /// Requesting session.
    #[serde(default)]
    pub session_id: String,
    /// Target terminal.
    pub terminal_id: String,
}

/// How a terminal command ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalExitStatus {
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Signal name, when the process was killed by a signal.
    pub signal: Option<String>,
}

/// `terminal/output` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalOutputResponse {
    /// Buffered output.
    pub output: String,
    /// Whether the head of the output was discarded.
    pub truncated: bool,
    /// Present once the command has exited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<TerminalExitStatus>,
}

// ── Session updates ──────────────────────────────────────────────────────────

/// A streamed content chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// The chunk.
    pub content: ContentBlock,
}

/// Execution status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Not started.
    Pending,
    /// Running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// A status this client does not know.
    #[serde(other)]
    Unknown,
}

/// A tool call the agent reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Tool call id.
    pub tool_call_id: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Tool category (`read`, `edit`, `execute`, …).
    #[serde(default)]
    pub kind: Option<String>,
    /// Status.
    #[serde(default)]
    pub status: Option<ToolCallStatus>,
    /// Produced content, kept opaque.
    #[serde(default)]
    pub content: Vec<Value>,
    /// Affected file locations, kept opaque.
    #[serde(default)]
    pub locations: Vec<Value>,
    /// Raw tool input.
    #[serde(default)]
    pub raw_input: Option<Value>,
    /// Raw tool output.
    #[serde(default)]
    pub raw_output: Option<Value>,
}

/// A partial update to a previously reported tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdate {
    /// Tool call id.
    pub tool_call_id: String,
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New kind.
    #[serde(default)]
    pub kind: Option<String>,
    /// New status.
    #[serde(default)]
    pub status: Option<ToolCallStatus>,
    /// Replacement content.
    #[serde(default)]
    pub content: Option<Vec<Value>>,
    /// Replacement locations.
    #[serde(default)]
    pub locations: Option<Vec<Value>>,
    /// Raw tool output.
    #[serde(default)]
    pub raw_output: Option<Value>,
}

/// One step of the agent's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Step description.
    pub content: String,
    /// `high`, `medium` or `low`.
    #[serde(default)]
    pub priority: String,
    /// `pending`, `in_progress` or `completed`.
    #[serde(default)]
    pub status: String,
}

/// The agent's full current plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan steps.
    pub entries: Vec<PlanEntry>,
}

/// The agent switched modes on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentModeUpdate {
    /// New mode id.
    pub current_mode_id: String,
}

/// A slash command the agent accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableCommand {
    /// Command name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Input hint, kept opaque.
    #[serde(default)]
    pub input: Option<Value>,
}

/// The set of available commands changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCommandsUpdate {
    /// All currently available commands.
    pub available_commands: Vec<AvailableCommand>,
}

/// A `session/update` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Echo of user input.
    UserMessageChunk(ContentChunk),
    /// Agent response text.
    AgentMessageChunk(ContentChunk),
    /// Agent reasoning text.
    AgentThoughtChunk(ContentChunk),
    /// A new tool call.
    ToolCall(ToolCall),
    /// Progress on a tool call.
    ToolCallUpdate(ToolCallUpdate),
    /// The agent's plan.
    Plan(Plan),
    /// Mode switched by the agent.
    CurrentModeUpdate(CurrentModeUpdate),
    /// Available slash commands changed.
    AvailableCommandsUpdate(AvailableCommandsUpdate),
    /// An update kind this client does not model, or a known kind whose
    /// payload does not match its typed shape. The raw payload is kept.
    Unknown {
        /// Value of the `sessionUpdate` discriminator.
        kind: String,
        /// Complete update object.
        raw: Value,
    },
}

impl SessionUpdate {
    /// The `sessionUpdate` discriminator for this variant.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::UserMessageChunk(_) => "user_message_chunk",
            Self::AgentMessageChunk(_) => "agent_message_chunk",
            Self::AgentThoughtChunk(_) => "agent_thought_chunk",
            Self::ToolCall(_) => "tool_call",
            Self::ToolCallUpdate(_) => "tool_call_update",
            Self::Plan(_) => "plan",
            Self::CurrentModeUpdate(_) => "current_mode_update",
            Self::AvailableCommandsUpdate(_) => "available_commands_update",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
enum TaggedUpdate {
    UserMessageChunk(ContentChunk),
    AgentMessageChunk(ContentChunk),
    AgentThoughtChunk(ContentChunk),
    ToolCall(ToolCall),
    ToolCallUpdate(ToolCallUpdate),
    Plan(Plan),
    CurrentModeUpdate(CurrentModeUpdate),
    AvailableCommandsUpdate(AvailableCommandsUpdate),
}

const KNOWN_UPDATE_KINDS: &[&str] = &[
    "user_message_chunk",
    "agent_message_chunk",
    "agent_thought_chunk",
    "tool_call",
    "tool_call_update",
    "plan",
    "current_mode_update",
    "available_commands_update",
];

impl<'de> Deserialize<'de> for SessionUpdate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let kind = raw
            .get("sessionUpdate")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::missing_field("sessionUpdate"))?
            .to_owned();

        if !KNOWN_UPDATE_KINDS.contains(&kind.as_str()) {
            return Ok(Self::Unknown { kind, raw });
        }

        let tagged = match serde_json::from_value::<TaggedUpdate>(raw.clone()) {
            Ok(tagged) => tagged,
            Err(err) => {
                debug!(kind, %err, "session update does not match its typed shape, keeping it raw");
                return Ok(Self::Unknown { kind, raw });
            }
        };
        Ok(match tagged {
            TaggedUpdate::UserMessageChunk(c) => Self::UserMessageChunk(c),
            TaggedUpdate::AgentMessageChunk(c) => Self::AgentMessageChunk(c),
            TaggedUpdate::AgentThoughtChunk(c) => Self::AgentThoughtChunk(c),
            TaggedUpdate::ToolCall(c) => Self::ToolCall(c),
            TaggedUpdate::ToolCallUpdate(c) => Self::ToolCallUpdate(c),
            TaggedUpdate::Plan(c) => Self::Plan(c),
            TaggedUpdate::CurrentModeUpdate(c) => Self::CurrentModeUpdate(c),
            TaggedUpdate::AvailableCommandsUpdate(c) => Self::AvailableCommandsUpdate(c),
        })
    }
}

/// `session/update` parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
    /// Session the update belongs to.
    pub session_id: String,
    /// The update.
    pub update: SessionUpdate,
}
