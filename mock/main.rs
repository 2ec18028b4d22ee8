#![forbid(unsafe_code)]

//! `mock-acp-agent`: a scriptable ACP agent for integration tests.
//!
//! Behaviour is driven by environment variables:
//!
//! | Variable              | Effect                                              |
//! |-----------------------|-----------------------------------------------------|
//! | `MOCK_EXIT_CODE`      | exit immediately with this code                     |
//! | `MOCK_AUTH_METHODS`   | comma-separated `id` or `id:name` auth methods      |
//! | `MOCK_REQUIRE_AUTH`   | `session/new` fails with auth-required until authenticated |
//! | `MOCK_REJECT_AUTH`    | `authenticate` always fails                         |
//! | `MOCK_SESSION_ID`     | fixed session id                                    |
//! | `MOCK_TERMINAL_LIMIT` | `outputByteLimit` for the `terminal` prompt command |
//!
//! Prompt text is interpreted as a command:
//!
//! - `permission` asks the client for permission and echoes the outcome;
//! - `read <path>` / `write <path> <content>` use the client file system;
//! - `terminal <command line>` runs a client terminal and echoes its output;
//! - `mode <id>` announces an agent-initiated mode switch;
//! - `exit` terminates the process without answering;
//! - anything else is echoed back.

use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_link::acp::protocol::{RpcError, AUTH_REQUIRED};
use agent_link::acp::rpc::{HandlerFuture, InboundHandler, RpcConnection};

type HandlerResult = std::result::Result<Value, RpcError>;

struct MockAgent {
    rpc: OnceLock<RpcConnection>,
    auth_methods: Vec<Value>,
    require_auth: bool,
    reject_auth: bool,
    fixed_session_id: Option<String>,
    terminal_limit: Option<u64>,
    authenticated: AtomicBool,
    cancelled: AtomicBool,
    sessions: AtomicU64,
}

impl MockAgent {
    fn from_env() -> Self {
        let auth_methods = env::var("MOCK_AUTH_METHODS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|entry| {
                        let (id, name) = entry.split_once(':').unwrap_or((entry, entry));
                        json!({ "id": id, "name": name })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            rpc: OnceLock::new(),
            auth_methods,
            require_auth: flag("MOCK_REQUIRE_AUTH"),
            reject_auth: flag("MOCK_REJECT_AUTH"),
            fixed_session_id: env::var("MOCK_SESSION_ID").ok(),
            terminal_limit: env::var("MOCK_TERMINAL_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok()),
            authenticated: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            sessions: AtomicU64::new(0),
        }
    }

    async fn handle(&self, method: &str, params: Value) -> HandlerResult {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": 1,
                "agentCapabilities": { "loadSession": false },
                "authMethods": self.auth_methods,
                "agentInfo": { "name": "mock-acp-agent", "version": env!("CARGO_PKG_VERSION") },
            })),

            "authenticate" => {
                if self.reject_auth {
                    return Err(RpcError::internal("credentials rejected"));
                }
                info!(method_id = %params["methodId"], "mock: authenticated");
                self.authenticated.store(true, Ordering::SeqCst);
                Ok(json!({}))
            }

            "session/new" => {
                if self.require_auth && !self.authenticated.load(Ordering::SeqCst) {
                    return Err(RpcError::new(AUTH_REQUIRED, "Authentication required"));
                }
                let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
                let session_id = self
                    .fixed_session_id
                    .clone()
                    .unwrap_or_else(|| format!("mock-session-{}-{n}", std::process::id()));
                Ok(json!({
                    "sessionId": session_id,
                    "modes": {
                        "currentModeId": "default",
                        "availableModes": [
                            { "id": "default", "name": "Default" },
                            { "id": "plan", "name": "Plan" },
                        ],
                    },
                    "models": {
                        "currentModelId": "mock-small",
                        "availableModels": [
                            { "modelId": "mock-small", "name": "Mock Small" },
                            { "modelId": "mock-large", "name": "Mock Large" },
                        ],
                    },
                }))
            }

            "session/prompt" => self.prompt(&params).await,

            "session/set_mode" | "session/set_model" => Ok(json!({})),

            other => Err(RpcError::method_not_found(other)),
        }
    }

    async fn prompt(&self, params: &Value) -> HandlerResult {
        self.cancelled.store(false, Ordering::SeqCst);
        let session_id = params["sessionId"].as_str().unwrap_or_default().to_owned();
        let text = params["prompt"][0]["text"].as_str().unwrap_or_default().trim().to_owned();
        let (command, rest) = text.split_once(' ').unwrap_or((text.as_str(), ""));

        let reply = match command {
            "exit" => std::process::exit(3),
            "permission" => self.ask_permission(&session_id).await?,
            "read" => {
                let result = self
                    .call("fs/read_text_file", json!({ "sessionId": session_id, "path": rest }))
                    .await?;
                result["content"].as_str().unwrap_or_default().to_owned()
            }
            "write" => {
                let (path, content) = rest.split_once(' ').unwrap_or((rest, ""));
                self.call(
                    "fs/write_text_file",
                    json!({ "sessionId": session_id, "path": path, "content": content }),
                )
                .await?;
                format!("wrote {path}")
            }
            "terminal" => self.run_terminal(&session_id, rest).await?,
            "mode" => {
                self.update(&session_id, json!({ "sessionUpdate": "current_mode_update", "currentModeId": rest }))
                    .await;
                format!("mode {rest}")
            }
            _ => format!("echo: {text}"),
        };

        self.update(
            &session_id,
            json!({
                "sessionUpdate": "agent_message_chunk",
                "content": { "type": "text", "text": reply },
            }),
        )
        .await;

        let stop_reason = if self.cancelled.load(Ordering::SeqCst) {
            "cancelled"
        } else {
            "end_turn"
        };
        Ok(json!({ "stopReason": stop_reason }))
    }

    async fn ask_permission(&self, session_id: &str) -> std::result::Result<String, RpcError> {
        let result = self
            .call(
                "session/request_permission",
                json!({
                    "sessionId": session_id,
                    "toolCall": { "toolCallId": "call-1", "title": "Run tests" },
                    "options": [
                        { "optionId": "allow", "name": "Allow", "kind": "allow_once" },
                        { "optionId": "reject", "name": "Reject", "kind": "reject_once" },
                    ],
                }),
            )
            .await?;
        let outcome = &result["outcome"];
        Ok(match outcome["outcome"].as_str() {
            Some("selected") => format!("selected {}", outcome["optionId"].as_str().unwrap_or_default()),
            _ => "cancelled".to_owned(),
        })
    }

    async fn run_terminal(&self, session_id: &str, line: &str) -> std::result::Result<String, RpcError> {
        let mut create = json!({ "sessionId": session_id, "command": line, "args": [] });
        if let Some(limit) = self.terminal_limit {
            create["outputByteLimit"] = json!(limit);
        }
        let created = self.call("terminal/create", create).await?;
        let terminal_id = created["terminalId"].clone();
        let ids = json!({ "sessionId": session_id, "terminalId": terminal_id });

        let exit = self.call("terminal/wait_for_exit", ids.clone()).await?;
        let output = self.call("terminal/output", ids.clone()).await?;
        self.call("terminal/release", ids).await?;

        Ok(format!(
            "{}|truncated={}|exit={}",
            output["output"].as_str().unwrap_or_default(),
            output["truncated"].as_bool().unwrap_or_default(),
            exit["exitCode"],
        ))
    }

    async fn call(&self, method: &str, params: Value) -> HandlerResult {
        let rpc = self
            .rpc
            .get()
            .ok_or_else(|| RpcError::internal("connection not ready"))?;
        rpc.call(method, params)
            .await
            .map_err(|e| RpcError::internal(format!("{method} failed: {e}")))
    }

    async fn update(&self, session_id: &str, update: Value) {
        let Some(rpc) = self.rpc.get() else {
            return;
        };
        let params = json!({ "sessionId": session_id, "update": update });
        if let Err(err) = rpc.notify("session/update", params).await {
            debug!(%err, "mock: failed to send session/update");
        }
    }
}

impl InboundHandler for MockAgent {
    fn handle_request(self: Arc<Self>, method: String, params: Value) -> HandlerFuture {
        Box::pin(async move { self.handle(&method, params).await })
    }

    fn handle_notification(&self, method: &str, _params: Value) {
        if method == "session/cancel" {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

fn flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| !v.is_empty() && v != "0")
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Ok(code) = env::var("MOCK_EXIT_CODE") {
        std::process::exit(code.trim().parse().unwrap_or(1));
    }

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MOCK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let agent = Arc::new(MockAgent::from_env());
    let handler: Arc<dyn InboundHandler> = agent.clone();
    let rpc = RpcConnection::start("mock-client", tokio::io::stdin(), tokio::io::stdout(), handler);
    let _ = agent.rpc.set(rpc.clone());

    rpc.closed().await;
}
