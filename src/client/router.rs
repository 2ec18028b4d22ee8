//! Inbound ACP surface.
//!
//! [`ClientCapabilityRouter`] answers every agent → client request by
//! delegating to the file-system provider, the terminal manager or the
//! permission arbiter, and fans `session/update` notifications out to the
//! registered listeners.
//!
//! | Wire method                   | Delegate                                 |
//! |-------------------------------|------------------------------------------|
//! | `session/request_permission`  | [`PermissionArbiter::request_permission`]|
//! | `fs/read_text_file`           | [`FileSystemProvider::read_text_file`]   |
//! | `fs/write_text_file`          | [`FileSystemProvider::write_text_file`]  |
//! | `terminal/create`             | [`TerminalManager::create`]              |
//! | `terminal/output`             | [`TerminalManager::output`]              |
//! | `terminal/wait_for_exit`      | [`TerminalManager::wait_for_exit`]       |
//! | `terminal/kill`               | [`TerminalManager::kill`]                |
//! | `terminal/release`            | [`TerminalManager::release`]             |
//! | `session/update` (notif.)     | every [`SessionUpdateListener`]          |

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::acp::protocol::RpcError;
use crate::acp::rpc::{HandlerFuture, InboundHandler};
use crate::acp::schema::{
    CreateTerminalRequest, CreateTerminalResponse, ReadTextFileRequest, ReadTextFileResponse,
    RequestPermissionRequest, RequestPermissionResponse, SessionNotification, TerminalRequest,
    WriteTextFileRequest, METHOD_FS_READ, METHOD_FS_WRITE, METHOD_REQUEST_PERMISSION,
    METHOD_SESSION_UPDATE, METHOD_TERMINAL_CREATE, METHOD_TERMINAL_KILL, METHOD_TERMINAL_OUTPUT,
    METHOD_TERMINAL_RELEASE, METHOD_TERMINAL_WAIT,
};
use crate::client::fs::FileSystemProvider;
use crate::client::permission::PermissionArbiter;
use crate::client::terminal::TerminalManager;
use crate::Result;

/// Consumer of streamed session updates.
pub trait SessionUpdateListener: Send + Sync {
    /// Handle one update. Called on the connection's reader task, in
    /// arrival order, so implementations must not block.
    ///
    /// # Errors
    ///
    /// Errors are logged; delivery to other listeners continues.
    fn on_update(&self, notification: &SessionNotification) -> Result<()>;
}

type RouteResult = std::result::Result<Value, RpcError>;

/// Inbound request dispatcher shared by all agent connections.
pub struct ClientCapabilityRouter {
    fs: Arc<dyn FileSystemProvider>,
    terminals: TerminalManager,
    permissions: PermissionArbiter,
    listeners: RwLock<Vec<Arc<dyn SessionUpdateListener>>>,
}

impl std::fmt::Debug for ClientCapabilityRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCapabilityRouter")
            .field("terminals", &self.terminals)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl ClientCapabilityRouter {
    /// Router over the given collaborators, with no listeners.
    #[must_use]
    pub fn new(
        fs: Arc<dyn FileSystemProvider>,
        terminals: TerminalManager,
        permissions: PermissionArbiter,
    ) -> Self {
        Self {
            fs,
            terminals,
            permissions,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener. Listeners are called in registration order.
    pub fn add_listener(&self, listener: Arc<dyn SessionUpdateListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Terminal table, for shutdown and inspection.
    #[must_use]
    pub fn terminals(&self) -> &TerminalManager {
        &self.terminals
    }

    /// Deliver one update to every listener.
    pub fn dispatch_update(&self, notification: &SessionNotification) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in listeners {
            match std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_update(notification))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(session_id = %notification.session_id, %err, "session update listener failed");
                }
                Err(_) => {
                    warn!(session_id = %notification.session_id, "session update listener panicked");
                }
            }
        }
    }

    async fn route(&self, method: &str, params: Value) -> RouteResult {
        match method {
            METHOD_FS_READ => {
                let req: ReadTextFileRequest = parse(method, params)?;
                let content = self
                    .fs
                    .read_text_file(&req.path, req.line, req.limit)
                    .await?;
                reply(&ReadTextFileResponse { content })
            }

            METHOD_FS_WRITE => {
                let req: WriteTextFileRequest = parse(method, params)?;
                self.fs.write_text_file(&req.path, &req.content).await?;
                Ok(json!({}))
            }

            METHOD_TERMINAL_CREATE => {
                let req: CreateTerminalRequest = parse(method, params)?;
                let terminal_id = self.terminals.create(req).await?;
                reply(&CreateTerminalResponse { terminal_id })
            }

            METHOD_TERMINAL_OUTPUT => {
                let req: TerminalRequest = parse(method, params)?;
                reply(&self.terminals.output(&req.terminal_id).await?)
            }

            METHOD_TERMINAL_WAIT => {
                let req: TerminalRequest = parse(method, params)?;
                reply(&self.terminals.wait_for_exit(&req.terminal_id).await?)
            }

            METHOD_TERMINAL_KILL => {
                let req: TerminalRequest = parse(method, params)?;
                self.terminals.kill(&req.terminal_id).await?;
                Ok(json!({}))
            }

            METHOD_TERMINAL_RELEASE => {
                let req: TerminalRequest = parse(method, params)?;
                self.terminals.release(&req.terminal_id).await?;
                Ok(json!({}))
            }

            other => {
                debug!(method = other, "router: unsupported inbound method");
                Err(RpcError::method_not_found(other))
            }
        }
    }
}

impl InboundHandler for ClientCapabilityRouter {
    fn handle_request(self: Arc<Self>, method: String, params: Value) -> HandlerFuture {
        if method != METHOD_REQUEST_PERMISSION {
            return Box::pin(async move { self.route(&method, params).await });
        }

        // The arbiter queue position is taken now, in wire order.
        match parse::<RequestPermissionRequest>(&method, params) {
            Ok(request) => {
                let outcome = self.permissions.request_permission(request);
                Box::pin(async move { reply(&RequestPermissionResponse { outcome: outcome.await }) })
            }
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }

    fn handle_notification(&self, method: &str, params: Value) {
        if method != METHOD_SESSION_UPDATE {
            debug!(method, "router: ignoring notification");
            return;
        }

        match serde_json::from_value::<SessionNotification>(params) {
            Ok(notification) => self.dispatch_update(&notification),
            Err(err) => warn!(%err, "router: malformed session/update dropped"),
        }
    }
}

fn parse<T: DeserializeOwned>(method: &str, params: Value) -> std::result::Result<T, RpcError> {
    serde_json::from_value(params)
        .map_err(|e| RpcError::invalid_params(format!("invalid {method} params: {e}")))
}

fn reply<T: Serialize>(value: &T) -> RouteResult {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}
