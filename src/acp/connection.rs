//! Typed ACP client calls on top of [`RpcConnection`].
//!
//! [`AcpConnection::establish`] performs the `initialize` handshake and
//! caches what the agent reported as [`ConnectionInfo`]. The remaining
//! methods are one typed wrapper per outbound ACP message.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::acp::rpc::RpcConnection;
use crate::acp::schema::{
    AuthMethod, AuthenticateRequest, CancelNotification, ClientCapabilities, ContentBlock,
    Implementation, InitializeRequest, InitializeResponse, NewSessionRequest, NewSessionResponse,
    PromptRequest, PromptResponse, SetSessionModeRequest, SetSessionModelRequest,
    METHOD_AUTHENTICATE, METHOD_INITIALIZE, METHOD_SESSION_CANCEL, METHOD_SESSION_NEW,
    METHOD_SESSION_PROMPT, METHOD_SESSION_SET_MODE, METHOD_SESSION_SET_MODEL, PROTOCOL_VERSION,
};
use crate::{AppError, Result};

/// Client name sent in `clientInfo`.
pub const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");

/// What the agent reported during `initialize`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    /// Supervisor-assigned id of the agent process.
    pub agent_id: String,
    /// Negotiated protocol version.
    pub protocol_version: u16,
    /// Opaque agent capability object.
    pub agent_capabilities: Value,
    /// Agent name, if reported.
    pub agent_name: Option<String>,
    /// Agent version, if reported.
    pub agent_version: Option<String>,
    /// Advertised authentication methods.
    pub auth_methods: Vec<AuthMethod>,
}

/// An initialized ACP connection to one agent.
#[derive(Debug)]
pub struct AcpConnection {
    rpc: RpcConnection,
    info: ConnectionInfo,
}

impl AcpConnection {
    /// Run the `initialize` handshake over `rpc`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Connection`] if the agent closes the stream or
    /// answers with an error, and [`AppError::Acp`] if the result cannot be
    /// decoded.
    pub async fn establish(agent_id: &str, rpc: RpcConnection) -> Result<Self> {
        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION,
            client_capabilities: ClientCapabilities::all(),
            client_info: Implementation {
                name: CLIENT_NAME.to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                title: None,
            },
        };

        let response: InitializeResponse = call_typed(&rpc, METHOD_INITIALIZE, &request)
            .await
            .map_err(|e| match e {
                AppError::Acp(_) => e,
                other => AppError::Connection(format!("initialize failed: {other}")),
            })?;

        let (agent_name, agent_version) = response
            .agent_info
            .map_or((None, None), |i| (Some(i.name), Some(i.version)));

        let info = ConnectionInfo {
            agent_id: agent_id.to_owned(),
            protocol_version: response.protocol_version,
            agent_capabilities: response.agent_capabilities,
            agent_name,
            agent_version,
            auth_methods: response.auth_methods,
        };

        info!(
            agent_id,
            protocol_version = info.protocol_version,
            auth_methods = info.auth_methods.len(),
            "acp: connection initialized"
        );

        Ok(Self { rpc, info })
    }

    /// Handshake results.
    #[must_use]
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Underlying transport.
    #[must_use]
    pub fn rpc(&self) -> &RpcConnection {
        &self.rpc
    }

    /// `authenticate` with one of the advertised methods.
    ///
    /// # Errors
    ///
    /// Propagates the agent's error response or a closed connection.
    pub async fn authenticate(&self, method_id: &str) -> Result<()> {
        let request = AuthenticateRequest {
            method_id: method_id.to_owned(),
        };
        let _: Value = call_typed(&self.rpc, METHOD_AUTHENTICATE, &request).await?;
        debug!(agent_id = %self.info.agent_id, method_id, "acp: authenticated");
        Ok(())
    }

    /// `session/new` in `cwd` with no MCP servers.
    ///
    /// # Errors
    ///
    /// [`AppError::AuthRequired`] if the agent needs authentication first;
    /// otherwise the agent's error or a closed connection.
    pub async fn new_session(&self, cwd: &Path) -> Result<NewSessionResponse> {
        let request = NewSessionRequest {
            cwd: cwd.to_path_buf(),
            mcp_servers: Vec::new(),
        };
        call_typed(&self.rpc, METHOD_SESSION_NEW, &request).await
    }

    /// `session/prompt` with a single text block. Resolves when the turn ends.
    ///
    /// # Errors
    ///
    /// Propagates the agent's error response or a closed connection.
    pub async fn prompt(&self, session_id: &str, text: &str) -> Result<PromptResponse> {
        let request = PromptRequest {
            session_id: session_id.to_owned(),
            prompt: vec![ContentBlock::text(text)],
        };
        call_typed(&self.rpc, METHOD_SESSION_PROMPT, &request).await
    }

    /// `session/cancel` notification.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Connection`] if the connection is closed.
    pub async fn cancel(&self, session_id: &str) -> Result<()> {
        let params = serde_json::to_value(CancelNotification {
            session_id: session_id.to_owned(),
        })?;
        self.rpc.notify(METHOD_SESSION_CANCEL, params).await
    }

    /// `session/set_mode`.
    ///
    /// # Errors
    ///
    /// Propagates the agent's error response or a closed connection.
    pub async fn set_mode(&self, session_id: &str, mode_id: &str) -> Result<()> {
        let request = SetSessionModeRequest {
            session_id: session_id.to_owned(),
            mode_id: mode_id.to_owned(),
        };
        let _: Value = call_typed(&self.rpc, METHOD_SESSION_SET_MODE, &request).await?;
        Ok(())
    }

    /// `session/set_model`.
    ///
    /// # Errors
    ///
    /// Propagates the agent's error response or a closed connection.
    pub async fn set_model(&self, session_id: &str, model_id: &str) -> Result<()> {
        let request = SetSessionModelRequest {
            session_id: session_id.to_owned(),
            model_id: model_id.to_owned(),
        };
        let _: Value = call_typed(&self.rpc, METHOD_SESSION_SET_MODEL, &request).await?;
        Ok(())
    }

    /// Close the transport.
    pub fn close(&self) {
        self.rpc.close();
    }
}

async fn call_typed<P, T>(rpc: &RpcConnection, method: &str, params: &P) -> Result<T>
where
    P: Serialize,
    T: DeserializeOwned,
{
    let params = serde_json::to_value(params)?;
    let result = rpc.call(method, params).await?;
    serde_json::from_value(result)
        .map_err(|e| AppError::Acp(format!("invalid {method} result: {e}")))
}
