//! Session model and agent slot lifecycle.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::acp::schema::{NewSessionResponse, SessionModeState, SessionModelState};

/// Lifecycle state of one configured agent.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// No process.
    #[default]
    Disconnected,
    /// Process being started.
    Spawning,
    /// `initialize` / `session/new` in flight.
    Connecting,
    /// The agent asked for authentication.
    AwaitingAuth,
    /// Session live.
    Active,
}

impl SlotState {
    /// Determine whether a lifecycle transition is permitted.
    ///
    /// Any state may fall back to `Disconnected`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Disconnected)
                | (Self::Disconnected, Self::Spawning)
                | (Self::Spawning, Self::Connecting)
                | (Self::Connecting, Self::AwaitingAuth | Self::Active)
                | (Self::AwaitingAuth, Self::Active)
        )
    }
}

/// A live agent session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Agent-issued session id.
    pub session_id: String,
    /// Supervisor id of the owning process.
    pub agent_id: String,
    /// Configured agent name.
    pub agent_name: String,
    /// Working directory the session was created in.
    pub cwd: PathBuf,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Mode state, if the agent supports modes.
    pub modes: Option<SessionModeState>,
    /// Model state, if the agent supports model selection.
    pub models: Option<SessionModelState>,
}

impl Session {
    /// Build from a `session/new` result.
    #[must_use]
    pub fn from_response(
        response: NewSessionResponse,
        agent_id: &str,
        agent_name: &str,
        cwd: PathBuf,
    ) -> Self {
        Self {
            session_id: response.session_id,
            agent_id: agent_id.to_owned(),
            agent_name: agent_name.to_owned(),
            cwd,
            created_at: Utc::now(),
            modes: response.modes,
            models: response.models,
        }
    }

    /// Current mode id.
    #[must_use]
    pub fn current_mode(&self) -> Option<&str> {
        self.modes.as_ref().map(|m| m.current_mode_id.as_str())
    }

    /// Current model id.
    #[must_use]
    pub fn current_model(&self) -> Option<&str> {
        self.models.as_ref().map(|m| m.current_model_id.as_str())
    }

    /// Record an acknowledged mode switch. Returns `false` if the session
    /// has no mode state.
    pub fn apply_mode(&mut self, mode_id: &str) -> bool {
        match self.modes.as_mut() {
            Some(modes) => {
                mode_id.clone_into(&mut modes.current_mode_id);
                true
            }
            None => false,
        }
    }

    /// Record an acknowledged model switch. Returns `false` if the session
    /// has no model state.
    pub fn apply_model(&mut self, model_id: &str) -> bool {
        match self.models.as_mut() {
            Some(models) => {
                model_id.clone_into(&mut models.current_model_id);
                true
            }
            None => false,
        }
    }
}
