//! Events published by the session coordinator.

/// Something UI collaborators may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// A session was established with the agent.
    AgentConnected {
        /// Agent name.
        agent: String,
    },
    /// The agent's session is gone, either on request or because the
    /// process exited. An unrequested exit is followed by
    /// [`CoordinatorEvent::AgentClosed`].
    AgentDisconnected {
        /// Agent name.
        agent: String,
    },
    /// The agent process exited on its own.
    AgentClosed {
        /// Agent name.
        agent: String,
        /// Exit code, if it exited normally.
        code: Option<i32>,
        /// Signal name, if it was killed by a signal.
        signal: Option<String>,
    },
    /// The supervisor reported a process error.
    AgentError {
        /// Agent name, or the process id if the agent is unknown.
        agent: String,
        /// Description.
        message: String,
    },
    /// The active session changed; `None` means no session is active.
    ActiveSessionChanged {
        /// New active session.
        session_id: Option<String>,
    },
    /// The conversation view should be cleared.
    ClearChat,
    /// A session's mode changed.
    ModeChanged {
        /// Session.
        session_id: String,
        /// New mode.
        mode_id: String,
    },
    /// A session's model changed.
    ModelChanged {
        /// Session.
        session_id: String,
        /// New model.
        model_id: String,
    },
}

impl CoordinatorEvent {
    /// Kebab-case event name, for logs and bridges.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentConnected { .. } => "agent-connected",
            Self::AgentDisconnected { .. } => "agent-disconnected",
            Self::AgentClosed { .. } => "agent-closed",
            Self::AgentError { .. } => "agent-error",
            Self::ActiveSessionChanged { .. } => "active-session-changed",
            Self::ClearChat => "clear-chat",
            Self::ModeChanged { .. } => "mode-changed",
            Self::ModelChanged { .. } => "model-changed",
        }
    }
}
