//! Configuration parsing and validation.

use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Default cap on buffered terminal output.
pub const DEFAULT_TERMINAL_OUTPUT_BYTE_LIMIT: usize = 1_048_576;

/// Default wait between SIGTERM and force-kill.
pub const DEFAULT_KILL_GRACE_SECONDS: u64 = 5;

/// How permission requests are answered without asking.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoApprove {
    /// Always ask the permission chooser.
    #[default]
    Off,
    /// Pick the first allow option when one is offered.
    AllowAll,
}

/// One launchable agent.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Unique key used by `connect_to_agent`.
    pub name: String,
    /// Label for UIs; falls back to `name`.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Executable or command line.
    pub command: String,
    /// Arguments appended to `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl AgentConfig {
    /// Minimal config for `name` running `command` directly.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

fn default_cwd() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_true() -> bool {
    true
}

fn default_terminal_output_byte_limit() -> usize {
    DEFAULT_TERMINAL_OUTPUT_BYTE_LIMIT
}

fn default_kill_grace_seconds() -> u64 {
    DEFAULT_KILL_GRACE_SECONDS
}

/// Global configuration parsed from `agent-link.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Working directory for new sessions.
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
    /// Permission auto-approval policy.
    #[serde(default)]
    pub auto_approve: AutoApprove,
    /// Launch agents through the user's login shell.
    #[serde(default = "default_true")]
    pub use_login_shell: bool,
    /// Default output cap for agent-created terminals.
    #[serde(default = "default_terminal_output_byte_limit")]
    pub terminal_output_byte_limit: usize,
    /// Seconds between SIGTERM and force-kill.
    #[serde(default = "default_kill_grace_seconds")]
    pub kill_grace_seconds: u64,
    /// Launchable agents.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up an agent by name.
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Grace period before force-kill.
    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_seconds)
    }

    fn validate(&mut self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(AppError::Config("at least one [[agents]] entry is required".into()));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(AppError::Config("agent name must not be empty".into()));
            }
            if agent.command.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "agent '{}' has an empty command",
                    agent.name
                )));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
        }

        if self.terminal_output_byte_limit == 0 {
            return Err(AppError::Config(
                "terminal_output_byte_limit must be greater than zero".into(),
            ));
        }

        self.cwd = self
            .cwd
            .canonicalize()
            .map_err(|err| AppError::Config(format!("cwd invalid: {err}")))?;

        Ok(())
    }
}
