//! Agent process supervisor.
//!
//! Owns every spawned agent child. Each child gets a monitor task that
//! waits for it to exit (or for a kill request), removes it from the
//! process table and then broadcasts [`ProcessEvent::Closed`]. Stderr is
//! pumped line by line into [`ProcessEvent::StderrLine`] events.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{AgentConfig, GlobalConfig};
use crate::process::exit::{exit_parts, terminate};
use crate::process::shell::{agent_launch, Platform};
use crate::{AppError, Result};

/// Buffered lifecycle events per subscriber.
const EVENT_CAPACITY: usize = 256;

/// A live agent process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProcessHandle {
    /// Supervisor-assigned id.
    pub id: String,
    /// Configured agent name.
    pub name: String,
    /// OS process id.
    pub pid: Option<u32>,
    /// Config the process was launched from.
    pub config: AgentConfig,
}

/// Result of a successful spawn: the handle plus the protocol pipes.
#[derive(Debug)]
pub struct SpawnedAgent {
    /// Process handle.
    pub handle: AgentProcessHandle,
    /// Agent stdin (client → agent).
    pub stdin: ChildStdin,
    /// Agent stdout (agent → client).
    pub stdout: ChildStdout,
}

/// Lifecycle notifications for supervised processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One line written to the agent's stderr.
    StderrLine {
        /// Process id.
        id: String,
        /// Line without trailing newline.
        line: String,
    },
    /// The process could not be waited on.
    Error {
        /// Process id.
        id: String,
        /// Description.
        message: String,
    },
    /// The process has exited and left the table.
    Closed {
        /// Process id.
        id: String,
        /// Exit code, if it exited normally.
        code: Option<i32>,
        /// Signal name, if it was killed by a signal.
        signal: Option<String>,
    },
}

/// Launch settings shared by all agents.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Working directory for agent processes.
    pub cwd: PathBuf,
    /// Wrap commands in the user's login shell.
    pub use_login_shell: bool,
    /// Wait between terminate and force-kill.
    pub kill_grace: Duration,
}

impl From<&GlobalConfig> for SupervisorOptions {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            cwd: config.cwd.clone(),
            use_login_shell: config.use_login_shell,
            kill_grace: config.kill_grace(),
        }
    }
}

struct Entry {
    kill: CancellationToken,
    exited: watch::Receiver<bool>,
}

struct Inner {
    options: SupervisorOptions,
    table: Mutex<HashMap<String, Entry>>,
    events: broadcast::Sender<ProcessEvent>,
}

/// Spawns, tracks and kills agent processes. Cheap to clone.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Create an empty supervisor.
    #[must_use]
    pub fn new(options: SupervisorOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                options,
                table: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.inner.events.subscribe()
    }

    /// Start an agent process with piped stdio.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] if the OS refuses to start the process.
    /// Exits after a successful start are reported as events only.
    pub async fn spawn(&self, name: &str, config: &AgentConfig) -> Result<SpawnedAgent> {
        let options = &self.inner.options;
        let env_shell = env::var("SHELL").ok();
        let launch = agent_launch(
            Platform::current(),
            &config.command,
            &config.args,
            options.use_login_shell,
            env_shell.as_deref(),
        );

        debug!(agent = name, program = %launch.program, args = ?launch.args, "supervisor: launching");

        let mut child = Command::new(&launch.program)
            .args(&launch.args)
            .current_dir(&options.cwd)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Spawn(format!("failed to start agent '{name}': {e}")))?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(AppError::Spawn(format!(
                "agent '{name}' started without piped stdio"
            )));
        };

        let id = Uuid::new_v4().to_string();
        let pid = child.id();
        let kill = CancellationToken::new();
        let (exit_tx, exit_rx) = watch::channel(false);

        self.inner.table.lock().await.insert(
            id.clone(),
            Entry {
                kill: kill.clone(),
                exited: exit_rx,
            },
        );

        let span = info_span!("agent_process", agent = name, agent_id = %id);
        tokio::spawn(
            pump_stderr(id.clone(), stderr, self.inner.events.clone()).instrument(span.clone()),
        );
        tokio::spawn(
            monitor(Arc::clone(&self.inner), id.clone(), child, kill, exit_tx).instrument(span),
        );

        info!(agent = name, agent_id = %id, pid, "supervisor: agent process started");

        Ok(SpawnedAgent {
            handle: AgentProcessHandle {
                id,
                name: name.to_owned(),
                pid,
                config: config.clone(),
            },
            stdin,
            stdout,
        })
    }

    /// Terminate a process and wait until it has left the table.
    ///
    /// Returns `false` if `id` is not running.
    pub async fn kill(&self, id: &str) -> bool {
        let entry = {
            let table = self.inner.table.lock().await;
            table.get(id).map(|e| (e.kill.clone(), e.exited.clone()))
        };
        let Some((kill, mut exited)) = entry else {
            return false;
        };

        kill.cancel();
        // An error means the monitor is already gone, i.e. the process exited.
        let _ = exited.wait_for(|done| *done).await;
        true
    }

    /// Terminate every supervised process.
    pub async fn kill_all(&self) {
        let ids: Vec<String> = self.inner.table.lock().await.keys().cloned().collect();
        join_all(ids.iter().map(|id| self.kill(id))).await;
    }

    /// Whether `id` is still in the process table.
    pub async fn is_running(&self, id: &str) -> bool {
        self.inner.table.lock().await.contains_key(id)
    }
}

// ── Background tasks ─────────────────────────────────────────────────────────

async fn pump_stderr(id: String, stderr: ChildStderr, events: broadcast::Sender<ProcessEvent>) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(agent_id = %id, line = %line, "agent stderr");
                let _ = events.send(ProcessEvent::StderrLine {
                    id: id.clone(),
                    line,
                });
            }
            Ok(None) => break,
            Err(err) => {
                debug!(agent_id = %id, %err, "agent stderr read failed");
                break;
            }
        }
    }
}

async fn monitor(
    inner: Arc<Inner>,
    id: String,
    mut child: Child,
    kill: CancellationToken,
    exited: watch::Sender<bool>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        () = kill.cancelled() => {
            debug!(agent_id = %id, "supervisor: kill requested");
            terminate(&mut child, inner.options.kill_grace).await
        }
    };

    inner.table.lock().await.remove(&id);

    let (code, signal) = match status {
        Ok(status) => exit_parts(status),
        Err(err) => {
            warn!(agent_id = %id, %err, "supervisor: failed to wait on agent process");
            let _ = inner.events.send(ProcessEvent::Error {
                id: id.clone(),
                message: err.to_string(),
            });
            (None, None)
        }
    };

    info!(agent_id = %id, ?code, ?signal, "supervisor: agent process exited");
    let _ = inner.events.send(ProcessEvent::Closed { id, code, signal });
    let _ = exited.send(true);
}
