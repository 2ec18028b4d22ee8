//! Agent-created terminals.
//!
//! Each terminal is a child process whose stdout and stderr are merged into
//! one byte-capped buffer. When the cap is exceeded the oldest bytes are
//! dropped (never splitting a UTF-8 sequence at the head) and the buffer is
//! marked truncated for the rest of its life.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::acp::schema::{CreateTerminalRequest, TerminalExitStatus, TerminalOutputResponse};
use crate::process::exit::{exit_parts, terminate};
use crate::process::shell::{terminal_launch, Platform};
use crate::{AppError, Result};

/// How long to wait for output pipes to drain after the process exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Head-truncating output buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBuffer {
    data: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    /// Empty buffer holding at most `limit` bytes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Append `bytes`, discarding from the front to stay within the limit.
    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        if self.data.len() <= self.limit {
            return;
        }

        let mut cut = self.data.len() - self.limit;
        while cut < self.data.len() && is_continuation(self.data[cut]) {
            cut += 1;
        }
        self.data.drain(..cut);
        self.truncated = true;
    }

    /// Buffered bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Buffered output as text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Whether anything has ever been discarded.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Configured limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

struct ManagedTerminal {
    output: std::sync::Mutex<OutputBuffer>,
    exit: watch::Receiver<Option<TerminalExitStatus>>,
    kill: CancellationToken,
}

impl ManagedTerminal {
    fn exit_status(&self) -> Option<TerminalExitStatus> {
        self.exit.borrow().clone()
    }
}

/// Defaults applied to every terminal.
#[derive(Debug, Clone)]
pub struct TerminalOptions {
    /// Working directory when the request has none.
    pub cwd: PathBuf,
    /// Output cap when the request has none.
    pub output_byte_limit: usize,
    /// Wait between terminate and force-kill.
    pub kill_grace: Duration,
}

/// Table of live terminals. Cheap to clone; clones share the table.
#[derive(Clone)]
pub struct TerminalManager {
    options: Arc<TerminalOptions>,
    terminals: Arc<Mutex<HashMap<String, Arc<ManagedTerminal>>>>,
}

impl std::fmt::Debug for TerminalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalManager")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TerminalManager {
    /// Empty manager.
    #[must_use]
    pub fn new(options: TerminalOptions) -> Self {
        Self {
            options: Arc::new(options),
            terminals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a command and return its terminal id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] if the command cannot be started.
    pub async fn create(&self, request: CreateTerminalRequest) -> Result<String> {
        let launch = terminal_launch(Platform::current(), &request.command, &request.args);
        let cwd = request.cwd.clone().unwrap_or_else(|| self.options.cwd.clone());
        let limit = request
            .output_byte_limit
            .unwrap_or(self.options.output_byte_limit);

        let mut child = Command::new(&launch.program)
            .args(&launch.args)
            .current_dir(&cwd)
            .envs(request.env.iter().map(|v| (&v.name, &v.value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::Spawn(format!(
                    "failed to start terminal command '{}': {e}",
                    request.command
                ))
            })?;

        let id = format!("term-{}", Uuid::new_v4());
        let (exit_tx, exit_rx) = watch::channel(None);
        let terminal = Arc::new(ManagedTerminal {
            output: std::sync::Mutex::new(OutputBuffer::new(limit)),
            exit: exit_rx,
            kill: CancellationToken::new(),
        });

        let stdout = child.stdout.take().map(|s| pump(Arc::clone(&terminal), s));
        let stderr = child.stderr.take().map(|s| pump(Arc::clone(&terminal), s));

        let kill = terminal.kill.clone();
        let grace = self.options.kill_grace;
        let terminal_id = id.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                () = kill.cancelled() => terminate(&mut child, grace).await,
            };

            for handle in [stdout, stderr].into_iter().flatten() {
                if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
                    debug!(terminal_id, "terminal: output pipe still open after exit");
                }
            }

            let exit = match status {
                Ok(status) => {
                    let (exit_code, signal) = exit_parts(status);
                    TerminalExitStatus { exit_code, signal }
                }
                Err(err) => {
                    warn!(terminal_id, %err, "terminal: wait failed");
                    TerminalExitStatus::default()
                }
            };
            debug!(terminal_id, ?exit, "terminal: exited");
            let _ = exit_tx.send(Some(exit));
        });

        info!(terminal_id = %id, command = %request.command, limit, "terminal: created");
        self.terminals.lock().await.insert(id.clone(), terminal);
        Ok(id)
    }

    /// Current output, truncation flag and exit status.
    ///
    /// # Errors
    ///
    /// [`AppError::TerminalNotFound`] for an unknown id.
    pub async fn output(&self, id: &str) -> Result<TerminalOutputResponse> {
        let terminal = self.get(id).await?;
        let exit_status = terminal.exit_status();
        let buffer = terminal
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(TerminalOutputResponse {
            output: buffer.text(),
            truncated: buffer.is_truncated(),
            exit_status,
        })
    }

    /// Wait for the command to exit.
    ///
    /// # Errors
    ///
    /// [`AppError::TerminalNotFound`] for an unknown id.
    pub async fn wait_for_exit(&self, id: &str) -> Result<TerminalExitStatus> {
        let terminal = self.get(id).await?;
        let mut exit = terminal.exit.clone();
        let status = exit
            .wait_for(Option::is_some)
            .await
            .map_err(|_| AppError::Io(format!("terminal {id} lost its exit status")))?
            .clone();
        Ok(status.unwrap_or_default())
    }

    /// Terminate the command, keeping its output available.
    ///
    /// # Errors
    ///
    /// [`AppError::TerminalNotFound`] for an unknown id.
    pub async fn kill(&self, id: &str) -> Result<()> {
        let terminal = self.get(id).await?;
        terminal.kill.cancel();
        debug!(terminal_id = id, "terminal: kill requested");
        Ok(())
    }

    /// Kill the command if still running and forget the terminal.
    ///
    /// # Errors
    ///
    /// [`AppError::TerminalNotFound`] for an unknown id.
    pub async fn release(&self, id: &str) -> Result<()> {
        let terminal = self
            .terminals
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| AppError::TerminalNotFound(id.to_owned()))?;
        terminal.kill.cancel();
        debug!(terminal_id = id, "terminal: released");
        Ok(())
    }

    /// Release every terminal.
    pub async fn release_all(&self) {
        let drained: Vec<_> = self.terminals.lock().await.drain().collect();
        for (id, terminal) in drained {
            terminal.kill.cancel();
            debug!(terminal_id = %id, "terminal: released on shutdown");
        }
    }

    /// Number of live terminals.
    pub async fn len(&self) -> usize {
        self.terminals.lock().await.len()
    }

    /// Whether no terminals are live.
    pub async fn is_empty(&self) -> bool {
        self.terminals.lock().await.is_empty()
    }

    async fn get(&self, id: &str) -> Result<Arc<ManagedTerminal>> {
        self.terminals
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::TerminalNotFound(id.to_owned()))
    }
}

fn pump<R>(terminal: Arc<ManagedTerminal>, mut pipe: R) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0_u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => terminal
                    .output
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(&chunk[..n]),
                Err(err) => {
                    debug!(%err, "terminal: output read failed");
                    break;
                }
            }
        }
    })
}
