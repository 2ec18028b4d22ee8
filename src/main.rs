#![forbid(unsafe_code)]

//! `agent-link`: talk to ACP coding agents from the terminal.
//!
//! Loads the agent list from a TOML config, connects to one agent, sends a
//! prompt and streams the agent's updates to stdout. Permission and
//! authentication prompts are answered on stdin.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use agent_link::acp::schema::{AuthMethod, RequestPermissionRequest, SessionNotification, SessionUpdate};
use agent_link::acp::tap::{LoggingObserver, TrafficObserver};
use agent_link::client::fs::{BufferOverlay, LocalFileSystem};
use agent_link::client::permission::{ChooserFuture, PermissionChooser};
use agent_link::client::SessionUpdateListener;
use agent_link::coordinator::auth::{AuthFuture, AuthMethodChooser};
use agent_link::coordinator::{CoordinatorDeps, SessionCoordinator};
use agent_link::{AppError, GlobalConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-link", about = "Agent Client Protocol client", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "agent-link.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log every protocol line under the `acp::traffic` target.
    #[arg(long)]
    trace_traffic: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List configured agents.
    Agents,
    /// Connect to an agent and run one prompt turn.
    Prompt {
        /// Agent name from the config.
        #[arg(long)]
        agent: String,
        /// Prompt text.
        text: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = GlobalConfig::load_from_path(&args.config)?;
    info!(agents = config.agents.len(), cwd = %config.cwd.display(), "configuration loaded");

    match args.command {
        Command::Agents => {
            for agent in &config.agents {
                println!(
                    "{}\t{}\t{} {}",
                    agent.name,
                    agent.label(),
                    agent.command,
                    agent.args.join(" ")
                );
            }
            Ok(())
        }
        Command::Prompt { agent, text } => run_prompt(config, args.trace_traffic, &agent, &text).await,
    }
}

async fn run_prompt(config: GlobalConfig, trace_traffic: bool, agent: &str, text: &str) -> Result<()> {
    let console = Arc::new(Console::new());
    let traffic_observer: Option<Arc<dyn TrafficObserver>> =
        trace_traffic.then(|| Arc::new(LoggingObserver) as Arc<dyn TrafficObserver>);

    let coordinator = SessionCoordinator::new(
        config,
        CoordinatorDeps {
            fs: Arc::new(LocalFileSystem::new(BufferOverlay::new())),
            permission_chooser: console.clone(),
            auth_chooser: console,
            traffic_observer,
        },
    );
    coordinator.add_update_listener(Arc::new(StdoutPrinter));

    let session = coordinator.connect_to_agent(agent).await?;
    info!(agent, session_id = %session.session_id, "connected");

    let turn = coordinator.send_prompt(&session.session_id, text);
    tokio::pin!(turn);

    let outcome = tokio::select! {
        outcome = &mut turn => outcome,
        () = shutdown_signal() => {
            warn!("interrupted, cancelling turn");
            coordinator.cancel_turn(&session.session_id).await?;
            turn.await
        }
    };

    println!();
    let result = match outcome {
        Ok(outcome) => {
            println!("[stop reason: {}]", outcome.stop_reason);
            Ok(())
        }
        Err(err) => Err(err),
    };

    coordinator.shutdown().await;
    result
}

// ── Console collaborators ────────────────────────────────────────────────────

/// Answers permission and auth prompts from stdin.
struct Console {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn ask(&self, question: &str) -> Result<Option<String>> {
        let mut lines = self.lines.lock().await;
        eprint!("{question} ");
        let _ = std::io::stderr().flush();
        let answer = lines.next_line().await?;
        Ok(answer
            .map(|line| line.trim().to_owned())
            .filter(|line| !line.is_empty()))
    }

    async fn pick(&self, labels: &[String]) -> Result<Option<usize>> {
        for (idx, label) in labels.iter().enumerate() {
            eprintln!("  {}) {label}", idx + 1);
        }
        let answer = self.ask("choice (blank to cancel):").await?;
        Ok(answer
            .and_then(|a| a.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .filter(|idx| *idx < labels.len()))
    }
}

impl PermissionChooser for Console {
    fn choose<'a>(&'a self, request: &'a RequestPermissionRequest) -> ChooserFuture<'a> {
        Box::pin(async move {
            eprintln!(
                "\nPermission requested: {}",
                request.tool_title().unwrap_or("tool call")
            );
            let labels: Vec<String> = request.options.iter().map(|o| o.name.clone()).collect();
            Ok(self
                .pick(&labels)
                .await?
                .map(|idx| request.options[idx].option_id.clone()))
        })
    }
}

impl AuthMethodChooser for Console {
    fn confirm<'a>(&'a self, agent: &'a str, method: &'a AuthMethod) -> AuthFuture<'a, bool> {
        Box::pin(async move {
            let question = format!("{agent} requires authentication via {}. Continue? [y/N]", method.name);
            matches!(self.ask(&question).await, Ok(Some(a)) if a.eq_ignore_ascii_case("y"))
        })
    }

    fn select<'a>(
        &'a self,
        agent: &'a str,
        methods: &'a [AuthMethod],
    ) -> AuthFuture<'a, Option<String>> {
        Box::pin(async move {
            eprintln!("\n{agent} requires authentication:");
            let labels: Vec<String> = methods.iter().map(|m| m.name.clone()).collect();
            match self.pick(&labels).await {
                Ok(choice) => choice.map(|idx| methods[idx].id.clone()),
                Err(err) => {
                    warn!(%err, "failed to read auth choice");
                    None
                }
            }
        })
    }
}

/// Streams session updates to stdout.
struct StdoutPrinter;

impl SessionUpdateListener for StdoutPrinter {
    fn on_update(&self, notification: &SessionNotification) -> Result<()> {
        let mut out = std::io::stdout().lock();
        match &notification.update {
            SessionUpdate::AgentMessageChunk(chunk) => {
                if let Some(text) = chunk.content.as_text() {
                    write!(out, "{text}")?;
                }
            }
            SessionUpdate::AgentThoughtChunk(chunk) => {
                if let Some(text) = chunk.content.as_text() {
                    eprint!("{text}");
                }
            }
            SessionUpdate::ToolCall(call) => writeln!(out, "\n[tool] {}", call.title)?,
            SessionUpdate::ToolCallUpdate(update) => {
                if let Some(status) = update.status {
                    writeln!(out, "[tool {}] {status:?}", update.tool_call_id)?;
                }
            }
            SessionUpdate::Plan(plan) => {
                writeln!(out, "\n[plan]")?;
                for entry in &plan.entries {
                    writeln!(out, "  - [{}] {}", entry.status, entry.content)?;
                }
            }
            SessionUpdate::CurrentModeUpdate(update) => {
                writeln!(out, "\n[mode] {}", update.current_mode_id)?;
            }
            SessionUpdate::UserMessageChunk(_)
            | SessionUpdate::AvailableCommandsUpdate(_)
            | SessionUpdate::Unknown { .. } => {}
        }
        out.flush()?;
        Ok(())
    }
}

// ── Process plumbing ─────────────────────────────────────────────────────────

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
