//! Session coordinator.
//!
//! Owns one slot per configured agent and drives it through
//! `Disconnected → Spawning → Connecting → (AwaitingAuth) → Active`. At most
//! one agent holds a live session at a time: connecting to a second agent
//! disconnects the first. Every failure on the way to `Active` kills the
//! spawned process, so nothing is left half-registered.
//!
//! State changes are published as [`CoordinatorEvent`]s on a broadcast
//! channel.

pub mod auth;
pub mod events;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::acp::connection::{AcpConnection, ConnectionInfo};
use crate::acp::rpc::{InboundHandler, RpcConnection};
use crate::acp::schema::{PromptResponse, SessionNotification, SessionUpdate};
use crate::acp::tap::{TrafficObserver, TrafficTap};
use crate::client::fs::FileSystemProvider;
use crate::client::permission::{PermissionArbiter, PermissionChooser};
use crate::client::terminal::{TerminalManager, TerminalOptions};
use crate::client::{ClientCapabilityRouter, SessionUpdateListener};
use crate::config::{AgentConfig, GlobalConfig};
use crate::models::{Session, SlotState};
use crate::process::supervisor::{AgentProcessHandle, SupervisorOptions};
use crate::process::{ProcessEvent, ProcessSupervisor, SpawnedAgent};
use crate::{AppError, Result};

pub use auth::AuthMethodChooser;
pub use events::CoordinatorEvent;

/// Buffered coordinator events per subscriber.
const EVENT_CAPACITY: usize = 256;

/// How a prompt turn ended.
pub type PromptOutcome = PromptResponse;

/// Host collaborators the coordinator delegates to.
#[derive(Clone)]
pub struct CoordinatorDeps {
    /// File access for `fs/*`.
    pub fs: Arc<dyn FileSystemProvider>,
    /// Answers permission prompts.
    pub permission_chooser: Arc<dyn PermissionChooser>,
    /// Answers authentication prompts.
    pub auth_chooser: Arc<dyn AuthMethodChooser>,
    /// Optional traffic observer attached to every connection.
    pub traffic_observer: Option<Arc<dyn TrafficObserver>>,
}

struct AgentSlot {
    process: AgentProcessHandle,
    connection: Arc<AcpConnection>,
    session: Session,
}

#[derive(Default)]
struct State {
    slots: HashMap<String, AgentSlot>,
    phases: HashMap<String, SlotState>,
    active_session: Option<String>,
}

impl State {
    fn set_phase(&mut self, agent: &str, next: SlotState) {
        let current = self.phases.get(agent).copied().unwrap_or_default();
        if !current.can_transition_to(next) {
            warn!(agent, ?current, ?next, "unexpected slot transition");
        }
        self.phases.insert(agent.to_owned(), next);
    }

    fn slot_for_session(&self, session_id: &str) -> Option<&AgentSlot> {
        self.slots
            .values()
            .find(|slot| slot.session.session_id == session_id)
    }

    fn slot_for_session_mut(&mut self, session_id: &str) -> Option<&mut AgentSlot> {
        self.slots
            .values_mut()
            .find(|slot| slot.session.session_id == session_id)
    }
}

struct Inner {
    config: GlobalConfig,
    supervisor: ProcessSupervisor,
    router: Arc<ClientCapabilityRouter>,
    auth: Arc<dyn AuthMethodChooser>,
    traffic_observer: Option<Arc<dyn TrafficObserver>>,
    events: broadcast::Sender<CoordinatorEvent>,
    /// Serialises connect / disconnect sequences.
    ops: Mutex<()>,
    state: Mutex<State>,
}

/// Per-agent session lifecycle with the single-active-agent rule. Cheap to
/// clone.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("supervisor", &self.inner.supervisor)
            .finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    /// Build the coordinator and its background tasks. Must be called from
    /// within a Tokio runtime.
    #[must_use]
    pub fn new(config: GlobalConfig, deps: CoordinatorDeps) -> Self {
        let supervisor = ProcessSupervisor::new(SupervisorOptions::from(&config));
        let terminals = TerminalManager::new(TerminalOptions {
            cwd: config.cwd.clone(),
            output_byte_limit: config.terminal_output_byte_limit,
            kill_grace: config.kill_grace(),
        });
        let permissions = PermissionArbiter::spawn(config.auto_approve, deps.permission_chooser);
        let router = Arc::new(ClientCapabilityRouter::new(deps.fs, terminals, permissions));

        let (mode_tx, mode_rx) = mpsc::unbounded_channel();
        router.add_listener(Arc::new(ModeTracker { tx: mode_tx }));

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let process_events = supervisor.subscribe();

        let inner = Arc::new(Inner {
            config,
            supervisor,
            router,
            auth: deps.auth_chooser,
            traffic_observer: deps.traffic_observer,
            events,
            ops: Mutex::new(()),
            state: Mutex::new(State::default()),
        });

        tokio::spawn(watch_processes(Arc::downgrade(&inner), process_events));
        tokio::spawn(apply_mode_updates(Arc::downgrade(&inner), mode_rx));

        Self { inner }
    }

    /// Subscribe to coordinator events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.inner.events.subscribe()
    }

    /// Register a session-update listener on every connection.
    pub fn add_update_listener(&self, listener: Arc<dyn SessionUpdateListener>) {
        self.inner.router.add_listener(listener);
    }

    /// The inbound router, for hosts that need the terminal table.
    #[must_use]
    pub fn router(&self) -> &Arc<ClientCapabilityRouter> {
        &self.inner.router
    }

    /// Configured agents.
    #[must_use]
    pub fn agents(&self) -> &[AgentConfig] {
        &self.inner.config.agents
    }

    /// Connect to `name`, reusing its live session if there is one.
    ///
    /// Any other connected agent is disconnected first.
    ///
    /// # Errors
    ///
    /// - [`AppError::Config`] for an unknown agent name.
    /// - [`AppError::Spawn`] if the process cannot start.
    /// - [`AppError::Connection`] if the handshake fails or the process
    ///   exits before the session is registered.
    /// - [`AppError::NoAuthMethods`], [`AppError::AuthCancelled`] or
    ///   [`AppError::AuthFailed`] from the authentication sub-flow.
    pub async fn connect_to_agent(&self, name: &str) -> Result<Session> {
        let _ops = self.inner.ops.lock().await;
        self.connect_locked(name)
            .instrument(info_span!("connect_to_agent", agent = name))
            .await
    }

    /// Disconnect `name`. Unknown or unconnected names are a no-op.
    pub async fn disconnect_agent(&self, name: &str) {
        let _ops = self.inner.ops.lock().await;
        self.disconnect_locked(name).await;
    }

    /// Disconnect the current agent, clear the chat and reconnect.
    ///
    /// # Errors
    ///
    /// [`AppError::SessionNotFound`] if no session is active; otherwise
    /// whatever [`Self::connect_to_agent`] returns.
    pub async fn new_conversation(&self) -> Result<Session> {
        let _ops = self.inner.ops.lock().await;

        let agent = {
            let state = self.inner.state.lock().await;
            state
                .active_session
                .as_deref()
                .and_then(|id| state.slot_for_session(id))
                .map(|slot| slot.session.agent_name.clone())
        }
        .ok_or_else(|| AppError::SessionNotFound("no active session".into()))?;

        self.disconnect_locked(&agent).await;
        self.inner.emit(CoordinatorEvent::ClearChat);
        self.connect_locked(&agent)
            .instrument(info_span!("new_conversation", agent = %agent))
            .await
    }

    /// Run one prompt turn.
    ///
    /// # Errors
    ///
    /// [`AppError::SessionNotFound`] for an unknown session; otherwise the
    /// agent's error or a closed connection.
    pub async fn send_prompt(&self, session_id: &str, text: &str) -> Result<PromptOutcome> {
        let connection = self
            .connection_for(session_id)
            .await
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_owned()))?;

        debug!(session_id, chars = text.len(), "sending prompt");
        let outcome = connection.prompt(session_id, text).await?;
        info!(session_id, stop_reason = %outcome.stop_reason, "turn finished");
        Ok(outcome)
    }

    /// Ask the agent to stop the running turn. No-op for unknown sessions.
    ///
    /// # Errors
    ///
    /// [`AppError::Connection`] if the connection is already closed.
    pub async fn cancel_turn(&self, session_id: &str) -> Result<()> {
        let Some(connection) = self.connection_for(session_id).await else {
            debug!(session_id, "cancel for unknown session ignored");
            return Ok(());
        };
        connection.cancel(session_id).await
    }

    /// Switch the session mode. No-op for unknown sessions.
    ///
    /// # Errors
    ///
    /// Propagates the agent's error response or a closed connection.
    pub async fn set_mode(&self, session_id: &str, mode_id: &str) -> Result<()> {
        let Some(connection) = self.connection_for(session_id).await else {
            return Ok(());
        };
        connection.set_mode(session_id, mode_id).await?;

        if let Some(slot) = self.inner.state.lock().await.slot_for_session_mut(session_id) {
            slot.session.apply_mode(mode_id);
        }
        self.inner.emit(CoordinatorEvent::ModeChanged {
            session_id: session_id.to_owned(),
            mode_id: mode_id.to_owned(),
        });
        Ok(())
    }

    /// Switch the session model. No-op for unknown sessions.
    ///
    /// # Errors
    ///
    /// Propagates the agent's error response or a closed connection.
    pub async fn set_model(&self, session_id: &str, model_id: &str) -> Result<()> {
        let Some(connection) = self.connection_for(session_id).await else {
            return Ok(());
        };
        connection.set_model(session_id, model_id).await?;

        if let Some(slot) = self.inner.state.lock().await.slot_for_session_mut(session_id) {
            slot.session.apply_model(model_id);
        }
        self.inner.emit(CoordinatorEvent::ModelChanged {
            session_id: session_id.to_owned(),
            model_id: model_id.to_owned(),
        });
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Names of agents with a live session, sorted.
    pub async fn connected_agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.state.lock().await.slots.keys().cloned().collect();
        names.sort();
        names
    }

    /// The active session, if any.
    pub async fn active_session(&self) -> Option<Session> {
        let state = self.inner.state.lock().await;
        state
            .active_session
            .as_deref()
            .and_then(|id| state.slot_for_session(id))
            .map(|slot| slot.session.clone())
    }

    /// A session by id.
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.inner
            .state
            .lock()
            .await
            .slot_for_session(session_id)
            .map(|slot| slot.session.clone())
    }

    /// Handshake results for a connected agent.
    pub async fn connection_info(&self, agent: &str) -> Option<ConnectionInfo> {
        self.inner
            .state
            .lock()
            .await
            .slots
            .get(agent)
            .map(|slot| slot.connection.info().clone())
    }

    /// Lifecycle state of `agent`.
    pub async fn agent_state(&self, agent: &str) -> SlotState {
        self.inner
            .state
            .lock()
            .await
            .phases
            .get(agent)
            .copied()
            .unwrap_or_default()
    }

    /// Disconnect every agent and release all terminals.
    pub async fn shutdown(&self) {
        let _ops = self.inner.ops.lock().await;
        let names: Vec<String> = self.inner.state.lock().await.slots.keys().cloned().collect();
        for name in names {
            self.disconnect_locked(&name).await;
        }
        self.inner.supervisor.kill_all().await;
        self.inner.router.terminals().release_all().await;
        info!("coordinator shut down");
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn connection_for(&self, session_id: &str) -> Option<Arc<AcpConnection>> {
        self.inner
            .state
            .lock()
            .await
            .slot_for_session(session_id)
            .map(|slot| Arc::clone(&slot.connection))
    }

    async fn connect_locked(&self, name: &str) -> Result<Session> {
        if let Some(session) = self.reuse_session(name).await {
            return Ok(session);
        }

        let config = self
            .inner
            .config
            .agent(name)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("unknown agent '{name}'")))?;

        let connected: Vec<String> = self.inner.state.lock().await.slots.keys().cloned().collect();
        for other in connected {
            self.disconnect_locked(&other).await;
        }

        self.inner.state.lock().await.set_phase(name, SlotState::Spawning);
        let spawned = match self.inner.supervisor.spawn(name, &config).await {
            Ok(spawned) => spawned,
            Err(err) => {
                warn!(agent = name, error = %err, "agent failed to start");
                self.inner.state.lock().await.set_phase(name, SlotState::Disconnected);
                return Err(err);
            }
        };

        let SpawnedAgent {
            handle,
            stdin,
            stdout,
        } = spawned;

        let handler: Arc<dyn InboundHandler> = self.inner.router.clone();
        let rpc = match &self.inner.traffic_observer {
            Some(observer) => {
                let tap = TrafficTap::spawn(&handle.id, Arc::clone(observer));
                RpcConnection::start(&handle.id, tap.reader(stdout), tap.writer(stdin), handler)
            }
            None => RpcConnection::start(&handle.id, stdout, stdin, handler),
        };

        match self.open_session(name, &handle, rpc.clone()).await {
            Ok((connection, session)) => self.register(name, handle, connection, session).await,
            Err(err) => {
                warn!(agent = name, error = %err, "connect failed, killing agent");
                rpc.close();
                self.inner.supervisor.kill(&handle.id).await;
                self.inner.state.lock().await.set_phase(name, SlotState::Disconnected);
                Err(err)
            }
        }
    }

    async fn reuse_session(&self, name: &str) -> Option<Session> {
        let session = {
            let mut state = self.inner.state.lock().await;
            let slot = state.slots.get(name)?;
            if slot.connection.rpc().is_closed() {
                return None;
            }
            let session = slot.session.clone();
            state.active_session = Some(session.session_id.clone());
            session
        };

        debug!(agent = name, session_id = %session.session_id, "reusing live session");
        self.inner.emit(CoordinatorEvent::ActiveSessionChanged {
            session_id: Some(session.session_id.clone()),
        });
        Some(session)
    }

    async fn open_session(
        &self,
        name: &str,
        handle: &AgentProcessHandle,
        rpc: RpcConnection,
    ) -> Result<(Arc<AcpConnection>, Session)> {
        self.inner.state.lock().await.set_phase(name, SlotState::Connecting);
        let connection = AcpConnection::establish(&handle.id, rpc).await?;

        let cwd = self.inner.config.cwd.clone();
        let response = match connection.new_session(&cwd).await {
            Ok(response) => response,
            Err(AppError::AuthRequired(msg)) => {
                info!(agent = name, reason = %msg, "agent requires authentication");
                self.inner.state.lock().await.set_phase(name, SlotState::AwaitingAuth);
                auth::authenticate_and_retry(&connection, self.inner.auth.as_ref(), name, &cwd)
                    .await?
            }
            Err(err) => return Err(err),
        };

        let session = Session::from_response(response, &handle.id, name, cwd);
        Ok((Arc::new(connection), session))
    }

    async fn register(
        &self,
        name: &str,
        process: AgentProcessHandle,
        connection: Arc<AcpConnection>,
        session: Session,
    ) -> Result<Session> {
        {
            let mut state = self.inner.state.lock().await;
            // Checked under the state lock so a concurrent exit is either
            // seen here or finds the registered slot.
            if !self.inner.supervisor.is_running(&process.id).await {
                drop(state);
                connection.close();
                self.inner.state.lock().await.set_phase(name, SlotState::Disconnected);
                return Err(AppError::Connection(format!(
                    "agent '{name}' exited before its session was registered"
                )));
            }

            state.set_phase(name, SlotState::Active);
            state.active_session = Some(session.session_id.clone());
            state.slots.insert(
                name.to_owned(),
                AgentSlot {
                    process,
                    connection,
                    session: session.clone(),
                },
            );
        }

        info!(agent = name, session_id = %session.session_id, "agent connected");
        self.inner.emit(CoordinatorEvent::AgentConnected {
            agent: name.to_owned(),
        });
        self.inner.emit(CoordinatorEvent::ActiveSessionChanged {
            session_id: Some(session.session_id.clone()),
        });
        Ok(session)
    }

    async fn disconnect_locked(&self, name: &str) -> bool {
        let (slot, was_active) = {
            let mut state = self.inner.state.lock().await;
            let Some(slot) = state.slots.remove(name) else {
                return false;
            };
            state.set_phase(name, SlotState::Disconnected);
            let was_active = state.active_session.as_deref() == Some(&slot.session.session_id);
            if was_active {
                state.active_session = None;
            }
            (slot, was_active)
        };

        slot.connection.close();
        self.inner.supervisor.kill(&slot.process.id).await;
        info!(agent = name, session_id = %slot.session.session_id, "agent disconnected");

        self.inner.emit(CoordinatorEvent::AgentDisconnected {
            agent: name.to_owned(),
        });
        if was_active {
            self.inner
                .emit(CoordinatorEvent::ActiveSessionChanged { session_id: None });
        }
        true
    }
}

impl Inner {
    fn emit(&self, event: CoordinatorEvent) {
        debug!(event = event.name(), "coordinator event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn on_process_event(&self, event: ProcessEvent) {
        match event {
            ProcessEvent::StderrLine { .. } => {}

            ProcessEvent::Error { id, message } => {
                let agent = {
                    let state = self.state.lock().await;
                    state
                        .slots
                        .iter()
                        .find(|(_, slot)| slot.process.id == id)
                        .map_or(id, |(name, _)| name.clone())
                };
                self.emit(CoordinatorEvent::AgentError { agent, message });
            }

            ProcessEvent::Closed { id, code, signal } => {
                let closed = {
                    let mut state = self.state.lock().await;
                    let name = state
                        .slots
                        .iter()
                        .find(|(_, slot)| slot.process.id == id)
                        .map(|(name, _)| name.clone());
                    name.and_then(|name| {
                        let slot = state.slots.remove(&name)?;
                        state.set_phase(&name, SlotState::Disconnected);
                        let was_active =
                            state.active_session.as_deref() == Some(&slot.session.session_id);
                        if was_active {
                            state.active_session = None;
                        }
                        Some((name, slot, was_active))
                    })
                };

                // Exits of processes we killed ourselves land here with no slot.
                let Some((agent, slot, was_active)) = closed else {
                    return;
                };

                slot.connection.close();
                warn!(agent, ?code, ?signal, "agent process exited unexpectedly");
                self.emit(CoordinatorEvent::AgentDisconnected {
                    agent: agent.clone(),
                });
                self.emit(CoordinatorEvent::AgentClosed {
                    agent,
                    code,
                    signal,
                });
                if was_active {
                    self.emit(CoordinatorEvent::ActiveSessionChanged { session_id: None });
                }
            }
        }
    }

    async fn on_mode_update(&self, session_id: String, mode_id: String) {
        let changed = self
            .state
            .lock()
            .await
            .slot_for_session_mut(&session_id)
            .is_some_and(|slot| {
                slot.session.current_mode() != Some(mode_id.as_str())
                    && slot.session.apply_mode(&mode_id)
            });
        if changed {
            self.emit(CoordinatorEvent::ModeChanged {
                session_id,
                mode_id,
            });
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────────────

async fn watch_processes(inner: Weak<Inner>, mut rx: broadcast::Receiver<ProcessEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "coordinator lagged behind process events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.on_process_event(event).await;
    }
}

async fn apply_mode_updates(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<(String, String)>) {
    while let Some((session_id, mode_id)) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.on_mode_update(session_id, mode_id).await;
    }
}

/// Forwards agent-initiated mode switches to the coordinator.
struct ModeTracker {
    tx: mpsc::UnboundedSender<(String, String)>,
}

impl SessionUpdateListener for ModeTracker {
    fn on_update(&self, notification: &SessionNotification) -> Result<()> {
        if let SessionUpdate::CurrentModeUpdate(update) = &notification.update {
            self.tx
                .send((
                    notification.session_id.clone(),
                    update.current_mode_id.clone(),
                ))
                .map_err(|_| AppError::Connection("coordinator is gone".into()))?;
        }
        Ok(())
    }
}
