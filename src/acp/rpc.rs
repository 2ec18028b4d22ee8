//! Bidirectional JSON-RPC connection over an NDJSON byte stream.
//!
//! [`RpcConnection::start`] takes any reader/writer pair (a child's
//! stdout/stdin, or an in-memory duplex in tests) and spawns two tasks:
//!
//! - the **reader** decodes lines with [`AcpCodec`], completes pending
//!   outbound calls, starts one task per inbound request, and delivers
//!   notifications inline so their order is preserved. A line over the
//!   codec's cap is skipped without closing the connection;
//! - the **writer** drains an outbound queue and writes one JSON line per
//!   message.
//!
//! When the stream ends, every pending call fails with
//! [`AppError::Connection`]`("connection closed")` and so does every later
//! call.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use futures_util::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::acp::codec::AcpCodec;
use crate::acp::protocol::{RequestId, RpcError, RpcMessage};
use crate::{AppError, Result};

/// Capacity of the outbound message queue.
const OUTBOUND_CAPACITY: usize = 64;

/// Future returned by [`InboundHandler::handle_request`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = std::result::Result<Value, RpcError>> + Send + 'static>>;

/// Receiver of agent-initiated traffic.
pub trait InboundHandler: Send + Sync {
    /// Start answering an inbound request. The resolved value becomes the
    /// `result` of the response; an error becomes its `error` object.
    ///
    /// Called on the reader task in wire order, before the returned future
    /// is moved onto its own task. Anything done before returning (such as
    /// taking a queue position) therefore follows arrival order. Must not
    /// block.
    fn handle_request(self: Arc<Self>, method: String, params: Value) -> HandlerFuture;

    /// Consume an inbound notification. Called from the reader loop, so
    /// implementations must not block.
    fn handle_notification(&self, method: &str, params: Value);
}

type Reply = std::result::Result<Value, RpcError>;

#[derive(Default)]
struct PendingCalls {
    closed: bool,
    waiters: HashMap<i64, oneshot::Sender<Reply>>,
}

struct Shared {
    label: String,
    next_id: AtomicI64,
    pending: Mutex<PendingCalls>,
    outbound: mpsc::Sender<Value>,
    cancel: CancellationToken,
}

/// Handle to a running JSON-RPC connection. Cheap to clone.
#[derive(Clone)]
pub struct RpcConnection {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("label", &self.shared.label)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl RpcConnection {
    /// Start the reader and writer tasks for a stream pair.
    ///
    /// `label` identifies the peer in log output (usually the agent id).
    pub fn start<R, W>(
        label: impl Into<String>,
        reader: R,
        writer: W,
        handler: Arc<dyn InboundHandler>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let shared = Arc::new(Shared {
            label: label.into(),
            next_id: AtomicI64::new(1),
            pending: Mutex::new(PendingCalls::default()),
            outbound: outbound_tx,
            cancel: CancellationToken::new(),
        });

        tokio::spawn(run_writer(
            shared.label.clone(),
            writer,
            outbound_rx,
            shared.cancel.clone(),
        ));
        tokio::spawn(run_reader(Arc::clone(&shared), reader, handler));

        Self { shared }
    }

    /// Send a request and wait for its response.
    ///
    /// # Errors
    ///
    /// - [`AppError::Connection`] if the connection is or becomes closed.
    /// - [`AppError::AuthRequired`] if the agent answered with the
    ///   auth-required error.
    /// - [`AppError::Rpc`] for any other error response.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.shared.pending.lock().await;
            if pending.closed {
                return Err(closed_error());
            }
            pending.waiters.insert(id, tx);
        }

        let message = RpcMessage::Request {
            id: RequestId::Number(id),
            method: method.to_owned(),
            params,
        };
        debug!(peer = %self.shared.label, method, id, "rpc: sending request");

        if self.shared.outbound.send(message.to_value()).await.is_err() {
            self.shared.pending.lock().await.waiters.remove(&id);
            return Err(closed_error());
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                debug!(peer = %self.shared.label, method, id, error = %err, "rpc: error response");
                Err(err.into_app_error())
            }
            Err(_) => Err(closed_error()),
        }
    }

    /// Send a notification; no response is expected.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Connection`] if the connection is closed.
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let message = RpcMessage::Notification {
            method: method.to_owned(),
            params,
        };
        debug!(peer = %self.shared.label, method, "rpc: sending notification");
        self.shared
            .outbound
            .send(message.to_value())
            .await
            .map_err(|_| closed_error())
    }

    /// Stop both tasks. Pending calls fail with [`AppError::Connection`].
    pub fn close(&self) {
        self.shared.cancel.cancel();
    }

    /// Whether the connection has been closed by either side.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.shared.cancel.cancelled().await;
    }

    /// Peer label used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.shared.label
    }
}

fn closed_error() -> AppError {
    AppError::Connection("connection closed".into())
}

// ── Tasks ────────────────────────────────────────────────────────────────────

async fn run_reader<R>(shared: Arc<Shared>, reader: R, handler: Arc<dyn InboundHandler>)
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(reader, AcpCodec::new());
    let peer = shared.label.clone();
    // FramedRead yields a single `None` after a decode error before it
    // resumes reading; that one is not EOF.
    let mut after_framing_error = false;

    loop {
        tokio::select! {
            biased;

            () = shared.cancel.cancelled() => {
                debug!(peer, "rpc reader: cancelled");
                break;
            }

            item = framed.next() => match item {
                None if after_framing_error => {
                    after_framing_error = false;
                }
                None => {
                    debug!(peer, "rpc reader: EOF");
                    break;
                }
                Some(Err(AppError::Acp(msg))) => {
                    warn!(peer, error = msg.as_str(), "rpc reader: framing error, skipping line");
                    after_framing_error = true;
                }
                Some(Err(e)) => {
                    warn!(peer, error = %e, "rpc reader: stream error, closing");
                    break;
                }
                Some(Ok(line)) => match RpcMessage::parse(&line) {
                    Ok(Some(message)) => dispatch(&shared, &handler, message).await,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(peer, error = %e, raw_line = %line, "rpc reader: skipping malformed line");
                    }
                },
            }
        }
    }

    shared.cancel.cancel();
    fail_pending(&shared).await;
}

async fn dispatch(shared: &Arc<Shared>, handler: &Arc<dyn InboundHandler>, message: RpcMessage) {
    match message {
        RpcMessage::Response { id, outcome } => {
            let waiter = match id {
                RequestId::Number(n) => shared.pending.lock().await.waiters.remove(&n),
                RequestId::Str(_) => None,
            };
            match waiter {
                Some(tx) => {
                    // The caller may have given up; nothing to do then.
                    let _ = tx.send(outcome);
                }
                None => {
                    warn!(peer = %shared.label, %id, "rpc reader: response for unknown id dropped");
                }
            }
        }

        RpcMessage::Notification { method, params } => {
            let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| {
                handler.handle_notification(&method, params);
            }));
            if delivered.is_err() {
                warn!(peer = %shared.label, method, "rpc reader: notification handler panicked");
            }
        }

        RpcMessage::Request { id, method, params } => {
            let outbound = shared.outbound.clone();
            let peer = shared.label.clone();
            debug!(peer, method, %id, "rpc reader: inbound request");

            // Invoked here rather than on the spawned task so requests are
            // admitted in the order they arrived.
            let started = std::panic::catch_unwind(AssertUnwindSafe(|| {
                Arc::clone(handler).handle_request(method.clone(), params)
            }));

            tokio::spawn(async move {
                let outcome = match started {
                    Ok(future) => AssertUnwindSafe(future).catch_unwind().await.ok(),
                    Err(_) => None,
                }
                .unwrap_or_else(|| {
                    warn!(peer, method, "rpc: request handler panicked");
                    Err(RpcError::internal(format!("handler for {method} panicked")))
                });

                if let Err(err) = &outcome {
                    debug!(peer, method, %id, error = %err, "rpc: answering with error");
                }

                let response = RpcMessage::Response { id, outcome };
                if outbound.send(response.to_value()).await.is_err() {
                    debug!(peer, method, "rpc: connection closed before response was written");
                }
            });
        }
    }
}

async fn fail_pending(shared: &Shared) {
    let waiters = {
        let mut pending = shared.pending.lock().await;
        pending.closed = true;
        std::mem::take(&mut pending.waiters)
    };

    if !waiters.is_empty() {
        debug!(peer = %shared.label, count = waiters.len(), "rpc: failing pending calls");
    }
    // Dropping each sender wakes its caller with a closed-connection error.
    drop(waiters);
}

/// Serialise outbound messages as NDJSON until cancelled or the queue closes.
///
/// A write failure closes the whole connection.
async fn run_writer<W>(
    peer: String,
    mut writer: W,
    mut rx: mpsc::Receiver<Value>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(peer, "rpc writer: cancelled");
                break;
            }

            msg = rx.recv() => {
                let Some(value) = msg else {
                    debug!(peer, "rpc writer: queue closed");
                    break;
                };

                if let Err(e) = write_line(&mut writer, &value).await {
                    warn!(peer, error = %e, "rpc writer: write failed, closing connection");
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    let _ = writer.shutdown().await;
}

async fn write_line<W>(writer: &mut W, value: &Value) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(value)
        .map_err(|e| AppError::Acp(format!("failed to serialise outbound message: {e}")))?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
