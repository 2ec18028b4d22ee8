//! Pass-through observation of agent traffic.
//!
//! [`TrafficTap`] wraps the read and write halves of an agent stream. Bytes
//! flow through untouched; complete lines are copied onto an unbounded
//! channel without blocking the data path. A separate observer task
//! classifies each line and hands it to a [`TrafficObserver`]. Observer
//! failures are logged and never reach the connection.

use std::io;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::acp::codec::MAX_LINE_BYTES;
use crate::acp::protocol::MessageKind;
use crate::Result;

/// Which way a line travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Agent → client.
    Inbound,
    /// Client → agent.
    Outbound,
}

impl Direction {
    /// Short label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "in",
            Self::Outbound => "out",
        }
    }
}

/// One observed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRecord {
    /// Peer label the tap was created for.
    pub peer: String,
    /// Direction of travel.
    pub direction: Direction,
    /// Message shape.
    pub kind: MessageKind,
    /// Raw line without the trailing newline.
    pub line: String,
}

/// Consumer of observed traffic.
pub trait TrafficObserver: Send + Sync {
    /// Inspect one record.
    ///
    /// # Errors
    ///
    /// Any error is logged by the tap and otherwise ignored.
    fn observe(&self, record: &TrafficRecord) -> Result<()>;
}

/// Observer that writes every record to the `acp::traffic` trace target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl TrafficObserver for LoggingObserver {
    fn observe(&self, record: &TrafficRecord) -> Result<()> {
        trace!(
            target: "acp::traffic",
            peer = record.peer.as_str(),
            direction = record.direction.as_str(),
            kind = record.kind.as_str(),
            line = record.line.as_str(),
        );
        Ok(())
    }
}

type TapLine = (Direction, String);

/// Factory for tapped stream halves that share one observer task.
#[derive(Debug, Clone)]
pub struct TrafficTap {
    tx: mpsc::UnboundedSender<TapLine>,
}

impl TrafficTap {
    /// Spawn the observer task. It runs until every tap handle and wrapped
    /// stream has been dropped.
    pub fn spawn(peer: impl Into<String>, observer: Arc<dyn TrafficObserver>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_observer(peer.into(), rx, observer));
        Self { tx }
    }

    /// Wrap the inbound half.
    pub fn reader<R>(&self, inner: R) -> TappedReader<R> {
        TappedReader {
            inner,
            lines: LineSplitter::new(Direction::Inbound, self.tx.clone()),
        }
    }

    /// Wrap the outbound half.
    pub fn writer<W>(&self, inner: W) -> TappedWriter<W> {
        TappedWriter {
            inner,
            lines: LineSplitter::new(Direction::Outbound, self.tx.clone()),
        }
    }
}

async fn run_observer(
    peer: String,
    mut rx: mpsc::UnboundedReceiver<TapLine>,
    observer: Arc<dyn TrafficObserver>,
) {
    while let Some((direction, line)) = rx.recv().await {
        let record = TrafficRecord {
            peer: peer.clone(),
            direction,
            kind: MessageKind::of_line(&line),
            line,
        };

        match std::panic::catch_unwind(AssertUnwindSafe(|| observer.observe(&record))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(peer, error = %e, "traffic observer failed"),
            Err(_) => warn!(peer, "traffic observer panicked"),
        }
    }
}

// ── Line splitting ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct LineSplitter {
    direction: Direction,
    tx: mpsc::UnboundedSender<TapLine>,
    buf: Vec<u8>,
    /// Set while skipping the remainder of an oversize line.
    overflow: bool,
}

impl LineSplitter {
    fn new(direction: Direction, tx: mpsc::UnboundedSender<TapLine>) -> Self {
        Self {
            direction,
            tx,
            buf: Vec::new(),
            overflow: false,
        }
    }

    fn feed(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            match bytes.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.append(&bytes[..pos]);
                    self.finish_line();
                    bytes = &bytes[pos + 1..];
                }
                None => {
                    self.append(bytes);
                    break;
                }
            }
        }
    }

    fn append(&mut self, chunk: &[u8]) {
        if self.overflow {
            return;
        }
        if self.buf.len() + chunk.len() > MAX_LINE_BYTES {
            self.buf.clear();
            self.overflow = true;
            return;
        }
        self.buf.extend_from_slice(chunk);
    }

    fn finish_line(&mut self) {
        if std::mem::take(&mut self.overflow) {
            return;
        }
        let raw = std::mem::take(&mut self.buf);
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return;
        }
        // The observer task may be gone; the data path does not care.
        let _ = self.tx.send((self.direction, line.to_owned()));
    }
}

// ── Stream wrappers ──────────────────────────────────────────────────────────

/// Inbound half that copies complete lines to the tap.
#[derive(Debug)]
pub struct TappedReader<R> {
    inner: R,
    lines: LineSplitter,
}

impl<R: AsyncRead + Unpin> AsyncRead for TappedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            this.lines.feed(&buf.filled()[before..]);
        }
        poll
    }
}

/// Outbound half that copies complete lines to the tap.
#[derive(Debug)]
pub struct TappedWriter<W> {
    inner: W,
    lines: LineSplitter,
}

impl<W: AsyncWrite + Unpin> AsyncWrite for TappedWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = &poll {
            this.lines.feed(&buf[..*written]);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
