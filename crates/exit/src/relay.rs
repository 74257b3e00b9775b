//! Bidirectional relay between the inbound message connection and the
//! outbound byte stream.
//!
//! Both directions run concurrently in the session's task. Whichever ends
//! first (end of stream, peer close, or an I/O error) triggers teardown of
//! both endpoints, and teardown runs exactly once.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use tunnelgate_core::TunnelError;

use crate::{CloseNotice, Frame};

/// Read buffer for the outbound → inbound direction. Each nonzero read is
/// forwarded as exactly one message.
pub const RELAY_BUFFER_SIZE: usize = 8192;

/// Shared shutdown state for the two relay directions.
#[derive(Debug)]
pub struct Teardown {
    inbound_open: AtomicBool,
    done: AtomicBool,
}

impl Teardown {
    pub fn new() -> Self {
        Self {
            inbound_open: AtomicBool::new(true),
            done: AtomicBool::new(false),
        }
    }

    /// Whether messages may still be sent to the peer
    pub fn inbound_open(&self) -> bool {
        self.inbound_open.load(Ordering::Acquire)
    }

    pub fn mark_inbound_closed(&self) {
        self.inbound_open.store(false, Ordering::Release);
    }

    /// Claim the teardown. Returns `true` for the first caller only.
    pub fn begin(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

/// Why relaying stopped
#[derive(Debug)]
pub enum RelayEnd {
    /// The peer closed the message connection
    PeerClosed,
    /// The destination closed the outbound stream
    RemoteClosed,
    /// The message connection itself failed
    InboundFailed(TunnelError),
    /// A write to the peer, or a read or write on the outbound stream, failed
    Failed(TunnelError),
}

impl fmt::Display for RelayEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("peer closed"),
            Self::RemoteClosed => f.write_str("remote closed"),
            Self::InboundFailed(e) | Self::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Result of one relay run
#[derive(Debug)]
pub struct RelayReport {
    pub end: RelayEnd,
    /// Bytes written to the outbound stream, initial payload included
    pub bytes_up: u64,
    /// Bytes forwarded to the peer
    pub bytes_down: u64,
}

#[derive(Default)]
struct Counters {
    up: AtomicU64,
    down: AtomicU64,
}

/// Relay until either side ends, then tear both down.
///
/// `initial` is written to the outbound stream before any later inbound
/// message. `session` only tags log lines.
pub async fn relay<S, E, K, F, O>(
    mut inbound_rx: S,
    mut inbound_tx: K,
    outbound: O,
    initial: Bytes,
    session: &str,
) -> RelayReport
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: fmt::Display,
    K: Sink<Frame, Error = F> + Unpin,
    F: fmt::Display,
    O: AsyncRead + AsyncWrite + Unpin,
{
    let teardown = Teardown::new();
    let counters = Counters::default();
    let (mut reader, mut writer) = tokio::io::split(outbound);

    let end = tokio::select! {
        end = pump_upstream(&mut inbound_rx, &mut writer, initial, &teardown, &counters) => end,
        end = pump_downstream(&mut reader, &mut inbound_tx, &teardown, &counters) => end,
    };

    match &end {
        RelayEnd::InboundFailed(e) | RelayEnd::Failed(e) => {
            warn!("Session {} relay failed: {}", session, e)
        }
        other => debug!("Session {} relay ended: {}", session, other),
    }

    close_both(&teardown, &mut writer, &mut inbound_tx, &end, session).await;

    RelayReport {
        end,
        bytes_up: counters.up.load(Ordering::Relaxed),
        bytes_down: counters.down.load(Ordering::Relaxed),
    }
}

/// Inbound messages → outbound stream
async fn pump_upstream<S, E, W>(
    inbound_rx: &mut S,
    writer: &mut W,
    initial: Bytes,
    teardown: &Teardown,
    counters: &Counters,
) -> RelayEnd
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: fmt::Display,
    W: AsyncWrite + Unpin,
{
    if !initial.is_empty() {
        if let Err(e) = writer.write_all(&initial).await {
            return RelayEnd::Failed(TunnelError::RelayIo(format!("outbound write: {}", e)));
        }
        counters.up.fetch_add(initial.len() as u64, Ordering::Relaxed);
    }

    while let Some(item) = inbound_rx.next().await {
        match item {
            Ok(Frame::Data(data)) => {
                if let Err(e) = writer.write_all(&data).await {
                    return RelayEnd::Failed(TunnelError::RelayIo(format!("outbound write: {}", e)));
                }
                counters.up.fetch_add(data.len() as u64, Ordering::Relaxed);
            }
            Ok(Frame::Close(notice)) => {
                if let Some(notice) = notice {
                    debug!("Peer close: code={} reason='{}'", notice.code(), notice.reason());
                }
                teardown.mark_inbound_closed();
                return RelayEnd::PeerClosed;
            }
            Err(e) => {
                return RelayEnd::InboundFailed(TunnelError::RelayIo(format!(
                    "inbound read: {}",
                    e
                )));
            }
        }
    }

    teardown.mark_inbound_closed();
    RelayEnd::PeerClosed
}

/// Outbound stream → inbound messages
async fn pump_downstream<R, K, F>(
    reader: &mut R,
    inbound_tx: &mut K,
    teardown: &Teardown,
    counters: &Counters,
) -> RelayEnd
where
    R: AsyncRead + Unpin,
    K: Sink<Frame, Error = F> + Unpin,
    F: fmt::Display,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return RelayEnd::RemoteClosed,
            Ok(n) => n,
            Err(e) => {
                return RelayEnd::Failed(TunnelError::RelayIo(format!("outbound read: {}", e)));
            }
        };

        if !teardown.inbound_open() {
            debug!("Inbound closed, dropping {} bytes from remote", n);
            return RelayEnd::PeerClosed;
        }

        if let Err(e) = inbound_tx.send(Frame::Data(Bytes::copy_from_slice(&buf[..n]))).await {
            teardown.mark_inbound_closed();
            return RelayEnd::Failed(TunnelError::RelayIo(format!("inbound send: {}", e)));
        }
        counters.down.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Shut the outbound stream and close the inbound connection if the peer
/// has not already done so. Close errors are logged only.
async fn close_both<W, K, F>(
    teardown: &Teardown,
    writer: &mut W,
    inbound_tx: &mut K,
    end: &RelayEnd,
    session: &str,
) where
    W: AsyncWrite + Unpin,
    K: Sink<Frame, Error = F> + Unpin,
    F: fmt::Display,
{
    if !teardown.begin() {
        return;
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Session {} outbound shutdown: {}", session, e);
    }

    if teardown.inbound_open() {
        teardown.mark_inbound_closed();
        let notice = match end {
            RelayEnd::Failed(e) => Some(CloseNotice::internal_error(e.to_string())),
            RelayEnd::InboundFailed(_) => Some(CloseNotice::going_away("connection error")),
            _ => None,
        };
        if let Err(e) = inbound_tx.send(Frame::Close(notice)).await {
            debug!("Session {} inbound close: {}", session, e);
        }
    }
}
