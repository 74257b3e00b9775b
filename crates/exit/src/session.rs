//! Per-connection session handling
//!
//! A session walks `AwaitingHeader → Authenticating → Connecting → Relaying
//! → Closing → Closed`. Failures before `Relaying` skip straight to
//! `Closing`. Every error stays inside the session and ends up in the
//! returned [`SessionSummary`].

use std::fmt;

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, info, trace, warn};

use tunnelgate_core::{
    decode_header, Ack, Identity, IdentityBytes, ParsedHeader, Result, TunnelError, IDENTITY_LEN,
};

use crate::relay::{relay, RelayEnd, RelayReport};
use crate::{CloseNotice, Connect, Frame};

/// Lifecycle state of one inbound connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHeader,
    Authenticating,
    Connecting,
    Relaying,
    Closing,
    Closed,
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The peer left before sending a header
    Abandoned,
    /// Malformed header or wrong identity; closed without a reply
    Rejected(TunnelError),
    /// Outbound connect failed; error acknowledgement sent
    ConnectFailed(TunnelError),
    /// Relay ran and was torn down
    Relayed(RelayReport),
}

/// Record of a finished session
#[derive(Debug)]
pub struct SessionSummary {
    /// Short random id used in log lines
    pub id: String,
    /// `host:port` once a header was accepted
    pub target: Option<String>,
    pub state: SessionState,
    pub outcome: SessionOutcome,
}

/// Lifecycle tracker for a single run
struct Session {
    id: String,
    state: SessionState,
}

impl Session {
    fn new() -> Self {
        Self {
            id: hex::encode(rand::random::<[u8; 4]>()),
            state: SessionState::AwaitingHeader,
        }
    }

    fn advance(&mut self, next: SessionState) {
        trace!("Session {} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

/// Handles inbound connections for one server.
///
/// Holds the only process-wide state a session reads: the expected identity
/// and the outbound connector. Both are fixed at construction.
pub struct SessionHandler<C> {
    identity: Identity,
    connector: C,
}

impl<C: Connect> SessionHandler<C> {
    pub fn new(identity: Identity, connector: C) -> Self {
        Self {
            identity,
            connector,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Decode the header and check its identity.
    ///
    /// The identity comparison runs even when decoding fails, so a garbled
    /// header and a wrong token take the same path.
    pub fn authenticate(&self, msg: &[u8]) -> Result<ParsedHeader> {
        let decoded = decode_header(msg);
        let claimed: IdentityBytes = match &decoded {
            Ok(header) => header.identity,
            Err(_) => [0u8; IDENTITY_LEN],
        };
        let verified = self.identity.verify(&claimed);
        let header = decoded?;
        verified?;
        Ok(header)
    }

    /// Run one session to completion over the given inbound halves.
    pub async fn run<S, E, K, F>(&self, inbound_rx: S, inbound_tx: K) -> SessionSummary
    where
        S: Stream<Item = std::result::Result<Frame, E>> + Unpin,
        E: fmt::Display,
        K: Sink<Frame, Error = F> + Unpin,
        F: fmt::Display,
    {
        let mut session = Session::new();
        debug!("Session {} opened", session.id);

        let (target, outcome) = self.drive(&mut session, inbound_rx, inbound_tx).await;
        session.advance(SessionState::Closed);

        let target_label = target.as_deref().unwrap_or("-");
        match &outcome {
            SessionOutcome::Abandoned => debug!("Session {} abandoned before header", session.id),
            SessionOutcome::Rejected(e) => debug!("Session {} rejected: {}", session.id, e),
            SessionOutcome::ConnectFailed(e) => {
                info!("Session {} to {} failed: {}", session.id, target_label, e)
            }
            SessionOutcome::Relayed(report) => info!(
                "Session {} to {} closed ({}): {} bytes up, {} bytes down",
                session.id, target_label, report.end, report.bytes_up, report.bytes_down
            ),
        }

        SessionSummary {
            id: session.id,
            target,
            state: session.state,
            outcome,
        }
    }

    async fn drive<S, E, K, F>(
        &self,
        session: &mut Session,
        mut inbound_rx: S,
        mut inbound_tx: K,
    ) -> (Option<String>, SessionOutcome)
    where
        S: Stream<Item = std::result::Result<Frame, E>> + Unpin,
        E: fmt::Display,
        K: Sink<Frame, Error = F> + Unpin,
        F: fmt::Display,
    {
        let first = match inbound_rx.next().await {
            Some(Ok(Frame::Data(msg))) => msg,
            Some(Ok(Frame::Close(notice))) => {
                match notice {
                    Some(notice) => debug!(
                        "Session {} peer closed before header: code={} reason='{}'",
                        session.id,
                        notice.code(),
                        notice.reason()
                    ),
                    None => debug!("Session {} peer closed before header", session.id),
                }
                session.advance(SessionState::Closing);
                return (None, SessionOutcome::Abandoned);
            }
            None => {
                session.advance(SessionState::Closing);
                return (None, SessionOutcome::Abandoned);
            }
            Some(Err(e)) => {
                debug!("Session {} inbound error before header: {}", session.id, e);
                session.advance(SessionState::Closing);
                let notice = CloseNotice::going_away("connection error");
                if let Err(e) = inbound_tx.send(Frame::Close(Some(notice))).await {
                    debug!("Session {} close: {}", session.id, e);
                }
                return (None, SessionOutcome::Abandoned);
            }
        };

        session.advance(SessionState::Authenticating);
        let header = match self.authenticate(&first) {
            Ok(header) => header,
            Err(e) => {
                session.advance(SessionState::Closing);
                close_quietly(&mut inbound_tx, &session.id).await;
                return (None, SessionOutcome::Rejected(e));
            }
        };

        let host = header.address.to_string();
        let target = format!("{}:{}", host, header.port);

        session.advance(SessionState::Connecting);
        info!("Session {} connecting to {}", session.id, target);

        let stream = match self.connector.connect(&header.address, header.port).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    "Session {} connect error: host={} port={} cause={}",
                    session.id, host, header.port, e
                );
                session.advance(SessionState::Closing);
                reply_connect_failed(&mut inbound_tx, header.version, &target, &session.id).await;
                return (Some(target), SessionOutcome::ConnectFailed(e));
            }
        };

        let ack = Bytes::copy_from_slice(&Ack::ok(header.version).to_bytes());
        if let Err(e) = inbound_tx.send(Frame::Data(ack)).await {
            debug!("Session {} peer gone before ack: {}", session.id, e);
            session.advance(SessionState::Closing);
            drop(stream);
            let report = RelayReport {
                end: RelayEnd::Failed(TunnelError::RelayIo(format!("inbound send: {}", e))),
                bytes_up: 0,
                bytes_down: 0,
            };
            return (Some(target), SessionOutcome::Relayed(report));
        }

        session.advance(SessionState::Relaying);
        let initial = first.slice(header.payload_offset..);
        let report = relay(inbound_rx, inbound_tx, stream, initial, &session.id).await;
        session.advance(SessionState::Closing);

        (Some(target), SessionOutcome::Relayed(report))
    }
}

/// Close without sending any payload, so rejected peers learn nothing.
async fn close_quietly<K, F>(inbound_tx: &mut K, session: &str)
where
    K: Sink<Frame, Error = F> + Unpin,
    F: fmt::Display,
{
    if let Err(e) = inbound_tx.send(Frame::Close(None)).await {
        debug!("Session {} close: {}", session, e);
    }
}

async fn reply_connect_failed<K, F>(inbound_tx: &mut K, version: u8, target: &str, session: &str)
where
    K: Sink<Frame, Error = F> + Unpin,
    F: fmt::Display,
{
    let ack = Bytes::copy_from_slice(&Ack::error(version).to_bytes());
    if let Err(e) = inbound_tx.send(Frame::Data(ack)).await {
        debug!("Session {} error ack not sent: {}", session, e);
        return;
    }
    let notice = CloseNotice::internal_error(format!("failed to connect to {}", target));
    if let Err(e) = inbound_tx.send(Frame::Close(Some(notice))).await {
        debug!("Session {} close: {}", session, e);
    }
}
