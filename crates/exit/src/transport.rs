//! Message-side view of an inbound connection
//!
//! The upgraded socket is consumed as a stream of [`Frame`]s and written to
//! as a sink of [`Frame`]s. Text messages arrive as their UTF-8 bytes; ping
//! and pong never reach this layer.

use bytes::Bytes;

/// Close code: endpoint going away (the message connection itself failed)
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close code: server hit an unexpected condition
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Longest close reason that fits a control frame next to the 2-byte code
pub const MAX_CLOSE_REASON_LEN: usize = 123;

/// One message exchanged with the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Application bytes
    Data(Bytes),
    /// Close handshake, optionally with a code and reason
    Close(Option<CloseNotice>),
}

impl Frame {
    pub fn data(bytes: impl Into<Bytes>) -> Self {
        Self::Data(bytes.into())
    }
}

/// Code and human-readable reason carried by a close frame.
///
/// The reason never exceeds [`MAX_CLOSE_REASON_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseNotice {
    code: u16,
    reason: String,
}

impl CloseNotice {
    /// Longer reasons are cut on a character boundary.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.len() > MAX_CLOSE_REASON_LEN {
            let mut end = MAX_CLOSE_REASON_LEN;
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            reason.truncate(end);
        }
        Self { code, reason }
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_INTERNAL_ERROR, reason)
    }

    pub fn going_away(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_GOING_AWAY, reason)
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}
