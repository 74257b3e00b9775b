use thiserror::Error;

/// Reasons a session can fail, from the HTTP upgrade through relaying.
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Not a websocket upgrade request")]
    NotAnUpgradeRequest,

    #[error("Malformed header: {0}")]
    MalformedHeader(#[from] HeaderError),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Connect to {host}:{port} failed: {reason}")]
    ConnectFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Relay I/O error: {0}")]
    RelayIo(String),

    #[error("Invalid identity token: {0}")]
    InvalidIdentity(String),

    #[error("Connect to {host}:{port} timed out after {secs}s")]
    Timeout { host: String, port: u16, secs: u64 },
}

/// Why the first inbound message could not be decoded as a header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("message truncated reading {field} (need {need} bytes, have {have})")]
    Truncated {
        field: &'static str,
        need: usize,
        have: usize,
    },

    #[error("unknown address type {0}")]
    UnknownAddressType(u8),

    #[error("empty domain name")]
    EmptyDomain,

    #[error("domain name is not valid UTF-8")]
    InvalidDomain,
}

pub type Result<T> = std::result::Result<T, TunnelError>;
