//! TunnelGate Daemon
//!
//! HTTP front of the gateway. Accepts WebSocket upgrades on any path and
//! hands each upgraded socket to a `SessionHandler`.
//!
//! ## Components
//!
//! - **GatewayServer**: binds the listener and serves the router until shutdown
//! - **upgrade**: the fallback handler and the socket ↔ frame adapter

mod server;
pub mod upgrade;

pub use server::{router, GatewayServer};
pub use upgrade::NOT_UPGRADE_BODY;

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
