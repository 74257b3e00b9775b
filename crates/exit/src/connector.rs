//! Outbound connector
//!
//! Opens the raw stream to the destination named in a tunnel header. IP
//! targets are dialled directly; domain names go through the runtime's
//! resolver. Every attempt is bounded by a connect timeout.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use tunnelgate_core::{Result, TargetAddress, TunnelError};

/// Default bound on a single outbound connect attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens outbound streams for sessions.
pub trait Connect: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(
        &self,
        address: &TargetAddress,
        port: u16,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// TCP connector used in production
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

/// Bound `attempt` by `limit`, tagging either failure with the target.
async fn bounded<T, F>(limit: Duration, address: &TargetAddress, port: u16, attempt: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(TunnelError::ConnectFailed {
            host: address.to_string(),
            port,
            reason: e.to_string(),
        }),
        Err(_) => Err(TunnelError::Timeout {
            host: address.to_string(),
            port,
            secs: limit.as_secs(),
        }),
    }
}

async fn dial(address: &TargetAddress, port: u16) -> std::io::Result<TcpStream> {
    match address {
        TargetAddress::Ipv4(ip) => TcpStream::connect((*ip, port)).await,
        TargetAddress::Ipv6(ip) => TcpStream::connect((*ip, port)).await,
        TargetAddress::Domain(name) => TcpStream::connect((name.as_str(), port)).await,
    }
}

impl Connect for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, address: &TargetAddress, port: u16) -> Result<TcpStream> {
        debug!("Dialing {}:{}", address, port);

        let stream = bounded(self.connect_timeout, address, port, dial(address, port)).await?;

        if let Ok(peer) = stream.peer_addr() {
            debug!("Connected to {}:{} via {}", address, port, peer);
        }
        Ok(stream)
    }
}
