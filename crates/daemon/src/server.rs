//! Gateway server bootstrap

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use tunnelgate_exit::{Connect, SessionHandler, TcpConnector};
use tunnelgate_settings::ServerConfig;

use crate::upgrade::tunnel_handler;
use crate::{Result, ServerError};

/// Build the router: every path goes to the upgrade handler
pub fn router<C: Connect>(handler: Arc<SessionHandler<C>>) -> Router {
    Router::new()
        .fallback(tunnel_handler::<C>)
        .with_state(handler)
}

/// Listening gateway, bound but not yet serving
pub struct GatewayServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl GatewayServer {
    /// Bind the configured address with the production TCP connector
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let handler = SessionHandler::new(
            config.identity.clone(),
            TcpConnector::new(config.connect_timeout),
        );
        Self::bind_with(config.listen_addr, Arc::new(handler)).await
    }

    /// Bind `addr` with any connector
    pub async fn bind_with<C: Connect>(
        addr: SocketAddr,
        handler: Arc<SessionHandler<C>>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            router: router(handler),
            local_addr,
        })
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("WebSocket server is running on {}", self.local_addr);

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!("WebSocket server on {} failed: {}", self.local_addr, e);
            ServerError::IoError(e)
        })?;

        info!("WebSocket server on {} stopped", self.local_addr);
        Ok(())
    }

    /// Serve forever
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }
}
