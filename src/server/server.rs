//! HTTP server wiring

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::crawler::Harvester;

use super::api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub harvester: Arc<Harvester>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(harvester: Arc<Harvester>) -> Self {
        Self {
            harvester,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Harvest Server
// ============================================================================

pub struct HarvestServer {
    config: ServerConfig,
    bind_address: SocketAddr,
    state: AppState,
}

impl HarvestServer {
    pub fn new(config: ServerConfig, harvester: Arc<Harvester>) -> Result<Self, ServerError> {
        let bind_address = config
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| ServerError::Config(format!("{}: {e}", config.bind_address)))?;

        Ok(Self {
            config,
            bind_address,
            state: AppState::new(harvester),
        })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();

        tracing::info!(
            addr = %self.bind_address,
            cors = self.config.enable_cors,
            "Starting harvest server"
        );

        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Harvest server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind: {0}")]
    Bind(String),

    #[error("Server error: {0}")]
    Serve(String),
}
