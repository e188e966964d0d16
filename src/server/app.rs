//! Observer server implementation
//!
//! Owns the snapshot store, drives the refresh loop alongside the HTTP
//! listener and tears both down on shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::cluster::NodeSource;
use crate::collector::RefreshLoop;
use crate::config::ObserverConfig;
use crate::store::SnapshotStore;

use super::api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Published snapshot and refresh status
    pub store: Arc<SnapshotStore>,

    /// Server start time
    pub start_time: Instant,

    /// Configuration
    pub config: ObserverConfig,
}

impl AppState {
    pub fn new(config: ObserverConfig, store: Arc<SnapshotStore>) -> Self {
        Self {
            store,
            start_time: Instant::now(),
            config,
        }
    }
}

// ============================================================================
// Observer Server
// ============================================================================

/// Refresh loop plus query endpoint
pub struct ObserverServer {
    config: ObserverConfig,
    state: AppState,
    source: Arc<dyn NodeSource>,
}

impl ObserverServer {
    /// Create a new server reading nodes from `source`
    pub fn new(config: ObserverConfig, source: Arc<dyn NodeSource>) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let state = AppState::new(config.clone(), Arc::new(SnapshotStore::new()));

        Ok(Self {
            config,
            state,
            source,
        })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = create_router(self.state.clone());

        if self.config.enable_request_logging {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    /// Bind the configured address and serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;

        self.serve(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener
    ///
    /// The refresh loop starts before the first request is accepted, so the
    /// initial empty snapshot is replaced as soon as the first listing
    /// completes.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        let refresh = RefreshLoop::new(
            self.config.refresh_config(),
            self.source.clone(),
            self.state.store.clone(),
        )
        .spawn();

        tracing::info!(
            address = %local_addr,
            label_filter = %self.config.label_filter,
            "Serving node placement on /nodes"
        );

        let served = axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()));

        if let Err(e) = refresh.shutdown().await {
            tracing::warn!(error = %e, "Refresh loop did not exit cleanly");
        }

        served?;
        tracing::info!("Observer shutdown complete");
        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.bind_address,
            label_filter: self.config.label_filter.clone(),
            refresh_interval_secs: self.config.refresh_interval_secs,
            request_timeout_secs: self.config.request_timeout_secs,
            request_logging_enabled: self.config.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub label_filter: String,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "Zone Observer\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Label Filter: {}\n\
             Refresh Interval: {}s\n\
             List Timeout: {}s\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.label_filter,
            self.refresh_interval_secs,
            self.request_timeout_secs,
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to bind to address
    #[error("Failed to bind: {0}")]
    Bind(String),

    /// Server error
    #[error("Server error: {0}")]
    Serve(String),
}

// ============================================================================
// Tests
// ============================================================================
