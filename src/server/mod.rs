//! HTTP query server
//!
//! Serves the latest published snapshot. Handlers only ever read the store;
//! the refresh loop spawned by [`ObserverServer`] is its sole writer.
//!
//! | Route          | Response                                      |
//! |----------------|-----------------------------------------------|
//! | `GET /nodes`   | snapshot JSON, `Content-Type: application/json` |
//! | `GET /health`  | refresh status and staleness verdict          |
//! | `GET /metrics` | Prometheus text format                        |
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use zonewatch::server::ObserverServer;
//!
//! let server = ObserverServer::new(config, Arc::new(client))?;
//! server.start_with_shutdown(shutdown_signal()).await?;
//! ```

pub mod api;
pub mod app;
pub mod health;

pub use api::create_router;
pub use app::{AppState, ObserverServer, ServerError, ServerInfo};
pub use health::{HealthResponse, HealthStatus};
