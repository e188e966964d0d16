//! zonewatch - Kubernetes node placement observer
//!
//! Periodically lists the nodes of a cluster, groups them by every label key
//! that contains a configured substring and serves the latest result as JSON.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`cluster`] - Kubernetes API access (kubeconfig, in-cluster, node listing)
//! - [`extractor`] - Label matching and placement record extraction
//! - [`collector`] - Background refresh loop
//! - [`store`] - Atomically swapped snapshot shared with the server
//! - [`server`] - HTTP endpoints (`/nodes`, `/health`, `/metrics`)
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zonewatch::cluster::{ClusterConfig, KubeNodeClient};
//! use zonewatch::config::ObserverConfig;
//! use zonewatch::server::ObserverServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ObserverConfig::from_env()?;
//!     let cluster = ClusterConfig::in_cluster()?;
//!     let client = KubeNodeClient::new(cluster, config.request_timeout())?;
//!
//!     let server = ObserverServer::new(config, Arc::new(client))?;
//!     server.start_with_shutdown(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod cluster;
pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod metrics;
pub mod models;
pub mod server;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cluster::{ClusterConfig, ClusterError, KubeNodeClient, NodeSource};
    pub use crate::collector::{RefreshConfig, RefreshLoop};
    pub use crate::config::ObserverConfig;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{Labels, PlacementRecord, RefreshStatus, Snapshot};
    pub use crate::server::ObserverServer;
    pub use crate::store::SnapshotStore;
}

// Direct re-exports for convenience
pub use models::{Labels, PlacementRecord, Snapshot};
