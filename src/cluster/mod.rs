//! Cluster node source
//!
//! The refresh loop only needs one operation from the cluster: list every
//! node with its labels. [`NodeSource`] is that seam; [`KubeNodeClient`]
//! implements it against a Kubernetes API server, configured through
//! [`ClusterConfig`] (in-cluster service account or kubeconfig file).

pub mod client;
pub mod error;
pub mod kubeconfig;

use async_trait::async_trait;

use crate::models::Labels;

pub use client::KubeNodeClient;
pub use error::{ClusterError, ClusterResult};
pub use kubeconfig::{default_kubeconfig_path, Auth, ClusterConfig};

/// Source of the full node listing
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// List all nodes, returning each node's label set
    async fn list_nodes(&self) -> ClusterResult<Vec<Labels>>;
}
