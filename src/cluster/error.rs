//! Error types for the cluster source

use thiserror::Error;

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors raised while loading cluster credentials or listing nodes
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Kubeconfig could not be read or does not describe a usable cluster
    #[error("Invalid kubeconfig '{path}': {reason}")]
    InvalidKubeconfig { path: String, reason: String },

    /// In-cluster environment is missing something it needs
    #[error("In-cluster configuration unavailable: {0}")]
    InClusterUnavailable(String),

    /// Credential material (certificate, key, token) is malformed
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Underlying HTTP client error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API server answered with a non-success status
    #[error("API server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode node list: {0}")]
    Decode(String),

    /// Listing did not finish within the configured timeout
    #[error("Node listing timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// API server URL is malformed
    #[error("Invalid API server URL: {0}")]
    InvalidUrl(String),
}

impl ClusterError {
    /// Whether retrying on the next refresh cycle can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::Decode(_) => true,
            // 401/403 usually means rotated credentials, which the next
            // token-file read picks up
            Self::Status { .. } => true,
            Self::InvalidKubeconfig { .. }
            | Self::InClusterUnavailable(_)
            | Self::InvalidCredentials(_)
            | Self::InvalidUrl(_) => false,
        }
    }
}
