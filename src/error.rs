//! Unified error handling for the zonewatch crate
//!
//! Startup problems (configuration, credentials) are fatal. At steady state
//! the refresh loop classifies each listing failure: recoverable ones are
//! retried quietly on the next cycle, the rest are reported loudly because
//! they will not clear on their own.
//!
//! # Usage
//!
//! ```rust,ignore
//! use zonewatch::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(error = %err, "retrying on next cycle");
//!     } else {
//!         tracing::error!(category = err.category().description(), error = %err, "needs attention");
//!     }
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

pub use crate::cluster::ClusterError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Talking to the cluster API failed
    Cluster,
    /// Configuration and credential errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short description for log output
    pub fn description(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster API error",
            Self::Config => "configuration error",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the zonewatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Cluster source errors (credentials, listing)
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// TOML config file errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Cluster(e) => e.is_recoverable(),
            Self::Config(_) | Self::Toml(_) | Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cluster(e) => match e {
                ClusterError::InvalidKubeconfig { .. }
                | ClusterError::InClusterUnavailable(_)
                | ClusterError::InvalidCredentials(_)
                | ClusterError::InvalidUrl(_) => ErrorCategory::Config,
                _ => ErrorCategory::Cluster,
            },
            Self::Config(_) | Self::Toml(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
