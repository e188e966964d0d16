//! Configuration management for zonewatch
//!
//! Settings come from, in increasing priority: built-in defaults, an
//! optional TOML file, `ZONEWATCH_*` environment variables and command-line
//! flags (applied by the binary through the builder).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collector::RefreshConfig;
use crate::error::{Error, Result};
use crate::extractor::DEFAULT_LABEL_FILTER;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Substring matched against node label keys
    pub label_filter: String,

    /// Seconds between refresh cycles
    pub refresh_interval_secs: u64,

    /// Timeout for one node listing, in seconds
    pub request_timeout_secs: u64,

    /// Nodes requested per API page (0 disables paging)
    pub page_size: u32,

    /// Use the pod's service account instead of a kubeconfig
    pub in_cluster: bool,

    /// Kubeconfig path used when not in-cluster
    pub kubeconfig: Option<PathBuf>,

    /// Enable request logging
    pub enable_request_logging: bool,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            label_filter: DEFAULT_LABEL_FILTER.to_string(),
            refresh_interval_secs: 10,
            request_timeout_secs: 30,
            page_size: 500,
            in_cluster: false,
            kubeconfig: None,
            enable_request_logging: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl ObserverConfig {
    /// Create a new config builder
    pub fn builder() -> ObserverConfigBuilder {
        ObserverConfigBuilder::default()
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overridden by `ZONEWATCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `ZONEWATCH_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("ZONEWATCH_BIND_ADDRESS") {
            self.bind_address = addr
                .parse()
                .map_err(|_| Error::config(format!("Invalid ZONEWATCH_BIND_ADDRESS: {addr}")))?;
        }

        if let Ok(filter) = std::env::var("ZONEWATCH_LABEL_FILTER") {
            self.label_filter = filter;
        }

        if let Some(secs) = env_number("ZONEWATCH_REFRESH_INTERVAL")? {
            self.refresh_interval_secs = secs;
        }

        if let Some(secs) = env_number("ZONEWATCH_REQUEST_TIMEOUT")? {
            self.request_timeout_secs = secs;
        }

        if let Some(size) = env_number("ZONEWATCH_PAGE_SIZE")? {
            self.page_size = size;
        }

        // Same meaning as --kubeconfig, including an empty path
        if let Some(path) = std::env::var_os("ZONEWATCH_KUBECONFIG") {
            self.kubeconfig = Some(PathBuf::from(path));
        }

        if let Ok(value) = std::env::var("ZONEWATCH_IN_CLUSTER") {
            self.in_cluster = matches!(value.as_str(), "1" | "true" | "yes");
        }

        if let Ok(level) = std::env::var("ZONEWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("ZONEWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(Error::config("refresh_interval_secs must be greater than 0"));
        }

        if self.request_timeout_secs == 0 {
            return Err(Error::config("request_timeout_secs must be greater than 0"));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::config(format!(
                "Unknown log format '{}', expected text or json",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Get refresh interval as Duration
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings for the refresh loop
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig::default()
            .with_label_filter(self.label_filter.clone())
            .with_interval(self.refresh_interval())
            .with_list_timeout(self.request_timeout())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::config(format!("Invalid {name}: {value}"))),
        Err(_) => Ok(None),
    }
}

/// Builder for ObserverConfig
///
/// Starts from an existing config (defaults, file or environment) and
/// overrides only the fields that are set.
#[derive(Debug, Default)]
pub struct ObserverConfigBuilder {
    base: Option<ObserverConfig>,
    bind_address: Option<SocketAddr>,
    label_filter: Option<String>,
    refresh_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    page_size: Option<u32>,
    in_cluster: Option<bool>,
    kubeconfig: Option<PathBuf>,
    enable_request_logging: Option<bool>,
    log_format: Option<String>,
}

impl ObserverConfigBuilder {
    /// Start from `config` instead of the defaults
    pub fn base(mut self, config: ObserverConfig) -> Self {
        self.base = Some(config);
        self
    }

    /// Set bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set bind address from string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self> {
        self.bind_address = Some(
            addr.parse()
                .map_err(|_| Error::config(format!("Invalid address: {addr}")))?,
        );
        Ok(self)
    }

    /// Set label filter
    pub fn label_filter(mut self, filter: impl Into<String>) -> Self {
        self.label_filter = Some(filter.into());
        self
    }

    /// Set refresh interval
    pub fn refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = Some(secs);
        self
    }

    /// Set listing timeout
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Set API page size
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Use in-cluster config
    pub fn in_cluster(mut self, in_cluster: bool) -> Self {
        self.in_cluster = Some(in_cluster);
        self
    }

    /// Set kubeconfig path
    pub fn kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Enable/disable request logging
    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Set log format
    pub fn log_format(mut self, format: impl Into<String>) -> Self {
        self.log_format = Some(format.into());
        self
    }

    /// Build the config
    pub fn build(self) -> Result<ObserverConfig> {
        let mut config = self.base.unwrap_or_default();

        if let Some(addr) = self.bind_address {
            config.bind_address = addr;
        }
        if let Some(filter) = self.label_filter {
            config.label_filter = filter;
        }
        if let Some(secs) = self.refresh_interval_secs {
            config.refresh_interval_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(size) = self.page_size {
            config.page_size = size;
        }
        if let Some(in_cluster) = self.in_cluster {
            config.in_cluster = in_cluster;
        }
        if let Some(path) = self.kubeconfig {
            config.kubeconfig = Some(path);
        }
        if let Some(enable) = self.enable_request_logging {
            config.enable_request_logging = enable;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }
}
