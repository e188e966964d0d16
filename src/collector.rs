//! Periodic node refresh loop
//!
//! Lists every node from the cluster source, runs the extractor over the
//! listing and publishes the result as a brand-new snapshot. Cycles start
//! immediately and are separated by a fixed delay; a failed listing is
//! logged and an empty snapshot is published, and the next cycle retries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cluster::{ClusterError, NodeSource};
use crate::error::{Error, ErrorCategory};
use crate::extractor::{build_snapshot, DEFAULT_LABEL_FILTER};
use crate::metrics;
use crate::models::Labels;
use crate::store::SnapshotStore;

// ============================================================================
// Refresh Configuration
// ============================================================================

/// Configuration for the refresh loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Substring matched against node label keys
    pub label_filter: String,

    /// Delay between the end of one cycle and the start of the next
    pub interval: Duration,

    /// Upper bound for one node listing
    pub list_timeout: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            label_filter: DEFAULT_LABEL_FILTER.to_string(),
            interval: Duration::from_secs(10),
            list_timeout: Duration::from_secs(30),
        }
    }
}

impl RefreshConfig {
    /// Set the label filter
    pub fn with_label_filter(mut self, filter: impl Into<String>) -> Self {
        self.label_filter = filter.into();
        self
    }

    /// Set the refresh interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the listing timeout
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }
}

// ============================================================================
// Cycle Outcome
// ============================================================================

/// Result of one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Nodes returned by the source (0 when the listing failed)
    pub nodes: usize,

    /// Match groups in the published snapshot
    pub groups: usize,

    /// Records in the published snapshot
    pub records: usize,

    /// Listing error, if any
    pub error: Option<String>,

    /// Classification of the listing error
    pub error_category: Option<ErrorCategory>,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Refresh Loop
// ============================================================================

/// Background collector feeding the snapshot store
pub struct RefreshLoop {
    config: RefreshConfig,
    source: Arc<dyn NodeSource>,
    store: Arc<SnapshotStore>,
}

impl RefreshLoop {
    /// Create a refresh loop publishing into `store`
    pub fn new(
        config: RefreshConfig,
        source: Arc<dyn NodeSource>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            config,
            source,
            store,
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Run exactly one refresh cycle and publish its snapshot
    pub async fn refresh_once(&self) -> CycleOutcome {
        tracing::debug!("Fetching new nodes from the cluster");
        let started = Instant::now();

        let (nodes, failure) = match self.list_nodes().await {
            Ok(nodes) => (nodes, None),
            Err(e) => {
                let err = Error::from(e);
                let category = err.category();
                if err.is_recoverable() {
                    tracing::warn!(
                        category = category.description(),
                        error = %err,
                        "Failed to list nodes, retrying next cycle"
                    );
                } else {
                    tracing::error!(
                        category = category.description(),
                        error = %err,
                        "Failed to list nodes, will not recover without intervention"
                    );
                }
                (Vec::new(), Some((err.to_string(), category)))
            }
        };
        let (error, error_category) = failure.unzip();

        let snapshot = build_snapshot(&nodes, &self.config.label_filter);
        let outcome = CycleOutcome {
            nodes: nodes.len(),
            groups: snapshot.group_count(),
            records: snapshot.record_count(),
            error,
            error_category,
        };

        self.store.publish(snapshot).await;

        let now = Utc::now();
        self.store
            .update_status(|status| {
                status.cycles += 1;
                status.last_node_count = outcome.nodes;
                status.last_published_at = Some(now);
                match &outcome.error {
                    Some(error) => {
                        status.failed_cycles += 1;
                        status.last_error = Some(error.clone());
                        status.last_error_category = outcome.error_category;
                    }
                    None => {
                        status.last_success_at = Some(now);
                        status.last_error = None;
                        status.last_error_category = None;
                    }
                }
            })
            .await;

        metrics::record_refresh(
            started.elapsed(),
            outcome.is_success(),
            outcome.nodes,
            outcome.groups,
        );

        tracing::debug!(
            nodes = outcome.nodes,
            groups = outcome.groups,
            records = outcome.records,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Published node snapshot"
        );

        outcome
    }

    async fn list_nodes(&self) -> Result<Vec<Labels>, ClusterError> {
        match tokio::time::timeout(self.config.list_timeout, self.source.list_nodes()).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Timeout(self.config.list_timeout)),
        }
    }

    /// Run cycles until `shutdown_rx` flips to `true` or its sender is dropped
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(
            label_filter = %self.config.label_filter,
            interval_secs = self.config.interval.as_secs_f64(),
            "Refresh loop started"
        );

        loop {
            // A listing in flight is abandoned on shutdown
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown_rx) => break,
                _ = self.refresh_once() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown_rx) => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        tracing::info!("Refresh loop shutting down");
    }

    /// Launch the loop as a background task
    pub fn spawn(self) -> RefreshHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));

        RefreshHandle { shutdown, task }
    }
}

/// Resolves once shutdown is signalled or the sender is gone
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

/// Handle to a spawned refresh loop
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the loop to stop, abandoning a listing in flight
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        self.stop();
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        nodes: Vec<Labels>,
    }

    #[async_trait]
    impl NodeSource for CountingSource {
        async fn list_nodes(&self) -> ClusterResult<Vec<Labels>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.nodes.clone())
        }
    }

    struct HangingSource;

    #[async_trait]
    impl NodeSource for HangingSource {
        async fn list_nodes(&self) -> ClusterResult<Vec<Labels>> {
            std::future::pending().await
        }
    }

    struct FailingSource(fn() -> ClusterError);

    #[async_trait]
    impl NodeSource for FailingSource {
        async fn list_nodes(&self) -> ClusterResult<Vec<Labels>> {
            Err((self.0)())
        }
    }

    fn node(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = RefreshConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.label_filter, "node-role.kubernetes.io/node");
    }

    #[tokio::test]
    async fn test_refresh_once_publishes() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            nodes: vec![node(&[
                ("node-role.kubernetes.io/node", ""),
                ("kubernetes.io/hostname", "n1"),
            ])],
        });
        let store = Arc::new(SnapshotStore::new());
        let refresh = RefreshLoop::new(RefreshConfig::default(), source.clone(), store.clone());

        let outcome = refresh.refresh_once().await;

        assert!(outcome.is_success());
        assert_eq!(outcome.nodes, 1);
        assert_eq!(outcome.groups, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let snapshot = store.current().await;
        let group = snapshot.group("node-role.kubernetes.io/node").unwrap();
        assert_eq!(group[0].hostname, "n1");

        let status = store.status().await;
        assert_eq!(status.cycles, 1);
        assert!(status.has_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_listing_times_out() {
        let store = Arc::new(SnapshotStore::new());
        let config = RefreshConfig::default().with_list_timeout(Duration::from_secs(2));
        let refresh = RefreshLoop::new(config, Arc::new(HangingSource), store.clone());

        let outcome = refresh.refresh_once().await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.error_category, Some(ErrorCategory::Cluster));
        assert!(outcome.error.unwrap().contains("timed out"));
        assert_eq!(store.status().await.failed_cycles, 1);
    }

    #[tokio::test]
    async fn test_unreadable_token_is_config_failure() {
        let store = Arc::new(SnapshotStore::new());
        let source = FailingSource(|| {
            ClusterError::InvalidCredentials("failed to read token file /var/run/token".to_string())
        });
        let refresh = RefreshLoop::new(RefreshConfig::default(), Arc::new(source), store.clone());

        let outcome = refresh.refresh_once().await;

        assert_eq!(outcome.error_category, Some(ErrorCategory::Config));
        let status = store.status().await;
        assert_eq!(status.last_error_category, Some(ErrorCategory::Config));
        assert!(store.current().await.is_empty());
    }

    #[tokio::test]
    async fn test_error_category_cleared_on_success() {
        let store = Arc::new(SnapshotStore::new());
        let failing = RefreshLoop::new(
            RefreshConfig::default(),
            Arc::new(FailingSource(|| ClusterError::Status {
                status: 503,
                message: "unavailable".to_string(),
            })),
            store.clone(),
        );
        failing.refresh_once().await;
        assert_eq!(
            store.status().await.last_error_category,
            Some(ErrorCategory::Cluster)
        );

        let healthy = RefreshLoop::new(
            RefreshConfig::default(),
            Arc::new(CountingSource {
                calls: AtomicUsize::new(0),
                nodes: Vec::new(),
            }),
            store.clone(),
        );
        healthy.refresh_once().await;

        let status = store.status().await;
        assert!(status.last_error.is_none());
        assert!(status.last_error_category.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_hung_listing() {
        let store = Arc::new(SnapshotStore::new());
        let config = RefreshConfig::default().with_list_timeout(Duration::from_secs(30));
        let handle = RefreshLoop::new(config, Arc::new(HangingSource), store.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(1)).await;
        let started = tokio::time::Instant::now();
        handle.shutdown().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(store.status().await.cycles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_immediately_then_on_interval() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            nodes: Vec::new(),
        });
        let store = Arc::new(SnapshotStore::new());
        let config = RefreshConfig::default().with_interval(Duration::from_secs(10));
        let handle = RefreshLoop::new(config, source.clone(), store).spawn();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            nodes: Vec::new(),
        });
        let store = Arc::new(SnapshotStore::new());
        let config = RefreshConfig::default().with_interval(Duration::from_secs(3600));
        let handle = RefreshLoop::new(config, source.clone(), store).spawn();

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.shutdown().await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
