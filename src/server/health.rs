//! Health endpoint
//!
//! Reports how fresh the published snapshot is. It always answers 200 so a
//! cluster API outage does not get the observer itself restarted; the
//! `status` field carries the verdict.
//!
//! ```yaml
//! livenessProbe:
//!   httpGet:
//!     path: /health
//!     port: 8080
//!   periodSeconds: 10
//! ```

use axum::{extract::State, response::Response};
use serde::Serialize;

use crate::models::RefreshStatus;

use super::api::json_response;
use super::app::AppState;

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Last listing succeeded recently
    Healthy,
    /// No successful listing yet, or the last one failed or is stale
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        }
    }

    /// Verdict for a refresh status given the refresh interval
    ///
    /// A snapshot older than three intervals counts as stale.
    pub fn evaluate(status: &RefreshStatus, interval_secs: u64) -> Self {
        let stale_after = (interval_secs.saturating_mul(3)) as i64;

        match status.seconds_since_success() {
            Some(age) if status.last_error.is_none() && age <= stale_after => Self::Healthy,
            _ => Self::Degraded,
        }
    }
}

/// Comprehensive health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub label_filter: String,
    pub refresh_interval_secs: u64,
    pub refresh: RefreshStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_since_success: Option<i64>,
    pub match_groups: usize,
}

/// Health check handler
pub(crate) async fn health_check(State(state): State<AppState>) -> Response {
    let refresh = state.store.status().await;
    let match_groups = state.store.current().await.group_count();
    let interval_secs = state.config.refresh_interval_secs;

    let response = HealthResponse {
        status: HealthStatus::evaluate(&refresh, interval_secs),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        label_filter: state.config.label_filter.clone(),
        refresh_interval_secs: interval_secs,
        seconds_since_success: refresh.seconds_since_success(),
        refresh,
        match_groups,
    };

    json_response("/health", &response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_health_status_as_str() {
        assert_eq!(HealthStatus::Healthy.as_str(), "healthy");
        assert_eq!(HealthStatus::Degraded.as_str(), "degraded");
    }

    #[test]
    fn test_degraded_before_first_success() {
        let status = RefreshStatus::default();
        assert_eq!(HealthStatus::evaluate(&status, 10), HealthStatus::Degraded);
    }

    #[test]
    fn test_healthy_after_recent_success() {
        let status = RefreshStatus {
            cycles: 1,
            last_success_at: Some(Utc::now()),
            ..Default::default()
        };
        assert_eq!(HealthStatus::evaluate(&status, 10), HealthStatus::Healthy);
    }

    #[test]
    fn test_degraded_when_last_cycle_failed() {
        let status = RefreshStatus {
            cycles: 2,
            failed_cycles: 1,
            last_success_at: Some(Utc::now()),
            last_error: Some("connection refused".to_string()),
            ..Default::default()
        };
        assert_eq!(HealthStatus::evaluate(&status, 10), HealthStatus::Degraded);
    }

    #[test]
    fn test_degraded_when_stale() {
        let status = RefreshStatus {
            cycles: 1,
            last_success_at: Some(Utc::now() - Duration::seconds(120)),
            ..Default::default()
        };
        assert_eq!(HealthStatus::evaluate(&status, 10), HealthStatus::Degraded);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&HealthStatus::Healthy).unwrap();
        assert_eq!(json, "\"healthy\"");
    }
}
