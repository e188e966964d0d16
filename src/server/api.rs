//! HTTP handlers for the query endpoint
//!
//! `GET /nodes` serves the currently published snapshot. The handler clones
//! the snapshot `Arc` out of the store and serializes it without holding any
//! lock, so a refresh never waits on a slow client.

use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;

use crate::metrics;

use super::app::AppState;
use super::health::health_check;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/nodes", get(list_nodes))
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Serialize `value` as a JSON response; failures become an empty 500
pub(crate) fn json_response<T: Serialize + ?Sized>(endpoint: &str, value: &T) -> Response {
    let started = Instant::now();

    match serde_json::to_vec(value) {
        Ok(body) => {
            metrics::record_serialize(endpoint, started.elapsed());
            metrics::record_request(endpoint, StatusCode::OK.as_u16());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(endpoint, error = %e, "Failed to serialize response");
            metrics::record_request(endpoint, StatusCode::INTERNAL_SERVER_ERROR.as_u16());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Current snapshot as `{ "<label key>": [{ip, az, region}, ...] }`
async fn list_nodes(State(state): State<AppState>) -> Response {
    let snapshot = state.store.current().await;
    json_response("/nodes", snapshot.as_ref())
}

/// Prometheus text exposition
async fn prometheus_metrics() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_json_response_sets_content_type() {
        let response = json_response("/test", &serde_json::json!({"a": 1}));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_serialization_failure_is_500() {
        let response = json_response("/test", &Unserializable);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
