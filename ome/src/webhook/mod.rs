//! Validating admission webhook for ome.io resources.
//!
//! The API server calls these endpoints synchronously on create/update. The
//! handlers are stateless: the shared [`WebhookState`] is only read.
//!
//! Routes:
//! - `POST /validate-ome-io-benchmark-job` - BenchmarkJob validation
//! - `GET /healthz` - liveness
//! - `GET /metrics` - Prometheus exposition

pub mod benchmark_job;
mod config;

pub use config::{WebhookService, manifests, validating_webhook_configuration};

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::error;

use crate::error::Error;
use crate::metrics::WebhookMetrics;
use crate::validation::BenchmarkJobValidator;

pub const BENCHMARK_JOB_VALIDATE_PATH: &str = "/validate-ome-io-benchmark-job";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub benchmark_jobs: BenchmarkJobValidator,
    pub metrics: WebhookMetrics,
}

impl WebhookState {
    /// Compiles the scenario grammar and registers metrics.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            benchmark_jobs: BenchmarkJobValidator::new()?,
            metrics: WebhookMetrics::new()?,
        })
    }
}

/// Error type for webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The admission review carried no request
    #[error("invalid admission review: {0}")]
    InvalidReview(String),

    /// A create/update request without an object
    #[error("admission request {0} has no object")]
    MissingObject(String),

    /// The object does not decode into the expected resource
    #[error("failed to decode {kind}: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Internal(#[from] Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidReview(_)
            | WebhookError::MissingObject(_)
            | WebhookError::Decode { .. } => StatusCode::BAD_REQUEST,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Create the webhook router with all validation endpoints
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(
            BENCHMARK_JOB_VALIDATE_PATH,
            post(benchmark_job::validate_handler),
        )
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<Arc<WebhookState>>) -> Result<String, WebhookError> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to render metrics");
        WebhookError::Internal(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_responds_ok() {
        let router = webhook_router(Arc::new(WebhookState::new().unwrap()));
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_are_exposed() {
        let state = Arc::new(WebhookState::new().unwrap());
        state
            .metrics
            .record("benchmarkjobs", "CREATE", crate::metrics::Verdict::Allowed);

        let response = webhook_router(state)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("ome_admission_requests_total"));
    }

    #[test]
    fn decode_errors_are_bad_requests() {
        let source = serde_json::from_str::<u8>("\"x\"").unwrap_err();
        let response = WebhookError::Decode {
            kind: "BenchmarkJob",
            source,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
