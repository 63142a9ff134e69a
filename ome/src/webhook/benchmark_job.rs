//! BenchmarkJob validation webhook
//!
//! Decodes the object carried by an AdmissionReview, runs the
//! [`BenchmarkJobValidator`](crate::validation::BenchmarkJobValidator)
//! pipeline and answers allow or deny. Reviews and objects that do not
//! decode are rejected with HTTP 400.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use kube::core::{
    DynamicObject,
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
};
use tracing::{debug, error};

use crate::crd::BenchmarkJob;
use crate::metrics::Verdict;

use super::{WebhookError, WebhookState};

pub const RESOURCE: &str = "benchmarkjobs";

/// Message carried by allowed responses.
pub const ALLOWED_MESSAGE: &str = "Validation passed";

/// Handle validating admission review for BenchmarkJobs
///
/// The body is taken raw so malformed reviews get the same 400 JSON error
/// as every other decode failure.
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    body: Bytes,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let review_body: AdmissionReview<DynamicObject> =
        serde_json::from_slice(&body).map_err(|e| {
            error!(error = %e, "Failed to deserialize admission review");
            WebhookError::InvalidReview(e.to_string())
        })?;

    let request: AdmissionRequest<DynamicObject> = review_body.try_into().map_err(|e| {
        error!(error = %e, "Failed to parse admission request");
        WebhookError::InvalidReview(format!("{e}"))
    })?;

    let operation = operation_label(&request.operation);
    match review(&state, &request) {
        Ok((response, verdict)) => {
            state.metrics.record(RESOURCE, operation, verdict);
            Ok(Json(response.into_review()))
        }
        Err(e) => {
            state.metrics.record(RESOURCE, operation, Verdict::Errored);
            Err(e)
        }
    }
}

/// Validate a single BenchmarkJob admission request.
pub fn review(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> Result<(AdmissionResponse, Verdict), WebhookError> {
    let obj = match (&request.object, &request.operation) {
        (Some(obj), _) => obj,
        (None, Operation::Delete) | (None, Operation::Connect) => {
            debug!(uid = %request.uid, "No object in request, allowing unchanged");
            return Ok((AdmissionResponse::from(request), Verdict::Allowed));
        }
        (None, _) => return Err(WebhookError::MissingObject(request.uid.clone())),
    };

    let job = decode(obj).map_err(|source| {
        error!(
            uid = %request.uid,
            name = %request.name,
            namespace = ?request.namespace,
            error = %source,
            "Failed to decode benchmark job"
        );
        WebhookError::Decode {
            kind: "BenchmarkJob",
            source,
        }
    })?;

    let timer = state
        .metrics
        .validation_duration
        .with_label_values(&[RESOURCE])
        .start_timer();
    let verdict = state.benchmark_jobs.validate(&job);
    timer.observe_duration();

    match verdict {
        Ok(()) => {
            debug!(
                uid = %request.uid,
                name = ?job.metadata.name,
                namespace = ?job.metadata.namespace,
                "BenchmarkJob validation passed"
            );
            let mut response = AdmissionResponse::from(request);
            response.result.message = ALLOWED_MESSAGE.to_string();
            Ok((response, Verdict::Allowed))
        }
        Err(e) => {
            error!(
                uid = %request.uid,
                name = ?job.metadata.name,
                namespace = ?job.metadata.namespace,
                error = %e,
                "Validation failed for BenchmarkJob"
            );
            Ok((AdmissionResponse::from(request).deny(e), Verdict::Denied))
        }
    }
}

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

fn decode(obj: &DynamicObject) -> Result<BenchmarkJob, serde_json::Error> {
    serde_json::to_value(obj).and_then(serde_json::from_value)
}
