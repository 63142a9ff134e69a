//! Prometheus metrics for admission traffic.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Error;

/// Outcome label recorded per admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied,
    Errored,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allowed => "allowed",
            Verdict::Denied => "denied",
            Verdict::Errored => "errored",
        }
    }
}

pub struct WebhookMetrics {
    registry: Registry,
    /// Admission requests by resource, operation and verdict
    pub admission_requests: IntCounterVec,
    /// Time spent in the validation pipeline (seconds)
    pub validation_duration: HistogramVec,
}

impl WebhookMetrics {
    pub fn new() -> Result<Self, Error> {
        let registry = Registry::new();

        let admission_requests = IntCounterVec::new(
            Opts::new(
                "ome_admission_requests_total",
                "Total number of admission requests handled",
            ),
            &["resource", "operation", "verdict"],
        )?;
        registry.register(Box::new(admission_requests.clone()))?;

        let validation_duration = HistogramVec::new(
            HistogramOpts::new(
                "ome_admission_validation_seconds",
                "Admission validation duration in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["resource"],
        )?;
        registry.register(Box::new(validation_duration.clone()))?;

        Ok(Self {
            registry,
            admission_requests,
            validation_duration,
        })
    }

    pub fn record(&self, resource: &str, operation: &str, verdict: Verdict) {
        self.admission_requests
            .with_label_values(&[resource, operation, verdict.as_str()])
            .inc();
    }

    /// Text exposition format for `/metrics`.
    pub fn render(&self) -> Result<String, Error> {
        let families = self.registry.gather();
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_verdicts_per_label_set() {
        let metrics = WebhookMetrics::new().unwrap();
        metrics.record("benchmarkjobs", "CREATE", Verdict::Allowed);
        metrics.record("benchmarkjobs", "CREATE", Verdict::Allowed);
        metrics.record("benchmarkjobs", "UPDATE", Verdict::Denied);

        let allowed = metrics
            .admission_requests
            .with_label_values(&["benchmarkjobs", "CREATE", "allowed"])
            .get();
        assert_eq!(allowed, 2);

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("ome_admission_requests_total"));
        assert!(rendered.contains(r#"verdict="denied""#));
    }
}
