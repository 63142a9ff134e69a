use k8s_openapi::ByteString;
use k8s_openapi::api::admissionregistration::v1::{
    RuleWithOperations, ServiceReference, ValidatingWebhook, ValidatingWebhookConfiguration,
    WebhookClientConfig,
};
use kube::core::ObjectMeta;

use crate::crd::{self, API_GROUP, API_VERSION};
use crate::error::Error;

use super::BENCHMARK_JOB_VALIDATE_PATH;

pub const WEBHOOK_CONFIGURATION_NAME: &str = "ome-webhook-server-validator";
pub const BENCHMARK_JOB_WEBHOOK_NAME: &str = "benchmarkjob.ome-webhook-server.validator";

/// Where the API server reaches the webhook.
#[derive(Debug, Clone)]
pub struct WebhookService {
    pub name: String,
    pub namespace: String,
    pub port: i32,
    /// PEM bundle the API server uses to verify the serving certificate
    pub ca_bundle: Option<Vec<u8>>,
}

impl Default for WebhookService {
    fn default() -> Self {
        Self {
            name: "ome-webhook-server-service".to_string(),
            namespace: "ome".to_string(),
            port: 443,
            ca_bundle: None,
        }
    }
}

/// Registration routing BenchmarkJob create/update to the validator.
pub fn validating_webhook_configuration(service: &WebhookService) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(WEBHOOK_CONFIGURATION_NAME.to_string()),
            ..Default::default()
        },
        webhooks: Some(vec![ValidatingWebhook {
            name: BENCHMARK_JOB_WEBHOOK_NAME.to_string(),
            admission_review_versions: vec!["v1".to_string()],
            side_effects: "None".to_string(),
            failure_policy: Some("Fail".to_string()),
            match_policy: Some("Equivalent".to_string()),
            timeout_seconds: Some(10),
            rules: Some(vec![RuleWithOperations {
                operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
                api_groups: Some(vec![API_GROUP.to_string()]),
                api_versions: Some(vec![API_VERSION.to_string()]),
                resources: Some(vec!["benchmarkjobs".to_string()]),
                scope: Some("Namespaced".to_string()),
            }]),
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    name: service.name.clone(),
                    namespace: service.namespace.clone(),
                    path: Some(BENCHMARK_JOB_VALIDATE_PATH.to_string()),
                    port: Some(service.port),
                }),
                ca_bundle: service.ca_bundle.clone().map(ByteString),
                ..Default::default()
            },
            ..Default::default()
        }]),
    }
}

/// Every CRD followed by the webhook registration, as a multi-document
/// YAML stream.
pub fn manifests(service: &WebhookService) -> Result<String, Error> {
    let mut docs = crd::all()
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    docs.push(serde_yaml::to_string(&validating_webhook_configuration(
        service,
    ))?);
    Ok(docs.join("---\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_benchmark_jobs_to_validate_path() {
        let config = validating_webhook_configuration(&WebhookService::default());
        let webhooks = config.webhooks.unwrap();
        assert_eq!(webhooks.len(), 1);

        let webhook = &webhooks[0];
        assert_eq!(webhook.name, BENCHMARK_JOB_WEBHOOK_NAME);
        assert_eq!(webhook.failure_policy.as_deref(), Some("Fail"));
        assert_eq!(webhook.side_effects, "None");

        let rule = &webhook.rules.as_ref().unwrap()[0];
        assert_eq!(rule.api_groups, Some(vec!["ome.io".to_string()]));
        assert_eq!(rule.resources, Some(vec!["benchmarkjobs".to_string()]));
        assert_eq!(
            rule.operations,
            Some(vec!["CREATE".to_string(), "UPDATE".to_string()])
        );

        let svc = webhook.client_config.service.as_ref().unwrap();
        assert_eq!(svc.path.as_deref(), Some("/validate-ome-io-benchmark-job"));
        assert_eq!(svc.port, Some(443));
        assert!(webhook.client_config.ca_bundle.is_none());
    }

    #[test]
    fn manifests_end_with_the_webhook_configuration() {
        let stream = manifests(&WebhookService::default()).unwrap();
        let docs: Vec<serde_yaml::Value> = stream
            .split("---\n")
            .map(|doc| serde_yaml::from_str(doc).unwrap())
            .collect();

        assert_eq!(docs.len(), crd::all().len() + 1);
        assert!(docs[..docs.len() - 1]
            .iter()
            .all(|doc| doc["kind"] == "CustomResourceDefinition"));
        assert_eq!(docs[docs.len() - 1]["kind"], "ValidatingWebhookConfiguration");
    }

    #[test]
    fn carries_ca_bundle() {
        let service = WebhookService {
            ca_bundle: Some(b"-----BEGIN CERTIFICATE-----".to_vec()),
            ..Default::default()
        };
        let config = validating_webhook_configuration(&service);
        let webhook = &config.webhooks.unwrap()[0];
        assert_eq!(
            webhook.client_config.ca_bundle,
            Some(ByteString(b"-----BEGIN CERTIFICATE-----".to_vec()))
        );
    }
}
