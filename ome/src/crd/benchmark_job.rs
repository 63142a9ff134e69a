//! BenchmarkJob: a load-generation run against an inference endpoint.
//!
//! The endpoint keeps the two-optional-fields wire shape of the API; code that
//! consumes it goes through [`EndpointSpec::target`], which yields the tagged
//! [`EndpointTarget`] only when exactly one side is set.
//!
//! Fields the schema marks required still decode when absent, so an object
//! that slips past the API server gets a verdict instead of a decode error.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::{
    Affinity, EnvFromSource, EnvVar, ResourceRequirements, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::StorageSpec;
use super::require;

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "BenchmarkJob",
    plural = "benchmarkjobs",
    derive = "Default",
    status = "BenchmarkJobStatus",
    namespaced,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.state"}"#
)]
#[schemars(transform = require_spec_fields)]
pub struct BenchmarkJobSpec {
    /// Secret in the job's namespace holding the Hugging Face API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugging_face_secret_reference: Option<HuggingFaceSecretReference>,

    #[serde(default)]
    pub endpoint: EndpointSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_metadata: Option<ServiceMetadata>,

    /// `<input-modality>-to-<output-modality>`, see [`BenchmarkTask`].
    #[serde(default)]
    #[schemars(schema_with = "task_schema")]
    pub task: String,

    /// Scenario strings such as `N(480,240)/(300,150)`. When empty the
    /// per-task defaults are checked instead.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic_scenarios: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub num_concurrency: Vec<i32>,

    /// Minutes allowed for one scenario/concurrency combination.
    #[serde(default)]
    pub max_time_per_iteration: Option<i32>,

    #[serde(default)]
    pub max_requests_per_iteration: Option<i32>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_request_params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<StorageSpec>,

    #[serde(default)]
    pub output_location: Option<StorageSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_folder_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_override: Option<PodOverride>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[schemars(transform = require_secret_fields)]
pub struct HuggingFaceSecretReference {
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_service: Option<InferenceServiceReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
}

/// An InferenceService, possibly in another namespace.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[schemars(transform = require_reference_fields)]
pub struct InferenceServiceReference {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

pub const API_FORMATS: [&str; 3] = ["openai", "oci-cohere", "cohere"];

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[schemars(transform = require_endpoint_fields)]
pub struct Endpoint {
    #[serde(default)]
    #[schemars(schema_with = "endpoint_url_schema")]
    pub url: String,

    /// One of [`API_FORMATS`].
    #[serde(default)]
    #[schemars(schema_with = "api_format_schema")]
    pub api_format: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model_name: String,
}

/// Where a benchmark sends its traffic. Exactly one of the two wire fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointTarget<'a> {
    InferenceService(&'a InferenceServiceReference),
    Direct(&'a Endpoint),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EndpointError {
    #[error("endpoint or InferenceService must be specified")]
    Missing,
    #[error("endpoint and InferenceService cannot be specified together")]
    Ambiguous,
}

impl EndpointSpec {
    pub fn target(&self) -> Result<EndpointTarget<'_>, EndpointError> {
        match (&self.inference_service, &self.endpoint) {
            (Some(isvc), None) => Ok(EndpointTarget::InferenceService(isvc)),
            (None, Some(endpoint)) => Ok(EndpointTarget::Direct(endpoint)),
            (None, None) => Err(EndpointError::Missing),
            (Some(_), Some(_)) => Err(EndpointError::Ambiguous),
        }
    }
}

impl<'a> TryFrom<&'a EndpointSpec> for EndpointTarget<'a> {
    type Error = EndpointError;

    fn try_from(spec: &'a EndpointSpec) -> Result<Self, Self::Error> {
        spec.target()
    }
}

/// Input/output modality pair; selects the scenario grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BenchmarkTask {
    TextToText,
    ImageToText,
    TextToEmbeddings,
    ImageToEmbeddings,
}

impl BenchmarkTask {
    pub const ALL: [BenchmarkTask; 4] = [
        BenchmarkTask::TextToText,
        BenchmarkTask::ImageToText,
        BenchmarkTask::TextToEmbeddings,
        BenchmarkTask::ImageToEmbeddings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BenchmarkTask::TextToText => "text-to-text",
            BenchmarkTask::ImageToText => "image-to-text",
            BenchmarkTask::TextToEmbeddings => "text-to-embeddings",
            BenchmarkTask::ImageToEmbeddings => "image-to-embeddings",
        }
    }

    /// Scenarios benchmarked when the job lists none.
    pub fn default_scenarios(&self) -> &'static [&'static str] {
        match self {
            BenchmarkTask::TextToText => &[
                "N(480,240)/(300,150)",
                "D(100,100)",
                "D(100,1000)",
                "D(2000,200)",
                "D(7800,200)",
            ],
            BenchmarkTask::ImageToText => &["I(512,512)", "I(1024,512)", "I(2048,2048)"],
            BenchmarkTask::TextToEmbeddings => &["E(64)", "E(128)", "E(256)", "E(512)", "E(1024)"],
            BenchmarkTask::ImageToEmbeddings => &["I(512,512)"],
        }
    }
}

impl fmt::Display for BenchmarkTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown benchmark task: {0}")]
pub struct UnknownTask(pub String);

impl FromStr for BenchmarkTask {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BenchmarkTask::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| UnknownTask(s.to_string()))
    }
}

pub const SERVING_ENGINES: [&str; 3] = ["vLLM", "SGLang", "TGI"];
pub const GPU_TYPES: [&str; 4] = ["H100", "A100", "MI300", "A10"];

/// Backend server details recorded for filtering experiments.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[schemars(transform = require_metadata_fields)]
pub struct ServiceMetadata {
    /// One of [`SERVING_ENGINES`].
    #[serde(default)]
    #[schemars(schema_with = "serving_engine_schema")]
    pub engine: String,

    #[serde(default)]
    pub version: String,

    /// One of [`GPU_TYPES`].
    #[serde(default)]
    #[schemars(schema_with = "gpu_type_schema")]
    pub gpu_type: String,

    #[serde(default)]
    pub gpu_count: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodOverride {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkJobStatus {
    pub state: BenchmarkJobState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<Time>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, JsonSchema, PartialEq, Eq, Default)]
pub enum BenchmarkJobState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

fn require_spec_fields(schema: &mut Schema) {
    require(
        schema,
        &["endpoint", "task", "maxTimePerIteration", "maxRequestsPerIteration"],
    );
}

fn require_secret_fields(schema: &mut Schema) {
    require(schema, &["name"]);
}

fn require_reference_fields(schema: &mut Schema) {
    require(schema, &["name", "namespace"]);
}

fn require_endpoint_fields(schema: &mut Schema) {
    require(schema, &["url", "apiFormat"]);
}

fn require_metadata_fields(schema: &mut Schema) {
    require(schema, &["engine", "version", "gpuType", "gpuCount"]);
}

fn string_enum(values: &[&str]) -> Schema {
    json_schema!({
        "type": "string",
        "enum": values,
    })
}

fn task_schema(_: &mut SchemaGenerator) -> Schema {
    let tasks: Vec<&str> = BenchmarkTask::ALL.iter().map(BenchmarkTask::as_str).collect();
    string_enum(&tasks)
}

fn api_format_schema(_: &mut SchemaGenerator) -> Schema {
    string_enum(&API_FORMATS)
}

fn serving_engine_schema(_: &mut SchemaGenerator) -> Schema {
    string_enum(&SERVING_ENGINES)
}

fn gpu_type_schema(_: &mut SchemaGenerator) -> Schema {
    string_enum(&GPU_TYPES)
}

fn endpoint_url_schema(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "string",
        "pattern": "^(http|https)://",
    })
}
