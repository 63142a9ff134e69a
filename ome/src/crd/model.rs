use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::NodeAffinity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::preserve_unknown_fields;

/// Location of model weights, datasets, or benchmark results.
///
/// `storage_uri` is the only attribute the admission path inspects; its
/// grammar lives in [`crate::storage`].
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,

    /// Name of the secret key holding storage credentials.
    #[serde(default, rename = "key", skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_uri: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_policy: Option<DownloadPolicy>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, JsonSchema, PartialEq, Eq)]
pub enum DownloadPolicy {
    AlwaysDownload,
    ReuseIfExists,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, JsonSchema, PartialEq, Eq, Default)]
pub enum RuntimeSelectorOperator {
    #[default]
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelFormat {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default = "default_operator")]
    pub operator: Option<RuntimeSelectorOperator>,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelFrameworkSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default = "default_operator")]
    pub operator: Option<RuntimeSelectorOperator>,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, JsonSchema, PartialEq, Eq)]
pub enum ModelQuantization {
    #[serde(rename = "fp8")]
    Fp8,
    #[serde(rename = "fbgemm_fp8")]
    FbgemmFp8,
    #[serde(rename = "int4")]
    Int4,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, JsonSchema, PartialEq, Eq)]
pub enum ServingMode {
    #[serde(rename = "On-demand")]
    OnDemand,
    Dedicated,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelCapability {
    TextGeneration,
    TextSummarization,
    TextEmbeddings,
    TextRerank,
    Chat,
    Vision,
    Embedding,
    Rerank,
    TextToText,
    ImageTextToText,
    TextToImage,
    ImageTextToImage,
    TextToSpeech,
    SpeechToText,
    AudioTranslation,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, JsonSchema, PartialEq, Eq)]
pub enum ModelApiCapability {
    #[serde(rename = "OPENAI_V1_CHAT_COMPLETIONS")]
    ChatCompletions,
    #[serde(rename = "OPENAI_V1_RESPONSES")]
    Responses,
    #[serde(rename = "OPENAI_V1_EMBEDDINGS")]
    Embeddings,
    #[serde(rename = "OPENAI_V1_IMAGES_GENERATIONS")]
    ImagesGenerations,
    #[serde(rename = "OPENAI_V1_IMAGES_EDITS")]
    ImagesEdits,
    #[serde(rename = "OPENAI_V1_AUDIO_SPEECH")]
    AudioSpeech,
    #[serde(rename = "OPENAI_V1_AUDIO_TRANSCRIPTIONS")]
    AudioTranscriptions,
    #[serde(rename = "OPENAI_V1_AUDIO_TRANSLATIONS")]
    AudioTranslations,
    #[serde(rename = "OPENAI_V1_REALTIME")]
    Realtime,
}

/// Catalog fields shared by base models and fine-tuned weights.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelExtensionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, rename = "compartmentID", skip_serializing_if = "Option::is_none")]
    pub compartment_id: Option<String>,
}

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "BaseModel",
    plural = "basemodels",
    derive = "Default",
    status = "ModelStatusSpec",
    namespaced,
    printcolumn = r#"{"name":"Vendor","type":"string","jsonPath":".spec.vendor"}"#,
    printcolumn = r#"{"name":"ModelFormat","type":"string","jsonPath":".spec.modelFormat.name"}"#,
    printcolumn = r#"{"name":"Size","type":"string","jsonPath":".spec.modelParameterSize"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct BaseModelSpec {
    pub model_format: ModelFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_framework: Option<ModelFrameworkSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_architecture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<ModelQuantization>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_parameter_size: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub model_capabilities: Vec<ModelCapability>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_capabilities: Vec<ModelApiCapability>,

    /// Raw model configuration, typically the model's `config.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub model_configuration: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    #[serde(flatten)]
    pub extension: ModelExtensionSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serving_mode: Vec<ServingMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i32>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_metadata: BTreeMap<String, String>,
}

/// Cluster-scoped twin of [`BaseModel`], sharing its spec.
#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "ClusterBaseModel",
    plural = "clusterbasemodels",
    derive = "Default",
    status = "ModelStatusSpec",
    printcolumn = r#"{"name":"Vendor","type":"string","jsonPath":".spec.vendor"}"#,
    printcolumn = r#"{"name":"ModelFormat","type":"string","jsonPath":".spec.modelFormat.name"}"#,
    printcolumn = r#"{"name":"Size","type":"string","jsonPath":".spec.modelParameterSize"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct ClusterBaseModelSpec {
    #[serde(flatten)]
    pub model: BaseModelSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "FineTunedWeight",
    plural = "finetunedweights",
    derive = "Default",
    status = "ModelStatusSpec",
    printcolumn = r#"{"name":"Vendor","type":"string","jsonPath":".spec.vendor"}"#,
    printcolumn = r#"{"name":"ModelType","type":"string","jsonPath":".spec.modelType"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct FineTunedWeightSpec {
    #[serde(default)]
    pub base_model_ref: ObjectReference,

    /// e.g. `LoRA`, `Adapter`, `Distillation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub hyper_parameters: Option<serde_json::Value>,

    #[serde(flatten)]
    pub extension: ModelExtensionSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub configuration: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    #[serde(default)]
    pub training_job_ref: ObjectReference,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, JsonSchema, PartialEq, Eq, Default)]
pub enum LifeCycleState {
    #[default]
    Creating,
    Importing,
    #[serde(rename = "In_Transit")]
    InTransit,
    #[serde(rename = "In_Training")]
    InTraining,
    Ready,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatusSpec {
    #[serde(default, rename = "lifecycle", skip_serializing_if = "Option::is_none")]
    pub life_cycle: Option<String>,
    pub state: LifeCycleState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes_ready: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes_failed: Vec<String>,
}

fn default_operator() -> Option<RuntimeSelectorOperator> {
    Some(RuntimeSelectorOperator::Equal)
}
fn default_weight() -> i64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_format_defaults_apply() {
        let format: ModelFormat = serde_json::from_value(json!({"name": "safetensors"})).unwrap();
        assert_eq!(format.operator, Some(RuntimeSelectorOperator::Equal));
        assert_eq!(format.weight, 1);
    }

    #[test]
    fn cluster_base_model_spec_is_flat_on_the_wire() {
        let spec: ClusterBaseModelSpec = serde_json::from_value(json!({
            "modelFormat": {"name": "safetensors"},
            "vendor": "meta",
            "quantization": "fbgemm_fp8",
            "storage": {"storageUri": "hf://meta-llama/Llama-3.1-8B"}
        }))
        .unwrap();

        assert_eq!(spec.model.extension.vendor.as_deref(), Some("meta"));
        assert_eq!(spec.model.quantization, Some(ModelQuantization::FbgemmFp8));
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["vendor"], "meta");
        assert!(value.get("model").is_none());
    }

    #[test]
    fn lifecycle_states_use_wire_names() {
        let status: ModelStatusSpec =
            serde_json::from_value(json!({"state": "In_Transit", "nodesReady": ["a"]})).unwrap();
        assert_eq!(status.state, LifeCycleState::InTransit);
        assert_eq!(status.nodes_ready, vec!["a".to_string()]);
    }

    #[test]
    fn storage_key_is_serialized_as_key() {
        let storage = StorageSpec {
            storage_key: Some("creds".into()),
            download_policy: Some(DownloadPolicy::ReuseIfExists),
            ..Default::default()
        };
        let value = serde_json::to_value(&storage).unwrap();
        assert_eq!(value, json!({"key": "creds", "downloadPolicy": "ReuseIfExists"}));
    }
}
