use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::NodeSelectorTerm;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "ome.io",
    version = "v1beta1",
    kind = "AcceleratorClass",
    plural = "acceleratorclasses",
    derive = "Default",
    status = "AcceleratorClassStatus",
    printcolumn = r#"{"name":"Vendor","type":"string","jsonPath":".spec.vendor"}"#,
    printcolumn = r#"{"name":"Family","type":"string","jsonPath":".spec.family"}"#,
    printcolumn = r#"{"name":"Memory","type":"string","jsonPath":".spec.capabilities.memoryGB"}"#,
    printcolumn = r#"{"name":"Nodes","type":"integer","jsonPath":".status.availableNodes"}"#
)]
pub struct AcceleratorClassSpec {
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub model: Option<String>,

    pub discovery: AcceleratorDiscovery,
    pub capabilities: AcceleratorCapabilities,

    #[serde(default)]
    pub resources: Vec<AcceleratorResource>,

    #[serde(default)]
    pub integration: Option<AcceleratorIntegration>,

    #[serde(default)]
    pub cost: Option<AcceleratorCost>,
}

/// How nodes carrying this accelerator are recognised.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorDiscovery {
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub node_selector_terms: Vec<NodeSelectorTerm>,
    /// e.g. `10de` for NVIDIA.
    #[serde(default, rename = "pciVendorID")]
    pub pci_vendor_id: Option<String>,
    #[serde(default, rename = "deviceIDs")]
    pub device_ids: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorCapabilities {
    #[serde(default, rename = "memoryGB")]
    pub memory_gb: Option<Quantity>,
    #[serde(default)]
    pub compute_capability: Option<String>,
    #[serde(default)]
    pub level_zero_version: Option<String>,
    #[serde(default, rename = "clockSpeedMHz")]
    pub clock_speed_mhz: Option<i32>,
    #[serde(default, rename = "memoryBandwidthGBps")]
    pub memory_bandwidth_gbps: Option<Quantity>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub performance: Option<AcceleratorPerformance>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorPerformance {
    pub fp32_tflops: Option<i64>,
    pub fp16_tflops: Option<i64>,
    pub int8_tops: Option<i64>,
    pub int4_tops: Option<i64>,
    pub latency: Option<AcceleratorLatency>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorLatency {
    pub average_millis: Option<i64>,
    pub maximum_millis: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorResource {
    /// Extended resource name, e.g. `nvidia.com/gpu`.
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: Quantity,
    #[serde(default)]
    pub divisible: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorIntegration {
    pub kueue_resource_flavor: Option<String>,
    #[serde(rename = "volcanoGPUType")]
    pub volcano_gpu_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorCost {
    pub per_hour: Option<Quantity>,
    pub per_million_tokens: Option<Quantity>,
    pub spot_per_hour: Option<Quantity>,
    /// `low`, `medium` or `high`.
    pub tier: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorClassStatus {
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub total_accelerators: i32,
    #[serde(default)]
    pub available_accelerators: i32,
    pub last_updated: Option<Time>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub available_nodes: i32,
}

fn default_quantity() -> Quantity {
    Quantity("1".into())
}
