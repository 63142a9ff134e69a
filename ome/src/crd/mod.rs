//! Custom resources in the `ome.io/v1beta1` API group.

mod accelerator_class;
mod benchmark_job;
mod model;

pub use accelerator_class::*;
pub use benchmark_job::*;
pub use model::*;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;
use schemars::{Schema, SchemaGenerator, json_schema};
use serde_json::Value;

pub const API_GROUP: &str = "ome.io";
pub const API_VERSION: &str = "v1beta1";

/// Every CRD this crate declares, in install order.
pub fn all() -> Vec<CustomResourceDefinition> {
    vec![
        AcceleratorClass::crd(),
        BaseModel::crd(),
        ClusterBaseModel::crd(),
        FineTunedWeight::crd(),
        BenchmarkJob::crd(),
    ]
}

/// Free-form object the API server stores as-is.
pub(crate) fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "nullable": true,
        "x-kubernetes-preserve-unknown-fields": true,
    })
}

/// Lists `fields` as required in the schema without touching how they decode.
pub(crate) fn require(schema: &mut Schema, fields: &[&str]) {
    let required = schema
        .ensure_object()
        .entry("required")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(required) = required {
        for field in fields {
            if !required.iter().any(|r| r.as_str() == Some(*field)) {
                required.push(Value::from(*field));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_crds_share_the_api_group() {
        let crds = all();
        assert_eq!(crds.len(), 5);
        for crd in &crds {
            assert_eq!(crd.spec.group, API_GROUP);
            assert_eq!(crd.spec.versions[0].name, API_VERSION);
        }
    }

    #[test]
    fn require_appends_without_duplicates() {
        let mut schema = json_schema!({"type": "object", "required": ["a"]});
        require(&mut schema, &["a", "b"]);
        require(&mut schema, &["b"]);
        assert_eq!(schema.get("required"), Some(&serde_json::json!(["a", "b"])));
    }

    #[test]
    fn scopes_follow_the_resource() {
        let scope = |kind: &str| {
            all()
                .into_iter()
                .find(|crd| crd.spec.names.kind == kind)
                .map(|crd| crd.spec.scope)
        };
        assert_eq!(scope("BenchmarkJob").as_deref(), Some("Namespaced"));
        assert_eq!(scope("BaseModel").as_deref(), Some("Namespaced"));
        assert_eq!(scope("ClusterBaseModel").as_deref(), Some("Cluster"));
        assert_eq!(scope("FineTunedWeight").as_deref(), Some("Cluster"));
    }
}
