//! Storage URI grammar.
//!
//! A storage URI names where model weights, datasets or benchmark results
//! live. The scheme prefix selects the grammar:
//!
//! | scheme      | shape                                                      |
//! |-------------|------------------------------------------------------------|
//! | `oci://`    | `n/{namespace}/b/{bucket}/o/{object_path}`                 |
//! | `pvc://`    | `{pvc}/{sub_path}` or `{namespace}:{pvc}/{sub_path}`       |
//! | `vendor://` | `{vendor}/{resource_type}/{resource_path}`                 |
//! | `hf://`     | `{model_id}[@{branch}]`                                    |
//! | `s3://`     | `{bucket}[@{region}][/{prefix}]`                           |
//! | `az://`     | `{account}[.blob.core.windows.net]/{container}[/{blob}]`   |
//! | `gs://`     | `{bucket}[/{object}]`                                      |
//! | `github://` | `{owner}/{repository}[@{tag}]`                             |

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const OCI_PREFIX: &str = "oci://";
pub const PVC_PREFIX: &str = "pvc://";
pub const VENDOR_PREFIX: &str = "vendor://";
pub const HUGGING_FACE_PREFIX: &str = "hf://";
pub const S3_PREFIX: &str = "s3://";
pub const AZURE_PREFIX: &str = "az://";
pub const GCS_PREFIX: &str = "gs://";
pub const GITHUB_PREFIX: &str = "github://";

const AZURE_BLOB_HOST: &str = ".blob.core.windows.net/";
const DEFAULT_HF_BRANCH: &str = "main";
const DEFAULT_GITHUB_TAG: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Oci,
    Pvc,
    Vendor,
    HuggingFace,
    S3,
    Azure,
    Gcs,
    GitHub,
}

impl StorageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            StorageType::Oci => OCI_PREFIX,
            StorageType::Pvc => PVC_PREFIX,
            StorageType::Vendor => VENDOR_PREFIX,
            StorageType::HuggingFace => HUGGING_FACE_PREFIX,
            StorageType::S3 => S3_PREFIX,
            StorageType::Azure => AZURE_PREFIX,
            StorageType::Gcs => GCS_PREFIX,
            StorageType::GitHub => GITHUB_PREFIX,
        }
    }

    /// Detects the storage type from the URI scheme.
    pub fn of(uri: &str) -> Result<Self, StorageUriError> {
        [
            StorageType::Oci,
            StorageType::Pvc,
            StorageType::Vendor,
            StorageType::HuggingFace,
            StorageType::S3,
            StorageType::Azure,
            StorageType::Gcs,
            StorageType::GitHub,
        ]
        .into_iter()
        .find(|ty| uri.starts_with(ty.prefix()))
        .ok_or_else(|| StorageUriError::UnknownType(uri.to_string()))
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageType::Oci => "OCI",
            StorageType::Pvc => "PVC",
            StorageType::Vendor => "VENDOR",
            StorageType::HuggingFace => "HUGGINGFACE",
            StorageType::S3 => "S3",
            StorageType::Azure => "AZURE",
            StorageType::Gcs => "GCS",
            StorageType::GitHub => "GITHUB",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageUriError {
    #[error("unknown storage type for URI: {0}")]
    UnknownType(String),

    #[error("invalid OCI storage URI format. Expected: oci://n/{{namespace}}/b/{{bucket}}/o/{{object_path}}")]
    OciLayout,

    #[error("invalid PVC storage URI format: {0}")]
    Pvc(&'static str),

    #[error("invalid PVC storage URI format: invalid namespace {0:?} (must be lowercase alphanumeric with hyphens, max 63 chars)")]
    PvcNamespace(String),

    #[error("invalid vendor storage URI format. Expected: vendor://{{vendor-name}}/{{resource-type}}/{{resource-path}}")]
    VendorLayout,

    #[error("invalid Hugging Face storage URI format: {0}")]
    HuggingFace(&'static str),

    #[error("invalid S3 storage URI format: {0}")]
    S3(&'static str),

    #[error("invalid Azure storage URI format: {0}")]
    Azure(&'static str),

    #[error("invalid GCS storage URI format: {0}")]
    Gcs(&'static str),

    #[error("invalid GitHub storage URI format: {0}")]
    GitHub(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciStorage {
    pub namespace: String,
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvcStorage {
    /// Absent when the namespace is inferred from the referencing object.
    pub namespace: Option<String>,
    pub pvc_name: String,
    pub sub_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorStorage {
    pub vendor_name: String,
    pub resource_type: String,
    pub resource_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuggingFaceStorage {
    pub model_id: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Storage {
    pub bucket: String,
    pub prefix: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureStorage {
    pub account_name: String,
    pub container_name: String,
    pub blob_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsStorage {
    pub bucket: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubStorage {
    pub owner: String,
    pub repository: String,
    pub tag: String,
}

/// A parsed storage URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageUri {
    Oci(OciStorage),
    Pvc(PvcStorage),
    Vendor(VendorStorage),
    HuggingFace(HuggingFaceStorage),
    S3(S3Storage),
    Azure(AzureStorage),
    Gcs(GcsStorage),
    GitHub(GitHubStorage),
}

impl StorageUri {
    pub fn parse(uri: &str) -> Result<Self, StorageUriError> {
        let ty = StorageType::of(uri)?;
        let rest = &uri[ty.prefix().len()..];
        let parsed = match ty {
            StorageType::Oci => StorageUri::Oci(parse_oci(rest)?),
            StorageType::Pvc => StorageUri::Pvc(parse_pvc(rest)?),
            StorageType::Vendor => StorageUri::Vendor(parse_vendor(rest)?),
            StorageType::HuggingFace => StorageUri::HuggingFace(parse_hugging_face(rest)?),
            StorageType::S3 => StorageUri::S3(parse_s3(rest)?),
            StorageType::Azure => StorageUri::Azure(parse_azure(rest)?),
            StorageType::Gcs => StorageUri::Gcs(parse_gcs(rest)?),
            StorageType::GitHub => StorageUri::GitHub(parse_github(rest)?),
        };
        Ok(parsed)
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            StorageUri::Oci(_) => StorageType::Oci,
            StorageUri::Pvc(_) => StorageType::Pvc,
            StorageUri::Vendor(_) => StorageType::Vendor,
            StorageUri::HuggingFace(_) => StorageType::HuggingFace,
            StorageUri::S3(_) => StorageType::S3,
            StorageUri::Azure(_) => StorageType::Azure,
            StorageUri::Gcs(_) => StorageType::Gcs,
            StorageUri::GitHub(_) => StorageType::GitHub,
        }
    }
}

impl FromStr for StorageUri {
    type Err = StorageUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageUri::parse(s)
    }
}

/// Checks `uri` against the grammar of its scheme.
pub fn validate_storage_uri(uri: &str) -> Result<StorageType, StorageUriError> {
    StorageUri::parse(uri).map(|parsed| parsed.storage_type())
}

fn parse_oci(rest: &str) -> Result<OciStorage, StorageUriError> {
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.len() < 6 || parts[0] != "n" || parts[2] != "b" || parts[4] != "o" {
        return Err(StorageUriError::OciLayout);
    }

    Ok(OciStorage {
        namespace: parts[1].to_string(),
        bucket: parts[3].to_string(),
        prefix: parts[5..].join("/"),
    })
}

fn parse_pvc(rest: &str) -> Result<PvcStorage, StorageUriError> {
    if rest.is_empty() {
        return Err(StorageUriError::Pvc("missing content after prefix"));
    }
    let (head, sub_path) = rest
        .split_once('/')
        .ok_or(StorageUriError::Pvc("missing subpath"))?;

    let (namespace, pvc_name) = match head.split_once(':') {
        Some((namespace, pvc_name)) => {
            if namespace.is_empty() {
                return Err(StorageUriError::Pvc("empty namespace before colon"));
            }
            if pvc_name.is_empty() {
                return Err(StorageUriError::Pvc("empty PVC name after colon"));
            }
            if pvc_name.contains(':') {
                return Err(StorageUriError::Pvc(
                    "multiple colons not allowed in namespace:pvc-name",
                ));
            }
            if !is_valid_namespace(namespace) {
                return Err(StorageUriError::PvcNamespace(namespace.to_string()));
            }
            (Some(namespace.to_string()), pvc_name)
        }
        None if head.is_empty() => return Err(StorageUriError::Pvc("missing PVC name")),
        None => (None, head),
    };

    if sub_path.is_empty() {
        return Err(StorageUriError::Pvc("missing subpath"));
    }

    Ok(PvcStorage {
        namespace,
        pvc_name: pvc_name.to_string(),
        sub_path: sub_path.to_string(),
    })
}

/// Lowercase alphanumerics and `-`, at most 63 chars, no leading or trailing `-`.
fn is_valid_namespace(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 63
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

fn parse_vendor(rest: &str) -> Result<VendorStorage, StorageUriError> {
    let mut parts = rest.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(vendor), Some(ty), Some(path))
            if !vendor.is_empty() && !ty.is_empty() && !path.is_empty() =>
        {
            Ok(VendorStorage {
                vendor_name: vendor.to_string(),
                resource_type: ty.to_string(),
                resource_path: path.to_string(),
            })
        }
        _ => Err(StorageUriError::VendorLayout),
    }
}

fn parse_hugging_face(rest: &str) -> Result<HuggingFaceStorage, StorageUriError> {
    if rest.is_empty() {
        return Err(StorageUriError::HuggingFace("missing model ID"));
    }
    let (model_id, branch) = rest.split_once('@').unwrap_or((rest, DEFAULT_HF_BRANCH));
    if model_id.is_empty() {
        return Err(StorageUriError::HuggingFace("model ID cannot be empty"));
    }

    Ok(HuggingFaceStorage {
        model_id: model_id.to_string(),
        branch: branch.to_string(),
    })
}

fn parse_s3(rest: &str) -> Result<S3Storage, StorageUriError> {
    if rest.is_empty() {
        return Err(StorageUriError::S3("missing bucket name"));
    }

    let (bucket, region, prefix) = match rest.split_once('@') {
        Some((bucket, located)) => {
            let (region, prefix) = located.split_once('/').unwrap_or((located, ""));
            (bucket, Some(region.to_string()), prefix)
        }
        None => {
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            (bucket, None, prefix)
        }
    };

    if bucket.is_empty() {
        return Err(StorageUriError::S3("bucket name cannot be empty"));
    }

    Ok(S3Storage {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
        region,
    })
}

fn parse_azure(rest: &str) -> Result<AzureStorage, StorageUriError> {
    if rest.is_empty() {
        return Err(StorageUriError::Azure("missing account name"));
    }

    let (account, container, blob) = match rest.split_once(AZURE_BLOB_HOST) {
        Some((account, path)) => {
            let (container, blob) = path.split_once('/').unwrap_or((path, ""));
            (account, container, blob)
        }
        None => {
            let mut parts = rest.splitn(3, '/');
            let account = parts.next().unwrap_or_default();
            let container = parts
                .next()
                .ok_or(StorageUriError::Azure("missing container name"))?;
            (account, container, parts.next().unwrap_or_default())
        }
    };

    if account.is_empty() || container.is_empty() {
        return Err(StorageUriError::Azure(
            "account name and container name are required",
        ));
    }

    Ok(AzureStorage {
        account_name: account.to_string(),
        container_name: container.to_string(),
        blob_path: blob.to_string(),
    })
}

fn parse_gcs(rest: &str) -> Result<GcsStorage, StorageUriError> {
    if rest.is_empty() {
        return Err(StorageUriError::Gcs("missing bucket name"));
    }
    let (bucket, object) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(StorageUriError::Gcs("bucket name cannot be empty"));
    }

    Ok(GcsStorage {
        bucket: bucket.to_string(),
        object: object.to_string(),
    })
}

fn parse_github(rest: &str) -> Result<GitHubStorage, StorageUriError> {
    if rest.is_empty() {
        return Err(StorageUriError::GitHub("missing owner/repository"));
    }

    let (repo, tag) = rest.split_once('@').unwrap_or((rest, DEFAULT_GITHUB_TAG));
    let (owner, repository) = repo
        .split_once('/')
        .ok_or(StorageUriError::GitHub("expected owner/repository"))?;

    if owner.is_empty() || repository.is_empty() {
        return Err(StorageUriError::GitHub(
            "owner and repository are required",
        ));
    }

    Ok(GitHubStorage {
        owner: owner.to_string(),
        repository: repository.to_string(),
        tag: tag.to_string(),
    })
}
