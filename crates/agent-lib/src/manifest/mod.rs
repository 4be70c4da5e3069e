//! Manifest classification and decoding
//!
//! A manifest is YAML text describing one workload object. Only the first
//! document of a multi-document file is considered. The `kind` field picks
//! the typed decoder; everything else is left to the Kubernetes schema.

mod reconciler;

pub use reconciler::{Action, ManifestReconciler, Reconciled};

use crate::backend::BackendError;
use crate::models::DEFAULT_NAMESPACE;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to classify manifest: {0}")]
    Classification(String),

    #[error("unsupported manifest kind \"{0}\": expected Deployment, Service or Pod")]
    UnsupportedKind(String),

    #[error("failed to decode {kind} manifest: {source}")]
    Decode {
        kind: ManifestKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} manifest has no metadata.name")]
    MissingName { kind: ManifestKind },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ManifestError {
    /// The manifest could not be mapped to a supported kind
    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            ManifestError::Classification(_) | ManifestError::UnsupportedKind(_)
        )
    }
}

/// Workload kinds the reconciler knows how to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Deployment,
    Service,
    Pod,
}

impl ManifestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::Deployment => "Deployment",
            ManifestKind::Service => "Service",
            ManifestKind::Pod => "Pod",
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManifestKind {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deployment" => Ok(ManifestKind::Deployment),
            "Service" => Ok(ManifestKind::Service),
            "Pod" => Ok(ManifestKind::Pod),
            other => Err(ManifestError::UnsupportedKind(other.to_string())),
        }
    }
}

/// A decoded manifest, typed by kind
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestObject {
    Deployment(Deployment),
    Service(Service),
    Pod(Pod),
}

impl ManifestObject {
    pub fn kind(&self) -> ManifestKind {
        match self {
            ManifestObject::Deployment(_) => ManifestKind::Deployment,
            ManifestObject::Service(_) => ManifestKind::Service,
            ManifestObject::Pod(_) => ManifestKind::Pod,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ManifestObject::Deployment(d) => &d.metadata,
            ManifestObject::Service(s) => &s.metadata,
            ManifestObject::Pod(p) => &p.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ManifestObject::Deployment(d) => &mut d.metadata,
            ManifestObject::Service(s) => &mut s.metadata,
            ManifestObject::Pod(p) => &mut p.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata()
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.metadata().resource_version.as_deref()
    }

    /// Carry the live object's resourceVersion so a replace is accepted
    pub fn adopt_resource_version(&mut self, live: &ManifestObject) {
        self.metadata_mut().resource_version = live.resource_version().map(str::to_string);
    }
}

/// Determine which workload kind a manifest describes
pub fn classify(text: &str) -> Result<ManifestKind, ManifestError> {
    let document = first_document(text)?;
    kind_of(&document)
}

/// Decode a manifest into its typed object, filling in the default namespace
pub fn decode(text: &str) -> Result<ManifestObject, ManifestError> {
    let document = first_document(text)?;
    let kind = kind_of(&document)?;

    let value = serde_json::to_value(&document)
        .map_err(|source| ManifestError::Decode { kind, source })?;
    let decode_err = |source| ManifestError::Decode { kind, source };

    let mut object = match kind {
        ManifestKind::Deployment => {
            ManifestObject::Deployment(serde_json::from_value(value).map_err(decode_err)?)
        }
        ManifestKind::Service => {
            ManifestObject::Service(serde_json::from_value(value).map_err(decode_err)?)
        }
        ManifestKind::Pod => ManifestObject::Pod(serde_json::from_value(value).map_err(decode_err)?),
    };

    if object.name().is_empty() {
        return Err(ManifestError::MissingName { kind });
    }

    let metadata = object.metadata_mut();
    if metadata.namespace.as_deref().map_or(true, str::is_empty) {
        metadata.namespace = Some(DEFAULT_NAMESPACE.to_string());
    }

    Ok(object)
}

fn first_document(text: &str) -> Result<serde_yaml::Value, ManifestError> {
    let document = serde_yaml::Deserializer::from_str(text)
        .next()
        .ok_or_else(|| ManifestError::Classification("manifest is empty".to_string()))?;

    serde_yaml::Value::deserialize(document)
        .map_err(|e| ManifestError::Classification(format!("invalid YAML: {e}")))
}

fn kind_of(document: &serde_yaml::Value) -> Result<ManifestKind, ManifestError> {
    if !document.is_mapping() {
        return Err(ManifestError::Classification(
            "manifest is not a YAML mapping".to_string(),
        ));
    }

    match document.get("kind") {
        Some(serde_yaml::Value::String(kind)) => kind.parse(),
        Some(_) => Err(ManifestError::Classification(
            "`kind` must be a string".to_string(),
        )),
        None => Err(ManifestError::Classification(
            "manifest has no `kind` field".to_string(),
        )),
    }
}
