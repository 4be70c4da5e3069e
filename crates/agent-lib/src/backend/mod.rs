//! Access to the cluster's object store
//!
//! The agent only talks to Kubernetes through [`ResourceBackend`], which
//! keeps the gRPC handlers and the reconciler testable without a cluster.

mod kubernetes;

pub use kubernetes::KubeBackend;

use crate::manifest::{ManifestKind, ManifestObject};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("API server returned {code}: {message}")]
    Api { code: u16, message: String },

    #[error("Kubernetes client error: {0}")]
    Client(String),
}

impl BackendError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        BackendError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

#[async_trait]
pub trait ResourceBackend: Send + Sync + 'static {
    async fn list_nodes(&self) -> Result<Vec<Node>, BackendError>;

    async fn get_node(&self, name: &str) -> Result<Node, BackendError>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, BackendError>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, BackendError>;

    /// Full log text currently available for the pod's first container
    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String, BackendError>;

    async fn get_object(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
    ) -> Result<ManifestObject, BackendError>;

    async fn create_object(&self, object: &ManifestObject) -> Result<(), BackendError>;

    async fn replace_object(&self, object: &ManifestObject) -> Result<(), BackendError>;

    async fn delete_object(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), BackendError>;
}
