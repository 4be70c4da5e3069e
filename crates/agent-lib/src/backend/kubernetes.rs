use super::{BackendError, ResourceBackend};
use crate::manifest::{ManifestKind, ManifestObject};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::path::Path;
use tracing::{debug, info};

/// Namespaced, statically typed objects this backend reads and writes
trait Workload:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + DeserializeOwned
    + Serialize
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<K> Workload for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// [`ResourceBackend`] backed by a live Kubernetes API server
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    /// Connect using an explicit kubeconfig, or the usual inference chain
    /// (`KUBECONFIG`, `~/.kube/config`, in-cluster service account).
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, BackendError> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    BackendError::Client(format!(
                        "failed to read kubeconfig {}: {e}",
                        path.display()
                    ))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| BackendError::Client(e.to_string()))?
            }
            None => Config::infer()
                .await
                .map_err(|e| BackendError::Client(e.to_string()))?,
        };

        info!(cluster_url = %config.cluster_url, "Connecting to Kubernetes API server");

        let client = Client::try_from(config).map_err(|e| BackendError::Client(e.to_string()))?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// API server build version, used as a startup probe
    pub async fn server_version(&self) -> Result<String, BackendError> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| map_kube_error(e, "version", ""))?;
        Ok(info.git_version)
    }

    fn namespaced<K: Workload>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn fetch<K: Workload>(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
    ) -> Result<K, BackendError> {
        self.namespaced::<K>(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, kind.as_str(), name))
    }

    async fn create<K: Workload>(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
        object: &K,
    ) -> Result<(), BackendError> {
        self.namespaced::<K>(namespace)
            .create(&PostParams::default(), object)
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, kind.as_str(), name))
    }

    async fn replace<K: Workload>(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
        object: &K,
    ) -> Result<(), BackendError> {
        self.namespaced::<K>(namespace)
            .replace(name, &PostParams::default(), object)
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, kind.as_str(), name))
    }

    async fn remove<K: Workload>(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), BackendError> {
        self.namespaced::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, kind.as_str(), name))
    }
}

#[async_trait]
impl ResourceBackend for KubeBackend {
    async fn list_nodes(&self) -> Result<Vec<Node>, BackendError> {
        let nodes = Api::<Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_error(e, "Node", ""))?;
        debug!(count = nodes.items.len(), "Listed nodes");
        Ok(nodes.items)
    }

    async fn get_node(&self, name: &str) -> Result<Node, BackendError> {
        Api::<Node>::all(self.client.clone())
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, "Node", name))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, BackendError> {
        let pods = self
            .namespaced::<Pod>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_error(e, "Pod", ""))?;
        debug!(namespace, count = pods.items.len(), "Listed pods");
        Ok(pods.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, BackendError> {
        self.fetch(ManifestKind::Pod, namespace, name).await
    }

    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String, BackendError> {
        let pod: Pod = self.fetch(ManifestKind::Pod, namespace, name).await?;
        self.namespaced::<Pod>(namespace)
            .logs(name, &log_params(&pod))
            .await
            .map_err(|e| map_kube_error(e, "Pod", name))
    }

    async fn get_object(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
    ) -> Result<ManifestObject, BackendError> {
        Ok(match kind {
            ManifestKind::Deployment => {
                ManifestObject::Deployment(self.fetch(kind, namespace, name).await?)
            }
            ManifestKind::Service => ManifestObject::Service(self.fetch(kind, namespace, name).await?),
            ManifestKind::Pod => ManifestObject::Pod(self.fetch(kind, namespace, name).await?),
        })
    }

    async fn create_object(&self, object: &ManifestObject) -> Result<(), BackendError> {
        let (kind, namespace, name) = (object.kind(), object.namespace(), object.name());
        match object {
            ManifestObject::Deployment(d) => self.create(kind, namespace, name, d).await,
            ManifestObject::Service(s) => self.create(kind, namespace, name, s).await,
            ManifestObject::Pod(p) => self.create(kind, namespace, name, p).await,
        }
    }

    async fn replace_object(&self, object: &ManifestObject) -> Result<(), BackendError> {
        let (kind, namespace, name) = (object.kind(), object.namespace(), object.name());
        match object {
            ManifestObject::Deployment(d) => self.replace(kind, namespace, name, d).await,
            ManifestObject::Service(s) => self.replace(kind, namespace, name, s).await,
            ManifestObject::Pod(p) => self.replace(kind, namespace, name, p).await,
        }
    }

    async fn delete_object(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), BackendError> {
        match kind {
            ManifestKind::Deployment => self.remove::<Deployment>(kind, namespace, name).await,
            ManifestKind::Service => self.remove::<Service>(kind, namespace, name).await,
            ManifestKind::Pod => self.remove::<Pod>(kind, namespace, name).await,
        }
    }
}

fn map_kube_error(err: kube::Error, kind: &str, name: &str) -> BackendError {
    match err {
        kube::Error::Api(response) if response.code == 404 => BackendError::not_found(kind, name),
        kube::Error::Api(response) if response.code == 409 => {
            BackendError::Conflict(response.message)
        }
        kube::Error::Api(response) => BackendError::Api {
            code: response.code,
            message: response.message,
        },
        other => BackendError::Client(other.to_string()),
    }
}

/// The API server rejects log reads without a container on multi-container
/// pods; the first container in the spec is read.
fn log_params(pod: &Pod) -> LogParams {
    LogParams {
        container: pod
            .spec
            .as_ref()
            .and_then(|spec| spec.containers.first())
            .map(|container| container.name.clone()),
        ..LogParams::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn test_not_found_is_classified() {
        let err = map_kube_error(api_error(404, "pods \"web\" not found"), "Pod", "web");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Pod \"web\" not found");
    }

    #[test]
    fn test_conflict_and_other_api_errors() {
        assert!(matches!(
            map_kube_error(api_error(409, "already exists"), "Service", "api"),
            BackendError::Conflict(message) if message == "already exists"
        ));
        assert!(matches!(
            map_kube_error(api_error(403, "forbidden"), "Service", "api"),
            BackendError::Api { code: 403, .. }
        ));
    }

    #[test]
    fn test_logs_read_the_first_container() {
        use k8s_openapi::api::core::v1::{Container, PodSpec};

        let pod = Pod {
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "app".to_string(),
                        ..Container::default()
                    },
                    Container {
                        name: "sidecar".to_string(),
                        ..Container::default()
                    },
                ],
                ..PodSpec::default()
            }),
            ..Pod::default()
        };
        assert_eq!(log_params(&pod).container.as_deref(), Some("app"));

        assert_eq!(log_params(&Pod::default()).container, None);
    }
}
