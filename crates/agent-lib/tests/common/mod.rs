//! Shared fixtures: an in-memory backend that counts calls, failing
//! ledgers, and an in-process agent server.

#![allow(dead_code)]

use agent_lib::backend::{BackendError, ResourceBackend};
use agent_lib::ledger::{LedgerError, UpgradeRecord, VersionLedger};
use agent_lib::manifest::{ManifestKind, ManifestObject};
use agent_lib::proto::{AgentService, AgentServiceServer};
use agent_lib::{ClusterAgent, ClusterEndpoint};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Node, Pod, PodSpec, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

pub const DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx:1.25
"#;

pub const CONFIG_MAP: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n";

type ObjectKey = (ManifestKind, String, String);

#[derive(Debug, Default)]
pub struct CallCounts {
    pub reads: AtomicUsize,
    pub gets: AtomicUsize,
    pub creates: AtomicUsize,
    pub replaces: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        [
            &self.reads,
            &self.gets,
            &self.creates,
            &self.replaces,
            &self.deletes,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

/// In-memory cluster. Writes behave like the API server: create conflicts on
/// existing objects, replace requires the current resourceVersion.
#[derive(Default)]
pub struct FakeBackend {
    objects: Mutex<HashMap<ObjectKey, ManifestObject>>,
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    logs: HashMap<(String, String), String>,
    fail_writes: AtomicBool,
    fail_lookups: AtomicBool,
    pub calls: CallCounts,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, name: &str, internal_ip: &str) -> Self {
        self.nodes.push(Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations: Some(BTreeMap::from([(
                    "k3s.io/internal-ip".to_string(),
                    internal_ip.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        });
        self
    }

    pub fn with_pod(mut self, namespace: &str, name: &str, image: &str) -> Self {
        self.pods.push(Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: name.to_string(),
                    image: Some(image.to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                ..Default::default()
            }),
        });
        self
    }

    pub fn with_logs(mut self, namespace: &str, name: &str, text: &str) -> Self {
        self.logs
            .insert((namespace.to_string(), name.to_string()), text.to_string());
        self
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    pub fn stored(&self, kind: ManifestKind, namespace: &str, name: &str) -> Option<ManifestObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn key(object: &ManifestObject) -> ObjectKey {
        (
            object.kind(),
            object.namespace().to_string(),
            object.name().to_string(),
        )
    }

    fn check_writable(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                code: 500,
                message: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceBackend for FakeBackend {
    async fn list_nodes(&self) -> Result<Vec<Node>, BackendError> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.nodes.clone())
    }

    async fn get_node(&self, name: &str) -> Result<Node, BackendError> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        self.nodes
            .iter()
            .find(|n| n.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| BackendError::not_found("Node", name))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, BackendError> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pods
            .iter()
            .filter(|p| p.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, BackendError> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        self.pods
            .iter()
            .find(|p| {
                p.metadata.namespace.as_deref() == Some(namespace)
                    && p.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| BackendError::not_found("Pod", name))
    }

    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String, BackendError> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        self.logs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| BackendError::not_found("Pod", name))
    }

    async fn get_object(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
    ) -> Result<ManifestObject, BackendError> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(BackendError::Client("connection refused".to_string()));
        }
        self.stored(kind, namespace, name)
            .ok_or_else(|| BackendError::not_found(kind.as_str(), name))
    }

    async fn create_object(&self, object: &ManifestObject) -> Result<(), BackendError> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        let mut objects = self.objects.lock().unwrap();
        let key = Self::key(object);
        if objects.contains_key(&key) {
            return Err(BackendError::Conflict(format!("{} already exists", object.name())));
        }

        let mut stored = object.clone();
        stored.metadata_mut().resource_version = Some("1".to_string());
        objects.insert(key, stored);
        Ok(())
    }

    async fn replace_object(&self, object: &ManifestObject) -> Result<(), BackendError> {
        self.calls.replaces.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        let mut objects = self.objects.lock().unwrap();
        let key = Self::key(object);
        let current = objects
            .get(&key)
            .ok_or_else(|| BackendError::not_found(object.kind().as_str(), object.name()))?;
        if current.resource_version() != object.resource_version() {
            return Err(BackendError::Conflict("resourceVersion mismatch".to_string()));
        }

        let next: u64 = current
            .resource_version()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
            + 1;
        let mut stored = object.clone();
        stored.metadata_mut().resource_version = Some(next.to_string());
        objects.insert(key, stored);
        Ok(())
    }

    async fn delete_object(
        &self,
        kind: ManifestKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), BackendError> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        self.objects
            .lock()
            .unwrap()
            .remove(&(kind, namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| BackendError::not_found(kind.as_str(), name))
    }
}

/// Ledger whose writes always fail
pub struct BrokenLedger;

#[async_trait]
impl VersionLedger for BrokenLedger {
    async fn insert(&self, _record: &UpgradeRecord) -> Result<i64, LedgerError> {
        Err(LedgerError::Task("disk full".to_string()))
    }
}

/// Serve `agent` on an ephemeral localhost port
pub async fn spawn_agent<B, L>(agent: ClusterAgent<B, L>) -> ClusterEndpoint
where
    B: ResourceBackend,
    L: VersionLedger,
{
    spawn_service(agent).await
}

/// Serve any `AgentService` implementation on an ephemeral local port
pub async fn spawn_service<S: AgentService>(service: S) -> ClusterEndpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        Server::builder()
            .add_service(AgentServiceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    ClusterEndpoint::new("local", "127.0.0.1", port.to_string())
}
