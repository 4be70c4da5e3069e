//! `AgentService` implementation served by every cluster's agent

use crate::backend::{BackendError, ResourceBackend};
use crate::health::{components, HealthRegistry};
use crate::ledger::{LedgerError, UpgradeRecord, VersionLedger};
use crate::logs::{self, DEFAULT_LOG_CHUNK_BYTES};
use crate::manifest::{Action, ManifestError, ManifestReconciler, Reconciled};
use crate::models::{self, ComponentType, ValidationError, Version, DEFAULT_NAMESPACE};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::proto::{
    self, AgentService, GetNodeRequest, GetNodesRequest, GetPodLogsRequest, GetPodRequest,
    GetPodsRequest, ManifestRequest, ManifestResponse, NodeInfo, NodeList, PodInfo, PodList,
    PodLogChunk, UpgradeManifestRequest, UpgradeManifestResponse,
};
use crate::status;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::debug;

/// Chunks buffered between the log producer and the gRPC stream
const LOG_CHANNEL_CAPACITY: usize = 4;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reconcile(#[from] ManifestError),

    #[error("manifest applied but the version was not recorded: {0}")]
    Ledger(#[from] LedgerError),
}

impl From<&UpgradeError> for Status {
    fn from(err: &UpgradeError) -> Self {
        match err {
            UpgradeError::Validation(e) => status::from_validation_error(e),
            UpgradeError::Reconcile(e) => status::from_manifest_error(e),
            UpgradeError::Ledger(_) => {
                status::tagged(tonic::Code::Internal, status::ErrorKind::Ledger, err.to_string())
            }
        }
    }
}

/// Outcome of a successful upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgraded {
    pub reconciled: Reconciled,
    pub record: UpgradeRecord,
    pub record_id: i64,
}

/// The per-cluster agent: answers reads from the backend, reconciles
/// manifests and records upgrades in the version ledger.
pub struct ClusterAgent<B, L> {
    backend: Arc<B>,
    reconciler: ManifestReconciler<B>,
    ledger: Arc<L>,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
    log_chunk_bytes: usize,
}

impl<B: ResourceBackend, L: VersionLedger> ClusterAgent<B, L> {
    pub fn new(backend: Arc<B>, ledger: Arc<L>) -> Self {
        Self {
            reconciler: ManifestReconciler::new(Arc::clone(&backend)),
            backend,
            ledger,
            health: HealthRegistry::new(),
            metrics: AgentMetrics::new(),
            logger: StructuredLogger::new("local"),
            log_chunk_bytes: DEFAULT_LOG_CHUNK_BYTES,
        }
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_log_chunk_bytes(mut self, bytes: usize) -> Self {
        self.log_chunk_bytes = bytes;
        self
    }

    /// Validate, apply, then record. Nothing reaches the backend unless both
    /// arguments are valid, and nothing reaches the ledger unless the apply
    /// succeeded.
    pub async fn upgrade(
        &self,
        yaml: &str,
        version: &str,
        component_type: i32,
    ) -> Result<Upgraded, UpgradeError> {
        let component = ComponentType::from_index(component_type)?;
        let version: Version = version.parse()?;

        let reconciled = self.reconciler.apply(yaml).await?;
        self.metrics.inc_reconciliation(&reconciled);

        let record = UpgradeRecord::now(component, version);
        let inserted = self.ledger.insert(&record).await;
        self.health.record(components::LEDGER, &inserted).await;

        let record_id = match inserted {
            Ok(id) => id,
            Err(err) => {
                self.logger
                    .log_upgrade(component, &version, None, Some(&err.to_string()));
                return Err(err.into());
            }
        };
        self.metrics.inc_ledger_writes();
        self.logger
            .log_upgrade(component, &version, Some(record_id), None);

        Ok(Upgraded {
            reconciled,
            record,
            record_id,
        })
    }

    async fn observe_backend<T>(&self, result: &Result<T, BackendError>) {
        // Missing objects and rejected writes say nothing about backend health.
        match result {
            Ok(_) | Err(BackendError::Client(_)) => {
                self.health.record(components::KUBE_BACKEND, result).await
            }
            Err(_) => {}
        }
    }

    fn finish<T>(
        &self,
        method: &'static str,
        target: &str,
        started: Instant,
        result: Result<T, Status>,
    ) -> Result<Response<T>, Status> {
        self.metrics
            .observe_rpc(method, result.is_ok(), started.elapsed());

        match &result {
            Ok(_) => debug!(method, target, "AgentService call completed"),
            Err(status) => self
                .logger
                .log_rpc_failure(method, target, status.message()),
        }

        result.map(Response::new)
    }

    fn manifest_response(&self, result: Result<Reconciled, ManifestError>) -> Result<ManifestResponse, Status> {
        let reconciled = result.map_err(|e| status::from_manifest_error(&e))?;
        self.metrics.inc_reconciliation(&reconciled);
        self.logger.log_reconciled(&reconciled);

        Ok(ManifestResponse {
            message: reconciled.message(),
            kind: reconciled.kind.to_string(),
            name: reconciled.name.clone(),
            namespace: reconciled.namespace.clone(),
            action: wire_action(reconciled.action) as i32,
        })
    }
}

fn wire_action(action: Action) -> proto::ReconcileAction {
    match action {
        Action::Created => proto::ReconcileAction::Created,
        Action::Updated => proto::ReconcileAction::Updated,
        Action::Deleted => proto::ReconcileAction::Deleted,
    }
}

// The CLI always sends a namespace; this covers other gRPC callers.
fn namespace_or_default(namespace: String) -> String {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE.to_string()
    } else {
        namespace
    }
}

#[tonic::async_trait]
impl<B: ResourceBackend, L: VersionLedger> AgentService for ClusterAgent<B, L> {
    async fn get_node(&self, request: Request<GetNodeRequest>) -> Result<Response<NodeInfo>, Status> {
        let started = Instant::now();
        let name = request.into_inner().name;

        let result = self.backend.get_node(&name).await;
        self.observe_backend(&result).await;
        let result = result
            .map(|node| models::node_info(&node))
            .map_err(|e| status::from_lookup_error(&e));

        self.finish("GetNode", &name, started, result)
    }

    async fn get_nodes(&self, _request: Request<GetNodesRequest>) -> Result<Response<NodeList>, Status> {
        let started = Instant::now();

        let result = self.backend.list_nodes().await;
        self.observe_backend(&result).await;
        let result = result
            .map(|nodes| NodeList {
                nodes: nodes.iter().map(models::node_summary).collect(),
            })
            .map_err(|e| status::from_lookup_error(&e));

        self.finish("GetNodes", "*", started, result)
    }

    async fn get_pod(&self, request: Request<GetPodRequest>) -> Result<Response<PodInfo>, Status> {
        let started = Instant::now();
        let GetPodRequest { namespace, name } = request.into_inner();
        let namespace = namespace_or_default(namespace);
        let target = format!("{namespace}/{name}");

        let result = self.backend.get_pod(&namespace, &name).await;
        self.observe_backend(&result).await;
        let result = result
            .map(|pod| models::pod_info(&pod))
            .map_err(|e| status::from_lookup_error(&e));

        self.finish("GetPod", &target, started, result)
    }

    async fn get_pods(&self, request: Request<GetPodsRequest>) -> Result<Response<PodList>, Status> {
        let started = Instant::now();
        let namespace = namespace_or_default(request.into_inner().namespace);

        let result = self.backend.list_pods(&namespace).await;
        self.observe_backend(&result).await;
        let result = result
            .map(|pods| PodList {
                pods: pods.iter().map(models::pod_summary).collect(),
            })
            .map_err(|e| status::from_lookup_error(&e));

        self.finish("GetPods", &namespace, started, result)
    }

    type GetPodLogsStream = ReceiverStream<Result<PodLogChunk, Status>>;

    async fn get_pod_logs(
        &self,
        request: Request<GetPodLogsRequest>,
    ) -> Result<Response<Self::GetPodLogsStream>, Status> {
        let started = Instant::now();
        let GetPodLogsRequest { namespace, name } = request.into_inner();
        let namespace = namespace_or_default(namespace);
        let target = format!("{namespace}/{name}");

        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let backend = Arc::clone(&self.backend);
        let metrics = self.metrics.clone();
        let logger = self.logger.clone();
        let chunk_bytes = self.log_chunk_bytes;

        tokio::spawn(async move {
            let text = match backend.pod_logs(&namespace, &name).await {
                Ok(text) => text,
                Err(err) => {
                    metrics.observe_rpc("GetPodLogs", false, started.elapsed());
                    logger.log_rpc_failure("GetPodLogs", &target, &err.to_string());
                    let _ = tx.send(Err(status::from_lookup_error(&err))).await;
                    return;
                }
            };

            for chunk in logs::chunks(&text, chunk_bytes) {
                let message = PodLogChunk {
                    log: chunk.to_string(),
                };
                if tx.send(Ok(message)).await.is_err() {
                    debug!(%target, "Log stream closed by client");
                    metrics.observe_rpc("GetPodLogs", false, started.elapsed());
                    return;
                }
                metrics.add_log_bytes(chunk.len());
            }

            metrics.observe_rpc("GetPodLogs", true, started.elapsed());
            debug!(%target, bytes = text.len(), "Pod logs streamed");
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn apply_manifest(
        &self,
        request: Request<ManifestRequest>,
    ) -> Result<Response<ManifestResponse>, Status> {
        let started = Instant::now();
        let applied = self.reconciler.apply(&request.into_inner().yaml).await;
        let target = target_of(&applied);
        let result = self.manifest_response(applied);
        self.finish("ApplyManifest", &target, started, result)
    }

    async fn delete_manifest(
        &self,
        request: Request<ManifestRequest>,
    ) -> Result<Response<ManifestResponse>, Status> {
        let started = Instant::now();
        let deleted = self.reconciler.delete(&request.into_inner().yaml).await;
        let target = target_of(&deleted);
        let result = self.manifest_response(deleted);
        self.finish("DeleteManifest", &target, started, result)
    }

    async fn upgrade_manifest(
        &self,
        request: Request<UpgradeManifestRequest>,
    ) -> Result<Response<UpgradeManifestResponse>, Status> {
        let started = Instant::now();
        let UpgradeManifestRequest {
            yaml,
            version,
            component_type,
        } = request.into_inner();

        let result = self
            .upgrade(&yaml, &version, component_type)
            .await
            .map(|upgraded| {
                let Upgraded {
                    reconciled,
                    record,
                    record_id,
                } = upgraded;
                UpgradeManifestResponse {
                    message: reconciled.message(),
                    kind: reconciled.kind.to_string(),
                    name: reconciled.name,
                    namespace: reconciled.namespace,
                    action: wire_action(reconciled.action) as i32,
                    record_id,
                    version: record.version.to_string(),
                }
            })
            .map_err(|e| Status::from(&e));

        self.finish("UpgradeManifest", &version, started, result)
    }
}

fn target_of(result: &Result<Reconciled, ManifestError>) -> String {
    match result {
        Ok(reconciled) => format!(
            "{} {}/{}",
            reconciled.kind, reconciled.namespace, reconciled.name
        ),
        Err(_) => "manifest".to_string(),
    }
}
