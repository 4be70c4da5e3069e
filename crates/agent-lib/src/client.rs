//! gRPC client for a single cluster's agent
//!
//! One [`AgentClient`] wraps one plaintext HTTP/2 channel. The dispatcher
//! opens a fresh client per cluster per command; nothing is pooled.

use crate::models::ClusterEndpoint;
use crate::proto::{
    AgentServiceClient, GetNodeRequest, GetNodesRequest, GetPodLogsRequest, GetPodRequest,
    GetPodsRequest, ManifestRequest, ManifestResponse, NodeInfo, NodeSummary, PodInfo,
    PodSummary, UpgradeManifestRequest, UpgradeManifestResponse, MAX_MESSAGE_BYTES,
};
use crate::status::ErrorKind;
use std::time::Duration;
use thiserror::Error;
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::debug;

/// Why one cluster's part of a command failed
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("cluster backend error: {0}")]
    Backend(String),

    #[error("version ledger error: {0}")]
    Ledger(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("task aborted: {0}")]
    Aborted(String),
}

impl From<Status> for ClusterError {
    fn from(status: Status) -> Self {
        let message = status.message().to_string();

        match ErrorKind::of(&status) {
            Some(ErrorKind::NotFound) => ClusterError::NotFound(message),
            Some(ErrorKind::Classification | ErrorKind::Decode) => ClusterError::Manifest(message),
            Some(ErrorKind::Validation) => ClusterError::Validation(message),
            Some(ErrorKind::Backend) => ClusterError::Backend(message),
            Some(ErrorKind::Ledger) => ClusterError::Ledger(message),
            // Untagged statuses come from the transport, a proxy, or an older agent.
            None => match status.code() {
                Code::NotFound => ClusterError::NotFound(message),
                Code::DeadlineExceeded => ClusterError::Transport(format!("deadline exceeded: {message}")),
                code => ClusterError::Transport(format!("{code:?}: {message}")),
            },
        }
    }
}

/// Client-side connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    /// Per-request timeout; `None` waits as long as the agent takes
    pub request_timeout: Option<Duration>,
    pub max_message_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            max_message_bytes: MAX_MESSAGE_BYTES,
        }
    }
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn max_message_bytes(mut self, bytes: usize) -> Self {
        self.config.max_message_bytes = bytes;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AgentClient {
    inner: AgentServiceClient<Channel>,
}

impl AgentClient {
    pub async fn connect(
        endpoint: &ClusterEndpoint,
        config: &ClientConfig,
    ) -> Result<Self, ClusterError> {
        let uri = endpoint.uri();

        let mut channel = Channel::from_shared(uri.clone())
            .map_err(|e| ClusterError::Transport(format!("invalid agent address {uri}: {e}")))?
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            channel = channel.timeout(timeout);
        }

        let channel = channel
            .connect()
            .await
            .map_err(|e| ClusterError::Transport(format!("failed to connect to {uri}: {}", error_chain(&e))))?;

        debug!(cluster = %endpoint.name, %uri, "Connected to cluster agent");

        let inner = AgentServiceClient::new(channel)
            .max_decoding_message_size(config.max_message_bytes)
            .max_encoding_message_size(config.max_message_bytes);

        Ok(Self { inner })
    }

    pub async fn get_node(&mut self, name: &str) -> Result<NodeInfo, ClusterError> {
        let request = GetNodeRequest {
            name: name.to_string(),
        };
        Ok(self.inner.get_node(request).await?.into_inner())
    }

    pub async fn get_nodes(&mut self) -> Result<Vec<NodeSummary>, ClusterError> {
        Ok(self
            .inner
            .get_nodes(GetNodesRequest {})
            .await?
            .into_inner()
            .nodes)
    }

    pub async fn get_pod(&mut self, namespace: &str, name: &str) -> Result<PodInfo, ClusterError> {
        let request = GetPodRequest {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        Ok(self.inner.get_pod(request).await?.into_inner())
    }

    pub async fn get_pods(&mut self, namespace: &str) -> Result<Vec<PodSummary>, ClusterError> {
        let request = GetPodsRequest {
            namespace: namespace.to_string(),
        };
        Ok(self.inner.get_pods(request).await?.into_inner().pods)
    }

    /// Read the whole log stream. A stream that fails partway returns the
    /// error, never the partial text.
    pub async fn pod_logs(&mut self, namespace: &str, name: &str) -> Result<String, ClusterError> {
        let request = GetPodLogsRequest {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        let mut stream = self.inner.get_pod_logs(request).await?.into_inner();

        let mut text = String::new();
        while let Some(chunk) = stream.message().await? {
            text.push_str(&chunk.log);
        }
        Ok(text)
    }

    pub async fn apply_manifest(&mut self, yaml: &str) -> Result<ManifestResponse, ClusterError> {
        let request = ManifestRequest {
            yaml: yaml.to_string(),
        };
        Ok(self.inner.apply_manifest(request).await?.into_inner())
    }

    pub async fn delete_manifest(&mut self, yaml: &str) -> Result<ManifestResponse, ClusterError> {
        let request = ManifestRequest {
            yaml: yaml.to_string(),
        };
        Ok(self.inner.delete_manifest(request).await?.into_inner())
    }

    pub async fn upgrade_manifest(
        &mut self,
        yaml: &str,
        version: &str,
        component_type: i32,
    ) -> Result<UpgradeManifestResponse, ClusterError> {
        let request = UpgradeManifestRequest {
            yaml: yaml.to_string(),
            version: version.to_string(),
            component_type,
        };
        Ok(self.inner.upgrade_manifest(request).await?.into_inner())
    }
}

/// `tonic::transport::Error` only says "transport error"; the cause is in its sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
