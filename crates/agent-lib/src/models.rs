//! Core data models shared by the agent and the dispatcher

use crate::proto;
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Namespace used whenever a request or manifest leaves it out
pub const DEFAULT_NAMESPACE: &str = "default";

/// k3s publishes the node's internal address here
pub const INTERNAL_IP_ANNOTATION: &str = "k3s.io/internal-ip";
pub const ARCH_LABEL: &str = "kubernetes.io/arch";
pub const APP_LABEL: &str = "app";

/// One cluster's agent, as listed in the operator's inventory file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    pub name: String,
    pub host: String,
    #[serde(deserialize_with = "port_from_string_or_int")]
    pub port: String,
}

impl ClusterEndpoint {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: port.into(),
        }
    }

    /// gRPC endpoint URI for this cluster's agent
    pub fn uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ClusterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.host)
    }
}

// Inventory files use both `port: 50051` and `port: "50051"`.
fn port_from_string_or_int<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(port) => port,
        Port::Number(port) => port.to_string(),
    })
}

/// Errors in upgrade arguments, detected before anything is mutated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid upgrade type {0}: expected 0 (Micom Manager), 1 (Device Bringup), 2 (Navigation) or 3 (Middleware)")]
    ComponentType(i32),

    #[error("invalid version \"{0}\": version must be in the format of <00.00.00>")]
    MalformedVersion(String),
}

/// Component whose version the upgrade command records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    MicomManager,
    DeviceBringup,
    Navigation,
    Middleware,
}

impl ComponentType {
    pub const ALL: [ComponentType; 4] = [
        ComponentType::MicomManager,
        ComponentType::DeviceBringup,
        ComponentType::Navigation,
        ComponentType::Middleware,
    ];

    /// Resolve the wire index (`-t` on the command line)
    pub fn from_index(index: i32) -> Result<Self, ValidationError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(ValidationError::ComponentType(index))
    }

    pub fn index(&self) -> i32 {
        match self {
            ComponentType::MicomManager => 0,
            ComponentType::DeviceBringup => 1,
            ComponentType::Navigation => 2,
            ComponentType::Middleware => 3,
        }
    }

    /// Value stored in the `repo_name` column
    pub fn repo_name(&self) -> &'static str {
        match self {
            ComponentType::MicomManager => "MICOM_MANAGER",
            ComponentType::DeviceBringup => "DEVICE_BRINGUP",
            ComponentType::Navigation => "NAVIGATION",
            ComponentType::Middleware => "MIDDLEWARE",
        }
    }

    /// Ledger table holding this component's history
    pub fn table(&self) -> &'static str {
        match self {
            ComponentType::MicomManager => "micom_managers",
            ComponentType::DeviceBringup => "device_bringups",
            ComponentType::Navigation => "navigations",
            ComponentType::Middleware => "middlewares",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ComponentType::MicomManager => "Micom Manager",
            ComponentType::DeviceBringup => "Device Bringup",
            ComponentType::Navigation => "Navigation",
            ComponentType::Middleware => "Middleware",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.repo_name())
    }
}

/// Three-part component version, `major.minor1.minor2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor1: u32,
    pub minor2: u32,
}

impl Version {
    pub fn new(major: u32, minor1: u32, minor2: u32) -> Self {
        Self {
            major,
            minor1,
            minor2,
        }
    }

    /// Date-based default used when the operator gives no version: `YY.M.D`
    pub fn today() -> Self {
        use chrono::Datelike;

        let today = chrono::Local::now().date_naive();
        Self::new(
            today.year().rem_euclid(100) as u32,
            today.month(),
            today.day(),
        )
    }
}

impl FromStr for Version {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedVersion(s.to_string());

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(malformed());
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            *slot = part.parse().map_err(|_| malformed())?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor1, self.minor2)
    }
}

// Read projections from Kubernetes objects to wire messages. Missing fields
// project to empty strings.

pub fn node_info(node: &Node) -> proto::NodeInfo {
    let system = node.status.as_ref().and_then(|s| s.node_info.as_ref());

    proto::NodeInfo {
        name: node.metadata.name.clone().unwrap_or_default(),
        internal_ip: node_internal_ip(node),
        arch: node
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(ARCH_LABEL).cloned())
            .or_else(|| system.map(|info| info.architecture.clone()))
            .unwrap_or_default(),
        kernel_version: system
            .map(|info| info.kernel_version.clone())
            .unwrap_or_default(),
    }
}

pub fn node_summary(node: &Node) -> proto::NodeSummary {
    proto::NodeSummary {
        name: node.metadata.name.clone().unwrap_or_default(),
        internal_ip: node_internal_ip(node),
    }
}

fn node_internal_ip(node: &Node) -> String {
    node.metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(INTERNAL_IP_ANNOTATION).cloned())
        .or_else(|| {
            node.status
                .as_ref()?
                .addresses
                .as_ref()?
                .iter()
                .find(|address| address.type_ == "InternalIP")
                .map(|address| address.address.clone())
        })
        .unwrap_or_default()
}

pub fn pod_info(pod: &Pod) -> proto::PodInfo {
    proto::PodInfo {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        phase: pod_phase(pod),
        label: pod
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(APP_LABEL).cloned())
            .unwrap_or_default(),
        status: pod_display_status(pod),
        image: pod
            .spec
            .as_ref()
            .and_then(|spec| spec.containers.first())
            .and_then(|container| container.image.clone())
            .unwrap_or_default(),
    }
}

pub fn pod_summary(pod: &Pod) -> proto::PodSummary {
    proto::PodSummary {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        phase: pod_phase(pod),
        status: pod_display_status(pod),
    }
}

fn pod_phase(pod: &Pod) -> String {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_default()
}

/// Status as `kubectl get pods` would show it
pub fn pod_display_status(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }

    let container_reason = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|container| container.state.as_ref())
        .find_map(|state| {
            state
                .waiting
                .as_ref()
                .and_then(|waiting| waiting.reason.clone())
                .or_else(|| {
                    state
                        .terminated
                        .as_ref()
                        .and_then(|terminated| terminated.reason.clone())
                })
        });

    container_reason.unwrap_or_else(|| pod_phase(pod))
}
