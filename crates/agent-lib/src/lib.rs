//! Library for the kmctl multi-cluster toolkit
//!
//! This crate provides the core functionality for:
//! - The agent's gRPC service (reads, manifest reconciliation, upgrades)
//! - The version ledger recording component upgrades
//! - The client and fan-out dispatcher used by the `kmctl` CLI
//! - Health checks and observability

pub mod backend;
pub mod client;
pub mod dispatch;
pub mod health;
pub mod ledger;
pub mod logs;
pub mod manifest;
pub mod models;
pub mod observability;
pub mod proto;
pub mod service;
pub mod status;

pub use backend::{BackendError, KubeBackend, ResourceBackend};
pub use client::{AgentClient, ClientConfig, ClientConfigBuilder, ClusterError};
pub use dispatch::{ClusterOutcome, DispatchConfig, Dispatcher};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use ledger::{LedgerError, SqliteLedger, UpgradeRecord, VersionLedger};
pub use manifest::{ManifestError, ManifestKind, ManifestObject, ManifestReconciler, Reconciled};
pub use models::{ClusterEndpoint, ComponentType, ValidationError, Version};
pub use observability::{AgentMetrics, StructuredLogger};
pub use service::{ClusterAgent, UpgradeError, Upgraded};
