//! Component health for the agent's liveness and readiness probes

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but the last call against it failed
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among the components; healthy when there are none
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .max_by_key(|status| match status {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// `/readyz` body: whether the agent takes RPCs, and the status of each of
/// its components (`kube_backend`, `ledger`, `grpc_server`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub components: BTreeMap<String, ComponentStatus>,
}

pub mod components {
    pub const KUBE_BACKEND: &str = "kube_backend";
    pub const LEDGER: &str = "ledger";
    pub const GRPC_SERVER: &str = "grpc_server";
}

/// Shared view of component health, updated by the agent as it runs
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    serving: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    /// Record the outcome of a call against a component: success marks it
    /// healthy, failure marks it degraded with the error text.
    pub async fn record<T, E: std::fmt::Display>(&self, name: &str, result: &Result<T, E>) {
        let health = match result {
            Ok(_) => ComponentHealth::healthy(),
            Err(err) => ComponentHealth::degraded(err.to_string()),
        };
        self.update(name, health).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Flip once the gRPC listener is bound, and back on shutdown
    pub async fn set_serving(&self, serving: bool) {
        *self.serving.write().await = serving;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let serving = *self.serving.read().await;
        let mut statuses: BTreeMap<String, ComponentStatus> = self
            .components
            .read()
            .await
            .iter()
            .map(|(name, health)| (name.clone(), health.status))
            .collect();
        if !serving {
            statuses.insert(components::GRPC_SERVER.to_string(), ComponentStatus::Unhealthy);
        }

        let reason = if !serving {
            Some(format!("{}: not serving", components::GRPC_SERVER))
        } else {
            let failing: Vec<&str> = statuses
                .iter()
                .filter(|(_, status)| **status == ComponentStatus::Unhealthy)
                .map(|(name, _)| name.as_str())
                .collect();
            (!failing.is_empty()).then(|| format!("unhealthy components: {}", failing.join(", ")))
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            components: statuses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy_but_not_ready() {
        let registry = HealthRegistry::new();

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_failed_backend_call_degrades() {
        let registry = HealthRegistry::new();
        registry.register(components::KUBE_BACKEND).await;
        registry.register(components::LEDGER).await;
        registry.set_serving(true).await;

        let failed: Result<(), String> = Err("connection refused".to_string());
        registry.record(components::KUBE_BACKEND, &failed).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::KUBE_BACKEND].message.as_deref(),
            Some("connection refused")
        );
        assert!(registry.readiness().await.ready);

        registry.record(components::KUBE_BACKEND, &Ok::<(), String>(())).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_unhealthy_component_blocks_readiness() {
        let registry = HealthRegistry::new();
        registry.register(components::GRPC_SERVER).await;
        registry.set_serving(true).await;
        registry
            .set_unhealthy(components::LEDGER, "database is locked")
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("unhealthy components: ledger")
        );
    }

    #[tokio::test]
    async fn test_readiness_lists_component_statuses() {
        let registry = HealthRegistry::new();
        registry.register(components::KUBE_BACKEND).await;
        registry.register(components::LEDGER).await;
        registry.register(components::GRPC_SERVER).await;

        let readiness = registry.readiness().await;
        assert_eq!(readiness.reason.as_deref(), Some("grpc_server: not serving"));
        assert_eq!(
            readiness.components.get(components::GRPC_SERVER),
            Some(&ComponentStatus::Unhealthy)
        );

        registry.set_serving(true).await;
        registry
            .update(components::KUBE_BACKEND, ComponentHealth::degraded("slow"))
            .await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        let names: Vec<&str> = readiness.components.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["grpc_server", "kube_backend", "ledger"]);
        assert_eq!(
            readiness.components.get(components::KUBE_BACKEND),
            Some(&ComponentStatus::Degraded)
        );
    }
}
