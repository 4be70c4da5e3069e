//! Observability for the cluster agent
//!
//! Provides:
//! - Prometheus metrics (RPC counts and latency, reconciliations, ledger writes)
//! - Structured logging of agent lifecycle and mutation events

use crate::manifest::Reconciled;
use crate::models::{ComponentType, Version};
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for RPC latency (in seconds). Log and manifest calls
/// can take several seconds against a busy API server.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    rpc_requests_total: IntCounterVec,
    rpc_latency_seconds: HistogramVec,
    reconciliations_total: IntCounterVec,
    ledger_writes_total: IntCounter,
    log_bytes_streamed_total: IntCounter,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            rpc_requests_total: register_int_counter_vec!(
                "kmctl_agent_rpc_requests_total",
                "AgentService calls by method and outcome",
                &["method", "outcome"]
            )
            .expect("Failed to register rpc_requests_total"),

            rpc_latency_seconds: register_histogram_vec!(
                "kmctl_agent_rpc_latency_seconds",
                "Time spent handling AgentService calls",
                &["method"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register rpc_latency_seconds"),

            reconciliations_total: register_int_counter_vec!(
                "kmctl_agent_reconciliations_total",
                "Objects created, updated or deleted from manifests",
                &["kind", "action"]
            )
            .expect("Failed to register reconciliations_total"),

            ledger_writes_total: register_int_counter!(
                "kmctl_agent_ledger_writes_total",
                "Upgrade records written to the version ledger"
            )
            .expect("Failed to register ledger_writes_total"),

            log_bytes_streamed_total: register_int_counter!(
                "kmctl_agent_log_bytes_streamed_total",
                "Pod log bytes sent to clients"
            )
            .expect("Failed to register log_bytes_streamed_total"),
        }
    }
}

/// Handle to the process-wide agent metrics. Clones share the same series.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    /// Count one finished RPC and record how long it took
    pub fn observe_rpc(&self, method: &str, success: bool, elapsed: Duration) {
        let outcome = if success { "ok" } else { "error" };
        self.inner()
            .rpc_requests_total
            .with_label_values(&[method, outcome])
            .inc();
        self.inner()
            .rpc_latency_seconds
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_reconciliation(&self, reconciled: &Reconciled) {
        self.inner()
            .reconciliations_total
            .with_label_values(&[reconciled.kind.as_str(), reconciled.action.as_str()])
            .inc();
    }

    pub fn inc_ledger_writes(&self) {
        self.inner().ledger_writes_total.inc();
    }

    pub fn add_log_bytes(&self, bytes: usize) {
        self.inner().log_bytes_streamed_total.inc_by(bytes as u64);
    }

    pub fn rpc_count(&self, method: &str, success: bool) -> u64 {
        let outcome = if success { "ok" } else { "error" };
        self.inner()
            .rpc_requests_total
            .with_label_values(&[method, outcome])
            .get()
    }
}

/// Structured logger for agent lifecycle and mutation events
#[derive(Clone)]
pub struct StructuredLogger {
    cluster: String,
}

impl StructuredLogger {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }

    pub fn log_startup(&self, version: &str, grpc_addr: &str, ledger_path: &str) {
        info!(
            event = "agent_started",
            cluster = %self.cluster,
            agent_version = %version,
            grpc_addr = %grpc_addr,
            ledger = %ledger_path,
            "Cluster agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            cluster = %self.cluster,
            reason = %reason,
            "Cluster agent shutting down"
        );
    }

    pub fn log_reconciled(&self, reconciled: &Reconciled) {
        info!(
            event = "manifest_reconciled",
            cluster = %self.cluster,
            kind = %reconciled.kind,
            name = %reconciled.name,
            namespace = %reconciled.namespace,
            action = reconciled.action.as_str(),
            "{}",
            reconciled
        );
    }

    /// Log the end of an upgrade. `record_id` is `None` when nothing was recorded.
    pub fn log_upgrade(
        &self,
        component: ComponentType,
        version: &Version,
        record_id: Option<i64>,
        error: Option<&str>,
    ) {
        match error {
            None => info!(
                event = "component_upgraded",
                cluster = %self.cluster,
                component = %component,
                version = %version,
                record_id = ?record_id,
                "Upgrade recorded in version ledger"
            ),
            Some(error) => warn!(
                event = "component_upgrade_failed",
                cluster = %self.cluster,
                component = %component,
                version = %version,
                error = %error,
                "Upgrade failed, version ledger unchanged"
            ),
        }
    }

    pub fn log_rpc_failure(&self, method: &str, target: &str, error: &str) {
        warn!(
            event = "rpc_failed",
            cluster = %self.cluster,
            method = %method,
            target = %target,
            error = %error,
            "AgentService call failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Action, ManifestKind};

    #[test]
    fn test_rpc_counters_accumulate() {
        let metrics = AgentMetrics::new();
        let before = metrics.rpc_count("ObservabilityTest", true);

        metrics.observe_rpc("ObservabilityTest", true, Duration::from_millis(3));
        metrics.observe_rpc("ObservabilityTest", true, Duration::from_millis(5));
        metrics.observe_rpc("ObservabilityTest", false, Duration::from_millis(1));

        assert_eq!(metrics.rpc_count("ObservabilityTest", true), before + 2);
    }

    #[test]
    fn test_mutation_metrics_and_logging() {
        let metrics = AgentMetrics::new();
        let reconciled = Reconciled {
            kind: ManifestKind::Service,
            name: "api".to_string(),
            namespace: "default".to_string(),
            action: Action::Created,
        };

        metrics.inc_reconciliation(&reconciled);
        metrics.inc_ledger_writes();
        metrics.add_log_bytes(128);

        let logger = StructuredLogger::new("edge-lab");
        logger.log_reconciled(&reconciled);
        logger.log_upgrade(ComponentType::Middleware, &Version::new(1, 0, 0), Some(1), None);
        assert_eq!(logger.cluster, "edge-lab");
    }
}
