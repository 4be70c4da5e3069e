//! Agent configuration
//!
//! Values come from `KMCTL_AGENT_*` environment variables, then command-line
//! flags override whatever the environment set.

use agent_lib::ledger::DEFAULT_LEDGER_PATH;
use agent_lib::logs::DEFAULT_LOG_CHUNK_BYTES;
use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

/// Options of the `serve` subcommand
#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Address to bind the gRPC server to
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port for the gRPC server
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Path to a kubeconfig file (defaults to in-cluster or ~/.kube/config)
    #[arg(short = 'K', long)]
    pub kubeconfig: Option<PathBuf>,

    /// SQLite database holding the version ledger
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Port for /healthz, /readyz and /metrics
    #[arg(long)]
    pub health_port: Option<u16>,

    /// Cluster name attached to structured log events
    #[arg(long)]
    pub cluster_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default = "default_ledger")]
    pub ledger: PathBuf,

    #[serde(default = "default_health_port")]
    pub health_port: u16,

    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    #[serde(default = "default_log_chunk_bytes")]
    pub log_chunk_bytes: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    50051
}

fn default_ledger() -> PathBuf {
    PathBuf::from(DEFAULT_LEDGER_PATH)
}

fn default_health_port() -> u16 {
    8080
}

fn default_cluster_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_log_chunk_bytes() -> usize {
    DEFAULT_LOG_CHUNK_BYTES
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("KMCTL_AGENT").try_parsing(true))
            .build()
            .context("failed to read KMCTL_AGENT_* environment")?;

        Self::from_source(source)
    }

    pub fn from_source(source: config::Config) -> Result<Self> {
        source
            .try_deserialize()
            .context("invalid agent configuration")
    }

    /// Flags given on the command line win over the environment
    pub fn apply_overrides(&mut self, args: &ServeArgs) {
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(kubeconfig) = &args.kubeconfig {
            self.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(ledger) = &args.ledger {
            self.ledger = ledger.clone();
        }
        if let Some(health_port) = args.health_port {
            self.health_port = health_port;
        }
        if let Some(name) = &args.cluster_name {
            self.cluster_name = name.clone();
        }
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_source() {
        let source = config::Config::builder().build().unwrap();
        let config = AgentConfig::from_source(source).unwrap();

        assert_eq!(config.grpc_addr(), "localhost:50051");
        assert_eq!(config.ledger, PathBuf::from("/database/database.db"));
        assert_eq!(config.health_port, 8080);
        assert_eq!(config.kubeconfig, None);
        assert_eq!(config.log_chunk_bytes, 1024 * 1024);
    }

    #[test]
    fn test_source_values_are_used() {
        let source = config::Config::builder()
            .set_override("port", 6000)
            .unwrap()
            .set_override("ledger", "/tmp/ledger.db")
            .unwrap()
            .build()
            .unwrap();
        let config = AgentConfig::from_source(source).unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.ledger, PathBuf::from("/tmp/ledger.db"));
    }

    #[test]
    fn test_flags_override_source() {
        let source = config::Config::builder()
            .set_override("host", "10.0.0.1")
            .unwrap()
            .set_override("port", 6000)
            .unwrap()
            .build()
            .unwrap();
        let mut config = AgentConfig::from_source(source).unwrap();

        config.apply_overrides(&ServeArgs {
            port: Some(7000),
            kubeconfig: Some(PathBuf::from("/etc/k3s.yaml")),
            ..Default::default()
        });

        assert_eq!(config.grpc_addr(), "10.0.0.1:7000");
        assert_eq!(config.kubeconfig, Some(PathBuf::from("/etc/k3s.yaml")));
    }

    #[test]
    fn test_invalid_source_is_an_error() {
        let source = config::Config::builder()
            .set_override("port", "not-a-port")
            .unwrap()
            .build()
            .unwrap();

        assert!(AgentConfig::from_source(source).is_err());
    }
}
