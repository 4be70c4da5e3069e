//! kmctl agent
//!
//! Runs next to one Kubernetes cluster and serves the kmctl gRPC protocol:
//! node and pod reads, streamed pod logs, manifest apply/delete and
//! recorded component upgrades.

use agent_lib::{
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    proto::{AgentServiceServer, MAX_MESSAGE_BYTES},
    ClusterAgent, ComponentHealth, KubeBackend, SqliteLedger,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

use config::{AgentConfig, ServeArgs};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "kmctl-agent", version, about = "Per-cluster agent for kmctl")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the agent gRPC API for the local cluster
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filtered by RUST_LOG
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = AgentConfig::load()?;
    config.apply_overrides(&args);
    info!(cluster = %config.cluster_name, addr = %config.grpc_addr(), "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::KUBE_BACKEND).await;
    health_registry.register(components::LEDGER).await;
    health_registry.register(components::GRPC_SERVER).await;

    let backend = KubeBackend::connect(config.kubeconfig.as_deref())
        .await
        .context("failed to create Kubernetes client")?;
    match backend.server_version().await {
        Ok(version) => info!(server_version = %version, "Kubernetes API server reachable"),
        Err(e) => {
            warn!(error = %e, "Kubernetes API server not reachable yet");
            health_registry
                .update(components::KUBE_BACKEND, ComponentHealth::degraded(e.to_string()))
                .await;
        }
    }

    let ledger = SqliteLedger::open(&config.ledger).with_context(|| {
        format!("failed to open version ledger {}", config.ledger.display())
    })?;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.cluster_name);

    let agent = ClusterAgent::new(Arc::new(backend), Arc::new(ledger))
        .with_health(health_registry.clone())
        .with_logger(logger.clone())
        .with_log_chunk_bytes(config.log_chunk_bytes);

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(config.health_port, app_state));

    let listener = TcpListener::bind(config.grpc_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.grpc_addr()))?;
    let local_addr = listener.local_addr()?;

    logger.log_startup(
        AGENT_VERSION,
        &local_addr.to_string(),
        &config.ledger.display().to_string(),
    );
    health_registry.set_serving(true).await;

    let service = AgentServiceServer::new(agent)
        .max_decoding_message_size(MAX_MESSAGE_BYTES)
        .max_encoding_message_size(MAX_MESSAGE_BYTES);

    let result = Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal())
        .await;

    health_registry.set_serving(false).await;
    api_handle.abort();

    if let Err(e) = result {
        health_registry
            .set_unhealthy(components::GRPC_SERVER, e.to_string())
            .await;
        return Err(e).context("gRPC server failed");
    }

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server runs until killed
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
