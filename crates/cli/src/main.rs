//! kmctl
//!
//! Sends one command to every Kubernetes cluster listed in the inventory and
//! prints each cluster's result as it arrives. A cluster that fails is
//! reported in its own block; it never changes the exit code.

mod commands;
mod config;
mod output;

use agent_lib::models::DEFAULT_NAMESPACE;
use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{get, logs, manifest, Context};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Multi-cluster Kubernetes CLI
#[derive(Parser)]
#[command(name = "kmctl")]
#[command(author, version, about = "Run one command against every configured Kubernetes cluster", long_about = None)]
pub struct Cli {
    /// Cluster inventory file (defaults to ~/.config/kmctl/config.yaml)
    #[arg(long, env = "KMCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Give up on a cluster after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show nodes or pods
    #[command(subcommand)]
    Get(GetCommands),

    /// Show the last lines of a pod's log
    Logs {
        /// Pod name
        #[arg(short = 'n', long)]
        name: String,

        /// Namespace of the pod
        #[arg(short = 's', long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Number of lines to show (0 for all)
        #[arg(short = 'l', long, default_value_t = 30)]
        lines: usize,
    },

    /// Create or update the object described by a manifest
    Apply {
        /// Manifest file (Deployment, Service or Pod)
        #[arg(short = 'f', long)]
        file: PathBuf,
    },

    /// Delete the object described by a manifest
    Delete {
        /// Manifest file (Deployment, Service or Pod)
        #[arg(short = 'f', long)]
        file: PathBuf,
    },

    /// Apply a component manifest and record its version
    Upgrade {
        /// Component: 0 Micom Manager, 1 Device Bringup, 2 Navigation, 3 Middleware
        #[arg(short = 't', long = "type")]
        component_type: i32,

        /// Version as <major>.<minor>.<patch> (defaults to today's YY.M.D)
        #[arg(short = 'v', long = "version")]
        version: Option<String>,

        /// Manifest file
        #[arg(short = 'f', long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Show one node
    Node {
        /// Node name
        #[arg(short = 'n', long)]
        name: String,
    },

    /// List nodes
    Nodes,

    /// Show one pod
    Pod {
        /// Pod name
        #[arg(short = 'n', long)]
        name: String,

        /// Namespace of the pod
        #[arg(short = 's', long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },

    /// List pods in a namespace
    Pods {
        /// Namespace to list
        #[arg(short = 's', long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Upgrade arguments are checked before the inventory is even read.
    let plan = match &cli.command {
        Commands::Upgrade {
            component_type,
            version,
            ..
        } => Some(manifest::UpgradePlan::new(*component_type, version.as_deref())?),
        _ => None,
    };

    let inventory = config::Inventory::load(cli.config.as_deref())?;
    debug!(clusters = inventory.server.len(), "Loaded cluster inventory");

    let ctx = Context::new(
        inventory.server,
        cli.timeout.map(Duration::from_secs),
        cli.format,
    );

    match cli.command {
        Commands::Get(get_cmd) => match get_cmd {
            GetCommands::Node { name } => get::node(&ctx, &name).await,
            GetCommands::Nodes => get::nodes(&ctx).await,
            GetCommands::Pod { name, namespace } => get::pod(&ctx, &namespace, &name).await,
            GetCommands::Pods { namespace } => get::pods(&ctx, &namespace).await,
        },
        Commands::Logs {
            name,
            namespace,
            lines,
        } => logs::logs(&ctx, &namespace, &name, lines).await,
        Commands::Apply { file } => manifest::apply(&ctx, &file).await?,
        Commands::Delete { file } => manifest::delete(&ctx, &file).await?,
        Commands::Upgrade { file, .. } => {
            if let Some(plan) = plan {
                manifest::upgrade(&ctx, &file, plan).await?;
            }
        }
    }

    Ok(())
}
