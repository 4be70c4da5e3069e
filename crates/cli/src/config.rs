//! Cluster inventory for the CLI

use agent_lib::ClusterEndpoint;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The clusters every command is sent to
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Inventory {
    #[serde(default)]
    pub server: Vec<ClusterEndpoint>,
}

impl Inventory {
    /// Load the inventory from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let source = config::Config::builder()
            .add_source(config::File::from(path.as_path()).format(config::FileFormat::Yaml))
            .build()
            .with_context(|| format!("failed to read cluster inventory {}", path.display()))?;

        let inventory: Inventory = source
            .try_deserialize()
            .with_context(|| format!("invalid cluster inventory {}", path.display()))?;

        if inventory.server.is_empty() {
            bail!("no clusters listed under `server` in {}", path.display());
        }

        Ok(inventory)
    }

    /// `$HOME/.config/kmctl/config.yaml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("kmctl").join("config.yaml"))
    }
}
