//! Manifest apply, delete and upgrade

use super::Context;
use crate::output::Render;
use agent_lib::proto::{ManifestResponse, UpgradeManifestResponse};
use agent_lib::{ComponentType, Version};
use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ManifestOutcome {
    pub message: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl From<ManifestResponse> for ManifestOutcome {
    fn from(response: ManifestResponse) -> Self {
        Self {
            message: response.message,
            kind: response.kind,
            name: response.name,
            namespace: response.namespace,
        }
    }
}

impl Render for ManifestOutcome {
    fn render(&self) -> String {
        self.message.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct UpgradeOutcome {
    #[serde(flatten)]
    pub manifest: ManifestOutcome,
    pub version: String,
    pub record_id: i64,
}

impl From<UpgradeManifestResponse> for UpgradeOutcome {
    fn from(response: UpgradeManifestResponse) -> Self {
        Self {
            manifest: ManifestOutcome {
                message: response.message,
                kind: response.kind,
                name: response.name,
                namespace: response.namespace,
            },
            version: response.version,
            record_id: response.record_id,
        }
    }
}

impl Render for UpgradeOutcome {
    fn render(&self) -> String {
        format!(
            "{}\nrecorded version {} (record #{})",
            self.manifest.message, self.version, self.record_id
        )
    }
}

/// Arguments of `upgrade`, checked before any cluster is contacted
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradePlan {
    pub component_type: ComponentType,
    pub version: Version,
}

impl UpgradePlan {
    pub fn new(component_type: i32, version: Option<&str>) -> Result<Self> {
        let component_type = ComponentType::from_index(component_type)?;
        let version = match version {
            Some(text) => text.parse()?,
            None => Version::today(),
        };
        Ok(Self {
            component_type,
            version,
        })
    }
}

/// Read the manifest once; every cluster gets the same text
pub fn read_manifest(path: &Path) -> Result<Arc<str>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    if text.trim().is_empty() {
        bail!("manifest {} is empty", path.display());
    }
    Ok(Arc::from(text))
}

pub async fn apply(ctx: &Context, file: &Path) -> Result<()> {
    let yaml = read_manifest(file)?;
    ctx.run(&format!("Apply {}", file.display()), move |mut client| {
        let yaml = Arc::clone(&yaml);
        async move {
            client
                .apply_manifest(&yaml)
                .await
                .map(ManifestOutcome::from)
        }
    })
    .await;
    Ok(())
}

pub async fn delete(ctx: &Context, file: &Path) -> Result<()> {
    let yaml = read_manifest(file)?;
    ctx.run(&format!("Delete {}", file.display()), move |mut client| {
        let yaml = Arc::clone(&yaml);
        async move {
            client
                .delete_manifest(&yaml)
                .await
                .map(ManifestOutcome::from)
        }
    })
    .await;
    Ok(())
}

pub async fn upgrade(ctx: &Context, file: &Path, plan: UpgradePlan) -> Result<()> {
    let yaml = read_manifest(file)?;
    let title = format!(
        "Upgrade {} to {} from {}",
        plan.component_type.display_name(),
        plan.version,
        file.display()
    );
    let version = plan.version.to_string();
    let component_type = plan.component_type.index();

    ctx.run(&title, move |mut client| {
        let yaml = Arc::clone(&yaml);
        let version = version.clone();
        async move {
            client
                .upgrade_manifest(&yaml, &version, component_type)
                .await
                .map(UpgradeOutcome::from)
        }
    })
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_upgrade_plan_defaults_to_today() {
        let plan = UpgradePlan::new(1, None).unwrap();
        assert_eq!(plan.component_type, ComponentType::DeviceBringup);
        assert_eq!(plan.version, Version::today());
    }

    #[test]
    fn test_upgrade_plan_rejects_bad_arguments() {
        let err = UpgradePlan::new(4, Some("1.2.3")).unwrap_err();
        assert!(err.to_string().contains("invalid upgrade type 4"));

        let err = UpgradePlan::new(0, Some("1.2")).unwrap_err();
        assert!(err.to_string().contains("invalid version \"1.2\""));

        let plan = UpgradePlan::new(3, Some("24.10.17")).unwrap();
        assert_eq!(plan.version, Version::new(24, 10, 17));
    }

    #[test]
    fn test_read_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"kind: Pod\nmetadata:\n  name: toolbox\n").unwrap();
        assert!(read_manifest(file.path()).unwrap().starts_with("kind: Pod"));

        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(read_manifest(empty.path()).is_err());

        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read manifest"));
    }

    #[test]
    fn test_upgrade_outcome_render() {
        let outcome = UpgradeOutcome::from(UpgradeManifestResponse {
            message: "applied (created) Deployment navi".to_string(),
            kind: "Deployment".to_string(),
            name: "navi".to_string(),
            namespace: "default".to_string(),
            action: 1,
            record_id: 7,
            version: "24.10.17".to_string(),
        });

        assert_eq!(
            outcome.render(),
            "applied (created) Deployment navi\nrecorded version 24.10.17 (record #7)"
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "Deployment");
        assert_eq!(json["record_id"], 7);
    }
}
