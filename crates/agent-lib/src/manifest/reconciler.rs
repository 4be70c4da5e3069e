use super::{decode, ManifestError, ManifestKind};
use crate::backend::ResourceBackend;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// What a reconciliation did to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
        }
    }
}

/// Result of applying or deleting one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub kind: ManifestKind,
    pub name: String,
    pub namespace: String,
    pub action: Action,
}

impl Reconciled {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reconciled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Action::Deleted => write!(f, "deleted {} {}", self.kind, self.name),
            action => write!(f, "applied ({}) {} {}", action.as_str(), self.kind, self.name),
        }
    }
}

/// Drives the cluster toward a manifest using get-then-branch.
///
/// A lookup that fails with anything but not-found aborts without writing.
/// A conflict from the write (someone created or changed the object in
/// between) is reported, not retried.
pub struct ManifestReconciler<B> {
    backend: Arc<B>,
}

impl<B: ResourceBackend> ManifestReconciler<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn apply(&self, text: &str) -> Result<Reconciled, ManifestError> {
        let mut desired = decode(text)?;
        let kind = desired.kind();
        let name = desired.name().to_string();
        let namespace = desired.namespace().to_string();

        let action = match self.backend.get_object(kind, &namespace, &name).await {
            Ok(live) => {
                desired.adopt_resource_version(&live);
                self.backend.replace_object(&desired).await?;
                Action::Updated
            }
            Err(err) if err.is_not_found() => {
                debug!(%kind, %name, %namespace, "Object does not exist yet, creating");
                self.backend.create_object(&desired).await?;
                Action::Created
            }
            Err(err) => return Err(err.into()),
        };

        info!(%kind, %name, %namespace, action = action.as_str(), "Manifest applied");

        Ok(Reconciled {
            kind,
            name,
            namespace,
            action,
        })
    }

    /// Delete the object a manifest names. Missing objects are an error.
    pub async fn delete(&self, text: &str) -> Result<Reconciled, ManifestError> {
        let object = decode(text)?;
        let kind = object.kind();
        let name = object.name().to_string();
        let namespace = object.namespace().to_string();

        self.backend.delete_object(kind, &namespace, &name).await?;
        info!(%kind, %name, %namespace, "Manifest deleted");

        Ok(Reconciled {
            kind,
            name,
            namespace,
            action: Action::Deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciled_messages() {
        let mut reconciled = Reconciled {
            kind: ManifestKind::Deployment,
            name: "web".to_string(),
            namespace: "default".to_string(),
            action: Action::Created,
        };
        assert_eq!(reconciled.to_string(), "applied (created) Deployment web");

        reconciled.action = Action::Updated;
        assert_eq!(reconciled.to_string(), "applied (updated) Deployment web");

        reconciled.action = Action::Deleted;
        assert_eq!(reconciled.to_string(), "deleted Deployment web");
    }
}
