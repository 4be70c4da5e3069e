//! Integration tests for the upgrade flow: validate, apply, then record

mod common;

use agent_lib::manifest::{Action, ManifestKind};
use agent_lib::{
    ClusterAgent, ComponentType, SqliteLedger, UpgradeError, ValidationError, Version,
};
use common::{BrokenLedger, FakeBackend, CONFIG_MAP, DEPLOYMENT};
use std::sync::Arc;

fn agent() -> (
    Arc<FakeBackend>,
    Arc<SqliteLedger>,
    ClusterAgent<FakeBackend, SqliteLedger>,
) {
    let backend = Arc::new(FakeBackend::new());
    let ledger = Arc::new(SqliteLedger::open_in_memory().unwrap());
    let agent = ClusterAgent::new(Arc::clone(&backend), Arc::clone(&ledger));
    (backend, ledger, agent)
}

#[tokio::test]
async fn test_upgrade_records_one_row() {
    let (_backend, ledger, agent) = agent();

    let upgraded = agent.upgrade(DEPLOYMENT, "1.2.3", 0).await.unwrap();

    assert_eq!(upgraded.reconciled.action, Action::Created);
    assert_eq!(upgraded.record.version, Version::new(1, 2, 3));
    assert_eq!(upgraded.record.component_type, ComponentType::MicomManager);

    let records = ledger.records(ComponentType::MicomManager).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, upgraded.record_id);
    assert_eq!(records[0].record.version, Version::new(1, 2, 3));

    for other in [
        ComponentType::DeviceBringup,
        ComponentType::Navigation,
        ComponentType::Middleware,
    ] {
        assert!(ledger.records(other).unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_each_upgrade_appends() {
    let (_backend, ledger, agent) = agent();

    agent.upgrade(DEPLOYMENT, "1.0.0", 3).await.unwrap();
    let second = agent.upgrade(DEPLOYMENT, "1.0.1", 3).await.unwrap();

    assert_eq!(second.reconciled.action, Action::Updated);
    assert_eq!(ledger.records(ComponentType::Middleware).unwrap().len(), 2);
    assert_eq!(
        ledger.current_version(ComponentType::Middleware).unwrap(),
        Some(Version::new(1, 0, 1))
    );
}

#[tokio::test]
async fn test_malformed_version_fails_before_backend() {
    let (backend, ledger, agent) = agent();

    let err = agent.upgrade(DEPLOYMENT, "1.2", 0).await.unwrap_err();

    assert!(matches!(
        err,
        UpgradeError::Validation(ValidationError::MalformedVersion(v)) if v == "1.2"
    ));
    assert_eq!(backend.calls.total(), 0);
    assert!(ledger.records(ComponentType::MicomManager).unwrap().is_empty());
}

#[tokio::test]
async fn test_component_type_is_checked_first() {
    let (backend, _ledger, agent) = agent();

    let err = agent.upgrade(CONFIG_MAP, "not-a-version", 9).await.unwrap_err();

    assert!(matches!(
        err,
        UpgradeError::Validation(ValidationError::ComponentType(9))
    ));
    assert_eq!(backend.calls.total(), 0);
}

#[tokio::test]
async fn test_failed_apply_writes_no_record() {
    let (backend, ledger, agent) = agent();
    backend.fail_writes();

    let err = agent.upgrade(DEPLOYMENT, "2.0.0", 1).await.unwrap_err();

    assert!(matches!(err, UpgradeError::Reconcile(_)));
    assert!(ledger.records(ComponentType::DeviceBringup).unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_manifest_writes_no_record() {
    let (backend, ledger, agent) = agent();

    let err = agent.upgrade(CONFIG_MAP, "2.0.0", 2).await.unwrap_err();

    assert!(matches!(err, UpgradeError::Reconcile(e) if e.is_classification()));
    assert_eq!(backend.calls.total(), 0);
    assert!(ledger.records(ComponentType::Navigation).unwrap().is_empty());
}

#[tokio::test]
async fn test_ledger_failure_after_apply_is_reported() {
    let backend = Arc::new(FakeBackend::new());
    let agent = ClusterAgent::new(Arc::clone(&backend), Arc::new(BrokenLedger));

    let err = agent.upgrade(DEPLOYMENT, "3.1.4", 2).await.unwrap_err();

    assert!(matches!(err, UpgradeError::Ledger(_)));
    assert!(err.to_string().contains("manifest applied"));
    assert!(backend
        .stored(ManifestKind::Deployment, "default", "web")
        .is_some());
}
