//! File-backed store tests

use std::sync::Arc;

use tokio_test::assert_ok;

use homehub::filesys::dir::Dir;
use homehub::models::device::{Device, DeviceStatus, DeviceType};
use homehub::models::identity::{Feature, Identity, Member, PermissionSet};
use homehub::permissions::gate::{GateOutcome, PermissionGate};
use homehub::storage::devices::DeviceRepo;
use homehub::storage::session::save_identity;
use homehub::storage::store::{FileStore, Store};

fn file_store(dir: &std::path::Path) -> Arc<Store> {
    Arc::new(Store::new(Arc::new(FileStore::new(Dir::new(dir)))))
}

#[tokio::test]
async fn test_devices_survive_restart() {
    let tmp = tempfile::tempdir().unwrap();

    let repo = DeviceRepo::new(file_store(tmp.path()));
    assert_ok!(
        repo.register(Device::new("p1", "Kettle", DeviceType::Plug, "Kitchen", 2200.0))
            .await
    );
    assert_ok!(repo.toggle("p1", 1_000).await);

    let reopened = DeviceRepo::new(file_store(tmp.path()));
    let device = reopened.get("p1").await.unwrap().unwrap();
    assert_eq!(device.status, DeviceStatus::On);
    assert!(device.open_interval().is_some());
}

#[tokio::test]
async fn test_corrupt_identity_signs_out() {
    let tmp = tempfile::tempdir().unwrap();
    let store = file_store(tmp.path());
    let member = Identity::Member(Member {
        id: "m1".to_string(),
        name: "Robin".to_string(),
        relation: None,
        permissions: PermissionSet::granting(&[Feature::Energy]),
    });
    assert_ok!(save_identity(&store, &member).await);

    std::fs::write(tmp.path().join("currentMember.json"), "{ not json").unwrap();

    let gate = PermissionGate::new(store);
    let outcome = gate.guard(Feature::Energy).await.unwrap();
    assert!(matches!(outcome, GateOutcome::RedirectToLogin { .. }));
    assert!(!tmp.path().join("currentMember.json").exists());
}
