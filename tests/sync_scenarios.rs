//! End-to-end scenarios driving a full [`SyncEngine`] run against in-memory adapters.

#![cfg(feature = "mock_adapters")]

use chrono::{Duration, Utc};

use taskbridge::config::SyncConfig;
use taskbridge::sync_state::SyncStateStore;
use taskbridge::task::{DocumentLink, UnifiedTask};
use taskbridge::testing::{MockDeviceAdapter, MockHostAdapter};
use taskbridge::{DeviceAdapter, HostAdapter, SyncEngine};

fn engine(device: MockDeviceAdapter, host: MockHostAdapter) -> SyncEngine<MockDeviceAdapter, MockHostAdapter> {
    SyncEngine::new(
        device,
        host,
        SyncStateStore::open_in_memory().unwrap(),
        SyncConfig::default(),
    )
}

#[tokio::test]
async fn create_on_host_propagates_to_device_then_settles() {
    let device = MockDeviceAdapter::new();
    let host = MockHostAdapter::new();
    host.seed(UnifiedTask::new("Buy milk"));

    let engine = engine(device, host);

    let first = engine.run(false).await.unwrap();
    assert_eq!(first.created_on_device, 1);
    assert!(first.errors.is_empty());
    assert_eq!(engine.status().await.unwrap().device_tasks, 1);

    let second = engine.run(false).await.unwrap();
    assert_eq!(second.created_on_device, 0);
    assert_eq!(second.created_on_host, 0);
    assert_eq!(second.updated_on_device, 0);
    assert_eq!(second.updated_on_host, 0);
}

#[tokio::test]
async fn title_bootstrap_pairs_then_propagates_a_later_edit() {
    let device = MockDeviceAdapter::new();
    let host = MockHostAdapter::new();
    let device_id = device.seed(UnifiedTask::new("Call Alice"));
    let host_id = host.seed(UnifiedTask::new("Call Alice"));

    let engine = engine(device, host);

    let first = engine.run(false).await.unwrap();
    assert_eq!(first.created_on_device, 0);
    assert_eq!(first.created_on_host, 0);
    assert_eq!(first.updated_on_device, 0);
    assert_eq!(first.no_change, 1);

    let mut edited = engine
        .host()
        .get_reminder_by_id(&host_id)
        .await
        .unwrap()
        .unwrap();
    edited.set_notes("10am".to_string());
    engine.host().update_reminder(&edited).await.unwrap();

    let second = engine.run(false).await.unwrap();
    assert_eq!(second.updated_on_device, 1);
    assert_eq!(second.conflicts_resolved, 0);

    let device_task = engine
        .device()
        .get_task(&device_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(device_task.notes(), "10am");
}

#[tokio::test]
async fn device_edit_outside_conflict_window_overwrites_host() {
    let device = MockDeviceAdapter::new();
    let host = MockHostAdapter::new();

    let base_time = Utc::now() - Duration::seconds(600);
    let shared = UnifiedTask::new_with_parameters(
        "Original title".into(),
        String::new(),
        "Inbox".into(),
        false,
        None,
        None,
        Some(base_time),
        Some(base_time),
        0,
        None,
        None,
        None,
    );

    let device_id = device.seed(shared.clone());
    let host_id = host.seed(shared);

    let engine = engine(device, host);
    let first = engine.run(false).await.unwrap();
    assert_eq!(first.no_change, 1);

    // Host edits at T; Device edits at T+300s -> Device wins outside the default 60s
    // tie window. Timestamps are set explicitly rather than via `set_title`'s internal
    // `Utc::now()`, since the two edits must be reliably 300s apart regardless of how
    // fast the test itself executes.
    let edit_t = Utc::now();
    let mut host_edit = UnifiedTask::new_with_parameters(
        "Host edit".into(),
        String::new(),
        "Inbox".into(),
        false,
        None,
        None,
        Some(base_time),
        Some(edit_t),
        0,
        None,
        Some(host_id.clone()),
        None,
    );
    host_edit.set_host_id(Some(host_id.clone()));
    engine.host().update_reminder(&host_edit).await.unwrap();

    let mut device_edit = UnifiedTask::new_with_parameters(
        "Device edit".into(),
        String::new(),
        "Inbox".into(),
        false,
        None,
        None,
        Some(base_time),
        Some(edit_t + Duration::seconds(300)),
        0,
        Some(device_id.clone()),
        None,
        None,
    );
    device_edit.set_device_id(Some(device_id.clone()));
    engine.device().update_task(&device_edit).await.unwrap();

    let second = engine.run(false).await.unwrap();
    assert_eq!(second.updated_on_host, 1);
    assert_eq!(second.conflicts_resolved, 1);

    let host_after = engine
        .host()
        .get_reminder_by_id(&host_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(host_after.title(), "Device edit");
}

#[tokio::test]
async fn document_link_survives_a_title_only_conflict_update() {
    let device = MockDeviceAdapter::new();
    let host = MockHostAdapter::new();

    let mut device_task = UnifiedTask::new("Read chapter");
    device_task.set_document_link(Some(DocumentLink {
        app_name: "Notes".into(),
        file_id: "f1".into(),
        file_path: "notes.note".into(),
        page: 3,
        page_id: "p1".into(),
    }));
    let host_task = UnifiedTask::new("Read chapter");

    let device_id = device.seed(device_task.clone());
    let host_id = host.seed(host_task);

    let engine = engine(device, host);
    engine.run(false).await.unwrap();

    let mut host_edit = engine
        .host()
        .get_reminder_by_id(&host_id)
        .await
        .unwrap()
        .unwrap();
    host_edit.set_title("Read chapter twice".to_string());
    engine.host().update_reminder(&host_edit).await.unwrap();

    let result = engine.run(false).await.unwrap();
    assert_eq!(result.updated_on_device, 1);

    let device_after = engine
        .device()
        .get_task(&device_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(device_after.title(), "Read chapter twice");
    assert_eq!(
        device_after.document_link().unwrap().to_base64().unwrap(),
        device_task.document_link().unwrap().to_base64().unwrap()
    );
}

#[tokio::test]
async fn repeating_host_tasks_collapse_to_one_device_create() {
    let device = MockDeviceAdapter::new();
    let host = MockHostAdapter::new();
    host.seed(UnifiedTask::new("Take out trash"));
    let mut second = UnifiedTask::new("Take out trash");
    second.set_due_date(Some(Utc::now() + Duration::days(1)));
    host.seed(second);

    let engine = engine(device, host);
    let result = engine.run(false).await.unwrap();

    assert_eq!(result.deduped, 1);
    assert_eq!(result.created_on_device, 1);
}

#[tokio::test]
async fn old_completed_host_only_task_is_never_created_on_device() {
    let device = MockDeviceAdapter::new();
    let host = MockHostAdapter::new();
    let old_date = Utc::now() - Duration::days(200);
    let old = UnifiedTask::new_with_parameters(
        "Pay rent".into(),
        String::new(),
        "Inbox".into(),
        true,
        Some(old_date),
        None,
        Some(old_date),
        Some(old_date),
        0,
        None,
        None,
        None,
    );
    host.seed(old);

    let engine = engine(device, host);
    let result = engine.run(false).await.unwrap();
    assert_eq!(result.created_on_device, 0);
    assert_eq!(engine.status().await.unwrap().device_tasks, 0);
}

#[tokio::test]
async fn host_only_deletion_of_a_paired_task_removes_it_from_device() {
    let device = MockDeviceAdapter::new();
    let host = MockHostAdapter::new();
    let device_id = device.seed(UnifiedTask::new("Water plants"));
    let host_id = host.seed(UnifiedTask::new("Water plants"));

    let engine = engine(device, host);
    // Bootstrap the pairing first so a sync record exists for the pair.
    engine.run(false).await.unwrap();
    assert_eq!(engine.status().await.unwrap().device_tasks, 1);

    engine.host().delete_reminder(&host_id).await.unwrap();

    let result = engine.run(false).await.unwrap();
    assert_eq!(result.deleted_on_device, 1);
    assert!(engine.device().get_task(&device_id).await.unwrap().is_none());
}

#[tokio::test]
async fn device_only_deletion_of_a_paired_task_removes_it_from_host() {
    let device = MockDeviceAdapter::new();
    let host = MockHostAdapter::new();
    let device_id = device.seed(UnifiedTask::new("Water plants"));
    let host_id = host.seed(UnifiedTask::new("Water plants"));

    let engine = engine(device, host);
    engine.run(false).await.unwrap();
    assert_eq!(engine.status().await.unwrap().host_reminders, 1);

    engine.device().delete_task(&device_id, true).await.unwrap();

    let result = engine.run(false).await.unwrap();
    assert_eq!(result.deleted_on_host, 1);
    assert!(engine.host().get_reminder_by_id(&host_id).await.unwrap().is_none());
}
