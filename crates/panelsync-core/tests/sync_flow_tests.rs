//! End-to-end sync flow: draft → deploy → sync → edge → live

use panelsync_artifact::ControllerId;
use panelsync_core::{
    ChannelConnectionManager, ConfigService, EdgeRuntime, InboundMessage, MemoryEdgeHost,
    ServiceConfig, ServiceError, StaticInventory, SyncError, SyncStatus,
};
use panelsync_validator::Inventory;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const MAIN_PAGE: &str = r#"{
  "name": "Main",
  "elements": [
    {"type": "slider", "id": "vol", "label": "Volume",
     "position": {"x": 10, "y": 10, "width": 300, "height": 60},
     "device": "amp", "control": "volume", "min": 0, "max": 100}
  ]
}"#;

fn ctrl() -> ControllerId {
    ControllerId::new("room-7").unwrap()
}

struct Harness {
    service: ConfigService,
    connections: Arc<ChannelConnectionManager>,
}

fn harness(config: ServiceConfig) -> Harness {
    let connections = Arc::new(ChannelConnectionManager::new());
    let inventory = StaticInventory::new().with(
        ctrl(),
        Inventory::new()
            .with_device("amp", ["volume", "mute"])
            .with_scene("movie"),
    );
    let service = ConfigService::new(config, connections.clone(), Arc::new(inventory));
    Harness {
        service,
        connections,
    }
}

/// Wire an in-memory edge node to the service
fn attach_edge(h: &Harness) -> Arc<MemoryEdgeHost> {
    let host = Arc::new(MemoryEdgeHost::new());
    let outbound = h.connections.connect(ctrl());
    let (report_tx, report_rx) = mpsc::channel(64);
    EdgeRuntime::new(Arc::clone(&host)).spawn(outbound, report_tx);
    h.service.orchestrator().spawn_inbound_loop(report_rx);
    host
}

#[tokio::test]
async fn scenario_deploy_then_sync_to_live() {
    let h = harness(ServiceConfig::default());
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    let deployed = h.service.deploy(&ctrl(), "user:ana", "first layout").unwrap();
    assert_eq!(deployed.version, 1);

    let status = h.service.get_status(&ctrl());
    assert_eq!(status.deployed_version, Some(1));
    assert_eq!(status.live_version, None);
    assert!(status.needs_sync);

    // Offline: refused immediately, nothing recorded
    let err = h.service.sync(&ctrl(), None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Sync(SyncError::NotConnected(_))));
    assert!(h.service.sync_history(&ctrl()).is_empty());
    assert!(h.service.get_status(&ctrl()).needs_sync);

    let host = attach_edge(&h);
    let handle = h.service.sync(&ctrl(), None).await.unwrap();
    let op = handle.wait().await.unwrap();
    assert_eq!(op.status, SyncStatus::Completed);
    assert_eq!(op.last_step.as_deref(), Some("applying"));

    let status = h.service.get_status(&ctrl());
    assert_eq!(status.live_version, Some(1));
    assert!(!status.needs_sync);
    assert_eq!(host.applied_version(), Some(1));
    assert_eq!(
        host.applied_files(),
        Some(h.service.snapshots().get(&ctrl(), 1).unwrap().files.clone())
    );
}

#[tokio::test]
async fn sync_complete_report_advances_live_pointer() {
    let h = harness(ServiceConfig::default());
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v1").unwrap();
    let mut link = h.connections.connect(ctrl());

    let handle = h.service.sync(&ctrl(), Some(1)).await.unwrap();
    let sent = link.recv().await.unwrap();
    assert_eq!(sent.sync_id(), handle.sync_id());

    h.service
        .orchestrator()
        .handle_inbound_json(&format!(
            r#"{{"type":"sync_complete","sync_id":"{}","applied_version":1}}"#,
            handle.sync_id()
        ));
    let status = h.service.get_status(&ctrl());
    assert_eq!(status.live_version, Some(1));
    assert!(!status.needs_sync);
}

#[tokio::test]
async fn second_sync_while_active_is_refused() {
    let h = harness(ServiceConfig::default());
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v1").unwrap();
    let _link = h.connections.connect(ctrl());

    let first = h.service.sync(&ctrl(), None).await.unwrap();
    let err = h.service.sync(&ctrl(), None).await.unwrap_err();
    match err {
        ServiceError::Sync(SyncError::SyncInProgress { sync_id, .. }) => {
            assert_eq!(sync_id, first.sync_id());
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(h.service.sync_history(&ctrl()).len(), 1);

    // Terminal state frees the slot; a retry against the same version works
    h.service.orchestrator().handle_inbound(InboundMessage::SyncError {
        sync_id: first.sync_id(),
        error_message: "edge busy".into(),
    });
    let retry = h.service.sync(&ctrl(), Some(1)).await.unwrap();
    assert_ne!(retry.sync_id(), first.sync_id());
    assert_eq!(h.service.sync_history(&ctrl()).len(), 2);
    assert_eq!(h.service.sync_history(&ctrl())[0].sync_id, retry.sync_id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_syncs_admit_exactly_one() {
    let h = Arc::new(harness(ServiceConfig::default()));
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v1").unwrap();
    let _link = h.connections.connect(ctrl());

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.service.sync(&ctrl(), None).await.map(|s| s.sync_id()) })
        })
        .collect();

    let mut admitted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(ServiceError::Sync(SyncError::SyncInProgress { .. })) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(h.service.sync_history(&ctrl()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_edge_times_out() {
    let h = harness(ServiceConfig::default().with_sync_timeout_secs(30));
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v1").unwrap();
    let _link = h.connections.connect(ctrl());
    let orchestrator = Arc::clone(h.service.orchestrator());

    let handle = h.service.sync(&ctrl(), None).await.unwrap();
    let sync_id = handle.sync_id();

    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(orchestrator.sweep_expired(Instant::now()).is_empty());

    // Progress pushes the deadline out
    orchestrator.handle_inbound(InboundMessage::SyncProgress {
        sync_id,
        step: "applying".into(),
    });
    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(orchestrator.sweep_expired(Instant::now()).is_empty());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(orchestrator.sweep_expired(Instant::now()), vec![sync_id]);

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, SyncError::SyncTimeout { timeout_secs: 30, .. }));

    let op = h.service.get_operation(sync_id).unwrap();
    assert_eq!(op.status, SyncStatus::Failed);
    assert!(op.error_detail.unwrap().contains("30s"));
    // Only the operation record changed
    let status = h.service.get_status(&ctrl());
    assert_eq!(status.live_version, None);
    assert!(status.needs_sync);
    assert!(orchestrator.active(&ctrl()).is_none());
}

#[tokio::test(start_paused = true)]
async fn background_sweeper_fails_stuck_sync() {
    let h = harness(
        ServiceConfig::default()
            .with_sync_timeout_secs(5)
            .with_sweep_interval_ms(500),
    );
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v1").unwrap();
    let _link = h.connections.connect(ctrl());
    let _sweeper = h.service.spawn_background();

    let handle = h.service.sync(&ctrl(), None).await.unwrap();
    let err = handle.wait().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, SyncError::SyncTimeout { .. }));
}

#[tokio::test]
async fn unknown_sync_ids_are_ignored() {
    let h = harness(ServiceConfig::default());
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v1").unwrap();
    let before = h.service.get_status(&ctrl());

    h.service.orchestrator().handle_inbound(InboundMessage::SyncComplete {
        sync_id: panelsync_core::SyncId::new(),
        applied_version: Some(1),
        driver_path: None,
    });
    h.service.orchestrator().handle_inbound_json("{\"type\":\"bogus\"}");

    assert_eq!(h.service.get_status(&ctrl()), before);
}

#[tokio::test]
async fn edge_apply_failure_leaves_live_untouched() {
    let h = harness(ServiceConfig::default());
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v1").unwrap();
    let host = attach_edge(&h);
    host.fail_next_apply("flash write failed");

    let err = h.service.sync(&ctrl(), None).await.unwrap().wait().await.unwrap_err();
    match err {
        SyncError::SyncRejected { detail, .. } => assert_eq!(detail, "flash write failed"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(h.service.get_status(&ctrl()).live_version, None);

    // Same target, explicit retry
    let op = h.service.sync(&ctrl(), Some(1)).await.unwrap().wait().await.unwrap();
    assert_eq!(op.status, SyncStatus::Completed);
    assert_eq!(h.service.get_status(&ctrl()).live_version, Some(1));
}

#[tokio::test]
async fn rollback_then_deploy_reproduces_old_snapshot() {
    let h = harness(ServiceConfig::default());
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", MAIN_PAGE, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v1").unwrap();

    let mute_page = MAIN_PAGE.replace("\"volume\"", "\"mute\"");
    h.service
        .write_file(&ctrl(), "gui/pages/main.json", &mute_page, "user:ana")
        .unwrap();
    h.service
        .write_file(&ctrl(), "gui/pages/extra.json", r#"{"name":"Extra","elements":[]}"#, "user:ana")
        .unwrap();
    h.service.deploy(&ctrl(), "user:ana", "v2").unwrap();

    h.service.rollback(&ctrl(), 1).unwrap();
    let v3 = h.service.deploy(&ctrl(), "user:ana", "back to v1").unwrap();
    assert_eq!(v3.version, 3);

    let v1 = h.service.snapshots().get(&ctrl(), 1).unwrap();
    let v3 = h.service.snapshots().get(&ctrl(), 3).unwrap();
    assert_eq!(v1.files, v3.files);
    assert_eq!(v1.checksum, v3.checksum);

    let versions: Vec<u64> = h.service.list_versions(&ctrl()).iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![3, 2, 1]);
}

#[tokio::test]
async fn missing_scene_blocks_write() {
    let h = harness(ServiceConfig::default());
    let page = r#"{"name": "Main", "elements": [{"type": "button", "label": "Demo",
        "position": {"x": 0, "y": 0, "width": 120, "height": 60},
        "action": {"type": "scene", "scene": "scene_demo"}}]}"#;
    let err = h
        .service
        .write_file(&ctrl(), "gui/pages/main.json", page, "user:ana")
        .unwrap_err();
    let ServiceError::Validation(report) = err else {
        panic!("expected validation failure");
    };
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.message.contains("scene_demo")));
    assert!(h.service.list_files(&ctrl()).is_empty());
}
