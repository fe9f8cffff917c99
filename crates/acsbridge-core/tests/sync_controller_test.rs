#![allow(clippy::unwrap_used)]
// Integration tests for the sync controller and the config service,
// driven against an in-memory ACS with paused time.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use acsbridge_core::{
    ConfigNode, ConfigService, CoreError, DeviceId, DeviceIdentity, DeviceSnapshot, FaultKind,
    KeyState, Leaf, LogicalKey, LogicalValues, Operation, PathCatalog, RetryPolicy, Scalar,
    SnapshotProvider, SyncConfig, SyncEvent, SyncState, TaskDispatcher, TaskHandle, TaskPoll,
};

const DEVICE: &str = "00259E-EG8145V5-000001";
const SSID_5G: &str = "Device.WiFi.SSID.2.SSID";
const CHANNEL_24: &str = "Device.WiFi.Radio.1.Channel";

// ── Fake ACS ────────────────────────────────────────────────────────

/// Scripted outcome of one dispatch call.
#[derive(Debug, Clone)]
enum Reply {
    Ok,
    Transport,
    /// Connection request to the device failed.
    Unreachable,
    /// Never answers; only the dispatch timeout ends it.
    Hang,
    Fault(&'static str),
}

struct FakeAcs {
    tree: Mutex<ConfigNode>,
    replies: Mutex<VecDeque<Reply>>,
    /// Whether accepted writes show up in later fetches.
    apply: AtomicBool,
    /// Paths the device silently keeps at their old value.
    ignored: Mutex<HashSet<String>>,
    poll: Mutex<TaskPoll>,
    discarded: Mutex<Vec<String>>,
    dispatches: AtomicU32,
    fetches: AtomicU32,
}

impl FakeAcs {
    fn new() -> Arc<Self> {
        let tree = ConfigNode::container()
            .with("Device.DeviceInfo.Manufacturer", Leaf::new("Huawei", "xsd:string").read_only())
            .with("Device.WiFi.SSID.1.SSID", Leaf::new("Home", "xsd:string"))
            .with(SSID_5G, Leaf::new("Home-5G", "xsd:string"))
            .with(CHANNEL_24, Leaf::new(6_u64, "xsd:unsignedInt"))
            .with(
                "Device.WiFi.AccessPoint.1.SSIDAdvertisementEnabled",
                Leaf::new(true, "xsd:boolean"),
            );
        Arc::new(Self {
            tree: Mutex::new(tree),
            replies: Mutex::new(VecDeque::new()),
            apply: AtomicBool::new(true),
            ignored: Mutex::new(HashSet::new()),
            poll: Mutex::new(TaskPoll::Succeeded),
            discarded: Mutex::new(Vec::new()),
            dispatches: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
        })
    }

    fn script(&self, replies: &[Reply]) {
        self.replies.lock().unwrap().extend(replies.iter().cloned());
    }

    fn ignore_writes(&self) {
        self.apply.store(false, Ordering::SeqCst);
    }

    fn ignore_path(&self, path: &str) {
        self.ignored.lock().unwrap().insert(path.to_owned());
    }

    fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }

    fn set_poll(&self, poll: TaskPoll) {
        *self.poll.lock().unwrap() = poll;
    }

    fn dispatches(&self) -> u32 {
        self.dispatches.load(Ordering::SeqCst)
    }
}

impl SnapshotProvider for FakeAcs {
    async fn fetch_snapshot(&self, device_id: &DeviceId) -> Result<DeviceSnapshot, CoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let root = self.tree.lock().unwrap().clone();
        Ok(DeviceSnapshot::new(device_id.clone(), root, DeviceIdentity::default()))
    }
}

impl TaskDispatcher for FakeAcs {
    async fn dispatch(
        &self,
        device_id: &DeviceId,
        operation: &Operation,
        _wake_now: bool,
    ) -> Result<TaskHandle, CoreError> {
        let n = self.dispatches.fetch_add(1, Ordering::SeqCst) + 1;
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        match reply {
            Reply::Transport => {
                return Err(CoreError::Transport {
                    message: "connection reset".into(),
                })
            }
            Reply::Unreachable => {
                return Err(CoreError::DeviceUnreachable {
                    device_id: device_id.to_string(),
                    reason: "connection request failed".into(),
                })
            }
            Reply::Hang => std::future::pending::<()>().await,
            Reply::Fault(code) => {
                return Err(CoreError::ProtocolFault {
                    code: code.into(),
                    message: "Invalid parameter value".into(),
                })
            }
            Reply::Ok => {}
        }

        if self.apply.load(Ordering::SeqCst) {
            let Operation::SetParameters { values } = operation;
            let ignored = self.ignored.lock().unwrap();
            let mut tree = self.tree.lock().unwrap();
            for (path, value, wire_type) in values.iter().filter(|(p, ..)| !ignored.contains(p)) {
                tree.insert(path, Leaf::new(value.as_str(), wire_type.as_str()));
            }
        }

        Ok(TaskHandle {
            id: format!("task-{n}"),
            device_id: device_id.clone(),
            queued: false,
        })
    }

    async fn poll_task(&self, _handle: &TaskHandle) -> Result<TaskPoll, CoreError> {
        Ok(self.poll.lock().unwrap().clone())
    }

    async fn discard_task(&self, handle: &TaskHandle) -> Result<(), CoreError> {
        self.discarded.lock().unwrap().push(handle.id.clone());
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn service(acs: &Arc<FakeAcs>) -> ConfigService<FakeAcs, FakeAcs> {
    ConfigService::new(
        Arc::clone(acs),
        Arc::clone(acs),
        PathCatalog::builtin(),
        SyncConfig::default(),
    )
}

fn edit(pairs: &[(&str, Scalar)]) -> LogicalValues {
    pairs
        .iter()
        .map(|(k, v)| (LogicalKey::from(*k), v.clone()))
        .collect()
}

fn device() -> DeviceId {
    DeviceId::from(DEVICE)
}

// ── Happy path and retry ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn applied_change_is_confirmed() {
    let acs = FakeAcs::new();
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    assert_eq!(preview.entries().len(), 1);
    assert_eq!(preview.entries()[0].path, SSID_5G);

    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Confirmed);
    assert_eq!(status.attempts_made, 1);
    assert_eq!(status.task_id.as_deref(), Some("task-1"));
    assert_eq!(status.key("wifi_5_ssid").unwrap().state, KeyState::Applied);
    assert_eq!(status.last_error, None);

    let values = svc.get_logical_values(&device()).await.unwrap();
    assert_eq!(values.get("wifi_5_ssid"), Some(&Scalar::from("Office")));
}

#[tokio::test(start_paused = true)]
async fn transport_failures_are_retried_with_backoff() {
    let acs = FakeAcs::new();
    acs.script(&[Reply::Transport, Reply::Transport]);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_24_channel", Scalar::UInt(11))]))
        .await
        .unwrap();
    let started = tokio::time::Instant::now();
    let id = svc.submit_change(&device(), preview, false).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Confirmed);
    assert_eq!(status.attempts_made, 3);
    assert_eq!(acs.dispatches(), 3);
    assert_eq!(status.key("wifi_24_channel").unwrap().state, KeyState::Applied);
    // 2s + 4s of backoff before the first confirmation delay.
    assert!(started.elapsed() >= std::time::Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_abandon_the_attempt() {
    let acs = FakeAcs::new();
    acs.script(&[Reply::Transport, Reply::Transport, Reply::Transport]);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Abandoned);
    assert_eq!(status.attempts_made, RetryPolicy::default().max_attempts);
    assert_eq!(status.last_error.as_ref().unwrap().kind, FaultKind::Transport);
    assert_eq!(status.key("wifi_5_ssid").unwrap().state, KeyState::Unconfirmed);
}

#[tokio::test(start_paused = true)]
async fn hung_dispatch_times_out_as_transport_and_is_retried() {
    let acs = FakeAcs::new();
    acs.script(&[Reply::Hang]);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let started = tokio::time::Instant::now();
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Confirmed);
    assert_eq!(status.attempts_made, 2);
    assert_eq!(acs.dispatches(), 2);
    assert_eq!(status.key("wifi_5_ssid").unwrap().state, KeyState::Applied);
    let fault = status.last_error.as_ref().unwrap();
    assert_eq!(fault.kind, FaultKind::Transport);
    assert!(fault.message.contains("30s"), "{}", fault.message);
    // Dispatch timeout plus the first backoff.
    assert!(started.elapsed() >= SyncConfig::default().dispatch_timeout + Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn unreachable_device_is_retried() {
    let acs = FakeAcs::new();
    acs.script(&[Reply::Unreachable]);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_24_channel", Scalar::UInt(11))]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Confirmed);
    assert_eq!(acs.dispatches(), 2);
    assert_eq!(status.last_error.as_ref().unwrap().kind, FaultKind::DeviceUnreachable);
    assert_eq!(status.key("wifi_24_channel").unwrap().state, KeyState::Applied);
}

// ── Faults and drift ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn protocol_fault_is_not_retried() {
    let acs = FakeAcs::new();
    acs.script(&[Reply::Fault("9007")]);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_24_channel", Scalar::UInt(13))]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(acs.dispatches(), 1);
    assert_eq!(status.state, SyncState::Abandoned);
    let fault = status.last_error.as_ref().unwrap();
    assert_eq!(fault.kind, FaultKind::ProtocolFault);
    assert_eq!(fault.code.as_deref(), Some("9007"));
    assert_eq!(status.key("wifi_24_channel").unwrap().state, KeyState::Rejected);
}

#[tokio::test(start_paused = true)]
async fn task_fault_reported_by_poll_rejects_keys() {
    let acs = FakeAcs::new();
    acs.ignore_writes();
    acs.set_poll(TaskPoll::Failed {
        code: "9001".into(),
        message: "Request denied".into(),
    });
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, false).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Abandoned);
    assert_eq!(status.key("wifi_5_ssid").unwrap().state, KeyState::Rejected);
    assert_eq!(status.last_error.as_ref().unwrap().code.as_deref(), Some("9001"));
}

#[tokio::test(start_paused = true)]
async fn ignored_write_ends_as_drift() {
    let acs = FakeAcs::new();
    acs.ignore_writes();
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Confirmed);
    assert_eq!(
        status.key("wifi_5_ssid").unwrap().state,
        KeyState::DriftDetected {
            observed: Some("Home-5G".into())
        }
    );
    let (applied, drifted, _) = status.tally();
    assert_eq!((applied, drifted), (0, 1));
    // One fetch for the preview, then one per confirmation tick.
    let ticks = SyncConfig::default().confirm_attempts;
    assert_eq!(acs.fetches.load(Ordering::SeqCst), ticks + 1);
}

#[tokio::test(start_paused = true)]
async fn drift_on_one_key_does_not_fail_the_others() {
    let acs = FakeAcs::new();
    acs.ignore_path(CHANNEL_24);
    let svc = service(&acs);

    let preview = svc
        .propose_change(
            &device(),
            &edit(&[("wifi_5_ssid", "Office".into()), ("wifi_24_channel", Scalar::UInt(11))]),
        )
        .await
        .unwrap();
    assert_eq!(preview.entries().len(), 2);
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Confirmed);
    assert_eq!(status.key("wifi_5_ssid").unwrap().state, KeyState::Applied);
    assert_eq!(
        status.key("wifi_24_channel").unwrap().state,
        KeyState::DriftDetected {
            observed: Some("6".into())
        }
    );
    let (applied, drifted, _) = status.tally();
    assert_eq!((applied, drifted), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn task_never_picked_up_leaves_keys_unconfirmed() {
    let acs = FakeAcs::new();
    acs.ignore_writes();
    acs.set_poll(TaskPoll::Pending);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, false).await.unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Confirmed);
    assert_eq!(status.key("wifi_5_ssid").unwrap().state, KeyState::Unconfirmed);
    assert_eq!(status.tally().1, 0);
    assert!(acs.discarded().is_empty());
}

// ── Admission ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn empty_change_set_never_dispatches() {
    let acs = FakeAcs::new();
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Home-5G".into())]))
        .await
        .unwrap();
    assert!(preview.is_empty());

    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.get_sync_status(id).unwrap();
    assert_eq!(status.state, SyncState::Confirmed);
    assert!(status.keys.is_empty());
    assert_eq!(acs.dispatches(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_submission_for_device_is_busy() {
    let acs = FakeAcs::new();
    let svc = service(&acs);

    let first = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let second = svc
        .propose_change(&device(), &edit(&[("wifi_24_channel", Scalar::UInt(1))]))
        .await
        .unwrap();

    let id = svc.submit_change(&device(), first, true).await.unwrap();
    assert_eq!(svc.sync().in_flight(&device()), Some(id));

    let err = svc.submit_change(&device(), second, true).await.unwrap_err();
    match err {
        CoreError::Busy { attempt_id, .. } => assert_eq!(attempt_id, id),
        other => panic!("expected Busy, got {other:?}"),
    }

    svc.wait(id).await.unwrap();
    assert_eq!(svc.sync().in_flight(&device()), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resubmit_right_after_wait_is_accepted() {
    let acs = FakeAcs::new();
    let config = SyncConfig {
        confirm_delay: Duration::ZERO,
        ..SyncConfig::default()
    };
    let svc = ConfigService::new(Arc::clone(&acs), Arc::clone(&acs), PathCatalog::builtin(), config);

    for round in 0..200 {
        let preview = svc
            .propose_change(&device(), &edit(&[("wifi_5_ssid", format!("Office-{round}").into())]))
            .await
            .unwrap();
        let id = svc
            .submit_change(&device(), preview, true)
            .await
            .unwrap_or_else(|e| panic!("round {round}: {e}"));
        let status = svc.wait(id).await.unwrap();
        assert_eq!(status.state, SyncState::Confirmed, "round {round}");
    }
}

#[tokio::test(start_paused = true)]
async fn preview_from_replaced_snapshot_is_stale() {
    let acs = FakeAcs::new();
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    svc.refresh(&device()).await.unwrap();

    let err = svc.submit_change(&device(), preview, true).await.unwrap_err();
    assert!(matches!(err, CoreError::StalePreview { .. }), "got {err:?}");
    assert_eq!(acs.dispatches(), 0);
}

#[tokio::test(start_paused = true)]
async fn preview_for_other_device_is_refused() {
    let acs = FakeAcs::new();
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let err = svc
        .submit_change(&DeviceId::from("other"), preview, true)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DeviceMismatch { .. }), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn unknown_and_unresolved_keys_are_skipped() {
    let acs = FakeAcs::new();
    let svc = service(&acs);

    let preview = svc
        .propose_change(
            &device(),
            &edit(&[
                ("wifi_5_ssid", "Office".into()),
                ("lan_ip", "192.168.10.1".into()),
                ("no_such_key", "x".into()),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(preview.entries().len(), 1);
    assert_eq!(preview.skipped().len(), 2);

    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let status = svc.wait(id).await.unwrap();
    assert_eq!(status.state, SyncState::Confirmed);
    assert!(matches!(
        status.key("lan_ip").unwrap().state,
        KeyState::Skipped { .. }
    ));
    assert!(matches!(
        status.key("no_such_key").unwrap().state,
        KeyState::Skipped { .. }
    ));
}

// ── Cancellation and events ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancelled_attempt_is_abandoned() {
    let acs = FakeAcs::new();
    acs.ignore_writes();
    acs.set_poll(TaskPoll::Pending);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    svc.cancel(id).unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Abandoned);
    assert_eq!(status.key("wifi_5_ssid").unwrap().state, KeyState::Unconfirmed);
    assert!(svc.sync().forget(id));
    assert!(matches!(
        svc.get_sync_status(id),
        Err(CoreError::UnknownAttempt { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_queued_task_withdraws_it() {
    let acs = FakeAcs::new();
    acs.ignore_writes();
    acs.set_poll(TaskPoll::Pending);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, false).await.unwrap();
    let mut rx = svc.sync().subscribe(id).unwrap();
    rx.wait_for(|s| s.state == SyncState::AwaitingConfirmation)
        .await
        .unwrap();

    svc.cancel(id).unwrap();
    let status = svc.wait(id).await.unwrap();

    assert_eq!(status.state, SyncState::Abandoned);
    assert_eq!(status.key("wifi_5_ssid").unwrap().state, KeyState::Unconfirmed);
    assert_eq!(acs.discarded(), vec!["task-1".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn snapshot_watchers_see_the_confirmation_refetch() {
    let acs = FakeAcs::new();
    let svc = service(&acs);
    let mut snapshots = svc.watch_snapshot(&device());
    assert!(snapshots.borrow().is_none());

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let previewed = preview.created_from();
    assert_eq!(
        snapshots.borrow_and_update().as_ref().map(|s| s.version),
        Some(previewed)
    );

    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    svc.wait(id).await.unwrap();

    assert!(snapshots.has_changed().unwrap());
    let latest = snapshots.borrow_and_update().clone().unwrap();
    assert!(latest.version > previewed);
}

#[tokio::test(start_paused = true)]
async fn events_trace_the_state_machine() {
    let acs = FakeAcs::new();
    acs.script(&[Reply::Transport]);
    let svc = service(&acs);
    let mut events = svc.events();

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    svc.wait(id).await.unwrap();

    let mut states = Vec::new();
    let mut applied = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SyncEvent::StateChanged { attempt_id, state, .. } => {
                assert_eq!(attempt_id, id);
                states.push(state);
            }
            SyncEvent::KeyChanged { key, state, .. } => {
                assert_eq!(key.as_str(), "wifi_5_ssid");
                applied |= state == KeyState::Applied;
            }
        }
    }

    assert_eq!(
        states,
        vec![
            SyncState::Submitting,
            SyncState::Failed,
            SyncState::Retrying,
            SyncState::Submitting,
            SyncState::AwaitingConfirmation,
            SyncState::Confirmed,
        ]
    );
    assert!(applied);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_running_attempts() {
    let acs = FakeAcs::new();
    acs.ignore_writes();
    acs.set_poll(TaskPoll::Pending);
    let svc = service(&acs);

    let preview = svc
        .propose_change(&device(), &edit(&[("wifi_5_ssid", "Office".into())]))
        .await
        .unwrap();
    let id = svc.submit_change(&device(), preview, true).await.unwrap();
    let mut rx = svc.sync().subscribe(id).unwrap();
    rx.wait_for(|s| s.state == SyncState::AwaitingConfirmation)
        .await
        .unwrap();
    svc.sync().shutdown().await;

    let status = svc.get_sync_status(id).unwrap();
    assert_eq!(status.state, SyncState::Abandoned);
    // Queued tasks survive shutdown.
    assert!(acs.discarded().is_empty());
}
