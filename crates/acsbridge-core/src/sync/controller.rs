// ── Synchronization controller ──
//
// Owns every sync attempt. Each attempt is driven by one spawned task
// holding one cancellable timer: dispatch with bounded retry, then a
// fixed number of confirmation re-fetches. Status is published on a
// per-attempt `watch` channel and as `SyncEvent`s on a broadcast channel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::status::{KeyState, SyncAttemptId, SyncEvent, SyncState, SyncStatus};
use crate::catalog::PathCatalog;
use crate::changeset::ChangeSet;
use crate::codec::{self, WireType};
use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::fault::{classify, FaultKind};
use crate::model::{DeviceId, DeviceSnapshot, LogicalKey};
use crate::navigator;
use crate::provider::{Operation, SnapshotProvider, TaskDispatcher, TaskHandle, TaskPoll};
use crate::resolver::Resolver;
use crate::store::SnapshotStore;

const EVENT_CHANNEL_SIZE: usize = 256;

/// Submits change sets and tracks them to a terminal state.
///
/// Cheaply cloneable via `Arc`. At most one attempt per device is in
/// flight; a second submission for that device is rejected with
/// [`CoreError::Busy`].
pub struct SyncController<P, D> {
    inner: Arc<Inner<P, D>>,
}

impl<P, D> Clone for SyncController<P, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<P, D> {
    provider: Arc<P>,
    dispatcher: Arc<D>,
    store: Arc<SnapshotStore>,
    catalog: Arc<PathCatalog>,
    config: SyncConfig,
    attempts: DashMap<SyncAttemptId, Attempt>,
    in_flight: DashMap<DeviceId, SyncAttemptId>,
    events: broadcast::Sender<SyncEvent>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

struct Attempt {
    status: watch::Sender<SyncStatus>,
    cancel: CancellationToken,
}

impl<P: SnapshotProvider, D: TaskDispatcher> SyncController<P, D> {
    pub fn new(
        provider: Arc<P>,
        dispatcher: Arc<D>,
        store: Arc<SnapshotStore>,
        catalog: Arc<PathCatalog>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(Inner {
                provider,
                dispatcher,
                store,
                catalog,
                config,
                attempts: DashMap::new(),
                in_flight: DashMap::new(),
                events,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Start synchronizing `changeset`. Returns once the attempt is
    /// registered; progress is observed through [`status`](Self::status),
    /// [`subscribe`](Self::subscribe) or [`wait`](Self::wait).
    ///
    /// An empty change set is confirmed immediately without dispatching.
    pub async fn submit(&self, changeset: ChangeSet, wake_now: bool) -> Result<SyncAttemptId, CoreError> {
        let attempt_id = SyncAttemptId::new();
        let device_id = changeset.device_id().clone();
        let status = SyncStatus::for_changeset(attempt_id, &changeset);

        if changeset.is_empty() {
            info!(device = %device_id, attempt = %attempt_id, "nothing to change");
            self.register(attempt_id, status, CancellationToken::new());
            self.update(attempt_id, |s| s.state = SyncState::Confirmed);
            return Ok(attempt_id);
        }

        match self.inner.in_flight.entry(device_id.clone()) {
            Entry::Occupied(existing) => {
                return Err(CoreError::Busy {
                    device_id,
                    attempt_id: *existing.get(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(attempt_id);
            }
        }

        let cancel = self.inner.cancel.child_token();
        self.register(attempt_id, status, cancel.clone());
        info!(
            device = %device_id,
            attempt = %attempt_id,
            entries = changeset.entries().len(),
            skipped = changeset.skipped().len(),
            wake_now,
            "sync attempt submitted"
        );

        let ctrl = self.clone();
        let handle = tokio::spawn(async move {
            ctrl.drive(attempt_id, &changeset, wake_now, &cancel).await;
        });

        let mut handles = self.inner.task_handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        Ok(attempt_id)
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn status(&self, attempt_id: SyncAttemptId) -> Result<SyncStatus, CoreError> {
        self.inner
            .attempts
            .get(&attempt_id)
            .map(|a| a.status.borrow().clone())
            .ok_or(CoreError::UnknownAttempt { attempt_id })
    }

    pub fn subscribe(&self, attempt_id: SyncAttemptId) -> Result<watch::Receiver<SyncStatus>, CoreError> {
        self.inner
            .attempts
            .get(&attempt_id)
            .map(|a| a.status.subscribe())
            .ok_or(CoreError::UnknownAttempt { attempt_id })
    }

    /// Resolve once the attempt is `Confirmed` or `Abandoned`.
    pub async fn wait(&self, attempt_id: SyncAttemptId) -> Result<SyncStatus, CoreError> {
        let mut rx = self.subscribe(attempt_id)?;
        let status = rx
            .wait_for(SyncStatus::is_terminal)
            .await
            .map_err(|_| CoreError::Internal(format!("sync attempt {attempt_id} was dropped")))?;
        Ok((*status).clone())
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// The attempt currently in flight for `device_id`, if any.
    pub fn in_flight(&self, device_id: &DeviceId) -> Option<SyncAttemptId> {
        self.inner.in_flight.get(device_id).map(|id| *id)
    }

    // ── Control ──────────────────────────────────────────────────────

    /// Stop an attempt. A dispatch already on the wire finishes first;
    /// nothing is dispatched or re-fetched afterwards.
    pub fn cancel(&self, attempt_id: SyncAttemptId) -> Result<(), CoreError> {
        let attempt = self
            .inner
            .attempts
            .get(&attempt_id)
            .ok_or(CoreError::UnknownAttempt { attempt_id })?;
        if !attempt.status.borrow().is_terminal() {
            info!(attempt = %attempt_id, "cancelling sync attempt");
            attempt.cancel.cancel();
        }
        Ok(())
    }

    /// Drop a finished attempt's status. Returns `false` for unknown or
    /// still-running attempts.
    pub fn forget(&self, attempt_id: SyncAttemptId) -> bool {
        self.inner
            .attempts
            .remove_if(&attempt_id, |_, a| a.status.borrow().is_terminal())
            .is_some()
    }

    /// Cancel every attempt and wait for their drivers to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("sync controller stopped");
    }

    // ── Driver ───────────────────────────────────────────────────────

    async fn drive(
        &self,
        attempt_id: SyncAttemptId,
        changeset: &ChangeSet,
        wake_now: bool,
        cancel: &CancellationToken,
    ) {
        let Some(handle) = self
            .dispatch_with_retry(attempt_id, changeset, wake_now, cancel)
            .await
        else {
            return;
        };

        if cancel.is_cancelled() {
            self.withdraw(&handle).await;
            self.abandon(attempt_id, KeyState::Unconfirmed);
            return;
        }

        self.update(attempt_id, |s| {
            s.state = SyncState::AwaitingConfirmation;
            s.task_id = Some(handle.id.clone());
        });
        self.confirm(attempt_id, &handle, cancel).await;
    }

    /// Dispatch until success, a non-retryable fault, or the retry budget
    /// runs out. Finalizes the status itself on failure.
    async fn dispatch_with_retry(
        &self,
        attempt_id: SyncAttemptId,
        changeset: &ChangeSet,
        wake_now: bool,
        cancel: &CancellationToken,
    ) -> Option<TaskHandle> {
        let config = &self.inner.config;
        let device_id = changeset.device_id();
        let operation = Operation::SetParameters {
            values: changeset.parameter_values(),
        };
        let max_attempts = config.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                self.abandon(attempt_id, KeyState::Unconfirmed);
                return None;
            }
            if attempt > 0 {
                self.update(attempt_id, |s| s.state = SyncState::Retrying);
                let delay = config.retry.delay_for_attempt(attempt);
                debug!(device = %device_id, attempt = %attempt_id, ?delay, "backing off before retry");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        self.abandon(attempt_id, KeyState::Unconfirmed);
                        return None;
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }

            self.update(attempt_id, |s| {
                s.state = SyncState::Submitting;
                s.attempts_made = attempt + 1;
            });

            let result = tokio::time::timeout(
                config.dispatch_timeout,
                self.inner.dispatcher.dispatch(device_id, &operation, wake_now),
            )
            .await
            .unwrap_or_else(|_| {
                Err(CoreError::Timeout {
                    timeout_secs: config.dispatch_timeout.as_secs(),
                })
            });

            let err = match result {
                Ok(handle) => {
                    if !handle.queued {
                        info!(device = %device_id, task = %handle.id, "task executed by ACS");
                    } else if wake_now {
                        warn!(
                            device = %device_id,
                            task = %handle.id,
                            "device did not answer the connection request; task waits for its next inform"
                        );
                    } else {
                        info!(device = %device_id, task = %handle.id, "task queued for next inform");
                    }
                    return Some(handle);
                }
                Err(err) => err,
            };

            let fault = classify(&err);
            let retry = fault.is_retryable() && attempt + 1 < max_attempts && !cancel.is_cancelled();
            warn!(
                device = %device_id,
                attempt = %attempt_id,
                try_number = attempt + 1,
                kind = %fault.kind,
                error = %err,
                retry,
                "dispatch failed"
            );
            let rejected = matches!(fault.kind, FaultKind::ProtocolFault | FaultKind::Validation);
            self.update(attempt_id, |s| {
                s.state = SyncState::Failed;
                s.last_error = Some(fault);
            });

            if !retry {
                let key_state = if rejected {
                    KeyState::Rejected
                } else {
                    KeyState::Unconfirmed
                };
                self.abandon(attempt_id, key_state);
                return None;
            }
        }

        self.abandon(attempt_id, KeyState::Unconfirmed);
        None
    }

    async fn confirm(&self, attempt_id: SyncAttemptId, handle: &TaskHandle, cancel: &CancellationToken) {
        let config = &self.inner.config;
        let device_id = &handle.device_id;
        let mut observed: HashMap<LogicalKey, Option<String>> = HashMap::new();
        let mut fetched_any = false;
        let mut last_fetch_error = None;
        // Stays set while every poll says the device has not run the task.
        let mut never_ran = true;

        for tick in 0..config.confirm_attempts {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.withdraw(handle).await;
                    self.abandon(attempt_id, KeyState::Unconfirmed);
                    return;
                }
                () = tokio::time::sleep(config.confirm_wait(tick)) => {}
            }

            match self.inner.dispatcher.poll_task(handle).await {
                Ok(TaskPoll::Failed { code, message }) => {
                    let fault = classify(&CoreError::ProtocolFault { code, message });
                    warn!(device = %device_id, task = %handle.id, error = %fault.message, "device rejected the task");
                    self.update(attempt_id, |s| {
                        s.state = SyncState::Failed;
                        s.last_error = Some(fault);
                    });
                    self.abandon(attempt_id, KeyState::Rejected);
                    return;
                }
                Ok(TaskPoll::Pending) => debug!(device = %device_id, task = %handle.id, tick, "task still queued"),
                Ok(TaskPoll::Succeeded) => {
                    never_ran = false;
                    debug!(device = %device_id, task = %handle.id, tick, "task done");
                }
                Err(e) => {
                    never_ran = false;
                    warn!(device = %device_id, task = %handle.id, error = %e, "task poll failed");
                }
            }

            let snapshot = match self.inner.provider.fetch_snapshot(device_id).await {
                Ok(snapshot) => self.inner.store.replace(snapshot),
                Err(e) => {
                    warn!(device = %device_id, tick, error = %e, "confirmation re-fetch failed");
                    last_fetch_error = Some(classify(&e));
                    continue;
                }
            };
            fetched_any = true;

            if self.compare(attempt_id, &snapshot, &mut observed) {
                self.update(attempt_id, |s| s.state = SyncState::Confirmed);
                return;
            }
        }

        if !fetched_any {
            self.update(attempt_id, |s| s.last_error = last_fetch_error);
            self.abandon(attempt_id, KeyState::Unconfirmed);
            return;
        }

        if never_ran {
            warn!(
                device = %device_id,
                task = %handle.id,
                "device never picked up the task; leaving keys unconfirmed"
            );
            self.update(attempt_id, |s| {
                for key in s.pending_mut() {
                    key.state = KeyState::Unconfirmed;
                }
                s.state = SyncState::Confirmed;
            });
            return;
        }

        self.update(attempt_id, |s| {
            for key in s.pending_mut() {
                let seen = observed.remove(&key.key).flatten();
                warn!(
                    device = %device_id,
                    key = %key.key,
                    intended = ?key.wire_value,
                    observed = ?seen,
                    "value did not converge"
                );
                key.state = KeyState::DriftDetected { observed: seen };
            }
            s.state = SyncState::Confirmed;
        });
    }

    /// Delete the task of an attempt cancelled by the caller so the device
    /// does not run it at its next inform. Shutdown leaves tasks queued.
    async fn withdraw(&self, handle: &TaskHandle) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        match self.inner.dispatcher.discard_task(handle).await {
            Ok(()) => info!(device = %handle.device_id, task = %handle.id, "queued task withdrawn"),
            Err(e) => warn!(device = %handle.device_id, task = %handle.id, error = %e, "could not withdraw task"),
        }
    }

    /// Mark pending keys that `snapshot` shows at their intended value.
    /// Returns `true` when no key is left pending.
    fn compare(
        &self,
        attempt_id: SyncAttemptId,
        snapshot: &DeviceSnapshot,
        observed: &mut HashMap<LogicalKey, Option<String>>,
    ) -> bool {
        let catalog = &self.inner.catalog;
        let resolver = Resolver::new(catalog);
        let mut settled = false;

        self.update(attempt_id, |s| {
            for key in s.pending_mut() {
                let (Some(submitted), Some(intended)) = (key.path.as_deref(), key.wire_value.as_deref()) else {
                    continue;
                };
                let wire_type = catalog
                    .get(key.key.as_str())
                    .map_or(WireType::String, |e| e.value.wire_type);
                let path = resolver
                    .write_path(snapshot, key.key.as_str())
                    .unwrap_or(submitted);
                let seen = navigator::lookup(&snapshot.root, path)
                    .leaf()
                    .map(|leaf| codec::canonical_wire(&leaf.value, wire_type));

                if seen.as_deref() == Some(intended) {
                    key.state = KeyState::Applied;
                    observed.remove(&key.key);
                } else {
                    observed.insert(key.key.clone(), seen);
                }
            }
            settled = !s.has_pending();
        });
        settled
    }

    // ── Status bookkeeping ───────────────────────────────────────────

    fn register(&self, attempt_id: SyncAttemptId, status: SyncStatus, cancel: CancellationToken) {
        let (tx, _) = watch::channel(status);
        self.inner.attempts.insert(attempt_id, Attempt { status: tx, cancel });
    }

    /// Settle every pending key as `key_state` and end the attempt.
    fn abandon(&self, attempt_id: SyncAttemptId, key_state: KeyState) {
        self.update(attempt_id, |s| {
            for key in s.pending_mut() {
                key.state = key_state.clone();
            }
            s.state = SyncState::Abandoned;
        });
    }

    /// Apply `f` to the attempt's status, publish it, and emit events for
    /// whatever changed. The device's in-flight slot is released before a
    /// terminal status becomes visible to watchers.
    fn update(&self, attempt_id: SyncAttemptId, f: impl FnOnce(&mut SyncStatus)) {
        let Some(attempt) = self.inner.attempts.get(&attempt_id) else {
            return;
        };

        let mut events = Vec::new();
        attempt.status.send_modify(|s| {
            let state_before = s.state;
            let keys_before: Vec<KeyState> = s.keys.iter().map(|k| k.state.clone()).collect();

            f(s);
            s.updated_at = Utc::now();

            if !state_before.is_terminal() && s.state.is_terminal() {
                self.inner
                    .in_flight
                    .remove_if(&s.device_id, |_, id| *id == attempt_id);
            }

            if s.state != state_before {
                info!(
                    device = %s.device_id,
                    attempt = %attempt_id,
                    from = %state_before,
                    to = %s.state,
                    "sync state changed"
                );
                events.push(SyncEvent::StateChanged {
                    attempt_id,
                    device_id: s.device_id.clone(),
                    state: s.state,
                });
            }
            for (key, before) in s.keys.iter().zip(keys_before) {
                if key.state != before {
                    events.push(SyncEvent::KeyChanged {
                        attempt_id,
                        device_id: s.device_id.clone(),
                        key: key.key.clone(),
                        state: key.state.clone(),
                    });
                }
            }
        });
        drop(attempt);

        for event in events {
            // No subscribers is fine.
            let _ = self.inner.events.send(event);
        }
    }
}
