// ── Sync attempt status ──
//
// Everything an observer can learn about one attempt: overall state, the
// last classified failure and a per-key outcome list.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use uuid::Uuid;

use crate::changeset::{ChangeSet, SkipReason};
use crate::fault::Fault;
use crate::model::{DeviceId, LogicalKey, Scalar};

/// Identifier of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SyncAttemptId(Uuid);

impl SyncAttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SyncAttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncState {
    Idle,
    Submitting,
    Retrying,
    AwaitingConfirmation,
    Confirmed,
    /// Transient: followed by `Retrying` or `Abandoned`.
    Failed,
    Abandoned,
}

impl SyncState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Abandoned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KeyState {
    /// Dispatched or about to be, not yet seen on the device.
    Pending,
    /// The device reports the intended value.
    Applied,
    /// Still different after every confirmation re-fetch.
    DriftDetected { observed: Option<String> },
    /// The device refused the write.
    Rejected,
    /// Never dispatched.
    Skipped {
        #[serde(flatten)]
        reason: SkipReason,
    },
    /// The attempt ended, or the device never ran the task, before the
    /// value could be confirmed.
    Unconfirmed,
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Applied => f.write_str("applied"),
            Self::DriftDetected { observed: Some(v) } => write!(f, "drift (device has {v:?})"),
            Self::DriftDetected { observed: None } => f.write_str("drift (path gone)"),
            Self::Rejected => f.write_str("rejected"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Unconfirmed => f.write_str("unconfirmed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyOutcome {
    pub key: LogicalKey,
    pub path: Option<String>,
    pub intended: Option<Scalar>,
    pub wire_value: Option<String>,
    pub state: KeyState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub attempt_id: SyncAttemptId,
    pub device_id: DeviceId,
    pub state: SyncState,
    /// Dispatch calls made so far.
    pub attempts_made: u32,
    pub last_error: Option<Fault>,
    pub task_id: Option<String>,
    pub keys: Vec<KeyOutcome>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncStatus {
    pub(crate) fn for_changeset(attempt_id: SyncAttemptId, changeset: &ChangeSet) -> Self {
        let entries = changeset.entries().iter().map(|e| KeyOutcome {
            key: e.key.clone(),
            path: Some(e.path.clone()),
            intended: Some(e.intended.clone()),
            wire_value: Some(e.wire_value.clone()),
            state: KeyState::Pending,
        });
        let skipped = changeset.skipped().iter().map(|s| KeyOutcome {
            key: s.key.clone(),
            path: None,
            intended: None,
            wire_value: None,
            state: KeyState::Skipped {
                reason: s.reason.clone(),
            },
        });

        let now = Utc::now();
        Self {
            attempt_id,
            device_id: changeset.device_id().clone(),
            state: SyncState::Idle,
            attempts_made: 0,
            last_error: None,
            task_id: None,
            keys: entries.chain(skipped).collect(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn key(&self, key: &str) -> Option<&KeyOutcome> {
        self.keys.iter().find(|k| k.key.as_str() == key)
    }

    pub(crate) fn pending_mut(&mut self) -> impl Iterator<Item = &mut KeyOutcome> {
        self.keys
            .iter_mut()
            .filter(|k| k.state == KeyState::Pending)
    }

    pub fn has_pending(&self) -> bool {
        self.keys.iter().any(|k| k.state == KeyState::Pending)
    }

    /// Count of keys in each terminal bucket: applied, drifted, other.
    pub fn tally(&self) -> (usize, usize, usize) {
        self.keys.iter().fold((0, 0, 0), |(a, d, o), k| match k.state {
            KeyState::Applied => (a + 1, d, o),
            KeyState::DriftDetected { .. } => (a, d + 1, o),
            _ => (a, d, o + 1),
        })
    }
}

/// Change notifications published by the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    StateChanged {
        attempt_id: SyncAttemptId,
        device_id: DeviceId,
        state: SyncState,
    },
    KeyChanged {
        attempt_id: SyncAttemptId,
        device_id: DeviceId,
        key: LogicalKey,
        state: KeyState,
    },
}
