// ── Change-set builder ──
//
// Diffs an edited logical-value map against the one the operator loaded
// and turns each changed key into a `(path, wire value, wire type)` entry.
// Keys that cannot be written are recorded as skipped; the rest of the
// batch still goes through.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::PathCatalog;
use crate::codec::{self, WireType};
use crate::model::{DeviceId, DeviceSnapshot, LogicalKey, Scalar, SnapshotVersion};
use crate::resolver::Resolver;

/// Logical values keyed by logical key, in insertion order.
pub type LogicalValues = IndexMap<LogicalKey, Scalar>;

/// One parameter write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    pub key: LogicalKey,
    pub path: String,
    pub wire_value: String,
    pub wire_type: WireType,
    /// The logical value the operator asked for.
    pub intended: Scalar,
}

/// Why a changed key produced no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum SkipReason {
    /// No write candidate exists on this device.
    Unresolved,
    /// The key is not in the catalog.
    UnknownKey,
    /// The value cannot be encoded, or the key is read-only.
    Validation(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => f.write_str("no writable path on this device"),
            Self::UnknownKey => f.write_str("unknown key"),
            Self::Validation(msg) => f.write_str(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedKey {
    pub key: LogicalKey,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// A validated batch of writes for one device, also used as the preview
/// shown before submission.
#[derive(Debug, Serialize)]
pub struct ChangeSet {
    device_id: DeviceId,
    entries: Vec<ChangeEntry>,
    skipped: Vec<SkippedKey>,
    created_from: SnapshotVersion,
}

impl ChangeSet {
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn skipped(&self) -> &[SkippedKey] {
        &self.skipped
    }

    /// Version of the snapshot the diff was computed against.
    pub fn created_from(&self) -> SnapshotVersion {
        self.created_from
    }

    /// True when nothing would be dispatched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the `[path, value, type]` shape the dispatcher sends.
    pub fn parameter_values(&self) -> Vec<(String, String, String)> {
        self.entries
            .iter()
            .map(|e| {
                (
                    e.path.clone(),
                    e.wire_value.clone(),
                    e.wire_type.as_tag().to_owned(),
                )
            })
            .collect()
    }
}

/// Build the change set that takes `original` to `edited` on `snapshot`'s device.
///
/// Entry order follows `edited`. A key missing from `original` counts as
/// changed, so write-only secrets that read back empty can still be set.
pub fn build(
    original: &LogicalValues,
    edited: &LogicalValues,
    snapshot: &DeviceSnapshot,
    catalog: &PathCatalog,
) -> ChangeSet {
    let resolver = Resolver::new(catalog);
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    let mut skip = |key: &LogicalKey, reason: SkipReason| {
        warn!(device = %snapshot.device_id, key = %key, %reason, "skipping key");
        skipped.push(SkippedKey {
            key: key.clone(),
            reason,
        });
    };

    for (key, value) in edited {
        if original.get(key).is_some_and(|old| old.same_as(value)) {
            continue;
        }

        let Some(entry) = catalog.get(key.as_str()) else {
            skip(key, SkipReason::UnknownKey);
            continue;
        };
        if !entry.is_writable() {
            skip(key, SkipReason::Validation(format!("{key} is read-only")));
            continue;
        }
        let Some(path) = resolver.write_path(snapshot, key.as_str()) else {
            skip(key, SkipReason::Unresolved);
            continue;
        };

        match codec::to_wire(value, &entry.value) {
            Ok(wire_value) => {
                debug!(device = %snapshot.device_id, key = %key, path, %wire_value, "change entry");
                entries.push(ChangeEntry {
                    key: key.clone(),
                    path: path.to_owned(),
                    wire_value,
                    wire_type: entry.value.wire_type,
                    intended: value.clone(),
                });
            }
            Err(e) => skip(key, SkipReason::Validation(e.to_string())),
        }
    }

    ChangeSet {
        device_id: snapshot.device_id.clone(),
        entries,
        skipped,
        created_from: snapshot.version,
    }
}
