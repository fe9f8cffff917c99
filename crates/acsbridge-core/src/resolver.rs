// ── Path resolver ──
//
// Picks concrete paths for logical keys against one snapshot. Read and
// write resolution are independent: reads want the first candidate that
// holds a value, writes want the first candidate that exists and is
// writable, even if it is currently empty. Candidate order is the only
// tie-break.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::PathCatalog;
use crate::changeset::LogicalValues;
use crate::codec::{self, CodecWarning, WireType};
use crate::error::CoreError;
use crate::model::{DeviceSnapshot, LogicalKey, Scalar};
use crate::navigator::{self, Lookup};

/// A logical key bound to the concrete path it was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBinding {
    pub key: LogicalKey,
    pub path: String,
    /// Logical value, after decoding and inversion.
    pub value: Scalar,
    /// Value exactly as the device reported it.
    pub wire_value: Scalar,
    pub wire_type: WireType,
    pub writable: bool,
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<CodecWarning>,
}

/// Both bindings for one key, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyResolution {
    pub key: LogicalKey,
    pub read: Option<ResolvedBinding>,
    pub write_path: Option<String>,
    /// Every candidate with whether it exists in the snapshot.
    pub candidates: Vec<CandidateProbe>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateProbe {
    pub path: String,
    pub exists: bool,
    pub has_value: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'c> {
    catalog: &'c PathCatalog,
}

impl<'c> Resolver<'c> {
    pub fn new(catalog: &'c PathCatalog) -> Self {
        Self { catalog }
    }

    /// First read candidate holding a non-empty value, decoded.
    pub fn read(&self, snapshot: &DeviceSnapshot, key: &str) -> Option<ResolvedBinding> {
        let entry = self.catalog.get(key)?;
        let (candidate, leaf) = entry.read.iter().find_map(|c| {
            match navigator::lookup(&snapshot.root, &c.path) {
                Lookup::Value(leaf) => Some((c, leaf)),
                _ => None,
            }
        })?;

        let decoded = codec::from_wire(&leaf.value, &entry.value);
        if let Some(w) = &decoded.warning {
            warn!(
                device = %snapshot.device_id,
                key,
                path = %candidate.path,
                "{}",
                w.message
            );
        }
        debug!(device = %snapshot.device_id, key, path = %candidate.path, "resolved for read");

        Some(ResolvedBinding {
            key: entry.key.clone(),
            path: candidate.path.clone(),
            value: decoded.value,
            wire_value: leaf.value.clone(),
            wire_type: entry.value.wire_type,
            writable: leaf.writable && entry.is_writable(),
            observed_at: leaf.observed_at,
            warning: decoded.warning,
        })
    }

    /// First write candidate that exists as a writable leaf. An empty value
    /// is fine; absence, containers and read-only leaves are not.
    pub fn write_path(&self, snapshot: &DeviceSnapshot, key: &str) -> Option<&'c str> {
        self.catalog
            .write_candidates(key)
            .iter()
            .find(|c| {
                navigator::lookup(&snapshot.root, &c.path)
                    .leaf()
                    .is_some_and(|leaf| leaf.writable)
            })
            .map(|c| c.path.as_str())
    }

    /// Read binding, write path and candidate probes for `key`.
    pub fn resolve(&self, snapshot: &DeviceSnapshot, key: &str) -> Result<KeyResolution, CoreError> {
        let entry = self.catalog.get(key).ok_or_else(|| CoreError::UnknownKey {
            key: key.to_owned(),
        })?;

        let candidates = entry
            .read
            .iter()
            .chain(entry.write.iter().filter(|w| !entry.read.contains(w)))
            .map(|c| {
                let found = navigator::lookup(&snapshot.root, &c.path);
                CandidateProbe {
                    path: c.path.clone(),
                    exists: found.exists(),
                    has_value: matches!(found, Lookup::Value(_)),
                }
            })
            .collect();

        Ok(KeyResolution {
            key: entry.key.clone(),
            read: self.read(snapshot, key),
            write_path: self.write_path(snapshot, key).map(str::to_owned),
            candidates,
        })
    }

    /// Every key that resolves for read, in catalog order.
    pub fn bindings(&self, snapshot: &DeviceSnapshot) -> Vec<ResolvedBinding> {
        self.catalog
            .entries()
            .filter_map(|e| self.read(snapshot, e.key.as_str()))
            .collect()
    }

    /// The logical-value map of a snapshot. Unresolved keys are absent.
    pub fn values(&self, snapshot: &DeviceSnapshot) -> LogicalValues {
        self.bindings(snapshot)
            .into_iter()
            .map(|b| (b.key, b.value))
            .collect()
    }
}
