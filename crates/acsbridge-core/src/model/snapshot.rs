// ── Snapshots and identifiers ──
//
// A `DeviceSnapshot` is immutable once built. Re-fetching produces a new
// snapshot with a higher `SnapshotVersion`; nothing is merged in place.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::node::ConfigNode;

// ── DeviceId ────────────────────────────────────────────────────────

/// ACS device identifier (`<OUI>-<ProductClass>-<SerialNumber>` on GenieACS).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── LogicalKey ──────────────────────────────────────────────────────

/// Vendor-independent name of one setting, e.g. `wifi_5_ssid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalKey(String);

impl LogicalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for LogicalKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for LogicalKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── SnapshotVersion ─────────────────────────────────────────────────

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Process-wide, strictly increasing snapshot counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotVersion(u64);

impl SnapshotVersion {
    /// Allocate the next version.
    pub fn next() -> Self {
        Self(NEXT_VERSION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ── DataModel ───────────────────────────────────────────────────────

/// CWMP data-model generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum DataModel {
    /// Legacy `InternetGatewayDevice.` root.
    #[strum(serialize = "TR-098")]
    #[serde(rename = "TR-098")]
    Tr098,
    /// Current `Device.` root.
    #[strum(serialize = "TR-181")]
    #[serde(rename = "TR-181")]
    Tr181,
}

/// Manufacturer substrings known to ship a given generation, checked when
/// the tree root alone is inconclusive.
const MANUFACTURER_MODELS: &[(&str, DataModel)] = &[
    ("tp-link", DataModel::Tr098),
    ("tplink", DataModel::Tr098),
    ("intelbras", DataModel::Tr098),
    ("multilaser", DataModel::Tr098),
    ("d-link", DataModel::Tr098),
    ("dlink", DataModel::Tr098),
    ("tenda", DataModel::Tr098),
    ("mercusys", DataModel::Tr098),
    ("huawei", DataModel::Tr181),
    ("fiberhome", DataModel::Tr181),
    ("zte", DataModel::Tr181),
    ("nokia", DataModel::Tr181),
    ("alcatel", DataModel::Tr181),
    ("calix", DataModel::Tr181),
    ("sagemcom", DataModel::Tr181),
    ("technicolor", DataModel::Tr181),
];

impl DataModel {
    /// Best-effort generation detection. Informational only: path
    /// resolution never consults it.
    pub fn detect(snapshot: &DeviceSnapshot) -> Self {
        if snapshot.root.child("Device").is_some() {
            return Self::Tr181;
        }
        if snapshot.root.child("InternetGatewayDevice").is_some() {
            return Self::Tr098;
        }

        let manufacturer = snapshot
            .identity
            .manufacturer
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        MANUFACTURER_MODELS
            .iter()
            .find(|(needle, _)| manufacturer.contains(needle))
            .map_or(Self::Tr098, |(_, model)| *model)
    }

    /// Root object name for this generation.
    pub fn root(self) -> &'static str {
        match self {
            Self::Tr098 => "InternetGatewayDevice",
            Self::Tr181 => "Device",
        }
    }
}

// ── DeviceIdentity ──────────────────────────────────────────────────

/// Identity block reported by the device in its Inform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub manufacturer: Option<String>,
    pub oui: Option<String>,
    pub product_class: Option<String>,
    pub serial_number: Option<String>,
}

// ── DeviceSnapshot ──────────────────────────────────────────────────

/// One fetched configuration tree for one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub device_id: DeviceId,
    pub root: ConfigNode,
    pub identity: DeviceIdentity,
    pub fetched_at: DateTime<Utc>,
    pub version: SnapshotVersion,
}

impl DeviceSnapshot {
    /// Wrap a freshly fetched tree, assigning the next version.
    pub fn new(device_id: DeviceId, root: ConfigNode, identity: DeviceIdentity) -> Self {
        Self {
            device_id,
            root,
            identity,
            fetched_at: Utc::now(),
            version: SnapshotVersion::next(),
        }
    }

    pub fn data_model(&self) -> DataModel {
        DataModel::detect(self)
    }
}
