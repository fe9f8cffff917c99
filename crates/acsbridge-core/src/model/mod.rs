// ── Domain model ──
//
// Typed representation of a device configuration tree as the ACS reports
// it, plus the identifiers that tie snapshots, change sets and sync
// attempts together.

pub mod node;
pub mod snapshot;

// ── Re-exports ──────────────────────────────────────────────────────

pub use node::{Children, ConfigNode, Leaf, Scalar};
pub use snapshot::{DataModel, DeviceId, DeviceIdentity, DeviceSnapshot, LogicalKey, SnapshotVersion};
