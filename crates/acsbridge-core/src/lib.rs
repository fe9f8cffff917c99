// acsbridge-core: vendor-independent configuration layer over a TR-069 ACS.
//
// Device trees come in through a `SnapshotProvider`, are read as logical
// keys through the `PathCatalog`, and edits go back out through a
// `TaskDispatcher` under the `SyncController`.

pub mod acs;
pub mod catalog;
pub mod changeset;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod fault;
pub mod model;
pub mod navigator;
pub mod provider;
pub mod resolver;
pub mod service;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use acs::GenieAcs;
pub use catalog::{CatalogEntry, CatalogOverride, Category, PathCandidate, PathCatalog};
pub use changeset::{ChangeEntry, ChangeSet, LogicalValues, SkipReason, SkippedKey};
pub use codec::{ValueSpec, WireType};
pub use config::{AcsConfig, RetryPolicy, SyncConfig, TlsVerification};
pub use error::CoreError;
pub use fault::{Fault, FaultKind};
pub use provider::{Operation, SnapshotProvider, TaskDispatcher, TaskHandle, TaskPoll};
pub use resolver::{KeyResolution, ResolvedBinding, Resolver};
pub use service::ConfigService;
pub use store::SnapshotStore;
pub use sync::{KeyOutcome, KeyState, SyncAttemptId, SyncController, SyncEvent, SyncState, SyncStatus};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ConfigNode, DataModel, DeviceId, DeviceIdentity, DeviceSnapshot, Leaf, LogicalKey, Scalar,
    SnapshotVersion,
};
