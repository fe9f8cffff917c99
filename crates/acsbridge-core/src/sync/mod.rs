// ── Synchronization ──
//
// Submission, retry and confirmation of change sets, with at most one
// attempt in flight per device.

mod controller;
mod status;

pub use controller::SyncController;
pub use status::{KeyOutcome, KeyState, SyncAttemptId, SyncEvent, SyncState, SyncStatus};
