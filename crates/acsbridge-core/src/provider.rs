// ── External collaborators ──
//
// The two services the core consumes: something that hands out device
// snapshots and something that runs remote operations on devices. The
// ACS adapter implements both; tests substitute in-memory fakes.

use std::future::Future;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{DeviceId, DeviceSnapshot};

/// Source of current configuration trees.
pub trait SnapshotProvider: Send + Sync + 'static {
    /// Fetch the device's current tree. Fails with `DeviceUnreachable` or
    /// `DeviceNotFound` when there is nothing to fetch.
    fn fetch_snapshot(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<DeviceSnapshot, CoreError>> + Send;
}

/// A remote operation for the dispatcher to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Operation {
    /// `(path, wire value, wire type)` tuples, in submission order.
    SetParameters { values: Vec<(String, String, String)> },
}

/// Reference to a dispatched operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskHandle {
    pub id: String,
    pub device_id: DeviceId,
    /// The device was not woken; the task runs at its next check-in.
    pub queued: bool,
}

/// Progress of a dispatched operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskPoll {
    Pending,
    Succeeded,
    Failed { code: String, message: String },
}

/// Runs operations on devices through the ACS.
pub trait TaskDispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        device_id: &DeviceId,
        operation: &Operation,
        wake_now: bool,
    ) -> impl Future<Output = Result<TaskHandle, CoreError>> + Send;

    fn poll_task(
        &self,
        handle: &TaskHandle,
    ) -> impl Future<Output = Result<TaskPoll, CoreError>> + Send;

    /// Withdraw a task the device has not run yet. A task that is already
    /// gone is not an error.
    fn discard_task(&self, handle: &TaskHandle) -> impl Future<Output = Result<(), CoreError>> + Send;
}
