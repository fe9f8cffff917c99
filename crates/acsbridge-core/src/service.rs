// ── Presentation service ──
//
// The surface a UI or CLI talks to: logical values in, previews out,
// previews submitted, status back. Snapshots are cached in the store and
// refreshed on demand.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::catalog::PathCatalog;
use crate::changeset::{self, ChangeSet, LogicalValues};
use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::model::{DeviceId, DeviceSnapshot};
use crate::navigator::{self, ParameterInfo};
use crate::provider::{SnapshotProvider, TaskDispatcher};
use crate::resolver::{KeyResolution, ResolvedBinding, Resolver};
use crate::store::SnapshotStore;
use crate::sync::{SyncAttemptId, SyncController, SyncEvent, SyncStatus};

pub struct ConfigService<P, D> {
    provider: Arc<P>,
    store: Arc<SnapshotStore>,
    catalog: Arc<PathCatalog>,
    sync: SyncController<P, D>,
}

impl<P, D> Clone for ConfigService<P, D> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            sync: self.sync.clone(),
        }
    }
}

impl<P: SnapshotProvider, D: TaskDispatcher> ConfigService<P, D> {
    pub fn new(provider: Arc<P>, dispatcher: Arc<D>, catalog: PathCatalog, config: SyncConfig) -> Self {
        let store = Arc::new(SnapshotStore::new());
        let catalog = Arc::new(catalog);
        let sync = SyncController::new(
            Arc::clone(&provider),
            dispatcher,
            Arc::clone(&store),
            Arc::clone(&catalog),
            config,
        );
        Self {
            provider,
            store,
            catalog,
            sync,
        }
    }

    pub fn catalog(&self) -> &PathCatalog {
        &self.catalog
    }

    pub fn sync(&self) -> &SyncController<P, D> {
        &self.sync
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Fetch a fresh snapshot and make it current.
    pub async fn refresh(&self, device_id: &DeviceId) -> Result<Arc<DeviceSnapshot>, CoreError> {
        let snapshot = self.provider.fetch_snapshot(device_id).await?;
        debug!(device = %device_id, version = %snapshot.version, "fetched snapshot");
        Ok(self.store.replace(snapshot))
    }

    /// Follow a device's current snapshot. Fires on every accepted
    /// replacement, including confirmation re-fetches after a write.
    pub fn watch_snapshot(&self, device_id: &DeviceId) -> watch::Receiver<Option<Arc<DeviceSnapshot>>> {
        self.store.subscribe(device_id)
    }

    /// The stored snapshot, fetching one if none is held yet.
    pub async fn snapshot(&self, device_id: &DeviceId) -> Result<Arc<DeviceSnapshot>, CoreError> {
        match self.store.get(device_id) {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh(device_id).await,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Logical values of every key that resolves on this device.
    pub async fn get_logical_values(&self, device_id: &DeviceId) -> Result<LogicalValues, CoreError> {
        let snapshot = self.snapshot(device_id).await?;
        Ok(Resolver::new(&self.catalog).values(&snapshot))
    }

    /// Like [`get_logical_values`](Self::get_logical_values), with the path
    /// and raw value behind each key.
    pub async fn bindings(&self, device_id: &DeviceId) -> Result<Vec<ResolvedBinding>, CoreError> {
        let snapshot = self.snapshot(device_id).await?;
        Ok(Resolver::new(&self.catalog).bindings(&snapshot))
    }

    pub async fn resolve_key(&self, device_id: &DeviceId, key: &str) -> Result<KeyResolution, CoreError> {
        let snapshot = self.snapshot(device_id).await?;
        Resolver::new(&self.catalog).resolve(&snapshot, key)
    }

    /// Every parameter in the device tree.
    pub async fn parameters(
        &self,
        device_id: &DeviceId,
        writable_only: bool,
    ) -> Result<Vec<ParameterInfo>, CoreError> {
        let snapshot = self.snapshot(device_id).await?;
        let params = navigator::flatten(&snapshot.root);
        Ok(if writable_only {
            navigator::writable_only(params)
        } else {
            params
        })
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Preview the writes that would take the device from its current
    /// logical values to `edited`.
    pub async fn propose_change(
        &self,
        device_id: &DeviceId,
        edited: &LogicalValues,
    ) -> Result<ChangeSet, CoreError> {
        let snapshot = self.snapshot(device_id).await?;
        let original = Resolver::new(&self.catalog).values(&snapshot);
        Ok(changeset::build(&original, edited, &snapshot, &self.catalog))
    }

    /// Submit a preview. Rejected when it was built for another device or
    /// against a snapshot that has since been replaced.
    pub async fn submit_change(
        &self,
        device_id: &DeviceId,
        preview: ChangeSet,
        wake_now: bool,
    ) -> Result<SyncAttemptId, CoreError> {
        if preview.device_id() != device_id {
            return Err(CoreError::DeviceMismatch {
                expected: device_id.to_string(),
                got: preview.device_id().to_string(),
            });
        }
        if let Some(current) = self.store.get(device_id) {
            if current.version > preview.created_from() {
                return Err(CoreError::StalePreview {
                    device_id: device_id.clone(),
                    preview: preview.created_from(),
                    current: current.version,
                });
            }
        }
        self.sync.submit(preview, wake_now).await
    }

    pub fn get_sync_status(&self, attempt_id: SyncAttemptId) -> Result<SyncStatus, CoreError> {
        self.sync.status(attempt_id)
    }

    pub fn cancel(&self, attempt_id: SyncAttemptId) -> Result<(), CoreError> {
        self.sync.cancel(attempt_id)
    }

    pub async fn wait(&self, attempt_id: SyncAttemptId) -> Result<SyncStatus, CoreError> {
        self.sync.wait(attempt_id).await
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync.events()
    }
}
