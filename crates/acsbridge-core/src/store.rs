// ── Snapshot store ──
//
// Latest snapshot per device. Replacement is wholesale and only moves
// forward in version order; subscribers see each accepted snapshot
// through a per-device `watch` channel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::model::{DeviceId, DeviceSnapshot};

type Slot = watch::Sender<Option<Arc<DeviceSnapshot>>>;

#[derive(Debug, Default)]
pub struct SnapshotStore {
    devices: DashMap<DeviceId, Slot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<Arc<DeviceSnapshot>> {
        self.devices
            .get(device_id)
            .and_then(|slot| slot.borrow().clone())
    }

    /// Store `snapshot` unless a newer one is already held. Returns whichever
    /// snapshot is current afterwards.
    pub fn replace(&self, snapshot: DeviceSnapshot) -> Arc<DeviceSnapshot> {
        let incoming = Arc::new(snapshot);
        let slot = self
            .devices
            .entry(incoming.device_id.clone())
            .or_insert_with(|| watch::channel(None).0);

        let mut current = Arc::clone(&incoming);
        let accepted = slot.send_if_modified(|held| match held {
            Some(existing) if existing.version >= incoming.version => {
                current = Arc::clone(existing);
                false
            }
            _ => {
                *held = Some(Arc::clone(&incoming));
                true
            }
        });

        debug!(
            device = %incoming.device_id,
            version = %incoming.version,
            accepted,
            "snapshot replace"
        );
        current
    }

    /// Watch a device's snapshot, including devices not fetched yet.
    pub fn subscribe(&self, device_id: &DeviceId) -> watch::Receiver<Option<Arc<DeviceSnapshot>>> {
        self.devices
            .entry(device_id.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }
}
