// ── GenieACS adapter ──
//
// Implements the snapshot provider and task dispatcher over the GenieACS
// northbound interface. A faulted task stays listed on the ACS until it
// is retried or deleted, so task status is read from the task and fault
// collections together.

use std::time::Duration;

use tracing::debug;

use acsbridge_api::{AcsClient, TaskOptions, TaskRequest};

use crate::config::AcsConfig;
use crate::convert;
use crate::error::CoreError;
use crate::model::{DeviceId, DeviceSnapshot};
use crate::provider::{Operation, SnapshotProvider, TaskDispatcher, TaskHandle, TaskPoll};

pub struct GenieAcs {
    client: AcsClient,
    task_wait: Option<Duration>,
}

impl GenieAcs {
    pub fn new(client: AcsClient) -> Self {
        Self {
            client,
            task_wait: None,
        }
    }

    /// Build a client from runtime configuration.
    pub fn connect(config: &AcsConfig) -> Result<Self, CoreError> {
        let mut client = AcsClient::new(config.url.as_str(), &config.transport())?;
        if let Some((username, password)) = &config.credentials {
            client = client.with_basic_auth(username.clone(), password.clone());
        }
        Ok(Self {
            client,
            task_wait: config.task_wait,
        })
    }

    pub fn client(&self) -> &AcsClient {
        &self.client
    }
}

impl SnapshotProvider for GenieAcs {
    async fn fetch_snapshot(&self, device_id: &DeviceId) -> Result<DeviceSnapshot, CoreError> {
        let document = self.client.get_device(device_id.as_str()).await?;
        convert::snapshot_from_document(device_id, &document)
    }
}

impl TaskDispatcher for GenieAcs {
    async fn dispatch(
        &self,
        device_id: &DeviceId,
        operation: &Operation,
        wake_now: bool,
    ) -> Result<TaskHandle, CoreError> {
        let request = match operation {
            Operation::SetParameters { values } => TaskRequest::SetParameterValues {
                parameter_values: values.clone(),
            },
        };
        let options = TaskOptions {
            connection_request: wake_now,
            wait: self.task_wait,
        };

        let receipt = self
            .client
            .create_task(device_id.as_str(), &request, options)
            .await?;
        debug!(device = %device_id, task = %receipt.id, queued = receipt.queued, "task created");

        Ok(TaskHandle {
            id: receipt.id,
            device_id: device_id.clone(),
            queued: receipt.queued,
        })
    }

    async fn poll_task(&self, handle: &TaskHandle) -> Result<TaskPoll, CoreError> {
        if self.client.get_task(&handle.id).await?.is_none() {
            return Ok(TaskPoll::Succeeded);
        }

        let fault = self
            .client
            .list_faults(handle.device_id.as_str())
            .await?
            .into_iter()
            .filter(|f| f.task_id() == Some(handle.id.as_str()))
            .max_by_key(|f| f.timestamp);

        Ok(match fault {
            Some(f) => TaskPoll::Failed {
                code: f.code.strip_prefix("cwmp.").unwrap_or(&f.code).to_owned(),
                message: f.message,
            },
            None => TaskPoll::Pending,
        })
    }

    async fn discard_task(&self, handle: &TaskHandle) -> Result<(), CoreError> {
        self.client.delete_task(&handle.id).await?;
        debug!(device = %handle.device_id, task = %handle.id, "task deleted");
        Ok(())
    }
}
