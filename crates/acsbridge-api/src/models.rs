// Wire types for the GenieACS northbound interface.
//
// Task bodies are tagged by `name`; parameter tuples serialize as
// `[path, value, type]` arrays, which is what the NBI expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task the ACS should run against a device on its next session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum TaskRequest {
    SetParameterValues {
        #[serde(rename = "parameterValues")]
        parameter_values: Vec<(String, String, String)>,
    },
    GetParameterValues {
        #[serde(rename = "parameterNames")]
        parameter_names: Vec<String>,
    },
    RefreshObject {
        #[serde(rename = "objectName")]
        object_name: String,
    },
    Reboot,
}

impl TaskRequest {
    /// The NBI task name, as it appears in task and fault documents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetParameterValues { .. } => "setParameterValues",
            Self::GetParameterValues { .. } => "getParameterValues",
            Self::RefreshObject { .. } => "refreshObject",
            Self::Reboot => "reboot",
        }
    }
}

/// Outcome of `POST /devices/<id>/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReceipt {
    /// Task identifier assigned by the ACS.
    pub id: String,
    /// `true` when the ACS answered 202: the connection request failed or
    /// was not requested, so the task waits for the device's next inform.
    pub queued: bool,
}

/// A task document still pending on the ACS.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub device: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A fault recorded by the ACS for a device session or task.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FaultRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub device: String,
    /// `task_<taskId>` for task faults, `default` or a provision name otherwise.
    pub channel: String,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl FaultRecord {
    /// Task id this fault belongs to, if it was raised by a task.
    pub fn task_id(&self) -> Option<&str> {
        self.channel.strip_prefix("task_")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn set_parameter_values_serializes_as_nbi_body() {
        let task = TaskRequest::SetParameterValues {
            parameter_values: vec![(
                "Device.WiFi.SSID.1.SSID".into(),
                "Home".into(),
                "xsd:string".into(),
            )],
        };
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({
                "name": "setParameterValues",
                "parameterValues": [["Device.WiFi.SSID.1.SSID", "Home", "xsd:string"]]
            })
        );
    }

    #[test]
    fn reboot_serializes_with_name_only() {
        assert_eq!(
            serde_json::to_value(TaskRequest::Reboot).unwrap(),
            json!({ "name": "reboot" })
        );
    }

    #[test]
    fn fault_channel_yields_task_id() {
        let fault: FaultRecord = serde_json::from_value(json!({
            "_id": "dev-1:task_65f0",
            "device": "dev-1",
            "channel": "task_65f0",
            "code": "cwmp.9007",
            "message": "Invalid parameter value",
            "retries": 1,
            "timestamp": "2024-06-15T10:30:00.000Z"
        }))
        .unwrap();
        assert_eq!(fault.task_id(), Some("65f0"));
        assert_eq!(fault.retries, 1);
    }
}
