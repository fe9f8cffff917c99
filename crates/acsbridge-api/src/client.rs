// Async HTTP client for the GenieACS northbound interface (NBI).
//
// Endpoints: /devices, /devices/<id>/tasks, /tasks, /faults.
// Auth: optional HTTP basic auth on every request.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{FaultRecord, TaskReceipt, TaskRecord, TaskRequest};
use crate::transport::TransportConfig;

/// Body returned by the NBI after creating a task.
#[derive(serde::Deserialize)]
struct CreatedTask {
    #[serde(rename = "_id")]
    id: String,
}

/// Per-call options for task creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskOptions {
    /// Ask the ACS to send a connection request so the device runs the
    /// task now instead of at its next periodic inform.
    pub connection_request: bool,
    /// How long the ACS should hold the request open waiting for the
    /// device session to finish the task.
    pub wait: Option<Duration>,
}

/// Async client for the ACS northbound interface.
///
/// Every method returns decoded payloads; HTTP status handling and
/// error-body parsing happen here so callers only see [`Error`].
pub struct AcsClient {
    http: reqwest::Client,
    base_url: Url,
    basic_auth: Option<(String, SecretString)>,
}

impl AcsClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client for the NBI at `base_url` (e.g. `http://127.0.0.1:7557`).
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(base_url, http)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }
        Ok(Self {
            http,
            base_url,
            basic_auth: None,
        })
    }

    /// Attach HTTP basic credentials to every request.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.basic_auth = Some((username.into(), password));
        self
    }

    /// The NBI base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Append path segments to the base URL, percent-encoding each one.
    /// Device ids routinely contain characters that need escaping.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base URL validated in constructor")
            .pop_if_empty()
            .extend(segments);
        url
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.basic_auth {
            Some((user, pass)) => builder.basic_auth(user, Some(pass.expose_secret())),
            None => builder,
        }
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn query<T: DeserializeOwned>(&self, collection: &str, filter: &Value) -> Result<T, Error> {
        let url = self.endpoint(&[collection, ""]);
        let filter = filter.to_string();
        debug!("GET {url} query={filter}");

        let resp = self
            .authorize(self.http.get(url))
            .query(&[("query", filter.as_str())])
            .send()
            .await?;
        handle_response(resp).await
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Devices ──────────────────────────────────────────────────────

    /// Fetch the full device document (parameter tree plus `_deviceId`
    /// metadata) for one device.
    pub async fn get_device(&self, device_id: &str) -> Result<Value, Error> {
        let mut docs: Vec<Value> = self.query("devices", &json!({ "_id": device_id })).await?;
        if docs.is_empty() {
            return Err(Error::DeviceNotFound {
                device_id: device_id.to_owned(),
            });
        }
        Ok(docs.swap_remove(0))
    }

    // ── Tasks ────────────────────────────────────────────────────────

    /// Queue a task for a device, optionally waking it with a connection request.
    pub async fn create_task(
        &self,
        device_id: &str,
        task: &TaskRequest,
        options: TaskOptions,
    ) -> Result<TaskReceipt, Error> {
        let mut url = self.endpoint(&["devices", device_id, "tasks"]);
        {
            let mut pairs = url.query_pairs_mut();
            if options.connection_request {
                pairs.append_key_only("connection_request");
            }
            if let Some(wait) = options.wait {
                pairs.append_pair("timeout", &wait.as_millis().to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        debug!("POST {url} task={}", task.name());

        let resp = self.authorize(self.http.post(url)).json(task).send().await?;
        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::ACCEPTED => {
                let body = resp.text().await?;
                let created: CreatedTask = decode(&body)?;
                Ok(TaskReceipt {
                    id: created.id,
                    queued: status == StatusCode::ACCEPTED,
                })
            }
            StatusCode::NOT_FOUND => Err(Error::DeviceNotFound {
                device_id: device_id.to_owned(),
            }),
            _ => Err(parse_error(status, resp).await),
        }
    }

    /// Look up a task that is still pending. `None` means the ACS has
    /// completed the task and removed it.
    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, Error> {
        let mut tasks: Vec<TaskRecord> = self.query("tasks", &json!({ "_id": task_id })).await?;
        Ok(if tasks.is_empty() {
            None
        } else {
            Some(tasks.swap_remove(0))
        })
    }

    /// Remove a queued task. Unknown ids are not an error.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["tasks", task_id]);
        debug!("DELETE {url}");

        let resp = self.authorize(self.http.delete(url)).send().await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(parse_error(status, resp).await)
        }
    }

    // ── Faults ───────────────────────────────────────────────────────

    /// All faults currently recorded for a device.
    pub async fn list_faults(&self, device_id: &str) -> Result<Vec<FaultRecord>, Error> {
        self.query("faults", &json!({ "device": device_id })).await
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.text().await?;
        decode(&body)
    } else {
        Err(parse_error(status, resp).await)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    })
}

async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Error::Authentication {
            message: status.to_string(),
        };
    }

    let raw = resp.text().await.unwrap_or_default();
    Error::Nbi {
        status: status.as_u16(),
        message: if raw.is_empty() {
            status.to_string()
        } else {
            raw
        },
    }
}
