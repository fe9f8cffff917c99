// ── Core error types ──
//
// Domain errors for acsbridge-core. Consumers never see HTTP status codes
// or raw JSON failures; `From<acsbridge_api::Error>` translates
// transport-layer errors into these variants, and `fault::classify`
// attaches a retry decision to them.

use thiserror::Error;

use crate::model::{DeviceId, SnapshotVersion};
use crate::sync::SyncAttemptId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device / ACS errors ──────────────────────────────────────────
    #[error("Device not found on ACS: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Device {device_id} is not reachable: {reason}")]
    DeviceUnreachable { device_id: String, reason: String },

    #[error("ACS transport error: {message}")]
    Transport { message: String },

    #[error("ACS request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device rejected the operation ({code}): {message}")]
    ProtocolFault { code: String, message: String },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Unknown logical key: {key}")]
    UnknownKey { key: String },

    // ── Synchronization errors ───────────────────────────────────────
    #[error("Device {device_id} already has a sync attempt in flight ({attempt_id})")]
    Busy {
        device_id: DeviceId,
        attempt_id: SyncAttemptId,
    },

    #[error(
        "Preview for {device_id} was built from snapshot {preview}, but {current} is newer; propose the change again"
    )]
    StalePreview {
        device_id: DeviceId,
        preview: SnapshotVersion,
        current: SnapshotVersion,
    },

    #[error("Unknown sync attempt: {attempt_id}")]
    UnknownAttempt { attempt_id: SyncAttemptId },

    #[error("Device mismatch: expected {expected}, got {got}")]
    DeviceMismatch { expected: String, got: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<acsbridge_api::Error> for CoreError {
    fn from(err: acsbridge_api::Error) -> Self {
        match err {
            acsbridge_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            acsbridge_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::Transport {
                        message: e.to_string(),
                    }
                }
            }
            acsbridge_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid NBI URL: {e}"),
            },
            acsbridge_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            acsbridge_api::Error::Tls(msg) => CoreError::Transport {
                message: format!("TLS error: {msg}"),
            },
            acsbridge_api::Error::DeviceNotFound { device_id } => {
                CoreError::DeviceNotFound { device_id }
            }
            acsbridge_api::Error::Nbi { status, message } => match status {
                400 => CoreError::Validation { message },
                500..=599 => CoreError::Transport {
                    message: format!("NBI returned HTTP {status}: {message}"),
                },
                _ => CoreError::Internal(format!("NBI returned HTTP {status}: {message}")),
            },
            acsbridge_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Unexpected NBI response: {message}"))
            }
        }
    }
}
