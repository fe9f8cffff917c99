// ── Fault classifier ──
//
// Attaches a retry decision to every error a sync attempt can hit.
// Only transport trouble and unreachable devices are worth retrying;
// anything the device or the input is responsible for is terminal.

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FaultKind {
    /// Network failure or timeout talking to the ACS.
    Transport,
    /// The ACS could not reach the device.
    DeviceUnreachable,
    /// The device answered with a CWMP fault.
    ProtocolFault,
    /// The request itself was invalid.
    Validation,
    /// Everything outside the dispatch taxonomy.
    Other,
}

impl FaultKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transport | Self::DeviceUnreachable)
    }
}

/// A classified failure, as reported in sync status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub kind: FaultKind,
    /// CWMP fault code (e.g. `9007`) when the device supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl Fault {
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

pub fn classify(err: &CoreError) -> Fault {
    let kind = match err {
        CoreError::Transport { .. } | CoreError::Timeout { .. } => FaultKind::Transport,
        CoreError::DeviceUnreachable { .. } => FaultKind::DeviceUnreachable,
        CoreError::ProtocolFault { .. } => FaultKind::ProtocolFault,
        CoreError::Validation { .. } | CoreError::UnknownKey { .. } => FaultKind::Validation,
        CoreError::DeviceNotFound { .. }
        | CoreError::AuthenticationFailed { .. }
        | CoreError::Busy { .. }
        | CoreError::StalePreview { .. }
        | CoreError::UnknownAttempt { .. }
        | CoreError::DeviceMismatch { .. }
        | CoreError::Config { .. }
        | CoreError::Internal(_) => FaultKind::Other,
    };
    // Device faults keep the device's own wording; the code travels separately.
    let (code, message) = match err {
        CoreError::ProtocolFault { code, message } => (Some(code.clone()), message.clone()),
        _ => (None, err.to_string()),
    };
    Fault { kind, code, message }
}
