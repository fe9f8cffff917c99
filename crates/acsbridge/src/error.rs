//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use acsbridge_config::ConfigError;
use acsbridge_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const REJECTED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the ACS: {message}")]
    #[diagnostic(
        code(acsbridge::connection_failed),
        help(
            "Check that the NBI is running and reachable (GenieACS listens on :7557 by default).\n\
             Use --insecure (-k) for self-signed certificates."
        )
    )]
    ConnectionFailed { message: String },

    #[error("Device {device} is not reachable: {reason}")]
    #[diagnostic(
        code(acsbridge::device_unreachable),
        help("Retry with --no-wake to queue the change for the device's next inform.")
    )]
    DeviceUnreachable { device: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(acsbridge::auth_failed),
        help("Verify the NBI credentials. Run: acsbridge config set-password --profile {profile}")
    )]
    AuthFailed { profile: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(acsbridge::no_credentials),
        help(
            "Store one with: acsbridge config set-password\n\
             Or set ACSBRIDGE_PASSWORD, or remove the username from the profile."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(acsbridge::not_found),
        help("Run: acsbridge {list_command}")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Sync ─────────────────────────────────────────────────────────
    #[error("Device {device} already has a change in flight")]
    #[diagnostic(
        code(acsbridge::busy),
        help("Wait for the running attempt ({attempt}) to finish, then try again.")
    )]
    Busy { device: String, attempt: String },

    #[error("The device changed while the preview was open")]
    #[diagnostic(code(acsbridge::stale_preview), help("Run the command again to rebuild the preview."))]
    StalePreview,

    #[error("Device rejected the change ({code}): {message}")]
    #[diagnostic(code(acsbridge::rejected))]
    Rejected { code: String, message: String },

    #[error("Sync attempt {attempt} was abandoned: {reason}")]
    #[diagnostic(code(acsbridge::abandoned))]
    Abandoned { attempt: String, reason: String },

    #[error("{count} setting(s) did not take effect on the device")]
    #[diagnostic(
        code(acsbridge::drift),
        help("The device accepted the task but still reports the old value. Check firmware restrictions or catalog overrides.")
    )]
    Drift { count: usize },

    #[error("{count} setting(s) still waiting for the device")]
    #[diagnostic(
        code(acsbridge::unconfirmed),
        help("The task stays queued on the ACS and runs at the device's next inform. Check again later with `acsbridge values`.")
    )]
    Unconfirmed { count: usize },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(acsbridge::validation))]
    Validation { field: String, reason: String },

    #[error("Unknown setting '{key}'")]
    #[diagnostic(code(acsbridge::unknown_key), help("Run: acsbridge catalog"))]
    UnknownKey { key: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(acsbridge::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: acsbridge config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No ACS configured")]
    #[diagnostic(
        code(acsbridge::no_config),
        help(
            "Create a profile with: acsbridge config init\n\
             Or pass --nbi-url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(acsbridge::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(acsbridge::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(acsbridge::timeout),
        help("Increase timeout with --timeout or check ACS responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Internal / IO / Serialization ────────────────────────────────
    #[error("Unexpected error: {0}")]
    #[diagnostic(code(acsbridge::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::DeviceUnreachable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } | Self::UnknownKey { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Busy { .. } | Self::StalePreview | Self::Drift { .. } | Self::Unconfirmed { .. } => {
                exit_code::CONFLICT
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceNotFound { device_id } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: device_id,
                list_command: "config show".into(),
            },
            CoreError::DeviceUnreachable { device_id, reason } => CliError::DeviceUnreachable {
                device: device_id,
                reason,
            },
            CoreError::Transport { message } => CliError::ConnectionFailed { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::AuthenticationFailed { message: _ } => CliError::AuthFailed {
                profile: "current".into(),
            },
            CoreError::ProtocolFault { code, message } => CliError::Rejected { code, message },
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::UnknownKey { key } => CliError::UnknownKey { key },
            CoreError::Busy {
                device_id,
                attempt_id,
            } => CliError::Busy {
                device: device_id.to_string(),
                attempt: attempt_id.to_string(),
            },
            CoreError::StalePreview { .. } => CliError::StalePreview,
            CoreError::UnknownAttempt { attempt_id } => CliError::NotFound {
                resource_type: "sync attempt".into(),
                identifier: attempt_id.to_string(),
                list_command: "set --help".into(),
            },
            CoreError::DeviceMismatch { expected, got } => {
                CliError::Internal(format!("preview for {got} submitted to {expected}"))
            }
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_faults_keep_their_code() {
        let err = CliError::from(CoreError::ProtocolFault {
            code: "9007".into(),
            message: "Invalid parameter value".into(),
        });
        assert_eq!(err.exit_code(), exit_code::REJECTED);
        assert!(err.to_string().contains("9007"));
    }

    #[test]
    fn missing_password_is_an_auth_error() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "lab".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
