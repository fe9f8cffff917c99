//! Shared helpers for command handlers.

use std::io::{self, IsTerminal};

use acsbridge_core::{DeviceId, LogicalKey, LogicalValues, PathCatalog, codec};

use crate::error::CliError;

pub fn device_id(raw: &str) -> Result<DeviceId, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::Validation {
            field: "device".into(),
            reason: "device ID cannot be empty".into(),
        });
    }
    Ok(DeviceId::from(trimmed))
}

/// Parse `key=value` assignments into typed logical values.
///
/// Values are checked against the key's wire type and allowed set here, so
/// a typo fails before anything is fetched from the ACS.
pub fn parse_assignments(assignments: &[String], catalog: &PathCatalog) -> Result<LogicalValues, CliError> {
    let mut values = LogicalValues::new();
    for raw in assignments {
        let Some((key, value)) = raw.split_once('=') else {
            return Err(CliError::Validation {
                field: raw.clone(),
                reason: "expected KEY=VALUE".into(),
            });
        };
        let key = key.trim();
        let entry = catalog
            .get(key)
            .ok_or_else(|| CliError::UnknownKey { key: key.into() })?;
        if !entry.is_writable() {
            return Err(CliError::Validation {
                field: key.into(),
                reason: "setting is read-only".into(),
            });
        }
        let parsed = codec::parse_input(value, &entry.value).map_err(|e| CliError::Validation {
            field: key.into(),
            reason: e.to_string(),
        })?;
        values.insert(LogicalKey::from(key), parsed);
    }
    Ok(values)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(io::Error::other(e)))
}
