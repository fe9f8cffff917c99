//! `set`: preview, confirm, submit, and follow a change to its outcome.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::Tabled;
use tracing::debug;

use acsbridge_core::{ChangeEntry, FaultKind, KeyOutcome, KeyState, SkippedKey, SyncState, SyncStatus};

use crate::cli::{GlobalOpts, OutputFormat, SetArgs};
use crate::config::Config;
use crate::error::CliError;
use crate::output;

use super::{Service, util};

// ── Row types ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct PreviewRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "New value")]
    value: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&ChangeEntry> for PreviewRow {
    fn from(e: &ChangeEntry) -> Self {
        Self {
            key: e.key.to_string(),
            value: e.intended.to_string(),
            path: e.path.clone(),
        }
    }
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl OutcomeRow {
    fn new(k: &KeyOutcome, color: bool) -> Self {
        Self {
            key: k.key.to_string(),
            value: output::or_dash(k.intended.as_ref()),
            state: output::key_state_label(&k.state, color),
            path: output::or_dash(k.path.as_deref()),
        }
    }
}

fn print_skipped(skipped: &[SkippedKey], color: bool) {
    for s in skipped {
        let line = format!("skipped {}: {}", s.key, s.reason);
        if color {
            eprintln!("{}", line.yellow());
        } else {
            eprintln!("{line}");
        }
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(
    service: &Service,
    args: SetArgs,
    global: &GlobalOpts,
    config: &Config,
) -> Result<(), CliError> {
    let device = util::device_id(&args.device)?;
    let color = output::should_color(&global.color);
    let edited = util::parse_assignments(&args.assignments, service.catalog())?;

    let preview = service.propose_change(&device, &edited).await?;
    if !global.quiet {
        print_skipped(preview.skipped(), color);
    }
    if preview.is_empty() {
        if !global.quiet {
            eprintln!("Nothing to change on {device}");
        }
        return Ok(());
    }

    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        let rows: Vec<PreviewRow> = preview.entries().iter().map(PreviewRow::from).collect();
        eprintln!("{}", output::render_table(&rows));
    }

    let prompt = format!("Apply {} change(s) to {device}?", preview.entries().len());
    if !util::confirm(&prompt, global.yes)? {
        return Ok(());
    }

    let wake = args.wake_flag().unwrap_or(config.defaults.wake);
    let attempt = service.submit_change(&device, preview, wake).await?;
    debug!(%attempt, %device, wake, "change submitted");

    let status = if args.no_wait {
        wait_until_accepted(service, attempt).await?
    } else {
        follow(service, attempt, global.quiet).await?
    };

    let out = output::render_list(
        &global.output,
        &status.keys,
        |k| OutcomeRow::new(k, color),
        |k| format!("{}\t{}", k.key, k.state),
    )?;
    output::print_output(&out, global.quiet);

    outcome_error(&status)
}

/// Block until the ACS has taken the task, or the attempt ended.
async fn wait_until_accepted(
    service: &Service,
    attempt: acsbridge_core::SyncAttemptId,
) -> Result<SyncStatus, CliError> {
    let mut rx = service.sync().subscribe(attempt)?;
    let accepted = rx
        .wait_for(|s| s.state == SyncState::AwaitingConfirmation || s.is_terminal())
        .await
        .map(|s| (*s).clone());
    match accepted {
        Ok(status) => Ok(status),
        Err(_) => Ok(service.get_sync_status(attempt)?),
    }
}

/// Follow the attempt to its end, with a spinner on interactive stderr.
async fn follow(
    service: &Service,
    attempt: acsbridge_core::SyncAttemptId,
    quiet: bool,
) -> Result<SyncStatus, CliError> {
    let mut rx = service.sync().subscribe(attempt)?;
    let spinner = (!quiet).then(new_spinner);

    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(ref pb) = spinner {
            pb.set_message(spinner_message(&current));
        }
        if current.is_terminal() {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    Ok(service.wait(attempt).await?)
}

fn new_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn spinner_message(status: &SyncStatus) -> String {
    match status.state {
        SyncState::Idle | SyncState::Submitting => "Sending change to the ACS...".into(),
        SyncState::Failed | SyncState::Retrying => {
            format!("Retrying (attempt {})...", status.attempts_made + 1)
        }
        SyncState::AwaitingConfirmation => "Waiting for the device to report the new values...".into(),
        SyncState::Confirmed | SyncState::Abandoned => status.state.to_string(),
    }
}

/// Non-zero exit for anything short of every key applied.
fn outcome_error(status: &SyncStatus) -> Result<(), CliError> {
    if status.state == SyncState::Abandoned {
        let fault = status.last_error.as_ref();
        if let Some(f) = fault.filter(|f| f.kind == FaultKind::ProtocolFault) {
            return Err(CliError::Rejected {
                code: f.code.clone().unwrap_or_else(|| "-".into()),
                message: f.message.clone(),
            });
        }
        return Err(CliError::Abandoned {
            attempt: status.attempt_id.to_string(),
            reason: fault.map_or_else(|| "cancelled".into(), |f| f.message.clone()),
        });
    }

    let drifted = status
        .keys
        .iter()
        .filter(|k| matches!(k.state, KeyState::DriftDetected { .. }))
        .count();
    if drifted > 0 {
        return Err(CliError::Drift { count: drifted });
    }
    let waiting = status
        .keys
        .iter()
        .filter(|k| k.state == KeyState::Unconfirmed)
        .count();
    if waiting > 0 {
        return Err(CliError::Unconfirmed { count: waiting });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use acsbridge_core::{DeviceId, Fault, LogicalKey, SyncAttemptId};
    use chrono::Utc;

    fn status(state: SyncState, keys: Vec<KeyState>, last_error: Option<Fault>) -> SyncStatus {
        SyncStatus {
            attempt_id: SyncAttemptId::new(),
            device_id: DeviceId::from("dev"),
            state,
            attempts_made: 1,
            last_error,
            task_id: None,
            keys: keys
                .into_iter()
                .enumerate()
                .map(|(i, state)| KeyOutcome {
                    key: LogicalKey::from(format!("k{i}")),
                    path: None,
                    intended: None,
                    wire_value: None,
                    state,
                })
                .collect(),
            started_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn all_applied_is_success() {
        let s = status(SyncState::Confirmed, vec![KeyState::Applied, KeyState::Applied], None);
        assert!(outcome_error(&s).is_ok());
    }

    #[test]
    fn drift_counts_keys() {
        let s = status(
            SyncState::Confirmed,
            vec![KeyState::Applied, KeyState::DriftDetected { observed: None }],
            None,
        );
        assert!(matches!(outcome_error(&s), Err(CliError::Drift { count: 1 })));
    }

    #[test]
    fn task_left_queued_is_unconfirmed() {
        let s = status(SyncState::Confirmed, vec![KeyState::Unconfirmed], None);
        let err = outcome_error(&s).unwrap_err();
        assert!(matches!(err, CliError::Unconfirmed { count: 1 }));
        assert_eq!(err.exit_code(), crate::error::exit_code::CONFLICT);
    }

    #[test]
    fn device_fault_surfaces_its_code() {
        let fault = Fault {
            kind: FaultKind::ProtocolFault,
            code: Some("9007".into()),
            message: "Invalid parameter value".into(),
        };
        let s = status(SyncState::Abandoned, vec![KeyState::Rejected], Some(fault));
        let err = outcome_error(&s).unwrap_err();
        assert!(matches!(err, CliError::Rejected { ref code, .. } if code == "9007"));
    }

    #[test]
    fn transport_exhaustion_is_abandoned() {
        let fault = Fault {
            kind: FaultKind::Transport,
            code: None,
            message: "connection refused".into(),
        };
        let s = status(SyncState::Abandoned, vec![KeyState::Unconfirmed], Some(fault));
        assert!(matches!(outcome_error(&s), Err(CliError::Abandoned { .. })));
    }
}
