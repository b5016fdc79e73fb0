//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use roomtrack_core::{PresenceSnapshot, Tracker};

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Open the presence channel and wait for the first snapshot.
///
/// On timeout, the channel's last error (if any) is reported instead of a
/// bare timeout.
pub async fn first_snapshot(
    tracker: &Tracker,
    wait_secs: u64,
) -> Result<std::sync::Arc<PresenceSnapshot>, CliError> {
    let presence = tracker.presence();
    let mut stream = presence.subscribe();
    presence.connect().await?;

    match tokio::time::timeout(Duration::from_secs(wait_secs), stream.changed()).await {
        Ok(Some(snapshot)) => Ok(snapshot),
        Ok(None) => Err(CliError::Internal("presence reconciler dropped".into())),
        Err(_) => match presence.status().last_error {
            Some(message) => Err(CliError::Presence { message }),
            None => Err(CliError::PresenceTimeout {
                seconds: wait_secs,
                url: tracker.config().socket_url.to_string(),
            }),
        },
    }
}

/// Local wall-clock rendering of a timestamp, `-` when absent.
pub fn format_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "-".into(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
