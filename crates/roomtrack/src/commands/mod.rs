//! Command dispatch: bridges CLI args -> core tracker -> output formatting.

pub mod config_cmd;
pub mod overview;
pub mod presence;
pub mod rooms;
pub mod util;

use roomtrack_core::Tracker;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
///
/// The tracker is always unmounted afterwards, including on error.
pub async fn dispatch(cmd: Command, tracker: &Tracker, global: &GlobalOpts) -> Result<(), CliError> {
    let result = match cmd {
        Command::Rooms(args) => rooms::handle(tracker, args, global).await,
        Command::Presence(args) => presence::handle(tracker, args, global).await,
        Command::Overview(args) => overview::handle(tracker, &args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to the backend dispatcher".into(),
        )),
    };
    tracker.unmount().await;
    result
}
