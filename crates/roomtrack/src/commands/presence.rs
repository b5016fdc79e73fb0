//! Presence command handlers.

use std::sync::Arc;

use tabled::Tabled;

use roomtrack_core::view::{self, LocationGroup};
use roomtrack_core::{PresenceRecord, PresenceSnapshot, Tracker};

use crate::cli::{GlobalOpts, OutputFormat, PresenceArgs, PresenceCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PresenceRow {
    #[tabled(rename = "Device ID")]
    device_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl PresenceRow {
    fn new(r: &PresenceRecord, color: bool) -> Self {
        Self {
            device_id: r.device_id.clone(),
            name: r.name.clone(),
            status: output::status_label(r.status, color),
            location: r.location_label().to_owned(),
            last_seen: util::format_time(r.last_seen),
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────────

/// Render a snapshot flat or grouped by location.
pub(crate) fn render_snapshot(
    snapshot: &PresenceSnapshot,
    grouped: bool,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let color = output::should_color(global.color);
    if !grouped {
        let records = view::flat_list(snapshot);
        return output::render_list(
            global.output,
            &records,
            |r| PresenceRow::new(r, color),
            |r| r.device_id.clone(),
        );
    }

    let groups = view::group_by_location(snapshot);
    match global.output {
        OutputFormat::Table => Ok(groups
            .iter()
            .map(|g| group_table(g, color))
            .collect::<Vec<_>>()
            .join("\n\n")),
        OutputFormat::Plain => Ok(groups
            .iter()
            .flat_map(|g| {
                g.records
                    .iter()
                    .map(move |r| format!("{}\t{}", g.location, r.device_id))
            })
            .collect::<Vec<_>>()
            .join("\n")),
        _ => output::render_single(global.output, &groups, |_| String::new(), |_| String::new()),
    }
}

fn group_table(group: &LocationGroup, color: bool) -> String {
    let rows: Vec<PresenceRow> = group
        .records
        .iter()
        .map(|r| PresenceRow::new(r, color))
        .collect();
    format!(
        "{} ({})\n{}",
        output::heading(&group.location, color),
        group.records.len(),
        output::render_table(&rows)
    )
}

fn summary_line(snapshot: &PresenceSnapshot) -> String {
    let summary = view::summarize(snapshot);
    format!(
        "{} devices, {} online, {} offline (received {})",
        summary.total,
        summary.online,
        summary.offline,
        util::format_time(snapshot.received_at())
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    tracker: &Tracker,
    args: PresenceArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PresenceCommand::Show {
            group_by_room,
            wait,
        } => {
            let snapshot = util::first_snapshot(tracker, wait).await?;
            let out = render_snapshot(&snapshot, group_by_room, global)?;
            output::print_output(&out, global.quiet);
            if !global.quiet && global.output == OutputFormat::Table {
                eprintln!("{}", summary_line(&snapshot));
            }
            tracker.presence().disconnect().await;
            Ok(())
        }

        PresenceCommand::Watch { group_by_room } => watch(tracker, group_by_room, global).await,
    }
}

/// Re-render on every snapshot and report channel state changes on
/// stderr until Ctrl-C.
async fn watch(tracker: &Tracker, grouped: bool, global: &GlobalOpts) -> Result<(), CliError> {
    let presence = tracker.presence();
    let mut stream = presence.subscribe();
    let mut status = presence.subscribe_status();
    presence.connect().await?;

    if !global.quiet {
        eprintln!(
            "Watching presence at {} (Ctrl-C to stop)",
            tracker.config().socket_url
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = stream.changed() => {
                let Some(snapshot) = next else { break };
                print_frame(&snapshot, grouped, global)?;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                if global.quiet {
                    continue;
                }
                if let Some(ref err) = current.last_error {
                    eprintln!("! {err}");
                } else if current.connected {
                    eprintln!("connected");
                } else if current.stale {
                    eprintln!("disconnected; showing last known presence");
                }
            }
        }
    }

    tracing::debug!("presence watch stopped");
    Ok(())
}

fn print_frame(
    snapshot: &Arc<PresenceSnapshot>,
    grouped: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = render_snapshot(snapshot, grouped, global)?;
    if global.output == OutputFormat::Table && !global.quiet {
        println!("{}", output::heading(&summary_line(snapshot), output::should_color(global.color)));
    }
    output::print_output(&out, global.quiet);
    Ok(())
}
