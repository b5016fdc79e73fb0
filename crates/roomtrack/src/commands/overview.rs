//! Directory joined with live presence.

use tabled::Tabled;

use roomtrack_core::{Reconciliation, Tracker};

use crate::cli::{GlobalOpts, OverviewArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct OverviewRow {
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Device ID")]
    device_id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

fn rows(rec: &Reconciliation, color: bool) -> Vec<OverviewRow> {
    let paired = rec.paired.iter().map(|p| OverviewRow {
        state: "paired".into(),
        room: p.device.name.clone(),
        device_id: p.device.device_id.clone(),
        status: output::status_label(p.presence.status, color),
        location: p.presence.location_label().to_owned(),
        last_seen: util::format_time(p.presence.last_seen),
    });
    let unseen = rec.unseen.iter().map(|d| OverviewRow {
        state: "unseen".into(),
        room: d.name.clone(),
        device_id: d.device_id.clone(),
        status: "-".into(),
        location: "-".into(),
        last_seen: "-".into(),
    });
    let orphans = rec.orphans.iter().map(|r| OverviewRow {
        state: "unregistered".into(),
        room: format!("({})", r.name),
        device_id: r.device_id.clone(),
        status: output::status_label(r.status, color),
        location: r.location_label().to_owned(),
        last_seen: util::format_time(r.last_seen),
    });
    paired.chain(unseen).chain(orphans).collect()
}

fn plain(rec: &Reconciliation) -> String {
    rec.paired
        .iter()
        .map(|p| format!("paired\t{}", p.device.device_id))
        .chain(rec.unseen.iter().map(|d| format!("unseen\t{}", d.device_id)))
        .chain(
            rec.orphans
                .iter()
                .map(|r| format!("unregistered\t{}", r.device_id)),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(
    tracker: &Tracker,
    args: &OverviewArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut stream = tracker.presence().subscribe();
    tracker.mount().await?;

    let waited =
        tokio::time::timeout(std::time::Duration::from_secs(args.wait), stream.changed()).await;
    if waited.is_err() && !global.quiet {
        eprintln!(
            "No presence snapshot within {}s; every room is shown as unseen",
            args.wait
        );
    }

    let rec = tracker.reconciliation();
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &rec,
        |r| output::render_table(&rows(r, color)),
        plain,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
