//! Room (directory) command handlers.

use std::sync::Arc;

use tabled::Tabled;

use roomtrack_core::{DeviceRecord, DirectoryManager, MutationKind, Tracker};

use crate::cli::{GlobalOpts, RoomsArgs, RoomsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Device ID")]
    device_id: String,
}

impl From<&Arc<DeviceRecord>> for RoomRow {
    fn from(r: &Arc<DeviceRecord>) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            device_id: r.device_id.clone(),
        }
    }
}

fn detail(r: &Arc<DeviceRecord>) -> String {
    [
        format!("ID:        {}", r.id),
        format!("Name:      {}", r.name),
        format!("Device ID: {}", r.device_id),
    ]
    .join("\n")
}

fn print_record(record: &Arc<DeviceRecord>, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(global.output, record, detail, |r| r.id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn notify(kind: MutationKind, global: &GlobalOpts) {
    if !global.quiet {
        eprintln!("{}", kind.success_message());
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    tracker: &Tracker,
    args: RoomsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let directory = tracker.directory();
    match args.command {
        RoomsCommand::List => {
            let rooms = directory.list().await?;
            let out = output::render_list(
                global.output,
                rooms.as_slice(),
                |r| RoomRow::from(r),
                |r| r.id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RoomsCommand::Get { id } => {
            directory.list().await?;
            let record = directory
                .get(&id)
                .ok_or(CliError::NotFound { identifier: id })?;
            print_record(&record, global)
        }

        RoomsCommand::Add { name, device_id } => {
            let created = directory.create(&name, &device_id).await?;
            notify(MutationKind::Create, global);
            if let Some(record) = created {
                print_record(&record, global)?;
            }
            Ok(())
        }

        RoomsCommand::Edit {
            id,
            name,
            device_id,
        } => {
            let updated = edit(directory, &id, name, device_id).await?;
            notify(MutationKind::Update, global);
            if let Some(record) = updated {
                print_record(&record, global)?;
            }
            Ok(())
        }

        RoomsCommand::Rm { id } => {
            directory.list().await?;
            let label = directory
                .get(&id)
                .map_or_else(|| id.clone(), |r| format!("{} ({})", r.name, r.id));
            if !util::confirm(&format!("Delete room {label}?"), "rooms rm", global.yes)? {
                return Ok(());
            }
            directory.remove(&id).await?;
            notify(MutationKind::Delete, global);
            Ok(())
        }
    }
}

/// Load the record into the draft, patch the given fields, submit.
async fn edit(
    directory: &DirectoryManager,
    id: &str,
    name: Option<String>,
    device_id: Option<String>,
) -> Result<Option<Arc<DeviceRecord>>, CliError> {
    directory.list().await?;
    directory.begin_edit(id)?;
    if let Some(name) = name {
        directory.set_name(name);
    }
    if let Some(device_id) = device_id {
        directory.set_device_id(device_id);
    }
    Ok(directory.submit().await?)
}
