//! # Room Subcommand
//!
//! - `create`: add a room, available unless `--status maintenance`.
//! - `update`: overwrite number, type and status.
//! - `delete`: remove a room and its closed admission history.
//! - `show`: print one room.
//! - `available`: list rooms that can take an admission.

use anyhow::Result;
use clap::{Args, Subcommand};
use hms_core::{Room, RoomId, RoomStatus};
use hms_store::ResourceStore;
use serde_json::json;

use crate::Session;

/// Arguments for the `hms room` subcommand.
#[derive(Args, Debug)]
pub struct RoomArgs {
    #[command(subcommand)]
    pub command: RoomCommand,
}

/// Room subcommands.
#[derive(Subcommand, Debug)]
pub enum RoomCommand {
    /// Create a room.
    Create {
        /// Room number, unique across rooms.
        #[arg(long)]
        number: String,
        /// Room type (General, Private, ICU, Emergency, Maternity, ...).
        #[arg(long = "type")]
        room_type: Option<String>,
        /// Initial status: available or maintenance.
        #[arg(long, default_value = "available")]
        status: RoomStatus,
    },

    /// Overwrite a room's number, type and status.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        number: String,
        #[arg(long = "type")]
        room_type: Option<String>,
        /// New status; must agree with the room's open admissions.
        #[arg(long)]
        status: RoomStatus,
    },

    /// Delete a room without open admissions.
    Delete {
        #[arg(long)]
        id: i64,
    },

    /// Show one room.
    Show {
        #[arg(long)]
        id: i64,
    },

    /// List rooms available for admission.
    Available,
}

/// Execute a `hms room` subcommand.
pub async fn run_room<S: ResourceStore>(args: &RoomArgs, session: &Session<S>) -> Result<u8> {
    let service = &session.service;
    let actor = &session.actor;
    match &args.command {
        RoomCommand::Create {
            number,
            room_type,
            status,
        } => {
            let result = service
                .create_room_with_status(actor, number, room_type.as_deref(), *status)
                .await
                .map(|id| json!({ "id": id }));
            session.finish(result, |v| format!("OK: created room {}", v["id"]))
        }
        RoomCommand::Update {
            id,
            number,
            room_type,
            status,
        } => {
            let result = service
                .update_room(actor, RoomId(*id), number, room_type.as_deref(), *status)
                .await;
            session.finish(result, |room| format!("OK: updated {}", describe(room)))
        }
        RoomCommand::Delete { id } => {
            let result = service
                .delete_room(actor, RoomId(*id))
                .await
                .map(|()| json!({ "deleted": id }));
            session.finish(result, |_| format!("OK: deleted room:{id}"))
        }
        RoomCommand::Show { id } => {
            let result = service.room(RoomId(*id)).await;
            session.finish(result, describe)
        }
        RoomCommand::Available => {
            let result = service.available_rooms().await;
            session.finish(result, |rooms| {
                if rooms.is_empty() {
                    return "No rooms available.".to_string();
                }
                rooms.iter().map(describe).collect::<Vec<_>>().join("\n")
            })
        }
    }
}

/// One-line summary of a room.
pub fn describe(room: &Room) -> String {
    format!(
        "{} number={} type={} status={}",
        room.id,
        room.room_number,
        room.room_type.as_deref().unwrap_or("-"),
        room.status
    )
}
