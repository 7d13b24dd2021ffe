//! # Admission Subcommand
//!
//! - `admit`: open an admission in an available room.
//! - `transfer`: edit an admission, moving the patient when `--room` differs.
//! - `discharge`: close an open admission now.
//! - `delete`: remove an admission.
//! - `show`: print one admission.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use hms_core::{Admission, AdmissionChanges, AdmissionId, PatientId, RoomId};
use hms_store::ResourceStore;
use serde_json::json;

use crate::Session;

/// Arguments for the `hms admission` subcommand.
#[derive(Args, Debug)]
pub struct AdmissionArgs {
    #[command(subcommand)]
    pub command: AdmissionCommand,
}

/// Admission subcommands.
#[derive(Subcommand, Debug)]
pub enum AdmissionCommand {
    /// Admit a patient into an available room.
    Admit {
        #[arg(long)]
        patient: i64,
        #[arg(long)]
        room: i64,
        /// Admission time (RFC 3339). Defaults to now.
        #[arg(long)]
        admitted_on: Option<DateTime<Utc>>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Edit an admission. A different --room transfers an open admission.
    Transfer {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        patient: Option<i64>,
        #[arg(long)]
        room: Option<i64>,
        #[arg(long)]
        admitted_on: Option<DateTime<Utc>>,
        /// Replacement notes. Pass an empty string to clear them.
        #[arg(long)]
        notes: Option<String>,
    },

    /// Discharge an open admission.
    Discharge {
        #[arg(long)]
        id: i64,
    },

    /// Delete an admission, releasing its room if it was open.
    Delete {
        #[arg(long)]
        id: i64,
    },

    /// Show one admission.
    Show {
        #[arg(long)]
        id: i64,
    },
}

/// Execute a `hms admission` subcommand.
pub async fn run_admission<S: ResourceStore>(
    args: &AdmissionArgs,
    session: &Session<S>,
) -> Result<u8> {
    let service = &session.service;
    let actor = &session.actor;
    match &args.command {
        AdmissionCommand::Admit {
            patient,
            room,
            admitted_on,
            notes,
        } => {
            let result = service
                .admit(
                    actor,
                    PatientId(*patient),
                    RoomId(*room),
                    admitted_on.unwrap_or_else(Utc::now),
                    notes.as_deref(),
                )
                .await
                .map(|id| json!({ "id": id }));
            session.finish(result, |v| format!("OK: admitted as admission {}", v["id"]))
        }
        AdmissionCommand::Transfer {
            id,
            patient,
            room,
            admitted_on,
            notes,
        } => {
            let changes = AdmissionChanges {
                patient_id: patient.map(PatientId),
                room_id: room.map(RoomId),
                admitted_on: *admitted_on,
                notes: notes.clone(),
            };
            let result = service.transfer(actor, AdmissionId(*id), changes).await;
            session.finish(result, |adm| format!("OK: {}", describe(adm)))
        }
        AdmissionCommand::Discharge { id } => {
            let result = service.discharge(actor, AdmissionId(*id)).await;
            session.finish(result, |adm| format!("OK: discharged {}", describe(adm)))
        }
        AdmissionCommand::Delete { id } => {
            let result = service
                .delete_admission(actor, AdmissionId(*id))
                .await
                .map(|()| json!({ "deleted": id }));
            session.finish(result, |_| format!("OK: deleted admission:{id}"))
        }
        AdmissionCommand::Show { id } => {
            let result = service.admission(AdmissionId(*id)).await;
            session.finish(result, describe)
        }
    }
}

/// One-line summary of an admission.
pub fn describe(adm: &Admission) -> String {
    let state = match adm.discharged_on {
        Some(at) => format!("discharged {}", at.to_rfc3339()),
        None => "open".to_string(),
    };
    format!(
        "{} {} in {} admitted {} ({state})",
        adm.id,
        adm.patient_id,
        adm.room_id,
        adm.admitted_on.to_rfc3339()
    )
}
