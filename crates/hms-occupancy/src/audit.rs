//! # Occupancy Audit
//!
//! Reads one consistent committed snapshot and reports every place where
//! stored data breaks the occupancy rule: a room whose status disagrees with
//! its open admissions, or an open admission whose room no longer exists.
//! The audit never repairs anything.

use std::collections::BTreeMap;
use std::fmt;

use hms_core::{AdmissionId, RoomId, RoomStatus};
use hms_store::{OccupancySnapshot, ResourceStore};
use serde::Serialize;

use crate::consistency::{can_set_status, settled_status};
use crate::error::OccupancyError;

/// One broken occupancy fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The room's status is illegal for its open admissions.
    StatusMismatch {
        room: RoomId,
        room_number: String,
        status: RoomStatus,
        open_admissions: Vec<AdmissionId>,
        /// Status the room should carry, when a single one is legal.
        expected: Option<RoomStatus>,
    },
    /// An open admission references a room that does not exist.
    OrphanAdmission {
        admission: AdmissionId,
        room: RoomId,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusMismatch {
                room,
                room_number,
                status,
                open_admissions,
                expected,
            } => {
                write!(
                    f,
                    "{room} ({room_number:?}) is {status} with {} open admission(s)",
                    open_admissions.len()
                )?;
                if let Some(expected) = expected {
                    write!(f, ", expected {expected}")?;
                }
                Ok(())
            }
            Self::OrphanAdmission { admission, room } => {
                write!(f, "{admission} is open in missing {room}")
            }
        }
    }
}

/// Outcome of an audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub rooms_checked: usize,
    pub open_admissions: usize,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Audit an already-read snapshot.
pub fn audit_snapshot(snapshot: &OccupancySnapshot) -> AuditReport {
    let mut open: BTreeMap<RoomId, Vec<AdmissionId>> = BTreeMap::new();
    for adm in &snapshot.open_admissions {
        open.entry(adm.room_id).or_default().push(adm.id);
    }

    let mut violations = Vec::new();
    for room in &snapshot.rooms {
        let admissions = open.remove(&room.id).unwrap_or_default();
        let count = admissions.len() as u64;
        if !can_set_status(count, room.status) {
            violations.push(Violation::StatusMismatch {
                room: room.id,
                room_number: room.room_number.clone(),
                status: room.status,
                open_admissions: admissions,
                expected: settled_status(count, room.status),
            });
        }
    }
    // Whatever is left references rooms that are gone.
    for (room, admissions) in open {
        for admission in admissions {
            violations.push(Violation::OrphanAdmission { admission, room });
        }
    }

    AuditReport {
        rooms_checked: snapshot.rooms.len(),
        open_admissions: snapshot.open_admissions.len(),
        violations,
    }
}

/// Snapshot `store` and audit it.
pub async fn audit<S: ResourceStore>(store: &S) -> Result<AuditReport, OccupancyError> {
    let snapshot = store.snapshot().await?;
    let report = audit_snapshot(&snapshot);
    for violation in &report.violations {
        tracing::warn!(%violation, "occupancy violation");
    }
    tracing::info!(
        rooms = report.rooms_checked,
        open_admissions = report.open_admissions,
        violations = report.violations.len(),
        "occupancy audit complete"
    );
    Ok(report)
}
