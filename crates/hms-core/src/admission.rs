//! # Admissions
//!
//! An admission places one patient in one room. It is *open* while
//! `discharged_on` is `None`; an open admission is what makes its room
//! occupied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AdmissionId, PatientId, RoomId};

/// A persisted admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub id: AdmissionId,
    pub patient_id: PatientId,
    pub room_id: RoomId,
    pub admitted_on: DateTime<Utc>,
    /// `None` while the patient still occupies the room.
    pub discharged_on: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Admission {
    /// Whether the patient still occupies the room.
    pub fn is_open(&self) -> bool {
        self.discharged_on.is_none()
    }
}

/// Fields for an admission that has not been stored yet. New admissions are
/// always open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdmission {
    pub patient_id: PatientId,
    pub room_id: RoomId,
    pub admitted_on: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewAdmission {
    /// Materialize the stored record once the store has assigned an id.
    pub fn into_admission(self, id: AdmissionId) -> Admission {
        Admission {
            id,
            patient_id: self.patient_id,
            room_id: self.room_id,
            admitted_on: self.admitted_on,
            discharged_on: None,
            notes: self.notes,
        }
    }
}

/// Edit to an existing admission. `None` keeps the stored value, resolved
/// against the row as it stands once locked.
///
/// `room_id` is the requested room; for an open admission a different room
/// is a transfer. Blank `notes` clear the stored notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionChanges {
    pub patient_id: Option<PatientId>,
    pub room_id: Option<RoomId>,
    pub admitted_on: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl AdmissionChanges {
    /// Move the patient to `room`, keeping every other field.
    pub fn move_to(room: RoomId) -> Self {
        Self {
            room_id: Some(room),
            ..Self::default()
        }
    }

    /// The admission as it reads with these changes applied to `current`.
    pub fn apply_to(&self, current: &Admission) -> Admission {
        Admission {
            patient_id: self.patient_id.unwrap_or(current.patient_id),
            room_id: self.room_id.unwrap_or(current.room_id),
            admitted_on: self.admitted_on.unwrap_or(current.admitted_on),
            notes: match &self.notes {
                Some(notes) => Some(notes.clone()).filter(|n| !n.is_empty()),
                None => current.notes.clone(),
            },
            ..current.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn new_admission_materializes_open() {
        let new = NewAdmission {
            patient_id: PatientId(1),
            room_id: RoomId(4),
            admitted_on: t0(),
            notes: Some("observation".into()),
        };
        let adm = new.into_admission(AdmissionId(10));
        assert_eq!(adm.id, AdmissionId(10));
        assert_eq!(adm.room_id, RoomId(4));
        assert!(adm.is_open());
    }

    #[test]
    fn discharged_admission_is_closed() {
        let adm = Admission {
            id: AdmissionId(1),
            patient_id: PatientId(1),
            room_id: RoomId(1),
            admitted_on: t0(),
            discharged_on: Some(t0()),
            notes: None,
        };
        assert!(!adm.is_open());
    }

    #[test]
    fn changes_keep_unspecified_fields() {
        let current = Admission {
            id: AdmissionId(3),
            patient_id: PatientId(8),
            room_id: RoomId(2),
            admitted_on: t0(),
            discharged_on: None,
            notes: Some("fall risk".into()),
        };
        let moved = AdmissionChanges::move_to(RoomId(5)).apply_to(&current);
        assert_eq!(moved.room_id, RoomId(5));
        assert_eq!(moved.patient_id, PatientId(8));
        assert_eq!(moved.notes.as_deref(), Some("fall risk"));

        let cleared = AdmissionChanges {
            notes: Some(String::new()),
            ..AdmissionChanges::default()
        }
        .apply_to(&current);
        assert_eq!(cleared.room_id, RoomId(2));
        assert_eq!(cleared.notes, None);
    }
}
