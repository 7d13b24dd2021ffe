//! # Occupancy Errors
//!
//! One typed error per rejected operation. [`OccupancyError::kind`] folds the
//! variants into the coarse taxonomy callers branch on; only
//! [`ErrorKind::Busy`] is worth retrying.

use hms_core::{AdmissionId, RoomId, RoomStatus, ValidationError};
use hms_store::{StoreError, ROOM_NUMBER_KEY};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of an [`OccupancyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Busy,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Busy => "busy",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }
}

/// Why an occupancy operation was rejected. Every write of the operation has
/// been rolled back by the time the caller sees one.
#[derive(Error, Debug)]
pub enum OccupancyError {
    #[error("{0} not found")]
    RoomNotFound(RoomId),

    #[error("{0} not found")]
    AdmissionNotFound(AdmissionId),

    /// The room's status does not allow a new admission.
    #[error("{room} is not available (status: {status})")]
    RoomNotAvailable { room: RoomId, status: RoomStatus },

    /// The room is marked available but an open admission still references it.
    #[error("{room} already has {open} open admission(s)")]
    RoomAlreadyOccupied { room: RoomId, open: u64 },

    /// A status write would break the status/open-admission agreement.
    #[error("{room} cannot be {requested} with {open} open admission(s)")]
    ConflictingOccupancy {
        room: RoomId,
        requested: RoomStatus,
        open: u64,
    },

    #[error("room number {0:?} is already in use")]
    DuplicateNumber(String),

    /// The room cannot be deleted while a patient occupies it.
    #[error("{room} still has {open} open admission(s)")]
    HasOpenAdmission { room: RoomId, open: u64 },

    #[error("{0} is already discharged")]
    AlreadyDischarged(AdmissionId),

    /// A lock was not granted within the configured wait.
    #[error("{resource} is busy, retry the operation")]
    Busy { resource: String },

    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("store failure: {0}")]
    Store(#[source] StoreError),
}

impl OccupancyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoomNotFound(_) | Self::AdmissionNotFound(_) => ErrorKind::NotFound,
            Self::RoomNotAvailable { .. }
            | Self::RoomAlreadyOccupied { .. }
            | Self::ConflictingOccupancy { .. }
            | Self::DuplicateNumber(_)
            | Self::HasOpenAdmission { .. }
            | Self::AlreadyDischarged(_) => ErrorKind::Conflict,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Busy
    }

    /// Attribute a room-number unique violation to `number`.
    ///
    /// Two transactions can both pass the in-transaction uniqueness check;
    /// the loser sees the constraint instead.
    pub(crate) fn for_room_number(self, number: &str) -> Self {
        match self {
            Self::Store(StoreError::UniqueViolation { ref constraint })
                if constraint == ROOM_NUMBER_KEY =>
            {
                Self::DuplicateNumber(number.to_string())
            }
            other => other,
        }
    }
}

impl From<StoreError> for OccupancyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout { resource } | StoreError::Deadlock { resource } => {
                Self::Busy { resource }
            }
            StoreError::PoolTimedOut => Self::Busy {
                resource: "connection pool".to_string(),
            },
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_becomes_busy() {
        let err = OccupancyError::from(StoreError::LockTimeout {
            resource: "room:4".into(),
        });
        assert!(matches!(err, OccupancyError::Busy { ref resource } if resource == "room:4"));
        assert!(err.is_retryable());
    }

    #[test]
    fn deadlock_and_pool_exhaustion_are_busy() {
        let deadlock = OccupancyError::from(StoreError::Deadlock {
            resource: "room:1".into(),
        });
        assert_eq!(deadlock.kind(), ErrorKind::Busy);
        assert_eq!(
            OccupancyError::from(StoreError::PoolTimedOut).kind(),
            ErrorKind::Busy
        );
    }

    #[test]
    fn other_store_failures_are_internal() {
        let err = OccupancyError::from(StoreError::Corrupt("bad".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflicts_are_not_retryable() {
        let err = OccupancyError::RoomNotAvailable {
            room: RoomId(1),
            status: RoomStatus::Occupied,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "room:1 is not available (status: occupied)");
    }

    #[test]
    fn room_number_violation_is_attributed() {
        let err = OccupancyError::from(StoreError::UniqueViolation {
            constraint: ROOM_NUMBER_KEY.into(),
        })
        .for_room_number("101");
        assert!(matches!(err, OccupancyError::DuplicateNumber(ref n) if n == "101"));
    }

    #[test]
    fn other_unique_violations_stay_internal() {
        let err = OccupancyError::from(StoreError::UniqueViolation {
            constraint: "admissions_one_open_per_room".into(),
        })
        .for_room_number("101");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn validation_errors_convert() {
        let err: OccupancyError = ValidationError::Missing {
            field: "room_number",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
