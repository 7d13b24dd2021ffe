//! # Consistency Validator
//!
//! A room is occupied exactly when it has one open admission. Available and
//! maintenance rooms have none. This module is the single statement of that
//! rule; every status write and the audit consult it.

use hms_core::{RoomId, RoomStatus};

use crate::error::OccupancyError;

/// Whether a room with `open` open admissions may carry `proposed`.
pub fn can_set_status(open: u64, proposed: RoomStatus) -> bool {
    match proposed {
        RoomStatus::Occupied => open == 1,
        RoomStatus::Available | RoomStatus::Maintenance => open == 0,
    }
}

/// [`can_set_status`] as a typed rejection.
pub fn ensure_status(room: RoomId, open: u64, proposed: RoomStatus) -> Result<(), OccupancyError> {
    if can_set_status(open, proposed) {
        Ok(())
    } else {
        Err(OccupancyError::ConflictingOccupancy {
            room,
            requested: proposed,
            open,
        })
    }
}

/// The status a room must carry given its open admissions, preserving
/// `current` when it is already legal. `None` when no status is legal.
pub fn settled_status(open: u64, current: RoomStatus) -> Option<RoomStatus> {
    match open {
        0 if current == RoomStatus::Occupied => Some(RoomStatus::Available),
        0 => Some(current),
        1 => Some(RoomStatus::Occupied),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn status() -> impl Strategy<Value = RoomStatus> {
        prop_oneof![
            Just(RoomStatus::Available),
            Just(RoomStatus::Occupied),
            Just(RoomStatus::Maintenance),
        ]
    }

    #[test]
    fn truth_table() {
        assert!(can_set_status(0, RoomStatus::Available));
        assert!(can_set_status(0, RoomStatus::Maintenance));
        assert!(!can_set_status(0, RoomStatus::Occupied));
        assert!(can_set_status(1, RoomStatus::Occupied));
        assert!(!can_set_status(1, RoomStatus::Available));
        assert!(!can_set_status(1, RoomStatus::Maintenance));
        assert!(!can_set_status(2, RoomStatus::Occupied));
    }

    #[test]
    fn ensure_status_reports_the_request() {
        let err = ensure_status(RoomId(3), 1, RoomStatus::Available).unwrap_err();
        assert!(matches!(
            err,
            OccupancyError::ConflictingOccupancy {
                room: RoomId(3),
                requested: RoomStatus::Available,
                open: 1
            }
        ));
    }

    #[test]
    fn vacated_room_keeps_maintenance() {
        assert_eq!(
            settled_status(0, RoomStatus::Maintenance),
            Some(RoomStatus::Maintenance)
        );
        assert_eq!(
            settled_status(0, RoomStatus::Occupied),
            Some(RoomStatus::Available)
        );
        assert_eq!(settled_status(2, RoomStatus::Occupied), None);
    }

    proptest! {
        #[test]
        fn occupied_iff_exactly_one_open(open in 0u64..5, proposed in status()) {
            let expected = if proposed == RoomStatus::Occupied { open == 1 } else { open == 0 };
            prop_assert_eq!(can_set_status(open, proposed), expected);
        }

        #[test]
        fn settled_status_is_always_legal(open in 0u64..3, current in status()) {
            if let Some(settled) = settled_status(open, current) {
                prop_assert!(can_set_status(open, settled));
            } else {
                prop_assert!(open > 1);
            }
        }
    }
}
