//! # Input Normalization
//!
//! Caller input arrives as loosely-typed form fields. These helpers apply
//! the same normalization everywhere: text is trimmed, blank optional text
//! becomes `None`, required text must be non-blank, and ids must be positive.

use crate::error::ValidationError;
use crate::identity::{PatientId, RoomId};
use crate::room::{NewRoom, RoomStatus};

/// Maximum length of a room number, in characters.
pub const MAX_ROOM_NUMBER_LEN: usize = 32;

/// Maximum length of a room type, in characters.
pub const MAX_ROOM_TYPE_LEN: usize = 64;

/// Trim a room number and reject it if blank or too long.
pub fn room_number(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing {
            field: "room_number",
        });
    }
    if trimmed.chars().count() > MAX_ROOM_NUMBER_LEN {
        return Err(ValidationError::TooLong {
            field: "room_number",
            max: MAX_ROOM_NUMBER_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// Trim optional text; blank input becomes `None`.
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Normalize a room type, rejecting values longer than [`MAX_ROOM_TYPE_LEN`].
pub fn room_type(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    match optional_text(raw) {
        Some(t) if t.chars().count() > MAX_ROOM_TYPE_LEN => Err(ValidationError::TooLong {
            field: "type",
            max: MAX_ROOM_TYPE_LEN,
        }),
        other => Ok(other),
    }
}

/// Reject a patient id that cannot reference a stored patient.
pub fn patient_id(id: PatientId) -> Result<PatientId, ValidationError> {
    positive(id.get(), "patient_id").map(|_| id)
}

/// Reject a room id that cannot reference a stored room.
pub fn room_id(id: RoomId) -> Result<RoomId, ValidationError> {
    positive(id.get(), "room_id").map(|_| id)
}

fn positive(value: i64, field: &'static str) -> Result<i64, ValidationError> {
    if value <= 0 {
        return Err(ValidationError::NonPositiveId { field, value });
    }
    Ok(value)
}

/// Build a normalized [`NewRoom`].
pub fn new_room(
    number: &str,
    room_type: Option<&str>,
    status: RoomStatus,
) -> Result<NewRoom, ValidationError> {
    Ok(NewRoom {
        room_number: self::room_number(number)?,
        room_type: self::room_type(room_type)?,
        status,
    })
}
