//! # Rooms
//!
//! A room's `status` is a cached value derived from its open admissions:
//! `Occupied` exactly when one admission referencing the room has no
//! discharge time. `Available` and `Maintenance` both require zero open
//! admissions; the difference between them is an operator decision.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::RoomId;

/// Occupancy status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Free and selectable for a new admission.
    Available,
    /// Holds exactly one open admission.
    Occupied,
    /// Out of service; holds no open admission.
    Maintenance,
}

/// All room statuses, in the order they are presented to operators.
pub const ROOM_STATUSES: [RoomStatus; 3] = [
    RoomStatus::Available,
    RoomStatus::Occupied,
    RoomStatus::Maintenance,
];

impl RoomStatus {
    /// The stored string form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Maintenance => "maintenance",
        }
    }
}

impl Default for RoomStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomStatus {
    type Err = ValidationError;

    /// Parse a status from its stored string form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "occupied" => Ok(Self::Occupied),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// A persisted room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Human-readable number, unique across rooms.
    pub room_number: String,
    /// Free-form room type ("ICU", "Private", ...).
    pub room_type: Option<String>,
    pub status: RoomStatus,
}

/// Fields for a room that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub room_number: String,
    pub room_type: Option<String>,
    pub status: RoomStatus,
}
