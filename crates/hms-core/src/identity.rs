//! # Identifier Newtypes and Caller Identity
//!
//! Newtype wrappers for the identifiers the occupancy core handles. Room and
//! admission ids are assigned by the store; patient ids belong to an external
//! patient registry and are only carried through.
//!
//! Room ids implement `Ord`: operations touching two rooms lock them in
//! ascending id order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of a physical room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

/// Identifier of an admission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdmissionId(pub i64);

/// Identifier of a patient owned by the external patient registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub i64);

impl RoomId {
    /// Access the raw database key.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl AdmissionId {
    /// Access the raw database key.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl PatientId {
    /// Access the raw database key.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room:{}", self.0)
    }
}

impl fmt::Display for AdmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "admission:{}", self.0)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patient:{}", self.0)
    }
}

/// Role of the caller, as established by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full administrative access.
    Admin,
    /// Ward and front-desk staff.
    Staff,
    /// Attending physician.
    Doctor,
}

impl Role {
    /// The stored string form of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "doctor" => Ok(Self::Doctor),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated caller on whose behalf an operation runs.
///
/// Authorization happens before the occupancy core is invoked. The core
/// only records the actor in its logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// User account id in the external user registry.
    pub user_id: i64,
    /// Role the caller was authorized under.
    pub role: Role,
}

impl Actor {
    /// Build an actor from a user id and role.
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.user_id)
    }
}
