//! # hms-core: Foundational Types for Room Occupancy
//!
//! This crate is the leaf of the workspace. It defines the record types and
//! identifiers that every other crate shares. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `RoomId`, `AdmissionId` and
//!    `PatientId` are distinct types; a room id cannot be passed where an
//!    admission id is expected. All three order numerically, which is the
//!    canonical lock order for rooms.
//!
//! 2. **Single `RoomStatus` enum.** One definition, three variants,
//!    exhaustive `match` everywhere.
//!
//! 3. **Explicit caller identity.** Operations receive an [`Actor`]; there is
//!    no ambient session state anywhere in the workspace.
//!
//! 4. **Normalized input.** [`validate`] trims and rejects malformed input
//!    before it reaches a transaction.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `hms-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod admission;
pub mod error;
pub mod identity;
pub mod room;
pub mod validate;

pub use admission::{Admission, AdmissionChanges, NewAdmission};
pub use error::ValidationError;
pub use identity::{Actor, AdmissionId, PatientId, Role, RoomId};
pub use room::{NewRoom, Room, RoomStatus};
