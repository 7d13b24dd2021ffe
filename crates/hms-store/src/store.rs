//! # Store Contract
//!
//! The occupancy core talks to persistence only through these two traits.
//!
//! ## Locking
//!
//! `lock_room` and `lock_admission` take an exclusive row lock that is held
//! until the transaction commits, rolls back, or is dropped. A second
//! transaction asking for the same row waits, up to the configured lock
//! timeout, and then fails with [`StoreError::LockTimeout`]. Locking a row
//! the transaction already holds returns immediately. Locking a row that
//! does not exist returns `Ok(None)`.
//!
//! Writes (`update_*`, `delete_*`) require the row lock to be held. Inserted
//! rows are locked by the inserting transaction.
//!
//! ## Visibility
//!
//! Inside a transaction, reads see the transaction's own writes on top of
//! committed data. Outside any transaction ([`ResourceStore::room`],
//! [`ResourceStore::snapshot`], ...) only committed data is visible.
//!
//! Dropping a transaction without committing rolls it back.

use async_trait::async_trait;
use hms_core::{Admission, AdmissionId, NewAdmission, NewRoom, Room, RoomId};

use crate::error::StoreError;

/// Committed rooms and open admissions read at a single point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancySnapshot {
    /// Every room, ordered by id.
    pub rooms: Vec<Room>,
    /// Every admission without a discharge time, ordered by id.
    pub open_admissions: Vec<Admission>,
}

/// A transactional record store for rooms and admissions.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Transaction handle produced by [`ResourceStore::begin`].
    type Tx: StoreTransaction;

    /// Open a read-write transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Read a committed room.
    async fn room(&self, id: RoomId) -> Result<Option<Room>, StoreError>;

    /// Read a committed admission.
    async fn admission(&self, id: AdmissionId) -> Result<Option<Admission>, StoreError>;

    /// Committed rooms whose status is available, ordered by room number.
    async fn available_rooms(&self) -> Result<Vec<Room>, StoreError>;

    /// Read all rooms and open admissions from one consistent committed state.
    async fn snapshot(&self) -> Result<OccupancySnapshot, StoreError>;
}

/// An open read-write transaction.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Lock a room row and read it.
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>, StoreError>;

    /// Lock an admission row and read it.
    async fn lock_admission(&mut self, id: AdmissionId) -> Result<Option<Admission>, StoreError>;

    /// Number of admissions for `room` without a discharge time.
    async fn count_open_admissions(&mut self, room: RoomId) -> Result<u64, StoreError>;

    /// Whether a room other than `excluding` already uses `room_number`.
    async fn room_number_in_use(
        &mut self,
        room_number: &str,
        excluding: Option<RoomId>,
    ) -> Result<bool, StoreError>;

    /// Insert a room and return its assigned id.
    async fn insert_room(&mut self, room: &NewRoom) -> Result<RoomId, StoreError>;

    /// Overwrite a locked room's number, type and status.
    async fn update_room(&mut self, room: &Room) -> Result<(), StoreError>;

    /// Delete a locked room together with its admission history.
    async fn delete_room(&mut self, id: RoomId) -> Result<(), StoreError>;

    /// Insert an open admission and return its assigned id.
    async fn insert_admission(&mut self, admission: &NewAdmission)
        -> Result<AdmissionId, StoreError>;

    /// Overwrite every field of a locked admission.
    async fn update_admission(&mut self, admission: &Admission) -> Result<(), StoreError>;

    /// Delete a locked admission.
    async fn delete_admission(&mut self, id: AdmissionId) -> Result<(), StoreError>;

    /// Make every write visible and release all locks.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard every write and release all locks.
    async fn rollback(self) -> Result<(), StoreError>;
}
