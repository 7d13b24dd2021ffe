//! # Occupancy Service
//!
//! The entry point for callers. Owns a store handle and exposes every room
//! and admission operation, the committed lookups and the audit.

use chrono::{DateTime, Utc};
use hms_core::{
    Actor, Admission, AdmissionChanges, AdmissionId, PatientId, Room, RoomId, RoomStatus,
};
use hms_store::ResourceStore;

use crate::admission::AdmissionLifecycleManager;
use crate::audit::{self, AuditReport};
use crate::error::OccupancyError;
use crate::registry::RoomRegistry;

/// Room occupancy operations over a store engine.
///
/// Cheap to clone when the store is (both bundled engines are).
#[derive(Debug, Clone)]
pub struct OccupancyService<S> {
    store: S,
}

impl<S: ResourceStore> OccupancyService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rooms(&self) -> RoomRegistry<'_, S> {
        RoomRegistry::new(&self.store)
    }

    pub fn admissions(&self) -> AdmissionLifecycleManager<'_, S> {
        AdmissionLifecycleManager::new(&self.store)
    }

    // -- Admissions --------------------------------------------------------

    pub async fn admit(
        &self,
        actor: &Actor,
        patient_id: PatientId,
        room_id: RoomId,
        admitted_on: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<AdmissionId, OccupancyError> {
        self.admissions()
            .admit(actor, patient_id, room_id, admitted_on, notes)
            .await
    }

    pub async fn transfer(
        &self,
        actor: &Actor,
        admission_id: AdmissionId,
        changes: AdmissionChanges,
    ) -> Result<Admission, OccupancyError> {
        self.admissions().transfer(actor, admission_id, changes).await
    }

    pub async fn discharge(
        &self,
        actor: &Actor,
        admission_id: AdmissionId,
    ) -> Result<Admission, OccupancyError> {
        self.admissions().discharge(actor, admission_id).await
    }

    pub async fn delete_admission(
        &self,
        actor: &Actor,
        admission_id: AdmissionId,
    ) -> Result<(), OccupancyError> {
        self.admissions().delete(actor, admission_id).await
    }

    // -- Rooms -------------------------------------------------------------

    pub async fn create_room(
        &self,
        actor: &Actor,
        room_number: &str,
        room_type: Option<&str>,
    ) -> Result<RoomId, OccupancyError> {
        self.rooms().create(actor, room_number, room_type).await
    }

    pub async fn create_room_with_status(
        &self,
        actor: &Actor,
        room_number: &str,
        room_type: Option<&str>,
        status: RoomStatus,
    ) -> Result<RoomId, OccupancyError> {
        self.rooms()
            .create_with_status(actor, room_number, room_type, status)
            .await
    }

    pub async fn update_room(
        &self,
        actor: &Actor,
        room_id: RoomId,
        room_number: &str,
        room_type: Option<&str>,
        status: RoomStatus,
    ) -> Result<Room, OccupancyError> {
        self.rooms()
            .update(actor, room_id, room_number, room_type, status)
            .await
    }

    pub async fn delete_room(&self, actor: &Actor, room_id: RoomId) -> Result<(), OccupancyError> {
        self.rooms().delete(actor, room_id).await
    }

    // -- Reads -------------------------------------------------------------

    /// Committed room by id.
    pub async fn room(&self, id: RoomId) -> Result<Room, OccupancyError> {
        self.store
            .room(id)
            .await?
            .ok_or(OccupancyError::RoomNotFound(id))
    }

    /// Committed admission by id.
    pub async fn admission(&self, id: AdmissionId) -> Result<Admission, OccupancyError> {
        self.store
            .admission(id)
            .await?
            .ok_or(OccupancyError::AdmissionNotFound(id))
    }

    /// Rooms a new admission can be placed in, ordered by room number.
    pub async fn available_rooms(&self) -> Result<Vec<Room>, OccupancyError> {
        Ok(self.store.available_rooms().await?)
    }

    pub async fn audit(&self) -> Result<AuditReport, OccupancyError> {
        audit::audit(&self.store).await
    }
}
