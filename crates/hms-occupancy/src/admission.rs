//! # Admission Lifecycle
//!
//! Admit, transfer, discharge and delete. Each operation changes an admission
//! and the status of every room it touches inside one transaction.
//!
//! ## Lock order
//!
//! An operation locks at most one admission, and always before any room.
//! Rooms are locked in ascending id order. Two operations therefore never
//! wait on each other in a cycle, and a lock wait that still exceeds the
//! store's timeout surfaces as [`OccupancyError::Busy`].

use chrono::{DateTime, Utc};
use hms_core::validate;
use hms_core::{
    Actor, Admission, AdmissionChanges, AdmissionId, NewAdmission, PatientId, Room, RoomId,
    RoomStatus, ValidationError,
};
use hms_store::{ResourceStore, StoreTransaction};

use crate::consistency::settled_status;
use crate::error::OccupancyError;
use crate::txn::transact;

/// Admission operations over a store.
#[derive(Debug)]
pub struct AdmissionLifecycleManager<'s, S> {
    store: &'s S,
}

impl<'s, S: ResourceStore> AdmissionLifecycleManager<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Open an admission for `patient_id` in an available, empty room and
    /// mark the room occupied.
    pub async fn admit(
        &self,
        actor: &Actor,
        patient_id: PatientId,
        room_id: RoomId,
        admitted_on: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<AdmissionId, OccupancyError> {
        let new = NewAdmission {
            patient_id: validate::patient_id(patient_id)?,
            room_id: validate::room_id(room_id)?,
            admitted_on,
            notes: validate::optional_text(notes),
        };

        let id = transact(self.store, "admit", move |tx| {
            Box::pin(async move {
                let room = tx
                    .lock_room(new.room_id)
                    .await?
                    .ok_or(OccupancyError::RoomNotFound(new.room_id))?;
                ensure_admittable(tx, &room).await?;
                let id = tx.insert_admission(&new).await?;
                occupy(tx, room).await?;
                Ok::<_, OccupancyError>(id)
            })
        })
        .await?;

        tracing::info!(
            actor = %actor,
            admission = %id,
            patient = %patient_id,
            room = %room_id,
            "patient admitted"
        );
        Ok(id)
    }

    /// Edit an admission. Fields left unset in `changes` keep the values of
    /// the locked row. For an open admission, a different `room_id` moves
    /// the patient: the new room must be admittable and becomes occupied,
    /// and the old room is released once empty. A discharged admission keeps
    /// its room.
    pub async fn transfer(
        &self,
        actor: &Actor,
        admission_id: AdmissionId,
        changes: AdmissionChanges,
    ) -> Result<Admission, OccupancyError> {
        let changes = AdmissionChanges {
            patient_id: changes.patient_id.map(validate::patient_id).transpose()?,
            room_id: changes.room_id.map(validate::room_id).transpose()?,
            admitted_on: changes.admitted_on,
            notes: changes
                .notes
                .map(|n| validate::optional_text(Some(n.as_str())).unwrap_or_default()),
        };

        let (from, updated) = transact(self.store, "transfer", move |tx| {
            Box::pin(async move {
                let current = tx
                    .lock_admission(admission_id)
                    .await?
                    .ok_or(OccupancyError::AdmissionNotFound(admission_id))?;
                let from = current.room_id;
                let updated = changes.apply_to(&current);
                let target = updated.room_id;

                if target == from {
                    tx.update_admission(&updated).await?;
                    return Ok((from, updated));
                }
                if !current.is_open() {
                    return Err(ValidationError::Immutable {
                        field: "room_id",
                        reason: "admission is discharged",
                    }
                    .into());
                }

                let (old_room, new_room) = lock_pair(tx, from, target).await?;
                let new_room = new_room.ok_or(OccupancyError::RoomNotFound(target))?;
                ensure_admittable(tx, &new_room).await?;
                tx.update_admission(&updated).await?;
                occupy(tx, new_room).await?;
                match old_room {
                    Some(old) => release_if_vacant(tx, old).await?,
                    None => {
                        tracing::warn!(admission = %admission_id, room = %from, "admission referenced a missing room");
                    }
                }
                Ok::<_, OccupancyError>((from, updated))
            })
        })
        .await?;

        if from == updated.room_id {
            tracing::info!(actor = %actor, admission = %admission_id, "admission updated");
        } else {
            tracing::info!(
                actor = %actor,
                admission = %admission_id,
                from = %from,
                to = %updated.room_id,
                "patient transferred"
            );
        }
        Ok(updated)
    }

    /// Close an open admission now and release its room.
    pub async fn discharge(
        &self,
        actor: &Actor,
        admission_id: AdmissionId,
    ) -> Result<Admission, OccupancyError> {
        let closed = transact(self.store, "discharge", move |tx| {
            Box::pin(async move {
                let mut admission = tx
                    .lock_admission(admission_id)
                    .await?
                    .ok_or(OccupancyError::AdmissionNotFound(admission_id))?;
                if !admission.is_open() {
                    return Err(OccupancyError::AlreadyDischarged(admission_id));
                }
                admission.discharged_on = Some(Utc::now());
                tx.update_admission(&admission).await?;
                release_room(tx, admission.room_id).await?;
                Ok(admission)
            })
        })
        .await?;

        tracing::info!(
            actor = %actor,
            admission = %admission_id,
            room = %closed.room_id,
            "patient discharged"
        );
        Ok(closed)
    }

    /// Delete an admission. Deleting an open admission releases its room.
    pub async fn delete(&self, actor: &Actor, admission_id: AdmissionId) -> Result<(), OccupancyError> {
        let deleted = transact(self.store, "delete_admission", move |tx| {
            Box::pin(async move {
                let admission = tx
                    .lock_admission(admission_id)
                    .await?
                    .ok_or(OccupancyError::AdmissionNotFound(admission_id))?;
                tx.delete_admission(admission_id).await?;
                if admission.is_open() {
                    release_room(tx, admission.room_id).await?;
                }
                Ok::<_, OccupancyError>(admission)
            })
        })
        .await?;

        tracing::info!(
            actor = %actor,
            admission = %admission_id,
            room = %deleted.room_id,
            was_open = deleted.is_open(),
            "admission deleted"
        );
        Ok(())
    }
}

/// Lock two distinct rooms in ascending id order, returning them as
/// `(first, second)` in argument order.
async fn lock_pair<T: StoreTransaction>(
    tx: &mut T,
    first: RoomId,
    second: RoomId,
) -> Result<(Option<Room>, Option<Room>), OccupancyError> {
    if first < second {
        let a = tx.lock_room(first).await?;
        let b = tx.lock_room(second).await?;
        Ok((a, b))
    } else {
        let b = tx.lock_room(second).await?;
        let a = tx.lock_room(first).await?;
        Ok((a, b))
    }
}

/// Checks for a locked room about to receive a patient.
async fn ensure_admittable<T: StoreTransaction>(tx: &mut T, room: &Room) -> Result<(), OccupancyError> {
    if room.status != RoomStatus::Available {
        return Err(OccupancyError::RoomNotAvailable {
            room: room.id,
            status: room.status,
        });
    }
    let open = tx.count_open_admissions(room.id).await?;
    if open > 0 {
        tracing::warn!(room = %room.id, open, "room marked available has open admissions");
        return Err(OccupancyError::RoomAlreadyOccupied { room: room.id, open });
    }
    Ok(())
}

async fn occupy<T: StoreTransaction>(tx: &mut T, mut room: Room) -> Result<(), OccupancyError> {
    room.status = RoomStatus::Occupied;
    tx.update_room(&room).await?;
    Ok(())
}

/// Lock a room that may just have lost its patient and release it.
async fn release_room<T: StoreTransaction>(tx: &mut T, id: RoomId) -> Result<(), OccupancyError> {
    match tx.lock_room(id).await? {
        Some(room) => release_if_vacant(tx, room).await,
        None => {
            tracing::warn!(room = %id, "admission referenced a missing room");
            Ok(())
        }
    }
}

/// Recount a locked room's open admissions and settle its status.
async fn release_if_vacant<T: StoreTransaction>(tx: &mut T, mut room: Room) -> Result<(), OccupancyError> {
    let open = tx.count_open_admissions(room.id).await?;
    match settled_status(open, room.status) {
        Some(status) if status != room.status => {
            tracing::debug!(room = %room.id, from = %room.status, to = %status, "room status settled");
            room.status = status;
            tx.update_room(&room).await?;
        }
        Some(_) => {}
        None => {
            tracing::warn!(room = %room.id, open, "room has more than one open admission");
        }
    }
    Ok(())
}
