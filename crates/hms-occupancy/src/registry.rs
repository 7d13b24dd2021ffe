//! # Room Registry
//!
//! Creates, edits and deletes rooms. A manual status edit is accepted only
//! when it agrees with the room's open admissions, counted after the room
//! lock is held.

use hms_core::validate;
use hms_core::{Actor, Room, RoomId, RoomStatus};
use hms_store::{ResourceStore, StoreTransaction};

use crate::consistency::ensure_status;
use crate::error::OccupancyError;
use crate::txn::transact;

/// Room create/update/delete over a store.
#[derive(Debug)]
pub struct RoomRegistry<'s, S> {
    store: &'s S,
}

impl<'s, S: ResourceStore> RoomRegistry<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Create an available room.
    pub async fn create(
        &self,
        actor: &Actor,
        room_number: &str,
        room_type: Option<&str>,
    ) -> Result<RoomId, OccupancyError> {
        self.create_with_status(actor, room_number, room_type, RoomStatus::Available)
            .await
    }

    /// Create a room in `status`. A new room has no admissions, so
    /// `occupied` is rejected.
    pub async fn create_with_status(
        &self,
        actor: &Actor,
        room_number: &str,
        room_type: Option<&str>,
        status: RoomStatus,
    ) -> Result<RoomId, OccupancyError> {
        let new = validate::new_room(room_number, room_type, status)?;
        let number = new.room_number.clone();

        let id = transact(self.store, "create_room", move |tx| {
            Box::pin(async move {
                if tx.room_number_in_use(&new.room_number, None).await? {
                    return Err(OccupancyError::DuplicateNumber(new.room_number));
                }
                let id = tx.insert_room(&new).await?;
                ensure_status(id, 0, new.status)?;
                Ok(id)
            })
        })
        .await
        .map_err(|e| e.for_room_number(&number))?;

        tracing::info!(actor = %actor, room = %id, room_number = %number, %status, "room created");
        Ok(id)
    }

    /// Overwrite a room's number, type and status.
    pub async fn update(
        &self,
        actor: &Actor,
        room_id: RoomId,
        room_number: &str,
        room_type: Option<&str>,
        status: RoomStatus,
    ) -> Result<Room, OccupancyError> {
        let id = validate::room_id(room_id)?;
        let fields = validate::new_room(room_number, room_type, status)?;
        let number = fields.room_number.clone();

        let (previous, updated) = transact(self.store, "update_room", move |tx| {
            Box::pin(async move {
                let current = tx
                    .lock_room(id)
                    .await?
                    .ok_or(OccupancyError::RoomNotFound(id))?;
                let open = tx.count_open_admissions(id).await?;
                ensure_status(id, open, fields.status)?;
                if tx.room_number_in_use(&fields.room_number, Some(id)).await? {
                    return Err(OccupancyError::DuplicateNumber(fields.room_number));
                }
                let updated = Room {
                    id,
                    room_number: fields.room_number,
                    room_type: fields.room_type,
                    status: fields.status,
                };
                tx.update_room(&updated).await?;
                Ok((current.status, updated))
            })
        })
        .await
        .map_err(|e| e.for_room_number(&number))?;

        tracing::info!(
            actor = %actor,
            room = %id,
            from = %previous,
            to = %updated.status,
            "room updated"
        );
        Ok(updated)
    }

    /// Delete a room and its closed admission history. Refused while a
    /// patient occupies it.
    pub async fn delete(&self, actor: &Actor, room_id: RoomId) -> Result<(), OccupancyError> {
        let id = validate::room_id(room_id)?;
        transact(self.store, "delete_room", move |tx| {
            Box::pin(async move {
                tx.lock_room(id)
                    .await?
                    .ok_or(OccupancyError::RoomNotFound(id))?;
                let open = tx.count_open_admissions(id).await?;
                if open > 0 {
                    return Err(OccupancyError::HasOpenAdmission { room: id, open });
                }
                tx.delete_room(id).await?;
                Ok(())
            })
        })
        .await?;

        tracing::info!(actor = %actor, room = %id, "room deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use hms_core::{PatientId, Role, ValidationError};
    use hms_store::MemoryStore;

    use super::*;
    use crate::admission::AdmissionLifecycleManager;

    fn staff() -> Actor {
        Actor::new(1, Role::Staff)
    }

    // ── create ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_defaults_to_available() {
        let store = MemoryStore::default();
        let id = RoomRegistry::new(&store)
            .create(&staff(), " 101 ", Some("ICU"))
            .await
            .unwrap();
        let room = store.room(id).await.unwrap().unwrap();
        assert_eq!(room.room_number, "101");
        assert_eq!(room.room_type.as_deref(), Some("ICU"));
        assert_eq!(room.status, RoomStatus::Available);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_number() {
        let store = MemoryStore::default();
        let registry = RoomRegistry::new(&store);
        registry.create(&staff(), "101", None).await.unwrap();
        let err = registry.create(&staff(), "101", None).await.unwrap_err();
        assert!(matches!(err, OccupancyError::DuplicateNumber(ref n) if n == "101"));
    }

    #[tokio::test]
    async fn test_create_in_maintenance() {
        let store = MemoryStore::default();
        let id = RoomRegistry::new(&store)
            .create_with_status(&staff(), "B1", None, RoomStatus::Maintenance)
            .await
            .unwrap();
        assert_eq!(
            store.room(id).await.unwrap().unwrap().status,
            RoomStatus::Maintenance
        );
    }

    #[tokio::test]
    async fn test_create_occupied_is_rejected_and_not_stored() {
        let store = MemoryStore::default();
        let err = RoomRegistry::new(&store)
            .create_with_status(&staff(), "B1", None, RoomStatus::Occupied)
            .await
            .unwrap_err();
        assert!(matches!(err, OccupancyError::ConflictingOccupancy { open: 0, .. }));
        assert!(store.snapshot().await.unwrap().rooms.is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_room_number() {
        let store = MemoryStore::default();
        let err = RoomRegistry::new(&store)
            .create(&staff(), "  ", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OccupancyError::Validation(ValidationError::Missing { .. })
        ));
    }

    // ── update ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_update_rewrites_fields() {
        let store = MemoryStore::default();
        let registry = RoomRegistry::new(&store);
        let id = registry.create(&staff(), "101", None).await.unwrap();
        let room = registry
            .update(&staff(), id, "101B", Some("Private"), RoomStatus::Maintenance)
            .await
            .unwrap();
        assert_eq!(room.room_number, "101B");
        assert_eq!(store.room(id).await.unwrap().unwrap(), room);
    }

    #[tokio::test]
    async fn test_update_keeps_own_number() {
        let store = MemoryStore::default();
        let registry = RoomRegistry::new(&store);
        let id = registry.create(&staff(), "101", None).await.unwrap();
        assert!(registry
            .update(&staff(), id, "101", Some("General"), RoomStatus::Available)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_update_rejects_another_rooms_number() {
        let store = MemoryStore::default();
        let registry = RoomRegistry::new(&store);
        registry.create(&staff(), "101", None).await.unwrap();
        let id = registry.create(&staff(), "102", None).await.unwrap();
        let err = registry
            .update(&staff(), id, "101", None, RoomStatus::Available)
            .await
            .unwrap_err();
        assert!(matches!(err, OccupancyError::DuplicateNumber(_)));
    }

    #[tokio::test]
    async fn test_update_missing_room() {
        let store = MemoryStore::default();
        let err = RoomRegistry::new(&store)
            .update(&staff(), RoomId(5), "5", None, RoomStatus::Available)
            .await
            .unwrap_err();
        assert!(matches!(err, OccupancyError::RoomNotFound(RoomId(5))));
    }

    #[tokio::test]
    async fn test_manual_status_must_agree_with_admissions() {
        let store = MemoryStore::default();
        let registry = RoomRegistry::new(&store);
        let id = registry.create(&staff(), "101", None).await.unwrap();

        let err = registry
            .update(&staff(), id, "101", None, RoomStatus::Occupied)
            .await
            .unwrap_err();
        assert!(matches!(err, OccupancyError::ConflictingOccupancy { open: 0, .. }));

        AdmissionLifecycleManager::new(&store)
            .admit(&staff(), PatientId(1), id, Utc::now(), None)
            .await
            .unwrap();

        let err = registry
            .update(&staff(), id, "101", None, RoomStatus::Available)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OccupancyError::ConflictingOccupancy {
                requested: RoomStatus::Available,
                open: 1,
                ..
            }
        ));
        assert!(registry
            .update(&staff(), id, "101", None, RoomStatus::Occupied)
            .await
            .is_ok());
    }

    // ── delete ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_delete_room() {
        let store = MemoryStore::default();
        let registry = RoomRegistry::new(&store);
        let id = registry.create(&staff(), "101", None).await.unwrap();
        registry.delete(&staff(), id).await.unwrap();
        assert!(store.room(id).await.unwrap().is_none());

        let err = registry.delete(&staff(), id).await.unwrap_err();
        assert!(matches!(err, OccupancyError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_refused_while_occupied() {
        let store = MemoryStore::default();
        let registry = RoomRegistry::new(&store);
        let id = registry.create(&staff(), "101", None).await.unwrap();
        let adm = AdmissionLifecycleManager::new(&store)
            .admit(&staff(), PatientId(1), id, Utc::now(), None)
            .await
            .unwrap();

        let err = registry.delete(&staff(), id).await.unwrap_err();
        assert!(matches!(err, OccupancyError::HasOpenAdmission { open: 1, .. }));
        assert!(store.admission(adm).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_cascades_closed_history() {
        let store = MemoryStore::default();
        let registry = RoomRegistry::new(&store);
        let lifecycle = AdmissionLifecycleManager::new(&store);
        let id = registry.create(&staff(), "101", None).await.unwrap();
        let adm = lifecycle
            .admit(&staff(), PatientId(1), id, Utc::now(), None)
            .await
            .unwrap();
        lifecycle.discharge(&staff(), adm).await.unwrap();

        registry.delete(&staff(), id).await.unwrap();
        assert!(store.admission(adm).await.unwrap().is_none());
    }
}
