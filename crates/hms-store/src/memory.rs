//! # In-Memory Store
//!
//! A [`ResourceStore`] held entirely in process memory, used by tests and by
//! embedders that do not need durability.
//!
//! ## Design
//!
//! - **Committed tables** live behind a `parking_lot::RwLock`. The lock is
//!   never held across an `.await`.
//! - **Row locks** are per-row `tokio::sync::Mutex<()>` values in a lock
//!   table. A transaction keeps the owned guards until it ends, and waits
//!   for a contended row with `tokio::time::timeout`.
//! - **Write sets** are private to each transaction (`Some(row)` for an
//!   upsert, `None` for a delete) and are applied to the committed tables
//!   under one write lock on commit, after the same constraint checks a
//!   database would run: unique room numbers, at most one open admission per
//!   room, and admissions referencing an existing room. Like a database, the
//!   checks cover only the rows the transaction wrote.
//! - Ids come from monotonically increasing counters and are not reused
//!   after a rollback.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hms_core::{Admission, AdmissionId, NewAdmission, NewRoom, Room, RoomId, RoomStatus};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

use crate::config::StoreConfig;
use crate::error::{StoreError, ADMISSION_ROOM_FKEY, ONE_OPEN_ADMISSION_INDEX, ROOM_NUMBER_KEY};
use crate::store::{OccupancySnapshot, ResourceStore, StoreTransaction};

/// Key of a lockable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Room(RoomId),
    Admission(AdmissionId),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(id) => id.fmt(f),
            Self::Admission(id) => id.fmt(f),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    rooms: BTreeMap<RoomId, Room>,
    admissions: BTreeMap<AdmissionId, Admission>,
}

#[derive(Debug)]
struct Inner {
    tables: RwLock<Tables>,
    locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
    next_room_id: AtomicI64,
    next_admission_id: AtomicI64,
    next_txn: AtomicU64,
    config: StoreConfig,
}

impl Inner {
    fn row_mutex(&self, key: RowKey) -> Arc<RowMutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(key)
                .or_insert_with(|| Arc::new(RowMutex::new(()))),
        )
    }

    /// Drop lock-table entries nobody holds or waits on.
    fn prune_locks(&self) {
        self.locks.lock().retain(|_, m| Arc::strong_count(m) > 1);
    }
}

/// Thread-safe, cloneable in-memory store. Clones share the same tables.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self::from_records(config, Vec::new(), Vec::new())
    }

    /// Load a store from existing records, such as a legacy export.
    ///
    /// Records are taken as-is; no occupancy rule is checked. Id counters
    /// resume after the highest loaded id.
    pub fn from_records(config: StoreConfig, rooms: Vec<Room>, admissions: Vec<Admission>) -> Self {
        let next_room = rooms.iter().map(|r| r.id.get()).max().unwrap_or(0) + 1;
        let next_admission = admissions.iter().map(|a| a.id.get()).max().unwrap_or(0) + 1;
        let tables = Tables {
            rooms: rooms.into_iter().map(|r| (r.id, r)).collect(),
            admissions: admissions.into_iter().map(|a| (a.id, a)).collect(),
        };
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(tables),
                locks: Mutex::new(HashMap::new()),
                next_room_id: AtomicI64::new(next_room),
                next_admission_id: AtomicI64::new(next_admission),
                next_txn: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// The configuration this store was created with.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Number of rows currently present in the lock table.
    pub fn lock_table_len(&self) -> usize {
        self.inner.locks.lock().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let serial = self.inner.next_txn.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(txn = serial, "memory transaction started");
        Ok(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            serial,
            held: HashMap::new(),
            rooms: BTreeMap::new(),
            admissions: BTreeMap::new(),
        })
    }

    async fn room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.inner.tables.read().rooms.get(&id).cloned())
    }

    async fn admission(&self, id: AdmissionId) -> Result<Option<Admission>, StoreError> {
        Ok(self.inner.tables.read().admissions.get(&id).cloned())
    }

    async fn available_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let mut rooms: Vec<Room> = self
            .inner
            .tables
            .read()
            .rooms
            .values()
            .filter(|r| r.status == RoomStatus::Available)
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number));
        Ok(rooms)
    }

    async fn snapshot(&self) -> Result<OccupancySnapshot, StoreError> {
        let tables = self.inner.tables.read();
        Ok(OccupancySnapshot {
            rooms: tables.rooms.values().cloned().collect(),
            open_admissions: tables
                .admissions
                .values()
                .filter(|a| a.is_open())
                .cloned()
                .collect(),
        })
    }
}

/// Transaction over a [`MemoryStore`].
pub struct MemoryTransaction {
    inner: Arc<Inner>,
    serial: u64,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    rooms: BTreeMap<RoomId, Option<Room>>,
    admissions: BTreeMap<AdmissionId, Option<Admission>>,
}

impl fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("serial", &self.serial)
            .field("held", &self.held.keys().collect::<Vec<_>>())
            .field("staged_rooms", &self.rooms.len())
            .field("staged_admissions", &self.admissions.len())
            .finish()
    }
}

impl MemoryTransaction {
    async fn lock(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        let mutex = self.inner.row_mutex(key);
        let timeout = self.inner.config.lock_timeout;
        let guard = match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(txn = self.serial, row = %key, ?timeout, "row lock wait timed out");
                return Err(StoreError::LockTimeout {
                    resource: key.to_string(),
                });
            }
        };
        tracing::trace!(txn = self.serial, row = %key, "row lock acquired");
        self.held.insert(key, guard);
        Ok(())
    }

    /// Lock a row nobody else can know about yet.
    fn lock_fresh(&mut self, key: RowKey) -> Result<(), StoreError> {
        let guard = self
            .inner
            .row_mutex(key)
            .try_lock_owned()
            .map_err(|_| StoreError::LockTimeout {
                resource: key.to_string(),
            })?;
        self.held.insert(key, guard);
        Ok(())
    }

    fn require_lock(&self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains_key(&key) {
            Ok(())
        } else {
            Err(StoreError::Unlocked {
                resource: key.to_string(),
            })
        }
    }

    fn view_room(&self, tables: &Tables, id: RoomId) -> Option<Room> {
        match self.rooms.get(&id) {
            Some(staged) => staged.clone(),
            None => tables.rooms.get(&id).cloned(),
        }
    }

    fn view_admission(&self, tables: &Tables, id: AdmissionId) -> Option<Admission> {
        match self.admissions.get(&id) {
            Some(staged) => staged.clone(),
            None => tables.admissions.get(&id).cloned(),
        }
    }

    /// Rooms as this transaction sees them.
    fn visible_rooms<'a>(&'a self, tables: &'a Tables) -> impl Iterator<Item = &'a Room> + 'a {
        let committed = tables
            .rooms
            .values()
            .filter(move |r| !self.rooms.contains_key(&r.id));
        committed.chain(self.rooms.values().flatten())
    }

    /// Admissions as this transaction sees them.
    fn visible_admissions<'a>(
        &'a self,
        tables: &'a Tables,
    ) -> impl Iterator<Item = &'a Admission> + 'a {
        let committed = tables
            .admissions
            .values()
            .filter(move |a| !self.admissions.contains_key(&a.id));
        committed.chain(self.admissions.values().flatten())
    }

    fn number_taken(&self, tables: &Tables, number: &str, excluding: Option<RoomId>) -> bool {
        self.visible_rooms(tables)
            .any(|r| r.room_number == number && Some(r.id) != excluding)
    }

    /// Constraint checks for the rows this transaction wrote, evaluated
    /// against the state it would commit. Rows it never touched are not
    /// rechecked, so pre-existing bad data only fails the writes that
    /// involve it.
    fn check_constraints(&self, tables: &Tables) -> Result<(), StoreError> {
        for room in self.rooms.values().flatten() {
            if self.number_taken(tables, &room.room_number, Some(room.id)) {
                return Err(StoreError::UniqueViolation {
                    constraint: ROOM_NUMBER_KEY.to_string(),
                });
            }
        }

        let fkey_violation = || StoreError::ForeignKeyViolation {
            constraint: ADMISSION_ROOM_FKEY.to_string(),
        };
        let mut touched: BTreeSet<RoomId> = BTreeSet::new();
        for adm in self.admissions.values().flatten() {
            let moved = tables
                .admissions
                .get(&adm.id)
                .map_or(true, |committed| committed.room_id != adm.room_id);
            if moved && self.view_room(tables, adm.room_id).is_none() {
                return Err(fkey_violation());
            }
            if adm.is_open() {
                touched.insert(adm.room_id);
            }
        }
        for (id, _) in self.rooms.iter().filter(|(_, row)| row.is_none()) {
            if self.visible_admissions(tables).any(|a| a.room_id == *id) {
                return Err(fkey_violation());
            }
        }

        for room in touched {
            let open = self
                .visible_admissions(tables)
                .filter(|a| a.room_id == room && a.is_open())
                .count();
            if open > 1 {
                return Err(StoreError::UniqueViolation {
                    constraint: ONE_OPEN_ADMISSION_INDEX.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        self.held.clear();
        self.inner.prune_locks();
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>, StoreError> {
        self.lock(RowKey::Room(id)).await?;
        let tables = self.inner.tables.read();
        Ok(self.view_room(&tables, id))
    }

    async fn lock_admission(&mut self, id: AdmissionId) -> Result<Option<Admission>, StoreError> {
        self.lock(RowKey::Admission(id)).await?;
        let tables = self.inner.tables.read();
        Ok(self.view_admission(&tables, id))
    }

    async fn count_open_admissions(&mut self, room: RoomId) -> Result<u64, StoreError> {
        let tables = self.inner.tables.read();
        let count = self
            .visible_admissions(&tables)
            .filter(|a| a.room_id == room && a.is_open())
            .count();
        Ok(count as u64)
    }

    async fn room_number_in_use(
        &mut self,
        room_number: &str,
        excluding: Option<RoomId>,
    ) -> Result<bool, StoreError> {
        let tables = self.inner.tables.read();
        Ok(self.number_taken(&tables, room_number, excluding))
    }

    async fn insert_room(&mut self, room: &NewRoom) -> Result<RoomId, StoreError> {
        {
            let tables = self.inner.tables.read();
            if self.number_taken(&tables, &room.room_number, None) {
                return Err(StoreError::UniqueViolation {
                    constraint: ROOM_NUMBER_KEY.to_string(),
                });
            }
        }
        let id = RoomId(self.inner.next_room_id.fetch_add(1, Ordering::Relaxed));
        self.lock_fresh(RowKey::Room(id))?;
        self.rooms.insert(
            id,
            Some(Room {
                id,
                room_number: room.room_number.clone(),
                room_type: room.room_type.clone(),
                status: room.status,
            }),
        );
        Ok(id)
    }

    async fn update_room(&mut self, room: &Room) -> Result<(), StoreError> {
        let key = RowKey::Room(room.id);
        self.require_lock(key)?;
        {
            let tables = self.inner.tables.read();
            if self.view_room(&tables, room.id).is_none() {
                return Err(StoreError::MissingRow {
                    resource: key.to_string(),
                });
            }
            if self.number_taken(&tables, &room.room_number, Some(room.id)) {
                return Err(StoreError::UniqueViolation {
                    constraint: ROOM_NUMBER_KEY.to_string(),
                });
            }
        }
        self.rooms.insert(room.id, Some(room.clone()));
        Ok(())
    }

    async fn delete_room(&mut self, id: RoomId) -> Result<(), StoreError> {
        let key = RowKey::Room(id);
        self.require_lock(key)?;
        let history: Vec<AdmissionId> = {
            let tables = self.inner.tables.read();
            if self.view_room(&tables, id).is_none() {
                return Err(StoreError::MissingRow {
                    resource: key.to_string(),
                });
            }
            self.visible_admissions(&tables)
                .filter(|a| a.room_id == id)
                .map(|a| a.id)
                .collect()
        };
        // Cascade, locking each admission the way a database cascade would.
        for adm in history {
            self.lock(RowKey::Admission(adm)).await?;
            self.admissions.insert(adm, None);
        }
        self.rooms.insert(id, None);
        Ok(())
    }

    async fn insert_admission(
        &mut self,
        admission: &NewAdmission,
    ) -> Result<AdmissionId, StoreError> {
        {
            let tables = self.inner.tables.read();
            if self.view_room(&tables, admission.room_id).is_none() {
                return Err(StoreError::ForeignKeyViolation {
                    constraint: ADMISSION_ROOM_FKEY.to_string(),
                });
            }
        }
        let id = AdmissionId(self.inner.next_admission_id.fetch_add(1, Ordering::Relaxed));
        self.lock_fresh(RowKey::Admission(id))?;
        self.admissions
            .insert(id, Some(admission.clone().into_admission(id)));
        Ok(id)
    }

    async fn update_admission(&mut self, admission: &Admission) -> Result<(), StoreError> {
        let key = RowKey::Admission(admission.id);
        self.require_lock(key)?;
        {
            let tables = self.inner.tables.read();
            let Some(current) = self.view_admission(&tables, admission.id) else {
                return Err(StoreError::MissingRow {
                    resource: key.to_string(),
                });
            };
            // The reference is only checked when it changes.
            if current.room_id != admission.room_id
                && self.view_room(&tables, admission.room_id).is_none()
            {
                return Err(StoreError::ForeignKeyViolation {
                    constraint: ADMISSION_ROOM_FKEY.to_string(),
                });
            }
        }
        self.admissions.insert(admission.id, Some(admission.clone()));
        Ok(())
    }

    async fn delete_admission(&mut self, id: AdmissionId) -> Result<(), StoreError> {
        let key = RowKey::Admission(id);
        self.require_lock(key)?;
        {
            let tables = self.inner.tables.read();
            if self.view_admission(&tables, id).is_none() {
                return Err(StoreError::MissingRow {
                    resource: key.to_string(),
                });
            }
        }
        self.admissions.insert(id, None);
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        {
            let mut tables = self.inner.tables.write();
            self.check_constraints(&tables)?;
            for (id, row) in std::mem::take(&mut self.rooms) {
                match row {
                    Some(room) => tables.rooms.insert(id, room),
                    None => tables.rooms.remove(&id),
                };
            }
            for (id, row) in std::mem::take(&mut self.admissions) {
                match row {
                    Some(adm) => tables.admissions.insert(id, adm),
                    None => tables.admissions.remove(&id),
                };
            }
        }
        tracing::trace!(txn = self.serial, locks = self.held.len(), "memory transaction committed");
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.rooms.clear();
        self.admissions.clear();
        tracing::trace!(txn = self.serial, "memory transaction rolled back");
        Ok(())
    }
}
