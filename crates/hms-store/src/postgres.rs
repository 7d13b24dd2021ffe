//! # PostgreSQL Store
//!
//! Row locks are `SELECT ... FOR UPDATE`. Every read-write transaction sets
//! `lock_timeout` locally, so a contended lock fails with SQLSTATE 55P03
//! instead of waiting indefinitely; [`StoreError::from_sqlx`] turns that into
//! [`StoreError::LockTimeout`].
//!
//! Schema lives in `migrations/` and is embedded with `sqlx::migrate!`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hms_core::{
    Admission, AdmissionId, NewAdmission, NewRoom, PatientId, Room, RoomId, RoomStatus,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{OccupancySnapshot, ResourceStore, StoreTransaction};

const ROOM_COLUMNS: &str = "id, room_number, type AS room_type, status";
const ADMISSION_COLUMNS: &str = "id, patient_id, room_id, admitted_on, discharged_on, notes";

/// Store backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PgStore {
    /// Connect a pool to `url`. Migrations are not run; see [`PgStore::migrate`].
    pub async fn connect(url: &str, config: StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await?;
        tracing::info!(
            max_connections = config.max_connections,
            lock_timeout_ms = config.lock_timeout_ms() as u64,
            "connected to PostgreSQL"
        );
        Ok(Self { pool, config })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.config.lock_timeout_ms()))
            .execute(&mut *tx)
            .await?;
        Ok(PgTransaction {
            tx,
            locked: HashSet::new(),
        })
    }

    async fn room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(RoomRow::into_room).transpose()
    }

    async fn admission(&self, id: AdmissionId) -> Result<Option<Admission>, StoreError> {
        let row = sqlx::query_as::<_, AdmissionRow>(&format!(
            "SELECT {ADMISSION_COLUMNS} FROM admissions WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AdmissionRow::into_admission))
    }

    async fn available_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let rows = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE status = 'available' ORDER BY room_number"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(RoomRow::into_room).collect()
    }

    async fn snapshot(&self) -> Result<OccupancySnapshot, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        let rooms = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms ORDER BY id"
        ))
        .fetch_all(&mut *tx)
        .await?;
        let admissions = sqlx::query_as::<_, AdmissionRow>(&format!(
            "SELECT {ADMISSION_COLUMNS} FROM admissions WHERE discharged_on IS NULL ORDER BY id"
        ))
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(OccupancySnapshot {
            rooms: rooms
                .into_iter()
                .map(RoomRow::into_room)
                .collect::<Result<_, _>>()?,
            open_admissions: admissions
                .into_iter()
                .map(AdmissionRow::into_admission)
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Locked {
    Room(i64),
    Admission(i64),
}

/// Read-write transaction on a pooled connection.
///
/// Dropping it without commit returns the connection to the pool and rolls
/// the transaction back.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<Locked>,
}

impl std::fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTransaction")
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

impl PgTransaction {
    fn require_lock(&self, key: Locked) -> Result<(), StoreError> {
        if self.locked.contains(&key) {
            return Ok(());
        }
        let resource = match key {
            Locked::Room(id) => RoomId(id).to_string(),
            Locked::Admission(id) => AdmissionId(id).to_string(),
        };
        Err(StoreError::Unlocked { resource })
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| StoreError::from_sqlx(e, id.to_string()))?;
        self.locked.insert(Locked::Room(id.get()));
        row.map(RoomRow::into_room).transpose()
    }

    async fn lock_admission(&mut self, id: AdmissionId) -> Result<Option<Admission>, StoreError> {
        let row = sqlx::query_as::<_, AdmissionRow>(&format!(
            "SELECT {ADMISSION_COLUMNS} FROM admissions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| StoreError::from_sqlx(e, id.to_string()))?;
        self.locked.insert(Locked::Admission(id.get()));
        Ok(row.map(AdmissionRow::into_admission))
    }

    async fn count_open_admissions(&mut self, room: RoomId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM admissions WHERE room_id = $1 AND discharged_on IS NULL",
        )
        .bind(room.get())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn room_number_in_use(
        &mut self,
        room_number: &str,
        excluding: Option<RoomId>,
    ) -> Result<bool, StoreError> {
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM rooms
                WHERE room_number = $1 AND ($2::BIGINT IS NULL OR id <> $2)
             )",
        )
        .bind(room_number)
        .bind(excluding.map(RoomId::get))
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(in_use)
    }

    async fn insert_room(&mut self, room: &NewRoom) -> Result<RoomId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO rooms (room_number, type, status) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&room.room_number)
        .bind(&room.room_type)
        .bind(room.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        self.locked.insert(Locked::Room(id));
        Ok(RoomId(id))
    }

    async fn update_room(&mut self, room: &Room) -> Result<(), StoreError> {
        self.require_lock(Locked::Room(room.id.get()))?;
        let result =
            sqlx::query("UPDATE rooms SET room_number = $1, type = $2, status = $3 WHERE id = $4")
                .bind(&room.room_number)
                .bind(&room.room_type)
                .bind(room.status.as_str())
                .bind(room.id.get())
                .execute(&mut *self.tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                resource: room.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_room(&mut self, id: RoomId) -> Result<(), StoreError> {
        self.require_lock(Locked::Room(id.get()))?;
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::from_sqlx(e, id.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                resource: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_admission(
        &mut self,
        admission: &NewAdmission,
    ) -> Result<AdmissionId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO admissions (patient_id, room_id, admitted_on, notes)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(admission.patient_id.get())
        .bind(admission.room_id.get())
        .bind(admission.admitted_on)
        .bind(&admission.notes)
        .fetch_one(&mut *self.tx)
        .await?;
        self.locked.insert(Locked::Admission(id));
        Ok(AdmissionId(id))
    }

    async fn update_admission(&mut self, admission: &Admission) -> Result<(), StoreError> {
        self.require_lock(Locked::Admission(admission.id.get()))?;
        let result = sqlx::query(
            "UPDATE admissions
             SET patient_id = $1, room_id = $2, admitted_on = $3, discharged_on = $4, notes = $5
             WHERE id = $6",
        )
        .bind(admission.patient_id.get())
        .bind(admission.room_id.get())
        .bind(admission.admitted_on)
        .bind(admission.discharged_on)
        .bind(&admission.notes)
        .bind(admission.id.get())
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                resource: admission.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_admission(&mut self, id: AdmissionId) -> Result<(), StoreError> {
        self.require_lock(Locked::Admission(id.get()))?;
        let result = sqlx::query("DELETE FROM admissions WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                resource: id.to_string(),
            });
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct RoomRow {
    id: i64,
    room_number: String,
    room_type: Option<String>,
    status: String,
}

impl RoomRow {
    fn into_room(self) -> Result<Room, StoreError> {
        // The CHECK constraint makes this unreachable unless the schema drifted.
        let status: RoomStatus = self.status.parse().map_err(|e| {
            tracing::error!(
                id = self.id,
                status = %self.status,
                error = %e,
                "unknown room status in database"
            );
            StoreError::Corrupt(format!("room:{} has status {:?}", self.id, self.status))
        })?;
        Ok(Room {
            id: RoomId(self.id),
            room_number: self.room_number,
            room_type: self.room_type,
            status,
        })
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct AdmissionRow {
    id: i64,
    patient_id: i64,
    room_id: i64,
    admitted_on: DateTime<Utc>,
    discharged_on: Option<DateTime<Utc>>,
    notes: Option<String>,
}

impl AdmissionRow {
    fn into_admission(self) -> Admission {
        Admission {
            id: AdmissionId(self.id),
            patient_id: PatientId(self.patient_id),
            room_id: RoomId(self.room_id),
            admitted_on: self.admitted_on,
            discharged_on: self.discharged_on,
            notes: self.notes,
        }
    }
}
