//! # Store Errors
//!
//! Every engine reports failures through [`StoreError`]. PostgreSQL errors
//! are classified by SQLSTATE so that lock timeouts, deadlocks and constraint
//! violations surface as the same variants the in-memory engine produces.

use thiserror::Error;

/// Name of the unique constraint on `rooms.room_number`.
pub const ROOM_NUMBER_KEY: &str = "rooms_room_number_key";

/// Name of the partial unique index allowing one open admission per room.
pub const ONE_OPEN_ADMISSION_INDEX: &str = "admissions_one_open_per_room";

/// Name of the foreign key from `admissions.room_id` to `rooms.id`.
pub const ADMISSION_ROOM_FKEY: &str = "admissions_room_id_fkey";

/// Failure reported by a [`ResourceStore`](crate::ResourceStore) engine.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A row lock was not granted within the configured wait.
    #[error("timed out waiting for lock on {resource}")]
    LockTimeout {
        /// The row (or pool) that could not be acquired.
        resource: String,
    },

    /// The database aborted the transaction to break a lock cycle.
    #[error("deadlock detected while locking {resource}")]
    Deadlock {
        /// The row being locked when the cycle was detected.
        resource: String,
    },

    /// No pooled connection became free within the acquire timeout.
    #[error("connection pool exhausted")]
    PoolTimedOut,

    /// A unique constraint or index rejected the write.
    #[error("unique constraint {constraint} violated")]
    UniqueViolation {
        /// Constraint or index name.
        constraint: String,
    },

    /// A foreign key rejected the write.
    #[error("foreign key {constraint} violated")]
    ForeignKeyViolation {
        /// Constraint name.
        constraint: String,
    },

    /// A write targeted a row the transaction had not locked.
    #[error("write to {resource} without holding its lock")]
    Unlocked {
        /// The row that was written.
        resource: String,
    },

    /// A write targeted a row that does not exist.
    #[error("{resource} does not exist")]
    MissingRow {
        /// The row that was written.
        resource: String,
    },

    /// A stored row could not be decoded into a record.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Embedded migrations failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Whether retrying the whole operation may succeed.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::Deadlock { .. } | Self::PoolTimedOut
        )
    }

    /// Classify a database error raised while working on `resource`.
    pub fn from_sqlx(err: sqlx::Error, resource: impl Into<String>) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::PoolTimedOut,
            sqlx::Error::Database(db) => {
                let constraint = db.constraint().unwrap_or_default().to_string();
                let code = db.code().map(|c| c.into_owned());
                match code.as_deref() {
                    Some("55P03") => Self::LockTimeout {
                        resource: resource.into(),
                    },
                    Some("40P01") => Self::Deadlock {
                        resource: resource.into(),
                    },
                    Some("23505") => Self::UniqueViolation { constraint },
                    Some("23503") => Self::ForeignKeyViolation { constraint },
                    _ => Self::Database(sqlx::Error::Database(db)),
                }
            }
            other => Self::Database(other),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_sqlx(err, "row")
    }
}
