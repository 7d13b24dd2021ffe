//! # hms-store: Transactional Record Store
//!
//! Persistence for rooms and admissions behind a small transactional
//! contract ([`ResourceStore`] / [`StoreTransaction`]) with exclusive row
//! locks and a bounded lock wait.
//!
//! Two engines implement it:
//!
//! - [`MemoryStore`]: process-local tables with per-row async mutexes.
//! - [`PgStore`]: PostgreSQL via SQLx, `SELECT ... FOR UPDATE` and a
//!   transaction-local `lock_timeout`.
//!
//! Both report the same [`StoreError`] variants for lock timeouts and
//! constraint violations, so callers can treat them interchangeably.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::{StoreConfig, DEFAULT_LOCK_TIMEOUT};
pub use error::{StoreError, ADMISSION_ROOM_FKEY, ONE_OPEN_ADMISSION_INDEX, ROOM_NUMBER_KEY};
pub use memory::{MemoryStore, MemoryTransaction};
pub use postgres::{PgStore, PgTransaction};
pub use store::{OccupancySnapshot, ResourceStore, StoreTransaction};
