//! # hms-occupancy: Room Occupancy Consistency
//!
//! Keeps every room's status in agreement with its admissions while
//! patients are admitted, transferred, discharged and deleted concurrently.
//!
//! A room is `occupied` exactly when one admission for it is open, and
//! `available` or `maintenance` exactly when none is. Every operation
//! re-reads what it needs after taking the row locks, checks this rule, and
//! commits all of its writes or none of them.
//!
//! ## Modules
//!
//! - [`consistency`]: the status rule as pure functions.
//! - [`registry`]: room create, update and delete.
//! - [`admission`]: admit, transfer, discharge and delete.
//! - [`txn`]: the commit-or-rollback wrapper every operation runs in.
//! - [`audit`]: read-only detection of stored violations.
//! - [`service`]: [`OccupancyService`], the facade over all of the above.

pub mod admission;
pub mod audit;
pub mod consistency;
pub mod error;
pub mod registry;
pub mod service;
pub mod txn;

pub use admission::AdmissionLifecycleManager;
pub use audit::{audit_snapshot, AuditReport, Violation};
pub use consistency::can_set_status;
pub use error::{ErrorKind, OccupancyError};
pub use registry::RoomRegistry;
pub use service::OccupancyService;
pub use txn::transact;
