//! # hms-cli: Operator CLI for Room Occupancy
//!
//! Provides the `hms` command-line interface over a PostgreSQL store.
//!
//! ## Subcommands
//!
//! - `hms migrate`: apply the embedded schema migrations.
//! - `hms room`: create, update, delete, show and list available rooms.
//! - `hms admission`: admit, transfer, discharge, delete and show.
//! - `hms audit`: report rooms whose status disagrees with their admissions.
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | Success |
//! | 1    | Rejected operation or runtime failure |
//! | 2    | Audit found violations |
//! | 75   | Busy: a row lock was not granted in time, retry |
//!
//! ```bash
//! hms --as-user 12 --as-role staff room create --number 101 --type ICU
//! hms --as-user 12 admission admit --patient 4 --room 1
//! HMS_ACTOR_ID=12 hms --json audit
//! ```

pub mod admission;
pub mod audit;
pub mod config;
pub mod room;

use anyhow::{Context, Result};
use hms_core::{Actor, Role};
use hms_occupancy::{ErrorKind, OccupancyError, OccupancyService};
use hms_store::ResourceStore;
use serde::Serialize;

/// Exit code for a rejected operation.
pub const EXIT_REJECTED: u8 = 1;
/// Exit code for an audit that found violations.
pub const EXIT_VIOLATIONS: u8 = 2;
/// Exit code for lock contention (sysexits `EX_TEMPFAIL`).
pub const EXIT_BUSY: u8 = 75;

/// Everything a subcommand handler needs: the service, the caller, and the
/// output mode.
#[derive(Debug)]
pub struct Session<S> {
    pub service: OccupancyService<S>,
    pub actor: Actor,
    pub json: bool,
}

impl<S: ResourceStore> Session<S> {
    pub fn new(service: OccupancyService<S>, actor: Actor, json: bool) -> Self {
        Self {
            service,
            actor,
            json,
        }
    }

    /// Print `value` as JSON, or the human-readable line from `human`.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", human(value));
        }
        Ok(())
    }

    /// Print the outcome of an operation and choose the exit code.
    pub fn finish<T: Serialize>(
        &self,
        result: Result<T, OccupancyError>,
        human: impl FnOnce(&T) -> String,
    ) -> Result<u8> {
        match result {
            Ok(value) => {
                self.emit(&value, human)?;
                Ok(0)
            }
            Err(err) => self.reject(err),
        }
    }

    /// Report a rejected operation. Store failures propagate as errors.
    pub fn reject(&self, err: OccupancyError) -> Result<u8> {
        let kind = err.kind();
        if kind == ErrorKind::Internal {
            return Err(anyhow::Error::new(err));
        }
        if self.json {
            let body = serde_json::json!({
                "error": kind,
                "message": err.to_string(),
                "retryable": err.is_retryable(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        } else {
            eprintln!("REJECTED ({}): {err}", kind.as_str());
        }
        Ok(exit_code(kind))
    }
}

/// Caller named by `--as-user` and `--as-role`. Commands that read or
/// change occupancy refuse to run without a positive user id.
pub fn resolve_actor(user_id: Option<i64>, role: Role) -> Result<Actor> {
    let user_id = user_id.context("no caller given: pass --as-user or set HMS_ACTOR_ID")?;
    anyhow::ensure!(user_id > 0, "--as-user must be a positive user id, got {user_id}");
    Ok(Actor::new(user_id, role))
}

/// Exit code for a rejected operation of `kind`.
pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Busy => EXIT_BUSY,
        _ => EXIT_REJECTED,
    }
}
