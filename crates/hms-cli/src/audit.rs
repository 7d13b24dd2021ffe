//! # Audit Subcommand
//!
//! Checks every room's status against its open admissions on one committed
//! snapshot. Exits with [`EXIT_VIOLATIONS`](crate::EXIT_VIOLATIONS) when
//! anything is inconsistent.

use anyhow::Result;
use hms_occupancy::AuditReport;
use hms_store::ResourceStore;

use crate::{Session, EXIT_VIOLATIONS};

/// Execute `hms audit`.
pub async fn run_audit<S: ResourceStore>(session: &Session<S>) -> Result<u8> {
    let report = match session.service.audit().await {
        Ok(report) => report,
        Err(err) => return session.reject(err),
    };
    session.emit(&report, render)?;
    Ok(if report.is_consistent() {
        0
    } else {
        EXIT_VIOLATIONS
    })
}

fn render(report: &AuditReport) -> String {
    let mut out = format!(
        "Checked {} room(s), {} open admission(s): ",
        report.rooms_checked, report.open_admissions
    );
    if report.is_consistent() {
        out.push_str("consistent");
        return out;
    }
    out.push_str(&format!("{} violation(s)", report.violations.len()));
    for violation in &report.violations {
        out.push_str(&format!("\n  VIOLATION: {violation}"));
    }
    out
}
