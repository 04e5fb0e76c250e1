//! Collaborator contracts for the roster and the remote attendance store.
//!
//! The recognition loop only ever talks to these traits; concrete backends
//! live elsewhere (`rollcall-store` ships the SQLite one). All methods
//! return `Send` futures so implementations can be driven from a
//! multi-threaded tokio runtime.

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::types::{AttendanceRecord, Student};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("store schema missing")]
    MissingSchema,
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result of the store health probe.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreHealth {
    pub reachable: bool,
    /// The store answered but its tables are not provisioned.
    pub missing_schema: bool,
}

/// Supplies the set of known identities.
///
/// Observed at session start and on every tick — roster changes mid-session
/// are picked up, never cached stale.
pub trait RosterProvider: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<Student>, StoreError>> + Send;
}

/// Remote persistence for attendance records.
///
/// `append_attendance` answers with a success flag rather than echoing the
/// record; the local ledger is authoritative regardless of the outcome.
pub trait AttendanceStore: Send + Sync {
    fn append_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn fetch_attendance(
        &self,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, StoreError>> + Send;

    fn check_health(&self) -> impl Future<Output = Result<StoreHealth, StoreError>> + Send;
}
