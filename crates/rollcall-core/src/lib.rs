//! rollcall-core — Attendance domain: roster types, detection oracle
//! contract, duplicate guard, and the append-only ledger.
//!
//! The face-recognition capability itself is opaque; this crate defines the
//! contract the session loop consumes and ships a simulated implementation.

pub mod guard;
pub mod ledger;
pub mod oracle;
pub mod store;
pub mod types;

pub use ledger::AttendanceLog;
pub use oracle::{DetectionOracle, ScriptedOracle, SimulatedOracle};
pub use types::{AttendanceRecord, DetectionCandidate, FaceBox, Status, Student};
