//! rollcall-store — SQLite backend for the roster and attendance log.
//!
//! Implements the `rollcall-core` collaborator traits; the daemon treats it
//! as the remote persistence service.

pub mod schema;
pub mod store;

pub use schema::SETUP_SQL;
pub use store::SqliteStore;
