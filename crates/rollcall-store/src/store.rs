//! [`SqliteStore`] — SQLite-backed roster provider and attendance store.
//!
//! Stands in for the deployment's remote data service behind the
//! `rollcall-core` collaborator traits. Cloning is cheap — the inner
//! connection is reference-counted.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;

use rollcall_core::store::{AttendanceStore, RosterProvider, StoreError, StoreHealth};
use rollcall_core::types::{AttendanceRecord, Status, Student};

use crate::schema::{REQUIRED_TABLES, SETUP_SQL};

#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

fn backend(e: tokio_rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    ///
    /// Does NOT provision the schema — callers probe [`check_health`] first
    /// and decide whether to run [`init_schema`], so a missing deployment is
    /// observable rather than silently papered over.
    ///
    /// [`check_health`]: AttendanceStore::check_health
    /// [`init_schema`]: Self::init_schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Open an in-memory store — useful for testing.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Apply [`SETUP_SQL`]. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SETUP_SQL)?;
                Ok(())
            })
            .await
            .map_err(backend)
    }

    /// Register a new student. Returns `false` when the id is already taken.
    pub async fn add_student(&self, student: &Student) -> Result<bool, StoreError> {
        let s = student.clone();
        self.conn
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO students (id, name, photo_url, class_name)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![s.id, s.name, s.photo_url, s.class_name],
                )?;
                Ok(inserted > 0)
            })
            .await
            .map_err(backend)
    }

    /// Remove a student by id. Returns `false` when no such row existed.
    /// Attendance history is retained — records are never deleted.
    pub async fn remove_student(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let removed =
                    conn.execute("DELETE FROM students WHERE id = ?1", rusqlite::params![id])?;
                Ok(removed > 0)
            })
            .await
            .map_err(backend)
    }

    pub async fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, name, photo_url, class_name FROM students WHERE id = ?1",
                        rusqlite::params![id],
                        |row| {
                            Ok(Student {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                photo_url: row.get(2)?,
                                class_name: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(backend)
    }
}

/// Raw `attendance_logs` row, decoded outside the connection closure.
struct RawRecord {
    id: String,
    student_id: String,
    student_name: String,
    timestamp: String,
    date: String,
    status: String,
    confidence: f64,
}

impl RawRecord {
    fn decode(self) -> Result<AttendanceRecord, StoreError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| StoreError::Backend(format!("bad timestamp {:?}: {e}", self.timestamp)))?
            .with_timezone(&Utc);
        let date = NaiveDate::from_str(&self.date)
            .map_err(|e| StoreError::Backend(format!("bad date {:?}: {e}", self.date)))?;
        let status = Status::from_str(&self.status)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(AttendanceRecord {
            id: self.id,
            student_id: self.student_id,
            student_name: self.student_name,
            timestamp,
            date,
            status,
            confidence: self.confidence as f32,
        })
    }
}

impl RosterProvider for SqliteStore {
    async fn list(&self) -> Result<Vec<Student>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, photo_url, class_name FROM students ORDER BY name",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(Student {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            photo_url: row.get(2)?,
                            class_name: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(backend)
    }
}

impl AttendanceStore for SqliteStore {
    async fn append_attendance(&self, record: &AttendanceRecord) -> Result<bool, StoreError> {
        let r = record.clone();
        self.conn
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO attendance_logs
                     (id, student_id, student_name, timestamp, date, status, confidence)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        r.id,
                        r.student_id,
                        r.student_name,
                        r.timestamp.to_rfc3339(),
                        r.date.to_string(),
                        r.status.as_str(),
                        r.confidence as f64,
                    ],
                )?;
                Ok(inserted > 0)
            })
            .await
            .map_err(backend)
    }

    async fn fetch_attendance(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        let raw = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, student_id, student_name, timestamp, date, status, confidence
                     FROM attendance_logs ORDER BY timestamp DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(RawRecord {
                            id: row.get(0)?,
                            student_id: row.get(1)?,
                            student_name: row.get(2)?,
                            timestamp: row.get(3)?,
                            date: row.get(4)?,
                            status: row.get(5)?,
                            confidence: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(backend)?;

        raw.into_iter().map(RawRecord::decode).collect()
    }

    async fn check_health(&self) -> Result<StoreHealth, StoreError> {
        let result = self
            .conn
            .call(|conn| {
                let mut present = 0usize;
                for table in REQUIRED_TABLES {
                    let found: Option<String> = conn
                        .query_row(
                            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                            rusqlite::params![table],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if found.is_some() {
                        present += 1;
                    }
                }
                Ok(present)
            })
            .await;

        match result {
            Ok(present) => Ok(StoreHealth {
                reachable: true,
                missing_schema: present < REQUIRED_TABLES.len(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "store health probe failed");
                Ok(StoreHealth { reachable: false, missing_schema: false })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.into(),
            name: name.into(),
            photo_url: format!("https://example.org/{id}.jpg"),
            class_name: "ECE - Sem 5 - A".into(),
        }
    }

    async fn provisioned() -> SqliteStore {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn health_reports_missing_schema_until_provisioned() {
        let store = SqliteStore::open_in_memory().await.unwrap();

        let health = store.check_health().await.unwrap();
        assert!(health.reachable);
        assert!(health.missing_schema);

        store.init_schema().await.unwrap();
        store.init_schema().await.unwrap(); // idempotent

        let health = store.check_health().await.unwrap();
        assert!(health.reachable);
        assert!(!health.missing_schema);
    }

    #[tokio::test]
    async fn roster_add_list_remove() {
        let store = provisioned().await;

        assert!(store.add_student(&student("S2", "Bob Smith")).await.unwrap());
        assert!(store.add_student(&student("S1", "Alice Johnson")).await.unwrap());
        assert!(
            !store.add_student(&student("S1", "Alice Again")).await.unwrap(),
            "duplicate roster codes are rejected"
        );

        let roster = store.list().await.unwrap();
        let names: Vec<&str> = roster.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alice Johnson", "Bob Smith"]);

        assert!(store.remove_student("S1").await.unwrap());
        assert!(!store.remove_student("S1").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.get_student("S2").await.unwrap().is_some());
        assert!(store.get_student("S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attendance_round_trips_newest_first() {
        let store = provisioned().await;
        let alice = student("S1", "Alice Johnson");
        let bob = student("S2", "Bob Smith");

        let mut older = AttendanceRecord::present_now(&alice, 98.5);
        older.timestamp = older.timestamp - Duration::hours(2);
        let newer = AttendanceRecord::present_now(&bob, 91.0);

        assert!(store.append_attendance(&older).await.unwrap());
        assert!(store.append_attendance(&newer).await.unwrap());
        assert!(
            !store.append_attendance(&newer).await.unwrap(),
            "same record id is not stored twice"
        );

        let fetched = store.fetch_attendance().await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].student_id, "S2");
        assert_eq!(fetched[1].student_id, "S1");
        assert_eq!(fetched[1].status, Status::Present);
        assert!((fetched[1].confidence - 98.5).abs() < 1e-3);
        assert_eq!(fetched[1].date, older.date);
    }

    #[tokio::test]
    async fn append_without_schema_is_a_backend_error() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let record = AttendanceRecord::present_now(&student("S1", "Alice"), 90.0);
        let err = store.append_attendance(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
