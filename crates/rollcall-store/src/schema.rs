//! SQL schema for the attendance store.
//!
//! The same DDL the operator console shows when a deployment's tables are
//! missing. Idempotent thanks to `CREATE TABLE IF NOT EXISTS`.

pub const SETUP_SQL: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS students (
    id         TEXT PRIMARY KEY,   -- user-assigned roster code
    name       TEXT NOT NULL,
    photo_url  TEXT NOT NULL DEFAULT '',
    class_name TEXT NOT NULL DEFAULT ''
);

-- Attendance records are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS attendance_logs (
    id           TEXT PRIMARY KEY,  -- UUID v4
    student_id   TEXT NOT NULL,
    student_name TEXT NOT NULL,     -- snapshot at creation time
    timestamp    TEXT NOT NULL,     -- ISO 8601 UTC
    date         TEXT NOT NULL,     -- YYYY-MM-DD, local grouping day
    status       TEXT NOT NULL,     -- 'Present' | 'Absent' | 'Late'
    confidence   REAL NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_attendance_logs_date
    ON attendance_logs(date);
";

/// Tables the health probe requires before the store counts as provisioned.
pub const REQUIRED_TABLES: [&str; 2] = ["students", "attendance_logs"];
