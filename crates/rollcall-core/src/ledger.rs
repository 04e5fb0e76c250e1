//! Append-only attendance ledger.
//!
//! The local, authoritative log the recognition loop reads and the commit
//! pipeline writes. Single-writer by construction: `append` takes `&mut
//! self`, and the commit pipeline is the only component holding a writable
//! handle. Records are kept most-recent-first, mirroring the display order
//! of the console.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::NaiveDate;

use crate::types::{AttendanceRecord, Status};

/// In-memory ordered log with a per-day presence index.
///
/// The index makes the duplicate check O(1) per tick instead of a scan over
/// the day's records.
#[derive(Debug, Default)]
pub struct AttendanceLog {
    records: VecDeque<AttendanceRecord>,
    present: HashMap<NaiveDate, HashSet<String>>,
}

impl AttendanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bootstrap the ledger from the remote store's history.
    ///
    /// Input order is not trusted; records are re-sorted so the newest event
    /// ends up at the front.
    pub fn seed(mut records: Vec<AttendanceRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        let mut log = Self::new();
        for record in records {
            log.append(record);
        }
        tracing::debug!(records = log.len(), "ledger seeded from store history");
        log
    }

    /// Append one record at the front of the log.
    pub fn append(&mut self, record: AttendanceRecord) {
        if record.status == Status::Present {
            self.present
                .entry(record.date)
                .or_default()
                .insert(record.student_id.clone());
        }
        self.records.push_front(record);
    }

    /// Was this student already marked `Present` on the given day?
    pub fn is_present(&self, student_id: &str, day: NaiveDate) -> bool {
        self.present
            .get(&day)
            .is_some_and(|ids| ids.contains(student_id))
    }

    /// Records, most recent first.
    pub fn records(&self) -> impl Iterator<Item = &AttendanceRecord> {
        self.records.iter()
    }

    /// Cloned snapshot for display or IPC, most recent first.
    pub fn snapshot(&self) -> Vec<AttendanceRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Student;
    use chrono::{Duration, Utc};

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.into(),
            name: name.into(),
            photo_url: String::new(),
            class_name: "CSE - Sem 3 - A".into(),
        }
    }

    #[test]
    fn append_keeps_most_recent_first() {
        let mut log = AttendanceLog::new();
        log.append(AttendanceRecord::present_now(&student("S1", "Alice"), 90.0));
        log.append(AttendanceRecord::present_now(&student("S2", "Bob"), 92.0));

        let ids: Vec<&str> = log.records().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["S2", "S1"]);
    }

    #[test]
    fn is_present_tracks_day_and_student() {
        let mut log = AttendanceLog::new();
        let record = AttendanceRecord::present_now(&student("S1", "Alice"), 90.0);
        let day = record.date;
        log.append(record);

        assert!(log.is_present("S1", day));
        assert!(!log.is_present("S2", day));
        assert!(!log.is_present("S1", day.succ_opt().unwrap()));
    }

    #[test]
    fn non_present_records_do_not_mark_presence() {
        let mut log = AttendanceLog::new();
        let mut record = AttendanceRecord::present_now(&student("S1", "Alice"), 0.0);
        record.status = Status::Absent;
        let day = record.date;
        log.append(record);

        assert!(!log.is_present("S1", day));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn seed_sorts_newest_first_and_indexes_presence() {
        let older = {
            let mut r = AttendanceRecord::present_now(&student("S1", "Alice"), 98.5);
            r.timestamp = Utc::now() - Duration::days(1);
            r
        };
        let newer = AttendanceRecord::present_now(&student("S2", "Bob"), 91.0);
        let newer_day = newer.date;

        // Seed oldest-last on purpose; seeding must not trust input order.
        let log = AttendanceLog::seed(vec![newer.clone(), older.clone()]);

        let ids: Vec<&str> = log.records().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["S2", "S1"]);
        assert!(log.is_present("S2", newer_day));
        assert!(log.is_present("S1", older.date));
    }

    #[test]
    fn snapshot_is_detached_from_the_log() {
        let mut log = AttendanceLog::new();
        log.append(AttendanceRecord::present_now(&student("S1", "Alice"), 90.0));
        let snap = log.snapshot();
        log.append(AttendanceRecord::present_now(&student("S2", "Bob"), 90.0));

        assert_eq!(snap.len(), 1);
        assert_eq!(log.len(), 2);
    }
}
