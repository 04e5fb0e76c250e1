use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A registered identity in the roster.
///
/// `id` is the user-assigned alphanumeric code (e.g. a university seat
/// number) and is the natural key everywhere in the system. The photo is a
/// reference, never pixel data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub photo_url: String,
    pub class_name: String,
}

/// Attendance status of a single record.
///
/// The recognition loop only ever produces [`Status::Present`]; absence and
/// lateness records come from external processes but must round-trip through
/// the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Present,
    Absent,
    Late,
}

impl Status {
    /// Stable wire/storage form ("Present", "Absent", "Late").
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "Present",
            Status::Absent => "Absent",
            Status::Late => "Late",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown attendance status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Present" => Ok(Status::Present),
            "Absent" => Ok(Status::Absent),
            "Late" => Ok(Status::Late),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One committed attendance event.
///
/// Invariant (enforced by the duplicate guard at submission time): at most
/// one `Present` record exists per (`student_id`, `date`) pair in the
/// committed log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// System-generated unique token (UUID v4, stored as text).
    pub id: String,
    pub student_id: String,
    /// Denormalized copy of the student's name at creation time.
    pub student_name: String,
    /// Event instant, full precision.
    pub timestamp: DateTime<Utc>,
    /// Calendar day in the session's local timezone; the grouping key for
    /// "already present today".
    pub date: NaiveDate,
    pub status: Status,
    /// Recognition confidence in [0, 100].
    pub confidence: f32,
}

impl AttendanceRecord {
    /// Synthesize a `Present` record for a matched student at the current
    /// instant. The grouping day comes from the local clock, not UTC.
    pub fn present_now(student: &Student, confidence: f32) -> Self {
        let now = Local::now();
        Self {
            id: Uuid::new_v4().to_string(),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            timestamp: now.with_timezone(&Utc),
            date: now.date_naive(),
            status: Status::Present,
            confidence,
        }
    }
}

/// The local calendar day used for duplicate grouping.
///
/// Computed once per tick by the session loop, never per record.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Bounding region of a detected face, in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single poll tick's detection output.
///
/// `matched: None` with a region present means "someone is there, not
/// recognized" — surfaced as UNKNOWN, never silently dropped. Ephemeral:
/// produced once per tick, consumed immediately, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    pub matched: Option<Student>,
    /// Confidence in [0, 100].
    pub confidence: f32,
    pub region: FaceBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student {
            id: "02JST24UCS043".into(),
            name: "Alice Johnson".into(),
            photo_url: "https://example.org/alice.jpg".into(),
            class_name: "CSE - Sem 3 - A".into(),
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [Status::Present, Status::Absent, Status::Late] {
            let parsed: Status = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn status_rejects_unknown_str() {
        let err = "Vanished".parse::<Status>().unwrap_err();
        assert!(err.to_string().contains("Vanished"));
    }

    #[test]
    fn present_now_snapshots_student_fields() {
        let s = student();
        let record = AttendanceRecord::present_now(&s, 91.5);

        assert_eq!(record.student_id, s.id);
        assert_eq!(record.student_name, s.name);
        assert_eq!(record.status, Status::Present);
        assert_eq!(record.confidence, 91.5);
        assert!(!record.id.is_empty());
    }

    #[test]
    fn present_now_groups_by_local_day() {
        let record = AttendanceRecord::present_now(&student(), 90.0);
        assert_eq!(record.date, local_today());
        // The stored instant is UTC; re-localizing it must land on the
        // grouping day.
        assert_eq!(record.timestamp.with_timezone(&Local).date_naive(), record.date);
    }

    #[test]
    fn present_now_ids_are_unique() {
        let s = student();
        let a = AttendanceRecord::present_now(&s, 90.0);
        let b = AttendanceRecord::present_now(&s, 90.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn record_serde_round_trip() {
        let record = AttendanceRecord::present_now(&student(), 88.25);
        let json = serde_json::to_string(&record).unwrap();
        let back: AttendanceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(json.contains("\"Present\""));
    }
}
