//! Duplicate guard — classifies a detection against the day's ledger.
//!
//! Runs once per tick, before any commit attempt. Pure read over the ledger
//! snapshot; the commit pipeline appends synchronously, so the next tick's
//! classification always observes this tick's commit.

use chrono::NaiveDate;

use crate::ledger::AttendanceLog;
use crate::types::DetectionCandidate;

/// Minimum confidence (exclusive) for a candidate to be eligible for commit.
pub const CONFIDENCE_THRESHOLD: f32 = 85.0;

/// Classification outcome for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Matched identity, not yet marked present today.
    New,
    /// Matched identity, already marked present today.
    Duplicate,
    /// Face present but no matched identity.
    Unknown,
}

/// Outcome plus the operator-facing HUD label.
#[derive(Debug, Clone)]
pub struct Classification {
    pub outcome: Outcome,
    pub label: String,
}

/// Classify one candidate against the committed log for `today`.
///
/// `today` is computed once per tick by the caller, never per record.
pub fn classify(
    candidate: &DetectionCandidate,
    ledger: &AttendanceLog,
    today: NaiveDate,
) -> Classification {
    match &candidate.matched {
        None => Classification {
            outcome: Outcome::Unknown,
            label: "UNKNOWN_ENTITY".to_string(),
        },
        Some(student) => {
            if ledger.is_present(&student.id, today) {
                Classification {
                    outcome: Outcome::Duplicate,
                    label: format!("ALREADY LOGGED: {}", student.name),
                }
            } else {
                Classification {
                    outcome: Outcome::New,
                    label: format!("MATCH: {}", student.name),
                }
            }
        }
    }
}

/// Commit eligibility gate: confidence strictly above the threshold and a
/// matched identity. DUPLICATE candidates pass the gate — they are
/// acknowledged (and drive targeted-mode exit) but never re-submitted.
pub fn eligible(candidate: &DetectionCandidate, classification: &Classification) -> bool {
    classification.outcome != Outcome::Unknown && candidate.confidence > CONFIDENCE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{local_today, AttendanceRecord, FaceBox, Student};

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.into(),
            name: name.into(),
            photo_url: String::new(),
            class_name: "ISE - Sem 3 - B".into(),
        }
    }

    fn candidate(matched: Option<Student>, confidence: f32) -> DetectionCandidate {
        DetectionCandidate {
            matched,
            confidence,
            region: FaceBox { x: 100.0, y: 80.0, width: 288.0, height: 288.0 },
        }
    }

    #[test]
    fn no_match_classifies_unknown() {
        let ledger = AttendanceLog::new();
        let c = candidate(None, 25.0);
        let cls = classify(&c, &ledger, local_today());

        assert_eq!(cls.outcome, Outcome::Unknown);
        assert_eq!(cls.label, "UNKNOWN_ENTITY");
    }

    #[test]
    fn fresh_match_classifies_new() {
        let ledger = AttendanceLog::new();
        let c = candidate(Some(student("S1", "Alice Johnson")), 90.0);
        let cls = classify(&c, &ledger, local_today());

        assert_eq!(cls.outcome, Outcome::New);
        assert_eq!(cls.label, "MATCH: Alice Johnson");
    }

    #[test]
    fn present_today_classifies_duplicate() {
        let s = student("S1", "Alice Johnson");
        let mut ledger = AttendanceLog::new();
        ledger.append(AttendanceRecord::present_now(&s, 98.0));

        let c = candidate(Some(s), 92.0);
        let cls = classify(&c, &ledger, local_today());

        assert_eq!(cls.outcome, Outcome::Duplicate);
        assert_eq!(cls.label, "ALREADY LOGGED: Alice Johnson");
    }

    #[test]
    fn presence_on_another_day_is_not_a_duplicate() {
        let s = student("S1", "Alice Johnson");
        let mut ledger = AttendanceLog::new();
        ledger.append(AttendanceRecord::present_now(&s, 98.0));

        let tomorrow = local_today().succ_opt().unwrap();
        let c = candidate(Some(s), 92.0);
        assert_eq!(classify(&c, &ledger, tomorrow).outcome, Outcome::New);
    }

    #[test]
    fn threshold_gate_is_strict() {
        let ledger = AttendanceLog::new();
        let today = local_today();

        let at_threshold = candidate(Some(student("S1", "Alice")), 85.0);
        let cls = classify(&at_threshold, &ledger, today);
        assert!(!eligible(&at_threshold, &cls), "confidence == 85 must not commit");

        let above = candidate(Some(student("S1", "Alice")), 85.1);
        let cls = classify(&above, &ledger, today);
        assert!(eligible(&above, &cls));
    }

    #[test]
    fn unknown_is_never_eligible() {
        let ledger = AttendanceLog::new();
        let c = candidate(None, 99.0);
        let cls = classify(&c, &ledger, local_today());
        assert!(!eligible(&c, &cls));
    }

    #[test]
    fn duplicates_above_threshold_stay_eligible_for_acknowledgement() {
        let s = student("S1", "Alice");
        let mut ledger = AttendanceLog::new();
        ledger.append(AttendanceRecord::present_now(&s, 98.0));

        let c = candidate(Some(s), 92.0);
        let cls = classify(&c, &ledger, local_today());

        assert_eq!(cls.outcome, Outcome::Duplicate);
        assert!(eligible(&c, &cls));
    }
}
