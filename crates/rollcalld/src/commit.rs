//! Commit pipeline — turns an accepted detection into a durable record.
//!
//! Local-first: the ledger append is synchronous with respect to the tick,
//! and the local log stays authoritative even when the remote sync fails.
//! The pipeline is the ledger's only writer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use rollcall_core::guard::{self, Classification, Outcome};
use rollcall_core::store::AttendanceStore;
use rollcall_core::types::{DetectionCandidate, Student};
use rollcall_core::{AttendanceLog, AttendanceRecord};

use crate::session::{StatusBoard, SyncStatus};

/// What a commit attempt did.
#[derive(Debug)]
pub enum CommitOutcome {
    /// A new record was appended locally; a remote sync is in flight.
    Recorded(AttendanceRecord),
    /// Already marked present today — acknowledged, nothing written,
    /// no remote call.
    AlreadyPresent,
}

pub struct CommitPipeline<S> {
    ledger: Arc<Mutex<AttendanceLog>>,
    store: Arc<S>,
    status: StatusBoard,
    cancel: CancellationToken,
    sync_display: std::time::Duration,
    /// Generation counter so a stale auto-clear never overwrites the status
    /// of a newer sync.
    sync_generation: Arc<AtomicU64>,
}

impl<S: AttendanceStore + 'static> CommitPipeline<S> {
    pub fn new(
        ledger: Arc<Mutex<AttendanceLog>>,
        store: Arc<S>,
        status: StatusBoard,
        cancel: CancellationToken,
        sync_display: std::time::Duration,
    ) -> Self {
        Self {
            ledger,
            store,
            status,
            cancel,
            sync_display,
            sync_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Classify a candidate against the current ledger snapshot.
    pub async fn classify(
        &self,
        candidate: &DetectionCandidate,
        today: NaiveDate,
    ) -> Classification {
        let ledger = self.ledger.lock().await;
        guard::classify(candidate, &ledger, today)
    }

    /// Commit an eligible candidate.
    ///
    /// Callers apply the eligibility gate first; this only ever sees NEW or
    /// DUPLICATE classifications, and the matched identity travels
    /// explicitly so an unknown can never reach a commit.
    pub async fn commit(
        &self,
        student: &Student,
        confidence: f32,
        classification: &Classification,
    ) -> CommitOutcome {
        if classification.outcome == Outcome::Duplicate {
            return CommitOutcome::AlreadyPresent;
        }

        let record = AttendanceRecord::present_now(student, confidence);

        self.ledger.lock().await.append(record.clone());
        tracing::info!(
            student = %record.student_id,
            confidence = record.confidence,
            "attendance committed locally"
        );

        self.spawn_sync(record.clone());
        CommitOutcome::Recorded(record)
    }

    /// Fire-and-forget remote sync for one freshly committed record.
    ///
    /// Exactly one sync per NEW commit. The polling loop never waits on it,
    /// and a sync resolving after teardown leaves the torn-down session's
    /// visible status untouched.
    fn spawn_sync(&self, record: AttendanceRecord) {
        let generation = self.sync_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.update(|s| s.sync = SyncStatus::Syncing);

        let store = Arc::clone(&self.store);
        let status = self.status.clone();
        let cancel = self.cancel.clone();
        let sync_generation = Arc::clone(&self.sync_generation);
        let sync_display = self.sync_display;

        tokio::spawn(async move {
            let result = store.append_attendance(&record).await;
            if cancel.is_cancelled() {
                return;
            }

            let outcome = match result {
                Ok(true) => SyncStatus::Synced,
                Ok(false) => {
                    tracing::warn!(record = %record.id, "remote store rejected the record");
                    SyncStatus::Error
                }
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "remote sync failed");
                    SyncStatus::Error
                }
            };
            status.update(|s| s.sync = outcome);

            // Success clears back to idle after a display delay, unless a
            // newer sync has taken over the status in the meantime.
            if outcome == SyncStatus::Synced {
                tokio::time::sleep(sync_display).await;
                if cancel.is_cancelled() {
                    return;
                }
                if sync_generation.load(Ordering::SeqCst) == generation {
                    status.update(|s| {
                        if s.sync == SyncStatus::Synced {
                            s.sync = SyncStatus::Idle;
                        }
                    });
                }
            }
        });
    }
}
