//! Session supervisor — the daemon-side owner of the single live session.
//!
//! The daemon owns one camera, so at most one session runs at a time. The
//! supervisor starts open scans, runs targeted verifications to completion
//! under a timeout, and hands out status snapshots for the console.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rollcall_core::oracle::{DetectionOracle, SimulatedOracle};
use rollcall_core::store::StoreError;
use rollcall_core::{AttendanceLog, AttendanceRecord};
use rollcall_hw::CameraManager;
use rollcall_store::SqliteStore;

use crate::config::Config;
use crate::session::{
    Session, SessionDeps, SessionMode, SessionReport, SessionSnapshot, SessionTiming,
};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("a camera session is already running")]
    SessionBusy,
    #[error("unknown student: {0}")]
    UnknownStudent(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
    status: watch::Receiver<SessionSnapshot>,
    /// Present for detached (open-scan) sessions; verification sessions are
    /// awaited by their caller instead.
    handle: Option<JoinHandle<SessionReport>>,
}

pub struct Supervisor {
    store: Arc<SqliteStore>,
    ledger: Arc<Mutex<AttendanceLog>>,
    camera: Arc<CameraManager>,
    timing: SessionTiming,
    verify_timeout: Duration,
    oracle_seed: Option<u64>,
    next_id: AtomicU64,
    active: Mutex<Option<ActiveSession>>,
}

impl Supervisor {
    pub fn new(store: SqliteStore, ledger: AttendanceLog, config: &Config) -> Self {
        Self {
            store: Arc::new(store),
            ledger: Arc::new(Mutex::new(ledger)),
            camera: Arc::new(CameraManager::new(
                config.source.clone(),
                config.secure_context,
            )),
            timing: config.timing,
            verify_timeout: config.verify_timeout,
            oracle_seed: config.oracle_seed,
            next_id: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    fn oracle(&self) -> Box<dyn DetectionOracle> {
        match self.oracle_seed {
            Some(seed) => Box::new(SimulatedOracle::seeded(seed)),
            None => Box::new(SimulatedOracle::new()),
        }
    }

    fn deps(&self) -> SessionDeps<SqliteStore, SqliteStore> {
        SessionDeps {
            roster: Arc::clone(&self.store),
            store: Arc::clone(&self.store),
            ledger: Arc::clone(&self.ledger),
            camera: Arc::clone(&self.camera),
        }
    }

    /// Drop a finished session from the slot so the camera frees up.
    async fn reap(slot: &mut Option<ActiveSession>) {
        let finished = match slot.as_ref() {
            Some(active) => match &active.handle {
                Some(handle) => handle.is_finished(),
                // Verification marker: the status sender dies with the
                // session task.
                None => active.status.has_changed().is_err(),
            },
            None => false,
        };
        if !finished {
            return;
        }
        if let Some(active) = slot.take() {
            if let Some(handle) = active.handle {
                match handle.await {
                    Ok(report) => tracing::debug!(?report, "session reaped"),
                    Err(e) => tracing::warn!(error = %e, "session task panicked"),
                }
            }
        }
    }

    /// Start an open scan session. Fails when a session already holds the
    /// camera.
    pub async fn start_scan(&self) -> Result<(), SupervisorError> {
        let mut slot = self.active.lock().await;
        Self::reap(&mut slot).await;
        if slot.is_some() {
            return Err(SupervisorError::SessionBusy);
        }

        let cancel = CancellationToken::new();
        let (session, status) = Session::new(
            SessionMode::Open,
            self.deps(),
            self.oracle(),
            self.timing,
            cancel.clone(),
            None,
        );
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(session.run());
        *slot = Some(ActiveSession { id, cancel, status, handle: Some(handle) });
        tracing::info!(session = id, "open scan started");
        Ok(())
    }

    /// Run a 1:1 verification session for one student to completion.
    ///
    /// Returns whether a qualifying commit for the target happened. The
    /// session auto-exits on success; the timeout tears it down otherwise.
    pub async fn verify(&self, student_id: &str) -> Result<bool, SupervisorError> {
        let student = self
            .store
            .get_student(student_id)
            .await?
            .ok_or_else(|| SupervisorError::UnknownStudent(student_id.to_string()))?;

        let cancel = CancellationToken::new();
        let session_id;
        let mut handle;
        {
            let mut slot = self.active.lock().await;
            Self::reap(&mut slot).await;
            if slot.is_some() {
                return Err(SupervisorError::SessionBusy);
            }

            let (session, status) = Session::new(
                SessionMode::Targeted { student },
                self.deps(),
                self.oracle(),
                self.timing,
                cancel.clone(),
                Some(Box::new(|| tracing::info!("verification session exited"))),
            );
            session_id = self.next_id.fetch_add(1, Ordering::SeqCst);
            handle = tokio::spawn(session.run());
            *slot = Some(ActiveSession {
                id: session_id,
                cancel: cancel.clone(),
                status,
                handle: None,
            });
        }
        tracing::info!(session = session_id, student = student_id, "verification started");

        // Await completion outside the slot lock so status queries stay
        // responsive; the timeout tears down a session that never verifies.
        let report = match tokio::time::timeout(self.verify_timeout, &mut handle).await {
            Ok(join) => join.unwrap_or_default(),
            Err(_) => {
                tracing::warn!(session = session_id, "verification timed out");
                cancel.cancel();
                handle.await.unwrap_or_default()
            }
        };

        let mut slot = self.active.lock().await;
        if slot.as_ref().is_some_and(|a| a.id == session_id) {
            *slot = None;
        }
        Ok(report.verified)
    }

    /// Stop the live session, if any. Returns whether one was stopped.
    pub async fn stop(&self) -> bool {
        let mut slot = self.active.lock().await;
        let Some(active) = slot.take() else {
            return false;
        };
        active.cancel.cancel();
        match active.handle {
            Some(handle) => match handle.await {
                Ok(report) => tracing::info!(?report, "session stopped"),
                Err(e) => tracing::warn!(error = %e, "session task panicked"),
            },
            // A verification session is awaited by its caller; the cancelled
            // task winds down on its own.
            None => tracing::info!("verification session cancelled"),
        }
        true
    }

    /// Snapshot of the live session, or the idle resting state.
    pub async fn status(&self) -> SessionSnapshot {
        let mut slot = self.active.lock().await;
        Self::reap(&mut slot).await;
        match slot.as_ref() {
            Some(active) => active.status.borrow().clone(),
            None => SessionSnapshot::idle(),
        }
    }

    /// The local attendance log, most recent first.
    pub async fn records(&self) -> Vec<AttendanceRecord> {
        self.ledger.lock().await.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::session::SessionPhase;
    use rollcall_core::Student;
    use rollcall_hw::SourceKind;

    // Real-clock timings, shrunk so sessions resolve in milliseconds.
    fn test_config() -> Config {
        Config {
            db_path: "/nonexistent".into(),
            source: SourceKind::Simulated { width: 1280, height: 720 },
            secure_context: true,
            timing: SessionTiming {
                poll_interval: Duration::from_millis(10),
                settle_delay: Duration::from_millis(20),
                sync_display: Duration::from_millis(30),
            },
            verify_timeout: Duration::from_secs(10),
            oracle_seed: Some(7),
        }
    }

    async fn provisioned_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        store
            .add_student(&Student {
                id: "S1".into(),
                name: "Alice Johnson".into(),
                photo_url: String::new(),
                class_name: "CSE - Sem 3 - A".into(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn verify_runs_a_targeted_session_to_completion() {
        let store = provisioned_store().await;
        let supervisor = Supervisor::new(store, AttendanceLog::new(), &test_config());

        let verified = supervisor.verify("S1").await.unwrap();

        assert!(verified, "seeded oracle verifies within the timeout");
        let records = supervisor.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, "S1");

        // The slot is free again afterwards.
        supervisor.start_scan().await.unwrap();
        assert!(supervisor.stop().await);
    }

    #[tokio::test]
    async fn verify_rejects_unknown_students() {
        let store = provisioned_store().await;
        let supervisor = Supervisor::new(store, AttendanceLog::new(), &test_config());

        let err = supervisor.verify("GHOST").await.unwrap_err();
        assert!(matches!(err, SupervisorError::UnknownStudent(_)));
    }

    #[tokio::test]
    async fn one_session_owns_the_camera_at_a_time() {
        let store = provisioned_store().await;
        let supervisor = Supervisor::new(store, AttendanceLog::new(), &test_config());

        supervisor.start_scan().await.unwrap();
        assert!(matches!(
            supervisor.start_scan().await,
            Err(SupervisorError::SessionBusy)
        ));
        assert!(matches!(
            supervisor.verify("S1").await,
            Err(SupervisorError::SessionBusy)
        ));

        assert!(supervisor.stop().await);
        assert!(!supervisor.stop().await);
        assert_eq!(supervisor.status().await.phase, SessionPhase::Idle);
    }
}
