//! Session state machine — the per-camera-session recognition loop.
//!
//! One logical thread of control per session: Idle → Acquiring → Active →
//! (Targeted only) Redirecting → Idle. While ACTIVE, a repeating tick task
//! runs detect → classify → maybe commit to completion before the next
//! interval fires; only the remote sync inside the commit pipeline is
//! fire-and-forget. Cancelling the session stops the timer deterministically
//! — no tick runs after the device is released.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use rollcall_core::guard;
use rollcall_core::oracle::DetectionOracle;
use rollcall_core::store::{AttendanceStore, RosterProvider};
use rollcall_core::types::{local_today, Student};
use rollcall_core::AttendanceLog;
use rollcall_hw::{CameraManager, CaptureError, FrameSource};

use crate::commit::{CommitOutcome, CommitPipeline};

/// Event lines kept for the console's terminal pane.
const EVENT_LOG_CAP: usize = 7;

/// Loop cadence and display delays. Configurable constants, not hardcoded
/// law; the defaults mirror the console's reference behavior.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Tick cadence while ACTIVE.
    pub poll_interval: Duration,
    /// Pause between a targeted-mode success and teardown.
    pub settle_delay: Duration,
    /// How long a successful sync stays visible before clearing.
    pub sync_display: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(800),
            settle_delay: Duration::from_secs(2),
            sync_display: Duration::from_secs(3),
        }
    }
}

/// Operating mode, fixed for the life of a session.
#[derive(Debug, Clone)]
pub enum SessionMode {
    /// Scan for any known identity until explicitly disconnected.
    Open,
    /// Verify one specific identity; auto-exits on success.
    Targeted { student: Student },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Acquiring,
    Active,
    Redirecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Synced,
    Error,
}

/// Display form of the mode for status payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModeView {
    Open,
    Targeted { target_id: String, target_name: String },
}

/// What the host displays for the last evaluated candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    pub name: String,
    pub confidence: f32,
    pub label: String,
}

/// One consistent view of a session.
///
/// Published through a watch channel and replaced atomically on every
/// change, so readers never observe a half-updated state across concurrent
/// sync completions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub mode: ModeView,
    pub sync: SyncStatus,
    pub last_candidate: Option<CandidateView>,
    /// Rolling event log, newest first.
    pub events: Vec<String>,
}

impl SessionSnapshot {
    /// The resting state shown when no session is live.
    pub fn idle() -> Self {
        Self {
            phase: SessionPhase::Idle,
            mode: ModeView::Open,
            sync: SyncStatus::Idle,
            last_candidate: None,
            events: Vec::new(),
        }
    }
}

/// Shared handle for publishing snapshot changes and event lines.
#[derive(Clone)]
pub(crate) struct StatusBoard {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl StatusBoard {
    fn new(initial: SessionSnapshot) -> (Self, watch::Receiver<SessionSnapshot>) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        self.tx.send_modify(f);
    }

    pub(crate) fn event(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!("{line}");
        let stamped = format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), line);
        self.tx.send_modify(|s| {
            s.events.insert(0, stamped);
            s.events.truncate(EVENT_LOG_CAP);
        });
    }
}

/// Collaborators a session shares with its host.
pub struct SessionDeps<R, S> {
    pub roster: Arc<R>,
    pub store: Arc<S>,
    pub ledger: Arc<Mutex<AttendanceLog>>,
    pub camera: Arc<CameraManager>,
}

impl<R, S> Clone for SessionDeps<R, S> {
    fn clone(&self) -> Self {
        Self {
            roster: Arc::clone(&self.roster),
            store: Arc::clone(&self.store),
            ledger: Arc::clone(&self.ledger),
            camera: Arc::clone(&self.camera),
        }
    }
}

/// Terminal summary of one session run.
#[derive(Debug, Default)]
pub struct SessionReport {
    /// Targeted mode: a qualifying commit for the target happened.
    pub verified: bool,
    /// NEW records appended during the session.
    pub committed: usize,
    /// Acquisition failure reason code, when the session never went active.
    pub failure: Option<&'static str>,
}

/// Tick verdict: keep polling, or suspend and settle toward exit.
enum TickFlow {
    Continue,
    ScheduleExit,
}

pub struct Session<R, S> {
    mode: SessionMode,
    roster: Arc<R>,
    camera: Arc<CameraManager>,
    oracle: Box<dyn DetectionOracle>,
    source: Option<Box<dyn FrameSource>>,
    pipeline: CommitPipeline<S>,
    status: StatusBoard,
    timing: SessionTiming,
    cancel: CancellationToken,
    /// Redirect guard: check-then-set, written only from the tick path.
    redirecting: bool,
    verified: bool,
    committed: usize,
    on_exit: Option<Box<dyn FnOnce() + Send>>,
}

impl<R, S> Session<R, S>
where
    R: RosterProvider + 'static,
    S: AttendanceStore + 'static,
{
    pub fn new(
        mode: SessionMode,
        deps: SessionDeps<R, S>,
        oracle: Box<dyn DetectionOracle>,
        timing: SessionTiming,
        cancel: CancellationToken,
        on_exit: Option<Box<dyn FnOnce() + Send>>,
    ) -> (Self, watch::Receiver<SessionSnapshot>) {
        let mode_view = match &mode {
            SessionMode::Open => ModeView::Open,
            SessionMode::Targeted { student } => ModeView::Targeted {
                target_id: student.id.clone(),
                target_name: student.name.clone(),
            },
        };
        let (status, rx) = StatusBoard::new(SessionSnapshot {
            mode: mode_view,
            ..SessionSnapshot::idle()
        });
        let pipeline = CommitPipeline::new(
            deps.ledger,
            deps.store,
            status.clone(),
            cancel.clone(),
            timing.sync_display,
        );
        let session = Self {
            mode,
            roster: deps.roster,
            camera: deps.camera,
            oracle,
            source: None,
            pipeline,
            status,
            timing,
            cancel,
            redirecting: false,
            verified: false,
            committed: 0,
            on_exit,
        };
        (session, rx)
    }

    /// Run the session to completion: acquisition, polling, optional settle,
    /// teardown. Consumes the session.
    pub async fn run(mut self) -> SessionReport {
        if let Err(err) = self.connect() {
            tracing::warn!(reason = err.reason(), error = %err, "camera acquisition failed");
            return SessionReport { failure: Some(err.reason()), ..Default::default() };
        }

        let cancel = self.cancel.clone();
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.timing.poll_interval,
            self.timing.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut exit_scheduled = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if matches!(self.tick().await, TickFlow::ScheduleExit) {
                        exit_scheduled = true;
                        break;
                    }
                }
            }
        }

        if exit_scheduled {
            // Polling is suspended; the settle delay gives the operator a
            // beat to read the confirmation before the surface goes away.
            tokio::select! {
                _ = cancel.cancelled() => self.teardown(),
                _ = tokio::time::sleep(self.timing.settle_delay) => {
                    self.teardown();
                    if let Some(exit) = self.on_exit.take() {
                        exit();
                    }
                }
            }
        } else {
            self.teardown();
        }

        SessionReport {
            verified: self.verified,
            committed: self.committed,
            failure: None,
        }
    }

    /// Idle → Acquiring → Active, or back to Idle with a diagnostic.
    fn connect(&mut self) -> Result<(), CaptureError> {
        self.status.update(|s| s.phase = SessionPhase::Acquiring);
        self.status.event("SYSTEM: Requesting camera access");

        match self.camera.acquire() {
            Ok(source) => {
                self.source = Some(source);
                self.status.update(|s| s.phase = SessionPhase::Active);
                self.status.event("SYSTEM_INIT: Camera module online");
                Ok(())
            }
            Err(err) => {
                if matches!(err, CaptureError::InsecureContext) {
                    self.status
                        .event("CRITICAL: Insecure context. Camera requires a trusted origin");
                } else {
                    self.status.event(format!("ERROR: Connection failed - {err}"));
                }
                self.status.update(|s| s.phase = SessionPhase::Idle);
                Err(err)
            }
        }
    }

    /// One poll tick: detect → classify → publish → maybe commit.
    async fn tick(&mut self) -> TickFlow {
        // Consistent inputs for this tick: the day is computed once, the
        // roster is re-read (never cached stale), then a frame is grabbed.
        let today = local_today();

        let roster = match self.roster.list().await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::warn!(error = %e, "roster fetch failed; skipping tick");
                return TickFlow::Continue;
            }
        };

        let frame = {
            let Some(source) = self.source.as_mut() else {
                return TickFlow::Continue;
            };
            match source.grab() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "frame grab failed; skipping tick");
                    return TickFlow::Continue;
                }
            }
        };

        let target_id = match &self.mode {
            SessionMode::Open => None,
            SessionMode::Targeted { student } => Some(student.id.as_str()),
        };

        let Some(candidate) = self.oracle.poll(&roster, frame.width, frame.height, target_id)
        else {
            // No face this tick — expected and frequent, not an error.
            self.status.update(|s| s.last_candidate = None);
            return TickFlow::Continue;
        };

        let classification = self.pipeline.classify(&candidate, today).await;
        self.status.update(|s| {
            s.last_candidate = Some(CandidateView {
                name: candidate
                    .matched
                    .as_ref()
                    .map_or_else(|| "Unknown".to_string(), |m| m.name.clone()),
                confidence: candidate.confidence,
                label: classification.label.clone(),
            });
        });

        if !guard::eligible(&candidate, &classification) {
            return TickFlow::Continue;
        }
        let Some(student) = candidate.matched.clone() else {
            return TickFlow::Continue;
        };

        match self
            .pipeline
            .commit(&student, candidate.confidence, &classification)
            .await
        {
            CommitOutcome::Recorded(record) => {
                self.committed += 1;
                self.status.event(format!(
                    "SUCCESS: Verified {} - {}",
                    record.student_id, record.student_name
                ));
                self.maybe_schedule_exit(&student.id)
            }
            CommitOutcome::AlreadyPresent => {
                self.status.event(format!("INFO: {} already marked", student.name));
                self.maybe_schedule_exit(&student.id)
            }
        }
    }

    /// Targeted mode only: schedule the redirect exactly once per session.
    ///
    /// An acknowledged duplicate also qualifies — re-scanning a student who
    /// is already present still counts as a successful verification.
    fn maybe_schedule_exit(&mut self, committed_id: &str) -> TickFlow {
        let SessionMode::Targeted { student } = &self.mode else {
            return TickFlow::Continue;
        };
        if student.id != committed_id || self.redirecting {
            return TickFlow::Continue;
        }

        self.redirecting = true;
        self.verified = true;
        self.status.update(|s| s.phase = SessionPhase::Redirecting);
        self.status.event("REDIRECT: Attendance confirmed. Exiting");
        TickFlow::ScheduleExit
    }

    /// Release the device and publish the Idle state.
    ///
    /// Cancels the session token first, so an in-flight sync resolving later
    /// cannot mutate the torn-down session's visible status.
    fn teardown(&mut self) {
        self.cancel.cancel();
        if let Some(source) = self.source.as_mut() {
            source.release();
        }
        self.source = None;
        self.status.update(|s| {
            s.phase = SessionPhase::Idle;
            s.last_candidate = None;
        });
        self.status.event("SYSTEM: Camera disconnected");
    }
}
