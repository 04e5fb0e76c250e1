use std::sync::Arc;

use zbus::interface;

use rollcall_core::store::{AttendanceStore as _, RosterProvider as _};
use rollcall_core::Student;

use crate::supervisor::Supervisor;

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
pub struct AttendanceService {
    supervisor: Arc<Supervisor>,
}

impl AttendanceService {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }
}

fn failed(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Start an open scan session.
    async fn start_scan(&self) -> zbus::fdo::Result<()> {
        tracing::info!("start_scan requested");
        self.supervisor.start_scan().await.map_err(failed)
    }

    /// Stop the live session. Returns whether one was running.
    async fn stop_scan(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("stop_scan requested");
        Ok(self.supervisor.stop().await)
    }

    /// Run a 1:1 verification session for the given student; blocks until
    /// the session exits or times out.
    async fn verify(&self, student_id: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(student_id, "verify requested");
        self.supervisor.verify(student_id).await.map_err(failed)
    }

    /// Live session status as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let snapshot = self.supervisor.status().await;
        serde_json::to_string(&snapshot).map_err(failed)
    }

    /// Register a new student. Returns false when the id is taken.
    async fn register(
        &self,
        id: &str,
        name: &str,
        class_name: &str,
        photo_url: &str,
    ) -> zbus::fdo::Result<bool> {
        tracing::info!(id, name, "register requested");
        let student = Student {
            id: id.into(),
            name: name.into(),
            photo_url: photo_url.into(),
            class_name: class_name.into(),
        };
        self.supervisor.store().add_student(&student).await.map_err(failed)
    }

    /// Remove a student from the roster. Attendance history is retained.
    async fn remove_student(&self, id: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(id, "remove_student requested");
        self.supervisor.store().remove_student(id).await.map_err(failed)
    }

    /// Roster as JSON.
    async fn roster(&self) -> zbus::fdo::Result<String> {
        let roster = self.supervisor.store().list().await.map_err(failed)?;
        serde_json::to_string(&roster).map_err(failed)
    }

    /// Local attendance log as JSON, most recent first.
    async fn records(&self) -> zbus::fdo::Result<String> {
        serde_json::to_string(&self.supervisor.records().await).map_err(failed)
    }

    /// Remote store health as JSON.
    async fn health(&self) -> zbus::fdo::Result<String> {
        let health = self.supervisor.store().check_health().await.map_err(failed)?;
        serde_json::to_string(&health).map_err(failed)
    }
}
