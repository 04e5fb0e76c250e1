use std::path::PathBuf;
use std::time::Duration;

use rollcall_hw::SourceKind;

use crate::session::SessionTiming;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite attendance database.
    pub db_path: PathBuf,
    /// Frame source backing camera sessions.
    pub source: SourceKind,
    /// Whether the hosting surface is a trusted context. Supplied by the
    /// deployment; acquisition is refused outright when false.
    pub secure_context: bool,
    /// Recognition loop cadence and delays.
    pub timing: SessionTiming,
    /// Timeout for a 1:1 verification session.
    pub verify_timeout: Duration,
    /// Fixed seed for the simulated oracle; unseeded when absent.
    pub oracle_seed: Option<u64>,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        let source = match std::env::var("ROLLCALL_FRAME_SOURCE").as_deref() {
            Ok("v4l2") => SourceKind::V4l2 {
                device: std::env::var("ROLLCALL_CAMERA_DEVICE")
                    .unwrap_or_else(|_| "/dev/video0".to_string()),
            },
            _ => SourceKind::Simulated { width: 1280, height: 720 },
        };

        Self {
            db_path,
            source,
            secure_context: std::env::var("ROLLCALL_SECURE_CONTEXT")
                .map(|v| v != "0")
                .unwrap_or(true),
            timing: SessionTiming {
                poll_interval: Duration::from_millis(env_u64("ROLLCALL_POLL_INTERVAL_MS", 800)),
                settle_delay: Duration::from_millis(env_u64("ROLLCALL_SETTLE_DELAY_MS", 2000)),
                sync_display: Duration::from_millis(env_u64("ROLLCALL_SYNC_DISPLAY_MS", 3000)),
            },
            verify_timeout: Duration::from_secs(env_u64("ROLLCALL_VERIFY_TIMEOUT_SECS", 30)),
            oracle_seed: std::env::var("ROLLCALL_ORACLE_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
