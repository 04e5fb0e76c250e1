use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use rollcall_core::store::AttendanceStore as _;
use rollcall_core::AttendanceLog;
use rollcall_store::{SqliteStore, SETUP_SQL};

mod commit;
mod config;
mod dbus_interface;
mod session;
mod supervisor;

use config::Config;
use dbus_interface::AttendanceService;
use supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::open(&config.db_path).await?;

    let health = store.check_health().await?;
    if !health.reachable {
        tracing::warn!("attendance store unreachable; continuing on local state only");
    } else if health.missing_schema {
        tracing::warn!("attendance tables missing; applying setup SQL");
        tracing::debug!(sql = SETUP_SQL, "schema bootstrap");
        store.init_schema().await?;
    }

    let history = match store.fetch_attendance().await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "could not load attendance history; starting empty");
            Vec::new()
        }
    };
    tracing::info!(records = history.len(), "attendance history loaded");
    let ledger = AttendanceLog::seed(history);

    let supervisor = Arc::new(Supervisor::new(store, ledger, &config));
    let service = AttendanceService::new(Arc::clone(&supervisor));

    let _conn = zbus::connection::Builder::session()?
        .name("org.rollcall.Attendance1")?
        .serve_at("/org/rollcall/Attendance1", service)?
        .build()
        .await?;

    tracing::info!("rollcalld ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");
    supervisor.stop().await;

    Ok(())
}
