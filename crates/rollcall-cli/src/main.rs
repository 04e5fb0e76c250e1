use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance console CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an open scan session (any known face)
    Scan,
    /// Stop the live session
    Stop,
    /// Verify one specific student (1:1, auto-exits on success)
    Verify {
        /// Student id to verify
        id: String,
    },
    /// Register a new student
    Register {
        /// Roster code (e.g. "02JST24UCS043")
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        name: String,
        /// Class label (e.g. "CSE - Sem 3 - A")
        #[arg(short, long)]
        class: String,
        /// Photo reference URL
        #[arg(short, long, default_value = "")]
        photo: String,
    },
    /// Remove a student from the roster
    Remove {
        /// Student id to remove
        id: String,
    },
    /// List the roster
    Roster,
    /// Show the attendance log, most recent first
    Logs,
    /// Show live session status
    Status,
    /// Check remote store health
    Health,
}

// `#[zbus::proxy]` generates the async `AttendanceProxy` used below.
#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn start_scan(&self) -> zbus::Result<()>;
    async fn stop_scan(&self) -> zbus::Result<bool>;
    async fn verify(&self, student_id: &str) -> zbus::Result<bool>;
    async fn status(&self) -> zbus::Result<String>;
    async fn register(
        &self,
        id: &str,
        name: &str,
        class_name: &str,
        photo_url: &str,
    ) -> zbus::Result<bool>;
    async fn remove_student(&self, id: &str) -> zbus::Result<bool>;
    async fn roster(&self) -> zbus::Result<String>;
    async fn records(&self) -> zbus::Result<String>;
    async fn health(&self) -> zbus::Result<String>;
}

fn print_json(payload: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    let proxy = AttendanceProxy::new(&conn)
        .await
        .context("is rollcalld running?")?;

    match cli.command {
        Commands::Scan => {
            proxy.start_scan().await?;
            println!("Scan session started. Run `rollcall status` to watch it.");
        }
        Commands::Stop => {
            if proxy.stop_scan().await? {
                println!("Session stopped");
            } else {
                println!("No session running");
            }
        }
        Commands::Verify { id } => {
            println!("Verifying {id}...");
            if proxy.verify(&id).await? {
                println!("Identity verified — attendance confirmed");
            } else {
                println!("Verification failed");
            }
        }
        Commands::Register { id, name, class, photo } => {
            if proxy.register(&id, &name, &class, &photo).await? {
                println!("Registered {id} - {name}");
            } else {
                println!("Student id {id} already exists");
            }
        }
        Commands::Remove { id } => {
            if proxy.remove_student(&id).await? {
                println!("Removed {id}");
            } else {
                println!("No student with id {id}");
            }
        }
        Commands::Roster => print_json(&proxy.roster().await?)?,
        Commands::Logs => print_json(&proxy.records().await?)?,
        Commands::Status => print_json(&proxy.status().await?)?,
        Commands::Health => print_json(&proxy.health().await?)?,
    }

    Ok(())
}
