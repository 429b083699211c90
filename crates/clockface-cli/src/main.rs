use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clockface_core::{EnrollOutcome, Identity, Profile, ScanOutcome};
use serde::Deserialize;
use std::path::PathBuf;

mod photo;

#[zbus::proxy(
    interface = "org.clockface.Clockface1",
    default_service = "org.clockface.Clockface1",
    default_path = "/org/clockface/Clockface1"
)]
trait Clockface {
    fn enroll(&self, person_id: &str, profile_json: &str, image: &[u8]) -> zbus::Result<String>;
    fn scan(&self, image: &[u8]) -> zbus::Result<String>;
    fn list_records(&self) -> zbus::Result<String>;
    fn get_profile(&self, person_id: &str) -> zbus::Result<String>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "clockface", about = "Clockface face-recognition attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a person with a photo
    Enroll {
        /// Employee / person id
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        city: String,
        #[arg(long, default_value = "")]
        state: String,
        #[arg(long, default_value = "")]
        pincode: String,
        /// Photo of the person's face (any common image format)
        #[arg(long)]
        photo: PathBuf,
    },
    /// Mark attendance from a photo
    Scan {
        #[arg(long)]
        photo: PathBuf,
    },
    /// List all attendance records, newest first
    Records {
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show an enrolled person's profile
    Profile {
        /// Person id to look up
        id: String,
    },
    /// Show daemon status
    Status,
}

/// One row of the daemon's record listing.
#[derive(Debug, Deserialize)]
struct RecordRow {
    person_id: String,
    timestamp: String,
    action: String,
}

const REJECTED: &str = "[rejected]";

fn render_scan(outcome: &ScanOutcome) -> String {
    match outcome {
        ScanOutcome::Recorded { message, similarity, .. } => {
            format!("{message} (match {similarity:.1}%)")
        }
        ScanOutcome::AlreadyComplete { message, .. } => message.clone(),
        ScanOutcome::Rejected { reason, message } => format!("{REJECTED} {reason}: {message}"),
    }
}

fn render_enroll(outcome: &EnrollOutcome) -> String {
    match outcome {
        EnrollOutcome::Enrolled { message, face_id, .. } => format!("{message} (face {face_id})"),
        EnrollOutcome::Rejected { reason, message } => format!("{REJECTED} {reason}: {message}"),
    }
}

fn render_records(rows: &[RecordRow]) -> String {
    if rows.is_empty() {
        return "No attendance records".to_string();
    }
    let width = rows
        .iter()
        .map(|r| r.person_id.len())
        .max()
        .unwrap_or(0)
        .max("PERSON".len());

    let mut out = format!("{:<width$}  {:<19}  ACTION\n", "PERSON", "TIMESTAMP");
    for row in rows {
        out.push_str(&format!(
            "{:<width$}  {:<19}  {}\n",
            row.person_id, row.timestamp, row.action
        ));
    }
    out
}

fn render_identity(person_id: &str, identity: Option<&Identity>) -> String {
    let Some(identity) = identity else {
        return format!("No profile for {person_id}");
    };
    let p = &identity.profile;
    format!(
        "{}\n  name:     {} {}\n  city:     {}\n  state:    {}\n  pincode:  {}\n  face:     {}",
        identity.person_id,
        p.first_name,
        p.last_name,
        p.city,
        p.state,
        p.pincode,
        identity.face_id.as_deref().unwrap_or("-"),
    )
}

async fn connect() -> Result<ClockfaceProxy<'static>> {
    let conn = match std::env::var("CLOCKFACE_BUS").as_deref() {
        Ok("session") => zbus::Connection::session().await,
        _ => zbus::Connection::system().await,
    }
    .context("connecting to D-Bus")?;
    ClockfaceProxy::new(&conn)
        .await
        .context("clockfaced is not reachable")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let proxy = connect().await?;

    match cli.command {
        Commands::Enroll {
            id,
            first_name,
            last_name,
            city,
            state,
            pincode,
            photo,
        } => {
            let image = photo::load_as_jpeg(&photo)?;
            let profile = Profile {
                first_name,
                last_name,
                city,
                state,
                pincode,
            };
            let reply = proxy
                .enroll(&id, &serde_json::to_string(&profile)?, &image)
                .await
                .context("enrollment failed")?;
            let outcome: EnrollOutcome = serde_json::from_str(&reply)?;
            println!("{}", render_enroll(&outcome));
        }
        Commands::Scan { photo } => {
            let image = photo::load_as_jpeg(&photo)?;
            let reply = proxy.scan(&image).await.context("scan failed")?;
            let outcome: ScanOutcome = serde_json::from_str(&reply)?;
            println!("{}", render_scan(&outcome));
        }
        Commands::Records { json } => {
            let reply = proxy.list_records().await.context("listing records failed")?;
            if json {
                println!("{reply}");
            } else {
                let rows: Vec<RecordRow> = serde_json::from_str(&reply)?;
                print!("{}", render_records(&rows));
            }
        }
        Commands::Profile { id } => {
            let reply = proxy.get_profile(&id).await.context("profile lookup failed")?;
            let identity: Option<Identity> = serde_json::from_str(&reply)?;
            println!("{}", render_identity(&id, identity.as_ref()));
        }
        Commands::Status => {
            let reply = proxy.status().await.context("clockfaced: not connected")?;
            let status: serde_json::Value = serde_json::from_str(&reply)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
