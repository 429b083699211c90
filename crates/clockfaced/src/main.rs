use anyhow::{Context, Result};
use clockface_core::SystemClock;
use clockface_remote::HttpBiometricClient;
use clockface_store::SqliteStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod locks;

use config::{BusKind, Config};
use dbus_interface::{ClockfaceService, BUS_NAME, OBJECT_PATH};
use engine::AttendanceDesk;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("clockfaced starting");

    let config = Config::from_env();

    let store = SqliteStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening attendance store at {}", config.db_path.display()))?;
    let biometric = HttpBiometricClient::new(config.remote_config())
        .context("building recognition client")?;

    let collection = biometric.collection().to_string();

    let desk = Arc::new(AttendanceDesk::new(
        biometric,
        store,
        SystemClock,
        config.screening_policy(),
    ));
    let service = ClockfaceService {
        desk,
        collection,
    };

    let builder = match config.bus {
        BusKind::System => zbus::connection::Builder::system()?,
        BusKind::Session => zbus::connection::Builder::session()?,
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .with_context(|| format!("registering {BUS_NAME} on the {:?} bus", config.bus))?;

    tracing::info!(
        bus = ?config.bus,
        db = %config.db_path.display(),
        service_url = %config.service_url,
        "clockfaced ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("clockfaced shutting down");

    Ok(())
}
