//! lightkeepd — the Lightkeep daemon.
//!
//! Single binary that assembles the subsystems:
//! - Registry store (one JSON file)
//! - Background health scheduler
//! - REST API
//!
//! # Usage
//!
//! ```text
//! lightkeepd --port 4568 --data-dir ./data
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use lightkeep_health::HealthScheduler;
use lightkeep_registry::{NewService, RegistryStore};

#[derive(Parser)]
#[command(name = "lightkeepd", about = "Lightkeep service registry daemon")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value = "4568")]
    port: u16,

    /// Data directory holding the registry file.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Seconds between background health sweeps.
    #[arg(long, default_value = "60")]
    check_interval: u64,

    /// Hard timeout in seconds for a single probe.
    #[arg(long, default_value = "5")]
    probe_timeout: u64,

    /// Do not seed sample services into an empty registry.
    #[arg(long)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lightkeep=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("lightkeep daemon starting");

    std::fs::create_dir_all(&cli.data_dir)?;
    let registry_path = cli.data_dir.join("services.json");

    // ── Initialize subsystems ──────────────────────────────────

    let store = RegistryStore::open(&registry_path)?;
    info!(path = ?registry_path, "registry store opened");

    if !cli.no_seed {
        seed_sample_services(&store)?;
    }

    let scheduler = Arc::new(HealthScheduler::new(
        store.clone(),
        Duration::from_secs(cli.check_interval),
        Duration::from_secs(cli.probe_timeout),
    )?);
    scheduler.start().await;
    info!(interval = cli.check_interval, "health scheduler started");

    // ── Start API server ───────────────────────────────────────

    let router = lightkeep_api::build_router(store, scheduler.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    scheduler.stop().await;
    info!("lightkeep daemon stopped");
    Ok(())
}

/// Seed the registry with the stock sample services on first run so a
/// fresh install has something to show.
fn seed_sample_services(store: &RegistryStore) -> anyhow::Result<()> {
    if !store.list()?.is_empty() {
        return Ok(());
    }

    let samples = [
        ("Home Assistant", "192.168.0.30", 8123u16),
        ("Plex Server", "192.168.0.30", 32400),
        ("Router Admin", "192.168.0.1", 80),
    ];
    for (name, address, port) in samples {
        store.create(NewService {
            name: name.to_string(),
            address: Some(address.to_string()),
            port: Some(port),
            ..Default::default()
        })?;
    }
    info!(count = samples.len(), "seeded sample services");
    Ok(())
}
