//! FLUXBUX — community point-wagering ledger and settlement engine.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the ledger from the snapshot file (or starts a new game),
//! spawns the persistence pump, and runs the weekly-round housekeeping
//! tick with graceful shutdown.
//!
//! The chat-platform adapter that drives `set_options` / `place_bet` /
//! `settle` lives outside this crate; the binary hosts the ledger core
//! and its durability loop.

use anyhow::Result;
use chrono::{Datelike, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

use fluxbux::config::AppConfig;
use fluxbux::storage;
use fluxbux::storage::pump::PersistencePump;

const BANNER: &str = r#"
  _____ _    _   ___  _____  _   _ __  __
 |  ___| |  | | | \ \/ / _ )| | | |\ \/ /
 | |_  | |  | | | |\  /|  _ \| |_| | \  /
 |  _| | |__| |_| |/  \| |_) |  _  | /  \
 |_|   |____|\___//_/\_\____/|_| |_|/_/\_\

  Community wagering ledger — let the fluxbux rain
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        service = %cfg.service.name,
        snapshot = %cfg.storage.snapshot_path,
        flush_interval_secs = cfg.storage.flush_interval_secs,
        "FLUXBUX starting up"
    );

    // -- Cold start: load happens once, before any mutation path ---------

    let ledger = storage::load_ledger(Path::new(&cfg.storage.snapshot_path));
    let ledger = Arc::new(RwLock::new(ledger));

    // -- Persistence pump -------------------------------------------------

    let (pump, dirty) = PersistencePump::new(ledger.clone(), &cfg.storage);
    let pump_handle = tokio::spawn(pump.run());

    // -- Weekly tick loop -------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.service.tick_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        tick_interval_secs = cfg.service.tick_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // The round id convention (ISO calendar week) lives
                // here on the adapter side — the ledger just receives
                // the identifier.
                let round_id = current_round_id();
                let mut guard = ledger.write().await;
                if guard.round(&round_id).is_none() {
                    guard.ensure_round(&round_id);
                    drop(guard);
                    dirty.mark();
                    info!(round = %round_id, "Current round ensured");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Final snapshot, bypassing the pump schedule.
    pump_handle.abort();
    let json = {
        let guard = ledger.read().await;
        guard.to_json()?
    };
    if let Err(e) = storage::save_snapshot(Path::new(&cfg.storage.snapshot_path), &json) {
        error!(error = %e, "Final snapshot save failed");
    }
    info!("FLUXBUX shut down cleanly.");

    Ok(())
}

/// Round identifier for the current ISO calendar week.
fn current_round_id() -> String {
    Utc::now().iso_week().week().to_string()
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fluxbux=info"));

    let json_logging = std::env::var("FLUXBUX_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
