//! Persistence Pump — debounced background snapshot writer.
//!
//! Mutating operations mark a dirty flag; the pump runs on its own
//! task, polling the flag on a fixed timer and writing the *current*
//! ledger state when anything changed since the last flush. Callers
//! never block on a durable write; a crash loses at most one flush
//! interval's worth of mutations.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, warn};

use crate::config::StorageConfig;
use crate::ledger::Ledger;
use crate::storage::{save_snapshot, write_backup};

/// Sender half of the dirty signal. Cheap to clone into every mutation
/// site.
#[derive(Clone)]
pub struct DirtyFlag {
    tx: mpsc::Sender<()>,
}

impl DirtyFlag {
    /// Request a snapshot. Signals coalesce — only the existence of a
    /// pending signal matters, so a full channel is not an error.
    pub fn mark(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Single consumer of dirty signals; owns the flush schedule.
pub struct PersistencePump {
    ledger: Arc<RwLock<Ledger>>,
    rx: mpsc::Receiver<()>,
    snapshot_path: PathBuf,
    backup_dir: PathBuf,
    flush_interval: Duration,
    /// Set when a flush is owed: either a fresh dirty signal or a
    /// failed write awaiting retry.
    pending: bool,
}

impl PersistencePump {
    pub fn new(ledger: Arc<RwLock<Ledger>>, cfg: &StorageConfig) -> (Self, DirtyFlag) {
        // Capacity 1: duplicate signals between flushes carry no
        // information.
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                ledger,
                rx,
                snapshot_path: PathBuf::from(&cfg.snapshot_path),
                backup_dir: PathBuf::from(&cfg.backup_dir),
                flush_interval: Duration::from_secs(cfg.flush_interval_secs),
                pending: false,
            },
            DirtyFlag { tx },
        )
    }

    /// Run the pump until the task is dropped. Spawn with
    /// `tokio::spawn(pump.run())`.
    pub async fn run(mut self) {
        let mut ticker = interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            while self.rx.try_recv().is_ok() {
                self.pending = true;
            }
            if self.pending {
                self.flush_once().await;
            }
        }
    }

    /// Serialize the current ledger state and write the primary
    /// snapshot, then the dated backup. A failed primary write keeps
    /// the pending flag set and skips the backup; the next tick
    /// retries. Never fatal.
    pub async fn flush_once(&mut self) {
        let json = {
            let ledger = self.ledger.read().await;
            match ledger.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to serialize ledger — will retry next cycle");
                    return;
                }
            }
        };

        match save_snapshot(&self.snapshot_path, &json) {
            Ok(()) => {
                self.pending = false;
                // Backup failure is logged but does not re-arm the
                // retry: the primary snapshot is already durable.
                if let Err(e) = write_backup(&self.backup_dir, &json, Utc::now().date_naive()) {
                    warn!(error = %e, "Backup write failed");
                }
                debug!(path = %self.snapshot_path.display(), "Ledger flushed");
            }
            Err(e) => {
                error!(error = %e, "Snapshot write failed — will retry next cycle");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
