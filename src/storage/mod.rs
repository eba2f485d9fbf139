//! Persistence layer.
//!
//! Saves and loads the ledger snapshot as a single JSON file and
//! writes one dated backup copy per calendar day. Writes are always
//! whole-snapshot replace through a temp file and rename, so a crash
//! mid-write never corrupts the primary snapshot.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::ledger::Ledger;

pub mod pump;

/// Write the snapshot blob to `path`, replacing any previous snapshot
/// atomically at the rename boundary.
pub fn save_snapshot(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create snapshot dir {}", parent.display()))?;
        }
    }

    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    fs::write(&tmp, json)
        .with_context(|| format!("Failed to write snapshot temp file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace snapshot {}", path.display()))?;

    debug!(path = %path.display(), bytes = json.len(), "Snapshot saved");
    Ok(())
}

/// Load the ledger from the snapshot file. A missing, unreadable, or
/// malformed snapshot yields a fresh empty ledger — cold start never
/// fails the process.
pub fn load_ledger(path: &Path) -> Ledger {
    if !path.exists() {
        info!(path = %path.display(), "No snapshot found, starting a new game");
        return Ledger::new();
    }

    match fs::read_to_string(path) {
        Ok(blob) => Ledger::from_json(&blob),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to read snapshot — starting a new game"
            );
            Ledger::new()
        }
    }
}

/// Backup file path for a calendar day. Deterministic in the date and
/// independent of round identifiers, so same-day writes overwrite the
/// same file.
pub fn backup_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("fluxbux-{}.json", date.format("%Y-%m-%d")))
}

/// Write the dated backup copy for `date`.
pub fn write_backup(dir: &Path, json: &str, date: NaiveDate) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create backup dir {}", dir.display()))?;
    let path = backup_path(dir, date);
    fs::write(&path, json)
        .with_context(|| format!("Failed to write backup {}", path.display()))?;
    debug!(path = %path.display(), "Backup written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
