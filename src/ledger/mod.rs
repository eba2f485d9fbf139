//! Ledger Store — single source of truth for balances and rounds.
//!
//! Every read and write of user balances, aliases, and weekly rounds
//! goes through this type so the invariants are enforced in one place.
//! The store itself does no I/O; serialization produces a versioned
//! snapshot blob that `storage` writes and reloads.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::types::{BalanceLine, BetLine, Round, RoundResult, StatusReport};

/// Reserved account that absorbs losing wagers and commission and
/// funds winner payouts.
pub const HOUSE: &str = "house";

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Snapshot schema
// ---------------------------------------------------------------------------

/// Canonical on-disk schema. Field names (`users`, `user_map`, `weeks`)
/// are stable; the version tag allows forward migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default = "current_version")]
    version: u32,
    users: BTreeMap<String, Decimal>,
    #[serde(default)]
    user_map: BTreeMap<String, String>,
    weeks: BTreeMap<String, Round>,
}

fn current_version() -> u32 {
    SNAPSHOT_VERSION
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The in-memory wagering ledger. Owned explicitly by the caller and
/// passed by reference to every operation — no ambient global.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    /// User id → fluxbux balance. Entries are created implicitly with
    /// balance 0 and never deleted. Balances may go negative through
    /// settlement losses.
    users: BTreeMap<String, Decimal>,
    /// Internal user id → external display id (one per alias).
    user_map: BTreeMap<String, String>,
    /// Round id → round record. Rounds are never deleted and remain
    /// queryable indefinitely.
    weeks: BTreeMap<String, Round>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Users -------------------------------------------------------------

    /// Insert `id` with balance 0 if absent. Idempotent, no failure mode.
    pub fn ensure_user(&mut self, id: &str) {
        if !self.users.contains_key(id) {
            debug!(user = id, "New user created with zero balance");
            self.users.insert(id.to_string(), Decimal::ZERO);
        }
    }

    /// Current balance, zero for unknown users.
    pub fn balance(&self, id: &str) -> Decimal {
        self.users.get(id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Apply a signed delta. No floor or ceiling is enforced here —
    /// callers enforce their own pre-conditions. Returns the new balance.
    pub fn adjust_balance(&mut self, id: &str, delta: Decimal) -> Decimal {
        self.ensure_user(id);
        let balance = self.users.get_mut(id).unwrap();
        *balance += delta;
        debug!(user = id, delta = %delta, balance = %balance, "Balance adjusted");
        *balance
    }

    /// All balances, for status display.
    pub fn users(&self) -> &BTreeMap<String, Decimal> {
        &self.users
    }

    // -- Aliases -----------------------------------------------------------

    /// Link an internal user id to an external display id. A later link
    /// replaces the earlier one; the previous value is returned.
    pub fn link_alias(&mut self, id: &str, external: &str) -> Option<String> {
        info!(user = id, external, "Alias linked");
        self.user_map.insert(id.to_string(), external.to_string())
    }

    /// Display name for a user: the linked external id, or the internal
    /// id itself when no alias exists.
    pub fn display_name(&self, id: &str) -> String {
        self.user_map.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    // -- Rounds ------------------------------------------------------------

    /// Insert an empty round if absent. Idempotent.
    pub fn ensure_round(&mut self, round_id: &str) {
        let _ = self.round_entry(round_id);
    }

    /// Mutable access to a round, creating it lazily on first reference.
    pub fn round_entry(&mut self, round_id: &str) -> &mut Round {
        if !self.weeks.contains_key(round_id) {
            info!(round = round_id, "New round created");
        }
        self.weeks.entry(round_id.to_string()).or_default()
    }

    pub fn round(&self, round_id: &str) -> Option<&Round> {
        self.weeks.get(round_id)
    }

    pub fn round_mut(&mut self, round_id: &str) -> Option<&mut Round> {
        self.weeks.get_mut(round_id)
    }

    /// All recorded round ids, for historical lookup.
    pub fn round_ids(&self) -> impl Iterator<Item = &str> {
        self.weeks.keys().map(String::as_str)
    }

    // -- Queries -----------------------------------------------------------

    /// Balances plus active bets for one round, alias-resolved for
    /// display. Unknown rounds yield an empty bet list.
    pub fn status(&self, round_id: &str) -> StatusReport {
        let balances = self
            .users
            .iter()
            .map(|(user, balance)| BalanceLine {
                user: user.clone(),
                display: self.display_name(user),
                balance: *balance,
            })
            .collect();

        let (options, bets) = match self.weeks.get(round_id) {
            Some(round) => (
                round.options.clone(),
                round
                    .bets
                    .iter()
                    .map(|(user, bet)| BetLine {
                        user: user.clone(),
                        display: self.display_name(user),
                        outcome: bet.outcome.clone(),
                        amount: bet.amount,
                    })
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        StatusReport {
            round_id: round_id.to_string(),
            options,
            balances,
            bets,
        }
    }

    /// Settlement record for a round, if it has been settled.
    pub fn result(&self, round_id: &str) -> Option<&RoundResult> {
        self.weeks.get(round_id).and_then(|r| r.result.as_ref())
    }

    // -- Snapshot ----------------------------------------------------------

    /// Serialize the complete ledger to a versioned JSON snapshot.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            users: self.users.clone(),
            user_map: self.user_map.clone(),
            weeks: self.weeks.clone(),
        };
        serde_json::to_string_pretty(&snapshot)
    }

    /// Deserialize a snapshot blob. A malformed blob or an unknown
    /// schema version yields a fresh empty ledger rather than failing
    /// the process (crash-safe cold start).
    pub fn from_json(blob: &str) -> Self {
        let snapshot: Snapshot = match serde_json::from_str(blob) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Malformed snapshot — starting with a fresh ledger");
                return Self::new();
            }
        };

        if snapshot.version > SNAPSHOT_VERSION {
            warn!(
                version = snapshot.version,
                supported = SNAPSHOT_VERSION,
                "Snapshot from a newer schema — starting with a fresh ledger"
            );
            return Self::new();
        }

        info!(
            users = snapshot.users.len(),
            rounds = snapshot.weeks.len(),
            version = snapshot.version,
            "Ledger restored from snapshot"
        );

        Self {
            users: snapshot.users,
            user_map: snapshot.user_map,
            weeks: snapshot.weeks,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bet;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ensure_user_idempotent() {
        let mut ledger = Ledger::new();
        ledger.ensure_user("alice");
        ledger.adjust_balance("alice", dec!(100));
        ledger.ensure_user("alice");
        assert_eq!(ledger.balance("alice"), dec!(100));
    }

    #[test]
    fn test_balance_unknown_user_is_zero() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance("nobody"), Decimal::ZERO);
    }

    #[test]
    fn test_adjust_balance_signed() {
        let mut ledger = Ledger::new();
        ledger.adjust_balance("alice", dec!(100));
        ledger.adjust_balance("alice", dec!(-150));
        // No floor: settlement losses may drive a balance negative.
        assert_eq!(ledger.balance("alice"), dec!(-50));
    }

    #[test]
    fn test_adjust_balance_creates_user() {
        let mut ledger = Ledger::new();
        let balance = ledger.adjust_balance("bob", dec!(25));
        assert_eq!(balance, dec!(25));
        assert!(ledger.users().contains_key("bob"));
    }

    #[test]
    fn test_ensure_round_idempotent() {
        let mut ledger = Ledger::new();
        ledger.ensure_round("34");
        ledger.round_mut("34").unwrap().options.push("a".to_string());
        ledger.ensure_round("34");
        assert_eq!(ledger.round("34").unwrap().options, vec!["a"]);
    }

    #[test]
    fn test_link_alias_replaces() {
        let mut ledger = Ledger::new();
        assert!(ledger.link_alias("alice", "alice#1234").is_none());
        let prev = ledger.link_alias("alice", "alice#5678");
        assert_eq!(prev.as_deref(), Some("alice#1234"));
        assert_eq!(ledger.display_name("alice"), "alice#5678");
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let ledger = Ledger::new();
        assert_eq!(ledger.display_name("carol"), "carol");
    }

    #[test]
    fn test_status_unknown_round() {
        let mut ledger = Ledger::new();
        ledger.adjust_balance("alice", dec!(10));
        let status = ledger.status("99");
        assert_eq!(status.balances.len(), 1);
        assert!(status.bets.is_empty());
        assert!(status.options.is_empty());
    }

    #[test]
    fn test_status_resolves_aliases() {
        let mut ledger = Ledger::new();
        ledger.adjust_balance("alice", dec!(10));
        ledger.link_alias("alice", "Alice The Bold");
        ledger.ensure_round("34");
        let round = ledger.round_mut("34").unwrap();
        round.options.push("bob".to_string());
        round.bets.insert(
            "alice".to_string(),
            Bet {
                outcome: "bob".to_string(),
                amount: dec!(10),
                placed_at: Utc::now(),
            },
        );
        round.betting_pool.insert("bob".to_string(), dec!(10));

        let status = ledger.status("34");
        assert_eq!(status.balances[0].display, "Alice The Bold");
        assert_eq!(status.bets[0].display, "Alice The Bold");
        assert_eq!(status.bets[0].amount, dec!(10));
    }

    // -- Snapshot tests --

    #[test]
    fn test_snapshot_roundtrip() {
        let mut ledger = Ledger::new();
        ledger.adjust_balance("alice", dec!(100));
        ledger.adjust_balance(HOUSE, dec!(5));
        ledger.link_alias("alice", "alice#1234");
        ledger.ensure_round("34");
        ledger.round_mut("34").unwrap().options.push("bob".to_string());

        let json = ledger.to_json().unwrap();
        let restored = Ledger::from_json(&json);

        assert_eq!(restored.balance("alice"), dec!(100));
        assert_eq!(restored.balance(HOUSE), dec!(5));
        assert_eq!(restored.display_name("alice"), "alice#1234");
        assert_eq!(restored.round("34").unwrap().options, vec!["bob"]);
    }

    #[test]
    fn test_snapshot_contains_version_tag() {
        let ledger = Ledger::new();
        let json = ledger.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], SNAPSHOT_VERSION);
        assert!(value["users"].is_object());
        assert!(value["weeks"].is_object());
    }

    #[test]
    fn test_from_json_malformed_yields_fresh_ledger() {
        let ledger = Ledger::from_json("{not valid json");
        assert!(ledger.users().is_empty());
        assert_eq!(ledger.round_ids().count(), 0);
    }

    #[test]
    fn test_from_json_newer_version_yields_fresh_ledger() {
        let json = r#"{"version": 999, "users": {"alice": 10}, "weeks": {}}"#;
        let ledger = Ledger::from_json(json);
        assert_eq!(ledger.balance("alice"), Decimal::ZERO);
    }

    #[test]
    fn test_from_json_missing_user_map_defaults_empty() {
        // user_map was added after the first schema; old blobs omit it.
        let json = r#"{"version": 1, "users": {"alice": 42}, "weeks": {}}"#;
        let ledger = Ledger::from_json(json);
        assert_eq!(ledger.balance("alice"), dec!(42));
        assert_eq!(ledger.display_name("alice"), "alice");
    }
}
