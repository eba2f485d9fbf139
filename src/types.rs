//! Shared types for the FLUXBUX ledger.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that ledger, engine, and storage
//! modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// Bet
// ---------------------------------------------------------------------------

/// A single active wager: one per user per round, replaced on re-bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    /// Outcome name the wager is on.
    pub outcome: String,
    /// Wagered amount in fluxbux.
    pub amount: Decimal,
    /// When the (latest) bet was placed.
    pub placed_at: DateTime<Utc>,
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {} fluxbux", self.outcome, self.amount)
    }
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// One weekly wagering period, keyed in the ledger by a round id
/// (an ISO week number string supplied by the caller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// Ordered set of valid outcome names. Append-only except on reset.
    pub options: Vec<String>,
    /// Active bets, one per user.
    pub bets: BTreeMap<String, Bet>,
    /// Cached per-outcome wager sums. Invariant: sums match `bets`.
    pub betting_pool: BTreeMap<String, Decimal>,
    /// Terminal marker: `Some` once settled, never cleared except by a
    /// full reset.
    pub result: Option<RoundResult>,
    /// Users who already received the one-time bonus for this round.
    #[serde(default)]
    pub claimed: BTreeSet<String>,
    /// Round creation time. Callers use it to enforce the time-boxed
    /// bonus-claim window; the ledger itself does not.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Default for Round {
    fn default() -> Self {
        Self {
            options: Vec::new(),
            bets: BTreeMap::new(),
            betting_pool: BTreeMap::new(),
            result: None,
            claimed: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }
}

impl Round {
    /// Whether the round has been settled.
    pub fn is_settled(&self) -> bool {
        self.result.is_some()
    }

    /// A round accepts bets whenever it is unsettled and at least one
    /// option exists.
    pub fn accepting_bets(&self) -> bool {
        !self.is_settled() && !self.options.is_empty()
    }

    /// Sum of all pool entries.
    pub fn total_pool(&self) -> Decimal {
        self.betting_pool.values().copied().sum()
    }

    /// Pool total for one outcome (zero if never wagered on).
    pub fn pool_for(&self, outcome: &str) -> Decimal {
        self.betting_pool.get(outcome).copied().unwrap_or(Decimal::ZERO)
    }

    /// Pool-consistency invariant: cached pool sums equal the sum of
    /// active wager amounts.
    pub fn pool_is_consistent(&self) -> bool {
        let wagered: Decimal = self.bets.values().map(|b| b.amount).sum();
        self.total_pool() == wagered
    }

    /// Age of the round since creation.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

// ---------------------------------------------------------------------------
// Reset mode
// ---------------------------------------------------------------------------

/// How `set_options` treats existing round state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetMode {
    /// Append new options to the existing list.
    None,
    /// Clear the option list first; bets and pool are untouched, so
    /// bets on removed options become orphaned (settlement tolerates
    /// them).
    OptionsOnly,
    /// Additionally clear bets, pool, and result — restart the round.
    Full,
}

impl fmt::Display for ResetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetMode::None => write!(f, "none"),
            ResetMode::OptionsOnly => write!(f, "options_only"),
            ResetMode::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for ResetMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "append" => Ok(ResetMode::None),
            "options_only" | "options" => Ok(ResetMode::OptionsOnly),
            "full" | "restart" => Ok(ResetMode::Full),
            _ => Err(anyhow::anyhow!("Unknown reset mode: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Receipts & reports
// ---------------------------------------------------------------------------

/// Confirmation payload returned after a bet is accepted.
///
/// The ratio is informational only — nothing is reserved or escrowed
/// at placement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetReceipt {
    pub round_id: String,
    pub user: String,
    pub outcome: String,
    pub amount: Decimal,
    /// Tiered payout ratio this wager would earn if it wins.
    pub payout_ratio: Decimal,
    /// `amount * payout_ratio`, before commission.
    pub projected_gross: Decimal,
    /// Amount the replaced prior bet returned to its pool entry, if any.
    pub replaced: Option<Decimal>,
}

impl fmt::Display for BetReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bet {} fluxbux on {} for round {} (ratio {}, pays {} gross)",
            self.user,
            self.amount,
            self.outcome,
            self.round_id,
            self.payout_ratio,
            self.projected_gross,
        )
    }
}

/// Immutable settlement record written into a round. Once present the
/// round is closed for further bets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// The declared winning outcome.
    pub winner: String,
    pub correct_bets: u32,
    pub incorrect_bets: u32,
    pub total_pool: Decimal,
    /// Pool on the winning outcome (zero if nobody wagered on it).
    pub winner_pool: Decimal,
    /// Sum of net payouts credited to winners (after commission).
    pub total_payout: Decimal,
    /// Sum of commission taken from gross winning payouts.
    pub total_commission: Decimal,
    /// Sum of losing wagers collected by the house.
    pub losses_collected: Decimal,
    /// Net house gain: `losses_collected - total_payout`.
    pub house_net: Decimal,
    pub settled_at: DateTime<Utc>,
}

impl fmt::Display for RoundResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "winner={} correct={} incorrect={} pool={} winner_pool={} paid={} commission={} collected={} house_net={}",
            self.winner,
            self.correct_bets,
            self.incorrect_bets,
            self.total_pool,
            self.winner_pool,
            self.total_payout,
            self.total_commission,
            self.losses_collected,
            self.house_net,
        )
    }
}

/// How a single user fared in a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WagerOutcome {
    Won,
    Lost,
}

impl fmt::Display for WagerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerOutcome::Won => write!(f, "won"),
            WagerOutcome::Lost => write!(f, "lost"),
        }
    }
}

/// Per-user line of a settlement breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOutcome {
    pub user: String,
    /// External display id, when an alias is linked.
    pub display: String,
    pub outcome: WagerOutcome,
    /// Net payout credited (won) or wager debited (lost).
    pub amount: Decimal,
    /// Balance after the settlement was applied.
    pub balance_after: Decimal,
}

impl fmt::Display for UserOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} fluxbux", self.display, self.outcome, self.amount)
    }
}

/// Structured win/loss breakdown returned by `settle` for display by
/// the adapter layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub round_id: String,
    pub result: RoundResult,
    pub outcomes: Vec<UserOutcome>,
}

impl fmt::Display for SettlementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "The outcome of round {} is:", self.round_id)?;
        for line in &self.outcomes {
            writeln!(f, "- {line}")?;
        }
        write!(f, "({})", self.result)
    }
}

/// One balance line in a status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceLine {
    pub user: String,
    pub display: String,
    pub balance: Decimal,
}

/// One active-bet line in a status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetLine {
    pub user: String,
    pub display: String,
    pub outcome: String,
    pub amount: Decimal,
}

/// Snapshot of balances and active bets for one round, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub round_id: String,
    pub options: Vec<String>,
    pub balances: Vec<BalanceLine>,
    pub bets: Vec<BetLine>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current fluxbux listing:")?;
        if self.balances.is_empty() {
            writeln!(f, "- None")?;
        }
        for b in &self.balances {
            writeln!(f, "- {}: {}", b.display, b.balance)?;
        }
        writeln!(f, "Bets for round {}:", self.round_id)?;
        if self.bets.is_empty() {
            return write!(f, "- None");
        }
        for (i, b) in self.bets.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {}: {} for {} fluxbux", b.display, b.outcome, b.amount)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error taxonomy for the ledger.
///
/// All variants are recoverable, caller-visible outcomes: the adapter
/// decides how to present them. None of them is ever fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Round {0} is closed: a result has already been recorded")]
    RoundClosed(String),

    #[error("Invalid wager amount: {0} (must be positive)")]
    InvalidAmount(Decimal),

    #[error("Not enough fluxbux: wagered {wagered}, balance is {available}")]
    InsufficientBalance { wagered: Decimal, available: Decimal },

    #[error("'{outcome}' is not an option for round {round}")]
    InvalidOutcome { round: String, outcome: String },

    #[error("No bets have been made for round {0}")]
    EmptyPool(String),

    #[error("Round not found: {0}")]
    RoundNotFound(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bet(outcome: &str, amount: Decimal) -> Bet {
        Bet {
            outcome: outcome.to_string(),
            amount,
            placed_at: Utc::now(),
        }
    }

    // -- Round tests --

    #[test]
    fn test_round_default_is_open_but_not_accepting() {
        let round = Round::default();
        assert!(!round.is_settled());
        // No options yet, so not accepting bets.
        assert!(!round.accepting_bets());
        assert_eq!(round.total_pool(), Decimal::ZERO);
        assert!(round.pool_is_consistent());
    }

    #[test]
    fn test_round_accepting_bets_with_options() {
        let mut round = Round::default();
        round.options.push("alice".to_string());
        assert!(round.accepting_bets());
    }

    #[test]
    fn test_round_pool_for_missing_outcome_is_zero() {
        let round = Round::default();
        assert_eq!(round.pool_for("ghost"), Decimal::ZERO);
    }

    #[test]
    fn test_round_pool_consistency_detects_drift() {
        let mut round = Round::default();
        round.bets.insert("u1".to_string(), bet("a", dec!(50)));
        // Pool not updated → inconsistent.
        assert!(!round.pool_is_consistent());
        round.betting_pool.insert("a".to_string(), dec!(50));
        assert!(round.pool_is_consistent());
    }

    #[test]
    fn test_round_serialization_roundtrip() {
        let mut round = Round::default();
        round.options = vec!["a".to_string(), "b".to_string()];
        round.bets.insert("u1".to_string(), bet("a", dec!(25)));
        round.betting_pool.insert("a".to_string(), dec!(25));
        round.claimed.insert("u1".to_string());

        let json = serde_json::to_string(&round).unwrap();
        let parsed: Round = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.options, vec!["a", "b"]);
        assert_eq!(parsed.bets["u1"].amount, dec!(25));
        assert!(parsed.claimed.contains("u1"));
        assert!(parsed.result.is_none());
    }

    #[test]
    fn test_round_deserialize_without_claimed_or_created_at() {
        // Older snapshots lack these fields; serde defaults must kick in.
        let json = r#"{"options":["a"],"bets":{},"betting_pool":{},"result":null}"#;
        let round: Round = serde_json::from_str(json).unwrap();
        assert!(round.claimed.is_empty());
        assert!(round.age() >= chrono::Duration::zero());
    }

    // -- ResetMode tests --

    #[test]
    fn test_reset_mode_from_str() {
        assert_eq!("none".parse::<ResetMode>().unwrap(), ResetMode::None);
        assert_eq!("OPTIONS_ONLY".parse::<ResetMode>().unwrap(), ResetMode::OptionsOnly);
        assert_eq!("full".parse::<ResetMode>().unwrap(), ResetMode::Full);
        assert_eq!("restart".parse::<ResetMode>().unwrap(), ResetMode::Full);
        assert!("nonsense".parse::<ResetMode>().is_err());
    }

    #[test]
    fn test_reset_mode_display() {
        assert_eq!(format!("{}", ResetMode::None), "none");
        assert_eq!(format!("{}", ResetMode::OptionsOnly), "options_only");
        assert_eq!(format!("{}", ResetMode::Full), "full");
    }

    // -- Receipt & report tests --

    #[test]
    fn test_bet_receipt_display() {
        let receipt = BetReceipt {
            round_id: "34".to_string(),
            user: "alice".to_string(),
            outcome: "bob".to_string(),
            amount: dec!(50),
            payout_ratio: dec!(2.0),
            projected_gross: dec!(100),
            replaced: None,
        };
        let display = format!("{receipt}");
        assert!(display.contains("alice"));
        assert!(display.contains("50"));
        assert!(display.contains("round 34"));
    }

    #[test]
    fn test_settlement_report_display_lists_outcomes() {
        let report = SettlementReport {
            round_id: "34".to_string(),
            result: RoundResult {
                winner: "bob".to_string(),
                correct_bets: 1,
                incorrect_bets: 1,
                total_pool: dec!(80),
                winner_pool: dec!(50),
                total_payout: dec!(95),
                total_commission: dec!(5),
                losses_collected: dec!(30),
                house_net: dec!(-65),
                settled_at: Utc::now(),
            },
            outcomes: vec![
                UserOutcome {
                    user: "alice".to_string(),
                    display: "alice".to_string(),
                    outcome: WagerOutcome::Won,
                    amount: dec!(95),
                    balance_after: dec!(195),
                },
                UserOutcome {
                    user: "carol".to_string(),
                    display: "carol".to_string(),
                    outcome: WagerOutcome::Lost,
                    amount: dec!(30),
                    balance_after: dec!(70),
                },
            ],
        };
        let display = format!("{report}");
        assert!(display.contains("alice won 95 fluxbux"));
        assert!(display.contains("carol lost 30 fluxbux"));
        assert!(display.contains("winner=bob"));
    }

    #[test]
    fn test_status_report_display_empty() {
        let report = StatusReport {
            round_id: "34".to_string(),
            options: Vec::new(),
            balances: Vec::new(),
            bets: Vec::new(),
        };
        let display = format!("{report}");
        assert!(display.contains("- None"));
    }

    #[test]
    fn test_round_result_serialization_roundtrip() {
        let result = RoundResult {
            winner: "bob".to_string(),
            correct_bets: 2,
            incorrect_bets: 3,
            total_pool: dec!(500),
            winner_pool: dec!(200),
            total_payout: dec!(380),
            total_commission: dec!(20),
            losses_collected: dec!(300),
            house_net: dec!(-80),
            settled_at: Utc::now(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: RoundResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.winner, "bob");
        assert_eq!(parsed.total_payout, dec!(380));
    }

    // -- LedgerError tests --

    #[test]
    fn test_ledger_error_display() {
        let e = LedgerError::InsufficientBalance {
            wagered: dec!(100),
            available: dec!(40),
        };
        let msg = format!("{e}");
        assert!(msg.contains("100"));
        assert!(msg.contains("40"));

        let e = LedgerError::InvalidOutcome {
            round: "34".to_string(),
            outcome: "ghost".to_string(),
        };
        assert_eq!(format!("{e}"), "'ghost' is not an option for round 34");
    }
}
