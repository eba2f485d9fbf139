//! Round Lifecycle Manager.
//!
//! Governs a round's state machine: options set → bets accepted →
//! settled (terminal). A round accepts bets whenever no result has been
//! recorded and at least one option exists. Also owns the one-time
//! bonus grant guarded by the round's claimed set.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::engine::settlement::payout_ratio;
use crate::ledger::Ledger;
use crate::types::{Bet, BetReceipt, LedgerError, ResetMode};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Set or extend the outcome list for a round, creating the round
/// lazily on first reference. Returns the resulting option list as
/// confirmation.
///
/// `OptionsOnly` clears the list before appending — existing bets on
/// removed options become orphaned and are tolerated by settlement.
/// `Full` additionally clears bets, pool, and result, restarting the
/// round. Appended duplicates are skipped.
pub fn set_options(
    ledger: &mut Ledger,
    round_id: &str,
    options: &[String],
    reset: ResetMode,
) -> Vec<String> {
    let round = ledger.round_entry(round_id);

    match reset {
        ResetMode::None => {}
        ResetMode::OptionsOnly => {
            if !round.bets.is_empty() {
                warn!(
                    round = round_id,
                    bets = round.bets.len(),
                    "Options reset with active bets — bets on removed options are orphaned"
                );
            }
            round.options.clear();
        }
        ResetMode::Full => {
            round.options.clear();
            round.bets.clear();
            round.betting_pool.clear();
            round.result = None;
        }
    }

    for option in options {
        if !round.options.contains(option) {
            round.options.push(option.clone());
            // Seed a zero pool entry so the option shows up in status
            // before anyone wagers on it.
            round.betting_pool.entry(option.clone()).or_insert(Decimal::ZERO);
        }
    }

    info!(
        round = round_id,
        reset = %reset,
        options = ?round.options,
        "Round options set"
    );

    round.options.clone()
}

// ---------------------------------------------------------------------------
// Bet placement
// ---------------------------------------------------------------------------

/// Place (or replace) a user's wager for a round.
///
/// Check order: closed round, non-positive amount, insufficient
/// balance, unknown outcome. A failed check leaves balances, bets, and
/// the pool untouched. The balance itself is not debited here — losses
/// are collected and wins credited at settlement.
pub fn place_bet(
    ledger: &mut Ledger,
    round_id: &str,
    user: &str,
    outcome: &str,
    amount: Decimal,
) -> Result<BetReceipt, LedgerError> {
    ledger.ensure_round(round_id);
    ledger.ensure_user(user);

    let balance = ledger.balance(user);
    let round = ledger
        .round(round_id)
        .ok_or_else(|| LedgerError::RoundNotFound(round_id.to_string()))?;

    if round.is_settled() {
        return Err(LedgerError::RoundClosed(round_id.to_string()));
    }
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    if amount > balance {
        return Err(LedgerError::InsufficientBalance {
            wagered: amount,
            available: balance,
        });
    }
    if !round.options.iter().any(|o| o == outcome) {
        return Err(LedgerError::InvalidOutcome {
            round: round_id.to_string(),
            outcome: outcome.to_string(),
        });
    }

    // All checks passed — mutate. Replacement semantics: the prior
    // wager is first subtracted from its pool entry, so only the latest
    // bet stands.
    let round = ledger.round_entry(round_id);
    let replaced = round
        .bets
        .get(user)
        .map(|prev| (prev.outcome.clone(), prev.amount));

    if let Some((prev_outcome, prev_amount)) = &replaced {
        *round
            .betting_pool
            .entry(prev_outcome.clone())
            .or_insert(Decimal::ZERO) -= *prev_amount;
        debug!(
            round = round_id,
            user,
            prev_outcome = prev_outcome.as_str(),
            prev_amount = %prev_amount,
            "Prior bet replaced"
        );
    }

    round.bets.insert(
        user.to_string(),
        Bet {
            outcome: outcome.to_string(),
            amount,
            placed_at: Utc::now(),
        },
    );
    *round
        .betting_pool
        .entry(outcome.to_string())
        .or_insert(Decimal::ZERO) += amount;

    debug_assert!(round.pool_is_consistent());

    let ratio = payout_ratio(amount);
    info!(
        round = round_id,
        user,
        outcome,
        amount = %amount,
        ratio = %ratio,
        "Bet placed"
    );

    Ok(BetReceipt {
        round_id: round_id.to_string(),
        user: user.to_string(),
        outcome: outcome.to_string(),
        amount,
        payout_ratio: ratio,
        projected_gross: amount * ratio,
        replaced: replaced.map(|(_, a)| a),
    })
}

// ---------------------------------------------------------------------------
// Bonus grant
// ---------------------------------------------------------------------------

/// One-time-per-round bonus grant. Returns `false` without touching the
/// balance when the user has already claimed for this round; otherwise
/// credits `amount` and marks the claim.
///
/// The validity window (hours from round creation) is enforced by the
/// caller against `Round::created_at`, not here.
pub fn grant_bonus(ledger: &mut Ledger, round_id: &str, user: &str, amount: Decimal) -> bool {
    ledger.ensure_user(user);

    let round = ledger.round_entry(round_id);
    if !round.claimed.insert(user.to_string()) {
        debug!(round = round_id, user, "Bonus already claimed");
        return false;
    }

    let balance = ledger.adjust_balance(user, amount);
    info!(
        round = round_id,
        user,
        amount = %amount,
        balance = %balance,
        "Bonus claimed"
    );
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
