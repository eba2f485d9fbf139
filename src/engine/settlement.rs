//! Settlement Engine.
//!
//! Closes a round by resolving a winning outcome: computes tiered
//! payouts and house commission, debits losers, credits winners, and
//! records the immutable result. The whole per-round pass is two-phase
//! (plan, then apply) so an error can never leave balances partially
//! updated.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::ledger::{Ledger, HOUSE};
use crate::types::{LedgerError, RoundResult, SettlementReport, UserOutcome, WagerOutcome};

/// Fixed house commission rate taken from gross winning payouts.
pub const COMMISSION_RATE: Decimal = dec!(0.05);

// ---------------------------------------------------------------------------
// Payout ratio
// ---------------------------------------------------------------------------

/// Tiered payout ratio, fixed by the individual wager size at placement
/// time. Deliberately independent of pool size or winner concentration,
/// so total payouts can structurally exceed the pool — the house
/// absorbs the difference. Known economic property, not clamped.
pub fn payout_ratio(wager: Decimal) -> Decimal {
    if wager <= dec!(100) {
        dec!(2.0)
    } else if wager <= dec!(300) {
        dec!(1.5)
    } else {
        dec!(1.0)
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// One planned balance delta, computed before anything is applied.
struct PlannedDelta {
    user: String,
    outcome: WagerOutcome,
    /// Net payout (won) or forfeited wager (lost) — always positive.
    amount: Decimal,
}

/// Settle a round against a declared winning outcome.
///
/// Fails with `RoundNotFound` if the round was never recorded,
/// `RoundClosed` if a result already exists (double settlement would
/// double-apply every delta), and `EmptyPool` if nothing was wagered.
/// A winning outcome nobody bet on is not an error: its pool is zero
/// and every bettor loses. Orphaned bets on options removed by a later
/// reset are settled like any other bet.
pub fn settle(
    ledger: &mut Ledger,
    round_id: &str,
    winner: &str,
) -> Result<SettlementReport, LedgerError> {
    let round = ledger
        .round(round_id)
        .ok_or_else(|| LedgerError::RoundNotFound(round_id.to_string()))?;

    if round.is_settled() {
        return Err(LedgerError::RoundClosed(round_id.to_string()));
    }

    let total_pool = round.total_pool();
    if total_pool == Decimal::ZERO {
        return Err(LedgerError::EmptyPool(round_id.to_string()));
    }
    let winner_pool = round.pool_for(winner);

    // -- Plan phase: pure computation over the round, no mutation ----------

    let mut plan: Vec<PlannedDelta> = Vec::with_capacity(round.bets.len());
    let mut correct_bets = 0u32;
    let mut incorrect_bets = 0u32;
    let mut total_payout = Decimal::ZERO;
    let mut total_commission = Decimal::ZERO;
    let mut losses_collected = Decimal::ZERO;

    for (user, bet) in &round.bets {
        if bet.outcome == winner {
            let ratio = payout_ratio(bet.amount);
            let gross = bet.amount * ratio;
            let commission = gross * COMMISSION_RATE;
            let net = gross - commission;

            correct_bets += 1;
            total_payout += net;
            total_commission += commission;
            plan.push(PlannedDelta {
                user: user.clone(),
                outcome: WagerOutcome::Won,
                amount: net,
            });
        } else {
            incorrect_bets += 1;
            losses_collected += bet.amount;
            plan.push(PlannedDelta {
                user: user.clone(),
                outcome: WagerOutcome::Lost,
                amount: bet.amount,
            });
        }
    }

    // The house absorbs losing wagers and pays winners net of the
    // commission already deducted from their gross.
    let house_net = losses_collected - total_payout;

    let result = RoundResult {
        winner: winner.to_string(),
        correct_bets,
        incorrect_bets,
        total_pool,
        winner_pool,
        total_payout,
        total_commission,
        losses_collected,
        house_net,
        settled_at: Utc::now(),
    };

    // -- Apply phase: infallible, so the pass is all-or-nothing ------------

    let mut outcomes = Vec::with_capacity(plan.len());
    for delta in plan {
        let signed = match delta.outcome {
            WagerOutcome::Won => delta.amount,
            WagerOutcome::Lost => -delta.amount,
        };
        let balance_after = ledger.adjust_balance(&delta.user, signed);
        outcomes.push(UserOutcome {
            display: ledger.display_name(&delta.user),
            user: delta.user,
            outcome: delta.outcome,
            amount: delta.amount,
            balance_after,
        });
    }
    ledger.adjust_balance(HOUSE, house_net);

    if let Some(round) = ledger.round_mut(round_id) {
        round.result = Some(result.clone());
    }

    info!(
        round = round_id,
        winner,
        correct = correct_bets,
        incorrect = incorrect_bets,
        pool = %total_pool,
        paid = %total_payout,
        commission = %total_commission,
        house_net = %house_net,
        "Round settled"
    );

    Ok(SettlementReport {
        round_id: round_id.to_string(),
        result,
        outcomes,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
