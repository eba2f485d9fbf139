//! Core engine — round lifecycle transitions and pari-mutuel settlement.
//!
//! Both submodules operate on an explicitly owned [`Ledger`](crate::ledger::Ledger)
//! passed by the caller; the engine holds no state of its own.

pub mod lifecycle;
pub mod settlement;

pub use lifecycle::{grant_bonus, place_bet, set_options};
pub use settlement::{payout_ratio, settle, COMMISSION_RATE};
