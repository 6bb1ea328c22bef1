// ============================================================================
// Round Accounting - Sportsbook Settlement Core
// ============================================================================
//
// Per-round allocation, per-user balances and profit-and-loss tracking.
// Rounds are never destroyed; closed rounds keep their PnL for historical
// queries.
//
// PnL Invariant:
//   cumulative_profit_and_loss[n] =
//       cumulative_profit_and_loss[n-1] * profit_and_loss[n]
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Sentinel round that cross-round tickets are bound to; it never closes.
pub const DEFAULT_ROUND: u32 = 1;

/// First ordinary trading round created by `start()`.
pub const FIRST_TRADING_ROUND: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub index: u32,
    pub start: u64,
    pub end: u64,

    /// Collateral assigned to the round before trading
    pub allocation: f64,

    /// Isolated round pool; must never go negative
    pub balance: f64,

    /// Realized ratio, 1.0 = break-even; fixed when closing is prepared
    pub profit_and_loss: f64,

    /// Running product of all prior ratios including this round's
    pub cumulative_profit_and_loss: f64,

    pub closed: bool,
}

impl Round {
    fn new(index: u32) -> Self {
        Self {
            index,
            start: 0,
            end: 0,
            allocation: 0.0,
            balance: 0.0,
            profit_and_loss: 1.0,
            cumulative_profit_and_loss: 1.0,
            closed: false,
        }
    }
}

/// Keyed store of rounds and (round, user) balances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundLedger {
    rounds: BTreeMap<u32, Round>,
    balances: HashMap<u32, HashMap<String, f64>>,
    /// Depositors per round in first-deposit order, for the closing cursor
    depositors: HashMap<u32, Vec<String>>,
}

impl RoundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round(&self, index: u32) -> Option<&Round> {
        self.rounds.get(&index)
    }

    pub fn round_mut(&mut self, index: u32) -> Option<&mut Round> {
        self.rounds.get_mut(&index)
    }

    pub fn ensure_round(&mut self, index: u32) -> &mut Round {
        self.rounds.entry(index).or_insert_with(|| Round::new(index))
    }

    /// Credit a deposit or rollover into a round: allocation, round pool and
    /// the user's balance all grow by `amount`.
    pub fn credit(&mut self, index: u32, user: &str, amount: f64) {
        let round = self.ensure_round(index);
        round.allocation += amount;
        round.balance += amount;

        let balances = self.balances.entry(index).or_default();
        let entry = balances.entry(user.to_string()).or_insert(0.0);
        if *entry == 0.0 {
            self.depositors
                .entry(index)
                .or_default()
                .push(user.to_string());
        }
        *entry += amount;
    }

    pub fn user_balance(&self, index: u32, user: &str) -> f64 {
        self.balances
            .get(&index)
            .and_then(|balances| balances.get(user))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn zero_user_balance(&mut self, index: u32, user: &str) {
        if let Some(balances) = self.balances.get_mut(&index) {
            balances.insert(user.to_string(), 0.0);
        }
    }

    pub fn users_in_round(&self, index: u32) -> Vec<String> {
        self.depositors.get(&index).cloned().unwrap_or_default()
    }

    pub fn cumulative_profit_and_loss(&self, index: u32) -> f64 {
        self.rounds
            .get(&index)
            .map(|round| round.cumulative_profit_and_loss)
            .unwrap_or(1.0)
    }
}
