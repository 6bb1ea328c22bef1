// ============================================================================
// Risk Ledger - Sportsbook Settlement Core
// ============================================================================
//
// Pure exposure accounting, no policy and no external calls. Tracks a signed
// exposure amount per (market, position) and an aggregate signed amount spent
// per game.
//
// Mirroring Invariant:
//   Adding risk r to a chosen position subtracts r/(n-1) from each of the
//   n-1 complementary positions, so the per-market exposures of any n-ary
//   market always sum to zero.
//
// ============================================================================

use crate::markets::{MarketKey, MarketLeg};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskLedger {
    /// Signed exposure per (market, position)
    exposure: HashMap<MarketKey, Vec<f64>>,

    /// Aggregate signed amount spent per game
    spent_on_game: HashMap<String, f64>,
}

impl RiskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_exposure(&self, key: &MarketKey, position: usize) -> f64 {
        self.exposure
            .get(key)
            .and_then(|positions| positions.get(position))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn market_exposures(&self, key: &MarketKey) -> Option<&Vec<f64>> {
        self.exposure.get(key)
    }

    pub fn game_exposure(&self, game_id: &str) -> f64 {
        self.spent_on_game.get(game_id).copied().unwrap_or(0.0)
    }

    /// Exposure the chosen position would carry after applying `risk`,
    /// without mutating anything.
    pub fn projected_position_exposure(&self, leg: &MarketLeg, risk: f64) -> f64 {
        self.position_exposure(&leg.key(), leg.position) + risk
    }

    pub fn projected_game_exposure(&self, game_id: &str, risk: f64) -> f64 {
        self.game_exposure(game_id) + risk
    }

    /// Apply `risk` for one leg: the chosen position takes +risk, every
    /// complementary position takes -risk/(n-1), and the game aggregate
    /// takes +risk.
    pub fn apply(&mut self, leg: &MarketLeg, risk: f64) {
        let positions = self
            .exposure
            .entry(leg.key())
            .or_insert_with(|| vec![0.0; leg.positions_count]);
        if positions.len() < leg.positions_count {
            positions.resize(leg.positions_count, 0.0);
        }

        let mirrored = risk / (leg.positions_count - 1) as f64;
        for (i, exposure) in positions.iter_mut().enumerate() {
            if i == leg.position {
                *exposure += risk;
            } else {
                *exposure -= mirrored;
            }
        }

        *self
            .spent_on_game
            .entry(leg.game_id.clone())
            .or_insert(0.0) += risk;
    }
}
