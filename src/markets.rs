// ============================================================================
// Market Legs & Result Feed - Sportsbook Settlement Core
// ============================================================================
//
// A market leg identifies one bettable proposition on one game. Results are
// supplied by an external feed keyed by (game, type, player) and stored
// write-once: a repeated set for the same key is an idempotent no-op.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies a single market: one bettable proposition on a game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub game_id: String,
    pub type_id: u16,
    pub player_id: u32,
}

/// One leg of a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketLeg {
    /// Game this proposition belongs to
    pub game_id: String,

    /// Sport, used for combination rules
    pub sport_id: u16,

    /// Market type (moneyline, spread, total, player prop, ...)
    pub type_id: u16,

    /// Player for prop markets, 0 for game-level markets
    pub player_id: u32,

    /// Line for spread/total markets
    pub line: f64,

    /// Position index the user backed
    pub position: usize,

    /// Number of selectable positions on this market
    pub positions_count: usize,

    /// Quoted implied odds in (0, 1]; payout per unit = 1 / odds
    pub odds: f64,

    /// Unix seconds at which the underlying game starts
    pub maturity: u64,
}

impl MarketLeg {
    pub fn key(&self) -> MarketKey {
        MarketKey {
            game_id: self.game_id.clone(),
            type_id: self.type_id,
            player_id: self.player_id,
        }
    }
}

/// Write-once store of market results.
///
/// Winning positions are an ordered list of indices so combined-position
/// result types (e.g. double-chance) can mark several positions as winners.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsFeed {
    results: HashMap<MarketKey, Vec<usize>>,
}

impl ResultsFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch result ingestion. The four slices are parallel; mismatched
    /// lengths are a caller error. Keys that already hold a result keep it.
    pub fn set_results_per_markets(
        &mut self,
        game_ids: &[String],
        type_ids: &[u16],
        player_ids: &[u32],
        winning_positions_per_market: &[Vec<usize>],
    ) -> usize {
        let mut newly_set = 0;
        for i in 0..game_ids.len() {
            let key = MarketKey {
                game_id: game_ids[i].clone(),
                type_id: type_ids[i],
                player_id: player_ids[i],
            };
            if self.results.contains_key(&key) {
                tracing::warn!(game_id = %key.game_id, type_id = key.type_id, "result already set, ignoring");
                continue;
            }
            self.results
                .insert(key, winning_positions_per_market[i].clone());
            newly_set += 1;
        }
        newly_set
    }

    pub fn are_results_per_market_set(
        &self,
        game_id: &str,
        type_id: u16,
        player_id: u32,
    ) -> bool {
        self.results.contains_key(&MarketKey {
            game_id: game_id.to_string(),
            type_id,
            player_id,
        })
    }

    pub fn is_set(&self, key: &MarketKey) -> bool {
        self.results.contains_key(key)
    }

    pub fn winning_positions(&self, key: &MarketKey) -> Option<&Vec<usize>> {
        self.results.get(key)
    }

    /// Whether a resolved leg is a winner for the position the user backed.
    /// Returns None while the result is missing.
    pub fn is_winning_position(&self, key: &MarketKey, position: usize) -> Option<bool> {
        self.results.get(key).map(|winners| winners.contains(&position))
    }
}
