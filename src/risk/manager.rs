// ============================================================================
// Risk Manager - Sportsbook Settlement Core
// ============================================================================
//
// Admission control in front of the risk ledger. Consulted by the settlement
// orchestrator before any trade is accepted; every check is all-or-nothing,
// so a rejected trade leaves the ledger exactly as it was.
//
// Caps:
//   - explicit per-market override, else default_cap * risk multiplier
//   - multiplier is the global default unless a per-game override exists,
//     clamped to max_risk_multiplier
//   - every effective cap is clamped to max_cap
//
// ============================================================================

use crate::config::RiskConfig;
use crate::markets::{MarketKey, MarketLeg};
use crate::risk::ledger::RiskLedger;
use crate::risk::{RiskError, RiskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Number of k-subsets of an n-leg ticket, saturating at u64::MAX.
pub fn combinations_count(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut c: u128 = 1;
    for i in 0..k {
        c = c * (n - i) as u128 / (i + 1) as u128;
        if c > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    c as u64
}

/// Visit every k-subset of 0..n in lexicographic order.
pub fn for_each_k_subset<F: FnMut(&[usize])>(n: usize, k: usize, mut f: F) {
    if k == 0 || k > n {
        return;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        f(&idx);
        let mut i = k as isize - 1;
        while i >= 0 && idx[i as usize] == i as usize + n - k {
            i -= 1;
        }
        if i < 0 {
            return;
        }
        let i = i as usize;
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskManager {
    cfg: RiskConfig,
    ledger: RiskLedger,

    /// Explicit cap overrides per market
    cap_per_market: HashMap<MarketKey, f64>,

    /// Explicit cap overrides per game aggregate
    cap_per_game: HashMap<String, f64>,

    /// Per-game risk multiplier overrides
    risk_multiplier_per_game: HashMap<String, f64>,

    /// Sports for which same-game leg combinations are allowed
    combining_enabled_sports: HashSet<u16>,

    /// Markets pulled from trading by the operator
    paused_markets: HashSet<MarketKey>,
}

impl RiskManager {
    pub fn new(cfg: RiskConfig) -> Self {
        Self {
            cfg,
            ledger: RiskLedger::new(),
            cap_per_market: HashMap::new(),
            cap_per_game: HashMap::new(),
            risk_multiplier_per_game: HashMap::new(),
            combining_enabled_sports: HashSet::new(),
            paused_markets: HashSet::new(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.cfg
    }

    pub fn ledger(&self) -> &RiskLedger {
        &self.ledger
    }

    // ===== OPERATOR CONTROLS =====

    pub fn set_cap_per_market(&mut self, key: MarketKey, cap: f64) {
        self.cap_per_market.insert(key, cap.min(self.cfg.max_cap));
    }

    pub fn set_cap_per_game(&mut self, game_id: &str, cap: f64) {
        self.cap_per_game
            .insert(game_id.to_string(), cap.min(self.cfg.max_cap));
    }

    pub fn set_risk_multiplier_per_game(&mut self, game_id: &str, multiplier: f64) {
        self.risk_multiplier_per_game.insert(
            game_id.to_string(),
            multiplier.min(self.cfg.max_risk_multiplier),
        );
    }

    pub fn enable_combining_for_sport(&mut self, sport_id: u16) {
        self.combining_enabled_sports.insert(sport_id);
    }

    pub fn pause_market(&mut self, key: MarketKey) {
        self.paused_markets.insert(key);
    }

    pub fn unpause_market(&mut self, key: &MarketKey) {
        self.paused_markets.remove(key);
    }

    // ===== CAPS =====

    fn multiplier_for_game(&self, game_id: &str) -> f64 {
        self.risk_multiplier_per_game
            .get(game_id)
            .copied()
            .unwrap_or(self.cfg.default_risk_multiplier)
            .min(self.cfg.max_risk_multiplier)
    }

    /// Effective cap for one market position.
    pub fn effective_cap(&self, key: &MarketKey) -> f64 {
        let cap = match self.cap_per_market.get(key) {
            Some(explicit) => *explicit,
            None => self.cfg.default_cap * self.multiplier_for_game(&key.game_id),
        };
        cap.min(self.cfg.max_cap)
    }

    /// Effective cap for a game's aggregate exposure.
    pub fn effective_game_cap(&self, game_id: &str) -> f64 {
        let cap = match self.cap_per_game.get(game_id) {
            Some(explicit) => *explicit,
            None => self.cfg.default_cap * self.multiplier_for_game(game_id),
        };
        cap.min(self.cfg.max_cap)
    }

    // ===== ADMISSION =====

    /// Marginal risk the pool takes on for one leg: the payout beyond stake.
    pub fn marginal_risk(leg: &MarketLeg, buy_in: f64) -> f64 {
        buy_in / leg.odds - buy_in
    }

    /// Ticket-level bounds, checked before any per-leg evaluation.
    pub fn validate_ticket(
        &self,
        legs: &[MarketLeg],
        buy_in: f64,
        is_system_bet: bool,
        system_denominator: usize,
        is_live: bool,
        now: u64,
    ) -> Result<(), RiskError> {
        if buy_in < self.cfg.min_buy_in {
            return Err(RiskError::BuyInTooLow {
                buy_in,
                min: self.cfg.min_buy_in,
            });
        }
        if legs.len() > self.cfg.max_ticket_size {
            return Err(RiskError::TooManyLegs {
                legs: legs.len(),
                max: self.cfg.max_ticket_size,
            });
        }
        for leg in legs {
            if leg.odds < self.cfg.max_supported_odds {
                return Err(RiskError::OddsTooLow {
                    odds: leg.odds,
                    floor: self.cfg.max_supported_odds,
                });
            }
            // Live trades ride on games already underway; the maturity
            // horizon only bounds pre-game wagers
            if !is_live {
                let latest = now + self.cfg.max_time_to_maturity;
                if leg.maturity > latest {
                    return Err(RiskError::MaturityTooFar {
                        maturity: leg.maturity,
                        latest,
                    });
                }
            }
        }
        if is_system_bet {
            if system_denominator < 1 || system_denominator >= legs.len() {
                return Err(RiskError::InvalidSystemDenominator {
                    denominator: system_denominator,
                    legs: legs.len(),
                });
            }
            // The bound must hold before enumeration is ever attempted
            let combinations =
                combinations_count(legs.len() as u64, system_denominator as u64);
            if combinations > self.cfg.max_allowed_system_combinations {
                return Err(RiskError::ExceededMaxCombinations {
                    combinations,
                    max: self.cfg.max_allowed_system_combinations,
                });
            }
        }
        Ok(())
    }

    fn validate_leg(&self, leg: &MarketLeg, now: u64) -> Result<(), RiskError> {
        if leg.positions_count < 2 || leg.position >= leg.positions_count {
            return Err(RiskError::InvalidPosition {
                position: leg.position,
                positions_count: leg.positions_count,
            });
        }
        if leg.maturity <= now {
            return Err(RiskError::NotTrading(format!(
                "game {} maturity {} already passed",
                leg.game_id, leg.maturity
            )));
        }
        if self.paused_markets.contains(&leg.key()) {
            return Err(RiskError::NotTrading(format!(
                "market {}/{}/{} is paused",
                leg.game_id, leg.type_id, leg.player_id
            )));
        }
        Ok(())
    }

    fn validate_combination(&self, legs: &[MarketLeg]) -> Result<(), RiskError> {
        let mut games_seen: HashMap<&str, u16> = HashMap::new();
        for leg in legs {
            if games_seen.insert(leg.game_id.as_str(), leg.sport_id).is_some() {
                if !self.combining_enabled_sports.contains(&leg.sport_id) {
                    return Err(RiskError::InvalidCombinationDetected(format!(
                        "multiple legs on game {} and sport {} does not allow combining",
                        leg.game_id, leg.sport_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate a trade and, if everything passes, commit its exposure to the
    /// ledger. Staged on a copy so any rejection leaves state untouched.
    pub fn check_and_update_risks(
        &mut self,
        legs: &[MarketLeg],
        buy_in: f64,
        is_system_bet: bool,
        system_denominator: usize,
        is_live: bool,
        now: u64,
    ) -> Result<(), RiskError> {
        self.validate_ticket(legs, buy_in, is_system_bet, system_denominator, is_live, now)?;
        for leg in legs {
            self.validate_leg(leg, now)?;
        }
        self.validate_combination(legs)?;

        let mut staged = self.ledger.clone();
        for leg in legs {
            let risk = Self::marginal_risk(leg, buy_in);
            staged.apply(leg, risk);

            let key = leg.key();
            let exposure = staged.position_exposure(&key, leg.position);
            let cap = self.effective_cap(&key);
            if exposure > cap {
                return Err(RiskError::RiskPerMarketAndPositionExceeded(format!(
                    "market {}/{}/{} position {} exposure {:.4} > cap {:.4}",
                    key.game_id, key.type_id, key.player_id, leg.position, exposure, cap
                )));
            }

            let game_exposure = staged.game_exposure(&leg.game_id);
            let game_cap = self.effective_game_cap(&leg.game_id);
            if game_exposure > game_cap {
                return Err(RiskError::RiskPerGameExceeded(format!(
                    "game {} exposure {:.4} > cap {:.4}",
                    leg.game_id, game_exposure, game_cap
                )));
            }
        }

        self.ledger = staged;
        Ok(())
    }

    /// Same evaluation as `check_and_update_risks` but without committing.
    /// Returns the overall status plus one flag per leg; a true flag marks a
    /// leg that would push its market or game over the cap.
    pub fn check_risks(&self, legs: &[MarketLeg], buy_in: f64) -> (RiskStatus, Vec<bool>) {
        let mut staged = self.ledger.clone();
        let mut out_of_liquidity = vec![false; legs.len()];

        for (i, leg) in legs.iter().enumerate() {
            let risk = Self::marginal_risk(leg, buy_in);
            staged.apply(leg, risk);

            let key = leg.key();
            let over_market = staged.position_exposure(&key, leg.position) > self.effective_cap(&key);
            let over_game =
                staged.game_exposure(&leg.game_id) > self.effective_game_cap(&leg.game_id);
            out_of_liquidity[i] = over_market || over_game;
        }

        let status = if out_of_liquidity.iter().any(|flag| *flag) {
            RiskStatus::OutOfLiquidity
        } else {
            RiskStatus::NoRisk
        };
        (status, out_of_liquidity)
    }

    /// Reverse the exposure a previously admitted trade committed, e.g. when
    /// its ticket is cancelled before any result lands. Applies the negated
    /// marginal risk per leg, restoring caps for games still trading.
    pub fn release_risks(&mut self, legs: &[MarketLeg], buy_in: f64) {
        for leg in legs {
            let risk = Self::marginal_risk(leg, buy_in);
            self.ledger.apply(leg, -risk);
        }
    }

    // ===== SYSTEM BET PAYOUT BOUND =====

    /// Maximum payout of a k-of-n system bet: the k smallest implied odds
    /// form the combination with the largest payout, floored at
    /// max_supported_odds so degenerate quotes cannot blow the payout up.
    pub fn max_system_bet_payout(&self, legs: &[MarketLeg], k: usize, buy_in: f64) -> f64 {
        let mut odds: Vec<f64> = legs.iter().map(|leg| leg.odds).collect();
        odds.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let min_product: f64 = odds.iter().take(k).product();
        buy_in / min_product.max(self.cfg.max_supported_odds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RiskConfig {
        RiskConfig {
            default_cap: 100.0,
            max_cap: 1_000.0,
            default_risk_multiplier: 1.0,
            max_risk_multiplier: 3.0,
            max_ticket_size: 10,
            min_buy_in: 1.0,
            max_supported_odds: 0.01,
            max_allowed_system_combinations: 100,
            max_time_to_maturity: 30 * 24 * 3600,
        }
    }

    fn leg(game: &str, position: usize, odds: f64) -> MarketLeg {
        MarketLeg {
            game_id: game.to_string(),
            sport_id: 9004,
            type_id: 0,
            player_id: 0,
            line: 0.0,
            position,
            positions_count: 2,
            odds,
            maturity: 2_000,
        }
    }

    const NOW: u64 = 1_000;

    #[test]
    fn test_combinations_count() {
        assert_eq!(combinations_count(3, 2), 3);
        assert_eq!(combinations_count(10, 5), 252);
        assert_eq!(combinations_count(5, 0), 1);
        assert_eq!(combinations_count(4, 5), 0);
    }

    #[test]
    fn test_for_each_k_subset_enumerates_all() {
        let mut seen = Vec::new();
        for_each_k_subset(4, 2, |combo| seen.push(combo.to_vec()));
        assert_eq!(
            seen,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
    }

    #[test]
    fn test_accepts_and_records_exposure() {
        let mut manager = RiskManager::new(cfg());
        let l = leg("game_1", 0, 0.5);

        manager
            .check_and_update_risks(&[l.clone()], 10.0, false, 0, false, NOW)
            .unwrap();

        // risk = 10/0.5 - 10 = 10
        assert_eq!(manager.ledger().position_exposure(&l.key(), 0), 10.0);
        assert_eq!(manager.ledger().game_exposure("game_1"), 10.0);
    }

    #[test]
    fn test_invalid_position_rejected() {
        let mut manager = RiskManager::new(cfg());
        let mut l = leg("game_1", 5, 0.5);
        l.positions_count = 2;

        let err = manager
            .check_and_update_risks(&[l], 10.0, false, 0, false, NOW)
            .unwrap_err();
        assert!(matches!(err, RiskError::InvalidPosition { .. }));
    }

    #[test]
    fn test_matured_market_not_trading() {
        let mut manager = RiskManager::new(cfg());
        let mut l = leg("game_1", 0, 0.5);
        l.maturity = NOW - 1;

        let err = manager
            .check_and_update_risks(&[l], 10.0, false, 0, false, NOW)
            .unwrap_err();
        assert!(matches!(err, RiskError::NotTrading(_)));
    }

    #[test]
    fn test_paused_market_not_trading() {
        let mut manager = RiskManager::new(cfg());
        let l = leg("game_1", 0, 0.5);
        manager.pause_market(l.key());

        let err = manager
            .check_and_update_risks(&[l], 10.0, false, 0, false, NOW)
            .unwrap_err();
        assert!(matches!(err, RiskError::NotTrading(_)));
    }

    #[test]
    fn test_cap_rejection_leaves_ledger_unchanged() {
        let mut manager = RiskManager::new(cfg());
        let l = leg("game_1", 0, 0.5);

        let before = manager.ledger().clone();
        // risk = 200/0.5 - 200 = 200 > cap 100
        let err = manager
            .check_and_update_risks(&[l], 200.0, false, 0, false, NOW)
            .unwrap_err();
        assert!(matches!(
            err,
            RiskError::RiskPerMarketAndPositionExceeded(_)
        ));
        assert_eq!(manager.ledger(), &before);
    }

    #[test]
    fn test_game_cap_rejection() {
        let mut manager = RiskManager::new(cfg());
        manager.set_cap_per_game("game_1", 15.0);

        let moneyline = leg("game_1", 0, 0.5);
        let mut total = leg("game_1", 0, 0.5);
        total.type_id = 2;

        manager
            .check_and_update_risks(&[moneyline], 10.0, false, 0, false, NOW)
            .unwrap();
        // Second market on the same game pushes the aggregate to 20 > 15
        let err = manager
            .check_and_update_risks(&[total], 10.0, false, 0, false, NOW)
            .unwrap_err();
        assert!(matches!(err, RiskError::RiskPerGameExceeded(_)));
    }

    #[test]
    fn test_same_game_combination_requires_opt_in() {
        let mut manager = RiskManager::new(cfg());
        let moneyline = leg("game_1", 0, 0.5);
        let mut total = leg("game_1", 1, 0.5);
        total.type_id = 2;

        let err = manager
            .check_and_update_risks(&[moneyline.clone(), total.clone()], 10.0, false, 0, false, NOW)
            .unwrap_err();
        assert!(matches!(err, RiskError::InvalidCombinationDetected(_)));

        manager.enable_combining_for_sport(9004);
        manager
            .check_and_update_risks(&[moneyline, total], 10.0, false, 0, false, NOW)
            .unwrap();
    }

    #[test]
    fn test_system_combination_ceiling() {
        let mut manager = RiskManager::new(cfg());
        let legs: Vec<MarketLeg> = (0..10).map(|i| leg(&format!("game_{}", i), 0, 0.5)).collect();

        // C(10, 5) = 252 > 100
        let err = manager
            .check_and_update_risks(&legs, 10.0, true, 5, false, NOW)
            .unwrap_err();
        assert!(matches!(err, RiskError::ExceededMaxCombinations { .. }));
    }

    #[test]
    fn test_system_denominator_bounds() {
        let manager = RiskManager::new(cfg());
        let legs: Vec<MarketLeg> = (0..3).map(|i| leg(&format!("game_{}", i), 0, 0.5)).collect();

        // k = 0 would make every ticket instantly resolvable at payout 0,
        // k >= n could never pay as a system bet
        for k in [0, 3, 4] {
            let err = manager.validate_ticket(&legs, 10.0, true, k, false, NOW).unwrap_err();
            assert!(matches!(err, RiskError::InvalidSystemDenominator { .. }));
        }
        manager.validate_ticket(&legs, 10.0, true, 2, false, NOW).unwrap();
    }

    #[test]
    fn test_live_trade_skips_maturity_horizon() {
        let manager = RiskManager::new(cfg());
        let mut l = leg("game_1", 0, 0.5);
        l.maturity = NOW + cfg().max_time_to_maturity + 1;

        let err = manager
            .validate_ticket(&[l.clone()], 10.0, false, 0, false, NOW)
            .unwrap_err();
        assert!(matches!(err, RiskError::MaturityTooFar { .. }));

        manager.validate_ticket(&[l], 10.0, false, 0, true, NOW).unwrap();
    }

    #[test]
    fn test_release_restores_pre_trade_exposure() {
        let mut manager = RiskManager::new(cfg());
        let l = leg("game_1", 0, 0.5);

        manager
            .check_and_update_risks(&[l.clone()], 10.0, false, 0, false, NOW)
            .unwrap();
        assert_eq!(manager.ledger().game_exposure("game_1"), 10.0);

        manager.release_risks(&[l.clone()], 10.0);
        assert_eq!(manager.ledger().position_exposure(&l.key(), 0), 0.0);
        assert_eq!(manager.ledger().position_exposure(&l.key(), 1), 0.0);
        assert_eq!(manager.ledger().game_exposure("game_1"), 0.0);
    }

    #[test]
    fn test_check_risks_flags_offending_leg() {
        let mut manager = RiskManager::new(cfg());
        manager.set_cap_per_market(leg("game_2", 0, 0.5).key(), 5.0);

        let fine = leg("game_1", 0, 0.5);
        let capped = leg("game_2", 0, 0.5);

        let (status, flags) = manager.check_risks(&[fine, capped], 10.0);
        assert_eq!(status, RiskStatus::OutOfLiquidity);
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_max_system_bet_payout_uses_smallest_odds() {
        let manager = RiskManager::new(cfg());
        let legs = vec![
            leg("game_1", 0, 0.5),
            leg("game_2", 0, 0.25),
            leg("game_3", 0, 0.8),
        ];

        // smallest two odds: 0.25 * 0.5 = 0.125 -> payout 10 / 0.125 = 80
        let payout = manager.max_system_bet_payout(&legs, 2, 10.0);
        assert!((payout - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_system_bet_payout_floor() {
        let manager = RiskManager::new(cfg());
        let legs = vec![leg("game_1", 0, 0.02), leg("game_2", 0, 0.02)];

        // product 0.0004 floors at max_supported_odds 0.01
        let payout = manager.max_system_bet_payout(&legs, 2, 10.0);
        assert!((payout - 1_000.0).abs() < 1e-9);
    }
}
