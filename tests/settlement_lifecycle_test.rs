// End-to-end settlement scenarios driven through the orchestrator:
// multi-round PnL composition, batch resumability and system-bet flow.

use sportsbook_settlement::amm::{Amm, TradeRequest};
use sportsbook_settlement::config::{PoolConfig, RiskConfig};
use sportsbook_settlement::markets::MarketLeg;
use sportsbook_settlement::pool::{DEFAULT_ROUND, FIRST_TRADING_ROUND};

const NOW: u64 = 1_000;

fn risk_cfg() -> RiskConfig {
    RiskConfig {
        default_cap: 5_000.0,
        max_cap: 20_000.0,
        default_risk_multiplier: 1.0,
        max_risk_multiplier: 5.0,
        max_ticket_size: 10,
        min_buy_in: 3.0,
        max_supported_odds: 0.01,
        max_allowed_system_combinations: 500,
        max_time_to_maturity: 60 * 24 * 3600,
    }
}

fn pool_cfg() -> PoolConfig {
    PoolConfig {
        round_length: 10_000,
        min_deposit: 20.0,
        max_pool_cap: 1_000_000.0,
        safe_box_impact: 0.2,
        safe_box_fee: 0.02,
        ticket_expiry: 1_000_000,
        collateral_decimals: 18,
    }
}

fn new_amm() -> Amm {
    let mut amm = Amm::new(risk_cfg(), pool_cfg());
    amm.vault.mint("lp", 10_000.0);
    amm.vault.mint("alice", 1_000.0);
    amm.vault.mint("bob", 1_000.0);
    amm.deposit("lp", 1_000.0).unwrap();
    amm.start_pool(NOW).unwrap();
    amm
}

fn leg(game: &str, position: usize, odds: f64, maturity: u64) -> MarketLeg {
    MarketLeg {
        game_id: game.to_string(),
        sport_id: 9004,
        type_id: 0,
        player_id: 0,
        line: 0.0,
        position,
        positions_count: 2,
        odds,
        maturity,
    }
}

fn request(user: &str, legs: Vec<MarketLeg>, buy_in: f64) -> TradeRequest {
    TradeRequest {
        user: user.to_string(),
        legs,
        buy_in,
        is_system_bet: false,
        system_denominator: 0,
        is_live: false,
        free_bet_holder: None,
    }
}

fn lose(amm: &mut Amm, game: &str) {
    amm.set_results(&[game.to_string()], &[0], &[0], &[vec![1]]);
}

fn close(amm: &mut Amm, now: u64) -> u32 {
    amm.prepare_round_closing(now).unwrap();
    while amm.process_round_closing_batch(1).is_ok() {}
    amm.close_round(now).unwrap()
}

#[test]
fn cumulative_pnl_composes_across_rounds() {
    let mut amm = new_amm();

    // round 2: house wins one bet of 10 at 0.5
    amm.trade(request("alice", vec![leg("g1", 0, 0.5, 5_000)], 10.0), NOW)
        .unwrap();
    lose(&mut amm, "g1");
    amm.exercise_tickets_ready(6_000).unwrap();
    let round3 = close(&mut amm, 12_000);
    assert_eq!(round3, FIRST_TRADING_ROUND + 1);

    let r2 = amm.pool.round(FIRST_TRADING_ROUND).unwrap().clone();
    assert!((r2.profit_and_loss - 1.00784).abs() < 1e-9);
    assert!((r2.cumulative_profit_and_loss - 1.00784).abs() < 1e-9);

    // round 3: house wins again
    amm.trade(
        request("bob", vec![leg("g2", 0, 0.5, 20_000)], 10.0),
        13_000,
    )
    .unwrap();
    lose(&mut amm, "g2");
    amm.exercise_tickets_ready(21_000).unwrap();
    close(&mut amm, 23_000);

    let r3 = amm.pool.round(round3).unwrap().clone();
    assert!(
        (r3.cumulative_profit_and_loss - r2.cumulative_profit_and_loss * r3.profit_and_loss).abs()
            < 1e-12
    );
    assert!(r3.cumulative_profit_and_loss > r2.cumulative_profit_and_loss);
}

#[test]
fn batch_of_one_repeated_matches_single_large_batch() {
    let run = |batch_size: usize, calls: usize| -> (usize, f64) {
        let mut amm = new_amm();
        for i in 0..4 {
            let game = format!("g{}", i);
            amm.trade(
                request("alice", vec![leg(&game, 0, 0.5, 5_000)], 10.0),
                NOW,
            )
            .unwrap();
            lose(&mut amm, &game);
        }
        let mut settled = 0;
        for _ in 0..calls {
            settled += amm.exercise_tickets_ready_batch(batch_size, 6_000).unwrap();
        }
        (
            settled,
            amm.pool.round(FIRST_TRADING_ROUND).unwrap().balance,
        )
    };

    let (settled_single, balance_single) = run(4, 1);
    let (settled_chunked, balance_chunked) = run(1, 4);

    assert_eq!(settled_single, 4);
    assert_eq!(settled_chunked, 4);
    assert!((balance_single - balance_chunked).abs() < 1e-9);
}

#[test]
fn batch_cursor_blocks_on_unresolved_then_resumes() {
    let mut amm = new_amm();
    for i in 0..3 {
        let game = format!("g{}", i);
        amm.trade(
            request("alice", vec![leg(&game, 0, 0.5, 5_000)], 10.0),
            NOW,
        )
        .unwrap();
    }
    // middle ticket unresolved
    lose(&mut amm, "g0");
    lose(&mut amm, "g2");

    assert_eq!(amm.exercise_tickets_ready_batch(10, 6_000).unwrap(), 2);
    // nothing new without new results, and no double settlement
    assert_eq!(amm.exercise_tickets_ready_batch(10, 6_000).unwrap(), 0);

    lose(&mut amm, "g1");
    assert_eq!(amm.exercise_tickets_ready_batch(10, 6_000).unwrap(), 1);
    assert_eq!(amm.exercise_tickets_ready_batch(10, 6_000).unwrap(), 0);
}

#[test]
fn exercise_pays_exactly_once() {
    let mut amm = new_amm();
    let id = amm
        .trade(request("alice", vec![leg("g1", 0, 0.5, 5_000)], 10.0), NOW)
        .unwrap();
    amm.set_results(&["g1".to_string()], &[0], &[0], &[vec![0]]);

    amm.exercise_ticket(&id, 6_000).unwrap();
    assert_eq!(amm.vault.balance_of("alice"), 1_010.0);

    assert!(amm.exercise_ticket(&id, 6_001).is_err());
    assert_eq!(amm.vault.balance_of("alice"), 1_010.0);
}

#[test]
fn duplicate_results_are_ignored() {
    let mut amm = new_amm();
    assert_eq!(
        amm.set_results(&["g1".to_string()], &[0], &[0], &[vec![0]]),
        1
    );
    // a second feed push cannot flip the outcome
    assert_eq!(
        amm.set_results(&["g1".to_string()], &[0], &[0], &[vec![1]]),
        0
    );

    let id = amm
        .trade(request("alice", vec![leg("g2", 0, 0.5, 5_000)], 10.0), NOW)
        .unwrap();
    amm.set_results(&["g2".to_string()], &[0], &[0], &[vec![0]]);
    amm.set_results(&["g2".to_string()], &[0], &[0], &[vec![1]]);
    let settlement = amm.exercise_ticket(&id, 6_000).unwrap();
    assert!(settlement.winner);
}

#[test]
fn system_bet_two_of_three_settles_partial_win() {
    let mut amm = new_amm();
    let legs = vec![
        leg("g1", 0, 0.5, 5_000),
        leg("g2", 0, 0.5, 5_000),
        leg("g3", 0, 0.5, 5_000),
    ];
    let id = amm
        .trade(
            TradeRequest {
                is_system_bet: true,
                system_denominator: 2,
                ..request("alice", legs, 12.0)
            },
            NOW,
        )
        .unwrap();

    let ticket = amm.ticket(&id).unwrap().clone();
    // max payout: two smallest odds 0.25 -> 12 / 0.25
    assert!((ticket.payout - 48.0).abs() < 1e-9);

    amm.set_results(&["g1".to_string()], &[0], &[0], &[vec![0]]);
    amm.set_results(&["g2".to_string()], &[0], &[0], &[vec![0]]);
    amm.set_results(&["g3".to_string()], &[0], &[0], &[vec![1]]);

    let settlement = amm.exercise_ticket(&id, 6_000).unwrap();
    assert!(settlement.winner);
    // one winning pair of three: (12/3) / 0.25 = 16
    assert!((settlement.pay_out - 16.0).abs() < 1e-9);
    assert!((settlement.return_to_funder - 32.0).abs() < 1e-9);
}

#[test]
fn default_round_sweep_credits_provider_directly() {
    let mut amm = new_amm();
    amm.fund_default_provider(1_000.0);

    // maturity beyond the next round binds to the sentinel round
    let id = amm
        .trade(
            request("alice", vec![leg("far", 0, 0.5, 500_000)], 10.0),
            NOW,
        )
        .unwrap();
    assert_eq!(amm.ticket(&id).unwrap().bound_round, DEFAULT_ROUND);
    // provider fronted reserve 10 + fee 0.2
    assert!((amm.provider.balance(&amm.vault) - 989.8).abs() < 1e-9);

    lose(&mut amm, "far");
    // the current-round sweep must not touch sentinel-round tickets
    assert_eq!(amm.exercise_tickets_ready(NOW + 10).unwrap(), 0);
    assert_eq!(
        amm.exercise_default_round_tickets_ready_batch(10, NOW + 10)
            .unwrap(),
        1
    );

    // the full 20.0 escrow settles straight back to the provider,
    // no round pool involved
    assert!((amm.provider.balance(&amm.vault) - 1_009.8).abs() < 1e-9);
    assert!(
        (amm.pool.round(FIRST_TRADING_ROUND).unwrap().balance - 1_000.0).abs() < 1e-9
    );
    assert!(amm.ticket(&id).unwrap().resolved);
}

#[test]
fn exposure_zero_sum_on_binary_market() {
    let mut amm = new_amm();
    amm.trade(request("alice", vec![leg("g1", 0, 0.5, 5_000)], 10.0), NOW)
        .unwrap();
    amm.trade(request("bob", vec![leg("g1", 1, 0.25, 5_000)], 10.0), NOW)
        .unwrap();

    let key = leg("g1", 0, 0.5, 5_000).key();
    let exposures = amm.risk.ledger().market_exposures(&key).unwrap();
    let sum: f64 = exposures.iter().sum();
    assert!(sum.abs() < 1e-9);
}
