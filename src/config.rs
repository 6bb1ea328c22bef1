// Runtime configuration for the settlement core.
//
// Everything is read from the environment with sane defaults so the server
// can boot with nothing but `cargo run`, same as a local devnet.

use serde::{Deserialize, Serialize};

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Admission-control knobs for the risk manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Base cap per market position when no explicit override is set
    pub default_cap: f64,

    /// Hard ceiling any effective cap is clamped to
    pub max_cap: f64,

    /// Global risk multiplier applied to the default cap
    pub default_risk_multiplier: f64,

    /// Ceiling for per-game multiplier overrides
    pub max_risk_multiplier: f64,

    /// Maximum number of legs on a single ticket
    pub max_ticket_size: usize,

    /// Minimum buy-in per ticket
    pub min_buy_in: f64,

    /// Floor on implied odds (caps the payout multiplier per leg/combination)
    pub max_supported_odds: f64,

    /// Ceiling on C(n, k) for system bets, enforced before any enumeration
    pub max_allowed_system_combinations: u64,

    /// How far into the future a leg maturity may be (seconds)
    pub max_time_to_maturity: u64,
}

impl RiskConfig {
    pub fn from_env() -> Self {
        Self {
            default_cap: env_f64("RISK_DEFAULT_CAP", 1_000.0),
            max_cap: env_f64("RISK_MAX_CAP", 20_000.0),
            default_risk_multiplier: env_f64("RISK_DEFAULT_MULTIPLIER", 1.0),
            max_risk_multiplier: env_f64("RISK_MAX_MULTIPLIER", 5.0),
            max_ticket_size: env_u64("RISK_MAX_TICKET_SIZE", 10) as usize,
            min_buy_in: env_f64("RISK_MIN_BUY_IN", 3.0),
            max_supported_odds: env_f64("RISK_MAX_SUPPORTED_ODDS", 0.01),
            max_allowed_system_combinations: env_u64("RISK_MAX_SYSTEM_COMBINATIONS", 500),
            max_time_to_maturity: env_u64("RISK_MAX_TIME_TO_MATURITY", 60 * 24 * 3600),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Liquidity pool parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Fixed round length in seconds
    pub round_length: u64,

    /// Minimum single deposit
    pub min_deposit: f64,

    /// Cap on total collateral ever deposited into the pool
    pub max_pool_cap: f64,

    /// Share of positive round profit captured by the safe box
    pub safe_box_impact: f64,

    /// Protocol fee on every buy-in, paid to the safe box at trade time
    pub safe_box_fee: f64,

    /// How long past creation a ticket stays claimable before forfeiture
    pub ticket_expiry: u64,

    /// Collateral decimals of the backing token (18 = no normalization)
    pub collateral_decimals: u32,
}

impl PoolConfig {
    pub fn from_env() -> Self {
        Self {
            round_length: env_u64("POOL_ROUND_LENGTH", 7 * 24 * 3600),
            min_deposit: env_f64("POOL_MIN_DEPOSIT", 20.0),
            max_pool_cap: env_f64("POOL_MAX_CAP", 1_000_000.0),
            safe_box_impact: env_f64("POOL_SAFE_BOX_IMPACT", 0.2),
            safe_box_fee: env_f64("POOL_SAFE_BOX_FEE", 0.02),
            ticket_expiry: env_u64("POOL_TICKET_EXPIRY", 90 * 24 * 3600),
            collateral_decimals: env_u64("POOL_COLLATERAL_DECIMALS", 18) as u32,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
