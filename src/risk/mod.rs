// Risk subsystem: pure exposure accounting (ledger) wrapped by
// admission-control policy (manager).

pub mod ledger;
pub mod manager;

pub use ledger::RiskLedger;
pub use manager::{combinations_count, for_each_k_subset, RiskManager};

use serde::{Deserialize, Serialize};

/// Outcome of a non-mutating pre-trade risk evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    NoRisk,
    OutOfLiquidity,
}

/// Admission errors. Always surfaced pre-trade and never retried; a rejected
/// trade leaves every ledger untouched.
#[derive(Debug, Clone, Serialize)]
pub enum RiskError {
    InvalidPosition { position: usize, positions_count: usize },
    NotTrading(String),
    RiskPerMarketAndPositionExceeded(String),
    RiskPerGameExceeded(String),
    InvalidCombinationDetected(String),
    ExceededMaxCombinations { combinations: u64, max: u64 },
    InvalidSystemDenominator { denominator: usize, legs: usize },
    BuyInTooLow { buy_in: f64, min: f64 },
    TooManyLegs { legs: usize, max: usize },
    OddsTooLow { odds: f64, floor: f64 },
    MaturityTooFar { maturity: u64, latest: u64 },
}

impl std::fmt::Display for RiskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskError::InvalidPosition {
                position,
                positions_count,
            } => write!(
                f,
                "Invalid position: {} not in 0..{}",
                position, positions_count
            ),
            RiskError::NotTrading(msg) => write!(f, "Market not trading: {}", msg),
            RiskError::RiskPerMarketAndPositionExceeded(msg) => {
                write!(f, "Risk per market and position exceeded: {}", msg)
            }
            RiskError::RiskPerGameExceeded(msg) => write!(f, "Risk per game exceeded: {}", msg),
            RiskError::InvalidCombinationDetected(msg) => {
                write!(f, "Invalid combination detected: {}", msg)
            }
            RiskError::ExceededMaxCombinations { combinations, max } => write!(
                f,
                "Exceeded max system combinations: {} > {}",
                combinations, max
            ),
            RiskError::InvalidSystemDenominator { denominator, legs } => write!(
                f,
                "Invalid system denominator: {} not in 1..{}",
                denominator, legs
            ),
            RiskError::BuyInTooLow { buy_in, min } => {
                write!(f, "Buy-in too low: {} < {}", buy_in, min)
            }
            RiskError::TooManyLegs { legs, max } => {
                write!(f, "Too many legs: {} > {}", legs, max)
            }
            RiskError::OddsTooLow { odds, floor } => {
                write!(f, "Odds below supported floor: {} < {}", odds, floor)
            }
            RiskError::MaturityTooFar { maturity, latest } => {
                write!(f, "Maturity too far in the future: {} > {}", maturity, latest)
            }
        }
    }
}

impl std::error::Error for RiskError {}
