// Liquidity pool subsystem: round accounting, the default-provider backstop
// and the pool orchestration itself.

pub mod default_provider;
pub mod liquidity;
pub mod rounds;

pub use default_provider::DefaultLiquidityProvider;
pub use liquidity::LiquidityPool;
pub use rounds::{Round, RoundLedger, DEFAULT_ROUND, FIRST_TRADING_ROUND};

use crate::collateral::VaultError;
use crate::ticket::TicketError;
use serde::Serialize;

/// Pool errors: caller sequencing mistakes surface verbatim, liquidity
/// errors may be retried by the caller with adjusted parameters.
#[derive(Debug, Clone, Serialize)]
pub enum PoolError {
    PoolNotStarted,
    AlreadyStarted,
    NoDeposits,
    AmountBelowMinimum { amount: f64, min: f64 },
    DepositExceedsCap { total: f64, cap: f64 },
    DepositWhileClosing,
    DefaultProviderCannotDeposit,
    WithdrawalAlreadyRequested(String),
    NothingToWithdraw(String),
    DepositedIntoNextRound(String),
    WithdrawalShareOutOfRange(f64),
    RoundClosingNotPrepared,
    RoundClosingAlreadyPrepared,
    RoundNotEnded { now: u64, end: u64 },
    TradingTicketsNotResolved { round: u32, unresolved: usize },
    BatchSizeZero,
    AllUsersAlreadyProcessed,
    NotAllUsersProcessedYet { processed: usize, total: usize },
    InsufficientBalance(String),
    TicketNotFound(String),
    Ticket(TicketError),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::PoolNotStarted => write!(f, "Pool has not been started"),
            PoolError::AlreadyStarted => write!(f, "Pool already started"),
            PoolError::NoDeposits => write!(f, "Cannot start pool without deposits"),
            PoolError::AmountBelowMinimum { amount, min } => {
                write!(f, "Amount below minimum: {} < {}", amount, min)
            }
            PoolError::DepositExceedsCap { total, cap } => {
                write!(f, "Deposit exceeds pool cap: {} > {}", total, cap)
            }
            PoolError::DepositWhileClosing => {
                write!(f, "Deposits are rejected while round closing is prepared")
            }
            PoolError::DefaultProviderCannotDeposit => {
                write!(f, "Default liquidity provider funds only through its reserved path")
            }
            PoolError::WithdrawalAlreadyRequested(user) => {
                write!(f, "Withdrawal already requested by {}", user)
            }
            PoolError::NothingToWithdraw(user) => write!(f, "Nothing to withdraw for {}", user),
            PoolError::DepositedIntoNextRound(user) => {
                write!(f, "{} already deposited into the next round", user)
            }
            PoolError::WithdrawalShareOutOfRange(share) => {
                write!(f, "Partial withdrawal share {} outside (0.1, 0.9)", share)
            }
            PoolError::RoundClosingNotPrepared => write!(f, "Round closing not prepared"),
            PoolError::RoundClosingAlreadyPrepared => write!(f, "Round closing already prepared"),
            PoolError::RoundNotEnded { now, end } => {
                write!(f, "Round has not ended: now {} < end {}", now, end)
            }
            PoolError::TradingTicketsNotResolved { round, unresolved } => write!(
                f,
                "Round {} still has {} unresolved trading tickets",
                round, unresolved
            ),
            PoolError::BatchSizeZero => write!(f, "Batch size must be nonzero"),
            PoolError::AllUsersAlreadyProcessed => write!(f, "All users already processed"),
            PoolError::NotAllUsersProcessedYet { processed, total } => {
                write!(f, "Not all users processed yet: {}/{}", processed, total)
            }
            PoolError::InsufficientBalance(msg) => write!(f, "Insufficient balance: {}", msg),
            PoolError::TicketNotFound(id) => write!(f, "Ticket not found: {}", id),
            PoolError::Ticket(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<VaultError> for PoolError {
    fn from(err: VaultError) -> Self {
        PoolError::InsufficientBalance(err.to_string())
    }
}

impl From<TicketError> for PoolError {
    fn from(err: TicketError) -> Self {
        PoolError::Ticket(err)
    }
}
