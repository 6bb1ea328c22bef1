// ============================================================================
// Ticket State Machine - Sportsbook Settlement Core
// ============================================================================
//
// One Ticket per purchased wager, owned by the AMM. Lifecycle:
//
//   Trading(0) -> Exercisable(1) -> { Exercised | Expired }(2)
//
// A ticket becomes exercisable once every leg's result is in (system bets:
// once at least `k` of `n` legs resolved). Its escrow always holds exactly
// the quoted payout; exercise drains the escrow, the record persists.
//
// ============================================================================

use crate::collateral::escrow_address;
use crate::markets::{MarketLeg, ResultsFeed};
use crate::risk::manager::{combinations_count, for_each_k_subset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the payout reserve of a ticket was funded from; settlement proceeds
/// return to the same place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingSource {
    Round(u32),
    DefaultProvider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPhase {
    Trading,
    Exercisable,
    Exercised,
    Expired,
}

/// Terminal outcome recorded on a resolved ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketResolution {
    Won,
    Lost,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize)]
pub enum TicketError {
    AlreadyExercised(String),
    NotExercisable(String),
    NotExpired(String),
    Unauthorized(String),
    SystemBetNotCancellable(String),
}

impl std::fmt::Display for TicketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketError::AlreadyExercised(msg) => write!(f, "Already exercised: {}", msg),
            TicketError::NotExercisable(msg) => write!(f, "Not exercisable: {}", msg),
            TicketError::NotExpired(msg) => write!(f, "Not expired: {}", msg),
            TicketError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            TicketError::SystemBetNotCancellable(msg) => {
                write!(f, "System bet not cancellable: {}", msg)
            }
        }
    }
}

impl std::error::Error for TicketError {}

/// Money that has to move once a ticket settles.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub winner: bool,
    /// Amount paid out of escrow to the payout recipient
    pub pay_out: f64,
    /// Escrow remainder returned to the funding source
    pub return_to_funder: f64,
    pub recipient: String,
}

/// Everything needed to mint a ticket at trade time.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub owner: String,
    pub legs: Vec<MarketLeg>,
    pub buy_in: f64,
    pub total_quote: f64,
    pub payout: f64,
    pub fees_paid: f64,
    pub is_system_bet: bool,
    pub system_denominator: usize,
    pub is_live: bool,
    pub bound_round: u32,
    pub funded_by: FundingSource,
    pub free_bet_holder: Option<String>,
    pub created_at: u64,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,

    /// Escrow account holding the payout reserve
    pub escrow: String,

    /// Purchasing user; payouts go here unless a free-bet holder is set
    pub owner: String,

    /// Pooled free-bet indirection; when set, this account collects the
    /// payout and owner-cancellation is blocked
    pub free_bet_holder: Option<String>,

    pub legs: Vec<MarketLeg>,
    pub buy_in: f64,

    /// Product of leg implied odds
    pub total_quote: f64,

    /// Full quoted payout; equals the escrow balance until settlement
    pub payout: f64,

    pub fees_paid: f64,
    pub is_system_bet: bool,

    /// `k` of a k-of-n system bet, 0 otherwise
    pub system_denominator: usize,

    pub is_live: bool,

    /// Round the ticket is bound to for its entire lifetime
    /// (DEFAULT_ROUND for cross-round tickets)
    pub bound_round: u32,

    pub funded_by: FundingSource,
    pub created_at: u64,
    pub expires_at: u64,

    /// Idempotency guard; set exactly once
    pub resolved: bool,
    pub resolution: Option<TicketResolution>,
    pub resolved_at: Option<u64>,
}

impl Ticket {
    pub fn new(params: NewTicket) -> Self {
        let id = format!("ticket_{}", Uuid::new_v4().simple());
        let escrow = escrow_address(&id);
        Self {
            id,
            escrow,
            owner: params.owner,
            free_bet_holder: params.free_bet_holder,
            legs: params.legs,
            buy_in: params.buy_in,
            total_quote: params.total_quote,
            payout: params.payout,
            fees_paid: params.fees_paid,
            is_system_bet: params.is_system_bet,
            system_denominator: params.system_denominator,
            is_live: params.is_live,
            bound_round: params.bound_round,
            funded_by: params.funded_by,
            created_at: params.created_at,
            expires_at: params.expires_at,
            resolved: false,
            resolution: None,
            resolved_at: None,
        }
    }

    /// Latest leg maturity; drives round binding and expiry.
    pub fn maturity(&self) -> u64 {
        self.legs.iter().map(|leg| leg.maturity).max().unwrap_or(0)
    }

    fn resolved_leg_count(&self, results: &ResultsFeed) -> usize {
        self.legs
            .iter()
            .filter(|leg| results.is_set(&leg.key()))
            .count()
    }

    /// Whether enough results are in to settle this ticket.
    pub fn is_resolvable(&self, results: &ResultsFeed) -> bool {
        let resolved = self.resolved_leg_count(results);
        if self.is_system_bet {
            resolved >= self.system_denominator
        } else {
            resolved == self.legs.len()
        }
    }

    pub fn phase(&self, results: &ResultsFeed, now: u64) -> TicketPhase {
        match self.resolution {
            Some(TicketResolution::Expired) => TicketPhase::Expired,
            Some(_) => TicketPhase::Exercised,
            None => {
                if now > self.expires_at {
                    TicketPhase::Expired
                } else if self.is_resolvable(results) {
                    TicketPhase::Exercisable
                } else {
                    TicketPhase::Trading
                }
            }
        }
    }

    fn leg_won(&self, leg: &MarketLeg, results: &ResultsFeed) -> bool {
        results
            .is_winning_position(&leg.key(), leg.position)
            .unwrap_or(false)
    }

    /// Payout of a system bet given current results: the buy-in is split
    /// evenly across all C(n, k) combinations and every combination whose
    /// legs all won pays buy_in_per_combination / product(odds), capped at
    /// the quoted maximum payout.
    pub fn system_bet_payout(&self, results: &ResultsFeed) -> f64 {
        let n = self.legs.len();
        let k = self.system_denominator;
        let combinations = combinations_count(n as u64, k as u64);
        if combinations == 0 {
            return 0.0;
        }
        let buy_in_per_combination = self.buy_in / combinations as f64;

        let won: Vec<bool> = self
            .legs
            .iter()
            .map(|leg| self.leg_won(leg, results))
            .collect();

        let mut total = 0.0;
        for_each_k_subset(n, k, |combo| {
            if combo.iter().all(|&i| won[i]) {
                let product: f64 = combo.iter().map(|&i| self.legs[i].odds).product();
                total += buy_in_per_combination / product;
            }
        });
        total.min(self.payout)
    }

    /// Evaluate the user's chosen positions against the stored winning sets.
    pub fn is_user_the_winner(&self, results: &ResultsFeed) -> bool {
        if self.is_system_bet {
            self.system_bet_payout(results) > 0.0
        } else {
            self.legs.iter().all(|leg| self.leg_won(leg, results))
        }
    }

    /// Amount the user collects on exercise.
    pub fn win_amount(&self, results: &ResultsFeed) -> f64 {
        if self.is_system_bet {
            self.system_bet_payout(results)
        } else if self.is_user_the_winner(results) {
            self.payout
        } else {
            0.0
        }
    }

    fn payout_recipient(&self) -> String {
        self.free_bet_holder
            .clone()
            .unwrap_or_else(|| self.owner.clone())
    }

    /// Settle the ticket, recording the terminal state and returning the
    /// money movements for the caller to execute. Re-settling a resolved
    /// ticket is rejected, never double-paid.
    pub fn settle(&mut self, results: &ResultsFeed, now: u64) -> Result<Settlement, TicketError> {
        if self.resolved {
            return Err(TicketError::AlreadyExercised(self.id.clone()));
        }
        if !self.is_resolvable(results) {
            return Err(TicketError::NotExercisable(format!(
                "{}: {}/{} legs resolved",
                self.id,
                self.resolved_leg_count(results),
                self.legs.len()
            )));
        }

        let pay_out = self.win_amount(results);
        let winner = pay_out > 0.0;
        self.resolved = true;
        self.resolution = Some(if winner {
            TicketResolution::Won
        } else {
            TicketResolution::Lost
        });
        self.resolved_at = Some(now);

        Ok(Settlement {
            winner,
            pay_out,
            return_to_funder: self.payout - pay_out,
            recipient: self.payout_recipient(),
        })
    }

    /// Owner cancellation guard; the refund math lives in the orchestrator.
    pub fn cancel(&mut self, results: &ResultsFeed, now: u64) -> Result<(), TicketError> {
        if self.resolved {
            return Err(TicketError::AlreadyExercised(self.id.clone()));
        }
        if self.is_system_bet {
            return Err(TicketError::SystemBetNotCancellable(self.id.clone()));
        }
        if self.free_bet_holder.is_some() {
            return Err(TicketError::Unauthorized(format!(
                "{} is held through a free-bet pool",
                self.id
            )));
        }
        if self.phase(results, now) != TicketPhase::Trading {
            return Err(TicketError::NotExercisable(format!(
                "{} already has results",
                self.id
            )));
        }
        self.resolved = true;
        self.resolution = Some(TicketResolution::Cancelled);
        self.resolved_at = Some(now);
        Ok(())
    }

    /// Forfeit an unclaimed ticket after its expiry window has passed.
    pub fn mark_expired(&mut self, now: u64) -> Result<(), TicketError> {
        if self.resolved {
            return Err(TicketError::AlreadyExercised(self.id.clone()));
        }
        if now <= self.expires_at {
            return Err(TicketError::NotExpired(self.id.clone()));
        }
        self.resolved = true;
        self.resolution = Some(TicketResolution::Expired);
        self.resolved_at = Some(now);
        Ok(())
    }
}
