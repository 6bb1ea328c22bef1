// ============================================================================
// Settlement AMM - Sportsbook Settlement Core
// ============================================================================
//
// The orchestrator owning every subsystem: the collateral vault, the risk
// manager, the liquidity pool and the ticket book. All money movement flows
// through here; handlers call into this and nothing else.
//
// Trade path:
//   quote -> risk admission (all-or-nothing) -> escrow buy-in ->
//   fund payout reserve from the bound round / default provider -> mint ticket
//
// ============================================================================

use crate::collateral::{CollateralVault, VaultError};
use crate::config::{PoolConfig, RiskConfig};
use crate::markets::{MarketLeg, ResultsFeed};
use crate::pool::liquidity::BindingPlan;
use crate::pool::{DefaultLiquidityProvider, LiquidityPool, PoolError};
use crate::risk::{RiskError, RiskManager, RiskStatus};
use crate::ticket::{NewTicket, Settlement, Ticket, TicketError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug)]
pub enum AmmError {
    Risk(RiskError),
    Pool(PoolError),
    Ticket(TicketError),
    Vault(VaultError),
    TicketNotFound(String),
}

impl std::fmt::Display for AmmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmmError::Risk(err) => write!(f, "{}", err),
            AmmError::Pool(err) => write!(f, "{}", err),
            AmmError::Ticket(err) => write!(f, "{}", err),
            AmmError::Vault(err) => write!(f, "{}", err),
            AmmError::TicketNotFound(id) => write!(f, "Ticket not found: {}", id),
        }
    }
}

impl std::error::Error for AmmError {}

impl From<RiskError> for AmmError {
    fn from(err: RiskError) -> Self {
        AmmError::Risk(err)
    }
}

impl From<PoolError> for AmmError {
    fn from(err: PoolError) -> Self {
        AmmError::Pool(err)
    }
}

impl From<TicketError> for AmmError {
    fn from(err: TicketError) -> Self {
        AmmError::Ticket(err)
    }
}

impl From<VaultError> for AmmError {
    fn from(err: VaultError) -> Self {
        AmmError::Vault(err)
    }
}

/// A trade the orchestrator is asked to execute.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeRequest {
    pub user: String,
    pub legs: Vec<MarketLeg>,
    pub buy_in: f64,
    #[serde(default)]
    pub is_system_bet: bool,
    #[serde(default)]
    pub system_denominator: usize,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub free_bet_holder: Option<String>,
}

/// Priced trade before execution; `binding` tells who would fund it.
#[derive(Debug, Clone, Serialize)]
pub struct TradeQuote {
    pub total_quote: f64,
    pub payout: f64,
    pub fee: f64,
    #[serde(skip)]
    pub binding: BindingPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amm {
    pub vault: CollateralVault,
    pub risk: RiskManager,
    pub pool: LiquidityPool,
    pub provider: DefaultLiquidityProvider,
    pub results: ResultsFeed,
    pub tickets: HashMap<String, Ticket>,
}

impl Amm {
    pub fn new(risk_cfg: RiskConfig, pool_cfg: PoolConfig) -> Self {
        let decimals = pool_cfg.collateral_decimals;
        Self {
            vault: CollateralVault::new("USDx", decimals),
            risk: RiskManager::new(risk_cfg),
            pool: LiquidityPool::new(pool_cfg),
            provider: DefaultLiquidityProvider::new(),
            results: ResultsFeed::new(),
            tickets: HashMap::new(),
        }
    }

    pub fn ticket(&self, id: &str) -> Result<&Ticket, AmmError> {
        self.tickets
            .get(id)
            .ok_or_else(|| AmmError::TicketNotFound(id.to_string()))
    }

    // ===== TRADING =====

    /// Price a prospective trade without touching any state: bounds are
    /// validated, the payout and fee are computed and the binding is planned
    /// so the caller learns up front who would fund the ticket.
    pub fn trade_quote(&self, request: &TradeRequest, now: u64) -> Result<TradeQuote, AmmError> {
        self.risk.validate_ticket(
            &request.legs,
            request.buy_in,
            request.is_system_bet,
            request.system_denominator,
            request.is_live,
            now,
        )?;

        let total_quote: f64 = request.legs.iter().map(|leg| leg.odds).product();
        let payout = if request.is_system_bet {
            self.risk.max_system_bet_payout(
                &request.legs,
                request.system_denominator,
                request.buy_in,
            )
        } else {
            request.buy_in / total_quote.max(self.risk.config().max_supported_odds)
        };
        let fee = request.buy_in * self.pool.config().safe_box_fee;

        let maturity = request
            .legs
            .iter()
            .map(|leg| leg.maturity)
            .max()
            .unwrap_or(0);
        // The funder fronts reserve plus fee, both must be covered
        let required = payout - request.buy_in + fee;
        let binding = self.pool.plan_binding(maturity, required, &self.vault)?;

        Ok(TradeQuote {
            total_quote,
            payout,
            fee,
            binding,
        })
    }

    /// Execute a trade end to end. Risk admission is all-or-nothing; once it
    /// passes, the buy-in moves to escrow and the bound funder adds the
    /// payout reserve and pays the protocol fee. Returns the minted ticket id.
    pub fn trade(&mut self, request: TradeRequest, now: u64) -> Result<String, AmmError> {
        let quote = self.trade_quote(&request, now)?;

        // Solvency of the purchaser is checked before risk commits so a
        // failed transfer can never leave exposure behind
        let available = self.vault.balance_of(&request.user);
        if available < request.buy_in {
            return Err(AmmError::Vault(VaultError::InsufficientBalance {
                account: request.user.clone(),
                requested: request.buy_in,
                available,
            }));
        }

        self.risk.check_and_update_risks(
            &request.legs,
            request.buy_in,
            request.is_system_bet,
            request.system_denominator,
            request.is_live,
            now,
        )?;

        let maturity = request
            .legs
            .iter()
            .map(|leg| leg.maturity)
            .max()
            .unwrap_or(0);
        let ticket = Ticket::new(NewTicket {
            owner: request.user.clone(),
            legs: request.legs,
            buy_in: request.buy_in,
            total_quote: quote.total_quote,
            payout: quote.payout,
            fees_paid: quote.fee,
            is_system_bet: request.is_system_bet,
            system_denominator: request.system_denominator,
            is_live: request.is_live,
            bound_round: quote.binding.round,
            funded_by: quote.binding.funded_by,
            free_bet_holder: request.free_bet_holder,
            created_at: now,
            expires_at: maturity + self.pool.config().ticket_expiry,
        });

        self.vault
            .transfer(&request.user, &ticket.escrow, request.buy_in)?;
        self.pool.commit_binding(&ticket, &mut self.vault)?;

        let id = ticket.id.clone();
        tracing::info!(
            ticket = %id,
            user = %request.user,
            buy_in = request.buy_in,
            payout = quote.payout,
            round = quote.binding.round,
            "trade executed"
        );
        self.tickets.insert(id.clone(), ticket);
        Ok(id)
    }

    /// Non-mutating liquidity probe for a prospective ticket.
    pub fn check_risks(&self, legs: &[MarketLeg], buy_in: f64) -> (RiskStatus, Vec<bool>) {
        self.risk.check_risks(legs, buy_in)
    }

    // ===== SETTLEMENT =====

    /// Record winning positions for a batch of markets. Already-set markets
    /// are skipped, never overwritten. Returns how many were newly set.
    pub fn set_results(
        &mut self,
        game_ids: &[String],
        type_ids: &[u16],
        player_ids: &[u32],
        winning_positions: &[Vec<usize>],
    ) -> usize {
        self.results
            .set_results_per_markets(game_ids, type_ids, player_ids, winning_positions)
    }

    /// Exercise a single ticket, typically a winner claiming the payout.
    pub fn exercise_ticket(&mut self, ticket_id: &str, now: u64) -> Result<Settlement, AmmError> {
        let ticket = self
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| AmmError::TicketNotFound(ticket_id.to_string()))?;
        let settlement = self
            .pool
            .exercise_ticket(ticket, &self.results, &mut self.vault, now)?;
        Ok(settlement)
    }

    /// Sweep resolved losing tickets of the current round in one batch.
    pub fn exercise_tickets_ready_batch(
        &mut self,
        batch_size: usize,
        now: u64,
    ) -> Result<usize, AmmError> {
        let round = self.pool.current_round();
        let settled = self.pool.exercise_tickets_ready_batch(
            round,
            batch_size,
            &mut self.tickets,
            &self.results,
            &mut self.vault,
            now,
        )?;
        Ok(settled)
    }

    pub fn exercise_tickets_ready(&mut self, now: u64) -> Result<usize, AmmError> {
        let settled = self
            .pool
            .exercise_tickets_ready(&mut self.tickets, &self.results, &mut self.vault, now)?;
        Ok(settled)
    }

    pub fn exercise_default_round_tickets_ready_batch(
        &mut self,
        batch_size: usize,
        now: u64,
    ) -> Result<usize, AmmError> {
        let settled = self.pool.exercise_default_round_tickets_ready_batch(
            batch_size,
            &mut self.tickets,
            &self.results,
            &mut self.vault,
            now,
        )?;
        Ok(settled)
    }

    pub fn exercise_default_round_tickets_ready(&mut self, now: u64) -> Result<usize, AmmError> {
        let settled = self.pool.exercise_default_round_tickets_ready(
            &mut self.tickets,
            &self.results,
            &mut self.vault,
            now,
        )?;
        Ok(settled)
    }

    /// Cancel an unresolved ticket at the owner's request. The user takes the
    /// buy-in back minus a double protocol fee; the payout reserve returns to
    /// the funder. Returns the refunded amount.
    pub fn cancel_ticket_by_owner(
        &mut self,
        ticket_id: &str,
        caller: &str,
        now: u64,
    ) -> Result<f64, AmmError> {
        let ticket = self
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| AmmError::TicketNotFound(ticket_id.to_string()))?;
        if ticket.owner != caller {
            return Err(AmmError::Ticket(TicketError::Unauthorized(format!(
                "{} is not the owner of {}",
                caller, ticket_id
            ))));
        }

        ticket.cancel(&self.results, now)?;

        let penalty = (ticket.fees_paid * 2.0).min(ticket.buy_in);
        let refund = ticket.buy_in - penalty;
        if refund > 0.0 {
            self.vault.transfer(&ticket.escrow, &ticket.owner, refund)?;
        }
        if penalty > 0.0 {
            self.vault.transfer(
                &ticket.escrow,
                crate::collateral::SAFE_BOX_ACCOUNT,
                penalty,
            )?;
        }
        let remainder = ticket.payout - ticket.buy_in;
        let ticket = ticket.clone();
        self.pool
            .return_to_funder(&ticket, remainder, &mut self.vault)?;
        // The committed exposure dies with the ticket; its markets are still
        // trading and the caps must open back up
        self.risk.release_risks(&ticket.legs, ticket.buy_in);

        tracing::info!(ticket = %ticket_id, caller, refund, penalty, "ticket cancelled");
        Ok(refund)
    }

    /// Forfeit every unresolved ticket whose claim window has passed; each
    /// escrow drains in full to the safe box, never back to a claimant or
    /// funder. Returns the count.
    pub fn expire_tickets(&mut self, now: u64) -> Result<usize, AmmError> {
        let expired: Vec<String> = self
            .tickets
            .values()
            .filter(|t| !t.resolved && now > t.expires_at)
            .map(|t| t.id.clone())
            .collect();

        for id in &expired {
            if let Some(ticket) = self.tickets.get_mut(id) {
                ticket.mark_expired(now)?;
                let forfeited = self
                    .vault
                    .drain(&ticket.escrow, crate::collateral::SAFE_BOX_ACCOUNT);
                tracing::info!(ticket = %id, forfeited, "ticket expired and forfeited");
            }
        }
        Ok(expired.len())
    }

    // ===== POOL LIFECYCLE =====

    pub fn deposit(&mut self, user: &str, amount: f64) -> Result<u32, AmmError> {
        let round = self.pool.deposit(user, amount, &mut self.vault)?;
        Ok(round)
    }

    pub fn start_pool(&mut self, now: u64) -> Result<(), AmmError> {
        self.pool.start(now)?;
        Ok(())
    }

    pub fn withdrawal_request(&mut self, user: &str) -> Result<(), AmmError> {
        self.pool.withdrawal_request(user)?;
        Ok(())
    }

    pub fn partial_withdrawal_request(&mut self, user: &str, share: f64) -> Result<(), AmmError> {
        self.pool.partial_withdrawal_request(user, share)?;
        Ok(())
    }

    pub fn prepare_round_closing(&mut self, now: u64) -> Result<f64, AmmError> {
        let pnl = self
            .pool
            .prepare_round_closing(&self.tickets, &mut self.vault, now)?;
        Ok(pnl)
    }

    pub fn process_round_closing_batch(&mut self, batch_size: usize) -> Result<usize, AmmError> {
        let processed = self
            .pool
            .process_round_closing_batch(batch_size, &mut self.vault)?;
        Ok(processed)
    }

    pub fn close_round(&mut self, now: u64) -> Result<u32, AmmError> {
        let next = self.pool.close_round(now)?;
        Ok(next)
    }

    pub fn fund_default_provider(&mut self, amount: f64) {
        self.provider.fund(&mut self.vault, amount);
    }
}
