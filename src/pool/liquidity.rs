// ============================================================================
// Liquidity Pool - Sportsbook Settlement Core
// ============================================================================
//
// Orchestrates the round lifecycle (start, deposit, withdraw, close),
// ticket-to-round binding and the default-liquidity-provider fallback.
//
// Round state machine:
//   Open(trading) -> ClosingPrepared -> ClosingInProgress(batched) -> Closed
//
// Long-running operations (batch exercise, batch round closing) are chunked
// by caller-supplied batch size and resume from persisted cursors; an
// already-settled item is a skip, not an error, so partial progress across
// many small calls is always safe.
//
// ============================================================================

use crate::collateral::{
    CollateralVault, DEFAULT_PROVIDER_ACCOUNT, POOL_ACCOUNT, SAFE_BOX_ACCOUNT,
};
use crate::config::PoolConfig;
use crate::markets::ResultsFeed;
use crate::pool::rounds::{Round, RoundLedger, DEFAULT_ROUND, FIRST_TRADING_ROUND};
use crate::pool::PoolError;
use crate::ticket::{FundingSource, Settlement, Ticket};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-flight round closing; exists from `prepare_round_closing` until
/// `close_round` and cannot be cancelled, only continued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundClosing {
    pub round: u32,
    /// Net realized ratio applied to every depositor's balance
    pub profit_and_loss: f64,
    pub users: Vec<String>,
    pub cursor: usize,
}

/// Decision of where a new ticket binds and who funds its payout reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingPlan {
    pub round: u32,
    pub funded_by: FundingSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    cfg: PoolConfig,
    started: bool,
    current_round: u32,
    rounds: RoundLedger,

    /// Collateral currently held for depositors, checked against the pool
    /// cap; shrinks again when withdrawals pay out at round close
    total_deposited: f64,

    /// user -> requested share (1.0 = full withdrawal)
    withdrawal_requests: HashMap<String, f64>,

    /// Ticket ids bound per round, in trade order
    tickets_per_round: HashMap<u32, Vec<String>>,

    /// Next index to examine per round for the batch exercise sweep
    exercise_cursor: HashMap<u32, usize>,

    closing: Option<RoundClosing>,
}

impl LiquidityPool {
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            cfg,
            started: false,
            current_round: FIRST_TRADING_ROUND,
            rounds: RoundLedger::new(),
            total_deposited: 0.0,
            withdrawal_requests: HashMap::new(),
            tickets_per_round: HashMap::new(),
            exercise_cursor: HashMap::new(),
            closing: None,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn round(&self, index: u32) -> Option<&Round> {
        self.rounds.round(index)
    }

    pub fn rounds(&self) -> &RoundLedger {
        &self.rounds
    }

    pub fn closing(&self) -> Option<&RoundClosing> {
        self.closing.as_ref()
    }

    pub fn tickets_in_round(&self, round: u32) -> Vec<String> {
        self.tickets_per_round
            .get(&round)
            .cloned()
            .unwrap_or_default()
    }

    // ===== DEPOSITS & WITHDRAWALS =====

    /// Deposit into the pool. Funds are credited to the *next* round's
    /// allocation (round 2 before the pool is started). Returns the round
    /// the deposit was credited to.
    pub fn deposit(
        &mut self,
        user: &str,
        amount: f64,
        vault: &mut CollateralVault,
    ) -> Result<u32, PoolError> {
        if user == DEFAULT_PROVIDER_ACCOUNT {
            return Err(PoolError::DefaultProviderCannotDeposit);
        }
        if self.closing.is_some() {
            return Err(PoolError::DepositWhileClosing);
        }
        if amount < self.cfg.min_deposit {
            return Err(PoolError::AmountBelowMinimum {
                amount,
                min: self.cfg.min_deposit,
            });
        }
        if self.total_deposited + amount > self.cfg.max_pool_cap {
            return Err(PoolError::DepositExceedsCap {
                total: self.total_deposited + amount,
                cap: self.cfg.max_pool_cap,
            });
        }
        if self.withdrawal_requests.contains_key(user) {
            return Err(PoolError::WithdrawalAlreadyRequested(user.to_string()));
        }

        let target = if self.started {
            self.current_round + 1
        } else {
            FIRST_TRADING_ROUND
        };
        vault.transfer(user, POOL_ACCOUNT, amount)?;
        self.rounds.credit(target, user, amount);
        self.total_deposited += amount;

        tracing::info!(user, amount, round = target, "deposit credited");
        Ok(target)
    }

    /// Open the first trading round. Callable once, requires deposits.
    pub fn start(&mut self, now: u64) -> Result<(), PoolError> {
        if self.started {
            return Err(PoolError::AlreadyStarted);
        }
        let allocation = self
            .rounds
            .round(FIRST_TRADING_ROUND)
            .map(|round| round.allocation)
            .unwrap_or(0.0);
        if allocation <= 0.0 {
            return Err(PoolError::NoDeposits);
        }

        let round = self.rounds.ensure_round(FIRST_TRADING_ROUND);
        round.start = now;
        round.end = now + self.cfg.round_length;
        self.started = true;
        self.current_round = FIRST_TRADING_ROUND;

        tracing::info!(round = FIRST_TRADING_ROUND, allocation, "pool started");
        Ok(())
    }

    fn request_withdrawal(&mut self, user: &str, share: f64) -> Result<(), PoolError> {
        if !self.started {
            return Err(PoolError::PoolNotStarted);
        }
        if self.withdrawal_requests.contains_key(user) {
            return Err(PoolError::WithdrawalAlreadyRequested(user.to_string()));
        }
        if self.rounds.user_balance(self.current_round, user) <= 0.0 {
            return Err(PoolError::NothingToWithdraw(user.to_string()));
        }
        // A deposit already sitting in the next round makes the intent
        // ambiguous; the user must wait for the round to roll
        if self.rounds.user_balance(self.current_round + 1, user) > 0.0 {
            return Err(PoolError::DepositedIntoNextRound(user.to_string()));
        }
        self.withdrawal_requests.insert(user.to_string(), share);
        tracing::info!(user, share, "withdrawal requested");
        Ok(())
    }

    /// Mark the user for a full payout at the next round close.
    pub fn withdrawal_request(&mut self, user: &str) -> Result<(), PoolError> {
        self.request_withdrawal(user, 1.0)
    }

    /// Mark the user for a partial payout; share must lie strictly inside
    /// (0.1, 0.9).
    pub fn partial_withdrawal_request(&mut self, user: &str, share: f64) -> Result<(), PoolError> {
        if share <= 0.1 || share >= 0.9 {
            return Err(PoolError::WithdrawalShareOutOfRange(share));
        }
        self.request_withdrawal(user, share)
    }

    pub fn has_withdrawal_request(&self, user: &str) -> bool {
        self.withdrawal_requests.contains_key(user)
    }

    // ===== TICKET BINDING =====

    /// Decide where a ticket with the given maturity binds and verify the
    /// funding source can cover the payout reserve. Read-only; the risk
    /// check runs between planning and committing so a rejected trade
    /// touches nothing.
    pub fn plan_binding(
        &self,
        maturity: u64,
        reserve: f64,
        vault: &CollateralVault,
    ) -> Result<BindingPlan, PoolError> {
        if !self.started {
            return Err(PoolError::PoolNotStarted);
        }
        let current = self
            .rounds
            .round(self.current_round)
            .ok_or(PoolError::PoolNotStarted)?;

        if maturity <= current.end {
            if current.balance < reserve {
                return Err(PoolError::InsufficientBalance(format!(
                    "round {} pool {:.4} cannot reserve {:.4}",
                    self.current_round, current.balance, reserve
                )));
            }
            return Ok(BindingPlan {
                round: self.current_round,
                funded_by: FundingSource::Round(self.current_round),
            });
        }

        // Next round's pool is not finalized yet and the default round never
        // trades against a pool; both ride on the backstop
        let round = if maturity <= current.end + self.cfg.round_length {
            self.current_round + 1
        } else {
            DEFAULT_ROUND
        };
        let available = vault.balance_of(DEFAULT_PROVIDER_ACCOUNT);
        if available < reserve {
            return Err(PoolError::InsufficientBalance(format!(
                "default provider {:.4} cannot reserve {:.4}",
                available, reserve
            )));
        }
        Ok(BindingPlan {
            round,
            funded_by: FundingSource::DefaultProvider,
        })
    }

    /// Fund a freshly created ticket's escrow according to its binding plan
    /// and record the ticket against its round. The buy-in itself was already
    /// moved into escrow by the orchestrator; the funder adds the payout
    /// reserve and pays the protocol fee.
    pub fn commit_binding(
        &mut self,
        ticket: &Ticket,
        vault: &mut CollateralVault,
    ) -> Result<(), PoolError> {
        let reserve = ticket.payout - ticket.buy_in;
        let fee = ticket.fees_paid;
        let funder = match ticket.funded_by {
            FundingSource::Round(_) => POOL_ACCOUNT,
            FundingSource::DefaultProvider => DEFAULT_PROVIDER_ACCOUNT,
        };

        vault.transfer(funder, &ticket.escrow, reserve)?;
        vault.transfer(funder, SAFE_BOX_ACCOUNT, fee)?;
        if let FundingSource::Round(index) = ticket.funded_by {
            if let Some(round) = self.rounds.round_mut(index) {
                round.balance -= reserve + fee;
            }
        }

        self.tickets_per_round
            .entry(ticket.bound_round)
            .or_default()
            .push(ticket.id.clone());

        tracing::info!(
            ticket = %ticket.id,
            round = ticket.bound_round,
            reserve,
            "ticket bound"
        );
        Ok(())
    }

    // ===== EXERCISE =====

    /// Drain part of a ticket's escrow back to whoever funded its payout
    /// reserve, keeping round balances in sync.
    pub fn return_to_funder(
        &mut self,
        ticket: &Ticket,
        amount: f64,
        vault: &mut CollateralVault,
    ) -> Result<(), PoolError> {
        if amount <= 0.0 {
            return Ok(());
        }
        match ticket.funded_by {
            FundingSource::Round(index) => {
                vault.transfer(&ticket.escrow, POOL_ACCOUNT, amount)?;
                if let Some(round) = self.rounds.round_mut(index) {
                    round.balance += amount;
                }
            }
            FundingSource::DefaultProvider => {
                vault.transfer(&ticket.escrow, DEFAULT_PROVIDER_ACCOUNT, amount)?;
            }
        }
        Ok(())
    }

    /// Settle one ticket and move its escrow: winnings to the recipient,
    /// the remainder back to whoever funded the payout reserve.
    pub fn exercise_ticket(
        &mut self,
        ticket: &mut Ticket,
        results: &ResultsFeed,
        vault: &mut CollateralVault,
        now: u64,
    ) -> Result<Settlement, PoolError> {
        let settlement = ticket.settle(results, now)?;

        if settlement.pay_out > 0.0 {
            vault.transfer(&ticket.escrow, &settlement.recipient, settlement.pay_out)?;
        }
        self.return_to_funder(ticket, settlement.return_to_funder, vault)?;

        tracing::info!(
            ticket = %ticket.id,
            winner = settlement.winner,
            pay_out = settlement.pay_out,
            "ticket exercised"
        );
        Ok(settlement)
    }

    /// Sweep up to `batch_size` tickets of `round` starting at the persisted
    /// cursor. A ticket is ready only when the user lost: winning tickets
    /// require paying the user and are pulled individually through the
    /// orchestrator, never swept. Returns the number of tickets settled.
    pub fn exercise_tickets_ready_batch(
        &mut self,
        round: u32,
        batch_size: usize,
        tickets: &mut HashMap<String, Ticket>,
        results: &ResultsFeed,
        vault: &mut CollateralVault,
        now: u64,
    ) -> Result<usize, PoolError> {
        if batch_size == 0 {
            return Err(PoolError::BatchSizeZero);
        }
        let ids = self.tickets_in_round(round);
        let mut cursor = self.exercise_cursor.get(&round).copied().unwrap_or(0);
        let mut advancing = true;
        let mut settled = 0;
        let mut examined = 0;
        let mut i = cursor;

        while i < ids.len() && examined < batch_size {
            examined += 1;
            if let Some(ticket) = tickets.get_mut(&ids[i]) {
                if !ticket.resolved
                    && ticket.is_resolvable(results)
                    && !ticket.is_user_the_winner(results)
                {
                    self.exercise_ticket(ticket, results, vault, now)?;
                    settled += 1;
                }
                // The cursor only moves past a settled prefix; an unresolved
                // ticket pins it so later calls revisit the gap
                if advancing {
                    if ticket.resolved {
                        cursor = i + 1;
                    } else {
                        advancing = false;
                    }
                }
            } else if advancing {
                cursor = i + 1;
            }
            i += 1;
        }

        self.exercise_cursor.insert(round, cursor);
        Ok(settled)
    }

    /// Unbatched sweep over the current round.
    pub fn exercise_tickets_ready(
        &mut self,
        tickets: &mut HashMap<String, Ticket>,
        results: &ResultsFeed,
        vault: &mut CollateralVault,
        now: u64,
    ) -> Result<usize, PoolError> {
        let round = self.current_round;
        let len = self.tickets_in_round(round).len().max(1);
        self.exercise_tickets_ready_batch(round, len, tickets, results, vault, now)
    }

    /// Sweep for sentinel-round tickets; they settle against the default
    /// liquidity provider since that round never closes.
    pub fn exercise_default_round_tickets_ready_batch(
        &mut self,
        batch_size: usize,
        tickets: &mut HashMap<String, Ticket>,
        results: &ResultsFeed,
        vault: &mut CollateralVault,
        now: u64,
    ) -> Result<usize, PoolError> {
        self.exercise_tickets_ready_batch(DEFAULT_ROUND, batch_size, tickets, results, vault, now)
    }

    pub fn exercise_default_round_tickets_ready(
        &mut self,
        tickets: &mut HashMap<String, Ticket>,
        results: &ResultsFeed,
        vault: &mut CollateralVault,
        now: u64,
    ) -> Result<usize, PoolError> {
        let len = self.tickets_in_round(DEFAULT_ROUND).len().max(1);
        self.exercise_tickets_ready_batch(DEFAULT_ROUND, len, tickets, results, vault, now)
    }

    // ===== ROUND CLOSING =====

    /// Freeze the current round for closing: requires the round to be over
    /// and every ticket bound to it resolved. Takes the safe-box cut of any
    /// profit and fixes the round's PnL ratio.
    pub fn prepare_round_closing(
        &mut self,
        tickets: &HashMap<String, Ticket>,
        vault: &mut CollateralVault,
        now: u64,
    ) -> Result<f64, PoolError> {
        if !self.started {
            return Err(PoolError::PoolNotStarted);
        }
        if self.closing.is_some() {
            return Err(PoolError::RoundClosingAlreadyPrepared);
        }
        let index = self.current_round;
        let (end, allocation, balance) = {
            let round = self.rounds.round(index).ok_or(PoolError::PoolNotStarted)?;
            (round.end, round.allocation, round.balance)
        };
        if now < end {
            return Err(PoolError::RoundNotEnded { now, end });
        }
        let unresolved = self
            .tickets_in_round(index)
            .iter()
            .filter(|id| tickets.get(*id).map(|t| !t.resolved).unwrap_or(false))
            .count();
        if unresolved > 0 {
            return Err(PoolError::TradingTicketsNotResolved {
                round: index,
                unresolved,
            });
        }

        let mut final_balance = balance;
        let profit = balance - allocation;
        if profit > 0.0 {
            let safe_box_cut = profit * self.cfg.safe_box_impact;
            vault.transfer(POOL_ACCOUNT, SAFE_BOX_ACCOUNT, safe_box_cut)?;
            final_balance -= safe_box_cut;
            tracing::info!(round = index, safe_box_cut, "round profit shared with safe box");
        }

        let profit_and_loss = if allocation > 0.0 {
            final_balance / allocation
        } else {
            1.0
        };
        if let Some(round) = self.rounds.round_mut(index) {
            round.balance = final_balance;
            round.profit_and_loss = profit_and_loss;
        }

        self.closing = Some(RoundClosing {
            round: index,
            profit_and_loss,
            users: self.rounds.users_in_round(index),
            cursor: 0,
        });

        tracing::info!(round = index, profit_and_loss, "round closing prepared");
        Ok(profit_and_loss)
    }

    /// Process up to `batch_size` pending users of the prepared closing:
    /// each user's share is their deposit scaled by the round PnL, paid out
    /// per their withdrawal request and otherwise rolled into the next round.
    pub fn process_round_closing_batch(
        &mut self,
        batch_size: usize,
        vault: &mut CollateralVault,
    ) -> Result<usize, PoolError> {
        let closing = self
            .closing
            .clone()
            .ok_or(PoolError::RoundClosingNotPrepared)?;
        if batch_size == 0 {
            return Err(PoolError::BatchSizeZero);
        }
        if closing.cursor >= closing.users.len() {
            return Err(PoolError::AllUsersAlreadyProcessed);
        }

        let next_round = closing.round + 1;
        self.rounds.ensure_round(next_round);
        let end = (closing.cursor + batch_size).min(closing.users.len());

        for user in &closing.users[closing.cursor..end] {
            let balance = self.rounds.user_balance(closing.round, user);
            let payable = balance * closing.profit_and_loss;

            let withdrawn = match self.withdrawal_requests.remove(user) {
                Some(share) if share >= 1.0 => payable,
                Some(share) => payable * share,
                None => 0.0,
            };
            let rolled = payable - withdrawn;

            if withdrawn > 0.0 {
                vault.transfer(POOL_ACCOUNT, user, withdrawn)?;
                // Withdrawn collateral frees cap headroom for new deposits
                self.total_deposited = (self.total_deposited - withdrawn).max(0.0);
            }
            if let Some(round) = self.rounds.round_mut(closing.round) {
                round.balance -= payable;
            }
            self.rounds.zero_user_balance(closing.round, user);
            if rolled > 0.0 {
                self.rounds.credit(next_round, user, rolled);
            }

            tracing::info!(user, payable, withdrawn, rolled, "closing batch processed user");
        }

        if let Some(closing) = self.closing.as_mut() {
            closing.cursor = end;
        }
        Ok(end - closing.cursor)
    }

    /// Finish the prepared closing: requires every user processed. Records
    /// cumulative PnL, advances the round index and opens the next round.
    pub fn close_round(&mut self, now: u64) -> Result<u32, PoolError> {
        let closing = self
            .closing
            .clone()
            .ok_or(PoolError::RoundClosingNotPrepared)?;
        if closing.cursor < closing.users.len() {
            return Err(PoolError::NotAllUsersProcessedYet {
                processed: closing.cursor,
                total: closing.users.len(),
            });
        }

        let previous_cumulative = if closing.round == FIRST_TRADING_ROUND {
            1.0
        } else {
            self.rounds.cumulative_profit_and_loss(closing.round - 1)
        };
        if let Some(round) = self.rounds.round_mut(closing.round) {
            round.cumulative_profit_and_loss = previous_cumulative * closing.profit_and_loss;
            round.closed = true;
        }

        let next_round = closing.round + 1;
        let round_length = self.cfg.round_length;
        let next = self.rounds.ensure_round(next_round);
        next.start = now;
        next.end = now + round_length;

        self.current_round = next_round;
        self.closing = None;

        tracing::info!(
            closed = closing.round,
            profit_and_loss = closing.profit_and_loss,
            next = next_round,
            "round closed"
        );
        Ok(next_round)
    }
}
