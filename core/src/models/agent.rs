//! Agent (Bank) model
//!
//! Represents a bank participating in the payment system. All money values
//! are `i64` cents; no floating point enters balance or settlement logic.

use crate::models::collateral::CollateralLedger;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during agent operations
#[derive(Debug, Error, PartialEq)]
pub enum AgentError {
    #[error("Insufficient liquidity: required {required}, available {available}")]
    InsufficientLiquidity { required: i64, available: i64 },
}

/// Represents a bank (agent) in the payment system
///
/// # Example
/// ```
/// use rtgs_sim_core::Agent;
///
/// let mut agent = Agent::new("BANK_A".to_string(), 1000000, 500000);
/// assert_eq!(agent.balance(), 1000000); // $10,000.00 in cents
///
/// agent.debit(300000).unwrap(); // Pay $3,000
/// assert_eq!(agent.balance(), 700000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent identifier (e.g., "BANK_A")
    id: String,

    /// Current balance in settlement account (i64 cents)
    /// Positive = funds available, negative = using overdraft
    balance: i64,

    /// Unsecured overdraft limit (i64 cents), independent of posted collateral
    credit_limit: i64,

    /// Internal queue (Queue 1): transaction IDs awaiting a policy decision
    outgoing_queue: Vec<String>,

    /// Transaction IDs this agent expects to receive (used for liquidity forecasting)
    incoming_expected: Vec<String>,

    /// Last tick at which the policy evaluated this agent's queue
    last_decision_tick: Option<usize>,

    /// Minimum balance the agent's policy tries to preserve before releasing payments
    liquidity_buffer: i64,

    /// Posted collateral ledger (capacity, current posting, auto-withdraw timers)
    collateral: CollateralLedger,

    /// Haircut applied to posted collateral when computing backed overdraft (0.0-1.0)
    collateral_haircut: f64,

    /// Tick at which collateral was last posted (for snapshot round-tripping)
    collateral_posted_at_tick: Option<usize>,
}

impl Agent {
    /// Create a new agent with no liquidity buffer and no collateral capacity.
    ///
    /// # Example
    /// ```
    /// use rtgs_sim_core::Agent;
    ///
    /// let agent = Agent::new("BANK_A".to_string(), 1000000, 500000);
    /// assert_eq!(agent.balance(), 1000000);
    /// ```
    pub fn new(id: String, balance: i64, credit_limit: i64) -> Self {
        assert!(credit_limit >= 0, "credit_limit must be non-negative");
        Self {
            id,
            balance,
            credit_limit,
            outgoing_queue: Vec::new(),
            incoming_expected: Vec::new(),
            last_decision_tick: None,
            liquidity_buffer: 0,
            collateral: CollateralLedger::new(0),
            collateral_haircut: 0.0,
            collateral_posted_at_tick: None,
        }
    }

    /// Create a new agent with a liquidity buffer and collateral capacity.
    pub fn with_buffer(
        id: String,
        balance: i64,
        credit_limit: i64,
        liquidity_buffer: i64,
    ) -> Self {
        let mut agent = Self::new(id, balance, credit_limit);
        agent.liquidity_buffer = liquidity_buffer;
        agent
    }

    /// Configure this agent's collateral capacity (builder-style).
    pub fn with_collateral_capacity(mut self, capacity: i64) -> Self {
        self.collateral.set_capacity(capacity);
        self
    }

    /// Reconstruct an agent from a checkpoint snapshot.
    #[allow(clippy::too_many_arguments)]
    pub fn from_snapshot(
        id: String,
        balance: i64,
        credit_limit: i64,
        outgoing_queue: Vec<String>,
        incoming_expected: Vec<String>,
        last_decision_tick: Option<usize>,
        liquidity_buffer: i64,
        posted_collateral: i64,
        collateral_capacity: i64,
        collateral_haircut: f64,
        collateral_posted_at_tick: Option<usize>,
        collateral_timers: Vec<crate::models::collateral::CollateralTimer>,
    ) -> Self {
        let mut collateral = CollateralLedger::new(collateral_capacity.max(posted_collateral.max(0)));
        collateral.set_posted(posted_collateral);
        collateral.set_timers(collateral_timers);
        Self {
            id,
            balance,
            credit_limit,
            outgoing_queue,
            incoming_expected,
            last_decision_tick,
            liquidity_buffer,
            collateral,
            collateral_haircut,
            collateral_posted_at_tick,
        }
    }

    /// Get agent ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get current balance (i64 cents)
    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Get unsecured credit limit (i64 cents)
    pub fn credit_limit(&self) -> i64 {
        self.credit_limit
    }

    /// Calculate available liquidity (balance + unused unsecured credit)
    ///
    /// This does NOT include posted collateral; use [`allowed_overdraft_limit`]
    /// for the full backed overdraft including collateral.
    pub fn available_liquidity(&self) -> i64 {
        if self.balance >= 0 {
            self.balance + self.credit_limit
        } else {
            self.credit_limit - self.balance.abs()
        }
    }

    /// Maximum amount this balance is allowed to go negative by, including
    /// both the unsecured credit limit and posted collateral.
    ///
    /// Used by settlement and LSM to determine whether a debit is permitted:
    /// `balance - amount >= -allowed_overdraft_limit()`.
    pub fn allowed_overdraft_limit(&self) -> i64 {
        self.credit_limit + self.collateral.posted()
    }

    /// Available liquidity including posted collateral headroom. This is the
    /// figure settlement (RTGS/LSM) checks against.
    pub fn backed_liquidity(&self) -> i64 {
        if self.balance >= 0 {
            self.balance + self.allowed_overdraft_limit()
        } else {
            self.allowed_overdraft_limit() - self.balance.abs()
        }
    }

    /// Check if agent can pay a given amount, including collateral-backed headroom.
    pub fn can_pay(&self, amount: i64) -> bool {
        amount <= self.backed_liquidity()
    }

    /// Debit (decrease) balance, checked against unsecured credit plus posted collateral.
    pub fn debit(&mut self, amount: i64) -> Result<(), AgentError> {
        assert!(amount >= 0, "amount must be positive");

        if !self.can_pay(amount) {
            return Err(AgentError::InsufficientLiquidity {
                required: amount,
                available: self.backed_liquidity(),
            });
        }

        let new_balance = self
            .balance
            .checked_sub(amount)
            .expect("balance underflow in debit");
        debug_assert!(
            new_balance >= -self.allowed_overdraft_limit(),
            "debit breached backed liquidity"
        );
        self.balance = new_balance;
        Ok(())
    }

    /// Credit (increase) balance
    pub fn credit(&mut self, amount: i64) {
        assert!(amount >= 0, "amount must be positive");
        self.balance = self
            .balance
            .checked_add(amount)
            .expect("balance overflow in credit");
    }

    /// Adjust balance by a signed delta, bypassing liquidity checks.
    ///
    /// Used by LSM settlement, which verifies net-position feasibility up
    /// front (against `allowed_overdraft_limit`) and then applies all legs
    /// of a cycle atomically.
    pub fn adjust_balance(&mut self, delta: i64) {
        self.balance = self
            .balance
            .checked_add(delta)
            .expect("balance overflow in adjust_balance");
    }

    /// Check if agent is currently using overdraft (negative balance)
    pub fn is_using_credit(&self) -> bool {
        self.balance < 0
    }

    /// Get amount of overdraft currently in use
    pub fn credit_used(&self) -> i64 {
        if self.balance < 0 {
            self.balance.abs()
        } else {
            0
        }
    }

    /// Liquidity pressure in `[0, 1]`: fraction of the full backed overdraft
    /// capacity already consumed. `0.0` = fully liquid, `1.0` = at the limit.
    pub fn liquidity_pressure(&self) -> f64 {
        let capacity = self.allowed_overdraft_limit();
        if capacity <= 0 {
            return if self.balance < 0 { 1.0 } else { 0.0 };
        }
        let used = (-self.balance).max(0) as f64;
        (used / capacity as f64).clamp(0.0, 1.0)
    }

    /// Same measure as [`Agent::liquidity_pressure`], expressed in basis
    /// points (0-10_000) for integer-only callers such as the policy DSL.
    pub fn liquidity_pressure_bps(&self) -> i64 {
        let capacity = self.allowed_overdraft_limit();
        if capacity <= 0 {
            return if self.balance < 0 { 10_000 } else { 0 };
        }
        let used = (-self.balance).max(0);
        used.saturating_mul(10_000).checked_div(capacity).unwrap_or(10_000).clamp(0, 10_000)
    }

    /// Minimum balance this agent's policy tries to preserve
    pub fn liquidity_buffer(&self) -> i64 {
        self.liquidity_buffer
    }

    pub fn set_liquidity_buffer(&mut self, buffer: i64) {
        self.liquidity_buffer = buffer;
    }

    /// Internal queue (Queue 1) contents, in FIFO order
    pub fn outgoing_queue(&self) -> &[String] {
        &self.outgoing_queue
    }

    pub fn outgoing_queue_size(&self) -> usize {
        self.outgoing_queue.len()
    }

    /// Append a transaction ID to Queue 1
    pub fn queue_outgoing(&mut self, tx_id: String) {
        self.outgoing_queue.push(tx_id);
    }

    /// Remove a transaction ID from Queue 1 (no-op if absent)
    pub fn remove_from_queue(&mut self, tx_id: &str) {
        self.outgoing_queue.retain(|id| id != tx_id);
    }

    /// Transaction IDs this agent expects to receive
    pub fn incoming_expected(&self) -> &[String] {
        &self.incoming_expected
    }

    pub fn add_expected_inflow(&mut self, tx_id: String) {
        self.incoming_expected.push(tx_id);
    }

    pub fn remove_expected_inflow(&mut self, tx_id: &str) {
        self.incoming_expected.retain(|id| id != tx_id);
    }

    /// Currently posted collateral (i64 cents)
    pub fn posted_collateral(&self) -> i64 {
        self.collateral.posted()
    }

    /// Maximum collateral this agent may post
    pub fn max_collateral_capacity(&self) -> i64 {
        self.collateral.capacity()
    }

    /// Remaining headroom before hitting collateral capacity
    pub fn remaining_collateral_capacity(&self) -> i64 {
        self.collateral.remaining_capacity()
    }

    /// Directly set posted collateral (used when restoring from a snapshot
    /// or applying a validated ledger mutation computed by the caller).
    pub fn set_posted_collateral(&mut self, amount: i64) {
        self.collateral.set_posted(amount);
    }

    /// Set the unsecured overdraft cap.
    pub fn set_unsecured_cap(&mut self, amount: i64) {
        assert!(amount >= 0, "unsecured cap must be non-negative");
        self.credit_limit = amount;
    }

    /// Mutable access to the collateral ledger, for posting/withdrawing with
    /// full capacity-check and timer semantics.
    pub fn collateral_ledger_mut(&mut self) -> &mut CollateralLedger {
        &mut self.collateral
    }

    pub fn collateral_ledger(&self) -> &CollateralLedger {
        &self.collateral
    }

    pub fn collateral_haircut(&self) -> f64 {
        self.collateral_haircut
    }

    pub fn set_collateral_haircut(&mut self, haircut: f64) {
        self.collateral_haircut = haircut;
    }

    pub fn collateral_posted_at_tick(&self) -> Option<usize> {
        self.collateral_posted_at_tick
    }

    pub fn set_collateral_posted_at_tick(&mut self, tick: Option<usize>) {
        self.collateral_posted_at_tick = tick;
    }

    pub fn last_decision_tick(&self) -> Option<usize> {
        self.last_decision_tick
    }

    pub fn set_last_decision_tick(&mut self, tick: usize) {
        self.last_decision_tick = Some(tick);
    }

    /// Net liquidity gap for everything currently sitting in Queue 1: the sum
    /// of remaining amounts the agent owes minus what it expects to receive
    /// from Queue 2/RTGS-pending incoming transactions, looked up in `state`.
    ///
    /// A positive value means the agent would need that much additional
    /// liquidity to clear its entire Queue 1 right now.
    pub fn queue1_liquidity_gap(&self, state: &crate::models::state::SimulationState) -> i64 {
        let outgoing: i64 = self
            .outgoing_queue
            .iter()
            .filter_map(|tx_id| state.get_transaction(tx_id))
            .map(|tx| tx.remaining_amount())
            .sum();
        let incoming: i64 = self
            .incoming_expected
            .iter()
            .filter_map(|tx_id| state.get_transaction(tx_id))
            .map(|tx| tx.remaining_amount())
            .sum();
        outgoing - incoming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "credit_limit must be non-negative")]
    fn test_negative_credit_limit_panics() {
        Agent::new("BANK_A".to_string(), 1000000, -500000);
    }

    #[test]
    fn test_allowed_overdraft_limit_includes_collateral() {
        let mut agent = Agent::new("BANK_A".to_string(), 0, 100_000).with_collateral_capacity(50_000);
        assert_eq!(agent.allowed_overdraft_limit(), 100_000);

        agent
            .collateral_ledger_mut()
            .post(
                50_000,
                crate::models::collateral::CollateralReason::PreemptivePosting,
                0,
                None,
            )
            .unwrap();
        assert_eq!(agent.allowed_overdraft_limit(), 150_000);
    }

    #[test]
    fn test_adjust_balance_bypasses_checks() {
        let mut agent = Agent::new("BANK_A".to_string(), 0, 0);
        agent.adjust_balance(-1_000_000);
        assert_eq!(agent.balance(), -1_000_000);
    }

    #[test]
    fn test_queue_outgoing_and_remove() {
        let mut agent = Agent::new("BANK_A".to_string(), 0, 0);
        agent.queue_outgoing("tx1".to_string());
        agent.queue_outgoing("tx2".to_string());
        assert_eq!(agent.outgoing_queue_size(), 2);

        agent.remove_from_queue("tx1");
        assert_eq!(agent.outgoing_queue(), &["tx2".to_string()]);
    }

    #[test]
    fn test_liquidity_pressure_bounds() {
        let agent = Agent::new("BANK_A".to_string(), 0, 100_000);
        assert_eq!(agent.liquidity_pressure(), 0.0);

        let mut agent = Agent::new("BANK_A".to_string(), 0, 100_000);
        agent.adjust_balance(-100_000);
        assert_eq!(agent.liquidity_pressure(), 1.0);
    }
}
