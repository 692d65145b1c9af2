//! Transaction model
//!
//! Represents a payment between two agents. All money values are `i64`
//! cents; no floating point enters amount or settlement fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transaction status
///
/// Tracks the lifecycle of a payment through the system. `Overdue` is a
/// transient state that replaces whatever queue state preceded it (tracked
/// separately in `overdue_since_tick`) and resolves back into `Settled` or
/// `Dropped`. Legal transitions are enforced by [`Transaction::transition_to`]:
///
/// - `Pending -> Queued1`
/// - `Queued1 -> Queued2`
/// - `Queued1 -> Dropped`
/// - `Queued1 -> Split`
/// - `Queued{1,2} -> Overdue -> Settled`
/// - `Queued{1,2} -> Overdue -> Dropped`
/// - `Queued2 -> Settled`
///
/// Any other transition is a fatal `ConsistencyBug` at the orchestrator level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Transaction created but not yet admitted to Queue 1
    Pending,

    /// Sitting in the agent's internal Queue 1, awaiting a policy decision
    Queued1,

    /// Released by policy, sitting in the global RTGS Queue 2
    Queued2,

    /// Past its deadline while still unsettled; overlays whatever queue it
    /// was in (see `overdue_since_tick` for when)
    Overdue,

    /// Transaction fully settled
    Settled {
        /// Tick when final settlement occurred
        tick: usize,
    },

    /// Transaction dropped (e.g., past deadline, rejected)
    Dropped {
        /// Tick when transaction was dropped
        tick: usize,
    },

    /// Transaction replaced by split children; terminal like `Settled`/`Dropped`
    Split {
        /// IDs of the child transactions that replaced this one
        children: Vec<String>,
    },
}

/// Errors that can occur during transaction operations
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("Cannot partially settle indivisible transaction")]
    IndivisibleTransaction,

    #[error("Settlement amount {amount} exceeds remaining amount {remaining}")]
    AmountExceedsRemaining { amount: i64, remaining: i64 },

    #[error("Transaction already fully settled")]
    AlreadySettled,

    #[error("Cannot settle dropped transaction")]
    TransactionDropped,

    #[error("Settlement amount must be positive")]
    InvalidAmount,

    #[error("Illegal status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },
}

/// Represents a payment transaction between two agents
///
/// # Example
/// ```
/// use rtgs_sim_core::Transaction;
///
/// let tx = Transaction::new(
///     "BANK_A".to_string(),
///     "BANK_B".to_string(),
///     100000, // $1,000.00 in cents
///     10,     // arrival_tick
///     50,     // deadline_tick
/// ).with_priority(8).divisible();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier (UUID)
    id: String,

    /// Sender agent ID
    sender_id: String,

    /// Receiver agent ID
    receiver_id: String,

    /// Original transaction amount (i64 cents)
    amount: i64,

    /// Remaining amount to be settled (i64 cents)
    remaining_amount: i64,

    /// Tick when transaction arrived in system
    arrival_tick: usize,

    /// Tick by which transaction must be settled
    deadline_tick: usize,

    /// Current priority level (mutable via escalation or reprioritize decisions)
    priority: u8,

    /// Priority at arrival; never mutated once set
    original_priority: u8,

    /// Can the transaction be split into multiple parts?
    is_divisible: bool,

    /// Current status
    status: TransactionStatus,

    /// Parent transaction ID, if this transaction is a child of a split
    parent_id: Option<String>,

    /// Index of this transaction among its siblings, if it is a split child
    split_index: Option<u32>,

    /// Tick at which this transaction first became overdue, if ever
    overdue_since_tick: Option<usize>,

    /// Cumulative ticks spent sitting in Queue 1
    ticks_in_q1: usize,

    /// Cumulative ticks spent sitting in Queue 2
    ticks_in_q2: usize,
}

impl Transaction {
    /// Create a new transaction. Default priority is 5, not divisible.
    ///
    /// # Panics
    /// Panics if amount <= 0 or deadline <= arrival
    pub fn new(
        sender_id: String,
        receiver_id: String,
        amount: i64,
        arrival_tick: usize,
        deadline_tick: usize,
    ) -> Self {
        assert!(amount > 0, "amount must be positive");
        assert!(
            deadline_tick > arrival_tick,
            "deadline must be after arrival"
        );

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id,
            receiver_id,
            amount,
            remaining_amount: amount,
            arrival_tick,
            deadline_tick,
            priority: 5,
            original_priority: 5,
            is_divisible: false,
            status: TransactionStatus::Pending,
            parent_id: None,
            split_index: None,
            overdue_since_tick: None,
            ticks_in_q1: 0,
            ticks_in_q2: 0,
        }
    }

    /// Create a child transaction resulting from splitting `parent_id`.
    /// Inherits the parent's arrival/deadline; priority defaults to 5 and is
    /// typically overridden via `with_priority` immediately after.
    pub fn new_split(
        sender_id: String,
        receiver_id: String,
        amount: i64,
        arrival_tick: usize,
        deadline_tick: usize,
        parent_id: String,
        split_index: u32,
    ) -> Self {
        let mut tx = Self::new(sender_id, receiver_id, amount, arrival_tick, deadline_tick);
        tx.parent_id = Some(parent_id);
        tx.split_index = Some(split_index);
        tx
    }

    /// Reconstruct a transaction from a checkpoint snapshot.
    #[allow(clippy::too_many_arguments)]
    pub fn from_snapshot(
        id: String,
        sender_id: String,
        receiver_id: String,
        amount: i64,
        remaining_amount: i64,
        arrival_tick: usize,
        deadline_tick: usize,
        priority: u8,
        original_priority: u8,
        is_divisible: bool,
        status: TransactionStatus,
        parent_id: Option<String>,
        split_index: Option<u32>,
        overdue_since_tick: Option<usize>,
        ticks_in_q1: usize,
        ticks_in_q2: usize,
    ) -> Self {
        Self {
            id,
            sender_id,
            receiver_id,
            amount,
            remaining_amount,
            arrival_tick,
            deadline_tick,
            priority,
            original_priority,
            is_divisible,
            status,
            parent_id,
            split_index,
            overdue_since_tick,
            ticks_in_q1,
            ticks_in_q2,
        }
    }

    /// Set priority at construction (builder pattern). Also fixes
    /// `original_priority` to the same value, so this must be called before
    /// any escalation/reprioritization would matter.
    pub fn with_priority(mut self, priority: u8) -> Self {
        let capped = priority.min(10);
        self.priority = capped;
        self.original_priority = capped;
        self
    }

    /// Mark transaction as divisible (builder pattern)
    pub fn divisible(mut self) -> Self {
        self.is_divisible = true;
        self
    }

    /// Mutate current priority in place (e.g. via the priority escalator or
    /// a `ReleaseDecision::SubmitFull` priority override). Does not affect
    /// `original_priority`.
    pub fn set_priority(&mut self, priority: u8) {
        self.priority = priority.min(10);
    }

    /// Get transaction ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get sender agent ID
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Get receiver agent ID
    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    /// Get original transaction amount (i64 cents)
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Get remaining amount to be settled (i64 cents)
    pub fn remaining_amount(&self) -> i64 {
        self.remaining_amount
    }

    /// Get amount already settled (i64 cents)
    pub fn settled_amount(&self) -> i64 {
        self.amount - self.remaining_amount
    }

    /// Get arrival tick
    pub fn arrival_tick(&self) -> usize {
        self.arrival_tick
    }

    /// Get deadline tick
    pub fn deadline_tick(&self) -> usize {
        self.deadline_tick
    }

    /// Get current priority level
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Get priority as it was when the transaction arrived (never mutated)
    pub fn original_priority(&self) -> u8 {
        self.original_priority
    }

    /// Check if transaction is divisible
    pub fn is_divisible(&self) -> bool {
        self.is_divisible
    }

    /// Get current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Check if transaction is pending (no settlement activity yet)
    pub fn is_pending(&self) -> bool {
        matches!(self.status, TransactionStatus::Pending)
    }

    /// Check if transaction is fully settled
    pub fn is_fully_settled(&self) -> bool {
        self.remaining_amount == 0
    }

    /// Check if transaction is past its deadline
    pub fn is_past_deadline(&self, current_tick: usize) -> bool {
        current_tick > self.deadline_tick
    }

    /// Whether this transaction has ever been flagged overdue
    pub fn is_overdue(&self) -> bool {
        self.overdue_since_tick.is_some()
    }

    /// Tick at which this transaction first became overdue, if any
    pub fn overdue_since_tick(&self) -> Option<usize> {
        self.overdue_since_tick
    }

    /// Cumulative ticks spent sitting in Queue 1
    pub fn ticks_in_q1(&self) -> usize {
        self.ticks_in_q1
    }

    /// Cumulative ticks spent sitting in Queue 2
    pub fn ticks_in_q2(&self) -> usize {
        self.ticks_in_q2
    }

    /// Index of this transaction among its split siblings, if any
    pub fn split_index(&self) -> Option<u32> {
        self.split_index
    }

    /// Validate and apply a status transition. Returns
    /// `TransactionError::InvalidTransition` on any edge not in the documented
    /// state machine (see [`TransactionStatus`]); callers at the orchestrator
    /// level fold that into `SimulationError::ConsistencyBug`.
    pub fn transition_to(&mut self, new_status: TransactionStatus) -> Result<(), TransactionError> {
        use TransactionStatus::*;

        let legal = match (&self.status, &new_status) {
            (Pending, Queued1) => true,
            (Queued1, Queued2) => true,
            (Queued1, Dropped { .. }) => true,
            (Queued1, Split { .. }) => true,
            (Queued1, Overdue) | (Queued2, Overdue) => true,
            (Overdue, Settled { .. }) => true,
            (Overdue, Dropped { .. }) => true,
            // Direct-settlement entry points (`settlement::rtgs::try_settle`,
            // `settlement::rtgs::submit_transaction`) settle/drop a
            // freshly-admitted transaction without routing it through
            // Queue 1/Queue 2 bookkeeping, so Pending is also a valid origin.
            (Pending, Settled { .. }) => true,
            (Pending, Dropped { .. }) => true,
            (Queued2, Settled { .. }) => true,
            (Queued2, Dropped { .. }) => true,
            _ => false,
        };

        if !legal {
            return Err(TransactionError::InvalidTransition {
                from: self.status.clone(),
                to: new_status,
            });
        }

        self.status = new_status;
        Ok(())
    }

    /// Admit to Queue 1 from `Pending`.
    pub fn enter_queue1(&mut self) -> Result<(), TransactionError> {
        self.transition_to(TransactionStatus::Queued1)
    }

    /// Move from Queue 1 to the global RTGS Queue 2.
    pub fn enter_queue2(&mut self) -> Result<(), TransactionError> {
        self.transition_to(TransactionStatus::Queued2)
    }

    /// Advance the relevant queue-residency counter by one tick, based on
    /// current status. No-op if neither `Queued1` nor `Queued2`.
    pub fn tick_queue_residency(&mut self) {
        match self.status {
            TransactionStatus::Queued1 => self.ticks_in_q1 += 1,
            TransactionStatus::Queued2 => self.ticks_in_q2 += 1,
            _ => {}
        }
    }

    /// Flag the transaction overdue as of `tick`, if not already flagged and
    /// not yet fully settled or dropped. Overlays whatever queue state (Queue
    /// 1 or Queue 2) the transaction was in; `overdue_since_tick` preserves
    /// when it happened for cost accrual and escalation.
    pub fn mark_overdue(&mut self, tick: usize) -> Result<(), TransactionError> {
        if self.is_fully_settled() {
            return Err(TransactionError::AlreadySettled);
        }
        if matches!(self.status, TransactionStatus::Dropped { .. }) {
            return Err(TransactionError::TransactionDropped);
        }
        if self.overdue_since_tick.is_none() {
            self.overdue_since_tick = Some(tick);
        }
        if matches!(
            self.status,
            TransactionStatus::Queued1 | TransactionStatus::Queued2
        ) {
            self.transition_to(TransactionStatus::Overdue)?;
        }
        Ok(())
    }

    /// Whether this transaction is a child produced by a split
    pub fn is_split(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Parent transaction ID, if this is a split child
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Settle transaction (full or partial). Only transitions `status` to
    /// `Settled` once `remaining_amount` reaches zero; a partial settlement
    /// leaves `status` as whatever queue/overdue state it already was in.
    pub fn settle(&mut self, amount: i64, tick: usize) -> Result<(), TransactionError> {
        if amount <= 0 {
            return Err(TransactionError::InvalidAmount);
        }

        if self.remaining_amount == 0 {
            return Err(TransactionError::AlreadySettled);
        }

        if matches!(self.status, TransactionStatus::Dropped { .. }) {
            return Err(TransactionError::TransactionDropped);
        }

        if amount > self.remaining_amount {
            return Err(TransactionError::AmountExceedsRemaining {
                amount,
                remaining: self.remaining_amount,
            });
        }

        if amount < self.remaining_amount && !self.is_divisible {
            return Err(TransactionError::IndivisibleTransaction);
        }

        self.remaining_amount -= amount;

        if self.remaining_amount == 0 {
            self.transition_to(TransactionStatus::Settled { tick })?;
        }

        Ok(())
    }

    /// Drop transaction (e.g., past deadline, rejected)
    pub fn drop_transaction(&mut self, tick: usize) -> Result<(), TransactionError> {
        self.transition_to(TransactionStatus::Dropped { tick })
    }

    /// Replace this transaction with its split children, recording them on
    /// the now-terminal `Split` status.
    pub fn mark_split(&mut self, children: Vec<String>) -> Result<(), TransactionError> {
        self.transition_to(TransactionStatus::Split { children })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_capped_at_10() {
        let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 10, 50)
            .with_priority(255);

        assert_eq!(tx.priority(), 10);
        assert_eq!(tx.original_priority(), 10);
    }

    #[test]
    fn test_set_priority_leaves_original_priority_untouched() {
        let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 0, 50)
            .with_priority(3);

        tx.set_priority(9);
        assert_eq!(tx.priority(), 9);
        assert_eq!(tx.original_priority(), 3);
    }

    #[test]
    fn test_mark_overdue_is_idempotent_on_first_tick() {
        let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 0, 50);
        tx.enter_queue1().unwrap();
        tx.mark_overdue(51).unwrap();
        tx.mark_overdue(60).unwrap();
        assert_eq!(tx.overdue_since_tick(), Some(51));
        assert_eq!(tx.status(), &TransactionStatus::Overdue);
    }

    #[test]
    fn test_mark_overdue_fails_once_settled() {
        let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 0, 50);
        tx.enter_queue1().unwrap();
        tx.enter_queue2().unwrap();
        tx.settle(100000, 10).unwrap();
        assert_eq!(tx.mark_overdue(60), Err(TransactionError::AlreadySettled));
    }

    #[test]
    fn test_overdue_resolves_to_settled() {
        let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 0, 50);
        tx.enter_queue1().unwrap();
        tx.enter_queue2().unwrap();
        tx.mark_overdue(51).unwrap();
        tx.settle(100000, 60).unwrap();
        assert_eq!(
            tx.status(),
            &TransactionStatus::Settled { tick: 60 }
        );
    }

    #[test]
    fn test_split_child_tracks_parent() {
        let parent = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 0, 50);
        let child = Transaction::new_split(
            "BANK_A".to_string(),
            "BANK_B".to_string(),
            40000,
            0,
            50,
            parent.id().to_string(),
            0,
        );
        assert!(child.is_split());
        assert_eq!(child.parent_id(), Some(parent.id()));
        assert_eq!(child.split_index(), Some(0));
        assert!(!parent.is_split());
    }

    #[test]
    fn test_mark_split_records_children() {
        let mut parent = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 0, 50);
        parent.enter_queue1().unwrap();
        parent
            .mark_split(vec!["child-1".to_string(), "child-2".to_string()])
            .unwrap();
        assert_eq!(
            parent.status(),
            &TransactionStatus::Split {
                children: vec!["child-1".to_string(), "child-2".to_string()]
            }
        );
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 0, 50);
        let err = tx.enter_queue2().unwrap_err();
        assert!(matches!(err, TransactionError::InvalidTransition { .. }));
    }

    #[test]
    fn test_ticks_in_queue_only_accrue_while_queued() {
        let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100000, 0, 50);
        tx.tick_queue_residency();
        assert_eq!(tx.ticks_in_q1(), 0);

        tx.enter_queue1().unwrap();
        tx.tick_queue_residency();
        tx.tick_queue_residency();
        assert_eq!(tx.ticks_in_q1(), 2);
        assert_eq!(tx.ticks_in_q2(), 0);

        tx.enter_queue2().unwrap();
        tx.tick_queue_residency();
        assert_eq!(tx.ticks_in_q1(), 2);
        assert_eq!(tx.ticks_in_q2(), 1);
    }
}
