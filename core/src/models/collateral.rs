//! Collateral ledger
//!
//! Tracks posted collateral per agent, along with auto-withdraw timers.
//! Collateral increases an agent's effective overdraft headroom beyond its
//! unsecured cap and carries an opportunity cost accrued by the cost engine.

use serde::{Deserialize, Serialize};

/// Why collateral was posted or withdrawn.
///
/// Mirrors the decision vocabulary a policy can express via
/// `CollateralDecision` in the policy evaluator, plus the ledger's own
/// automatic reasons (timer-driven withdrawals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralReason {
    /// Urgent transactions need liquidity immediately
    UrgentLiquidityNeed,
    /// Preemptive posting to prepare for upcoming liquidity needs
    PreemptivePosting,
    /// Liquidity has been restored, no longer need collateral
    LiquidityRestored,
    /// End-of-day cleanup (withdraw unused collateral)
    EndOfDayCleanup,
    /// Emergency posting due to imminent deadline
    DeadlineEmergency,
    /// Optimizing cost trade-offs
    CostOptimization,
    /// Custom policy-specific reason
    Custom(String),
}

impl std::fmt::Display for CollateralReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollateralReason::UrgentLiquidityNeed => write!(f, "urgent_liquidity_need"),
            CollateralReason::PreemptivePosting => write!(f, "preemptive_posting"),
            CollateralReason::LiquidityRestored => write!(f, "liquidity_restored"),
            CollateralReason::EndOfDayCleanup => write!(f, "end_of_day_cleanup"),
            CollateralReason::DeadlineEmergency => write!(f, "deadline_emergency"),
            CollateralReason::CostOptimization => write!(f, "cost_optimization"),
            CollateralReason::Custom(s) => write!(f, "{}", s),
        }
    }
}

/// The action a collateral ledger mutation represents, used by `CollateralEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralAction {
    /// Collateral was posted (increased)
    Post,
    /// Collateral was withdrawn (decreased) by explicit policy decision
    Withdraw,
    /// Collateral was withdrawn automatically by an expiring timer
    TimerWithdraw,
}

/// Which side of a tick the collateral evaluation ran on.
///
/// The strategic tree runs before payment decisions; the end-of-tick tree
/// (optional) runs after. Kept on `CollateralEvent` for replay/debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralLayer {
    Strategic,
    EndOfTick,
    /// Automatic ledger action not driven by a policy tree (timer firing)
    Automatic,
}

/// A single collateral ledger mutation, suitable for event logging/replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralEvent {
    pub tick: usize,
    pub agent_id: String,
    pub action: CollateralAction,
    pub layer: CollateralLayer,
    pub amount: i64,
    pub reason: CollateralReason,
    pub new_total: i64,
}

/// An auto-withdraw timer attached to a collateral posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralTimer {
    /// Amount posted when the timer was created
    pub amount: i64,
    /// Reason given for the original posting
    pub original_reason: CollateralReason,
    /// Tick at which the posting occurred
    pub posted_at_tick: usize,
    /// Tick at which this timer should fire
    pub auto_withdraw_at_tick: usize,
}

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollateralError {
    #[error("posting {amount} would exceed capacity {capacity} (currently posted {posted})")]
    CapacityExceeded {
        amount: i64,
        posted: i64,
        capacity: i64,
    },
}

/// Per-agent posted-collateral ledger with auto-withdraw timer support.
///
/// Invariant: `0 <= posted <= capacity` at all times; no withdrawal (manual
/// or timer-driven) ever drives `posted` negative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollateralLedger {
    posted: i64,
    capacity: i64,
    timers: Vec<CollateralTimer>,
}

impl CollateralLedger {
    pub fn new(capacity: i64) -> Self {
        assert!(capacity >= 0, "collateral capacity must be non-negative");
        Self {
            posted: 0,
            capacity,
            timers: Vec::new(),
        }
    }

    pub fn with_posted(capacity: i64, posted: i64) -> Self {
        assert!(capacity >= 0, "collateral capacity must be non-negative");
        assert!(
            posted >= 0 && posted <= capacity,
            "posted collateral must be within [0, capacity]"
        );
        Self {
            posted,
            capacity,
            timers: Vec::new(),
        }
    }

    pub fn posted(&self) -> i64 {
        self.posted
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    pub fn remaining_capacity(&self) -> i64 {
        self.capacity - self.posted
    }

    pub fn set_capacity(&mut self, capacity: i64) {
        assert!(capacity >= 0, "collateral capacity must be non-negative");
        self.capacity = capacity;
        if self.posted > self.capacity {
            self.posted = self.capacity;
        }
    }

    /// Directly set the posted amount (used when restoring from a snapshot).
    pub fn set_posted(&mut self, posted: i64) {
        assert!(
            posted >= 0 && posted <= self.capacity,
            "posted collateral must be within [0, capacity]"
        );
        self.posted = posted;
    }

    /// Post additional collateral. Fails if it would exceed capacity.
    pub fn post(
        &mut self,
        amount: i64,
        reason: CollateralReason,
        tick: usize,
        auto_withdraw_after: Option<usize>,
    ) -> Result<(), CollateralError> {
        assert!(amount >= 0, "post amount must be non-negative");
        if self.posted + amount > self.capacity {
            return Err(CollateralError::CapacityExceeded {
                amount,
                posted: self.posted,
                capacity: self.capacity,
            });
        }
        self.posted += amount;
        if let Some(after) = auto_withdraw_after {
            self.timers.push(CollateralTimer {
                amount,
                original_reason: reason,
                posted_at_tick: tick,
                auto_withdraw_at_tick: tick + after,
            });
        }
        Ok(())
    }

    /// Withdraw collateral, capped at what's currently posted. Returns the
    /// amount actually withdrawn.
    pub fn withdraw(&mut self, amount: i64) -> i64 {
        assert!(amount >= 0, "withdraw amount must be non-negative");
        let actual = amount.min(self.posted);
        self.posted -= actual;
        actual
    }

    /// Fire all timers scheduled for `tick`, in posting order. Each timer
    /// withdraws the lesser of its posted amount and whatever collateral
    /// remains (a prior manual withdrawal may have already reduced it).
    /// Returns `(amount_withdrawn, original_reason, posted_at_tick)` for
    /// each timer that fired, including zero-amount firings.
    pub fn fire_timers(&mut self, tick: usize) -> Vec<(i64, CollateralReason, usize)> {
        let mut fired = Vec::new();
        let mut remaining = Vec::with_capacity(self.timers.len());
        for timer in std::mem::take(&mut self.timers) {
            if timer.auto_withdraw_at_tick == tick {
                let actual = self.withdraw(timer.amount);
                fired.push((actual, timer.original_reason, timer.posted_at_tick));
            } else {
                remaining.push(timer);
            }
        }
        self.timers = remaining;
        fired
    }

    pub fn pending_timers(&self) -> &[CollateralTimer] {
        &self.timers
    }

    /// Directly restore pending timers (used when restoring from a snapshot).
    pub fn set_timers(&mut self, timers: Vec<CollateralTimer>) {
        self.timers = timers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_within_capacity() {
        let mut ledger = CollateralLedger::new(100_000);
        ledger
            .post(50_000, CollateralReason::PreemptivePosting, 0, None)
            .unwrap();
        assert_eq!(ledger.posted(), 50_000);
        assert_eq!(ledger.remaining_capacity(), 50_000);
    }

    #[test]
    fn test_post_beyond_capacity_fails() {
        let mut ledger = CollateralLedger::new(10_000);
        let err = ledger
            .post(20_000, CollateralReason::PreemptivePosting, 0, None)
            .unwrap_err();
        assert_eq!(
            err,
            CollateralError::CapacityExceeded {
                amount: 20_000,
                posted: 0,
                capacity: 10_000,
            }
        );
    }

    #[test]
    fn test_withdraw_capped_at_posted() {
        let mut ledger = CollateralLedger::new(100_000);
        ledger
            .post(30_000, CollateralReason::PreemptivePosting, 0, None)
            .unwrap();
        let actual = ledger.withdraw(50_000);
        assert_eq!(actual, 30_000);
        assert_eq!(ledger.posted(), 0);
    }

    #[test]
    fn test_auto_withdraw_timer_fires_and_respects_manual_withdrawal() {
        let mut ledger = CollateralLedger::new(100_000);
        ledger
            .post(
                50_000,
                CollateralReason::Custom("test".to_string()),
                0,
                Some(5),
            )
            .unwrap();

        // Manual withdrawal at tick 2 reduces what's available
        ledger.withdraw(30_000);
        assert_eq!(ledger.posted(), 20_000);

        // Timer fires at tick 5, capped at remaining 20k (not the original 50k)
        let fired = ledger.fire_timers(5);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, 20_000);
        assert_eq!(ledger.posted(), 0);
    }

    #[test]
    fn test_timer_fires_in_posting_order_same_tick() {
        let mut ledger = CollateralLedger::new(100_000);
        ledger
            .post(10_000, CollateralReason::Custom("first".to_string()), 0, Some(3))
            .unwrap();
        ledger
            .post(20_000, CollateralReason::Custom("second".to_string()), 1, Some(2))
            .unwrap();

        let fired = ledger.fire_timers(3);
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].1, CollateralReason::Custom("first".to_string()));
        assert_eq!(fired[1].1, CollateralReason::Custom("second".to_string()));
    }
}
