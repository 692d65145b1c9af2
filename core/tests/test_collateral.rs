//! Integration tests for the collateral ledger and its interaction with
//! agent overdraft headroom (§4.7, §8 property on collateral bound: posted
//! collateral never exceeds capacity, never goes negative).

use rtgs_sim_core::{Agent, CollateralReason};

#[test]
fn posting_beyond_capacity_is_rejected_and_leaves_ledger_unchanged() {
    let mut agent = Agent::new("BANK_A".to_string(), 0, 0).with_collateral_capacity(100_000);
    agent
        .collateral_ledger_mut()
        .post(60_000, CollateralReason::PreemptivePosting, 0, None)
        .unwrap();

    let err = agent
        .collateral_ledger_mut()
        .post(50_000, CollateralReason::PreemptivePosting, 1, None)
        .unwrap_err();
    assert_eq!(
        err,
        rtgs_sim_core::models::collateral::CollateralError::CapacityExceeded {
            amount: 50_000,
            posted: 60_000,
            capacity: 100_000,
        }
    );
    assert_eq!(agent.posted_collateral(), 60_000);
}

#[test]
fn posted_collateral_widens_allowed_overdraft_and_backed_liquidity() {
    let mut agent = Agent::new("BANK_A".to_string(), 0, 10_000).with_collateral_capacity(50_000);
    assert_eq!(agent.allowed_overdraft_limit(), 10_000);
    assert_eq!(agent.backed_liquidity(), 10_000);

    agent
        .collateral_ledger_mut()
        .post(50_000, CollateralReason::UrgentLiquidityNeed, 0, None)
        .unwrap();

    assert_eq!(agent.allowed_overdraft_limit(), 60_000);
    assert_eq!(agent.backed_liquidity(), 60_000);
    assert!(agent.can_pay(60_000));
    assert!(!agent.can_pay(60_001));
}

#[test]
fn withdraw_is_capped_at_whatever_is_currently_posted() {
    let mut agent = Agent::new("BANK_A".to_string(), 0, 0).with_collateral_capacity(100_000);
    agent
        .collateral_ledger_mut()
        .post(30_000, CollateralReason::PreemptivePosting, 0, None)
        .unwrap();

    let withdrawn = agent.collateral_ledger_mut().withdraw(100_000);
    assert_eq!(withdrawn, 30_000);
    assert_eq!(agent.posted_collateral(), 0);

    // Withdrawing again when nothing is posted withdraws nothing.
    assert_eq!(agent.collateral_ledger_mut().withdraw(1), 0);
}

#[test]
fn auto_withdraw_timer_fires_exactly_on_its_scheduled_tick() {
    let mut agent = Agent::new("BANK_A".to_string(), 0, 0).with_collateral_capacity(100_000);
    agent
        .collateral_ledger_mut()
        .post(40_000, CollateralReason::DeadlineEmergency, 5, Some(10))
        .unwrap();

    assert!(agent.collateral_ledger_mut().fire_timers(14).is_empty());
    assert_eq!(agent.posted_collateral(), 40_000);

    let fired = agent.collateral_ledger_mut().fire_timers(15);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, 40_000);
    assert_eq!(fired[0].1, CollateralReason::DeadlineEmergency);
    assert_eq!(fired[0].2, 5);
    assert_eq!(agent.posted_collateral(), 0);

    // Firing again for the same tick is a no-op; the timer was consumed.
    assert!(agent.collateral_ledger_mut().fire_timers(15).is_empty());
}

#[test]
fn timer_withdrawal_is_capped_by_a_prior_manual_withdrawal() {
    let mut agent = Agent::new("BANK_A".to_string(), 0, 0).with_collateral_capacity(100_000);
    agent
        .collateral_ledger_mut()
        .post(40_000, CollateralReason::PreemptivePosting, 0, Some(5))
        .unwrap();

    // Manual withdrawal before the timer fires reduces what's left.
    agent.collateral_ledger_mut().withdraw(25_000);
    assert_eq!(agent.posted_collateral(), 15_000);

    let fired = agent.collateral_ledger_mut().fire_timers(5);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, 15_000);
    assert_eq!(agent.posted_collateral(), 0);
}

#[test]
fn capacity_shrinking_below_posted_clamps_posted_down() {
    let mut agent = Agent::new("BANK_A".to_string(), 0, 0).with_collateral_capacity(100_000);
    agent
        .collateral_ledger_mut()
        .post(80_000, CollateralReason::PreemptivePosting, 0, None)
        .unwrap();

    agent.collateral_ledger_mut().set_capacity(50_000);
    assert_eq!(agent.posted_collateral(), 50_000);
}
