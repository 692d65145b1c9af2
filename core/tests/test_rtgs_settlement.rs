//! Integration tests for immediate RTGS settlement vs. queuing (§4.6, §8
//! properties: money conservation, overdraft bound).

use rtgs_sim_core::settlement::{process_queue, submit_transaction, try_settle, SubmissionResult};
use rtgs_sim_core::{Agent, SimulationState, Transaction};

fn two_agent_state(balance_a: i64, credit_a: i64, balance_b: i64) -> SimulationState {
    SimulationState::new(vec![
        Agent::new("BANK_A".to_string(), balance_a, credit_a),
        Agent::new("BANK_B".to_string(), balance_b, 0),
    ])
}

#[test]
fn sufficient_liquidity_settles_immediately_and_conserves_total_balance() {
    let mut sender = Agent::new("BANK_A".to_string(), 1_000_000, 0);
    let mut receiver = Agent::new("BANK_B".to_string(), 0, 0);
    let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);

    let total_before = sender.balance() + receiver.balance();
    try_settle(&mut sender, &mut receiver, &mut tx, 5).unwrap();

    assert_eq!(sender.balance(), 500_000);
    assert_eq!(receiver.balance(), 500_000);
    assert_eq!(sender.balance() + receiver.balance(), total_before);
    assert!(tx.is_fully_settled());
}

#[test]
fn insufficient_liquidity_leaves_state_completely_unchanged() {
    let mut sender = Agent::new("BANK_A".to_string(), 100_000, 0);
    let mut receiver = Agent::new("BANK_B".to_string(), 0, 0);
    let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);

    let result = try_settle(&mut sender, &mut receiver, &mut tx, 5);
    assert!(result.is_err());
    assert_eq!(sender.balance(), 100_000);
    assert_eq!(receiver.balance(), 0);
    assert!(tx.is_pending());
}

#[test]
fn settling_an_already_settled_transaction_is_rejected() {
    let mut sender = Agent::new("BANK_A".to_string(), 1_000_000, 0);
    let mut receiver = Agent::new("BANK_B".to_string(), 0, 0);
    let mut tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);

    try_settle(&mut sender, &mut receiver, &mut tx, 5).unwrap();
    let err = try_settle(&mut sender, &mut receiver, &mut tx, 6);
    assert!(err.is_err());
    // No double-debit occurred.
    assert_eq!(sender.balance(), 500_000);
}

#[test]
fn submit_transaction_settles_immediately_when_liquid() {
    let mut state = two_agent_state(1_000_000, 0, 0);
    let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);

    let result = submit_transaction(&mut state, tx, 5).unwrap();
    assert!(matches!(result, SubmissionResult::SettledImmediately { tick: 5 }));
    assert_eq!(state.get_agent("BANK_A").unwrap().balance(), 500_000);
    assert_eq!(state.get_agent("BANK_B").unwrap().balance(), 500_000);
    assert_eq!(state.queue_size(), 0);
}

#[test]
fn submit_transaction_queues_when_illiquid() {
    let mut state = two_agent_state(100_000, 0, 0);
    let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);

    let result = submit_transaction(&mut state, tx, 5).unwrap();
    assert!(matches!(result, SubmissionResult::Queued { position: 1 }));
    assert_eq!(state.queue_size(), 1);
    assert_eq!(state.get_agent("BANK_A").unwrap().balance(), 100_000);
}

#[test]
fn process_queue_settles_once_liquidity_arrives() {
    let mut state = two_agent_state(100_000, 0, 0);
    let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);
    submit_transaction(&mut state, tx, 5).unwrap();

    state.get_agent_mut("BANK_A").unwrap().credit(500_000);

    let result = process_queue(&mut state, 6, false);
    assert_eq!(result.settled_count, 1);
    assert_eq!(result.settled_value, 500_000);
    assert_eq!(result.remaining_queue_size, 0);
    assert_eq!(result.dropped_count, 0);
}

#[test]
fn process_queue_drops_transactions_past_their_deadline() {
    let mut state = two_agent_state(0, 0, 0);
    let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 10);
    let tx_id = tx.id().to_string();
    submit_transaction(&mut state, tx, 0).unwrap();

    let result = process_queue(&mut state, 11, false);
    assert_eq!(result.dropped_count, 1);
    assert_eq!(result.settled_count, 0);
    assert!(state.get_transaction(&tx_id).unwrap().is_past_deadline(11));
}

#[test]
fn process_queue_preserves_fifo_order_for_still_illiquid_transactions() {
    let mut state = two_agent_state(0, 0, 0);
    let tx_a = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);
    let tx_b = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 300_000, 0, 100);
    let id_a = tx_a.id().to_string();
    let id_b = tx_b.id().to_string();
    submit_transaction(&mut state, tx_a, 0).unwrap();
    submit_transaction(&mut state, tx_b, 0).unwrap();

    let result = process_queue(&mut state, 1, false);
    assert_eq!(result.settled_count, 0);
    assert_eq!(result.remaining_queue_size, 2);
    assert_eq!(state.rtgs_queue(), &vec![id_a, id_b]);
}
