//! Integration tests for the LSM bilateral-offset and cycle-settlement engine
//! (§4.10, §8 property on LSM atomicity: a cycle either settles in full or
//! not at all, and conserves the sum of balances).

use rtgs_sim_core::settlement::lsm::{bilateral_offset, detect_cycles, run_lsm_pass, settle_cycle, LsmConfig};
use rtgs_sim_core::{Agent, SimulationState, Transaction};
use std::collections::BTreeMap;

fn queue_tx(state: &mut SimulationState, sender: &str, receiver: &str, amount: i64) -> String {
    let tx = Transaction::new(sender.to_string(), receiver.to_string(), amount, 0, 1000);
    let id = tx.id().to_string();
    state.add_transaction(tx);
    state.queue_transaction(id.clone());
    id
}

fn sum_balances(state: &SimulationState, ids: &[&str]) -> i64 {
    ids.iter()
        .map(|id| state.get_agent(id).unwrap().balance())
        .sum()
}

#[test]
fn bilateral_offset_settles_both_legs_needing_only_the_net_amount() {
    // A owes B 500k, B owes A 300k. Net liquidity needed is 200k (A -> B).
    let mut state = SimulationState::new(vec![
        Agent::new("BANK_A".to_string(), 200_000, 0),
        Agent::new("BANK_B".to_string(), 0, 0),
    ]);
    queue_tx(&mut state, "BANK_A", "BANK_B", 500_000);
    queue_tx(&mut state, "BANK_B", "BANK_A", 300_000);

    let total_before = sum_balances(&state, &["BANK_A", "BANK_B"]);
    let result = bilateral_offset(&mut state, 5);

    assert_eq!(result.pairs_found, 1);
    assert_eq!(result.settlements_count, 2);
    assert_eq!(result.offset_value, 300_000);
    assert!(state.rtgs_queue().is_empty());

    assert_eq!(state.get_agent("BANK_A").unwrap().balance(), 0);
    assert_eq!(state.get_agent("BANK_B").unwrap().balance(), 200_000);
    assert_eq!(sum_balances(&state, &["BANK_A", "BANK_B"]), total_before);
}

#[test]
fn bilateral_offset_is_a_no_op_when_net_sender_cannot_cover_the_net_amount() {
    let mut state = SimulationState::new(vec![
        Agent::new("BANK_A".to_string(), 100_000, 0),
        Agent::new("BANK_B".to_string(), 0, 0),
    ]);
    queue_tx(&mut state, "BANK_A", "BANK_B", 500_000);
    queue_tx(&mut state, "BANK_B", "BANK_A", 300_000);

    let result = bilateral_offset(&mut state, 5);
    assert_eq!(result.settlements_count, 0);
    assert_eq!(state.rtgs_queue().len(), 2);
    assert_eq!(state.get_agent("BANK_A").unwrap().balance(), 100_000);
}

#[test]
fn bilateral_offset_ignores_one_directional_flow() {
    let mut state = SimulationState::new(vec![
        Agent::new("BANK_A".to_string(), 1_000_000, 0),
        Agent::new("BANK_B".to_string(), 0, 0),
    ]);
    queue_tx(&mut state, "BANK_A", "BANK_B", 500_000);

    let result = bilateral_offset(&mut state, 5);
    assert_eq!(result.pairs_found, 0);
    assert_eq!(result.settlements_count, 0);
    assert_eq!(state.rtgs_queue().len(), 1);
}

#[test]
fn three_agent_cycle_with_unequal_amounts_settles_at_full_value() {
    // A->B 500k, B->C 800k, C->A 700k
    // Net: A = -500k + 700k = +200k, B = -800k + 500k = -300k, C = -700k + 800k = +100k
    let mut state = SimulationState::new(vec![
        Agent::new("BANK_A".to_string(), 0, 0),
        Agent::new("BANK_B".to_string(), 300_000, 0),
        Agent::new("BANK_C".to_string(), 0, 0),
    ]);
    let tx_ab = queue_tx(&mut state, "BANK_A", "BANK_B", 500_000);
    let tx_bc = queue_tx(&mut state, "BANK_B", "BANK_C", 800_000);
    let tx_ca = queue_tx(&mut state, "BANK_C", "BANK_A", 700_000);

    let total_before = sum_balances(&state, &["BANK_A", "BANK_B", "BANK_C"]);

    let cycles = detect_cycles(&state, 4);
    assert_eq!(cycles.len(), 1);
    let cycle = &cycles[0];
    assert_eq!(cycle.total_value, 2_000_000);

    let mut to_remove: BTreeMap<String, ()> = BTreeMap::new();
    let result = settle_cycle(&mut state, cycle, 10, &mut to_remove).unwrap();

    assert_eq!(result.settled_value, 2_000_000);
    assert_eq!(result.transactions_affected, 3);
    assert_eq!(*result.net_positions.get("BANK_A").unwrap(), 200_000);
    assert_eq!(*result.net_positions.get("BANK_B").unwrap(), -300_000);
    assert_eq!(*result.net_positions.get("BANK_C").unwrap(), 100_000);

    for id in [&tx_ab, &tx_bc, &tx_ca] {
        to_remove.insert(id.clone(), ());
    }
    state.rtgs_queue_mut().retain(|id| !to_remove.contains_key(id));

    assert_eq!(state.get_agent("BANK_A").unwrap().balance(), 200_000);
    assert_eq!(state.get_agent("BANK_B").unwrap().balance(), 0);
    assert_eq!(state.get_agent("BANK_C").unwrap().balance(), 100_000);
    assert_eq!(sum_balances(&state, &["BANK_A", "BANK_B", "BANK_C"]), total_before);
    assert!(state.get_transaction(&tx_ab).unwrap().is_fully_settled());
}

#[test]
fn cycle_settlement_is_rejected_atomically_when_the_net_payer_cannot_cover_it() {
    let mut state = SimulationState::new(vec![
        Agent::new("BANK_A".to_string(), 0, 0),
        Agent::new("BANK_B".to_string(), 0, 0), // cannot cover the 300k net outflow
        Agent::new("BANK_C".to_string(), 0, 0),
    ]);
    queue_tx(&mut state, "BANK_A", "BANK_B", 500_000);
    queue_tx(&mut state, "BANK_B", "BANK_C", 800_000);
    queue_tx(&mut state, "BANK_C", "BANK_A", 700_000);

    let cycles = detect_cycles(&state, 4);
    assert_eq!(cycles.len(), 1);

    let mut to_remove: BTreeMap<String, ()> = BTreeMap::new();
    let result = settle_cycle(&mut state, &cycles[0], 10, &mut to_remove);
    assert!(result.is_err());

    // Nothing settled: all three transactions remain pending, unchanged.
    for id in &cycles[0].transactions {
        assert!(state.get_transaction(id).unwrap().is_pending());
    }
    assert_eq!(state.get_agent("BANK_A").unwrap().balance(), 0);
    assert_eq!(state.get_agent("BANK_B").unwrap().balance(), 0);
    assert_eq!(state.get_agent("BANK_C").unwrap().balance(), 0);
}

#[test]
fn run_lsm_pass_drains_a_bilateral_pair_and_reports_the_offset() {
    let mut state = SimulationState::new(vec![
        Agent::new("BANK_A".to_string(), 200_000, 0),
        Agent::new("BANK_B".to_string(), 0, 0),
    ]);
    queue_tx(&mut state, "BANK_A", "BANK_B", 500_000);
    queue_tx(&mut state, "BANK_B", "BANK_A", 300_000);

    let config = LsmConfig::default();
    let result = run_lsm_pass(&mut state, &config, 5, 20, false);

    assert_eq!(result.bilateral_offsets, 1);
    assert_eq!(result.final_queue_size, 0);
    assert!(result.total_settled_value >= 800_000);
    assert!(!result.replay_events.is_empty());
}
