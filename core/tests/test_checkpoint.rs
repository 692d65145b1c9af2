//! Snapshot / restore round-trip tests (§8 property 9).

mod common;
use common::*;

use rtgs_sim_core::orchestrator::Orchestrator;

#[test]
fn restore_yields_identical_state_to_a_live_continuation() {
    let config = two_bank_config_with_arrivals(111);

    let mut live = Orchestrator::new(config.clone()).unwrap();
    for _ in 0..20 {
        live.tick().unwrap();
    }

    let snapshot = live.snapshot(&config).unwrap();
    let mut restored = Orchestrator::restore(snapshot, config.clone()).unwrap();

    assert_eq!(restored.current_tick(), live.current_tick());
    assert_eq!(restored.state().num_agents(), live.state().num_agents());
    for agent_id in live.state().get_all_agent_ids() {
        assert_eq!(
            restored.state().get_agent(&agent_id).unwrap().balance(),
            live.state().get_agent(&agent_id).unwrap().balance(),
        );
    }

    // Continuing both from the same point must produce identical future
    // ticks, not just identical state at the snapshot boundary.
    for _ in 0..20 {
        let live_result = live.tick().unwrap();
        let restored_result = restored.tick().unwrap();
        assert_eq!(live_result.num_arrivals, restored_result.num_arrivals);
        assert_eq!(live_result.num_settlements, restored_result.num_settlements);
        assert_eq!(
            live_result.total_cost_delta,
            restored_result.total_cost_delta
        );
    }

    for agent_id in live.state().get_all_agent_ids() {
        assert_eq!(
            restored.state().get_agent(&agent_id).unwrap().balance(),
            live.state().get_agent(&agent_id).unwrap().balance(),
        );
        assert_eq!(
            restored.get_costs(&agent_id).unwrap().total(),
            live.get_costs(&agent_id).unwrap().total(),
        );
    }
}

#[test]
fn restore_rejects_a_snapshot_taken_under_a_different_config() {
    let config_a = two_bank_config_with_arrivals(1);
    let mut config_b = two_bank_config_with_arrivals(1);
    config_b.rng_seed = 2;

    let mut orchestrator = Orchestrator::new(config_a.clone()).unwrap();
    orchestrator.tick().unwrap();
    let snapshot = orchestrator.snapshot(&config_a).unwrap();

    let result = Orchestrator::restore(snapshot, config_b);
    assert!(result.is_err());
}

#[test]
fn snapshot_preserves_in_flight_queue1_and_queue2_contents() {
    let config = single_agent_pair_config(0, 0);
    let mut orchestrator = Orchestrator::new(config.clone()).unwrap();

    // Submit a transaction that cannot settle immediately (sender has no
    // liquidity), leaving it parked in Queue 2.
    orchestrator
        .submit_transaction("BANK_A", "BANK_B", 500_00, 10, 5, false)
        .unwrap();
    orchestrator.tick().unwrap();

    let queue2_before = orchestrator.get_rtgs_queue_contents();
    assert!(!queue2_before.is_empty());

    let snapshot = orchestrator.snapshot(&config).unwrap();
    let restored = Orchestrator::restore(snapshot, config).unwrap();

    assert_eq!(restored.get_rtgs_queue_contents(), queue2_before);
}
