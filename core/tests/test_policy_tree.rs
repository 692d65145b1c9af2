//! Integration tests for the JSON policy decision-tree DSL (§5, §8 property
//! about policy evaluation never panicking on malformed input).

use rtgs_sim_core::orchestrator::CostRates;
use rtgs_sim_core::policy::{CashManagerPolicy, ReleaseDecision};
use rtgs_sim_core::{Agent, SimulationState, Transaction};

fn cost_rates() -> CostRates {
    CostRates::default()
}

fn release_if_sufficient_balance_tree() -> String {
    r#"{
        "version": "1.0",
        "policy_id": "release_if_sufficient_balance",
        "payment_tree": {
            "node_id": "N1",
            "type": "condition",
            "condition": {
                "op": ">=",
                "left": {"field": "balance"},
                "right": {"field": "amount"}
            },
            "on_true": {"node_id": "A1", "type": "action", "action": "Release"},
            "on_false": {"node_id": "A2", "type": "action", "action": "Hold"}
        }
    }"#
    .to_string()
}

#[test]
fn release_branch_taken_when_balance_covers_amount() {
    use rtgs_sim_core::policy::tree::TreePolicy;

    let mut policy = TreePolicy::from_json(&release_if_sufficient_balance_tree()).unwrap();

    let mut agent = Agent::new("BANK_A".to_string(), 1_000_000, 0);
    let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);
    let tx_id = tx.id().to_string();
    agent.queue_outgoing(tx_id.clone());

    let mut state = SimulationState::new(vec![agent.clone(), Agent::new("BANK_B".to_string(), 0, 0)]);
    state.add_transaction(tx);

    let decisions = policy.evaluate_queue(&agent, &state, 0, &cost_rates(), 100, 0.8);
    assert_eq!(decisions.len(), 1);
    assert!(matches!(
        &decisions[0],
        ReleaseDecision::SubmitFull { tx_id: id, .. } if id == &tx_id
    ));
}

#[test]
fn hold_branch_taken_when_balance_insufficient() {
    use rtgs_sim_core::policy::tree::TreePolicy;

    let mut policy = TreePolicy::from_json(&release_if_sufficient_balance_tree()).unwrap();

    let mut agent = Agent::new("BANK_A".to_string(), 100_000, 0);
    let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 100);
    let tx_id = tx.id().to_string();
    agent.queue_outgoing(tx_id.clone());

    let mut state = SimulationState::new(vec![agent.clone(), Agent::new("BANK_B".to_string(), 0, 0)]);
    state.add_transaction(tx);

    let decisions = policy.evaluate_queue(&agent, &state, 0, &cost_rates(), 100, 0.8);
    assert_eq!(decisions.len(), 1);
    assert!(matches!(
        &decisions[0],
        ReleaseDecision::Hold { tx_id: id, .. } if id == &tx_id
    ));
}

#[test]
fn empty_queue_yields_no_decisions() {
    use rtgs_sim_core::policy::tree::TreePolicy;

    let mut policy = TreePolicy::from_json(&release_if_sufficient_balance_tree()).unwrap();
    let agent = Agent::new("BANK_A".to_string(), 1_000_000, 0);
    let state = SimulationState::new(vec![agent.clone(), Agent::new("BANK_B".to_string(), 0, 0)]);

    let decisions = policy.evaluate_queue(&agent, &state, 0, &cost_rates(), 100, 0.8);
    assert!(decisions.is_empty());
}

#[test]
fn malformed_json_is_rejected_at_load_time_not_at_evaluation_time() {
    use rtgs_sim_core::policy::tree::TreePolicy;

    let result = TreePolicy::from_json("{ not valid json");
    assert!(result.is_err());
}

#[test]
fn priority_and_deadline_fields_drive_a_multi_branch_tree() {
    use rtgs_sim_core::policy::tree::TreePolicy;

    // Release urgent transactions (<=2 ticks to deadline) unconditionally,
    // otherwise fall back to the balance check.
    let json = r#"{
        "version": "1.0",
        "policy_id": "urgency_first",
        "payment_tree": {
            "node_id": "N1",
            "type": "condition",
            "condition": {
                "op": "<=",
                "left": {"field": "ticks_to_deadline"},
                "right": {"value": 2}
            },
            "on_true": {"node_id": "A1", "type": "action", "action": "Release"},
            "on_false": {
                "node_id": "N2",
                "type": "condition",
                "condition": {
                    "op": ">=",
                    "left": {"field": "balance"},
                    "right": {"field": "amount"}
                },
                "on_true": {"node_id": "A2", "type": "action", "action": "Release"},
                "on_false": {"node_id": "A3", "type": "action", "action": "Hold"}
            }
        }
    }"#;
    let mut policy = TreePolicy::from_json(json).unwrap();

    let mut agent = Agent::new("BANK_A".to_string(), 0, 0);
    // Deadline at tick 2, evaluated at tick 0: 2 ticks to deadline, urgent.
    let urgent_tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 500_000, 0, 2);
    let urgent_id = urgent_tx.id().to_string();
    agent.queue_outgoing(urgent_id.clone());

    let mut state = SimulationState::new(vec![agent.clone(), Agent::new("BANK_B".to_string(), 0, 0)]);
    state.add_transaction(urgent_tx);

    let decisions = policy.evaluate_queue(&agent, &state, 0, &cost_rates(), 100, 0.8);
    assert_eq!(decisions.len(), 1);
    assert!(matches!(&decisions[0], ReleaseDecision::SubmitFull { .. }));
}
