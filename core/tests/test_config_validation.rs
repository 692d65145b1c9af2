//! Integration tests for configuration validation (§7): malformed configs
//! must be rejected at `Orchestrator::new` and never surface as a panic
//! later in the tick loop.

mod common;
use common::*;

use rtgs_sim_core::orchestrator::{AgentConfig, Orchestrator, PolicyConfig, SimulationError};

#[test]
fn zero_ticks_per_day_is_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.ticks_per_day = 0;
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn zero_num_days_is_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.num_days = 0;
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn empty_agent_list_is_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.agent_configs.clear();
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn duplicate_agent_ids_are_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.agent_configs[1].id = config.agent_configs[0].id.clone();
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn negative_opening_balance_is_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.agent_configs[0].opening_balance = -1;
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn negative_unsecured_cap_is_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.agent_configs[0].unsecured_cap = -1;
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn negative_collateral_pledged_is_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.agent_configs[0].collateral_pledged = -1;
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn collateral_pledged_exceeding_capacity_is_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.agent_configs[0].collateral_capacity = 10_000;
    config.agent_configs[0].collateral_pledged = 20_000;
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn priority_escalation_enabled_with_zero_start_tick_is_rejected() {
    let mut config = single_agent_pair_config(0, 0);
    config.priority_escalation.enabled = true;
    config.priority_escalation.start_escalating_at_ticks = 0;
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[test]
fn malformed_policy_json_is_rejected_at_construction() {
    let mut config = single_agent_pair_config(0, 0);
    config.agent_configs[0].policy = PolicyConfig::FromJson {
        json: "{ this is not a valid decision tree".to_string(),
    };
    let err = Orchestrator::new(config).unwrap_err();
    assert!(matches!(err, SimulationError::PolicyError { .. }));
}

#[test]
fn a_valid_config_constructs_successfully_and_is_ready_to_tick() {
    let config = single_agent_pair_config(0, 0);
    let mut orchestrator = Orchestrator::new(config).unwrap();
    assert_eq!(orchestrator.current_tick(), 0);
    orchestrator.tick().unwrap();
    assert_eq!(orchestrator.current_tick(), 1);
}

#[test]
fn collateral_pledged_equal_to_capacity_is_accepted() {
    let mut config = single_agent_pair_config(0, 0);
    config.agent_configs[0].collateral_capacity = 10_000;
    config.agent_configs[0].collateral_pledged = 10_000;
    let orchestrator = Orchestrator::new(config).unwrap();
    assert_eq!(
        orchestrator.state().get_agent("BANK_A").unwrap().posted_collateral(),
        10_000
    );
}

#[test]
fn single_agent_is_a_valid_minimal_configuration() {
    let config = rtgs_sim_core::orchestrator::OrchestratorConfig {
        ticks_per_day: 10,
        num_days: 1,
        rng_seed: 1,
        agent_configs: vec![AgentConfig {
            id: "SOLO".to_string(),
            opening_balance: 0,
            unsecured_cap: 0,
            collateral_pledged: 0,
            collateral_capacity: 0,
            policy: PolicyConfig::Fifo,
            arrival_config: None,
        }],
        cost_rates: rtgs_sim_core::orchestrator::CostRates::default(),
        lsm_config: rtgs_sim_core::settlement::lsm::LsmConfig::default(),
        queue1_ordering: rtgs_sim_core::orchestrator::Queue1Ordering::Fifo,
        priority_mode: false,
        priority_escalation: rtgs_sim_core::orchestrator::PriorityEscalationConfig::default(),
        eod_rush_threshold: 8_000,
    };
    assert!(Orchestrator::new(config).is_ok());
}
