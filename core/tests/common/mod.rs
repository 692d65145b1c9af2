//! Shared config builders for integration tests.
#![allow(dead_code)]

use rtgs_sim_core::arrivals::{AmountDistribution, ArrivalConfig, PriorityDistribution};
use rtgs_sim_core::orchestrator::{
    AgentConfig, CostRates, OrchestratorConfig, PolicyConfig, PriorityEscalationConfig,
    Queue1Ordering,
};
use rtgs_sim_core::settlement::lsm::LsmConfig;
use std::collections::HashMap;

/// Two agents, FIFO policy, no arrivals, no unsecured cap/collateral.
/// Suitable for hand-submitted scenario tests (S1-S6 style).
pub fn single_agent_pair_config(unsecured_cap_a: i64, unsecured_cap_b: i64) -> OrchestratorConfig {
    OrchestratorConfig {
        ticks_per_day: 100,
        num_days: 1,
        rng_seed: 1,
        agent_configs: vec![
            AgentConfig {
                id: "BANK_A".to_string(),
                opening_balance: 0,
                unsecured_cap: unsecured_cap_a,
                collateral_pledged: 0,
                collateral_capacity: 0,
                policy: PolicyConfig::Fifo,
                arrival_config: None,
            },
            AgentConfig {
                id: "BANK_B".to_string(),
                opening_balance: 0,
                unsecured_cap: unsecured_cap_b,
                collateral_pledged: 0,
                collateral_capacity: 0,
                policy: PolicyConfig::Fifo,
                arrival_config: None,
            },
        ],
        cost_rates: CostRates::default(),
        lsm_config: LsmConfig::default(),
        queue1_ordering: Queue1Ordering::Fifo,
        priority_mode: false,
        priority_escalation: PriorityEscalationConfig::default(),
        eod_rush_threshold: 8_000,
    }
}

/// S1: two agents with $10,000 opening balance each, no unsecured cap.
pub fn s1_config() -> OrchestratorConfig {
    let mut config = single_agent_pair_config(0, 0);
    config.ticks_per_day = 10;
    config.num_days = 1;
    for agent in &mut config.agent_configs {
        agent.opening_balance = 1_000_000;
    }
    config
}

/// S2/S3: N agents with a fixed opening balance and zero unsecured cap, used
/// to force LSM-dependent settlement.
pub fn n_bank_config(ids: &[&str], opening_balance: i64) -> OrchestratorConfig {
    let agent_configs = ids
        .iter()
        .map(|id| AgentConfig {
            id: id.to_string(),
            opening_balance,
            unsecured_cap: 0,
            collateral_pledged: 0,
            collateral_capacity: 0,
            policy: PolicyConfig::Fifo,
            arrival_config: None,
        })
        .collect();

    OrchestratorConfig {
        ticks_per_day: 20,
        num_days: 1,
        rng_seed: 1,
        agent_configs,
        cost_rates: CostRates::default(),
        lsm_config: LsmConfig::default(),
        queue1_ordering: Queue1Ordering::Fifo,
        priority_mode: false,
        priority_escalation: PriorityEscalationConfig::default(),
        eod_rush_threshold: 8_000,
    }
}

/// Two agents, each generating a stochastic stream of arrivals against
/// each other, used for determinism/checkpoint/replay tests.
pub fn two_bank_config_with_arrivals(seed: u64) -> OrchestratorConfig {
    let mut bank_a_weights = HashMap::new();
    bank_a_weights.insert("BANK_B".to_string(), 1.0);
    let mut bank_b_weights = HashMap::new();
    bank_b_weights.insert("BANK_A".to_string(), 1.0);

    let arrival_config_a = ArrivalConfig {
        rate_per_tick: 0.6,
        amount_distribution: AmountDistribution::Uniform {
            min: 1_000,
            max: 50_000,
        },
        counterparty_weights: bank_a_weights,
        deadline_range: (5, 30),
        priority_distribution: PriorityDistribution::Uniform { min: 1, max: 9 },
        divisible: false,
    };
    let arrival_config_b = ArrivalConfig {
        rate_per_tick: 0.6,
        amount_distribution: AmountDistribution::Uniform {
            min: 1_000,
            max: 50_000,
        },
        counterparty_weights: bank_b_weights,
        deadline_range: (5, 30),
        priority_distribution: PriorityDistribution::Uniform { min: 1, max: 9 },
        divisible: false,
    };

    OrchestratorConfig {
        ticks_per_day: 20,
        num_days: 3,
        rng_seed: seed,
        agent_configs: vec![
            AgentConfig {
                id: "BANK_A".to_string(),
                opening_balance: 10_000_000,
                unsecured_cap: 1_000_000,
                collateral_pledged: 0,
                collateral_capacity: 500_000,
                policy: PolicyConfig::Fifo,
                arrival_config: Some(arrival_config_a),
            },
            AgentConfig {
                id: "BANK_B".to_string(),
                opening_balance: 10_000_000,
                unsecured_cap: 1_000_000,
                collateral_pledged: 0,
                collateral_capacity: 500_000,
                policy: PolicyConfig::Fifo,
                arrival_config: Some(arrival_config_b),
            },
        ],
        cost_rates: CostRates::default(),
        lsm_config: LsmConfig::default(),
        queue1_ordering: Queue1Ordering::PriorityDeadline,
        priority_mode: false,
        priority_escalation: PriorityEscalationConfig {
            enabled: true,
            start_escalating_at_ticks: 8,
            max_boost: 3,
        },
        eod_rush_threshold: 8_000,
    }
}
