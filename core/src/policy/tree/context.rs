// Phase 6: Evaluation Context
//
// Builds field values from simulation state for expression evaluation.
// Exposes transaction fields, agent fields, derived fields, and system state.
//
// All fields are i64: amounts/ticks/counts in their natural integer units,
// ratios (utilization, pressure, day progress) as basis points (0-10000).
// No floating point anywhere in the DSL evaluation path.

use crate::orchestrator::{round_half_even_div, CostRates};
use crate::{Agent, SimulationState, Transaction};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during context evaluation
#[derive(Debug, Error, PartialEq)]
pub enum ContextError {
    #[error("Field '{0}' not found in evaluation context")]
    FieldNotFound(String),

    #[error("Invalid field type conversion for '{0}'")]
    InvalidFieldType(String),
}

/// Evaluation context for decision tree expression evaluation
///
/// Contains field values extracted from simulation state (transaction, agent, system).
/// All fields are stored as i64 for exact, deterministic arithmetic. Ratios
/// (utilization, pressure, day progress) are expressed in basis points
/// (0 = 0%, 10_000 = 100%) rather than as fractions.
///
/// # Field Categories
///
/// **Transaction Fields**: amount, remaining_amount, settled_amount,
/// arrival_tick, deadline_tick, priority, is_split, is_past_deadline,
/// is_overdue, overdue_duration, ticks_to_deadline, queue_age.
///
/// **Agent Fields**: balance, credit_limit, available_liquidity, credit_used,
/// is_using_credit, liquidity_buffer, outgoing_queue_size,
/// incoming_expected_count, liquidity_pressure (bps), effective_liquidity.
///
/// **System Fields**: current_tick, rtgs_queue_size, rtgs_queue_value,
/// total_agents.
///
/// **Collateral Fields**: posted_collateral, max_collateral_capacity,
/// remaining_collateral_capacity, collateral_utilization (bps),
/// queue1_liquidity_gap, queue1_total_value, headroom.
///
/// **Queue 2 Fields**: queue2_size, queue2_count_for_agent,
/// queue2_nearest_deadline, ticks_to_nearest_queue2_deadline (`i64::MAX`
/// sentinel when the agent has nothing pending in Queue 2).
///
/// **Cost Fields**: cost_overdraft_bps_per_day, cost_collateral_bps_per_day,
/// cost_queue1_delay_per_tick, cost_overdue_delay_multiplier, cost_split_fee,
/// cost_deadline_base_penalty, cost_deadline_penalty_per_tick,
/// cost_delay_this_tx_one_tick, cost_overdraft_this_amount_one_tick.
///
/// **System Configuration Fields**: system_ticks_per_day, system_current_day,
/// system_tick_in_day, ticks_remaining_in_day, day_progress_fraction (bps),
/// is_eod_rush.
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Field name → value mapping
    fields: HashMap<String, i64>,
}

impl EvalContext {
    /// Create evaluation context from simulation state
    ///
    /// # Arguments
    ///
    /// * `tx` - Transaction being evaluated
    /// * `agent` - Agent whose queue contains this transaction
    /// * `state` - Full simulation state
    /// * `tick` - Current simulation tick
    /// * `cost_rates` - Cost configuration
    /// * `ticks_per_day` - Number of ticks in a simulation day
    /// * `eod_rush_threshold_bps` - End-of-day rush threshold, in basis
    ///   points of day progress (0-10000)
    ///
    /// # Returns
    ///
    /// Context populated with all available fields
    ///
    /// # Example
    ///
    /// ```rust
    /// use rtgs_sim_core::policy::tree::EvalContext;
    /// use rtgs_sim_core::{Agent, Transaction, SimulationState};
    /// use rtgs_sim_core::orchestrator::CostRates;
    ///
    /// let agent = Agent::new("BANK_A".to_string(), 1_000_000, 0);
    /// let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100_000, 0, 100);
    /// let state = SimulationState::new(vec![agent.clone()]);
    /// let cost_rates = CostRates::default();
    ///
    /// let context = EvalContext::build(&tx, &agent, &state, 100, &cost_rates, 100, 8_000);
    /// let balance = context.get_field("balance").unwrap();
    /// assert_eq!(balance, 1_000_000);
    /// ```
    pub fn build(
        tx: &Transaction,
        agent: &Agent,
        state: &SimulationState,
        tick: usize,
        cost_rates: &CostRates,
        ticks_per_day: usize,
        eod_rush_threshold_bps: i64,
    ) -> Self {
        let mut fields = HashMap::new();

        // Transaction fields
        fields.insert("amount".to_string(), tx.amount());
        fields.insert("remaining_amount".to_string(), tx.remaining_amount());
        fields.insert("settled_amount".to_string(), tx.settled_amount());
        fields.insert("arrival_tick".to_string(), tx.arrival_tick() as i64);
        fields.insert("deadline_tick".to_string(), tx.deadline_tick() as i64);
        fields.insert("priority".to_string(), tx.priority() as i64);
        fields.insert("is_split".to_string(), bool_to_i64(tx.is_split()));
        fields.insert(
            "is_past_deadline".to_string(),
            bool_to_i64(tx.is_past_deadline(tick)),
        );
        fields.insert("is_overdue".to_string(), bool_to_i64(tx.is_overdue()));

        let overdue_duration = if let Some(overdue_since) = tx.overdue_since_tick() {
            tick.saturating_sub(overdue_since)
        } else {
            0
        };
        fields.insert("overdue_duration".to_string(), overdue_duration as i64);

        // Agent fields
        fields.insert("balance".to_string(), agent.balance());
        fields.insert("credit_limit".to_string(), agent.credit_limit());
        fields.insert(
            "available_liquidity".to_string(),
            agent.available_liquidity(),
        );
        fields.insert("credit_used".to_string(), agent.credit_used());
        fields.insert(
            "is_using_credit".to_string(),
            bool_to_i64(agent.is_using_credit()),
        );
        fields.insert("liquidity_buffer".to_string(), agent.liquidity_buffer());
        fields.insert(
            "outgoing_queue_size".to_string(),
            agent.outgoing_queue_size() as i64,
        );
        fields.insert(
            "incoming_expected_count".to_string(),
            agent.incoming_expected().len() as i64,
        );
        fields.insert(
            "liquidity_pressure".to_string(),
            agent.liquidity_pressure_bps(),
        );

        // Derived fields
        let ticks_to_deadline = tx.deadline_tick() as i64 - tick as i64;
        fields.insert("ticks_to_deadline".to_string(), ticks_to_deadline);

        let queue_age = tick.saturating_sub(tx.arrival_tick());
        fields.insert("queue_age".to_string(), queue_age as i64);

        // System fields
        fields.insert("current_tick".to_string(), tick as i64);
        fields.insert("rtgs_queue_size".to_string(), state.queue_size() as i64);
        fields.insert("rtgs_queue_value".to_string(), state.queue_value());
        fields.insert("total_agents".to_string(), state.num_agents() as i64);

        // Collateral fields
        fields.insert("posted_collateral".to_string(), agent.posted_collateral());
        fields.insert(
            "max_collateral_capacity".to_string(),
            agent.max_collateral_capacity(),
        );
        fields.insert(
            "remaining_collateral_capacity".to_string(),
            agent.remaining_collateral_capacity(),
        );

        let max_cap = agent.max_collateral_capacity();
        let collateral_utilization_bps = if max_cap > 0 {
            round_half_even_div(agent.posted_collateral() * 10_000, max_cap).clamp(0, 10_000)
        } else {
            0
        };
        fields.insert(
            "collateral_utilization".to_string(),
            collateral_utilization_bps,
        );

        // Effective liquidity: what the agent could pay out right now plus
        // whatever additional backed liquidity it could unlock by posting
        // its remaining collateral capacity.
        fields.insert(
            "effective_liquidity".to_string(),
            agent.available_liquidity() + agent.remaining_collateral_capacity(),
        );

        // Liquidity gap fields
        fields.insert(
            "queue1_liquidity_gap".to_string(),
            agent.queue1_liquidity_gap(state),
        );

        let mut queue1_total_value = 0i64;
        for tx_id in agent.outgoing_queue() {
            if let Some(tx_in_queue) = state.get_transaction(tx_id) {
                queue1_total_value += tx_in_queue.remaining_amount();
            }
        }
        fields.insert("queue1_total_value".to_string(), queue1_total_value);

        let headroom = agent.available_liquidity() - queue1_total_value;
        fields.insert("headroom".to_string(), headroom);

        // Queue 2 (RTGS) pressure fields
        fields.insert("queue2_size".to_string(), state.rtgs_queue().len() as i64);

        let queue2_count = state
            .rtgs_queue()
            .iter()
            .filter(|tx_id| {
                state
                    .get_transaction(tx_id)
                    .map(|t| t.sender_id() == agent.id())
                    .unwrap_or(false)
            })
            .count();
        fields.insert("queue2_count_for_agent".to_string(), queue2_count as i64);

        let queue2_nearest_deadline = state
            .rtgs_queue()
            .iter()
            .filter_map(|tx_id| state.get_transaction(tx_id))
            .filter(|t| t.sender_id() == agent.id())
            .map(|t| t.deadline_tick())
            .min();
        fields.insert(
            "queue2_nearest_deadline".to_string(),
            queue2_nearest_deadline.map(|d| d as i64).unwrap_or(i64::MAX),
        );

        let ticks_to_nearest_queue2_deadline = match queue2_nearest_deadline {
            Some(deadline) => deadline.saturating_sub(tick) as i64,
            None => i64::MAX,
        };
        fields.insert(
            "ticks_to_nearest_queue2_deadline".to_string(),
            ticks_to_nearest_queue2_deadline,
        );

        // Cost fields: exposed directly from the cost-rate configuration
        // (see `Orchestrator::accrue_costs` for how these combine into
        // actual per-tick charges).
        fields.insert(
            "cost_overdraft_bps_per_day".to_string(),
            cost_rates.overdraft_bps_per_day,
        );
        fields.insert(
            "cost_collateral_bps_per_day".to_string(),
            cost_rates.collateral_bps_per_day,
        );
        fields.insert(
            "cost_queue1_delay_per_tick".to_string(),
            cost_rates.queue1_delay_per_tick,
        );
        fields.insert(
            "cost_overdue_delay_multiplier".to_string(),
            cost_rates.overdue_delay_multiplier,
        );
        fields.insert("cost_split_fee".to_string(), cost_rates.split_fee);
        fields.insert(
            "cost_deadline_base_penalty".to_string(),
            cost_rates.deadline_base_penalty,
        );
        fields.insert(
            "cost_deadline_penalty_per_tick".to_string(),
            cost_rates.deadline_penalty_per_tick,
        );

        // Delay cost this transaction would accrue for one more tick in
        // Queue 1, mirroring `accrue_costs`'s flat per-transaction charge.
        let is_past_deadline = tx.is_past_deadline(tick);
        let delay_cost_one_tick = if is_past_deadline {
            cost_rates.queue1_delay_per_tick * cost_rates.overdue_delay_multiplier
        } else {
            cost_rates.queue1_delay_per_tick
        };
        fields.insert(
            "cost_delay_this_tx_one_tick".to_string(),
            delay_cost_one_tick,
        );

        // Overdraft cost this transaction's remaining amount would accrue
        // for one tick if it pushed the agent's balance that far negative.
        let ticks_per_day_i64 = (ticks_per_day.max(1)) as i64;
        let overdraft_cost_one_tick = round_half_even_div(
            tx.remaining_amount() * cost_rates.overdraft_bps_per_day,
            10_000 * ticks_per_day_i64,
        );
        fields.insert(
            "cost_overdraft_this_amount_one_tick".to_string(),
            overdraft_cost_one_tick,
        );

        // System configuration fields
        fields.insert("system_ticks_per_day".to_string(), ticks_per_day as i64);

        let current_day = tick / ticks_per_day.max(1);
        let tick_in_day = tick % ticks_per_day.max(1);

        fields.insert("system_current_day".to_string(), current_day as i64);
        fields.insert("system_tick_in_day".to_string(), tick_in_day as i64);

        let ticks_remaining = ticks_per_day.saturating_sub(tick_in_day).saturating_sub(1);
        fields.insert("ticks_remaining_in_day".to_string(), ticks_remaining as i64);

        let day_progress_bps = if ticks_per_day > 0 {
            round_half_even_div((tick_in_day as i64) * 10_000, ticks_per_day as i64)
        } else {
            0
        };
        fields.insert("day_progress_fraction".to_string(), day_progress_bps);

        let is_eod_rush = bool_to_i64(day_progress_bps >= eod_rush_threshold_bps);
        fields.insert("is_eod_rush".to_string(), is_eod_rush);

        Self { fields }
    }

    /// Get field value by name
    ///
    /// # Arguments
    ///
    /// * `name` - Field name
    ///
    /// # Returns
    ///
    /// Ok(value) if field exists, Err otherwise
    pub fn get_field(&self, name: &str) -> Result<i64, ContextError> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| ContextError::FieldNotFound(name.to_string()))
    }

    /// Check if field exists in context
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Get all field names (for debugging/validation)
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(|s| s.as_str()).collect()
    }
}

fn bool_to_i64(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

// ============================================================================
// TESTS - Phase 6.2
// ============================================================================
