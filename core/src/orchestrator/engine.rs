//! Orchestrator Engine
//!
//! Main simulation loop integrating all components:
//! - Transaction arrivals (deterministic generation)
//! - Strategic and end-of-tick collateral management
//! - Policy evaluation (Queue 1 decisions)
//! - Priority escalation
//! - Settlement processing (RTGS + LSM)
//! - Cost accrual (liquidity, collateral, delay, split, deadline)
//! - Event logging (complete simulation history)
//!
//! # Tick order
//!
//! ```text
//! For each tick t:
//!  1. Strategic collateral tree evaluation (post/withdraw ahead of need)
//!  2. Generate arrivals (Poisson sampling)
//!  3. Evaluate payment_tree policies (Queue 1 -> release decisions)
//!  4. Priority escalation (deadline-proximity boost)
//!  5. Drain Queue 2 (RTGS queue), re-checking liquidity after each settlement
//!  6. Run LSM pass (bilateral offset + cycle detection)
//!  7. End-of-tick collateral tree evaluation (withdraw unused collateral)
//!  8. Accrue costs (liquidity, collateral, delay, split, deadline penalty)
//!  9. Fire collateral auto-withdraw timers
//! 10. Advance time / emit tick-boundary events
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rtgs_sim_core::orchestrator::{Orchestrator, OrchestratorConfig, AgentConfig, PolicyConfig};
//!
//! let config = OrchestratorConfig {
//!     ticks_per_day: 100,
//!     num_days: 1,
//!     rng_seed: 12345,
//!     agent_configs: vec![
//!         AgentConfig {
//!             id: "BANK_A".to_string(),
//!             opening_balance: 1_000_000,
//!             unsecured_cap: 500_000,
//!             collateral_pledged: 0,
//!             collateral_capacity: 0,
//!             policy: PolicyConfig::Fifo,
//!             arrival_config: None,
//!         },
//!     ],
//!     cost_rates: Default::default(),
//!     lsm_config: Default::default(),
//!     queue1_ordering: Default::default(),
//!     priority_mode: false,
//!     priority_escalation: Default::default(),
//!     eod_rush_threshold: 8_000,
//! };
//!
//! let mut orchestrator = Orchestrator::new(config).unwrap();
//!
//! for _ in 0..10 {
//!     let result = orchestrator.tick().unwrap();
//!     println!("Tick {}: {} arrivals, {} settlements",
//!              result.tick, result.num_arrivals, result.num_settlements);
//! }
//! ```

use crate::arrivals::{ArrivalConfig, ArrivalGenerator};
use crate::core::time::TimeManager;
use crate::models::agent::Agent;
use crate::models::collateral::CollateralReason;
use crate::models::event::{Event, EventLog};
use crate::models::state::SimulationState;
use crate::models::transaction::Transaction;
use crate::orchestrator::checkpoint::{self, AgentSnapshot, StateSnapshot, TransactionSnapshot};
use crate::policy::tree::{TreePolicy, TreePolicyError};
use crate::policy::{CashManagerPolicy, CollateralDecision, FifoPolicy, HoldReason, ReleaseDecision};
use crate::rng::RngManager;
use crate::settlement::lsm::LsmConfig;
use std::collections::BTreeMap;
use std::collections::HashMap;

// ============================================================================
// Rounding helper
// ============================================================================

/// Round `num / den` to the nearest integer, ties to even. Used everywhere
/// cost/escalation math needs a deterministic rounding rule instead of
/// floating point.
pub(crate) fn round_half_even_div(num: i64, den: i64) -> i64 {
    assert!(den > 0, "denominator must be positive");
    let neg = num < 0;
    let n = num.abs();
    let q = n / den;
    let r = n % den;
    let twice_r = r * 2;
    let rounded = if twice_r > den {
        q + 1
    } else if twice_r < den {
        q
    } else if q % 2 == 0 {
        q
    } else {
        q + 1
    };
    if neg {
        -rounded
    } else {
        rounded
    }
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Complete orchestrator configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OrchestratorConfig {
    /// Number of ticks per business day (e.g., 100 ticks = 1 tick per ~5 minutes)
    pub ticks_per_day: usize,

    /// Number of business days to simulate
    pub num_days: usize,

    /// RNG seed for deterministic simulation
    pub rng_seed: u64,

    /// Per-agent configuration
    pub agent_configs: Vec<AgentConfig>,

    /// Cost calculation rates
    pub cost_rates: CostRates,

    /// LSM configuration
    pub lsm_config: LsmConfig,

    /// Queue 1 (per-agent) ordering discipline
    pub queue1_ordering: Queue1Ordering,

    /// Whether Queue 2 (RTGS queue) is drained in priority bands rather
    /// than plain FIFO
    pub priority_mode: bool,

    /// Priority escalation configuration
    pub priority_escalation: PriorityEscalationConfig,

    /// Fraction of the trading day, in basis points (0-10000), after which
    /// policies may consider themselves in the "end-of-day rush" window.
    /// Exposed to the policy DSL as `system_in_eod_rush`.
    pub eod_rush_threshold: i64,
}

/// Per-agent configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentConfig {
    /// Unique agent identifier
    pub id: String,

    /// Opening balance in settlement account (cents/minor units)
    pub opening_balance: i64,

    /// Unsecured daylight overdraft cap (cents)
    pub unsecured_cap: i64,

    /// Collateral pledged at simulation start (cents)
    pub collateral_pledged: i64,

    /// Maximum collateral capacity (cents). Defaults to `collateral_pledged`
    /// when zero and some collateral is pledged.
    pub collateral_capacity: i64,

    /// Cash manager policy for Queue 1 decisions
    pub policy: PolicyConfig,

    /// Arrival generation configuration (None = no automatic arrivals)
    pub arrival_config: Option<ArrivalConfig>,
}

/// Policy selection for an agent
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum PolicyConfig {
    /// FIFO: submit everything every tick (trivial baseline, no decision logic)
    Fifo,

    /// A policy expressed as the decision-tree DSL (the primary
    /// pluggable-policy mechanism; see `policy::tree`).
    FromJson { json: String },
}

/// Queue 1 (per-agent internal queue) ordering discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Queue1Ordering {
    /// Arrival order
    #[default]
    Fifo,
    /// Nearest deadline first, ties broken by arrival order
    PriorityDeadline,
}

/// Priority escalation configuration (C10).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriorityEscalationConfig {
    pub enabled: bool,
    /// Ticks-to-deadline at which escalation begins
    pub start_escalating_at_ticks: usize,
    /// Maximum priority boost applied at the deadline
    pub max_boost: u8,
}

impl Default for PriorityEscalationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_escalating_at_ticks: 10,
            max_boost: 3,
        }
    }
}

/// Queue 2 priority bands, owned by the RTGS settlement module (§4.7) since
/// both the band-scoped queue scan and this engine's Q2 reordering need the
/// same classification.
pub use crate::settlement::rtgs::PriorityBand;

/// Classify a transaction priority (0-10) into its Queue 2 band.
///
/// Urgent: priority >= 7. Normal: 3-6. Low: 0-2.
pub fn get_priority_band(priority: u8) -> PriorityBand {
    crate::settlement::rtgs::priority_band(priority)
}

/// Cost calculation rates (§4.3). All rates are integer, expressed as basis
/// points per day or flat cents, so accrual math never touches floating
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CostRates {
    /// Overdraft cost, basis points per day, charged on `|balance|` while
    /// negative.
    pub overdraft_bps_per_day: i64,

    /// Collateral opportunity cost, basis points per day, charged on posted
    /// collateral regardless of usage.
    pub collateral_bps_per_day: i64,

    /// Flat delay cost charged once per tick per Queue-1-resident
    /// transaction.
    pub queue1_delay_per_tick: i64,

    /// Multiplier applied to `queue1_delay_per_tick` once a transaction is
    /// overdue.
    pub overdue_delay_multiplier: i64,

    /// Friction cost per split (charged as `split_fee * (k - 1)`).
    pub split_fee: i64,

    /// One-time penalty charged the tick a transaction first crosses its
    /// deadline.
    pub deadline_base_penalty: i64,

    /// Penalty charged every tick after the first that a transaction remains
    /// overdue.
    pub deadline_penalty_per_tick: i64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            overdraft_bps_per_day: 10,
            collateral_bps_per_day: 5,
            queue1_delay_per_tick: 10,
            overdue_delay_multiplier: 3,
            split_fee: 1_000,
            deadline_base_penalty: 50_000,
            deadline_penalty_per_tick: 5_000,
        }
    }
}

/// Cost breakdown for a single tick or agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CostBreakdown {
    /// Overdraft cost accrued this tick (cents)
    pub liquidity_cost: i64,

    /// Collateral opportunity cost accrued this tick (cents)
    pub collateral_cost: i64,

    /// Queue delay cost accrued this tick (cents)
    pub delay_cost: i64,

    /// Penalties incurred this tick (cents)
    pub penalty_cost: i64,

    /// Transaction splitting friction cost (cents)
    pub split_friction_cost: i64,
}

impl CostBreakdown {
    /// Total cost across all categories
    pub fn total(&self) -> i64 {
        self.liquidity_cost
            + self.collateral_cost
            + self.delay_cost
            + self.penalty_cost
            + self.split_friction_cost
    }
}

/// Accumulated costs for an agent over time
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CostAccumulator {
    pub total_liquidity_cost: i64,
    pub total_collateral_cost: i64,
    pub total_delay_cost: i64,
    pub total_penalty_cost: i64,
    pub total_split_friction_cost: i64,
    /// Peak net debit observed (most negative balance)
    pub peak_net_debit: i64,
}

impl CostAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add costs from a tick
    pub fn add(&mut self, costs: &CostBreakdown) {
        self.total_liquidity_cost += costs.liquidity_cost;
        self.total_collateral_cost += costs.collateral_cost;
        self.total_delay_cost += costs.delay_cost;
        self.total_penalty_cost += costs.penalty_cost;
        self.total_split_friction_cost += costs.split_friction_cost;
    }

    /// Update peak net debit if current balance is more negative
    pub fn update_peak_debit(&mut self, current_balance: i64) {
        if current_balance < 0 {
            self.peak_net_debit = self.peak_net_debit.min(current_balance);
        }
    }

    /// Total cost across all categories
    pub fn total(&self) -> i64 {
        self.total_liquidity_cost
            + self.total_collateral_cost
            + self.total_delay_cost
            + self.total_penalty_cost
            + self.total_split_friction_cost
    }
}

/// Per-day aggregate metrics for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DailyMetrics {
    pub day: usize,
    pub num_settled: usize,
    pub num_dropped: usize,
    pub total_cost: i64,
    pub peak_net_debit: i64,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Main orchestrator managing simulation state and tick loop
///
/// # Determinism
///
/// All randomness is via `rng_manager` with seeded xorshift64*.
/// Same seed + same config = identical results (deterministic replay).
pub struct Orchestrator {
    state: SimulationState,
    time_manager: TimeManager,
    rng_manager: RngManager,
    policies: HashMap<String, Box<dyn CashManagerPolicy>>,
    /// Per-agent policy configuration, retained alongside the constructed
    /// trait object so `get_agent_policies` can report what each agent is
    /// actually running without downcasting.
    policy_configs: HashMap<String, PolicyConfig>,
    arrival_generator: Option<ArrivalGenerator>,
    cost_rates: CostRates,
    lsm_config: LsmConfig,
    queue1_ordering: Queue1Ordering,
    priority_mode: bool,
    priority_escalation: PriorityEscalationConfig,
    eod_rush_threshold: i64,
    accumulated_costs: HashMap<String, CostAccumulator>,
    daily_metrics: HashMap<String, Vec<DailyMetrics>>,
    event_log: EventLog,
    pending_settlements: Vec<String>,
    /// Events logged so far in the tick currently in progress. Flushed into
    /// `event_log` only once `tick()` returns `Ok`, so a tick that errors out
    /// partway through leaves no trace in the committed log (§7: no
    /// partial-tick effects are observable).
    pending_tick_events: Vec<Event>,
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TickResult {
    pub tick: usize,
    pub num_arrivals: usize,
    pub num_settlements: usize,
    pub num_lsm_releases: usize,
    pub total_cost_delta: i64,
}

/// Read-only view of a transaction's public fields, returned across the
/// query surface instead of a borrowed `&Transaction` so callers (including
/// the FFI boundary) get an owned, serializable snapshot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransactionView {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: i64,
    pub remaining_amount: i64,
    pub arrival_tick: usize,
    pub deadline_tick: usize,
    pub priority: u8,
    pub original_priority: u8,
    pub is_divisible: bool,
    pub status: crate::models::transaction::TransactionStatus,
    pub parent_id: Option<String>,
    pub overdue_since_tick: Option<usize>,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id().to_string(),
            sender_id: tx.sender_id().to_string(),
            receiver_id: tx.receiver_id().to_string(),
            amount: tx.amount(),
            remaining_amount: tx.remaining_amount(),
            arrival_tick: tx.arrival_tick(),
            deadline_tick: tx.deadline_tick(),
            priority: tx.priority(),
            original_priority: tx.original_priority(),
            is_divisible: tx.is_divisible(),
            status: tx.status().clone(),
            parent_id: tx.parent_id().map(|s| s.to_string()),
            overdue_since_tick: tx.overdue_since_tick(),
        }
    }
}

/// One multilateral LSM cycle settlement, as reported to external callers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LsmCycleView {
    pub tick: usize,
    pub agents: Vec<String>,
    pub tx_amounts: Vec<i64>,
    pub total_value: i64,
    pub net_positions: Vec<i64>,
    pub max_net_outflow: i64,
    pub max_net_outflow_agent: String,
    pub tx_ids: Vec<String>,
}

/// Whole-system point-in-time metrics, aggregated across all agents.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SystemMetrics {
    pub tick: usize,
    pub day: usize,
    pub num_agents: usize,
    pub total_balance: i64,
    pub total_queue1_depth: usize,
    pub rtgs_queue_depth: usize,
    pub total_settled: usize,
    pub total_dropped: usize,
    pub total_cost: i64,
}

/// Errors raised by `Orchestrator::submit_transaction` (§7 SubmissionError).
/// Distinct from `SimulationError`: these are caller-input errors that never
/// mutate state, as opposed to runtime/fatal engine errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum SubmissionError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("deadline_tick {deadline_tick} is not after current tick {current_tick}")]
    DeadlineInPast {
        deadline_tick: usize,
        current_tick: usize,
    },
}

/// Simulation error types
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Configuration validation error (pre-run)
    InvalidConfig(String),

    /// Agent not found
    AgentNotFound(String),

    /// Transaction not found
    TransactionNotFound(String),

    /// Settlement engine error
    SettlementError(String),

    /// RNG error
    RngError(String),

    /// Serialization/deserialization failure (checkpoint, policy JSON)
    SerializationError(String),

    /// A restored or constructed state violated an internal invariant
    StateValidationError(String),

    /// A policy tree raised a runtime error while being evaluated
    PolicyError {
        agent_id: String,
        node_id: String,
        source: String,
    },

    /// An internal invariant was violated (balance conservation, duplicate
    /// settlement, etc.) - always a bug, never a config or input problem.
    ConsistencyBug(String),
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            SimulationError::AgentNotFound(id) => write!(f, "Agent not found: {}", id),
            SimulationError::TransactionNotFound(id) => {
                write!(f, "Transaction not found: {}", id)
            }
            SimulationError::SettlementError(msg) => write!(f, "Settlement error: {}", msg),
            SimulationError::RngError(msg) => write!(f, "RNG error: {}", msg),
            SimulationError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            SimulationError::StateValidationError(msg) => {
                write!(f, "State validation error: {}", msg)
            }
            SimulationError::PolicyError {
                agent_id,
                node_id,
                source,
            } => write!(
                f,
                "Policy error for agent {} at node {}: {}",
                agent_id, node_id, source
            ),
            SimulationError::ConsistencyBug(msg) => write!(f, "Consistency bug: {}", msg),
        }
    }
}

impl std::error::Error for SimulationError {}

impl From<TreePolicyError> for SimulationError {
    fn from(err: TreePolicyError) -> Self {
        SimulationError::PolicyError {
            agent_id: String::new(),
            node_id: String::new(),
            source: err.to_string(),
        }
    }
}

/// Outcome of a settlement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettlementOutcome {
    Settled,
    Queued,
}

impl Orchestrator {
    /// Create new orchestrator from configuration
    pub fn new(config: OrchestratorConfig) -> Result<Self, SimulationError> {
        Self::validate_config(&config)?;

        let agents: Vec<Agent> = config
            .agent_configs
            .iter()
            .map(|ac| {
                let mut agent = Agent::new(ac.id.clone(), ac.opening_balance, ac.unsecured_cap);
                if ac.collateral_pledged > 0 || ac.collateral_capacity > 0 {
                    let capacity = ac.collateral_capacity.max(ac.collateral_pledged);
                    agent = agent.with_collateral_capacity(capacity);
                    agent.collateral_ledger_mut().set_posted(ac.collateral_pledged);
                }
                agent
            })
            .collect();

        let state = SimulationState::new(agents);
        let time_manager = TimeManager::new(config.ticks_per_day);
        let rng_manager = RngManager::new(config.rng_seed);

        let mut policies: HashMap<String, Box<dyn CashManagerPolicy>> = HashMap::new();
        let mut policy_configs: HashMap<String, PolicyConfig> = HashMap::new();
        for agent_config in &config.agent_configs {
            policy_configs.insert(agent_config.id.clone(), agent_config.policy.clone());
            let policy: Box<dyn CashManagerPolicy> = match &agent_config.policy {
                PolicyConfig::Fifo => Box::new(FifoPolicy),
                PolicyConfig::FromJson { json } => {
                    let tree_policy = TreePolicy::from_json(json).map_err(|e| {
                        SimulationError::PolicyError {
                            agent_id: agent_config.id.clone(),
                            node_id: String::new(),
                            source: e.to_string(),
                        }
                    })?;
                    Box::new(tree_policy)
                }
            };
            policies.insert(agent_config.id.clone(), policy);
        }

        let mut arrival_configs_map = HashMap::new();
        for agent_config in &config.agent_configs {
            if let Some(arrival_cfg) = &agent_config.arrival_config {
                arrival_configs_map.insert(agent_config.id.clone(), arrival_cfg.clone());
            }
        }

        let episode_end_tick = config.ticks_per_day * config.num_days;
        let arrival_generator = if !arrival_configs_map.is_empty() {
            let all_agent_ids: Vec<String> = config
                .agent_configs
                .iter()
                .map(|ac| ac.id.clone())
                .collect();
            Some(ArrivalGenerator::new(
                arrival_configs_map,
                all_agent_ids,
                episode_end_tick.saturating_sub(1),
                &rng_manager,
            ))
        } else {
            None
        };

        let mut accumulated_costs = HashMap::new();
        let mut daily_metrics = HashMap::new();
        for agent_config in &config.agent_configs {
            accumulated_costs.insert(agent_config.id.clone(), CostAccumulator::new());
            daily_metrics.insert(agent_config.id.clone(), Vec::new());
        }

        Ok(Self {
            state,
            time_manager,
            rng_manager,
            policies,
            policy_configs,
            arrival_generator,
            cost_rates: config.cost_rates,
            lsm_config: config.lsm_config,
            queue1_ordering: config.queue1_ordering,
            priority_mode: config.priority_mode,
            priority_escalation: config.priority_escalation,
            eod_rush_threshold: config.eod_rush_threshold,
            accumulated_costs,
            daily_metrics,
            event_log: EventLog::new(),
            pending_settlements: Vec::new(),
            pending_tick_events: Vec::new(),
        })
    }

    /// Validate configuration
    fn validate_config(config: &OrchestratorConfig) -> Result<(), SimulationError> {
        if config.ticks_per_day == 0 {
            return Err(SimulationError::InvalidConfig(
                "ticks_per_day must be > 0".to_string(),
            ));
        }
        if config.num_days == 0 {
            return Err(SimulationError::InvalidConfig(
                "num_days must be > 0".to_string(),
            ));
        }
        if config.agent_configs.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "Must have at least one agent".to_string(),
            ));
        }

        let mut ids = std::collections::HashSet::new();
        for agent_config in &config.agent_configs {
            if !ids.insert(&agent_config.id) {
                return Err(SimulationError::InvalidConfig(format!(
                    "Duplicate agent ID: {}",
                    agent_config.id
                )));
            }
            if agent_config.opening_balance < 0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "Agent {} opening_balance must be >= 0",
                    agent_config.id
                )));
            }
            if agent_config.unsecured_cap < 0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "Agent {} unsecured_cap must be >= 0",
                    agent_config.id
                )));
            }
            if agent_config.collateral_pledged < 0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "Agent {} collateral_pledged must be >= 0",
                    agent_config.id
                )));
            }
            if agent_config.collateral_capacity > 0
                && agent_config.collateral_pledged > agent_config.collateral_capacity
            {
                return Err(SimulationError::InvalidConfig(format!(
                    "Agent {} collateral_pledged exceeds collateral_capacity",
                    agent_config.id
                )));
            }
        }

        if config.priority_escalation.enabled && config.priority_escalation.start_escalating_at_ticks == 0
        {
            return Err(SimulationError::InvalidConfig(
                "priority_escalation.start_escalating_at_ticks must be > 0 when enabled"
                    .to_string(),
            ));
        }

        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn current_tick(&self) -> usize {
        self.time_manager.current_tick() as usize
    }

    pub fn current_day(&self) -> usize {
        self.time_manager.current_day() as usize
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Mutable access to simulation state. Primarily for testing; direct
    /// mutation bypasses orchestrator invariants.
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn event_count(&self) -> usize {
        self.event_log.len()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Events logged during a specific tick.
    pub fn get_tick_events(&self, tick: usize) -> Vec<&Event> {
        self.event_log.events().iter().filter(|e| e.tick() == tick).collect()
    }

    /// All events logged so far.
    pub fn get_all_events(&self) -> &[Event] {
        self.event_log.events()
    }

    pub fn get_costs(&self, agent_id: &str) -> Option<&CostAccumulator> {
        self.accumulated_costs.get(agent_id)
    }

    pub fn get_agent_accumulated_costs(&self, agent_id: &str) -> Option<&CostAccumulator> {
        self.accumulated_costs.get(agent_id)
    }

    pub fn all_costs(&self) -> &HashMap<String, CostAccumulator> {
        &self.accumulated_costs
    }

    /// Per-day metrics recorded for an agent.
    pub fn get_daily_agent_metrics(&self, agent_id: &str, day: usize) -> Option<&DailyMetrics> {
        self.daily_metrics
            .get(agent_id)
            .and_then(|v| v.iter().find(|m| m.day == day))
    }

    /// Current Queue 1 contents for an agent, in stored order.
    pub fn get_agent_queue1_contents(&self, agent_id: &str) -> Vec<String> {
        self.state
            .get_agent(agent_id)
            .map(|a| a.outgoing_queue().to_vec())
            .unwrap_or_default()
    }

    /// Current Queue 2 (RTGS queue) contents.
    pub fn get_rtgs_queue_contents(&self) -> Vec<String> {
        self.state.rtgs_queue().clone()
    }

    /// Transactions whose deadline is within `within_ticks` of the current tick.
    pub fn get_transactions_near_deadline(&self, within_ticks: usize) -> Vec<String> {
        let tick = self.current_tick();
        self.state
            .transactions()
            .values()
            .filter(|tx| {
                !tx.is_fully_settled()
                    && tx.deadline_tick().saturating_sub(tick) <= within_ticks
            })
            .map(|tx| tx.id().to_string())
            .collect()
    }

    /// Transactions currently overdue.
    pub fn get_overdue_transactions(&self) -> Vec<String> {
        self.state
            .transactions()
            .values()
            .filter(|tx| tx.is_overdue())
            .map(|tx| tx.id().to_string())
            .collect()
    }

    /// Full view of a single transaction, or `None` if the id is unknown.
    pub fn get_transaction_details(&self, tx_id: &str) -> Option<TransactionView> {
        self.state.get_transaction(tx_id).map(TransactionView::from)
    }

    /// Every LSM multilateral cycle settlement logged on the given day.
    pub fn get_lsm_cycles_for_day(&self, day: usize) -> Vec<LsmCycleView> {
        let ticks_per_day = self.time_manager.ticks_per_day();
        let day_start = day.saturating_mul(ticks_per_day);
        let day_end = day_start + ticks_per_day;
        self.event_log
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::LsmCycleSettlement {
                    tick,
                    agents,
                    tx_amounts,
                    total_value,
                    net_positions,
                    max_net_outflow,
                    max_net_outflow_agent,
                    tx_ids,
                } if *tick >= day_start && *tick < day_end => Some(LsmCycleView {
                    tick: *tick,
                    agents: agents.clone(),
                    tx_amounts: tx_amounts.clone(),
                    total_value: *total_value,
                    net_positions: net_positions.clone(),
                    max_net_outflow: *max_net_outflow,
                    max_net_outflow_agent: max_net_outflow_agent.clone(),
                    tx_ids: tx_ids.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// The policy configuration each agent was constructed with.
    pub fn get_agent_policies(&self) -> Vec<(String, PolicyConfig)> {
        self.policy_configs
            .iter()
            .map(|(id, cfg)| (id.clone(), cfg.clone()))
            .collect()
    }

    /// Whole-system aggregate metrics as of the current tick.
    pub fn get_system_metrics(&self) -> SystemMetrics {
        let total_settled = self
            .event_log
            .events()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::RtgsImmediateSettlement { .. } | Event::Queue2LiquidityRelease { .. }
                )
            })
            .count();
        let total_dropped = self
            .event_log
            .events()
            .iter()
            .filter(|e| matches!(e, Event::PolicyDrop { .. }))
            .count();
        let total_cost: i64 = self.accumulated_costs.values().map(|a| a.total()).sum();

        SystemMetrics {
            tick: self.current_tick(),
            day: self.current_day(),
            num_agents: self.state.num_agents(),
            total_balance: self.state.total_balance(),
            total_queue1_depth: self.state.total_internal_queue_size(),
            rtgs_queue_depth: self.state.queue_size(),
            total_settled,
            total_dropped,
            total_cost,
        }
    }

    /// Submit an externally-originated transaction directly into the
    /// sender's Queue 1, as if it had just arrived. Unlike generated
    /// arrivals this bypasses the arrival RNG entirely; it exists for
    /// callers (tests, the FFI boundary) driving the engine interactively.
    pub fn submit_transaction(
        &mut self,
        sender_id: &str,
        receiver_id: &str,
        amount: i64,
        deadline_tick: usize,
        priority: u8,
        divisible: bool,
    ) -> Result<String, SubmissionError> {
        if amount <= 0 {
            return Err(SubmissionError::InvalidAmount(amount));
        }
        if !self.state.agents().contains_key(sender_id) {
            return Err(SubmissionError::UnknownAgent(sender_id.to_string()));
        }
        if !self.state.agents().contains_key(receiver_id) {
            return Err(SubmissionError::UnknownAgent(receiver_id.to_string()));
        }
        let current_tick = self.current_tick();
        if deadline_tick <= current_tick {
            return Err(SubmissionError::DeadlineInPast {
                deadline_tick,
                current_tick,
            });
        }

        let mut tx = Transaction::new(
            sender_id.to_string(),
            receiver_id.to_string(),
            amount,
            current_tick,
            deadline_tick,
        )
        .with_priority(priority);
        if divisible {
            tx = tx.divisible();
        }
        tx.enter_queue1()
            .expect("freshly created transaction is always Pending");
        let tx_id = tx.id().to_string();

        self.log_event(Event::Arrival {
            tick: current_tick,
            tx_id: tx_id.clone(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            amount,
            deadline: deadline_tick,
            priority: tx.priority(),
            is_divisible: divisible,
        });

        self.state.add_transaction(tx);
        if let Some(agent) = self.state.get_agent_mut(sender_id) {
            agent.queue_outgoing(tx_id.clone());
        }

        Ok(tx_id)
    }

    /// Capture a complete, serializable snapshot of the current state.
    ///
    /// `config` must be the same `OrchestratorConfig` the engine was built
    /// with; its hash is embedded so `restore` can refuse to load a
    /// snapshot against a config it wasn't taken from.
    pub fn snapshot(&self, config: &OrchestratorConfig) -> Result<StateSnapshot, SimulationError> {
        let agents = self
            .state
            .agents()
            .values()
            .map(AgentSnapshot::from)
            .collect();
        let transactions = self
            .state
            .transactions()
            .values()
            .map(TransactionSnapshot::from)
            .collect();
        let (arrival_streams, arrival_next_tx_id) = match &self.arrival_generator {
            Some(gen) => (
                gen.streams()
                    .iter()
                    .map(|(id, rng)| (id.clone(), rng.get_state()))
                    .collect(),
                gen.next_tx_id(),
            ),
            None => (HashMap::new(), 0),
        };

        Ok(StateSnapshot {
            current_tick: self.current_tick(),
            current_day: self.current_day(),
            rng_seed: config.rng_seed,
            rng_state: self.rng_manager.get_state(),
            arrival_streams,
            arrival_next_tx_id,
            accumulated_costs: self.accumulated_costs.clone(),
            daily_metrics: self.daily_metrics.clone(),
            agents,
            transactions,
            rtgs_queue: self.state.rtgs_queue().clone(),
            config_hash: checkpoint::compute_config_hash(config)?,
        })
    }

    /// Reconstruct an orchestrator from a snapshot taken with `snapshot()`.
    ///
    /// `config` must hash identically to the config the snapshot was taken
    /// with; restoring against a different config is rejected so a caller
    /// cannot silently resume a run under different rules.
    pub fn restore(
        snapshot: StateSnapshot,
        config: OrchestratorConfig,
    ) -> Result<Self, SimulationError> {
        let expected_hash = checkpoint::compute_config_hash(&config)?;
        if expected_hash != snapshot.config_hash {
            return Err(SimulationError::StateValidationError(
                "snapshot config_hash does not match supplied config".to_string(),
            ));
        }

        let expected_total_balance: i64 = snapshot.agents.iter().map(|a| a.balance).sum();
        checkpoint::validate_snapshot(&snapshot, expected_total_balance)?;

        let mut orchestrator = Self::new(config)?;
        orchestrator.accumulated_costs = snapshot.accumulated_costs.clone();
        orchestrator.daily_metrics = snapshot.daily_metrics.clone();

        let agents: BTreeMap<String, Agent> = snapshot
            .agents
            .into_iter()
            .map(|a| (a.id.clone(), Agent::from(a)))
            .collect();
        let transactions: BTreeMap<String, Transaction> = snapshot
            .transactions
            .into_iter()
            .map(|t| (t.id.clone(), Transaction::from(t)))
            .collect();

        let mut state = SimulationState::from_parts(agents, transactions, snapshot.rtgs_queue)
            .map_err(SimulationError::StateValidationError)?;
        state.rebuild_queue2_index();
        orchestrator.state = state;

        orchestrator.time_manager = TimeManager::new(orchestrator.time_manager.ticks_per_day());
        for _ in 0..snapshot.current_tick {
            orchestrator.time_manager.advance_tick();
        }

        orchestrator.rng_manager = RngManager::new(snapshot.rng_state);

        if let Some(gen) = orchestrator.arrival_generator.as_mut() {
            let streams = snapshot
                .arrival_streams
                .into_iter()
                .map(|(id, state)| (id, RngManager::new(state)))
                .collect();
            gen.set_streams(streams);
            gen.set_next_tx_id(snapshot.arrival_next_tx_id);
        }

        orchestrator.event_log = EventLog::new();

        Ok(orchestrator)
    }

    // ========================================================================
    // Event Logging
    // ========================================================================

    fn log_event(&mut self, event: Event) {
        self.pending_tick_events.push(event);
    }

    // ========================================================================
    // Tick Loop Implementation
    // ========================================================================

    /// Execute one simulation tick.
    pub fn tick(&mut self) -> Result<TickResult, SimulationError> {
        use crate::settlement::{lsm, rtgs};

        let current_tick = self.current_tick();
        let mut num_settlements = 0;

        self.pending_settlements.clear();
        self.pending_tick_events.clear();

        // STEP 1: STRATEGIC COLLATERAL
        self.run_collateral_pass(current_tick, CollateralPhase::Strategic)?;

        // STEP 2: ARRIVALS
        let mut num_arrivals = 0;
        let mut arrival_events = Vec::new();

        if let Some(generator) = &mut self.arrival_generator {
            let agent_ids: Vec<String> = self.state.get_all_agent_ids();

            for agent_id in agent_ids {
                let new_transactions = generator.generate_for_agent(&agent_id, current_tick);
                num_arrivals += new_transactions.len();

                for mut tx in new_transactions {
                    tx.enter_queue1()
                        .expect("freshly created transaction is always Pending");
                    let tx_id = tx.id().to_string();

                    arrival_events.push(Event::Arrival {
                        tick: current_tick,
                        tx_id: tx_id.clone(),
                        sender_id: tx.sender_id().to_string(),
                        receiver_id: tx.receiver_id().to_string(),
                        amount: tx.amount(),
                        deadline: tx.deadline_tick(),
                        priority: tx.priority(),
                        is_divisible: tx.is_divisible(),
                    });

                    self.state.add_transaction(tx);

                    if let Some(agent) = self.state.get_agent_mut(&agent_id) {
                        agent.queue_outgoing(tx_id);
                    }
                }
            }
        }

        for event in arrival_events {
            self.log_event(event);
        }

        if self.queue1_ordering == Queue1Ordering::PriorityDeadline {
            self.reorder_all_queue1(current_tick);
        }

        // STEP 3: POLICY EVALUATION (Queue 1 -> release decisions)
        let agents_with_queues: Vec<String> = self
            .state
            .agents_with_queued_transactions()
            .into_iter()
            .collect();

        for agent_id in agents_with_queues {
            let decisions = {
                let agent = self
                    .state
                    .get_agent(&agent_id)
                    .ok_or_else(|| SimulationError::AgentNotFound(agent_id.clone()))?;
                let policy = self
                    .policies
                    .get_mut(&agent_id)
                    .ok_or_else(|| SimulationError::AgentNotFound(agent_id.clone()))?;
                policy.evaluate_queue(
                    agent,
                    &self.state,
                    current_tick,
                    &self.cost_rates,
                    self.time_manager.ticks_per_day() as usize,
                    self.eod_rush_threshold,
                )
            };

            if let Some((tx_id, err)) = self
                .policies
                .get_mut(&agent_id)
                .and_then(|p| p.as_any_mut().downcast_mut::<TreePolicy>())
                .and_then(|tp| tp.take_error())
            {
                return Err(SimulationError::PolicyError {
                    agent_id: agent_id.clone(),
                    node_id: tx_id,
                    source: err.to_string(),
                });
            }

            for decision in decisions {
                self.apply_release_decision(&agent_id, decision, current_tick)?;
            }
        }

        // STEP 4: PRIORITY ESCALATION
        if self.priority_escalation.enabled {
            self.run_priority_escalation(current_tick);
            if self.queue1_ordering == Queue1Ordering::PriorityDeadline {
                self.reorder_all_queue1(current_tick);
            }
        }

        if self.priority_mode {
            self.reorder_queue2_by_priority();
        }

        // STEP 5: RTGS SETTLEMENT (Queue 1 submissions, then drain Queue 2)
        let pending = self.pending_settlements.clone();
        for tx_id in pending.iter() {
            let (sender_id, receiver_id, amount) = {
                let tx = self
                    .state
                    .get_transaction(tx_id)
                    .ok_or_else(|| SimulationError::TransactionNotFound(tx_id.clone()))?;
                (
                    tx.sender_id().to_string(),
                    tx.receiver_id().to_string(),
                    tx.remaining_amount(),
                )
            };

            let settlement_result = self.try_settle_transaction(tx_id, current_tick)?;

            match settlement_result {
                SettlementOutcome::Settled => {
                    num_settlements += 1;
                    self.log_overdue_settlement_if_any(tx_id, current_tick);
                    self.log_event(Event::RtgsImmediateSettlement {
                        tick: current_tick,
                        tx_id: tx_id.clone(),
                        sender_id,
                        receiver_id,
                        amount,
                        sender_balance_after: self
                            .state
                            .get_agent(&sender_id_of(tx_id, &self.state))
                            .map(|a| a.balance())
                            .unwrap_or(0),
                        receiver_balance_after: self
                            .state
                            .get_transaction(tx_id)
                            .and_then(|tx| self.state.get_agent(tx.receiver_id()))
                            .map(|a| a.balance())
                            .unwrap_or(0),
                    });
                }
                SettlementOutcome::Queued => {
                    self.log_event(Event::QueuedRtgs {
                        tick: current_tick,
                        tx_id: tx_id.clone(),
                        sender_id,
                    });
                }
            }
        }

        let queue_result = rtgs::process_queue(&mut self.state, current_tick, self.priority_mode);
        num_settlements += queue_result.settled_count;
        for release in queue_result.released {
            self.log_overdue_settlement_if_any(&release.tx_id, current_tick);
            self.log_event(Event::Queue2LiquidityRelease {
                tick: current_tick,
                tx_id: release.tx_id,
                sender_id: release.sender_id,
                receiver_id: release.receiver_id,
                amount: release.amount,
                sender_balance_after: release.sender_balance_after,
                receiver_balance_after: release.receiver_balance_after,
            });
        }

        // STEP 6: LSM COORDINATOR
        let lsm_result = lsm::run_lsm_pass(
            &mut self.state,
            &self.lsm_config,
            current_tick,
            self.time_manager.ticks_per_day() as usize,
            self.priority_mode,
        );
        let num_lsm_releases = lsm_result.bilateral_offsets + lsm_result.cycles_settled;
        num_settlements += num_lsm_releases;

        for event in lsm_result.replay_events {
            self.log_event(event);
        }

        // STEP 7: END-OF-TICK COLLATERAL
        self.run_collateral_pass(current_tick, CollateralPhase::EndOfTick)?;

        // STEP 8: COST ACCRUAL
        let total_cost_delta = self.accrue_costs(current_tick);

        // STEP 9: COLLATERAL TIMER TICK
        self.fire_collateral_timers(current_tick);

        // STEP 10: ADVANCE TIME / END OF DAY
        self.time_manager.advance_tick();

        if self.time_manager.is_end_of_day() {
            self.handle_end_of_day()?;
        }

        for event in self.pending_tick_events.drain(..) {
            self.event_log.log(event);
        }

        Ok(TickResult {
            tick: current_tick,
            num_arrivals,
            num_settlements,
            num_lsm_releases,
            total_cost_delta,
        })
    }

    /// Apply a single `ReleaseDecision` returned by a Queue 1 policy.
    fn apply_release_decision(
        &mut self,
        agent_id: &str,
        decision: ReleaseDecision,
        current_tick: usize,
    ) -> Result<(), SimulationError> {
        match decision {
            ReleaseDecision::SubmitFull {
                tx_id,
                priority_override,
                ..
            } => {
                if let Some(agent) = self.state.get_agent_mut(agent_id) {
                    agent.remove_from_queue(&tx_id);
                }
                if let Some(priority) = priority_override {
                    if let Some(tx) = self.state.get_transaction_mut(&tx_id) {
                        tx.set_priority(priority);
                    }
                }
                if let Some(tx) = self.state.get_transaction_mut(&tx_id) {
                    tx.enter_queue2().map_err(|e| {
                        SimulationError::ConsistencyBug(format!(
                            "tx {} failed Queue1->Queue2 transition: {}",
                            tx_id, e
                        ))
                    })?;
                }
                self.pending_settlements.push(tx_id.clone());

                self.log_event(Event::PolicySubmit {
                    tick: current_tick,
                    agent_id: agent_id.to_string(),
                    tx_id: tx_id.clone(),
                });
                self.log_event(Event::RtgsSubmission {
                    tick: current_tick,
                    agent_id: agent_id.to_string(),
                    tx_id,
                });
            }
            ReleaseDecision::SubmitPartial { tx_id, num_splits } => {
                self.split_transaction(agent_id, &tx_id, num_splits, current_tick)?;
            }
            ReleaseDecision::Hold { tx_id, reason } => {
                self.log_event(Event::PolicyHold {
                    tick: current_tick,
                    agent_id: agent_id.to_string(),
                    tx_id,
                    reason: format!("{:?}", reason),
                });
            }
            ReleaseDecision::Drop { tx_id } => {
                if let Some(agent) = self.state.get_agent_mut(agent_id) {
                    agent.remove_from_queue(&tx_id);
                }
                if let Some(tx) = self.state.get_transaction_mut(&tx_id) {
                    tx.drop_transaction(current_tick).map_err(|e| {
                        SimulationError::ConsistencyBug(format!(
                            "tx {} failed transition to Dropped: {}",
                            tx_id, e
                        ))
                    })?;
                }
                self.log_event(Event::PolicyDrop {
                    tick: current_tick,
                    agent_id: agent_id.to_string(),
                    tx_id,
                    reason: "Expired deadline".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Split a parent transaction into `num_splits` equal (remainder-last)
    /// children, charging split friction once.
    fn split_transaction(
        &mut self,
        agent_id: &str,
        tx_id: &str,
        num_splits: usize,
        current_tick: usize,
    ) -> Result<(), SimulationError> {
        if num_splits < 2 {
            return Err(SimulationError::SettlementError(format!(
                "num_splits must be >= 2, got {}",
                num_splits
            )));
        }

        let parent_tx = self
            .state
            .get_transaction(tx_id)
            .ok_or_else(|| {
                SimulationError::SettlementError(format!(
                    "Transaction {} not found for splitting",
                    tx_id
                ))
            })?
            .clone();

        if let Some(agent) = self.state.get_agent_mut(agent_id) {
            agent.remove_from_queue(tx_id);
        }

        let total_amount = parent_tx.remaining_amount();
        let base_amount = total_amount / num_splits as i64;
        let remainder = total_amount % num_splits as i64;

        let mut child_ids = Vec::new();
        for i in 0..num_splits {
            let child_amount = if i == num_splits - 1 {
                base_amount + remainder
            } else {
                base_amount
            };

            let mut child = crate::models::Transaction::new_split(
                parent_tx.sender_id().to_string(),
                parent_tx.receiver_id().to_string(),
                child_amount,
                parent_tx.arrival_tick(),
                parent_tx.deadline_tick(),
                tx_id.to_string(),
                i as u32,
            );
            child = child.with_priority(parent_tx.priority());
            child.enter_queue1().and_then(|_| child.enter_queue2()).map_err(|e| {
                SimulationError::ConsistencyBug(format!(
                    "split child of {} failed to enter Queue 2: {}",
                    tx_id, e
                ))
            })?;

            let child_id = child.id().to_string();
            child_ids.push(child_id.clone());

            self.state.add_transaction(child);
            self.log_event(Event::RtgsSubmission {
                tick: current_tick,
                agent_id: agent_id.to_string(),
                tx_id: child_id.clone(),
            });
            self.pending_settlements.push(child_id);
        }

        if let Some(parent) = self.state.get_transaction_mut(tx_id) {
            parent.mark_split(child_ids.clone()).map_err(|e| {
                SimulationError::ConsistencyBug(format!(
                    "parent tx {} failed transition to Split: {}",
                    tx_id, e
                ))
            })?;
        }

        let friction_cost = self.cost_rates.split_fee * (num_splits as i64 - 1);
        if friction_cost > 0 {
            if let Some(accumulator) = self.accumulated_costs.get_mut(agent_id) {
                accumulator.total_split_friction_cost += friction_cost;
            }
            self.log_event(Event::CostAccrual {
                tick: current_tick,
                agent_id: agent_id.to_string(),
                costs: CostBreakdown {
                    split_friction_cost: friction_cost,
                    ..Default::default()
                },
            });
        }

        self.log_event(Event::PolicySplit {
            tick: current_tick,
            agent_id: agent_id.to_string(),
            tx_id: tx_id.to_string(),
            num_splits,
            child_ids,
        });

        Ok(())
    }

    /// Re-order every agent's Queue 1 by `(current_priority desc, deadline_tick
    /// asc, arrival_tick asc)` per §4.6/§4.9 — priority escalation is only
    /// observable if the queue is actually re-sorted by the boosted priority,
    /// not just by deadline.
    fn reorder_all_queue1(&mut self, _tick: usize) {
        let agent_ids = self.state.get_all_agent_ids();
        for agent_id in agent_ids {
            let keys: HashMap<String, (u8, usize, usize)> = {
                let agent = match self.state.get_agent(&agent_id) {
                    Some(a) => a,
                    None => continue,
                };
                agent
                    .outgoing_queue()
                    .iter()
                    .map(|tx_id| {
                        let key = self
                            .state
                            .get_transaction(tx_id)
                            .map(|tx| (tx.priority(), tx.deadline_tick(), tx.arrival_tick()))
                            .unwrap_or((0, usize::MAX, usize::MAX));
                        (tx_id.clone(), key)
                    })
                    .collect()
            };
            if let Some(agent) = self.state.get_agent_mut(&agent_id) {
                let mut queue = agent.outgoing_queue().to_vec();
                queue.sort_by_key(|tx_id| {
                    let (priority, deadline, arrival) =
                        keys.get(tx_id).copied().unwrap_or((0, usize::MAX, usize::MAX));
                    (std::cmp::Reverse(priority), deadline, arrival)
                });
                for tx_id in queue.drain(..) {
                    agent.remove_from_queue(&tx_id);
                    agent.queue_outgoing(tx_id);
                }
            }
        }
    }

    /// Re-order Queue 2 by priority band (urgent first), FIFO within band.
    fn reorder_queue2_by_priority(&mut self) {
        let priorities: HashMap<String, u8> = self
            .state
            .rtgs_queue()
            .iter()
            .map(|tx_id| {
                let p = self
                    .state
                    .get_transaction(tx_id)
                    .map(|tx| tx.priority())
                    .unwrap_or(0);
                (tx_id.clone(), p)
            })
            .collect();

        let queue = self.state.rtgs_queue_mut();
        queue.sort_by(|a, b| {
            let band_a = get_priority_band(*priorities.get(a).unwrap_or(&0));
            let band_b = get_priority_band(*priorities.get(b).unwrap_or(&0));
            band_b.cmp(&band_a)
        });
    }

    /// Run priority escalation (C10) over every not-yet-settled transaction
    /// currently sitting in a Queue 1 or Queue 2.
    fn run_priority_escalation(&mut self, tick: usize) {
        let config = self.priority_escalation;
        let t = config.start_escalating_at_ticks as i64;

        let mut candidate_ids: Vec<String> = Vec::new();
        for agent in self.state.agents().values() {
            candidate_ids.extend(agent.outgoing_queue().iter().cloned());
        }
        candidate_ids.extend(self.state.rtgs_queue().iter().cloned());

        let mut events = Vec::new();
        for tx_id in candidate_ids {
            let agent_id = match self.state.get_transaction(&tx_id) {
                Some(tx) => tx.sender_id().to_string(),
                None => continue,
            };

            let tx = match self.state.get_transaction_mut(&tx_id) {
                Some(tx) => tx,
                None => continue,
            };
            if tx.is_fully_settled() {
                continue;
            }

            let ticks_remaining = tx.deadline_tick().saturating_sub(tick) as i64;
            if ticks_remaining > t {
                continue;
            }

            let elapsed = (t - ticks_remaining).max(0);
            let boost = round_half_even_div(config.max_boost as i64 * elapsed, t).max(0) as u8;
            let new_priority = (tx.original_priority() + boost).min(10);
            let old_priority = tx.priority();

            if new_priority != old_priority {
                tx.set_priority(new_priority);
                events.push(Event::PriorityEscalated {
                    tick,
                    tx_id,
                    agent_id,
                    original_priority: tx.original_priority(),
                    old_priority,
                    new_priority,
                });
            }
        }

        for event in events {
            self.log_event(event);
        }
    }

    /// Evaluate the strategic or end-of-tick collateral tree for every agent
    /// whose policy exposes one, applying the resulting `CollateralDecision`.
    fn run_collateral_pass(
        &mut self,
        tick: usize,
        phase: CollateralPhase,
    ) -> Result<(), SimulationError> {
        let agent_ids = self.state.get_all_agent_ids();
        let ticks_per_day = self.time_manager.ticks_per_day() as usize;

        for agent_id in agent_ids {
            let decision = {
                let agent = match self.state.get_agent(&agent_id) {
                    Some(a) => a.clone(),
                    None => continue,
                };
                let policy = match self.policies.get_mut(&agent_id) {
                    Some(p) => p,
                    None => continue,
                };

                if let Some(tree_policy) = policy.as_any_mut().downcast_mut::<TreePolicy>() {
                    let result = match phase {
                        CollateralPhase::Strategic => tree_policy.evaluate_strategic_collateral(
                            &agent,
                            &self.state,
                            tick,
                            &self.cost_rates,
                            ticks_per_day,
                            self.eod_rush_threshold,
                        ),
                        CollateralPhase::EndOfTick => tree_policy.evaluate_end_of_tick_collateral(
                            &agent,
                            &self.state,
                            tick,
                            &self.cost_rates,
                            ticks_per_day,
                            self.eod_rush_threshold,
                        ),
                    };
                    result.map_err(|e| SimulationError::PolicyError {
                        agent_id: agent_id.clone(),
                        node_id: String::new(),
                        source: e.to_string(),
                    })?
                } else {
                    policy.evaluate_collateral(&agent, &self.state, tick, &self.cost_rates)
                }
            };

            self.apply_collateral_decision(&agent_id, decision, tick);
        }

        Ok(())
    }

    fn apply_collateral_decision(&mut self, agent_id: &str, decision: CollateralDecision, tick: usize) {
        match decision {
            CollateralDecision::Hold => {}
            CollateralDecision::Post {
                amount,
                reason,
                auto_withdraw_after_ticks,
            } => {
                if amount <= 0 {
                    return;
                }
                let new_total = {
                    let agent = match self.state.get_agent_mut(agent_id) {
                        Some(a) => a,
                        None => return,
                    };
                    match agent
                        .collateral_ledger_mut()
                        .post(amount, reason.clone(), tick, auto_withdraw_after_ticks)
                    {
                        Ok(()) => agent.collateral_ledger().posted(),
                        Err(_) => return,
                    }
                };
                self.log_event(Event::CollateralPost {
                    tick,
                    agent_id: agent_id.to_string(),
                    amount,
                    reason: reason.to_string(),
                    new_total,
                });
            }
            CollateralDecision::Withdraw { amount, reason } => {
                if amount <= 0 {
                    return;
                }
                let (withdrawn, new_total) = {
                    let agent = match self.state.get_agent_mut(agent_id) {
                        Some(a) => a,
                        None => return,
                    };
                    let withdrawn = agent.collateral_ledger_mut().withdraw(amount);
                    (withdrawn, agent.collateral_ledger().posted())
                };
                if withdrawn > 0 {
                    self.log_event(Event::CollateralWithdraw {
                        tick,
                        agent_id: agent_id.to_string(),
                        amount: withdrawn,
                        reason: reason.to_string(),
                        new_total,
                    });
                }
            }
        }
    }

    /// Fire any collateral auto-withdraw timers scheduled for this tick.
    fn fire_collateral_timers(&mut self, tick: usize) {
        let agent_ids = self.state.get_all_agent_ids();
        let mut events = Vec::new();

        for agent_id in agent_ids {
            let fired = {
                let agent = match self.state.get_agent_mut(&agent_id) {
                    Some(a) => a,
                    None => continue,
                };
                agent.collateral_ledger_mut().fire_timers(tick)
            };

            if fired.is_empty() {
                continue;
            }

            let new_total = self
                .state
                .get_agent(&agent_id)
                .map(|a| a.collateral_ledger().posted())
                .unwrap_or(0);

            for (amount, original_reason, posted_at_tick) in fired {
                events.push(Event::CollateralTimerWithdrawn {
                    tick,
                    agent_id: agent_id.clone(),
                    amount,
                    original_reason: original_reason.to_string(),
                    posted_at_tick,
                    new_total,
                });
            }
        }

        for event in events {
            self.log_event(event);
        }
    }

    /// Accrue costs for this tick (§4.3): liquidity, collateral opportunity,
    /// delay, and deadline penalty. Split friction is charged at decision
    /// time in `split_transaction`.
    fn accrue_costs(&mut self, tick: usize) -> i64 {
        let mut total_cost = 0;
        let ticks_per_day = self.time_manager.ticks_per_day() as i64;
        let agent_ids: Vec<String> = self.state.agents().keys().cloned().collect();

        // Overdraft + collateral opportunity cost, per agent.
        for agent_id in &agent_ids {
            let agent = match self.state.get_agent(agent_id) {
                Some(a) => a,
                None => continue,
            };

            let liquidity_cost = if agent.balance() < 0 {
                round_half_even_div(
                    agent.balance().abs() * self.cost_rates.overdraft_bps_per_day,
                    10_000 * ticks_per_day,
                )
            } else {
                0
            };

            let posted = agent.collateral_ledger().posted();
            let collateral_cost = if posted > 0 {
                round_half_even_div(
                    posted * self.cost_rates.collateral_bps_per_day,
                    10_000 * ticks_per_day,
                )
            } else {
                0
            };

            let costs = CostBreakdown {
                liquidity_cost,
                collateral_cost,
                delay_cost: 0,
                penalty_cost: 0,
                split_friction_cost: 0,
            };

            if let Some(accumulator) = self.accumulated_costs.get_mut(agent_id) {
                accumulator.add(&costs);
                accumulator.update_peak_debit(agent.balance());
            }
            total_cost += costs.total();

            if costs.total() > 0 {
                self.log_event(Event::CostAccrual {
                    tick,
                    agent_id: agent_id.clone(),
                    costs,
                });
            }
        }

        // Delay cost + overdue transition + deadline penalty, per transaction.
        let tx_ids: Vec<String> = self.state.transactions().keys().cloned().collect();
        let mut per_agent_delay_penalty: HashMap<String, CostBreakdown> = HashMap::new();
        let mut overdue_events = Vec::new();

        for tx_id in tx_ids {
            let (agent_id, was_overdue, is_past_deadline, in_queue1) = {
                let tx = match self.state.get_transaction(&tx_id) {
                    Some(tx) => tx,
                    None => continue,
                };
                if tx.is_fully_settled() {
                    continue;
                }
                let in_queue1 = self
                    .state
                    .get_agent(tx.sender_id())
                    .map(|a| a.outgoing_queue().contains(&tx_id))
                    .unwrap_or(false);
                (
                    tx.sender_id().to_string(),
                    tx.is_overdue(),
                    tx.is_past_deadline(tick),
                    in_queue1,
                )
            };

            if let Some(tx) = self.state.get_transaction_mut(&tx_id) {
                tx.tick_queue_residency();
            }

            let mut just_went_overdue = false;
            if is_past_deadline && !was_overdue {
                if let Some(tx) = self.state.get_transaction_mut(&tx_id) {
                    let _ = tx.mark_overdue(tick);
                }
                just_went_overdue = true;
                overdue_events.push(Event::TransactionWentOverdue {
                    tick,
                    tx_id: tx_id.clone(),
                    agent_id: agent_id.clone(),
                    deadline_tick: self
                        .state
                        .get_transaction(&tx_id)
                        .map(|tx| tx.deadline_tick())
                        .unwrap_or(tick),
                });
            }

            let entry = per_agent_delay_penalty.entry(agent_id).or_default();

            if in_queue1 {
                let base_delay = self.cost_rates.queue1_delay_per_tick;
                let delay = if is_past_deadline {
                    base_delay * self.cost_rates.overdue_delay_multiplier
                } else {
                    base_delay
                };
                entry.delay_cost += delay;
            }

            if just_went_overdue {
                entry.penalty_cost += self.cost_rates.deadline_base_penalty;
            } else if is_past_deadline {
                entry.penalty_cost += self.cost_rates.deadline_penalty_per_tick;
            }
        }

        for event in overdue_events {
            self.log_event(event);
        }

        for (agent_id, costs) in per_agent_delay_penalty {
            if costs.total() == 0 {
                continue;
            }
            if let Some(accumulator) = self.accumulated_costs.get_mut(&agent_id) {
                accumulator.add(&costs);
            }
            total_cost += costs.total();
            self.log_event(Event::CostAccrual {
                tick,
                agent_id,
                costs,
            });
        }

        total_cost
    }

    /// Emit `OverdueTransactionSettled` if the just-settled transaction had
    /// been overdue.
    fn log_overdue_settlement_if_any(&mut self, tx_id: &str, tick: usize) {
        if let Some(tx) = self.state.get_transaction(tx_id) {
            if let Some(since) = tx.overdue_since_tick() {
                self.log_event(Event::OverdueTransactionSettled {
                    tick,
                    tx_id: tx_id.to_string(),
                    ticks_overdue: tick.saturating_sub(since) + 1,
                });
            }
        }
    }

    /// Handle end-of-day processing: records per-agent daily metrics.
    fn handle_end_of_day(&mut self) -> Result<(), SimulationError> {
        let current_tick = self.current_tick();
        let current_day = self.current_day();

        let ticks_per_day = self.time_manager.ticks_per_day();
        let day_start_tick = current_day.saturating_mul(ticks_per_day);
        // The current tick's own events haven't been flushed from
        // `pending_tick_events` into `event_log` yet, so both must be
        // consulted to account for today's settlements/drops/penalties.
        let todays_events: Vec<&Event> = self
            .event_log
            .events()
            .iter()
            .chain(self.pending_tick_events.iter())
            .filter(|e| e.tick() >= day_start_tick && e.tick() <= current_tick)
            .collect();

        let mut total_penalties = 0;
        let agent_ids: Vec<String> = self.state.agents().keys().cloned().collect();

        for agent_id in &agent_ids {
            // Ensure the agent exists; the returned reference is unused
            // beyond the existence check below.
            self.state
                .get_agent(agent_id)
                .ok_or_else(|| SimulationError::AgentNotFound(agent_id.clone()))?;

            let num_settled = todays_events
                .iter()
                .filter(|e| {
                    matches!(e, Event::RtgsImmediateSettlement { sender_id, .. } if sender_id == agent_id)
                        || matches!(e, Event::Queue2LiquidityRelease { sender_id, .. } if sender_id == agent_id)
                })
                .count();
            let num_dropped = todays_events
                .iter()
                .filter(|e| matches!(e, Event::PolicyDrop { agent_id: a, .. } if a == agent_id))
                .count();

            let accumulator = self
                .accumulated_costs
                .get(agent_id)
                .cloned()
                .unwrap_or_default();

            let agent_penalties: i64 = todays_events
                .iter()
                .filter_map(|e| match e {
                    Event::CostAccrual { agent_id: a, costs, .. } if a == agent_id => {
                        Some(costs.penalty_cost)
                    }
                    _ => None,
                })
                .sum();
            total_penalties += agent_penalties;

            let metric = DailyMetrics {
                day: current_day,
                num_settled,
                num_dropped,
                total_cost: accumulator.total(),
                peak_net_debit: accumulator.peak_net_debit,
            };
            self.daily_metrics
                .entry(agent_id.clone())
                .or_default()
                .push(metric);
        }

        let unsettled_count = self.state.queue_size() + self.state.total_internal_queue_size();

        self.log_event(Event::EndOfDay {
            tick: current_tick,
            day: current_day,
            unsettled_count,
            total_penalties,
        });

        Ok(())
    }

    /// Try to settle a transaction that's already in the state.
    fn try_settle_transaction(
        &mut self,
        tx_id: &str,
        tick: usize,
    ) -> Result<SettlementOutcome, SimulationError> {
        let (sender_id, receiver_id, amount) = {
            let tx = self
                .state
                .get_transaction(tx_id)
                .ok_or_else(|| SimulationError::TransactionNotFound(tx_id.to_string()))?;
            (
                tx.sender_id().to_string(),
                tx.receiver_id().to_string(),
                tx.remaining_amount(),
            )
        };

        let can_pay = self
            .state
            .get_agent(&sender_id)
            .ok_or_else(|| SimulationError::AgentNotFound(sender_id.clone()))?
            .can_pay(amount);

        if can_pay {
            {
                let sender = self.state.get_agent_mut(&sender_id).unwrap();
                sender
                    .debit(amount)
                    .map_err(|e| SimulationError::SettlementError(format!("Debit failed: {}", e)))?;
            }
            {
                let receiver = self.state.get_agent_mut(&receiver_id).unwrap();
                receiver.credit(amount);
            }
            {
                let tx = self.state.get_transaction_mut(tx_id).unwrap();
                tx.settle(amount, tick)
                    .map_err(|e| SimulationError::SettlementError(format!("Settle failed: {}", e)))?;
            }

            Ok(SettlementOutcome::Settled)
        } else {
            self.state.queue_transaction(tx_id.to_string());
            Ok(SettlementOutcome::Queued)
        }
    }
}

/// Which collateral tree to evaluate in `run_collateral_pass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollateralPhase {
    Strategic,
    EndOfTick,
}

fn sender_id_of(tx_id: &str, state: &SimulationState) -> String {
    state
        .get_transaction(tx_id)
        .map(|tx| tx.sender_id().to_string())
        .unwrap_or_default()
}

// Silence unused-import warning for HoldReason re-export consumers.
#[allow(unused_imports)]
use HoldReason as _HoldReasonReexport;

// Manual Debug implementation (policies don't implement Debug)
impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("current_tick", &self.current_tick())
            .field("current_day", &self.current_day())
            .field("num_agents", &self.state.num_agents())
            .field("num_transactions", &self.state.num_transactions())
            .field("event_count", &self.event_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
