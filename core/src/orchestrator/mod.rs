//! Orchestrator - main simulation loop (Phase 4b)
//!
//! Implements the complete tick loop integrating all simulation components.
//!
//! See `engine.rs` for full implementation.

pub mod checkpoint;
pub mod engine;

// Re-export main types for convenience
pub use engine::{
    get_priority_band, AgentConfig, CostAccumulator, CostBreakdown, CostRates, DailyMetrics,
    LsmCycleView, Orchestrator, OrchestratorConfig, PolicyConfig, PriorityBand,
    PriorityEscalationConfig, Queue1Ordering, SimulationError, SystemMetrics, TickResult,
    TransactionView,
};
pub(crate) use engine::round_half_even_div;

// Re-export checkpoint types
pub use checkpoint::{AgentSnapshot, StateSnapshot, TransactionSnapshot};
