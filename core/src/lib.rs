//! RTGS Simulation Core - Rust Engine
//!
//! Deterministic interbank Real-Time Gross Settlement simulator with a
//! Liquidity-Saving Mechanism (bilateral offset + multilateral cycle
//! netting) and per-agent policies expressed as a small decision-tree DSL.
//!
//! # Architecture
//!
//! - **core**: Time management and initialization
//! - **models**: Domain types (Agent, Transaction, State, Event, Collateral)
//! - **policy**: The decision-tree policy evaluator
//! - **arrivals**: Per-agent stochastic transaction arrival generator
//! - **settlement**: Settlement engines (RTGS queue, LSM)
//! - **orchestrator**: Main simulation loop, config, cost accrual, checkpoints
//! - **rng**: Deterministic random number generation
//!
//! # Critical invariants
//!
//! 1. All money values are `i64` cents; no floating-point in settlement,
//!    cost accrual, or policy decisions.
//! 2. All randomness is deterministic (seeded RNG with per-agent substreams).
//! 3. A tick is atomic: it either commits fully or raises before any event
//!    for that tick is observable.

pub mod arrivals;
pub mod core;
#[cfg(feature = "pyo3")]
pub mod ffi;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod rng;
pub mod settlement;

// Re-exports for convenience
pub use core::time::TimeManager;
pub use models::{
    agent::{Agent, AgentError},
    collateral::{CollateralEvent, CollateralLedger, CollateralReason, CollateralTimer},
    event::{Event, EventLog},
    state::SimulationState,
    transaction::{Transaction, TransactionError, TransactionStatus},
};
pub use orchestrator::Orchestrator;
pub use rng::RngManager;
pub use settlement::{try_settle, SettlementError};
