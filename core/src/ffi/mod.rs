//! Python bindings (feature-gated behind `pyo3`, default-on).
//!
//! The engine is pure Rust; this module is the only place that knows about
//! Python. It wraps the programmatic surface of `Orchestrator` 1:1: a
//! caller constructs from a JSON config string, drives `tick()`, and reads
//! back events/metrics as JSON strings via `serde_json`. The LLM-optimizer
//! and experiment-runner that consume this surface live on the other side
//! of this boundary and are out of scope here.

pub mod orchestrator;
pub mod types;

use pyo3::prelude::*;

#[pymodule]
fn rtgs_sim_core(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<orchestrator::PyOrchestrator>()?;
    Ok(())
}
