//! `PyOrchestrator`: the pyclass wrapping `Orchestrator` 1:1.
//!
//! Construction and restoration both take a JSON config string rather than a
//! handle to a Rust `OrchestratorConfig`, since the Python side never holds
//! one directly. The config is kept around after construction purely so
//! `snapshot_json` has something to hash and embed — `Orchestrator` itself is
//! config-agnostic once built.

use pyo3::prelude::*;

use crate::orchestrator::{Orchestrator, OrchestratorConfig, StateSnapshot};

use super::types::{json_error_to_py, simulation_error_to_py, submission_error_to_py};

#[pyclass]
pub struct PyOrchestrator {
    inner: Orchestrator,
    config: OrchestratorConfig,
}

#[pymethods]
impl PyOrchestrator {
    #[new]
    fn new(config_json: &str) -> PyResult<Self> {
        let config: OrchestratorConfig =
            serde_json::from_str(config_json).map_err(json_error_to_py)?;
        let inner = Orchestrator::new(config.clone()).map_err(simulation_error_to_py)?;
        Ok(Self { inner, config })
    }

    /// Advance the simulation by one tick and return the `TickResult` as JSON.
    fn tick(&mut self) -> PyResult<String> {
        let result = self.inner.tick().map_err(simulation_error_to_py)?;
        serde_json::to_string(&result).map_err(json_error_to_py)
    }

    /// Submit a transaction into the sender's Queue 1. Returns the new
    /// transaction's id.
    #[pyo3(signature = (sender_id, receiver_id, amount, deadline_tick, priority, divisible=false))]
    fn submit_transaction(
        &mut self,
        sender_id: &str,
        receiver_id: &str,
        amount: i64,
        deadline_tick: usize,
        priority: u8,
        divisible: bool,
    ) -> PyResult<String> {
        self.inner
            .submit_transaction(
                sender_id,
                receiver_id,
                amount,
                deadline_tick,
                priority,
                divisible,
            )
            .map_err(submission_error_to_py)
    }

    fn current_tick(&self) -> usize {
        self.inner.current_tick()
    }

    fn current_day(&self) -> usize {
        self.inner.current_day()
    }

    fn get_all_events_json(&self) -> PyResult<String> {
        serde_json::to_string(self.inner.get_all_events()).map_err(json_error_to_py)
    }

    fn get_tick_events_json(&self, tick: usize) -> PyResult<String> {
        serde_json::to_string(&self.inner.get_tick_events(tick)).map_err(json_error_to_py)
    }

    fn get_system_metrics_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner.get_system_metrics()).map_err(json_error_to_py)
    }

    fn get_agent_accumulated_costs_json(&self, agent_id: &str) -> PyResult<String> {
        let costs = self.inner.get_agent_accumulated_costs(agent_id);
        serde_json::to_string(&costs).map_err(json_error_to_py)
    }

    fn get_transaction_details_json(&self, tx_id: &str) -> PyResult<String> {
        let view = self.inner.get_transaction_details(tx_id);
        serde_json::to_string(&view).map_err(json_error_to_py)
    }

    fn get_lsm_cycles_for_day_json(&self, day: usize) -> PyResult<String> {
        serde_json::to_string(&self.inner.get_lsm_cycles_for_day(day)).map_err(json_error_to_py)
    }

    fn get_agent_policies_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner.get_agent_policies()).map_err(json_error_to_py)
    }

    /// Serialize a complete checkpoint of the current state, embedding a hash
    /// of the config this orchestrator was built with.
    fn snapshot_json(&self) -> PyResult<String> {
        let snapshot = self
            .inner
            .snapshot(&self.config)
            .map_err(simulation_error_to_py)?;
        serde_json::to_string(&snapshot).map_err(json_error_to_py)
    }

    /// Rebuild an orchestrator from a config and a snapshot previously
    /// produced by `snapshot_json`. Fails if the snapshot's embedded config
    /// hash doesn't match the supplied config.
    #[staticmethod]
    fn restore(config_json: &str, snapshot_json: &str) -> PyResult<Self> {
        let config: OrchestratorConfig =
            serde_json::from_str(config_json).map_err(json_error_to_py)?;
        let snapshot: StateSnapshot =
            serde_json::from_str(snapshot_json).map_err(json_error_to_py)?;
        let inner =
            Orchestrator::restore(snapshot, config.clone()).map_err(simulation_error_to_py)?;
        Ok(Self { inner, config })
    }
}
