//! Error and value conversions for the FFI boundary.
//!
//! The engine's own error enums (`SimulationError`, `SubmissionError`)
//! carry structured fields meant for a Rust caller; across the FFI they
//! collapse to Python exceptions carrying the `Display` message, since a
//! Python caller has no use for `(agent_id, node_id)` as a typed tuple.

use crate::orchestrator::SimulationError;
use crate::orchestrator::engine::SubmissionError;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::PyErr;

pub fn simulation_error_to_py(err: SimulationError) -> PyErr {
    PyRuntimeError::new_err(format!("{:?}", err))
}

pub fn submission_error_to_py(err: SubmissionError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

pub fn json_error_to_py(err: serde_json::Error) -> PyErr {
    PyValueError::new_err(format!("invalid JSON: {}", err))
}
