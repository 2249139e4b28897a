//! Error types for the MNA simulation core.
//!
//! This module provides a unified error type [`SimError`] that covers
//! every failure a [`Circuit`](crate::Circuit) can report while analysing a
//! topology or advancing a time step.

use thiserror::Error;

use crate::circuit::ElementId;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for all simulation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    // ============ Topology Errors ============
    /// `analyze()` was called on a circuit without elements
    #[error("Circuit has no elements")]
    EmptyCircuit,

    /// `step()` was called before `analyze()`, or the element list changed since
    #[error("Circuit must be analyzed before stepping")]
    NotAnalyzed,

    // ============ Simulation Errors ============
    /// An earlier failure halted the simulation; `reset()` or `analyze()` clears it
    #[error("Simulation stopped: {message}")]
    Stopped { message: String },

    /// An element reported a state it cannot express in matrix form
    #[error("Element {element} failed: {message}")]
    ElementFailure { element: ElementId, message: String },

    /// A stamped matrix entry is NaN or infinite
    #[error("NaN/Infinite matrix value!")]
    NonFiniteMatrix,

    /// Matrix is singular and cannot be solved
    #[error("Singular matrix!")]
    SingularMatrix,

    // ============ Configuration Errors ============
    /// Invalid simulation time step
    #[error("Invalid time step {value:e}: must be positive and finite")]
    InvalidTimeStep { value: f64 },
}

impl SimError {
    /// Create a stopped-simulation error
    pub fn stopped(message: impl Into<String>) -> Self {
        Self::Stopped {
            message: message.into(),
        }
    }

    /// Create an element failure error
    pub fn element_failure(element: ElementId, message: impl Into<String>) -> Self {
        Self::ElementFailure {
            element,
            message: message.into(),
        }
    }

    /// The text recorded as the circuit's stop message for this failure.
    pub fn stop_message(&self) -> String {
        match self {
            Self::ElementFailure { message, .. } | Self::Stopped { message } => message.clone(),
            other => other.to_string(),
        }
    }
}
