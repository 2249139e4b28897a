//! # mnasim_core
//!
//! The simulation core of an interactive electronic circuit simulator.
//!
//! This library provides:
//! - A circuit model built from elements attached to grid posts
//! - Topology discovery: posts become nodes, devices add hidden nodes and
//!   branch-current unknowns
//! - Modified Nodal Analysis (MNA) assembly through a restricted stamping handle
//! - A time-stepping loop that relinearises nonlinear devices every sub-iteration
//!
//! ## Architecture
//!
//! - [`circuit`] - The [`Circuit`] orchestrator, nodes and topology discovery
//! - [`elements`] - The [`Element`] trait and the bundled device models
//! - [`solver`] - MNA system storage, stamping, LU solving and the sub-iteration loop
//! - [`error`] - The [`SimError`] type
//!
//! ## Usage
//!
//! ```no_run
//! use mnasim_core::elements::{Ground, Resistor, VoltageSource};
//! use mnasim_core::Circuit;
//!
//! # fn main() -> mnasim_core::Result<()> {
//! let mut circuit = Circuit::new();
//! circuit.add(Ground::new((0, 0)));
//! circuit.add(VoltageSource::dc((0, 0), (0, 1), 10.0));
//! circuit.add(Resistor::new((0, 1), (1, 1), 100.0));
//! circuit.add(Resistor::new((1, 1), (0, 0), 100.0));
//!
//! circuit.analyze()?;
//! let report = circuit.step()?;
//! assert!(report.converged);
//! # Ok(())
//! # }
//! ```
//!
//! ## Circuit Simulation Method
//!
//! For each time step:
//!
//! 1. Restore the system stamped by `analyze()`
//! 2. Let every element re-stamp what depends on the last solution
//! 3. Solve Ax = b and hand voltages and branch currents back to the elements
//! 4. Repeat for nonlinear circuits until no element asks for another pass
//!
//! Reactive elements (C, L) are discretized using the trapezoidal rule.

pub mod circuit;
pub mod elements;
pub mod error;
pub mod solver;

// Re-export main types for convenience
pub use circuit::{Circuit, CircuitConfig};
pub use elements::Element;
pub use error::{Result, SimError};
pub use solver::StepReport;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.0258;
