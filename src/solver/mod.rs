//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = b where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - b is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources to nodes
//! - D is usually 0 (for ideal voltage sources)
//! - v is the vector of node voltages
//! - j is the vector of voltage source currents
//! - i is the sum of current sources into each node
//! - e is the vector of voltage source values

mod iteration;
mod lu;
mod mna;
mod row_map;

pub use iteration::StepReport;
pub use lu::{LinearSolver, LuSolver};
pub use mna::{MnaSystem, Stamper};
pub use row_map::{RowKind, RowMapping};

pub(crate) use iteration::SubIteration;
pub(crate) use mna::IterationFlags;

/// Maximum sub-iterations per time step.
pub const MAX_SUBITERATIONS: usize = 5000;

/// Default simulation time step in seconds.
pub const DEFAULT_TIME_STEP: f64 = 5e-6;

/// Simulation clock handed to elements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepTiming {
    /// Time at the start of the step being solved
    pub time: f64,
    pub time_step: f64,
}
