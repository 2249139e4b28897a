//! Circuit representation and orchestration.
//!
//! The [`Circuit`] owns every element and the MNA system built from them.
//! `analyze()` turns the element list into nodes ([`Topology`]) and a
//! stamped system; `step()` advances the simulation by one time step.

mod graph;
mod node;
mod topology;
mod types;

pub use graph::{Circuit, CircuitConfig};
pub use node::{Node, NodeLink};
pub use topology::Topology;
pub use types::*;
