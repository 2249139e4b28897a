//! Circuit element models.
//!
//! This module provides the [`Element`] trait every device implements and
//! the devices shipped with the core:
//! - Wiring: Ground, Wire
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Current Source, Battery
//! - Nonlinear: Diode, Transistor (NPN/PNP)
//!
//! Each element stamps itself into the MNA system through a
//! [`Stamper`](crate::solver::Stamper) and receives its solved terminal
//! voltages and branch currents back from the circuit.

mod diode;
mod linear;
mod sources;
mod transistor;
mod wiring;

pub use diode::{Diode, DiodeParams};
pub use linear::{Capacitor, Inductor, Resistor};
pub use sources::{Battery, CurrentSource, VoltageSource, Waveform};
pub use transistor::{BjtParams, BjtType, Region, TerminalCurrents, Transistor};
pub use wiring::{Ground, Wire};

use std::fmt;

use crate::circuit::{NodeId, Post};
use crate::solver::{Stamper, StepTiming};

/// Terminal bookkeeping shared by every element.
///
/// Terminals are numbered posts first, then internal nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementCore {
    posts: Vec<Post>,
    /// Terminal -> assigned node
    nodes: Vec<NodeId>,
    /// Terminal -> last solved voltage
    volts: Vec<f64>,
    /// Index of the first voltage source assigned to this element
    voltage_source: usize,
    /// Current through the element, entering at post 0
    pub current: f64,
}

impl ElementCore {
    /// Create the core for an element with the given posts and internal node count.
    pub fn new(posts: &[Post], internal_nodes: usize) -> Self {
        let terminals = posts.len() + internal_nodes;
        Self {
            posts: posts.to_vec(),
            nodes: vec![NodeId::GROUND; terminals],
            volts: vec![0.0; terminals],
            voltage_source: 0,
            current: 0.0,
        }
    }

    /// Convenience for the common two-post case.
    pub fn two_post(a: Post, b: Post) -> Self {
        Self::new(&[a, b], 0)
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Number of internal nodes this element owns.
    pub fn internal_nodes(&self) -> usize {
        self.nodes.len() - self.posts.len()
    }

    /// Node assigned to `terminal`.
    pub fn node(&self, terminal: usize) -> NodeId {
        self.nodes[terminal]
    }

    pub fn set_node(&mut self, terminal: usize, node: NodeId) {
        self.nodes[terminal] = node;
    }

    /// Last solved voltage at `terminal`.
    pub fn voltage(&self, terminal: usize) -> f64 {
        self.volts[terminal]
    }

    pub fn volts(&self) -> &[f64] {
        &self.volts
    }

    pub fn set_voltage(&mut self, terminal: usize, voltage: f64) {
        self.volts[terminal] = voltage;
    }

    /// Voltage of post 0 relative to post 1.
    pub fn voltage_diff(&self) -> f64 {
        self.volts[0] - self.volts[1]
    }

    /// First voltage source index assigned during analysis.
    pub fn voltage_source(&self) -> usize {
        self.voltage_source
    }

    pub fn set_voltage_source(&mut self, index: usize) {
        self.voltage_source = index;
    }

    /// Zero every terminal voltage and the current.
    pub fn reset(&mut self) {
        self.volts.fill(0.0);
        self.current = 0.0;
    }
}

/// A device that can be placed in a [`Circuit`](crate::Circuit).
///
/// Implementors own an [`ElementCore`] and override only the hooks their
/// physics needs. The call order during a simulation is:
///
/// 1. `stamp()` once per `analyze()`, after nodes and voltage sources
///    are assigned;
/// 2. per `step()`: `start_iteration()` once, then for every sub-iteration
///    `do_step()` followed by `set_node_voltage()` for each terminal and
///    `set_current()` for each voltage source.
///
/// Elements never fail by returning an error. A device that cannot
/// represent its state calls [`Stamper::stop`], or produces a NaN/infinite
/// stamp which the circuit detects.
pub trait Element: fmt::Debug {
    fn core(&self) -> &ElementCore;

    fn core_mut(&mut self) -> &mut ElementCore;

    /// Short device name used in logs.
    fn kind(&self) -> &'static str;

    /// External terminals.
    fn post_count(&self) -> usize {
        self.core().posts().len()
    }

    /// Hidden nodes synthesized for this element.
    fn internal_node_count(&self) -> usize {
        self.core().internal_nodes()
    }

    /// Branch currents this element adds as unknowns.
    fn voltage_source_count(&self) -> usize {
        0
    }

    /// Whether `do_step()` re-stamps the matrix.
    fn is_nonlinear(&self) -> bool {
        false
    }

    /// Write the constant contribution into the system.
    fn stamp(&mut self, stamper: &mut Stamper<'_>);

    /// Prepare per-step quantities before the sub-iteration loop.
    fn start_iteration(&mut self, _timing: StepTiming) {}

    /// Re-stamp anything that depends on the previous sub-iteration.
    fn do_step(&mut self, _stamper: &mut Stamper<'_>) {}

    /// Derive `current` from the terminal voltages.
    fn calculate_current(&mut self) {}

    /// Deliver the solved voltage of one terminal.
    fn set_node_voltage(&mut self, terminal: usize, voltage: f64) {
        self.core_mut().set_voltage(terminal, voltage);
        self.calculate_current();
    }

    /// Deliver the solved branch current of voltage source `index`.
    fn set_current(&mut self, _index: usize, current: f64) {
        self.core_mut().current = current;
    }

    /// Record the circuit-wide index of this element's `local`-th voltage source.
    fn set_voltage_source(&mut self, local: usize, index: usize) {
        if local == 0 {
            self.core_mut().set_voltage_source(index);
        }
    }

    /// Return to the zero state.
    fn reset(&mut self) {
        self.core_mut().reset();
    }

    fn post(&self, n: usize) -> Post {
        self.core().posts()[n]
    }

    fn node(&self, terminal: usize) -> NodeId {
        self.core().node(terminal)
    }

    fn voltage(&self, terminal: usize) -> f64 {
        self.core().voltage(terminal)
    }

    fn voltage_diff(&self) -> f64 {
        self.core().voltage_diff()
    }

    /// Current entering at post 0.
    fn current(&self) -> f64 {
        self.core().current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_layout() {
        let mut core = ElementCore::new(&[Post::new(0, 0), Post::new(1, 0)], 1);
        assert_eq!(core.internal_nodes(), 1);
        assert_eq!(core.volts().len(), 3);

        core.set_node(2, NodeId(7));
        core.set_voltage(0, 3.0);
        core.set_voltage(1, 1.0);
        core.current = 0.5;
        assert_eq!(core.node(2), NodeId(7));
        assert_eq!(core.voltage_diff(), 2.0);

        core.reset();
        assert!(core.volts().iter().all(|&v| v == 0.0));
        assert_eq!(core.current, 0.0);
        // Node assignment survives a reset
        assert_eq!(core.node(2), NodeId(7));
    }
}
