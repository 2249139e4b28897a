//! Sub-iteration loop for one time step.

use log::{debug, trace, warn};

use crate::circuit::{ElementId, Topology, Unknown};
use crate::elements::Element;
use crate::error::{Result, SimError};

use super::mna::{IterationFlags, MnaSystem};
use super::{LinearSolver, StepTiming, MAX_SUBITERATIONS};

/// Outcome of a successful `step()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// No NaN was produced and no element asked for another pass.
    ///
    /// This is a presence-of-NaN test, not a residual tolerance; a
    /// nonlinear circuit that hits the sub-iteration cap reports `false`.
    pub converged: bool,
    /// Sub-iterations performed
    pub subiterations: usize,
}

/// Fixed-point relinearisation loop.
///
/// Each pass restores the system stamped by `analyze()`, lets every element
/// re-stamp, solves, and pushes the solution back to the elements. Linear
/// circuits take exactly one pass; nonlinear circuits take at least two.
#[derive(Debug, Clone)]
pub(crate) struct SubIteration {
    /// Maximum passes
    pub max_subiterations: usize,
}

impl Default for SubIteration {
    fn default() -> Self {
        Self::new(MAX_SUBITERATIONS)
    }
}

impl SubIteration {
    pub fn new(max_subiterations: usize) -> Self {
        Self { max_subiterations }
    }

    /// Run one time step.
    pub(crate) fn run(
        &self,
        elements: &mut [Box<dyn Element>],
        topology: &Topology,
        system: &mut MnaSystem,
        solver: &mut dyn LinearSolver,
        timing: StepTiming,
    ) -> Result<StepReport> {
        for element in elements.iter_mut() {
            element.start_iteration(timing);
        }

        let mut flags = IterationFlags::default();
        let mut subiterations = 0;

        while subiterations < self.max_subiterations {
            flags.converged = true;

            system.restore_right_side();
            if topology.nonlinear {
                system.restore_matrix();
            }

            let mut failed = None;
            for (idx, element) in elements.iter_mut().enumerate() {
                element.do_step(&mut system.stamper(timing, &mut flags));
                if failed.is_none() && flags.failure.is_some() {
                    failed = Some(ElementId(idx));
                }
            }
            if let (Some(element), Some(message)) = (failed, flags.failure.take()) {
                return Err(SimError::element_failure(element, message));
            }

            if system.has_non_finite() {
                return Err(SimError::NonFiniteMatrix);
            }

            if !system.is_factored() {
                solver.factor(system.matrix(), system.size())?;
                system.set_factored(true);
            }
            let (b, x) = system.solve_parts();
            solver.solve(b, x)?;

            distribute(elements, topology, system, &mut flags);
            subiterations += 1;
            trace!(
                "sub-iteration {} at t={:e}: converged={}",
                subiterations,
                timing.time,
                flags.converged
            );

            if !topology.nonlinear {
                break;
            }
            if flags.converged && subiterations > 1 {
                break;
            }
        }

        if topology.nonlinear {
            if flags.converged {
                debug!("converged after {} sub-iterations", subiterations);
            } else {
                warn!(
                    "no convergence after {} sub-iterations at t={:e}",
                    subiterations, timing.time
                );
            }
        }

        Ok(StepReport {
            converged: flags.converged,
            subiterations,
        })
    }
}

/// Push solved node voltages and branch currents back to the elements.
fn distribute(
    elements: &mut [Box<dyn Element>],
    topology: &Topology,
    system: &MnaSystem,
    flags: &mut IterationFlags,
) {
    let node_count = topology.node_count();
    for (row, mapping) in system.rows().iter().enumerate() {
        let value = mapping.resolve(system.solution());
        if value.is_nan() {
            flags.converged = false;
            break;
        }

        match Unknown::from_row(row, node_count) {
            Unknown::Voltage(node) => {
                for link in &topology.nodes[node.0].links {
                    elements[link.element.0].set_node_voltage(link.terminal, value);
                }
            }
            Unknown::Current(vs) => {
                if let Some(&(owner, local)) = topology.voltage_sources.get(vs) {
                    elements[owner.0].set_current(local, value);
                }
            }
        }
    }
}
