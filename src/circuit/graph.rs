//! The circuit: element list, analysis and time stepping.

use log::{debug, warn};

use super::node::Node;
use super::topology::Topology;
use super::types::{ElementId, NodeId, Post};
use crate::elements::Element;
use crate::error::{Result, SimError};
use crate::solver::{
    IterationFlags, LinearSolver, LuSolver, MnaSystem, RowMapping, StepReport, StepTiming,
    SubIteration, DEFAULT_TIME_STEP, MAX_SUBITERATIONS,
};

/// Configuration for a circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitConfig {
    /// Simulation time step in seconds.
    pub time_step: f64,
    /// Maximum sub-iterations per time step for nonlinear circuits.
    pub max_subiterations: usize,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            time_step: DEFAULT_TIME_STEP,
            max_subiterations: MAX_SUBITERATIONS,
        }
    }
}

impl CircuitConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the simulation time step (seconds).
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    /// Set the sub-iteration cap.
    ///
    /// A nonlinear circuit that still moves after this many passes ends the
    /// step with `converged == false`; it is not an error.
    pub fn with_max_subiterations(mut self, max_subiterations: usize) -> Self {
        self.max_subiterations = max_subiterations;
        self
    }
}

/// A circuit ready for simulation.
///
/// Build it with [`add`](Self::add), call [`analyze`](Self::analyze) once the
/// element list is final, then advance it with [`step`](Self::step).
#[derive(Debug)]
pub struct Circuit {
    elements: Vec<Box<dyn Element>>,
    /// Present after a successful `analyze()`
    topology: Option<Topology>,
    system: Option<MnaSystem>,
    solver: Box<dyn LinearSolver>,
    config: CircuitConfig,
    time: f64,
    stop_message: Option<String>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// Create an empty circuit with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitConfig::default())
    }

    pub fn with_config(config: CircuitConfig) -> Self {
        Self {
            elements: Vec::new(),
            topology: None,
            system: None,
            solver: Box::new(LuSolver::new()),
            config,
            time: 0.0,
            stop_message: None,
        }
    }

    /// Replace the linear solver.
    pub fn with_solver(mut self, solver: impl LinearSolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self.invalidate();
        self
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    // ==================== Elements ====================

    /// Add an element. The circuit must be re-analysed before the next step.
    pub fn add(&mut self, element: impl Element + 'static) -> ElementId {
        self.add_boxed(Box::new(element))
    }

    pub fn add_boxed(&mut self, element: Box<dyn Element>) -> ElementId {
        self.elements.push(element);
        self.invalidate();
        ElementId(self.elements.len() - 1)
    }

    /// Remove an element, shifting the ids of every later element down by one.
    pub fn remove(&mut self, id: ElementId) -> Option<Box<dyn Element>> {
        if id.0 >= self.elements.len() {
            return None;
        }
        self.invalidate();
        Some(self.elements.remove(id.0))
    }

    pub fn element(&self, id: ElementId) -> Option<&dyn Element> {
        self.elements.get(id.0).map(|e| e.as_ref())
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut (dyn Element + 'static)> {
        self.elements.get_mut(id.0).map(|e| e.as_mut())
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = &dyn Element> + '_ {
        self.elements.iter().map(|e| e.as_ref())
    }

    // ==================== Nodes ====================

    /// Node by index; ground is node 0. `None` before `analyze()`.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.topology.as_ref()?.nodes.get(id.0)
    }

    /// Nodes including ground, or 0 before `analyze()`.
    pub fn node_count(&self) -> usize {
        self.topology.as_ref().map_or(0, Topology::node_count)
    }

    /// The external node at `post`.
    pub fn find_node(&self, post: impl Into<Post>) -> Option<NodeId> {
        self.topology.as_ref()?.find_node(post.into())
    }

    /// Last solved voltage of a node.
    pub fn node_voltage(&self, id: NodeId) -> Option<f64> {
        if id.is_ground() {
            return Some(0.0);
        }
        let link = self.node(id)?.links.first()?;
        self.elements
            .get(link.element.0)
            .map(|e| e.voltage(link.terminal))
    }

    // ==================== Simulation ====================

    /// Discover the topology and stamp every element into a fresh system.
    ///
    /// Clears any stop message. Re-analysing an unchanged circuit produces
    /// the same system.
    pub fn analyze(&mut self) -> Result<()> {
        self.invalidate();
        self.stop_message = None;

        if self.elements.is_empty() {
            return Err(SimError::EmptyCircuit);
        }

        let topology = Topology::discover(&mut self.elements);
        let system = self.stamp_system(&topology)?;

        debug!(
            "analyzed {} elements: {} nodes, {} voltage sources, {}x{} matrix{}",
            self.elements.len(),
            topology.node_count(),
            topology.voltage_source_count(),
            system.size(),
            system.size(),
            if topology.nonlinear { ", nonlinear" } else { "" }
        );

        self.topology = Some(topology);
        self.system = Some(system);
        Ok(())
    }

    /// Advance the simulation by one time step.
    ///
    /// Hard failures halt the circuit: the error's text becomes the
    /// [`stop_message`](Self::stop_message) and later steps return
    /// [`SimError::Stopped`] until `reset()` or `analyze()`.
    pub fn step(&mut self) -> Result<StepReport> {
        let timing = self.timing();
        let (Some(topology), Some(system)) = (self.topology.as_ref(), self.system.as_mut()) else {
            return Err(SimError::NotAnalyzed);
        };
        if let Some(message) = &self.stop_message {
            return Err(SimError::stopped(message.clone()));
        }

        let result = SubIteration::new(self.config.max_subiterations).run(
            &mut self.elements,
            topology,
            system,
            self.solver.as_mut(),
            timing,
        );

        match result {
            Ok(report) => {
                self.time += timing.time_step;
                Ok(report)
            }
            Err(e) => {
                warn!("step at t={:e} failed: {}", timing.time, e);
                self.stop_message = Some(e.stop_message());
                Err(e)
            }
        }
    }

    /// Return every element to its zero state and the clock to 0.
    pub fn reset(&mut self) {
        for element in &mut self.elements {
            element.reset();
        }
        self.time = 0.0;
        self.stop_message = None;
    }

    /// Set the time step.
    ///
    /// An analysed circuit is re-stamped at once so companion models match
    /// the new step; topology and element state are kept.
    pub fn set_time_step(&mut self, time_step: f64) -> Result<()> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(SimError::InvalidTimeStep { value: time_step });
        }
        self.config.time_step = time_step;

        if let Some(topology) = self.topology.take() {
            self.system = None;
            let system = self.stamp_system(&topology)?;
            debug!("re-stamped {}x{} matrix for time step {:e}", system.size(), system.size(), time_step);
            self.topology = Some(topology);
            self.system = Some(system);
        }
        Ok(())
    }

    /// Configured time step.
    pub fn time_step(&self) -> f64 {
        self.config.time_step
    }

    /// Simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Why the simulation halted, if it did.
    pub fn stop_message(&self) -> Option<&str> {
        self.stop_message.as_deref()
    }

    pub fn is_analyzed(&self) -> bool {
        self.system.is_some()
    }

    pub fn is_nonlinear(&self) -> bool {
        self.topology.as_ref().is_some_and(|t| t.nonlinear)
    }

    /// Dimension of the MNA system, or 0 before `analyze()`.
    pub fn matrix_size(&self) -> usize {
        self.system.as_ref().map_or(0, MnaSystem::size)
    }

    pub fn row_mapping(&self) -> Option<&[RowMapping]> {
        self.system.as_ref().map(MnaSystem::rows)
    }

    /// Read-only view of the linear system.
    pub fn system(&self) -> Option<&MnaSystem> {
        self.system.as_ref()
    }

    fn timing(&self) -> StepTiming {
        StepTiming {
            time: self.time,
            time_step: self.config.time_step,
        }
    }

    /// Stamp every element into a fresh system for `topology`.
    fn stamp_system(&mut self, topology: &Topology) -> Result<MnaSystem> {
        let mut system = MnaSystem::new(topology.node_count(), topology.voltage_source_count());
        let timing = self.timing();
        let mut flags = IterationFlags::default();
        for (idx, element) in self.elements.iter_mut().enumerate() {
            element.stamp(&mut system.stamper(timing, &mut flags));
            if let Some(message) = flags.failure.take() {
                warn!("{} {} stopped analysis: {}", element.kind(), ElementId(idx), message);
                self.stop_message = Some(message.clone());
                return Err(SimError::element_failure(ElementId(idx), message));
            }
        }
        system.save_original();
        Ok(system)
    }

    fn invalidate(&mut self) {
        self.topology = None;
        self.system = None;
    }
}
