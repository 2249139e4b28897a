//! MNA system storage and the stamping handle handed to elements.

use crate::circuit::NodeId;

use super::row_map::{RowKind, RowMapping};
use super::StepTiming;

/// MNA system Ax = b, plus the originals captured after the first stamp pass.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// Matrix dimension
    size: usize,
    /// Nodes in the circuit, ground included
    node_count: usize,
    /// System matrix A (row-major)
    a: Vec<f64>,
    /// Right-hand side vector b
    b: Vec<f64>,
    /// A as stamped by `analyze()`
    a0: Vec<f64>,
    /// b as stamped by `analyze()`
    b0: Vec<f64>,
    /// Solution vector x
    x: Vec<f64>,
    rows: Vec<RowMapping>,
    /// The solver holds a factorisation of the current A
    factored: bool,
}

impl MnaSystem {
    /// Allocate a zeroed system for `node_count` nodes (ground included)
    /// and `voltage_sources` branch-current unknowns.
    pub fn new(node_count: usize, voltage_sources: usize) -> Self {
        let size = node_count.saturating_sub(1) + voltage_sources;
        Self {
            size,
            node_count,
            a: vec![0.0; size * size],
            b: vec![0.0; size],
            a0: vec![0.0; size * size],
            b0: vec![0.0; size],
            x: vec![0.0; size],
            rows: (0..size).map(RowMapping::identity).collect(),
            factored: false,
        }
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Nodes in the circuit, ground included.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Get matrix element at 0-based (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// The system matrix, row-major.
    pub fn matrix(&self) -> &[f64] {
        &self.a
    }

    pub fn right_side(&self) -> &[f64] {
        &self.b
    }

    /// The matrix captured right after `analyze()` stamped every element.
    pub fn original_matrix(&self) -> &[f64] {
        &self.a0
    }

    pub fn original_right_side(&self) -> &[f64] {
        &self.b0
    }

    /// The last solution.
    pub fn solution(&self) -> &[f64] {
        &self.x
    }

    pub fn rows(&self) -> &[RowMapping] {
        &self.rows
    }

    /// Whether any matrix entry is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        self.a.iter().any(|v| !v.is_finite())
    }

    /// Capture the current A and b as the originals.
    pub(crate) fn save_original(&mut self) {
        self.a0.copy_from_slice(&self.a);
        self.b0.copy_from_slice(&self.b);
    }

    pub(crate) fn restore_right_side(&mut self) {
        self.b.copy_from_slice(&self.b0);
    }

    pub(crate) fn restore_matrix(&mut self) {
        self.a.copy_from_slice(&self.a0);
        self.factored = false;
    }

    pub(crate) fn is_factored(&self) -> bool {
        self.factored
    }

    pub(crate) fn set_factored(&mut self, factored: bool) {
        self.factored = factored;
    }

    /// Split borrow used by the solve step: (b, x).
    pub(crate) fn solve_parts(&mut self) -> (&[f64], &mut [f64]) {
        (&self.b, &mut self.x)
    }

    /// Open a stamping handle over this system.
    pub(crate) fn stamper<'a>(
        &'a mut self,
        timing: StepTiming,
        flags: &'a mut IterationFlags,
    ) -> Stamper<'a> {
        Stamper {
            system: self,
            timing,
            flags,
        }
    }
}

/// Per-sub-iteration signals raised by elements.
#[derive(Debug, Default)]
pub(crate) struct IterationFlags {
    pub converged: bool,
    pub failure: Option<String>,
}

/// Restricted view of the circuit's linear system.
///
/// Elements receive a `Stamper` in [`stamp`](crate::elements::Element::stamp)
/// and [`do_step`](crate::elements::Element::do_step); it is the only way
/// they can contribute to the matrix. Rows and columns are 1-based with 0
/// standing for ground: anything stamped at row or column 0 is dropped.
pub struct Stamper<'a> {
    system: &'a mut MnaSystem,
    timing: StepTiming,
    flags: &'a mut IterationFlags,
}

impl Stamper<'_> {
    /// Simulation time at the start of the current step.
    pub fn time(&self) -> f64 {
        self.timing.time
    }

    /// Configured time step.
    pub fn time_step(&self) -> f64 {
        self.timing.time_step
    }

    /// 1-based row of the branch-current unknown for voltage source `vs`.
    pub fn voltage_source_row(&self, vs: usize) -> usize {
        self.system.node_count + vs
    }

    /// Add `value` to A[row-1][col-1].
    ///
    /// A column mapped to a constant contributes `-value * constant` to the
    /// right-hand side instead.
    pub fn stamp_matrix(&mut self, row: usize, col: usize, value: f64) {
        if row == 0 || col == 0 {
            return;
        }
        let sys = &mut *self.system;
        let r = sys.rows[row - 1].map_row;
        let col_info = &sys.rows[col - 1];
        if let Some(constant) = col_info.constant() {
            sys.b[r] -= constant * value;
            return;
        }
        let c = col_info.map_col;
        sys.a[r * sys.size + c] += value;
    }

    /// Add `value` to b[row-1].
    pub fn stamp_right_side(&mut self, row: usize, value: f64) {
        if row == 0 {
            return;
        }
        let r = self.system.rows[row - 1].map_row;
        self.system.b[r] += value;
    }

    /// Record that the right-hand side of `row` changes between sub-iterations.
    pub fn mark_right_side_changes(&mut self, row: usize) {
        if row > 0 {
            self.system.rows[row - 1].rhs_changes = true;
        }
    }

    /// Record that the matrix row for `row` is re-stamped between sub-iterations.
    pub fn mark_nonlinear(&mut self, row: usize) {
        if row > 0 {
            self.system.rows[row - 1].lhs_changes = true;
        }
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: NodeId, n2: NodeId, g: f64) {
        self.stamp_matrix(n1.row(), n1.row(), g);
        self.stamp_matrix(n2.row(), n2.row(), g);
        self.stamp_matrix(n1.row(), n2.row(), -g);
        self.stamp_matrix(n2.row(), n1.row(), -g);
    }

    /// Stamp a resistance between two nodes.
    ///
    /// A zero resistance yields an infinite conductance, which `step()`
    /// reports as a non-finite matrix.
    pub fn stamp_resistor(&mut self, n1: NodeId, n2: NodeId, resistance: f64) {
        self.stamp_conductance(n1, n2, 1.0 / resistance);
    }

    /// Stamp a voltage source holding `n2` at `voltage` above `n1`.
    ///
    /// The branch unknown is the current flowing from `n1` through the
    /// source into `n2`.
    pub fn stamp_voltage_source(&mut self, n1: NodeId, n2: NodeId, vs: usize, voltage: f64) {
        let vn = self.voltage_source_row(vs);
        self.stamp_matrix(vn, n1.row(), -1.0);
        self.stamp_matrix(vn, n2.row(), 1.0);
        self.stamp_right_side(vn, voltage);
        self.stamp_matrix(n1.row(), vn, 1.0);
        self.stamp_matrix(n2.row(), vn, -1.0);
    }

    /// Stamp the matrix part of a voltage source whose value is supplied
    /// every sub-iteration through [`update_voltage_source`](Self::update_voltage_source).
    pub fn stamp_variable_voltage_source(&mut self, n1: NodeId, n2: NodeId, vs: usize) {
        let vn = self.voltage_source_row(vs);
        self.stamp_matrix(vn, n1.row(), -1.0);
        self.stamp_matrix(vn, n2.row(), 1.0);
        self.mark_right_side_changes(vn);
        self.stamp_matrix(n1.row(), vn, 1.0);
        self.stamp_matrix(n2.row(), vn, -1.0);
    }

    /// Re-stamp only the value of voltage source `vs`; the matrix is untouched.
    pub fn update_voltage_source(&mut self, _n1: NodeId, _n2: NodeId, vs: usize, voltage: f64) {
        let vn = self.voltage_source_row(vs);
        self.stamp_right_side(vn, voltage);
    }

    /// Stamp a current source driving `current` out of `n1` and into `n2`.
    pub fn stamp_current_source(&mut self, n1: NodeId, n2: NodeId, current: f64) {
        self.stamp_right_side(n1.row(), -current);
        self.stamp_right_side(n2.row(), current);
    }

    /// Keep the sub-iteration loop going: this element's operating point moved.
    pub fn mark_unconverged(&mut self) {
        self.flags.converged = false;
    }

    /// Halt the simulation with `message`; the current step fails.
    pub fn stop(&mut self, message: impl Into<String>) {
        self.flags.failure = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn timing() -> StepTiming {
        StepTiming {
            time: 0.0,
            time_step: 1e-3,
        }
    }

    #[test]
    fn test_system_size() {
        // Ground + 2 nodes, one voltage source
        let sys = MnaSystem::new(3, 1);
        assert_eq!(sys.size(), 3);
        assert_eq!(sys.matrix().len(), 9);
        assert_eq!(sys.rows().len(), 3);
        assert!(sys.rows().iter().enumerate().all(|(i, r)| r.map_row == i && r.map_col == i));
    }

    #[test]
    fn test_ground_terms_are_dropped() {
        let mut sys = MnaSystem::new(2, 0);
        let mut flags = IterationFlags::default();
        let mut s = sys.stamper(timing(), &mut flags);
        s.stamp_conductance(NodeId(1), NodeId::GROUND, 0.5);
        s.stamp_current_source(NodeId::GROUND, NodeId(1), 2.0);
        s.stamp_right_side(0, 100.0);

        assert_eq!(sys.matrix(), &[0.5]);
        assert_eq!(sys.right_side(), &[2.0]);
    }

    #[test]
    fn test_resistor_stencil() {
        let mut sys = MnaSystem::new(3, 0);
        let mut flags = IterationFlags::default();
        sys.stamper(timing(), &mut flags)
            .stamp_resistor(NodeId(1), NodeId(2), 4.0);

        assert_abs_diff_eq!(sys.get(0, 0), 0.25);
        assert_abs_diff_eq!(sys.get(1, 1), 0.25);
        assert_abs_diff_eq!(sys.get(0, 1), -0.25);
        assert_abs_diff_eq!(sys.get(1, 0), -0.25);
    }

    #[test]
    fn test_voltage_source_stencil() {
        let mut sys = MnaSystem::new(3, 1);
        let mut flags = IterationFlags::default();
        let mut s = sys.stamper(timing(), &mut flags);
        assert_eq!(s.voltage_source_row(0), 3);
        s.stamp_voltage_source(NodeId(1), NodeId(2), 0, 9.0);

        // Branch row: -V1 + V2 = 9
        assert_eq!(sys.get(2, 0), -1.0);
        assert_eq!(sys.get(2, 1), 1.0);
        assert_eq!(sys.right_side()[2], 9.0);
        // Branch column enters the KCL rows
        assert_eq!(sys.get(0, 2), 1.0);
        assert_eq!(sys.get(1, 2), -1.0);
    }

    #[test]
    fn test_variable_source_marks_rhs() {
        let mut sys = MnaSystem::new(2, 1);
        let mut flags = IterationFlags::default();
        let mut s = sys.stamper(timing(), &mut flags);
        s.stamp_variable_voltage_source(NodeId::GROUND, NodeId(1), 0);
        s.update_voltage_source(NodeId::GROUND, NodeId(1), 0, 3.0);

        assert!(sys.rows()[1].rhs_changes);
        assert!(!sys.rows()[0].rhs_changes);
        assert_eq!(sys.right_side(), &[0.0, 3.0]);
        assert_eq!(sys.get(1, 0), 1.0);
    }

    #[test]
    fn test_const_column_folds_into_rhs() {
        let mut sys = MnaSystem::new(3, 0);
        sys.rows[1].kind = RowKind::Const(2.0);
        let mut flags = IterationFlags::default();
        sys.stamper(timing(), &mut flags)
            .stamp_matrix(1, 2, -0.5);

        assert_eq!(sys.get(0, 1), 0.0);
        assert_eq!(sys.right_side()[0], 1.0);
    }

    #[test]
    fn test_flags_and_restore() {
        let mut sys = MnaSystem::new(2, 0);
        let mut flags = IterationFlags {
            converged: true,
            failure: None,
        };
        {
            let mut s = sys.stamper(timing(), &mut flags);
            s.stamp_matrix(1, 1, 1.0);
            s.mark_unconverged();
            s.stop("boom");
        }
        assert!(!flags.converged);
        assert_eq!(flags.failure.as_deref(), Some("boom"));

        sys.save_original();
        sys.stamper(timing(), &mut flags).stamp_matrix(1, 1, f64::INFINITY);
        assert!(sys.has_non_finite());
        sys.restore_matrix();
        assert!(!sys.has_non_finite());
        assert_eq!(sys.matrix(), &[1.0]);
    }
}
