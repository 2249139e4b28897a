//! Linear passive elements: Resistor, Capacitor, Inductor.

use crate::circuit::Post;
use crate::solver::{Stamper, StepTiming};

use super::{Element, ElementCore};

/// An ideal resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    core: ElementCore,
    /// Resistance in ohms. Zero is not clamped: it stamps an infinite
    /// conductance and the step fails with a non-finite matrix.
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(a: impl Into<Post>, b: impl Into<Post>, resistance: f64) -> Self {
        Self {
            core: ElementCore::two_post(a.into(), b.into()),
            resistance,
        }
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Element for Resistor {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "resistor"
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        stamper.stamp_resistor(self.core.node(0), self.core.node(1), self.resistance);
    }

    fn calculate_current(&mut self) {
        self.core.current = self.core.voltage_diff() / self.resistance;
    }
}

/// A capacitor.
///
/// In discrete-time simulation, a capacitor is modeled using a companion model.
/// Using the trapezoidal rule:
///   i(n) = (2C/dt) * v(n) - ((2C/dt) * v(n-1) + i(n-1))
///
/// This gives an equivalent resistance R_eq = dt/2C stamped once, and a
/// history current source re-stamped every sub-iteration.
#[derive(Debug, Clone)]
pub struct Capacitor {
    core: ElementCore,
    pub capacitance: f64,
    /// Companion resistance, fixed when stamped
    comp_resistance: f64,
    /// History current for the current step
    cur_source: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(a: impl Into<Post>, b: impl Into<Post>, capacitance: f64) -> Self {
        Self {
            core: ElementCore::two_post(a.into(), b.into()),
            capacitance,
            comp_resistance: 0.0,
            cur_source: 0.0,
        }
    }
}

impl Element for Capacitor {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "capacitor"
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        let (n0, n1) = (self.core.node(0), self.core.node(1));
        self.comp_resistance = stamper.time_step() / (2.0 * self.capacitance);
        stamper.stamp_resistor(n0, n1, self.comp_resistance);
        stamper.mark_right_side_changes(n0.row());
        stamper.mark_right_side_changes(n1.row());
    }

    fn start_iteration(&mut self, _timing: StepTiming) {
        self.cur_source = -self.core.voltage_diff() / self.comp_resistance - self.core.current;
    }

    fn do_step(&mut self, stamper: &mut Stamper<'_>) {
        stamper.stamp_current_source(self.core.node(0), self.core.node(1), self.cur_source);
    }

    fn calculate_current(&mut self) {
        // Not stamped yet
        if self.comp_resistance > 0.0 {
            self.core.current = self.core.voltage_diff() / self.comp_resistance + self.cur_source;
        }
    }

    fn reset(&mut self) {
        self.core.reset();
        self.cur_source = 0.0;
    }
}

/// An inductor.
///
/// Trapezoidal companion model:
///   i(n) = v(n) / R_eq + (v(n-1) / R_eq + i(n-1)),  R_eq = 2L/dt
#[derive(Debug, Clone)]
pub struct Inductor {
    core: ElementCore,
    pub inductance: f64,
    comp_resistance: f64,
    cur_source: f64,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(a: impl Into<Post>, b: impl Into<Post>, inductance: f64) -> Self {
        Self {
            core: ElementCore::two_post(a.into(), b.into()),
            inductance,
            comp_resistance: 0.0,
            cur_source: 0.0,
        }
    }
}

impl Element for Inductor {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "inductor"
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        let (n0, n1) = (self.core.node(0), self.core.node(1));
        self.comp_resistance = 2.0 * self.inductance / stamper.time_step();
        stamper.stamp_resistor(n0, n1, self.comp_resistance);
        stamper.mark_right_side_changes(n0.row());
        stamper.mark_right_side_changes(n1.row());
    }

    fn start_iteration(&mut self, _timing: StepTiming) {
        self.cur_source = self.core.voltage_diff() / self.comp_resistance + self.core.current;
    }

    fn do_step(&mut self, stamper: &mut Stamper<'_>) {
        stamper.stamp_current_source(self.core.node(0), self.core.node(1), self.cur_source);
    }

    fn calculate_current(&mut self) {
        if self.comp_resistance > 0.0 {
            self.core.current = self.core.voltage_diff() / self.comp_resistance + self.cur_source;
        }
    }

    fn reset(&mut self) {
        self.core.reset();
        self.cur_source = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_resistor_current_follows_voltages() {
        let mut r = Resistor::new((0, 0), (1, 0), 1000.0);
        assert_abs_diff_eq!(r.conductance(), 0.001, epsilon = 1e-15);

        r.set_node_voltage(0, 5.0);
        r.set_node_voltage(1, 3.0);
        assert_abs_diff_eq!(r.current(), 0.002, epsilon = 1e-15);
    }

    #[test]
    fn test_capacitor_history_source() {
        let mut c = Capacitor::new((0, 0), (1, 0), 1e-6);
        c.comp_resistance = 1e-5 / 2e-6;

        c.set_node_voltage(0, 1.0);
        c.set_node_voltage(1, 0.0);
        // No history yet: behaves like the companion resistor
        assert_abs_diff_eq!(c.current(), 0.2, epsilon = 1e-12);

        c.start_iteration(StepTiming::default());
        assert_abs_diff_eq!(c.cur_source, -0.2 - 0.2, epsilon = 1e-12);

        c.reset();
        assert_eq!(c.current(), 0.0);
        assert_eq!(c.cur_source, 0.0);
    }

    #[test]
    fn test_inductor_history_source() {
        let mut l = Inductor::new((0, 0), (1, 0), 1e-3);
        l.comp_resistance = 2.0 * 1e-3 / 1e-5;

        l.set_node_voltage(0, 2.0);
        l.set_node_voltage(1, 0.0);
        assert_abs_diff_eq!(l.current(), 0.01, epsilon = 1e-12);

        l.start_iteration(StepTiming::default());
        assert_abs_diff_eq!(l.cur_source, 0.02, epsilon = 1e-12);
    }
}
