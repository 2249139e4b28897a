//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! Every sub-iteration the diode is relinearised around the junction voltage
//! solved in the previous one:
//!   I ≈ I0 + G_d * (V - V0)
//!
//! where G_d = dI/dV = Is/(n*Vt) * exp(V0/(n*Vt))

use std::f64::consts::SQRT_2;

use crate::circuit::Post;
use crate::solver::Stamper;
use crate::THERMAL_VOLTAGE;

use super::{Element, ElementCore};

/// Junction voltage change that still counts as settled.
const CONVERGENCE_STEP: f64 = 0.01;

/// Parameters for a diode model.
#[derive(Debug, Clone, PartialEq)]
pub struct DiodeParams {
    /// Saturation current (Is), typically 1e-14 to 1e-12 A
    pub is: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub n: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self { is: 1e-14, n: 1.0 }
    }
}

impl DiodeParams {
    /// Create parameters for a germanium diode (lower forward voltage).
    pub fn germanium() -> Self {
        Self { is: 1e-9, n: 1.5 }
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }

    /// Voltage above which junction steps are limited logarithmically.
    pub fn v_crit(&self) -> f64 {
        let n_vt = self.n_vt();
        n_vt * (n_vt / (SQRT_2 * self.is)).ln()
    }
}

/// A junction diode, anode at post 0 and cathode at post 1.
#[derive(Debug, Clone)]
pub struct Diode {
    core: ElementCore,
    pub params: DiodeParams,
    /// Junction voltage used by the last linearisation
    last_voltage_diff: f64,
}

impl Diode {
    /// Create a new diode.
    pub fn new(anode: impl Into<Post>, cathode: impl Into<Post>) -> Self {
        Self::with_params(anode, cathode, DiodeParams::default())
    }

    pub fn with_params(anode: impl Into<Post>, cathode: impl Into<Post>, params: DiodeParams) -> Self {
        Self {
            core: ElementCore::two_post(anode.into(), cathode.into()),
            params,
            last_voltage_diff: 0.0,
        }
    }

    /// Calculate the diode current at a given voltage.
    pub fn current_at(&self, v: f64) -> f64 {
        self.params.is * ((v / self.params.n_vt()).exp() - 1.0)
    }

    /// Linearized model at `v`: (conductance G, equivalent current source I_eq)
    /// such that I = G * V + I_eq. Reverse bias uses the zero-bias slope.
    pub fn linearize(&self, v: f64) -> (f64, f64) {
        let n_vt = self.params.n_vt();
        let eval = if v < 0.0 { 1.0 } else { (v / n_vt).exp() };
        let g = self.params.is / n_vt * eval;
        let i_eq = (eval - 1.0) * self.params.is - g * v;
        (g, i_eq)
    }

    /// Limit the junction voltage step so exp() stays in range.
    ///
    /// Returns the limited voltage and whether limiting kicked in.
    pub fn limit_step(&self, v_new: f64, v_old: f64) -> (f64, bool) {
        limit_junction_step(v_new, v_old, self.params.n_vt(), self.params.v_crit())
    }
}

/// SPICE-style pn-junction limiting.
///
/// Above `v_crit`, a forward step larger than `2·nVt` is compressed
/// logarithmically. Returns the limited voltage and whether it was limited.
pub(crate) fn limit_junction_step(v_new: f64, v_old: f64, n_vt: f64, v_crit: f64) -> (f64, bool) {
    if v_new > v_crit && (v_new - v_old).abs() > 2.0 * n_vt {
        let limited = if v_old > 0.0 {
            let arg = 1.0 + (v_new - v_old) / n_vt;
            if arg > 0.0 {
                v_old + n_vt * arg.ln()
            } else {
                v_crit
            }
        } else {
            n_vt * (v_new / n_vt).ln()
        };
        (limited, true)
    } else {
        (v_new, false)
    }
}

impl Element for Diode {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "diode"
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        stamper.mark_nonlinear(self.core.node(0).row());
        stamper.mark_nonlinear(self.core.node(1).row());
    }

    fn do_step(&mut self, stamper: &mut Stamper<'_>) {
        let v_solved = self.core.voltage_diff();
        if (v_solved - self.last_voltage_diff).abs() > CONVERGENCE_STEP {
            stamper.mark_unconverged();
        }

        let (v_d, limited) = self.limit_step(v_solved, self.last_voltage_diff);
        if limited {
            stamper.mark_unconverged();
        }
        self.last_voltage_diff = v_d;

        let (g, i_eq) = self.linearize(v_d);
        let (n_anode, n_cathode) = (self.core.node(0), self.core.node(1));
        stamper.stamp_conductance(n_anode, n_cathode, g);
        stamper.stamp_current_source(n_anode, n_cathode, i_eq);
    }

    fn calculate_current(&mut self) {
        self.core.current = self.current_at(self.core.voltage_diff());
    }

    fn reset(&mut self) {
        self.core.reset();
        self.last_voltage_diff = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diode_forward_bias() {
        let d = Diode::new((0, 0), (1, 0));

        // At 0V, current should be approximately 0
        assert!(d.current_at(0.0).abs() < 1e-10);

        // At forward bias, current should increase exponentially
        let i_small = d.current_at(0.3);
        let i_large = d.current_at(0.6);
        assert!(i_large > i_small * 100.0);
    }

    #[test]
    fn test_diode_reverse_bias() {
        let d = Diode::new((0, 0), (1, 0));

        // In reverse bias, current should approach -Is
        let i_rev = d.current_at(-1.0);
        assert!(i_rev < 0.0);
        assert!(i_rev > -2.0 * d.params.is);
    }

    #[test]
    fn test_linearization_matches_curve() {
        let d = Diode::new((0, 0), (1, 0));
        let v = 0.6;
        let (g, i_eq) = d.linearize(v);
        assert_relative_eq!(g * v + i_eq, d.current_at(v), max_relative = 1e-12);
    }

    #[test]
    fn test_limit_step() {
        let d = Diode::new((0, 0), (1, 0));
        let v_crit = d.params.v_crit();
        assert!(v_crit > 0.6 && v_crit < 0.8);

        // Small moves pass through
        assert_eq!(d.limit_step(0.65, 0.64), (0.65, false));

        // A jump from zero bias is compressed logarithmically
        let (v, limited) = d.limit_step(5.0, 0.0);
        assert!(limited);
        assert!(v < 0.2);

        // From forward bias the step grows by at most n*Vt*ln(1 + dv/nVt)
        let (v, limited) = d.limit_step(2.0, 0.7);
        assert!(limited);
        assert!(v > 0.7 && v < 0.9);
    }
}
