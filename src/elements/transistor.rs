//! BJT (Bipolar Junction Transistor) model.
//!
//! Uses the Ebers-Moll transport model for NPN and PNP transistors:
//!   I_F = Is * (exp(V_BE / nVt) - 1)
//!   I_R = Is * (exp(V_BC / nVt) - 1)
//!   Ic  = I_F - I_R * (1 + 1/β_R)
//!   Ib  = I_F / β_F + I_R / β_R
//!
//! PNP devices mirror every voltage and current. Each sub-iteration the
//! terminal currents are linearised around both junction voltages and
//! stamped as a 3x3 conductance block plus equivalent current sources.

use std::f64::consts::SQRT_2;

use crate::circuit::Post;
use crate::solver::Stamper;
use crate::THERMAL_VOLTAGE;

use super::diode::limit_junction_step;
use super::{Element, ElementCore};

/// Junction voltage change that still counts as settled.
const CONVERGENCE_STEP: f64 = 0.01;

/// Junction bias above which a junction counts as conducting.
const REGION_THRESHOLD: f64 = 0.2;

/// BJT type (NPN or PNP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BjtType {
    Npn,
    Pnp,
}

impl BjtType {
    fn polarity(self) -> f64 {
        match self {
            BjtType::Npn => 1.0,
            BjtType::Pnp => -1.0,
        }
    }
}

/// Operating region, from which junctions are forward biased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Cutoff,
    ForwardActive,
    ReverseActive,
    Saturation,
}

/// Parameters for a BJT model.
#[derive(Debug, Clone, PartialEq)]
pub struct BjtParams {
    /// Forward current gain (β_F)
    pub beta_f: f64,
    /// Reverse current gain (β_R)
    pub beta_r: f64,
    /// Transport saturation current
    pub is: f64,
    /// Ideality factor
    pub n: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            beta_f: 100.0,
            beta_r: 1.0,
            is: 1e-14,
            n: 1.0,
        }
    }
}

impl BjtParams {
    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }

    /// Junction voltage above which steps are limited logarithmically.
    pub fn v_crit(&self) -> f64 {
        let n_vt = self.n_vt();
        n_vt * (n_vt / (SQRT_2 * self.is)).ln()
    }
}

/// Currents flowing into each terminal; they always sum to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TerminalCurrents {
    pub base: f64,
    pub collector: f64,
    pub emitter: f64,
}

/// A bipolar transistor with posts base (0), collector (1), emitter (2).
///
/// The element current is the base current.
#[derive(Debug, Clone)]
pub struct Transistor {
    core: ElementCore,
    pub bjt_type: BjtType,
    pub params: BjtParams,
    /// Junction voltages used by the last linearisation
    last_vbe: f64,
    last_vbc: f64,
    currents: TerminalCurrents,
}

impl Transistor {
    pub fn npn(base: impl Into<Post>, collector: impl Into<Post>, emitter: impl Into<Post>) -> Self {
        Self::new(BjtType::Npn, base.into(), collector.into(), emitter.into())
    }

    pub fn pnp(base: impl Into<Post>, collector: impl Into<Post>, emitter: impl Into<Post>) -> Self {
        Self::new(BjtType::Pnp, base.into(), collector.into(), emitter.into())
    }

    fn new(bjt_type: BjtType, base: Post, collector: Post, emitter: Post) -> Self {
        Self {
            core: ElementCore::new(&[base, collector, emitter], 0),
            bjt_type,
            params: BjtParams::default(),
            last_vbe: 0.0,
            last_vbc: 0.0,
            currents: TerminalCurrents::default(),
        }
    }

    /// Replace the model parameters.
    pub fn with_params(mut self, params: BjtParams) -> Self {
        self.params = params;
        self
    }

    pub fn vbe(&self) -> f64 {
        self.core.voltage(0) - self.core.voltage(2)
    }

    pub fn vbc(&self) -> f64 {
        self.core.voltage(0) - self.core.voltage(1)
    }

    pub fn vce(&self) -> f64 {
        self.core.voltage(1) - self.core.voltage(2)
    }

    /// Terminal currents at the last solved voltages.
    pub fn currents(&self) -> TerminalCurrents {
        self.currents
    }

    /// Terminal currents at the given junction voltages.
    pub fn currents_at(&self, vbe: f64, vbc: f64) -> TerminalCurrents {
        let p = self.bjt_type.polarity();
        let i_f = self.junction_current(p * vbe);
        let i_r = self.junction_current(p * vbc);
        let ic = i_f - i_r * (1.0 + 1.0 / self.params.beta_r);
        let ib = i_f / self.params.beta_f + i_r / self.params.beta_r;
        TerminalCurrents {
            base: p * ib,
            collector: p * ic,
            emitter: -p * (ic + ib),
        }
    }

    /// Operating region at the last solved voltages.
    pub fn region(&self) -> Region {
        let p = self.bjt_type.polarity();
        let be_on = p * self.vbe() > REGION_THRESHOLD;
        let bc_on = p * self.vbc() > REGION_THRESHOLD;
        match (be_on, bc_on) {
            (false, false) => Region::Cutoff,
            (true, false) => Region::ForwardActive,
            (false, true) => Region::ReverseActive,
            (true, true) => Region::Saturation,
        }
    }

    fn junction_current(&self, v: f64) -> f64 {
        self.params.is * ((v / self.params.n_vt()).exp() - 1.0)
    }

    /// Junction slope; reverse bias uses the zero-bias slope.
    fn junction_conductance(&self, v: f64) -> f64 {
        let n_vt = self.params.n_vt();
        self.params.is / n_vt * (v / n_vt).exp().max(1.0)
    }
}

impl Element for Transistor {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        match self.bjt_type {
            BjtType::Npn => "npn transistor",
            BjtType::Pnp => "pnp transistor",
        }
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        for terminal in 0..3 {
            stamper.mark_nonlinear(self.core.node(terminal).row());
        }
    }

    fn do_step(&mut self, stamper: &mut Stamper<'_>) {
        let p = self.bjt_type.polarity();
        let (vbe_solved, vbc_solved) = (self.vbe(), self.vbc());
        if (vbe_solved - self.last_vbe).abs() > CONVERGENCE_STEP
            || (vbc_solved - self.last_vbc).abs() > CONVERGENCE_STEP
        {
            stamper.mark_unconverged();
        }

        let (n_vt, v_crit) = (self.params.n_vt(), self.params.v_crit());
        let (vbe, be_limited) = limit_junction_step(p * vbe_solved, p * self.last_vbe, n_vt, v_crit);
        let (vbc, bc_limited) = limit_junction_step(p * vbc_solved, p * self.last_vbc, n_vt, v_crit);
        if be_limited || bc_limited {
            stamper.mark_unconverged();
        }
        let (vbe, vbc) = (p * vbe, p * vbc);
        self.last_vbe = vbe;
        self.last_vbc = vbc;

        // Partial derivatives of each terminal current by (V_BE, V_BC);
        // the polarity cancels out
        let g_f = self.junction_conductance(p * vbe);
        let g_r = self.junction_conductance(p * vbc);
        let collector = (g_f, -g_r * (1.0 + 1.0 / self.params.beta_r));
        let base = (g_f / self.params.beta_f, g_r / self.params.beta_r);
        let emitter = (-(collector.0 + base.0), -(collector.1 + base.1));

        let i0 = self.currents_at(vbe, vbc);
        let (nb, nc, ne) = (self.core.node(0), self.core.node(1), self.core.node(2));
        for (node, i, (d_be, d_bc)) in [
            (nb, i0.base, base),
            (nc, i0.collector, collector),
            (ne, i0.emitter, emitter),
        ] {
            let row = node.row();
            stamper.stamp_matrix(row, nb.row(), d_be + d_bc);
            stamper.stamp_matrix(row, ne.row(), -d_be);
            stamper.stamp_matrix(row, nc.row(), -d_bc);
            stamper.stamp_right_side(row, d_be * vbe + d_bc * vbc - i);
        }
    }

    fn calculate_current(&mut self) {
        self.currents = self.currents_at(self.vbe(), self.vbc());
        self.core.current = self.currents.base;
    }

    fn reset(&mut self) {
        self.core.reset();
        self.last_vbe = 0.0;
        self.last_vbc = 0.0;
        self.currents = TerminalCurrents::default();
    }
}
