//! Voltage and current sources.

use std::f64::consts::TAU;

use crate::circuit::Post;
use crate::solver::{Stamper, StepTiming};

use super::{Element, ElementCore};

/// Shape of a voltage source's output over time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// Constant output
    Dc,
    /// `amplitude * sin(2π f t + phase) + bias`
    Sine { frequency: f64, phase: f64 },
    /// `±amplitude + bias`, high for the first `duty` fraction of each period
    Square { frequency: f64, duty: f64 },
}

/// An ideal voltage source.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. Post 1 is held at the source voltage above post 0.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    core: ElementCore,
    pub waveform: Waveform,
    /// Peak value (the value itself for DC)
    pub amplitude: f64,
    /// Offset added to time-varying waveforms
    pub bias: f64,
    /// Value for the current step
    voltage: f64,
}

impl VoltageSource {
    /// Create a DC source driving `pos` to `voltage` above `neg`.
    pub fn dc(neg: impl Into<Post>, pos: impl Into<Post>, voltage: f64) -> Self {
        Self::with_waveform(neg, pos, Waveform::Dc, voltage)
    }

    /// Create a sine source.
    pub fn sine(neg: impl Into<Post>, pos: impl Into<Post>, amplitude: f64, frequency: f64) -> Self {
        Self::with_waveform(
            neg,
            pos,
            Waveform::Sine {
                frequency,
                phase: 0.0,
            },
            amplitude,
        )
    }

    /// Create a 50% duty square-wave source.
    pub fn square(neg: impl Into<Post>, pos: impl Into<Post>, amplitude: f64, frequency: f64) -> Self {
        Self::with_waveform(
            neg,
            pos,
            Waveform::Square {
                frequency,
                duty: 0.5,
            },
            amplitude,
        )
    }

    pub fn with_waveform(
        neg: impl Into<Post>,
        pos: impl Into<Post>,
        waveform: Waveform,
        amplitude: f64,
    ) -> Self {
        let mut source = Self {
            core: ElementCore::two_post(neg.into(), pos.into()),
            waveform,
            amplitude,
            bias: 0.0,
            voltage: 0.0,
        };
        source.voltage = source.value_at(0.0);
        source
    }

    /// Set the DC offset.
    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self.voltage = self.value_at(0.0);
        self
    }

    /// Source value at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        match self.waveform {
            Waveform::Dc => self.amplitude + self.bias,
            Waveform::Sine { frequency, phase } => {
                (TAU * frequency * t + phase).sin() * self.amplitude + self.bias
            }
            Waveform::Square { frequency, duty } => {
                let w = (TAU * frequency * t).rem_euclid(TAU);
                let level = if w > TAU * duty {
                    -self.amplitude
                } else {
                    self.amplitude
                };
                level + self.bias
            }
        }
    }

    /// Get the source voltage for the current step.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }
}

impl Element for VoltageSource {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "voltage source"
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        let (n0, n1, vs) = (self.core.node(0), self.core.node(1), self.core.voltage_source());
        match self.waveform {
            Waveform::Dc => stamper.stamp_voltage_source(n0, n1, vs, self.value_at(0.0)),
            _ => stamper.stamp_variable_voltage_source(n0, n1, vs),
        }
    }

    fn start_iteration(&mut self, timing: StepTiming) {
        self.voltage = self.value_at(timing.time);
    }

    fn do_step(&mut self, stamper: &mut Stamper<'_>) {
        if self.waveform != Waveform::Dc {
            stamper.update_voltage_source(
                self.core.node(0),
                self.core.node(1),
                self.core.voltage_source(),
                self.voltage,
            );
        }
    }
}

/// An ideal current source.
///
/// Current sources add directly to the RHS vector of the MNA equations.
/// Current flows out of post 0's node, through the source, into post 1's node.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    core: ElementCore,
    pub current_value: f64,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(from: impl Into<Post>, to: impl Into<Post>, current: f64) -> Self {
        let mut core = ElementCore::two_post(from.into(), to.into());
        core.current = current;
        Self {
            core,
            current_value: current,
        }
    }
}

impl Element for CurrentSource {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "current source"
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        stamper.stamp_current_source(self.core.node(0), self.core.node(1), self.current_value);
    }

    fn calculate_current(&mut self) {
        self.core.current = self.current_value;
    }
}

/// A voltage source with series internal resistance.
///
/// The EMF drives an internal node above post 0 (negative terminal); the
/// internal resistance connects that node to post 1 (positive terminal).
/// A zero internal resistance fails the step with a non-finite matrix;
/// use [`VoltageSource`] for an ideal source.
#[derive(Debug, Clone)]
pub struct Battery {
    core: ElementCore,
    pub emf: f64,
    pub internal_resistance: f64,
}

impl Battery {
    const INTERNAL: usize = 2;

    pub fn new(neg: impl Into<Post>, pos: impl Into<Post>, emf: f64, internal_resistance: f64) -> Self {
        Self {
            core: ElementCore::new(&[neg.into(), pos.into()], 1),
            emf,
            internal_resistance,
        }
    }

    /// Voltage across the terminals, positive when post 1 is higher.
    pub fn terminal_voltage(&self) -> f64 {
        -self.core.voltage_diff()
    }
}

impl Element for Battery {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "battery"
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        let internal = self.core.node(Self::INTERNAL);
        stamper.stamp_voltage_source(self.core.node(0), internal, self.core.voltage_source(), self.emf);
        stamper.stamp_resistor(internal, self.core.node(1), self.internal_resistance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_dc_value() {
        let v = VoltageSource::dc((0, 0), (0, 1), 10.0);
        assert_eq!(v.value_at(0.0), 10.0);
        assert_eq!(v.value_at(123.0), 10.0);
        assert_eq!(v.voltage(), 10.0);
    }

    #[test]
    fn test_sine_value() {
        let v = VoltageSource::sine((0, 0), (0, 1), 2.0, 50.0).with_bias(1.0);
        assert_abs_diff_eq!(v.value_at(0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.value_at(0.005), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.value_at(0.015), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_square_value() {
        let v = VoltageSource::square((0, 0), (0, 1), 5.0, 1.0);
        assert_eq!(v.value_at(0.25), 5.0);
        assert_eq!(v.value_at(0.75), -5.0);
        assert_eq!(v.value_at(1.25), 5.0);
    }

    #[test]
    fn test_start_iteration_samples_waveform() {
        let mut v = VoltageSource::sine((0, 0), (0, 1), 1.0, 1.0);
        v.start_iteration(StepTiming {
            time: 0.25,
            time_step: 1e-3,
        });
        assert_abs_diff_eq!(v.voltage(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_current_source_reports_its_value() {
        let mut i = CurrentSource::new((0, 0), (1, 0), 0.25);
        assert_eq!(i.current(), 0.25);
        i.reset();
        assert_eq!(i.current(), 0.0);
        i.set_node_voltage(0, 1.0);
        assert_eq!(i.current(), 0.25);
    }

    #[test]
    fn test_battery_has_internal_node() {
        let b = Battery::new((0, 0), (0, 1), 9.0, 1.0);
        assert_eq!(b.post_count(), 2);
        assert_eq!(b.internal_node_count(), 1);
        assert_eq!(b.voltage_source_count(), 1);
    }
}
