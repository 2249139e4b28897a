//! Ground references and ideal wires.
//!
//! Both are modeled as 0 V voltage sources so their currents show up as
//! branch unknowns.

use crate::circuit::{NodeId, Post};
use crate::solver::Stamper;

use super::{Element, ElementCore};

/// Ties its single post to the ground node.
#[derive(Debug, Clone)]
pub struct Ground {
    core: ElementCore,
}

impl Ground {
    pub fn new(post: impl Into<Post>) -> Self {
        Self {
            core: ElementCore::new(&[post.into()], 0),
        }
    }
}

impl Element for Ground {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "ground"
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        stamper.stamp_voltage_source(NodeId::GROUND, self.core.node(0), self.core.voltage_source(), 0.0);
    }

    // The branch unknown flows out of ground into the post; report the
    // current flowing from the post into ground instead.
    fn set_current(&mut self, _index: usize, current: f64) {
        self.core.current = -current;
    }

    fn voltage_diff(&self) -> f64 {
        self.core.voltage(0)
    }
}

/// Zero-resistance connection between two posts.
#[derive(Debug, Clone)]
pub struct Wire {
    core: ElementCore,
}

impl Wire {
    pub fn new(a: impl Into<Post>, b: impl Into<Post>) -> Self {
        Self {
            core: ElementCore::two_post(a.into(), b.into()),
        }
    }
}

impl Element for Wire {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "wire"
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn stamp(&mut self, stamper: &mut Stamper<'_>) {
        stamper.stamp_voltage_source(
            self.core.node(0),
            self.core.node(1),
            self.core.voltage_source(),
            0.0,
        );
    }
}
