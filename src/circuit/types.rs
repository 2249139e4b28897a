//! Core types for circuit representation.

use std::fmt;

/// A unique identifier for a node in the circuit.
/// Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }

    /// The 1-based row/column this node occupies in stamping calls.
    /// Ground is row 0, which every stamping primitive ignores.
    pub fn row(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// A unique identifier for an element: its position in the circuit's element list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Attachment point of an external terminal.
///
/// Terminals declared at equal posts are the same electrical point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Post {
    pub x: i32,
    pub y: i32,
}

impl Post {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Post {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Unknown solved for by a row of the MNA system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unknown {
    /// Node voltage variable
    Voltage(NodeId),
    /// Branch current of the n-th voltage source
    Current(usize),
}

impl Unknown {
    /// Classify a 0-based matrix row.
    /// Node voltages come first (excluding ground), then branch currents.
    pub fn from_row(row: usize, num_nodes: usize) -> Self {
        if row < num_nodes - 1 {
            Unknown::Voltage(NodeId(row + 1))
        } else {
            Unknown::Current(row - (num_nodes - 1))
        }
    }
}
