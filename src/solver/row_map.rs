//! Per-row bookkeeping for the MNA system.
//!
//! Each row records where it lives in the (possibly reduced) matrix and
//! whether its value is a free unknown, a known constant, or a copy of
//! another row. Analysis always produces the identity mapping; the fields
//! exist so rows can be collapsed without touching the stamping code.

/// What a matrix row represents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RowKind {
    /// A regular unknown solved by the linear system
    #[default]
    Normal,
    /// A known value; never solved, writes to its column fold into the RHS
    Const(f64),
    /// Always equal to the unknown of another row
    Equal(usize),
}

/// Row/column remapping record for one matrix row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowMapping {
    /// Row in the solved matrix that receives this row's equation
    pub map_row: usize,
    /// Column in the solved matrix holding this row's unknown
    pub map_col: usize,
    pub kind: RowKind,
    /// Left-hand side is re-stamped during sub-iterations
    pub lhs_changes: bool,
    /// Right-hand side is re-stamped during sub-iterations
    pub rhs_changes: bool,
    /// Equation removed from the solved matrix
    pub drop_row: bool,
}

impl RowMapping {
    /// A row mapped to itself.
    pub fn identity(row: usize) -> Self {
        Self {
            map_row: row,
            map_col: row,
            ..Self::default()
        }
    }

    /// The constant value, if this row is `Const`.
    pub fn constant(&self) -> Option<f64> {
        match self.kind {
            RowKind::Const(value) => Some(value),
            _ => None,
        }
    }

    /// Resolve this row's value from a solution vector.
    pub fn resolve(&self, solution: &[f64]) -> f64 {
        match self.kind {
            RowKind::Const(value) => value,
            RowKind::Normal | RowKind::Equal(_) => solution[self.map_col],
        }
    }
}
