//! Dense linear solver seam and the default LU implementation.

use std::fmt;

use crate::error::{Result, SimError};

/// Solves `A·x = b` for a dense, row-major `n × n` matrix.
///
/// The circuit calls [`factor`](LinearSolver::factor) whenever the matrix
/// may have changed and [`solve`](LinearSolver::solve) once per
/// sub-iteration. Implementations must report an unsolvable system as
/// [`SimError::SingularMatrix`] instead of returning garbage.
pub trait LinearSolver: fmt::Debug {
    /// Factor the matrix `a` of dimension `n`.
    fn factor(&mut self, a: &[f64], n: usize) -> Result<()>;

    /// Solve for `x` against the last factored matrix.
    fn solve(&mut self, b: &[f64], x: &mut [f64]) -> Result<()>;
}

/// LU decomposition with partial pivoting on a flat row-major buffer.
///
/// A matrix is singular only when a pivot column has no nonzero entry left
/// or the pivot is not finite. Small pivots are accepted whatever their
/// magnitude, so circuits built from tiny conductances still solve.
#[derive(Debug, Default, Clone)]
pub struct LuSolver {
    size: usize,
    /// Packed L (unit diagonal, below) and U (on and above the diagonal)
    lu: Vec<f64>,
    /// Pivot indices for LU decomposition
    pivots: Vec<usize>,
}

impl LuSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinearSolver for LuSolver {
    fn factor(&mut self, a: &[f64], n: usize) -> Result<()> {
        debug_assert_eq!(a.len(), n * n);
        self.size = n;
        self.lu.clear();
        self.lu.extend_from_slice(a);
        self.pivots.clear();
        self.pivots.extend(0..n);

        for k in 0..n {
            // Find pivot
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val == 0.0 || !max_val.is_finite() {
                return Err(SimError::SingularMatrix);
            }

            // Swap rows if needed
            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                if factor == 0.0 {
                    continue;
                }
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        Ok(())
    }

    fn solve(&mut self, b: &[f64], x: &mut [f64]) -> Result<()> {
        let n = self.size;
        debug_assert_eq!(b.len(), n);
        debug_assert_eq!(x.len(), n);

        // Apply pivot permutation to b
        for i in 0..n {
            x[i] = b[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[i * n + j] * x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] -= self.lu[i * n + j] * x[j];
            }
            x[i] /= self.lu[i * n + i];
        }

        Ok(())
    }
}
