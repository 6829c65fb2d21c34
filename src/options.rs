//! Numerical tolerances used while assembling and solving.

use serde::{Deserialize, Serialize};

/// Combined absolute and relative tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Absolute allowance.
    pub absolute: f64,
    /// Allowance proportional to the reference magnitude.
    pub relative: f64,
}

impl Tolerance {
    /// Create a [`Tolerance`] from its absolute and relative parts.
    #[must_use]
    pub const fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }

    /// Largest deviation accepted against a reference of magnitude `reference`.
    #[must_use]
    pub fn bound(&self, reference: f64) -> f64 {
        self.absolute + self.relative * reference.abs()
    }

    /// Return `true` when `value` is close to `reference`.
    ///
    /// # Examples
    /// ```
    /// use truss2d::Tolerance;
    ///
    /// let tolerance = Tolerance::new(1.0e-8, 1.0e-5);
    /// assert!(tolerance.is_close(1.0, 1.0 + 1.0e-7));
    /// assert!(!tolerance.is_close(1.0, 1.1));
    /// ```
    #[must_use]
    pub fn is_close(&self, value: f64, reference: f64) -> bool {
        (value - reference).abs() <= self.bound(reference)
    }
}

/// Options controlling the checks performed by a [`TrussSystem`](crate::TrussSystem).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Elementwise tolerance for the post-assembly symmetry check.
    pub symmetry: Tolerance,
    /// Normwise tolerance for the post-solve residual check.
    ///
    /// The reference magnitude is `‖K‖∞·‖u‖∞ + ‖F‖∞`.
    pub residual: Tolerance,
    /// Smallest accepted ratio between the smallest and largest LU pivot.
    pub pivot_ratio: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            symmetry: Tolerance::new(1.0e-8, 1.0e-5),
            residual: Tolerance::new(1.0e-8, 1.0e-8),
            pivot_ratio: 1.0e-12,
        }
    }
}
