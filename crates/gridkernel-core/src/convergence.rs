//! Convergence measurement.

use crate::error::{GridKernelError, Result};

/// Euclidean distance between two snapshots, accumulated in `f64`.
pub fn residual(next: &[f32], current: &[f32]) -> Result<f64> {
    Ok(sum_of_squares(next, current)?.sqrt())
}

/// Sum of squared element differences, accumulated in `f64`.
pub fn sum_of_squares(next: &[f32], current: &[f32]) -> Result<f64> {
    if next.len() != current.len() {
        return Err(GridKernelError::config(format!(
            "snapshot lengths differ: {} vs {}",
            next.len(),
            current.len()
        )));
    }

    Ok(next
        .iter()
        .zip(current)
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum())
}

/// Relative-error evaluator normalised by a fixed boundary norm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceEvaluator {
    boundary_norm: f64,
}

impl ConvergenceEvaluator {
    /// Create an evaluator. The norm must be finite and strictly positive.
    pub fn new(boundary_norm: f64) -> Result<Self> {
        if !(boundary_norm.is_finite() && boundary_norm > 0.0) {
            return Err(GridKernelError::config(format!(
                "boundary norm must be positive, got {}",
                boundary_norm
            )));
        }
        Ok(Self { boundary_norm })
    }

    /// The normalising constant.
    pub fn boundary_norm(&self) -> f64 {
        self.boundary_norm
    }

    /// `residual(next, current) / boundary_norm`.
    pub fn relative_error(&self, next: &[f32], current: &[f32]) -> Result<f64> {
        Ok(residual(next, current)? / self.boundary_norm)
    }

    /// Relative error from partial sums of squared differences.
    pub fn relative_from_partials(&self, partials: &[f32]) -> f64 {
        let total: f64 = partials.iter().map(|&p| p as f64).sum();
        total.sqrt() / self.boundary_norm
    }
}
