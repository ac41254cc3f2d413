//! Ridge regression over sparse rows
//!
//! Fits `y ≈ X·w + b` minimizing `|Xw + b - y|² + α|w|²` with an unpenalized
//! intercept. The primal normal equations `(XcᵀXc + αI) w = Xcᵀ(y - ȳ)` are
//! solved by conjugate gradient, where `Xc` is `X` with its column means
//! removed. Centering is applied on the fly, so memory stays linear in the
//! number of stored entries plus the vocabulary size.

use crate::error::TrajectoryError;
use crate::specificity::vectorizer::SparseVector;
use tracing::{debug, warn};

/// Relative residual at which conjugate gradient stops
const TOLERANCE: f64 = 1e-10;

/// Hard cap on conjugate gradient iterations
const MAX_ITERATIONS: usize = 10_000;

/// Fitted linear model
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

/// Centered design matrix `X - 1μᵀ` over borrowed sparse rows
struct CenteredRows<'a> {
    rows: &'a [SparseVector],
    mean: Vec<f64>,
}

impl CenteredRows<'_> {
    /// `Xc v`
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let shift = dot(&self.mean, v);
        self.rows.iter().map(|row| row.dot_dense(v) - shift).collect()
    }

    /// `Xcᵀ u`
    fn apply_transpose(&self, u: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.mean.len()];
        for (row, weight) in self.rows.iter().zip(u) {
            for &(idx, val) in row.entries() {
                out[idx] += weight * val;
            }
        }
        let total: f64 = u.iter().sum();
        for (o, m) in out.iter_mut().zip(&self.mean) {
            *o -= total * m;
        }
        out
    }

    /// `(XcᵀXc + αI) v`
    fn apply_normal(&self, v: &[f64], alpha: f64) -> Vec<f64> {
        let mut out = self.apply_transpose(&self.apply(v));
        for (o, x) in out.iter_mut().zip(v) {
            *o += alpha * x;
        }
        out
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Fit ridge regression on `rows` (each with indices below `n_features`)
pub fn fit_ridge(
    rows: &[SparseVector],
    targets: &[f64],
    n_features: usize,
    alpha: f64,
) -> Result<RidgeFit, TrajectoryError> {
    if rows.len() != targets.len() {
        return Err(TrajectoryError::ModelError(format!(
            "{} rows but {} targets",
            rows.len(),
            targets.len()
        )));
    }
    if rows.is_empty() {
        return Err(TrajectoryError::ModelError("no training rows".to_string()));
    }
    if !(alpha > 0.0 && alpha.is_finite()) {
        return Err(TrajectoryError::ModelError(format!(
            "ridge penalty must be positive and finite, got {}",
            alpha
        )));
    }

    let n_f = rows.len() as f64;

    let mut feature_mean = vec![0.0; n_features];
    for row in rows {
        for &(idx, val) in row.entries() {
            if idx >= n_features {
                return Err(TrajectoryError::ModelError(format!(
                    "feature index {} out of range {}",
                    idx, n_features
                )));
            }
            feature_mean[idx] += val / n_f;
        }
    }
    let target_mean = targets.iter().sum::<f64>() / n_f;
    let centered_targets: Vec<f64> = targets.iter().map(|y| y - target_mean).collect();

    let design = CenteredRows {
        rows,
        mean: feature_mean,
    };
    let rhs = design.apply_transpose(&centered_targets);
    let weights = conjugate_gradient(&design, &rhs, alpha)?;

    let intercept = target_mean - dot(&weights, &design.mean);
    if !intercept.is_finite() {
        return Err(TrajectoryError::ModelError(
            "ridge fit produced a non-finite intercept".to_string(),
        ));
    }

    Ok(RidgeFit { weights, intercept })
}

/// Solve `(XcᵀXc + αI) w = rhs`; the system is symmetric positive definite for `α > 0`
fn conjugate_gradient(
    design: &CenteredRows<'_>,
    rhs: &[f64],
    alpha: f64,
) -> Result<Vec<f64>, TrajectoryError> {
    let mut solution = vec![0.0; rhs.len()];
    let rhs_norm = dot(rhs, rhs).sqrt();
    if !rhs_norm.is_finite() {
        return Err(TrajectoryError::ModelError(
            "ridge targets are not finite".to_string(),
        ));
    }
    if rhs_norm == 0.0 {
        return Ok(solution);
    }

    let threshold = TOLERANCE * rhs_norm;
    let max_iterations = (2 * rhs.len() + 10).min(MAX_ITERATIONS);

    let mut residual = rhs.to_vec();
    let mut direction = residual.clone();
    let mut residual_sq = dot(&residual, &residual);

    for iteration in 0..max_iterations {
        let product = design.apply_normal(&direction, alpha);
        let curvature = dot(&direction, &product);
        if !(curvature > 0.0 && curvature.is_finite()) {
            return Err(TrajectoryError::ModelError(
                "regression system is not positive definite".to_string(),
            ));
        }

        let step = residual_sq / curvature;
        for (x, p) in solution.iter_mut().zip(&direction) {
            *x += step * p;
        }
        for (r, q) in residual.iter_mut().zip(&product) {
            *r -= step * q;
        }

        let next_sq = dot(&residual, &residual);
        if next_sq.sqrt() <= threshold {
            debug!(iterations = iteration + 1, "ridge solver converged");
            return Ok(solution);
        }

        let beta = next_sq / residual_sq;
        for (p, r) in direction.iter_mut().zip(&residual) {
            *p = r + beta * *p;
        }
        residual_sq = next_sq;
    }

    if !residual_sq.is_finite() {
        return Err(TrajectoryError::ModelError(
            "ridge solver diverged".to_string(),
        ));
    }
    warn!(
        iterations = max_iterations,
        residual = residual_sq.sqrt() / rhs_norm,
        "ridge solver stopped before reaching tolerance"
    );
    Ok(solution)
}
