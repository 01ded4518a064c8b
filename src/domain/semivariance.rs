//! Downside-risk (semivariance) minimization over historical returns.

use cvxrust::prelude::*;
use std::result::Result;
use log::debug;
use nalgebra::{DMatrix, DVector};

use super::convex::{column_major, ensure_optimal, leading, onto_simplex, solver_error};
use super::error::AllocatorError;
use super::estimators::TRADING_DAYS_PER_YEAR;

/// Daily benchmark equivalent to an annual target return.
pub fn daily_benchmark(annual_target: f64) -> f64 {
    (1.0 + annual_target).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0
}

/// Mean squared shortfall of portfolio returns below `benchmark`.
pub fn downside_variance(returns: &DMatrix<f64>, weights: &DVector<f64>, benchmark: f64) -> f64 {
    let t = returns.nrows().max(1) as f64;
    let portfolio = returns * weights;
    portfolio
        .iter()
        .map(|r| (r - benchmark).min(0.0).powi(2))
        .sum::<f64>()
        / t
}

/// Annualized semi-deviation of the portfolio.
pub fn annual_semi_deviation(
    returns: &DMatrix<f64>,
    weights: &DVector<f64>,
    benchmark: f64,
) -> f64 {
    (downside_variance(returns, weights, benchmark) * TRADING_DAYS_PER_YEAR).sqrt()
}

/// Long-only, fully-invested weights minimizing downside variance.
///
/// With one shortfall variable per day, `sₜ >= max(0, b - rₜᵀw)`, the problem
/// is the quadratic program: minimize `‖s‖² / T` subject to
/// `(R - b)w + s >= 0`, `s >= 0`, `sum(w) = 1`, `w >= 0`. Since
/// `sum(w) = 1`, subtracting `b` from every return shifts each portfolio
/// return by exactly `b`.
pub fn min_semivariance(
    returns: &DMatrix<f64>,
    benchmark: f64,
) -> Result<DVector<f64>, AllocatorError> {
    let (t, n) = returns.shape();
    if n == 0 || t == 0 {
        return Err(AllocatorError::invalid_request(
            "semivariance needs at least one asset and one observation",
        ));
    }
    if returns.amax() <= f64::EPSILON {
        // flat history: every allocation has the same downside
        return Ok(DVector::from_element(n, 1.0 / n as f64));
    }

    let shifted = returns.map(|r| r - benchmark) / (t as f64).sqrt();
    let scenarios = constant_matrix(column_major(&shifted), t, n);
    let (one, zero) = (1.0, 0.0);

    let w = variable(n);
    let shortfall = variable(t);
    let solution = Problem::minimize(sum_squares(&shortfall))
        .subject_to(vec![
            constraint!((matmul(&scenarios, &w) + shortfall.clone()) >= zero),
            constraint!(shortfall >= zero),
            constraint!((sum(&w)) == one),
            constraint!(w >= zero),
        ])
        .solve()
        .map_err(solver_error)?;
    let objective = ensure_optimal(solution.value)?;
    debug!("semivariance optimum {objective:.3e} over {t} days");
    onto_simplex(&leading(&solution[&w], n)?)
}
