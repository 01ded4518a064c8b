//! Mean-variance optimizers over an expected-return vector and covariance.
//!
//! Every function returns raw (uncleaned) weights in column order.

use cvxrust::prelude::*;
use std::result::Result;
use log::debug;
use nalgebra::{DMatrix, DVector};

use super::convex::{column_major, ensure_optimal, entries, leading, onto_simplex, solver_error};
use super::error::AllocatorError;
use super::estimators::portfolio_volatility;
use super::sectors::SectorBound;

/// Objective weight on `‖w‖²` for the volatility-targeting optimizer.
pub const EFFICIENT_RISK_GAMMA: f64 = 0.1;
/// Objective weight on `‖w‖²` for the return-targeting optimizer.
pub const EFFICIENT_RETURN_GAMMA: f64 = 1.0;

const VOLATILITY_TOLERANCE: f64 = 1e-6;
const RETURN_TOLERANCE: f64 = 1e-9;

fn ensure_square(mu_len: usize, cov: &DMatrix<f64>) -> Result<usize, AllocatorError> {
    let n = cov.nrows();
    if n == 0 || cov.ncols() != n || mu_len != n {
        return Err(AllocatorError::invalid_request(format!(
            "dimension mismatch: {mu_len} expected returns for a {}x{} covariance",
            cov.nrows(),
            cov.ncols()
        )));
    }
    Ok(n)
}

/// `cov + ridge I`, which keeps every quadratic form strictly convex.
fn ridged(cov: &DMatrix<f64>, ridge: f64) -> DMatrix<f64> {
    cov + DMatrix::<f64>::identity(cov.nrows(), cov.ncols()) * ridge
}

/// Minimum variance with `sum(w) = 1` and each weight in `[-1, 1]`.
pub fn min_volatility(cov: &DMatrix<f64>) -> Result<DVector<f64>, AllocatorError> {
    let n = ensure_square(cov.nrows(), cov)?;
    let sigma = constant_matrix(column_major(cov), n, n);
    let (one, lower, upper) = (1.0, -1.0, 1.0);

    let w = variable(n);
    let solution = Problem::minimize(quad_form(&w, &sigma))
        .subject_to(vec![
            constraint!((sum(&w)) == one),
            constraint!(w >= lower),
            constraint!(w <= upper),
        ])
        .solve()
        .map_err(solver_error)?;
    ensure_optimal(solution.value)?;
    leading(&solution[&w], n)
}

/// Long-only minimum variance, `sum(w) = 1`.
pub fn min_volatility_long_only(cov: &DMatrix<f64>) -> Result<DVector<f64>, AllocatorError> {
    let n = ensure_square(cov.nrows(), cov)?;
    let sigma = constant_matrix(column_major(cov), n, n);
    let (one, zero) = (1.0, 0.0);

    let w = variable(n);
    let solution = Problem::minimize(quad_form(&w, &sigma))
        .subject_to(vec![constraint!((sum(&w)) == one), constraint!(w >= zero)])
        .solve()
        .map_err(solver_error)?;
    ensure_optimal(solution.value)?;
    onto_simplex(&leading(&solution[&w], n)?)
}

/// Long-only tangency portfolio with optional sector exposure bounds.
///
/// Solved in homogenized variables `y = κ w` with `κ = sum(y) > 0`:
/// minimize `yᵀΣy` subject to `(μ - rf)ᵀy = 1` and `y >= 0`. A sector bound
/// `lower <= sum_s(w)` becomes `sum_s(y) - lower · sum(y) >= 0`, so each
/// bound stays a single linear row in `y`.
pub fn max_sharpe(
    mu: &DVector<f64>,
    cov: &DMatrix<f64>,
    risk_free_rate: f64,
    sectors: &[SectorBound],
) -> Result<DVector<f64>, AllocatorError> {
    let n = ensure_square(mu.len(), cov)?;
    if mu.iter().all(|m| *m <= risk_free_rate) {
        return Err(AllocatorError::infeasible(
            "at least one asset must have an expected return exceeding the risk-free rate",
        ));
    }
    let floor: f64 = sectors.iter().filter_map(|b| b.lower).sum();
    if floor > 1.0 + 1e-9 {
        return Err(AllocatorError::infeasible(format!(
            "sector lower bounds add up to {floor:.4}, more than the whole portfolio"
        )));
    }

    let sigma = constant_matrix(column_major(cov), n, n);
    let excess = constant_vec(mu.iter().map(|m| m - risk_free_rate).collect());
    let (one, zero) = (1.0, 0.0);

    let y = variable(n);
    let mut constraints = vec![constraint!((dot(&excess, &y)) == one), constraint!(y >= zero)];
    for bound in sectors {
        let membership = |share: f64| -> Vec<f64> {
            (0..n)
                .map(|i| if bound.members.contains(&i) { 1.0 - share } else { -share })
                .collect()
        };
        if let Some(lower) = bound.lower {
            let row = constant_vec(membership(lower));
            constraints.push(constraint!((dot(&row, &y)) >= zero));
        }
        if let Some(upper) = bound.upper {
            let row = constant_vec(membership(upper));
            constraints.push(constraint!((dot(&row, &y)) <= zero));
        }
    }

    let solution = Problem::minimize(quad_form(&y, &sigma))
        .subject_to(constraints)
        .solve()
        .map_err(solver_error)?;
    ensure_optimal(solution.value)?;
    // w = y / sum(y); κ > 0 is guaranteed by the excess-return row
    onto_simplex(&leading(&solution[&y], n)?)
}

/// Long-only portfolio maximizing `μᵀw - γ‖w‖²` with volatility at most
/// `target_volatility`.
pub fn efficient_risk(
    mu: &DVector<f64>,
    cov: &DMatrix<f64>,
    target_volatility: f64,
    gamma: f64,
) -> Result<DVector<f64>, AllocatorError> {
    let n = ensure_square(mu.len(), cov)?;
    if !target_volatility.is_finite() || target_volatility < 0.0 {
        return Err(AllocatorError::invalid_request(
            "target_volatility must be a non-negative number",
        ));
    }

    let min_vol_weights = min_volatility_long_only(cov)?;
    let floor = portfolio_volatility(&min_vol_weights, cov);
    if target_volatility + VOLATILITY_TOLERANCE < floor {
        return Err(AllocatorError::infeasible(format!(
            "target volatility {target_volatility:.4} is below the minimum attainable {floor:.4}"
        )));
    }
    if target_volatility <= floor + VOLATILITY_TOLERANCE {
        // only the minimum-volatility corner fits
        return Ok(min_vol_weights);
    }

    let sigma = constant_matrix(column_major(cov), n, n);
    let regularizer = constant_matrix(column_major(&(DMatrix::<f64>::identity(n, n) * gamma)), n, n);
    let neg_mu = constant_vec(entries(&(-mu)));
    let variance_cap = target_volatility * target_volatility;
    let (one, zero) = (1.0, 0.0);

    let w = variable(n);
    let solution = Problem::minimize(quad_form(&w, &regularizer) + dot(&neg_mu, &w))
        .subject_to(vec![
            constraint!((quad_form(&w, &sigma)) <= variance_cap),
            constraint!((sum(&w)) == one),
            constraint!(w >= zero),
        ])
        .solve()
        .map_err(solver_error)?;
    ensure_optimal(solution.value)?;
    let w = onto_simplex(&leading(&solution[&w], n)?)?;
    debug!(
        "efficient_risk: volatility {:.6} against target {target_volatility:.6}",
        portfolio_volatility(&w, cov)
    );
    Ok(w)
}

/// Highest `μᵀw` reachable with `sum(w) = 0` and weights in `[-1, 1]`:
/// the top half long, the bottom half short.
fn max_neutral_return(mu: &DVector<f64>) -> f64 {
    let mut sorted: Vec<f64> = mu.iter().copied().collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let half = sorted.len() / 2;
    sorted[..half].iter().sum::<f64>() - sorted[sorted.len() - half..].iter().sum::<f64>()
}

/// Market-neutral (`sum(w) = 0`) portfolio with weights in `[-1, 1]`
/// minimizing `wᵀΣw + γ‖w‖²` subject to `μᵀw >= target_return`.
pub fn efficient_return(
    mu: &DVector<f64>,
    cov: &DMatrix<f64>,
    target_return: f64,
    gamma: f64,
) -> Result<DVector<f64>, AllocatorError> {
    let n = ensure_square(mu.len(), cov)?;
    if !target_return.is_finite() {
        return Err(AllocatorError::invalid_request(
            "target_return must be a finite number",
        ));
    }
    let ceiling = max_neutral_return(mu);
    if target_return > ceiling + RETURN_TOLERANCE {
        return Err(AllocatorError::infeasible(format!(
            "target return {target_return:.4} exceeds the best market-neutral return {ceiling:.4}"
        )));
    }

    let objective = constant_matrix(column_major(&ridged(cov, gamma)), n, n);
    let expected = constant_vec(entries(mu));
    let (zero, lower, upper) = (0.0, -1.0, 1.0);

    let w = variable(n);
    let solution = Problem::minimize(quad_form(&w, &objective))
        .subject_to(vec![
            constraint!((dot(&expected, &w)) >= target_return),
            constraint!((sum(&w)) == zero),
            constraint!(w >= lower),
            constraint!(w <= upper),
        ])
        .solve()
        .map_err(solver_error)?;
    ensure_optimal(solution.value)?;
    leading(&solution[&w], n)
}
