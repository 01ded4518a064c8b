//! Historical conditional value-at-risk and CVaR-constrained allocation.
//!
//! `CVaR_β(w)` is the average of the worst `(1 - β) T` daily losses
//! `-rₜᵀw`, with the boundary observation counted fractionally. Both
//! optimizers use the Rockafellar-Uryasev linear program, which reaches the
//! same value over equally weighted scenarios:
//!
//! `CVaR_β(w) = min_α α + Σₜ max(0, -rₜᵀw - α) / ((1 - β) T)`.

use cvxrust::prelude::*;
use std::result::Result;
use log::debug;
use nalgebra::{DMatrix, DVector};

use super::convex::{column_major, ensure_optimal, entries, leading, onto_simplex, solver_error};
use super::error::AllocatorError;

pub const DEFAULT_BETA: f64 = 0.95;

const CVAR_TOLERANCE: f64 = 1e-6;

fn tail_size(observations: usize, beta: f64) -> f64 {
    ((1.0 - beta) * observations as f64).clamp(f64::MIN_POSITIVE, observations as f64)
}

/// Historical CVaR of daily portfolio losses at confidence `beta`.
pub fn conditional_value_at_risk(returns: &DMatrix<f64>, weights: &DVector<f64>, beta: f64) -> f64 {
    let t = returns.nrows();
    if t == 0 {
        return f64::NAN;
    }
    let mut losses: Vec<f64> = (returns * weights).iter().map(|r| -r).collect();
    losses.sort_by(|a, b| b.total_cmp(a));

    let tail = tail_size(t, beta);
    let mut remaining = tail;
    let mut total = 0.0;
    for loss in losses {
        if remaining <= 0.0 {
            break;
        }
        let share = remaining.min(1.0);
        total += loss * share;
        remaining -= share;
    }
    total / tail
}

fn validate(returns: &DMatrix<f64>, beta: f64) -> Result<usize, AllocatorError> {
    if !(0.0..1.0).contains(&beta) {
        return Err(AllocatorError::invalid_request(format!(
            "CVaR confidence {beta} must lie in [0, 1)"
        )));
    }
    let (t, n) = returns.shape();
    if t == 0 || n == 0 {
        return Err(AllocatorError::invalid_request(
            "CVaR needs at least one asset and one observation",
        ));
    }
    Ok(n)
}

/// Coefficients of the Rockafellar-Uryasev program over `z = [w; a]` and
/// one excess-loss variable `uₜ` per day.
///
/// The threshold is shifted, `α = a - bound`, so every variable is
/// non-negative. Any long-only budget keeps each daily loss inside
/// `[-bound, bound]`, which caps `a` at `2 bound` without cutting off the
/// optimum.
struct TailProgram {
    n: usize,
    t: usize,
    bound: f64,
    /// `[R | 1]`, column-major.
    scenarios: Vec<f64>,
    /// Budget row `[1 … 1, 0]`.
    budget: Vec<f64>,
    /// Selects `a`.
    threshold: Vec<f64>,
    /// `1 / ((1 - β) T)` for every day.
    excess: Vec<f64>,
}

impl TailProgram {
    fn new(returns: &DMatrix<f64>, beta: f64) -> Self {
        let (t, n) = returns.shape();
        let bound = returns.amax().max(1e-12);
        let scenarios = returns.clone().insert_column(n, 1.0);
        let mut budget = vec![1.0; n + 1];
        budget[n] = 0.0;
        let mut threshold = vec![0.0; n + 1];
        threshold[n] = 1.0;
        TailProgram {
            n,
            t,
            bound,
            scenarios: column_major(&scenarios),
            budget,
            threshold,
            excess: vec![1.0 / tail_size(t, beta); t],
        }
    }

    /// Variables `z` and `u`, the feasible set shared by both optimizers,
    /// and the CVaR expression (offset by `bound`).
    fn build(&self) -> (Expr, Expr, Vec<Constraint>, Expr) {
        let scenarios = constant_matrix(self.scenarios.clone(), self.t, self.n + 1);
        let budget = constant_vec(self.budget.clone());
        let threshold = constant_vec(self.threshold.clone());
        let excess = constant_vec(self.excess.clone());
        let (one, zero, shift, cap) = (1.0, 0.0, self.bound, 2.0 * self.bound);

        let z = variable(self.n + 1);
        let u = variable(self.t);
        let constraints = vec![
            constraint!((matmul(&scenarios, &z) + u.clone()) >= shift),
            constraint!((dot(&budget, &z)) == one),
            constraint!((dot(&threshold, &z)) <= cap),
            constraint!(z >= zero),
            constraint!(u >= zero),
        ];
        let cvar = dot(&threshold, &z) + dot(&excess, &u);
        (z, u, constraints, cvar)
    }
}

/// Long-only, fully-invested weights with the smallest CVaR, and that CVaR.
pub fn min_cvar(returns: &DMatrix<f64>, beta: f64) -> Result<(DVector<f64>, f64), AllocatorError> {
    let n = validate(returns, beta)?;
    let program = TailProgram::new(returns, beta);

    let (z, _, constraints, cvar) = program.build();
    let solution = Problem::minimize(cvar)
        .subject_to(constraints)
        .solve()
        .map_err(solver_error)?;
    let shifted = ensure_optimal(solution.value)?;

    let w = onto_simplex(&leading(&solution[&z], n)?)?;
    let value = conditional_value_at_risk(returns, &w, beta);
    debug!(
        "min CVaR {value:.6} (program optimum {:.6})",
        shifted - program.bound
    );
    Ok((w, value))
}

/// Long-only, fully-invested weights maximizing `μᵀw` with CVaR at most
/// `target_cvar`.
pub fn efficient_cvar(
    mu: &DVector<f64>,
    returns: &DMatrix<f64>,
    beta: f64,
    target_cvar: f64,
) -> Result<DVector<f64>, AllocatorError> {
    let n = validate(returns, beta)?;
    if mu.len() != n {
        return Err(AllocatorError::invalid_request(format!(
            "{} expected returns for {n} assets",
            mu.len()
        )));
    }
    if !target_cvar.is_finite() {
        return Err(AllocatorError::invalid_request("target_cvar must be a finite number"));
    }

    let (floor_weights, floor) = min_cvar(returns, beta)?;
    if target_cvar + CVAR_TOLERANCE < floor {
        return Err(AllocatorError::infeasible(format!(
            "target CVaR {target_cvar:.4} is below the minimum attainable {floor:.4}"
        )));
    }
    if target_cvar <= floor + CVAR_TOLERANCE {
        return Ok(floor_weights);
    }

    let program = TailProgram::new(returns, beta);
    let mut neg_mu = entries(&(-mu));
    neg_mu.push(0.0);
    let neg_mu = constant_vec(neg_mu);
    let cap = target_cvar + program.bound;

    let (z, _, mut constraints, cvar) = program.build();
    constraints.push(constraint!((cvar) <= cap));
    let solution = Problem::minimize(dot(&neg_mu, &z))
        .subject_to(constraints)
        .solve()
        .map_err(solver_error)?;
    ensure_optimal(solution.value)?;

    let w = onto_simplex(&leading(&solution[&z], n)?)?;
    debug!(
        "efficient CVaR {:.6} against target {target_cvar:.6}",
        conditional_value_at_risk(returns, &w, beta)
    );
    Ok(w)
}
