//! Expected-return and risk-model estimators over daily returns.
//!
//! Every estimator takes a `T x N` returns matrix (one row per observation,
//! one column per ticker) and produces annualized figures.

use nalgebra::{DMatrix, DVector};

use super::error::AllocatorError;
use super::price_series::PriceSeries;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Fewest return observations any estimator accepts.
pub const MIN_RETURN_OBSERVATIONS: usize = 2;

/// Simple daily returns between consecutive rows.
///
/// Missing prices are carried forward from the previous observation; a return
/// row is kept only when every ticker has a price on both dates.
pub fn returns_from_prices(series: &PriceSeries) -> DMatrix<f64> {
    let n = series.tickers().len();
    let mut last: Vec<Option<f64>> = vec![None; n];
    let mut data = Vec::new();
    let mut observations = 0;

    for (i, row) in series.rows().iter().enumerate() {
        let current: Vec<Option<f64>> = row
            .iter()
            .zip(&last)
            .map(|(price, prev)| price.or(*prev))
            .collect();

        if i > 0 {
            let step: Option<Vec<f64>> = last
                .iter()
                .zip(&current)
                .map(|(prev, curr)| match (prev, curr) {
                    (Some(p), Some(c)) => Some(c / p - 1.0),
                    _ => None,
                })
                .collect();
            if let Some(step) = step {
                data.extend(step);
                observations += 1;
            }
        }
        last = current;
    }

    DMatrix::from_row_slice(observations, n, &data)
}

pub fn require_observations(returns: &DMatrix<f64>) -> Result<(), AllocatorError> {
    if returns.nrows() < MIN_RETURN_OBSERVATIONS || returns.ncols() == 0 {
        return Err(AllocatorError::InsufficientData {
            observations: returns.nrows(),
            minimum: MIN_RETURN_OBSERVATIONS,
        });
    }
    Ok(())
}

fn column_means(returns: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        returns.ncols(),
        returns.column_iter().map(|c| c.mean()),
    )
}

fn centered(returns: &DMatrix<f64>) -> DMatrix<f64> {
    let means = column_means(returns);
    let mut x = returns.clone();
    for (j, mut col) in x.column_iter_mut().enumerate() {
        col.add_scalar_mut(-means[j]);
    }
    x
}

/// Mean daily return per asset, scaled to a year.
pub fn mean_daily_return(returns: &DMatrix<f64>) -> DVector<f64> {
    column_means(returns) * TRADING_DAYS_PER_YEAR
}

/// CAPM expected returns against an equal-weighted market proxy.
///
/// `mu_i = rf + beta_i * (R_m - rf)` where `R_m` is the compounded annual
/// return of the proxy.
pub fn capm_return(returns: &DMatrix<f64>, risk_free_rate: f64) -> DVector<f64> {
    let t = returns.nrows();
    let market = DVector::from_iterator(t, returns.row_iter().map(|r| r.mean()));
    let market_mean = market.mean();

    let market_var: f64 = market.iter().map(|m| (m - market_mean).powi(2)).sum();
    let growth: f64 = market.iter().map(|m| 1.0 + m).product();
    let market_return = growth.powf(TRADING_DAYS_PER_YEAR / t as f64) - 1.0;

    DVector::from_iterator(
        returns.ncols(),
        returns.column_iter().map(|c| {
            let mean = c.mean();
            let cov: f64 = c
                .iter()
                .zip(market.iter())
                .map(|(r, m)| (r - mean) * (m - market_mean))
                .sum();
            let beta = if market_var > 0.0 { cov / market_var } else { 0.0 };
            risk_free_rate + beta * (market_return - risk_free_rate)
        }),
    )
}

/// Annualized sample covariance (unbiased).
pub fn sample_cov(returns: &DMatrix<f64>) -> DMatrix<f64> {
    let t = returns.nrows();
    let x = centered(returns);
    let denom = (t.saturating_sub(1)).max(1) as f64;
    (x.transpose() * &x) * (TRADING_DAYS_PER_YEAR / denom)
}

/// Pearson correlation matrix.
pub fn correlation(returns: &DMatrix<f64>) -> DMatrix<f64> {
    let cov = sample_cov(returns);
    let n = cov.nrows();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            return 1.0;
        }
        let scale = (cov[(i, i)] * cov[(j, j)]).sqrt();
        if scale > 0.0 { cov[(i, j)] / scale } else { 0.0 }
    })
}

/// Ledoit-Wolf shrinkage towards a scaled identity (constant variance).
///
/// Returns the annualized shrunk covariance and the shrinkage intensity.
pub fn ledoit_wolf(returns: &DMatrix<f64>) -> (DMatrix<f64>, f64) {
    let (t, n) = returns.shape();
    let x = centered(returns);
    let tf = t as f64;
    let nf = n as f64;

    let emp_cov = (x.transpose() * &x) / tf;
    if n <= 1 || t == 0 {
        return (emp_cov * TRADING_DAYS_PER_YEAR, 0.0);
    }

    let x2 = x.component_mul(&x);
    let variances: Vec<f64> = x2.column_iter().map(|c| c.sum() / tf).collect();
    let variance_sum: f64 = variances.iter().sum();
    let mu = variance_sum / nf;

    let beta_raw = (x2.transpose() * &x2).sum();
    let delta_raw = (x.transpose() * &x).map(|v| v * v).sum() / (tf * tf);

    let beta = (beta_raw / tf - delta_raw) / (nf * tf);
    let delta = (delta_raw - 2.0 * mu * variance_sum + nf * mu * mu) / nf;
    let beta = beta.min(delta);
    let shrinkage = if beta <= 0.0 || delta <= 0.0 {
        0.0
    } else {
        beta / delta
    };

    let mut shrunk = emp_cov * (1.0 - shrinkage);
    for i in 0..n {
        shrunk[(i, i)] += shrinkage * mu;
    }
    (shrunk * TRADING_DAYS_PER_YEAR, shrinkage)
}

pub fn portfolio_return(weights: &DVector<f64>, expected: &DVector<f64>) -> f64 {
    weights.dot(expected)
}

pub fn portfolio_volatility(weights: &DVector<f64>, cov: &DMatrix<f64>) -> f64 {
    (weights.transpose() * cov * weights)[(0, 0)].max(0.0).sqrt()
}
