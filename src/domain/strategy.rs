//! The seven optimization strategies behind the HTTP routes.
//!
//! Each strategy maps a price history to cleaned weights plus the
//! performance figures that strategy reports.

use std::fmt;
use std::str::FromStr;

use log::debug;
use nalgebra::DVector;

use crate::domain::config_validation::OptimizerSettings;
use crate::domain::cvar::{conditional_value_at_risk, efficient_cvar};
use crate::domain::error::AllocatorError;
use crate::domain::estimators::{
    capm_return, ledoit_wolf, mean_daily_return, portfolio_return, portfolio_volatility,
    require_observations, returns_from_prices, sample_cov,
};
use crate::domain::frontier::{
    EFFICIENT_RETURN_GAMMA, EFFICIENT_RISK_GAMMA, efficient_return, efficient_risk, max_sharpe,
    min_volatility,
};
use crate::domain::hrp::hrp_weights;
use crate::domain::portfolio::{
    ANNUAL_SEMI_DEVIATION, ANNUAL_VOLATILITY, CONDITIONAL_VALUE_AT_RISK, EXPECTED_ANNUAL_RETURN,
    PerformanceSummary, SHARPE_RATIO, SORTINO_RATIO, WEIGHT_CUTOFF, WEIGHT_DECIMALS, WeightVector,
    mean_variance_summary,
};
use crate::domain::price_series::PriceSeries;
use crate::domain::semivariance::{annual_semi_deviation, daily_benchmark, min_semivariance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    MinVolatility,
    MaxSharpeWithSectorConstraints,
    MaximizeReturnGivenRisk,
    MinimizeRiskGivenReturn,
    EfficientSemivariance,
    EfficientCvar,
    Hrp,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::MinVolatility,
        StrategyKind::MaxSharpeWithSectorConstraints,
        StrategyKind::MaximizeReturnGivenRisk,
        StrategyKind::MinimizeRiskGivenReturn,
        StrategyKind::EfficientSemivariance,
        StrategyKind::EfficientCvar,
        StrategyKind::Hrp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::MinVolatility => "min_volatility",
            StrategyKind::MaxSharpeWithSectorConstraints => "max_sharpe_with_sector_constraints",
            StrategyKind::MaximizeReturnGivenRisk => "maximize_return_given_risk",
            StrategyKind::MinimizeRiskGivenReturn => "minimize_risk_given_return",
            StrategyKind::EfficientSemivariance => "efficient_semivariance",
            StrategyKind::EfficientCvar => "efficient_cvar",
            StrategyKind::Hrp => "hrp",
        }
    }

    /// Whether the strategy only ever holds long positions.
    pub fn is_long_only(&self) -> bool {
        !matches!(
            self,
            StrategyKind::MinVolatility | StrategyKind::MinimizeRiskGivenReturn
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = StrategyKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown strategy '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// Per-request targets; `None` falls back to the configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrategyParams {
    pub target_volatility: Option<f64>,
    pub target_return: Option<f64>,
    pub target_cvar: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub weights: WeightVector,
    pub performance: PerformanceSummary,
}

/// Slack allowed when re-checking sector bounds on rounded weights.
const SECTOR_TOLERANCE: f64 = 1e-3;

/// Re-check cleaned weights against what the strategy promises.
fn verify(
    kind: StrategyKind,
    weights: &WeightVector,
    tickers: &[String],
    settings: &OptimizerSettings,
) -> Result<(), AllocatorError> {
    if kind.is_long_only() && weights.has_shorts() {
        return Err(AllocatorError::solver(format!(
            "{kind} produced a short position"
        )));
    }
    if kind != StrategyKind::MaxSharpeWithSectorConstraints {
        return Ok(());
    }
    let totals = settings.sectors.sector_weights(weights);
    for bound in settings.sectors.active_bounds(tickers) {
        let held = totals.get(&bound.sector).copied().unwrap_or(0.0);
        let below = bound.lower.is_some_and(|lo| held < lo - SECTOR_TOLERANCE);
        let above = bound.upper.is_some_and(|up| held > up + SECTOR_TOLERANCE);
        if below || above {
            return Err(AllocatorError::solver(format!(
                "sector {} ends at weight {held:.4}, outside its bounds",
                bound.sector
            )));
        }
    }
    Ok(())
}

fn finite(name: &str, value: f64) -> Result<f64, AllocatorError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AllocatorError::invalid_request(format!("{name} must be a finite number")))
    }
}

/// Run `kind` over `prices`, whose columns are the tickers to weight.
pub fn run(
    kind: StrategyKind,
    prices: &PriceSeries,
    params: &StrategyParams,
    settings: &OptimizerSettings,
) -> Result<StrategyOutcome, AllocatorError> {
    let tickers = prices.tickers().to_vec();
    let returns = returns_from_prices(prices);
    require_observations(&returns)?;
    debug!(
        "{kind}: {} assets, {} return observations",
        returns.ncols(),
        returns.nrows()
    );

    let rf = settings.risk_free_rate;
    let (raw, performance): (DVector<f64>, PerformanceSummary) = match kind {
        StrategyKind::MinVolatility => {
            let (cov, _) = ledoit_wolf(&returns);
            let w = min_volatility(&cov)?;
            let perf = PerformanceSummary::new()
                .with(EXPECTED_ANNUAL_RETURN, f64::NAN)
                .with(ANNUAL_VOLATILITY, portfolio_volatility(&w, &cov))
                .with(SHARPE_RATIO, f64::NAN);
            (w, perf)
        }
        StrategyKind::MaxSharpeWithSectorConstraints => {
            let mu = capm_return(&returns, rf);
            let (cov, _) = ledoit_wolf(&returns);
            let bounds = settings.sectors.active_bounds(&tickers);
            let w = max_sharpe(&mu, &cov, rf, &bounds)?;
            let perf = mean_variance_summary(
                portfolio_return(&w, &mu),
                portfolio_volatility(&w, &cov),
                rf,
            );
            (w, perf)
        }
        StrategyKind::MaximizeReturnGivenRisk => {
            let target = finite(
                "target_volatility",
                params.target_volatility.unwrap_or(settings.target_volatility),
            )?;
            let mu = capm_return(&returns, rf);
            let (cov, _) = ledoit_wolf(&returns);
            let w = efficient_risk(&mu, &cov, target, EFFICIENT_RISK_GAMMA)?;
            let perf = mean_variance_summary(
                portfolio_return(&w, &mu),
                portfolio_volatility(&w, &cov),
                rf,
            );
            (w, perf)
        }
        StrategyKind::MinimizeRiskGivenReturn => {
            let target = finite(
                "target_return",
                params.target_return.unwrap_or(settings.target_return),
            )?;
            let mu = capm_return(&returns, rf);
            let (cov, _) = ledoit_wolf(&returns);
            let w = efficient_return(&mu, &cov, target, EFFICIENT_RETURN_GAMMA)?;
            let perf = mean_variance_summary(
                portfolio_return(&w, &mu),
                portfolio_volatility(&w, &cov),
                rf,
            );
            (w, perf)
        }
        StrategyKind::EfficientSemivariance => {
            // the benchmark only moves when a target is given explicitly
            let annual = finite("target_return", params.target_return.unwrap_or(0.0))?;
            let benchmark = daily_benchmark(annual);
            let mu = capm_return(&returns, rf);
            let w = min_semivariance(&returns, benchmark)?;
            let expected = portfolio_return(&w, &mu);
            let semi_deviation = annual_semi_deviation(&returns, &w, benchmark);
            let sortino = if semi_deviation > 0.0 {
                (expected - rf) / semi_deviation
            } else {
                f64::NAN
            };
            let perf = PerformanceSummary::new()
                .with(EXPECTED_ANNUAL_RETURN, expected)
                .with(ANNUAL_SEMI_DEVIATION, semi_deviation)
                .with(SORTINO_RATIO, sortino);
            (w, perf)
        }
        StrategyKind::EfficientCvar => {
            let target = finite(
                "target_cvar",
                params.target_cvar.unwrap_or(settings.target_cvar),
            )?;
            let mu = capm_return(&returns, rf);
            let w = efficient_cvar(&mu, &returns, settings.cvar_beta, target)?;
            let perf = PerformanceSummary::new()
                .with(EXPECTED_ANNUAL_RETURN, portfolio_return(&w, &mu))
                .with(
                    CONDITIONAL_VALUE_AT_RISK,
                    conditional_value_at_risk(&returns, &w, settings.cvar_beta),
                );
            (w, perf)
        }
        StrategyKind::Hrp => {
            let w = hrp_weights(&returns)?;
            let perf = mean_variance_summary(
                portfolio_return(&w, &mean_daily_return(&returns)),
                portfolio_volatility(&w, &sample_cov(&returns)),
                rf,
            );
            (w, perf)
        }
    };

    let weights = WeightVector::new(&tickers, &raw).clean(WEIGHT_CUTOFF, WEIGHT_DECIMALS);
    verify(kind, &weights, &tickers, settings)?;
    Ok(StrategyOutcome {
        weights,
        performance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_series::PricePoint;
    use chrono::{Days, NaiveDate};

    /// Deterministic trending prices with uneven wiggles per ticker.
    fn synthetic(tickers: &[&str], days: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let columns = tickers
            .iter()
            .enumerate()
            .map(|(j, ticker)| {
                let mut price = 50.0 + 25.0 * j as f64;
                let points = (0..days)
                    .map(|t| {
                        let wiggle = ((t * 7919 + j * 104_729) % 997) as f64 / 997.0 - 0.5;
                        let cycle = ((t as f64) * (0.07 + 0.05 * j as f64)).sin();
                        price *= 1.0 + 0.0008 + 0.004 * cycle * 0.3 + 0.015 * wiggle * (1.0 + j as f64 * 0.3);
                        PricePoint::new(start.checked_add_days(Days::new(t as u64)).unwrap(), price)
                    })
                    .collect();
                (ticker.to_string(), points)
            })
            .collect();
        PriceSeries::from_columns(columns)
    }

    #[test]
    fn names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>(), Ok(kind));
        }
        assert!("momentum".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn min_volatility_reports_volatility_only() {
        let prices = synthetic(&["MSFT", "AMZN", "KO"], 300);
        let out = run(
            StrategyKind::MinVolatility,
            &prices,
            &StrategyParams::default(),
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!((out.weights.sum() - 1.0).abs() < 1e-3);
        assert_eq!(out.performance.get(EXPECTED_ANNUAL_RETURN), None);
        assert_eq!(out.performance.get(SHARPE_RATIO), None);
        assert!(out.performance.get(ANNUAL_VOLATILITY).unwrap() > 0.0);
    }

    #[test]
    fn hrp_is_long_only() {
        let prices = synthetic(&["A", "B", "C", "D"], 200);
        let out = run(
            StrategyKind::Hrp,
            &prices,
            &StrategyParams::default(),
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!(out.weights.iter().all(|(_, w)| w >= 0.0));
        assert!((out.weights.sum() - 1.0).abs() < 1e-3);
        assert!(out.performance.contains(SHARPE_RATIO));
    }

    #[test]
    fn semivariance_reports_downside_metrics() {
        let prices = synthetic(&["A", "B", "C"], 250);
        let out = run(
            StrategyKind::EfficientSemivariance,
            &prices,
            &StrategyParams::default(),
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert_eq!(
            out.performance.names(),
            vec![EXPECTED_ANNUAL_RETURN, ANNUAL_SEMI_DEVIATION, SORTINO_RATIO]
        );
        assert!(out.weights.iter().all(|(_, w)| w >= 0.0));
    }

    #[test]
    fn short_weights_fail_long_only_strategies() {
        let tickers = vec!["A".to_string(), "B".to_string()];
        let hedged = WeightVector::from_pairs(vec![("A".into(), 1.2), ("B".into(), -0.2)]);
        let settings = OptimizerSettings::default();
        assert!(matches!(
            verify(StrategyKind::Hrp, &hedged, &tickers, &settings),
            Err(AllocatorError::SolverFailure { .. })
        ));
        assert!(verify(StrategyKind::MinVolatility, &hedged, &tickers, &settings).is_ok());
        assert!(StrategyKind::EfficientCvar.is_long_only());
    }

    #[test]
    fn sector_breach_fails_max_sharpe() {
        let tickers = vec!["MSFT".to_string(), "KO".to_string()];
        let settings = OptimizerSettings::default();
        // Tech is capped at 0.2 by the built-in table
        let heavy = WeightVector::from_pairs(vec![("MSFT".into(), 0.6), ("KO".into(), 0.4)]);
        assert!(matches!(
            verify(StrategyKind::MaxSharpeWithSectorConstraints, &heavy, &tickers, &settings),
            Err(AllocatorError::SolverFailure { .. })
        ));
        let capped = WeightVector::from_pairs(vec![("MSFT".into(), 0.2), ("KO".into(), 0.8)]);
        assert!(
            verify(StrategyKind::MaxSharpeWithSectorConstraints, &capped, &tickers, &settings)
                .is_ok()
        );
        // other strategies carry no sector bounds
        assert!(verify(StrategyKind::Hrp, &heavy, &tickers, &settings).is_ok());
    }

    #[test]
    fn non_finite_target_is_rejected() {
        let prices = synthetic(&["A", "B"], 100);
        let params = StrategyParams {
            target_volatility: Some(f64::NAN),
            ..Default::default()
        };
        let result = run(
            StrategyKind::MaximizeReturnGivenRisk,
            &prices,
            &params,
            &OptimizerSettings::default(),
        );
        assert!(matches!(result, Err(AllocatorError::InvalidRequest { .. })));
    }

    #[test]
    fn too_little_history_is_rejected() {
        let prices = synthetic(&["A", "B"], 2);
        let result = run(
            StrategyKind::Hrp,
            &prices,
            &StrategyParams::default(),
            &OptimizerSettings::default(),
        );
        assert!(matches!(result, Err(AllocatorError::InsufficientData { .. })));
    }
}
