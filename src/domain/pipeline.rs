//! Request orchestration: tickers -> prices -> strategy -> allocation.

use log::info;
use serde::{Deserialize, Serialize};

use crate::domain::allocation::{AllocationPlan, Instructions, allocate};
use crate::domain::config_validation::OptimizerSettings;
use crate::domain::error::AllocatorError;
use crate::domain::portfolio::{PerformanceSummary, WeightVector};
use crate::domain::price_series::HistoryPeriod;
use crate::domain::strategy::{StrategyKind, StrategyParams, run};
use crate::domain::universe::{fetch_prices, normalize_tickers};
use crate::ports::price_port::PricePort;

/// Body accepted by every optimization route.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PortfolioRequest {
    pub tickers: Vec<String>,
    #[serde(default)]
    pub total_portfolio_value: Option<f64>,
    #[serde(default)]
    pub target_volatility: Option<f64>,
    #[serde(default)]
    pub target_return: Option<f64>,
    #[serde(default)]
    pub target_cvar: Option<f64>,
    #[serde(default)]
    pub period: Option<String>,
}

impl PortfolioRequest {
    pub fn new<S: Into<String>>(tickers: impl IntoIterator<Item = S>) -> Self {
        Self {
            tickers: tickers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    fn params(&self) -> StrategyParams {
        StrategyParams {
            target_volatility: self.target_volatility,
            target_return: self.target_return,
            target_cvar: self.target_cvar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioResponse {
    pub weights: WeightVector,
    pub allocations: Instructions,
    pub leftover: f64,
    pub performance: PerformanceSummary,
    pub errors: Vec<String>,
}

fn budget(request: &PortfolioRequest, settings: &OptimizerSettings) -> Result<f64, AllocatorError> {
    let total = request
        .total_portfolio_value
        .unwrap_or(settings.total_portfolio_value);
    if !total.is_finite() || total <= 0.0 {
        return Err(AllocatorError::invalid_request(
            "total_portfolio_value must be a positive number",
        ));
    }
    Ok(total)
}

fn period(request: &PortfolioRequest, settings: &OptimizerSettings) -> Result<HistoryPeriod, AllocatorError> {
    match &request.period {
        None => Ok(settings.period),
        Some(raw) => raw.parse().map_err(AllocatorError::invalid_request),
    }
}

pub fn optimize(
    port: &dyn PricePort,
    kind: StrategyKind,
    request: &PortfolioRequest,
    settings: &OptimizerSettings,
) -> Result<PortfolioResponse, AllocatorError> {
    let total = budget(request, settings)?;
    let period = period(request, settings)?;
    let tickers = normalize_tickers(&request.tickers);

    let outcome = fetch_prices(port, &tickers, period);
    if !outcome.has_prices() {
        info!("{kind}: no usable tickers among {}", tickers.len());
        let plan = AllocationPlan::unallocated(total);
        return Ok(PortfolioResponse {
            weights: WeightVector::default(),
            allocations: plan.instructions(),
            leftover: plan.leftover(),
            performance: PerformanceSummary::default(),
            errors: outcome.errors,
        });
    }

    let result = run(kind, &outcome.prices, &request.params(), settings)?;
    let latest = outcome.prices.latest_prices();
    let plan = allocate(&result.weights, &latest, total, settings.short_ratio)?;
    info!(
        "{kind}: {} weights, {} positions, leftover {:.2}",
        result.weights.len(),
        plan.shares().len(),
        plan.leftover()
    );

    Ok(PortfolioResponse {
        weights: result.weights,
        allocations: plan.instructions(),
        leftover: plan.leftover(),
        performance: result.performance,
        errors: outcome.errors,
    })
}
