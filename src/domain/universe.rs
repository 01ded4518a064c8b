//! Ticker lists and per-ticker price retrieval.
//!
//! A ticker that cannot be fetched is reported, never fatal: the request
//! continues with whatever subset resolved.

use crate::domain::price_series::{HistoryPeriod, PricePoint, PriceSeries};
use crate::ports::price_port::PricePort;
use log::{info, warn};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("no tickers given")]
    Empty,
}

/// Parse a comma-separated ticker list (CLI input).
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    if input.trim().is_empty() {
        return Err(UniverseError::Empty);
    }
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if seen.insert(ticker.clone()) {
            tickers.push(ticker);
        }
    }

    Ok(tickers)
}

/// Trim, uppercase and de-duplicate a request's tickers, keeping first-seen order.
pub fn normalize_tickers<S: AsRef<str>>(tickers: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .iter()
        .map(|t| t.as_ref().trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Exchange symbols: uppercase letters, digits and `.^=-`.
pub fn is_valid_ticker(ticker: &str) -> bool {
    !ticker.is_empty()
        && ticker
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || ".^=-".contains(c))
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub prices: PriceSeries,
    /// Tickers with data, in request order.
    pub valid: Vec<String>,
    /// Tickers that failed or returned nothing, in request order.
    pub errors: Vec<String>,
}

impl FetchOutcome {
    pub fn has_prices(&self) -> bool {
        !self.valid.is_empty() && !self.prices.is_empty()
    }
}

pub fn fetch_prices(port: &dyn PricePort, tickers: &[String], period: HistoryPeriod) -> FetchOutcome {
    let mut columns: Vec<(String, Vec<PricePoint>)> = Vec::new();
    let mut errors = Vec::new();

    for ticker in tickers {
        if !is_valid_ticker(ticker) {
            warn!("skipping {ticker:?} (not a ticker symbol)");
            errors.push(ticker.clone());
            continue;
        }
        match port.fetch_adjusted_close(ticker, period) {
            Ok(points) if points.iter().any(|p| p.adj_close.is_finite() && p.adj_close > 0.0) => {
                info!("{ticker}: {} prices from {}", points.len(), port.name());
                columns.push((ticker.clone(), points));
            }
            Ok(_) => {
                warn!("skipping {ticker} (no data found)");
                errors.push(ticker.clone());
            }
            Err(e) => {
                warn!("skipping {ticker} ({e})");
                errors.push(ticker.clone());
            }
        }
    }

    let valid = columns.iter().map(|(t, _)| t.clone()).collect();
    FetchOutcome {
        prices: PriceSeries::from_columns(columns),
        valid,
        errors,
    }
}
