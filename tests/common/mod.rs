#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use portfolio_allocator::domain::error::AllocatorError;
use portfolio_allocator::domain::price_series::{HistoryPeriod, PricePoint};
use portfolio_allocator::ports::price_port::PricePort;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, ticker: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(ticker.to_string(), points);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_adjusted_close(
        &self,
        ticker: &str,
        _period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, AllocatorError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(AllocatorError::PriceFetch {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        self.data
            .get(ticker)
            .cloned()
            .ok_or_else(|| AllocatorError::PriceFetch {
                ticker: ticker.to_string(),
                reason: "symbol not found".to_string(),
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 4).unwrap()
}

/// Seeded one-factor market: every ticker loads on a shared daily shock
/// plus its own noise, with a positive drift.
pub fn synthetic_market(tickers: &[&str], days: usize, seed: u64) -> Vec<(String, Vec<PricePoint>)> {
    let mut market_rng = StdRng::seed_from_u64(seed);
    let market: Vec<f64> = (0..days)
        .map(|_| market_rng.gen_range(-1.0..1.0) * 0.012)
        .collect();

    tickers
        .iter()
        .enumerate()
        .map(|(j, ticker)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1 + j as u64));
            let beta = 0.6 + 0.15 * j as f64;
            let idio = 0.008 + 0.003 * j as f64;
            let mut price = 40.0 + 35.0 * j as f64;
            let points = market
                .iter()
                .enumerate()
                .map(|(t, m)| {
                    price *= 1.0 + 0.0009 + beta * m + idio * rng.gen_range(-1.0..1.0);
                    PricePoint::new(
                        start_date().checked_add_days(Days::new(t as u64)).unwrap(),
                        price,
                    )
                })
                .collect();
            (ticker.to_string(), points)
        })
        .collect()
}

pub fn mock_market(tickers: &[&str], days: usize, seed: u64) -> MockPricePort {
    synthetic_market(tickers, days, seed)
        .into_iter()
        .fold(MockPricePort::new(), |port, (ticker, points)| {
            port.with_prices(&ticker, points)
        })
}

/// Write one `<TICKER>.csv` per ticker in the csv provider's layout.
pub fn write_csv_market(dir: &Path, tickers: &[&str], days: usize, seed: u64) {
    for (ticker, points) in synthetic_market(tickers, days, seed) {
        let mut content = String::from("date,adj_close\n");
        for p in points {
            content.push_str(&format!("{},{}\n", p.date.format("%Y-%m-%d"), p.adj_close));
        }
        fs::write(dir.join(format!("{ticker}.csv")), content).unwrap();
    }
}
