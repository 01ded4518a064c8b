//! CSV directory price adapter.
//!
//! One file per ticker, `<dir>/<TICKER>.csv`, with a header row containing
//! `date` and `adj_close` columns. Dates are `YYYY-MM-DD`.

use crate::domain::error::AllocatorError;
use crate::domain::price_series::{HistoryPeriod, PricePoint};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    /// Tickers with a price file in the directory, sorted.
    pub fn list_tickers(&self) -> Result<Vec<String>, AllocatorError> {
        let entries = fs::read_dir(&self.base_path)?;
        let mut tickers = Vec::new();

        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();
            if let Some(ticker) = name_str.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }
}

fn fetch_error(ticker: &str, reason: impl Into<String>) -> AllocatorError {
    AllocatorError::PriceFetch {
        ticker: ticker.to_string(),
        reason: reason.into(),
    }
}

impl PricePort for CsvAdapter {
    fn fetch_adjusted_close(
        &self,
        ticker: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, AllocatorError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path)
            .map_err(|e| fetch_error(ticker, format!("failed to read {}: {e}", path.display())))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| fetch_error(ticker, format!("CSV parse error: {e}")))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| fetch_error(ticker, format!("missing {name} column")))
        };
        let date_col = column("date")?;
        let price_col = column("adj_close")?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| fetch_error(ticker, format!("CSV parse error: {e}")))?;

            let date_str = record
                .get(date_col)
                .ok_or_else(|| fetch_error(ticker, "missing date value"))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| fetch_error(ticker, format!("invalid date format: {e}")))?;

            // blank cells are gaps, not errors
            let raw = record.get(price_col).unwrap_or("").trim();
            if raw.is_empty() {
                continue;
            }
            let adj_close: f64 = raw
                .parse()
                .map_err(|e| fetch_error(ticker, format!("invalid adj_close value: {e}")))?;

            points.push(PricePoint::new(date, adj_close));
        }

        points.sort_by_key(|p| p.date);

        if let Some(start) = points.last().and_then(|p| period.start_date(p.date)) {
            points.retain(|p| p.date >= start);
        }
        Ok(points)
    }

    fn name(&self) -> &str {
        "csv"
    }
}
