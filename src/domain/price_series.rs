//! Adjusted-close price history keyed by date.

use chrono::{Datelike, Months, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One adjusted closing price observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub adj_close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, adj_close: f64) -> Self {
        Self { date, adj_close }
    }
}

/// How much history to request from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPeriod {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    #[default]
    Max,
}

impl HistoryPeriod {
    /// Provider range token (`1d`, `5y`, `max`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryPeriod::OneDay => "1d",
            HistoryPeriod::FiveDays => "5d",
            HistoryPeriod::OneMonth => "1mo",
            HistoryPeriod::ThreeMonths => "3mo",
            HistoryPeriod::SixMonths => "6mo",
            HistoryPeriod::OneYear => "1y",
            HistoryPeriod::TwoYears => "2y",
            HistoryPeriod::FiveYears => "5y",
            HistoryPeriod::TenYears => "10y",
            HistoryPeriod::YearToDate => "ytd",
            HistoryPeriod::Max => "max",
        }
    }

    /// First date covered by this period when the newest observation is `latest`.
    /// `None` means the whole history.
    pub fn start_date(&self, latest: NaiveDate) -> Option<NaiveDate> {
        let months = |m: u32| latest.checked_sub_months(Months::new(m));
        match self {
            HistoryPeriod::OneDay => latest.pred_opt(),
            HistoryPeriod::FiveDays => latest.checked_sub_days(chrono::Days::new(5)),
            HistoryPeriod::OneMonth => months(1),
            HistoryPeriod::ThreeMonths => months(3),
            HistoryPeriod::SixMonths => months(6),
            HistoryPeriod::OneYear => months(12),
            HistoryPeriod::TwoYears => months(24),
            HistoryPeriod::FiveYears => months(60),
            HistoryPeriod::TenYears => months(120),
            HistoryPeriod::YearToDate => NaiveDate::from_ymd_opt(latest.year(), 1, 1),
            HistoryPeriod::Max => None,
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(HistoryPeriod::OneDay),
            "5d" => Ok(HistoryPeriod::FiveDays),
            "1mo" => Ok(HistoryPeriod::OneMonth),
            "3mo" => Ok(HistoryPeriod::ThreeMonths),
            "6mo" => Ok(HistoryPeriod::SixMonths),
            "1y" => Ok(HistoryPeriod::OneYear),
            "2y" => Ok(HistoryPeriod::TwoYears),
            "5y" => Ok(HistoryPeriod::FiveYears),
            "10y" => Ok(HistoryPeriod::TenYears),
            "ytd" => Ok(HistoryPeriod::YearToDate),
            "max" => Ok(HistoryPeriod::Max),
            other => Err(format!("unknown history period '{other}'")),
        }
    }
}

/// Date-indexed table of adjusted closes, one column per ticker.
///
/// A cell is `None` when the ticker has no observation on that date. Dates on
/// which no ticker has data are never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<Option<f64>>>,
}

impl PriceSeries {
    /// Outer-join per-ticker series on date. Non-finite or non-positive prices
    /// are treated as missing.
    pub fn from_columns(columns: Vec<(String, Vec<PricePoint>)>) -> Self {
        let width = columns.len();
        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        let mut tickers = Vec::with_capacity(width);

        for (idx, (ticker, points)) in columns.into_iter().enumerate() {
            tickers.push(ticker);
            for point in points {
                if !point.adj_close.is_finite() || point.adj_close <= 0.0 {
                    continue;
                }
                by_date.entry(point.date).or_insert_with(|| vec![None; width])[idx] =
                    Some(point.adj_close);
            }
        }

        let (dates, rows) = by_date.into_iter().unzip();
        Self {
            tickers,
            dates,
            rows,
        }
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.tickers.is_empty()
    }

    /// Most recent available price for each ticker.
    pub fn latest_prices(&self) -> Vec<(String, f64)> {
        self.tickers
            .iter()
            .enumerate()
            .filter_map(|(i, ticker)| {
                self.rows
                    .iter()
                    .rev()
                    .find_map(|row| row[i])
                    .map(|price| (ticker.clone(), price))
            })
            .collect()
    }
}
