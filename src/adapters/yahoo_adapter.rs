//! Yahoo Finance price adapter.
//!
//! Reads daily adjusted closes from the v8 chart API with a blocking client.
//! A failed request is reported for that ticker only; nothing is retried.

use crate::domain::error::AllocatorError;
use crate::domain::price_series::{HistoryPeriod, PricePoint};
use crate::ports::price_port::PricePort;
use log::debug;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

fn fetch_error(ticker: &str, reason: impl Into<String>) -> AllocatorError {
    AllocatorError::PriceFetch {
        ticker: ticker.to_string(),
        reason: reason.into(),
    }
}

impl YahooAdapter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AllocatorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) portfolio-allocator")
            .build()
            .map_err(|e| AllocatorError::ConfigInvalid {
                section: "data".to_string(),
                key: "timeout_secs".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, ticker: &str, period: HistoryPeriod) -> String {
        format!(
            "{}/v8/finance/chart/{ticker}?range={period}&interval=1d&includeAdjustedClose=true",
            self.base_url
        )
    }

    /// Decode a chart API body into adjusted closes, skipping null entries.
    pub fn parse_chart(ticker: &str, body: &str) -> Result<Vec<PricePoint>, AllocatorError> {
        let resp: ChartResponse = serde_json::from_str(body)
            .map_err(|e| fetch_error(ticker, format!("unexpected response: {e}")))?;

        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => fetch_error(ticker, "symbol not found"),
            Some(err) => fetch_error(
                ticker,
                format!("{}: {}", err.code, err.description.unwrap_or_default()),
            ),
            None => fetch_error(ticker, "empty result with no error"),
        })?;

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };
        let timestamps = data.timestamp.unwrap_or_default();
        let closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose)
            .unwrap_or_default();

        let mut points = Vec::with_capacity(timestamps.len());
        for (ts, close) in timestamps.iter().zip(closes) {
            let Some(close) = close else { continue };
            let date = chrono::DateTime::from_timestamp(*ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| fetch_error(ticker, format!("invalid timestamp: {ts}")))?;
            points.push(PricePoint::new(date, close));
        }
        Ok(points)
    }
}

impl PricePort for YahooAdapter {
    fn fetch_adjusted_close(
        &self,
        ticker: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, AllocatorError> {
        let url = self.chart_url(ticker, period);
        debug!("GET {url}");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| fetch_error(ticker, format!("request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| fetch_error(ticker, format!("failed to read body: {e}")))?;

        // error statuses still carry a chart error object worth reporting
        match Self::parse_chart(ticker, &body) {
            Err(e) if !status.is_success() => Err(match e {
                AllocatorError::PriceFetch { reason, .. } if reason.starts_with("unexpected") => {
                    fetch_error(ticker, format!("HTTP {status}"))
                }
                other => other,
            }),
            other => other,
        }
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{"close": [370.87, 370.6, 367.94]}],
                    "adjclose": [{"adjclose": [368.1, null, 365.2]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parse_skips_null_closes() {
        let points = YahooAdapter::parse_chart("MSFT", SAMPLE).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(points[0].adj_close, 368.1);
        assert_eq!(points[1].adj_close, 365.2);
    }

    #[test]
    fn not_found_is_a_fetch_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = YahooAdapter::parse_chart("NOTATICKER", body).unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::PriceFetch { ref ticker, ref reason }
                if ticker == "NOTATICKER" && reason == "symbol not found"
        ));
    }

    #[test]
    fn garbage_body_is_a_fetch_error() {
        assert!(YahooAdapter::parse_chart("MSFT", "<html>").is_err());
    }

    #[test]
    fn missing_adjclose_yields_nothing() {
        let body = r#"{"chart":{"result":[{"timestamp":[1704205800],"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(YahooAdapter::parse_chart("MSFT", body).unwrap().is_empty());
    }

    #[test]
    fn url_carries_range() {
        let adapter = YahooAdapter::new("http://localhost:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            adapter.chart_url("KO", HistoryPeriod::FiveYears),
            "http://localhost:9/v8/finance/chart/KO?range=5y&interval=1d&includeAdjustedClose=true"
        );
    }
}
