//! Portfolio weights and performance summaries.

use nalgebra::DVector;
use serde::ser::{Serialize, SerializeMap, Serializer};

pub const EXPECTED_ANNUAL_RETURN: &str = "Expected annual return";
pub const ANNUAL_VOLATILITY: &str = "Annual volatility";
pub const SHARPE_RATIO: &str = "Sharpe Ratio";
pub const ANNUAL_SEMI_DEVIATION: &str = "Annual semi-deviation";
pub const SORTINO_RATIO: &str = "Sortino Ratio";
pub const CONDITIONAL_VALUE_AT_RISK: &str = "Conditional Value at Risk";

/// Weights below this magnitude are zeroed by [`WeightVector::clean`].
pub const WEIGHT_CUTOFF: f64 = 1e-4;
pub const WEIGHT_DECIMALS: i32 = 5;

/// Ticker -> portfolio weight, in ticker order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightVector {
    entries: Vec<(String, f64)>,
}

impl WeightVector {
    pub fn new(tickers: &[String], weights: &DVector<f64>) -> Self {
        debug_assert_eq!(tickers.len(), weights.len());
        Self {
            entries: tickers.iter().cloned().zip(weights.iter().copied()).collect(),
        }
    }

    pub fn from_pairs(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn tickers(&self) -> Vec<String> {
        self.entries.iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    pub fn has_shorts(&self) -> bool {
        self.entries.iter().any(|(_, w)| *w < 0.0)
    }

    /// Zero out weights with `|w| < cutoff` and round the rest.
    pub fn clean(&self, cutoff: f64, decimals: i32) -> WeightVector {
        let scale = 10f64.powi(decimals);
        let entries = self
            .entries
            .iter()
            .map(|(t, w)| {
                let cleaned = if w.abs() < cutoff {
                    0.0
                } else {
                    (w * scale).round() / scale
                };
                // avoid serializing -0.0
                (t.clone(), cleaned + 0.0)
            })
            .collect();
        WeightVector { entries }
    }
}

impl Serialize for WeightVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (ticker, weight) in &self.entries {
            map.serialize_entry(ticker, weight)?;
        }
        map.end()
    }
}

/// Ordered metric name -> value record. Non-finite values serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    metrics: Vec<(&'static str, f64)>,
}

impl PerformanceSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: f64) -> Self {
        self.metrics.push((name, value));
        self
    }

    /// The finite value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .filter(|v| v.is_finite())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.iter().any(|(n, _)| *n == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|(n, _)| *n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Serialize for PerformanceSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len()))?;
        for (name, value) in &self.metrics {
            let value = value.is_finite().then_some(*value);
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Return, volatility and Sharpe ratio, the usual mean-variance triple.
pub fn mean_variance_summary(
    expected_return: f64,
    volatility: f64,
    risk_free_rate: f64,
) -> PerformanceSummary {
    let sharpe = if volatility > 0.0 {
        (expected_return - risk_free_rate) / volatility
    } else {
        f64::NAN
    };
    PerformanceSummary::new()
        .with(EXPECTED_ANNUAL_RETURN, expected_return)
        .with(ANNUAL_VOLATILITY, volatility)
        .with(SHARPE_RATIO, sharpe)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn clean_zeroes_and_rounds() {
        let w = WeightVector::new(
            &tickers(&["A", "B", "C"]),
            &DVector::from_vec(vec![0.123456789, 0.00005, -0.87654321]),
        );
        let cleaned = w.clean(WEIGHT_CUTOFF, WEIGHT_DECIMALS);
        assert_eq!(cleaned.get("A"), Some(0.12346));
        assert_eq!(cleaned.get("B"), Some(0.0));
        assert_eq!(cleaned.get("C"), Some(-0.87654));
    }

    #[test]
    fn clean_never_yields_negative_zero() {
        let w = WeightVector::from_pairs(vec![("A".into(), -0.00001)]);
        let cleaned = w.clean(WEIGHT_CUTOFF, WEIGHT_DECIMALS);
        assert!(cleaned.get("A").unwrap().is_sign_positive());
    }

    #[test]
    fn weights_serialize_as_object_in_order() {
        let w = WeightVector::from_pairs(vec![("MSFT".into(), 0.6), ("AMZN".into(), 0.4)]);
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"MSFT":0.6,"AMZN":0.4}"#);
        assert!((w.sum() - 1.0).abs() < 1e-12);
        assert!(!w.has_shorts());
    }

    #[test]
    fn nan_metrics_serialize_as_null() {
        let perf = PerformanceSummary::new()
            .with(EXPECTED_ANNUAL_RETURN, f64::NAN)
            .with(ANNUAL_VOLATILITY, 0.2);
        let json = serde_json::to_value(&perf).unwrap();
        assert!(json[EXPECTED_ANNUAL_RETURN].is_null());
        assert_eq!(json[ANNUAL_VOLATILITY], 0.2);
        assert_eq!(perf.get(EXPECTED_ANNUAL_RETURN), None);
        assert!(perf.contains(EXPECTED_ANNUAL_RETURN));
    }

    #[test]
    fn sharpe_of_zero_volatility_is_undefined() {
        let perf = mean_variance_summary(0.05, 0.0, 0.02);
        assert_eq!(perf.get(SHARPE_RATIO), None);
        let perf = mean_variance_summary(0.12, 0.2, 0.02);
        assert!((perf.get(SHARPE_RATIO).unwrap() - 0.5).abs() < 1e-12);
    }
}
