//! Configuration validation.
//!
//! Every key is optional; a present key must hold a sensible value. The
//! validated settings are immutable for the life of the process.

use crate::domain::error::AllocatorError;
use crate::domain::price_series::HistoryPeriod;
use crate::domain::sectors::SectorConstraints;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_TIMEOUT_SECS: i64 = 30;

/// Parameters shared by every strategy plus request defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    pub risk_free_rate: f64,
    pub short_ratio: f64,
    pub total_portfolio_value: f64,
    pub cvar_beta: f64,
    pub target_volatility: f64,
    pub target_return: f64,
    pub target_cvar: f64,
    pub period: HistoryPeriod,
    pub sectors: SectorConstraints,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            short_ratio: 0.3,
            total_portfolio_value: 10_000.0,
            cvar_beta: 0.95,
            target_volatility: 0.15,
            target_return: 0.07,
            target_cvar: 0.025,
            period: HistoryPeriod::Max,
            sectors: SectorConstraints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Yahoo,
    Csv { dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub timeout_secs: u64,
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> AllocatorError {
    AllocatorError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Read `[section] key` as a number, rejecting present-but-unparsable values.
fn read_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, AllocatorError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

pub fn load_optimizer_settings(config: &dyn ConfigPort) -> Result<OptimizerSettings, AllocatorError> {
    let defaults = OptimizerSettings::default();

    let risk_free_rate = read_number(config, "optimizer", "risk_free_rate", defaults.risk_free_rate)?;
    if !(0.0..=1.0).contains(&risk_free_rate) {
        return Err(invalid(
            "optimizer",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let short_ratio = read_number(config, "optimizer", "short_ratio", defaults.short_ratio)?;
    if short_ratio < 0.0 {
        return Err(invalid(
            "optimizer",
            "short_ratio",
            "short_ratio must be non-negative",
        ));
    }

    let total_portfolio_value = read_number(
        config,
        "optimizer",
        "total_portfolio_value",
        defaults.total_portfolio_value,
    )?;
    if total_portfolio_value <= 0.0 {
        return Err(invalid(
            "optimizer",
            "total_portfolio_value",
            "total_portfolio_value must be positive",
        ));
    }

    let cvar_beta = read_number(config, "optimizer", "cvar_beta", defaults.cvar_beta)?;
    if !(0.5..1.0).contains(&cvar_beta) {
        return Err(invalid(
            "optimizer",
            "cvar_beta",
            "cvar_beta must be in [0.5, 1)",
        ));
    }

    let target_volatility = read_number(
        config,
        "defaults",
        "target_volatility",
        defaults.target_volatility,
    )?;
    if target_volatility <= 0.0 {
        return Err(invalid(
            "defaults",
            "target_volatility",
            "target_volatility must be positive",
        ));
    }

    let target_return = read_number(config, "defaults", "target_return", defaults.target_return)?;

    let target_cvar = read_number(config, "defaults", "target_cvar", defaults.target_cvar)?;
    if target_cvar <= 0.0 {
        return Err(invalid(
            "defaults",
            "target_cvar",
            "target_cvar must be positive",
        ));
    }

    let period = match config.get_string("data", "period") {
        None => defaults.period,
        Some(raw) => raw.parse().map_err(|e: String| invalid("data", "period", e))?,
    };

    Ok(OptimizerSettings {
        risk_free_rate,
        short_ratio,
        total_portfolio_value,
        cvar_beta,
        target_volatility,
        target_return,
        target_cvar,
        period,
        sectors: SectorConstraints::from_config(config)?,
    })
}

pub fn load_data_settings(config: &dyn ConfigPort) -> Result<DataSettings, AllocatorError> {
    let provider = match config
        .get_string("data", "provider")
        .map(|p| p.trim().to_lowercase())
        .as_deref()
    {
        None | Some("yahoo") => ProviderKind::Yahoo,
        Some("csv") => match config.get_string("data", "csv_dir") {
            Some(dir) if !dir.trim().is_empty() => ProviderKind::Csv {
                dir: PathBuf::from(dir.trim()),
            },
            _ => {
                return Err(AllocatorError::ConfigMissing {
                    section: "data".to_string(),
                    key: "csv_dir".to_string(),
                });
            }
        },
        Some(other) => {
            return Err(invalid(
                "data",
                "provider",
                format!("unknown provider '{other}' (expected yahoo or csv)"),
            ));
        }
    };

    let timeout = config.get_int("data", "timeout_secs", DEFAULT_TIMEOUT_SECS);
    if timeout <= 0 {
        return Err(invalid(
            "data",
            "timeout_secs",
            "timeout_secs must be positive",
        ));
    }

    let base_url = config
        .get_string("data", "base_url")
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_YAHOO_BASE_URL.to_string());
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(invalid("data", "base_url", "base_url must be an http(s) URL"));
    }

    Ok(DataSettings {
        provider,
        base_url,
        timeout_secs: timeout as u64,
    })
}

pub fn listen_address(config: &dyn ConfigPort) -> Result<std::net::SocketAddr, AllocatorError> {
    let raw = config
        .get_string("server", "listen")
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
    raw.trim()
        .parse()
        .map_err(|_| invalid("server", "listen", format!("'{raw}' is not a socket address")))
}

/// Validate every section without building any adapter.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    listen_address(config)?;
    load_data_settings(config)?;
    load_optimizer_settings(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = FileConfigAdapter::empty();
        let settings = load_optimizer_settings(&config).unwrap();
        assert_eq!(settings, OptimizerSettings::default());
        assert_eq!(
            load_data_settings(&config).unwrap(),
            DataSettings {
                provider: ProviderKind::Yahoo,
                base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
                timeout_secs: 30,
            }
        );
        assert_eq!(listen_address(&config).unwrap().port(), 5000);
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[server]
listen = 0.0.0.0:8080

[data]
provider = csv
csv_dir = /srv/prices
period = 5y
timeout_secs = 10

[optimizer]
risk_free_rate = 0.03
short_ratio = 0.2
total_portfolio_value = 50000
cvar_beta = 0.99

[defaults]
target_volatility = 0.2
target_return = 0.1
target_cvar = 0.03
"#,
        );
        assert!(validate_config(&config).is_ok());
        let settings = load_optimizer_settings(&config).unwrap();
        assert_eq!(settings.risk_free_rate, 0.03);
        assert_eq!(settings.short_ratio, 0.2);
        assert_eq!(settings.total_portfolio_value, 50000.0);
        assert_eq!(settings.cvar_beta, 0.99);
        assert_eq!(settings.target_volatility, 0.2);
        assert_eq!(settings.period, HistoryPeriod::FiveYears);

        let data = load_data_settings(&config).unwrap();
        assert_eq!(
            data.provider,
            ProviderKind::Csv {
                dir: PathBuf::from("/srv/prices")
            }
        );
        assert_eq!(data.timeout_secs, 10);
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let err = load_optimizer_settings(&make_config("[optimizer]\nrisk_free_rate = 1.5\n"))
            .unwrap_err();
        assert!(
            matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "risk_free_rate")
        );
    }

    #[test]
    fn unparsable_number_fails() {
        let err = load_optimizer_settings(&make_config("[optimizer]\nshort_ratio = lots\n"))
            .unwrap_err();
        assert!(matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "short_ratio"));
    }

    #[test]
    fn non_positive_budget_fails() {
        let err =
            load_optimizer_settings(&make_config("[optimizer]\ntotal_portfolio_value = 0\n"))
                .unwrap_err();
        assert!(
            matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "total_portfolio_value")
        );
    }

    #[test]
    fn cvar_beta_must_be_below_one() {
        let err = load_optimizer_settings(&make_config("[optimizer]\ncvar_beta = 1.0\n"))
            .unwrap_err();
        assert!(matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "cvar_beta"));
    }

    #[test]
    fn unknown_period_fails() {
        let err = load_optimizer_settings(&make_config("[data]\nperiod = 3w\n")).unwrap_err();
        assert!(matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "period"));
    }

    #[test]
    fn csv_provider_needs_directory() {
        let err = load_data_settings(&make_config("[data]\nprovider = csv\n")).unwrap_err();
        assert!(matches!(err, AllocatorError::ConfigMissing { key, .. } if key == "csv_dir"));
    }

    #[test]
    fn unknown_provider_fails() {
        let err = load_data_settings(&make_config("[data]\nprovider = bloomberg\n")).unwrap_err();
        assert!(matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "provider"));
    }

    #[test]
    fn base_url_must_be_http() {
        let err =
            load_data_settings(&make_config("[data]\nbase_url = ftp://example.com\n")).unwrap_err();
        assert!(matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "base_url"));

        let data =
            load_data_settings(&make_config("[data]\nbase_url = http://localhost:9000/\n"))
                .unwrap();
        assert_eq!(data.base_url, "http://localhost:9000");
    }

    #[test]
    fn bad_listen_address_fails() {
        let err = validate_config(&make_config("[server]\nlisten = nowhere\n")).unwrap_err();
        assert!(matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "listen"));
    }

    #[test]
    fn zero_timeout_fails() {
        let err = load_data_settings(&make_config("[data]\ntimeout_secs = 0\n")).unwrap_err();
        assert!(matches!(err, AllocatorError::ConfigInvalid { key, .. } if key == "timeout_secs"));
    }
}
