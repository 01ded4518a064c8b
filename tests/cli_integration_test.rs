//! CLI tests against real INI files and a csv price directory on disk.

mod common;

use clap::Parser;
use common::*;
use portfolio_allocator::cli::{self, Cli};
use portfolio_allocator::domain::error::AllocatorError;
use portfolio_allocator::domain::price_series::HistoryPeriod;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn csv_config(dir: &std::path::Path) -> tempfile::NamedTempFile {
    write_temp_ini(&format!(
        "[data]\nprovider = csv\ncsv_dir = {}\n\n[optimizer]\ntotal_portfolio_value = 15000\n",
        dir.display()
    ))
}

fn run_args(args: &[&str]) -> ExitCode {
    let mut argv = vec!["portfolio-allocator"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn validate_accepts_defaults_without_a_file() {
    assert_eq!(run_args(&["validate"]), ExitCode::SUCCESS);
}

#[test]
fn validate_rejects_bad_values_with_config_exit_code() {
    let ini = write_temp_ini("[optimizer]\nrisk_free_rate = 3\n");
    let path = ini.path().to_str().unwrap();
    assert_eq!(run_args(&["--config", path, "validate"]), ExitCode::from(2));
}

#[test]
fn missing_config_file_is_a_parse_error() {
    let missing = PathBuf::from("/nonexistent/allocator.ini");
    let err = cli::load_config(Some(&missing)).unwrap_err();
    assert!(matches!(err, AllocatorError::ConfigParse { .. }));
}

#[test]
fn optimize_reads_csv_provider() {
    let dir = tempfile::tempdir().unwrap();
    write_csv_market(dir.path(), &["MSFT", "KO", "JPM"], 200, 11);
    let ini = csv_config(dir.path());

    let code = run_args(&[
        "optimize",
        "--config",
        ini.path().to_str().unwrap(),
        "--strategy",
        "hrp",
        "--tickers",
        "msft,ko,jpm",
    ]);
    assert_eq!(code, ExitCode::SUCCESS);
}

#[test]
fn optimize_rejects_empty_ticker_token() {
    assert_eq!(
        run_args(&["optimize", "--tickers", "MSFT,,KO"]),
        ExitCode::from(4)
    );
}

#[test]
fn unknown_strategy_fails_to_parse() {
    let result = Cli::try_parse_from([
        "portfolio-allocator",
        "optimize",
        "--strategy",
        "momentum",
        "--tickers",
        "MSFT",
    ]);
    assert!(result.is_err());
}

#[test]
fn price_port_follows_provider() {
    let dir = tempfile::tempdir().unwrap();
    write_csv_market(dir.path(), &["KO"], 30, 3);
    let ini = csv_config(dir.path());

    let config = cli::load_config(Some(&ini.path().to_path_buf())).unwrap();
    let data = portfolio_allocator::domain::config_validation::load_data_settings(&config).unwrap();
    let port = cli::build_price_port(&data).unwrap();
    assert_eq!(port.name(), "csv");
    assert_eq!(
        port.fetch_adjusted_close("KO", HistoryPeriod::Max).unwrap().len(),
        30
    );
}

#[test]
fn list_tickers_needs_csv_provider() {
    assert_eq!(run_args(&["list-tickers"]), ExitCode::from(2));

    let dir = tempfile::tempdir().unwrap();
    write_csv_market(dir.path(), &["KO", "MSFT"], 5, 1);
    let ini = csv_config(dir.path());
    assert_eq!(
        run_args(&["--config", ini.path().to_str().unwrap(), "list-tickers"]),
        ExitCode::SUCCESS
    );
}
