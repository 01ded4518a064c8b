//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::yahoo_adapter::YahooAdapter;
use crate::domain::config_validation::{
    DataSettings, ProviderKind, load_data_settings, load_optimizer_settings, validate_config,
};
use crate::domain::error::AllocatorError;
use crate::domain::pipeline::{self, PortfolioRequest};
use crate::domain::strategy::StrategyKind;
use crate::domain::universe::parse_tickers;
use crate::ports::price_port::PricePort;

#[derive(Parser, Debug)]
#[command(
    name = "portfolio-allocator",
    about = "Portfolio optimization and discrete allocation service"
)]
pub struct Cli {
    /// INI configuration file; built-in defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve,
    /// Run one optimization and print the JSON response
    Optimize {
        #[arg(short, long, default_value = "min_volatility")]
        strategy: StrategyKind,
        /// Comma-separated tickers, e.g. MSFT,AMZN,KO
        #[arg(short, long)]
        tickers: String,
        #[arg(short, long)]
        budget: Option<f64>,
        #[arg(long)]
        target_volatility: Option<f64>,
        #[arg(long)]
        target_return: Option<f64>,
        #[arg(long)]
        target_cvar: Option<f64>,
        /// History window: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd or max
        #[arg(long)]
        period: Option<String>,
    },
    /// Validate the configuration file
    Validate,
    /// List tickers available to the csv provider
    ListTickers,
    /// List strategy names accepted by `optimize --strategy`
    Strategies,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Serve => run_serve(cli.config.as_ref()),
        Command::Optimize {
            strategy,
            tickers,
            budget,
            target_volatility,
            target_return,
            target_cvar,
            period,
        } => parse_tickers(&tickers)
            .map_err(|e| AllocatorError::invalid_request(e.to_string()))
            .and_then(|tickers| {
                let request = PortfolioRequest {
                    tickers,
                    total_portfolio_value: budget,
                    target_volatility,
                    target_return,
                    target_cvar,
                    period,
                };
                run_optimize(cli.config.as_ref(), strategy, &request)
            }),
        Command::Validate => run_validate(cli.config.as_ref()),
        Command::ListTickers => run_list_tickers(cli.config.as_ref()),
        Command::Strategies => {
            for kind in StrategyKind::ALL {
                println!("{kind}");
            }
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, AllocatorError> {
    let Some(path) = path else {
        return Ok(FileConfigAdapter::empty());
    };
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path).map_err(|e| AllocatorError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn build_price_port(
    data: &DataSettings,
) -> Result<Arc<dyn PricePort + Send + Sync>, AllocatorError> {
    let port: Arc<dyn PricePort + Send + Sync> = match &data.provider {
        ProviderKind::Yahoo => Arc::new(YahooAdapter::new(
            &data.base_url,
            Duration::from_secs(data.timeout_secs),
        )?),
        ProviderKind::Csv { dir } => Arc::new(CsvAdapter::new(dir.clone())),
    };
    Ok(port)
}

fn run_optimize(
    config_path: Option<&PathBuf>,
    kind: StrategyKind,
    request: &PortfolioRequest,
) -> Result<(), AllocatorError> {
    let config = load_config(config_path)?;
    let settings = load_optimizer_settings(&config)?;
    let port = build_price_port(&load_data_settings(&config)?)?;
    info!("optimizing {} tickers with {kind} via {}", request.tickers.len(), port.name());

    let response = pipeline::optimize(port.as_ref(), kind, request, &settings)?;
    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| AllocatorError::Io(std::io::Error::other(e)))?;
    println!("{json}");
    Ok(())
}

fn run_validate(config_path: Option<&PathBuf>) -> Result<(), AllocatorError> {
    let config = load_config(config_path)?;
    validate_config(&config)?;
    println!("Configuration is valid.");
    Ok(())
}

fn run_list_tickers(config_path: Option<&PathBuf>) -> Result<(), AllocatorError> {
    let config = load_config(config_path)?;
    match load_data_settings(&config)?.provider {
        ProviderKind::Csv { dir } => {
            for ticker in CsvAdapter::new(dir).list_tickers()? {
                println!("{ticker}");
            }
            Ok(())
        }
        ProviderKind::Yahoo => Err(AllocatorError::ConfigInvalid {
            section: "data".to_string(),
            key: "provider".to_string(),
            reason: "ticker listing needs the csv provider".to_string(),
        }),
    }
}

fn run_serve(config_path: Option<&PathBuf>) -> Result<(), AllocatorError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, build_router};
        use crate::domain::config_validation::listen_address;

        let config = load_config(config_path)?;
        let addr = listen_address(&config)?;
        let settings = load_optimizer_settings(&config)?;
        let price_port = build_price_port(&load_data_settings(&config)?)?;

        let router = build_router(AppState {
            price_port,
            settings: Arc::new(settings),
        });

        eprintln!("Starting web server on {addr}");
        tokio::runtime::Runtime::new()?.block_on(async {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await
        })?;
        Ok(())
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        Err(AllocatorError::ConfigInvalid {
            section: "server".to_string(),
            key: "listen".to_string(),
            reason: "the web feature is required for serve".to_string(),
        })
    }
}
