//! HTTP adapter.
//!
//! One POST route per strategy, all taking the same JSON body and returning
//! the same response shape. Optimization runs on the blocking pool.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::domain::config_validation::OptimizerSettings;
use crate::ports::price_port::PricePort;

pub struct AppState {
    pub price_port: Arc<dyn PricePort + Send + Sync>,
    pub settings: Arc<OptimizerSettings>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::hello))
        .route("/optimize_portfolio", post(handlers::optimize_min_volatility))
        .route("/optimize_min_volatility", post(handlers::optimize_min_volatility))
        .route(
            "/max_sharpe_with_sector_constraints",
            post(handlers::max_sharpe_with_sector_constraints),
        )
        .route(
            "/maximize_return_given_risk",
            post(handlers::maximize_return_given_risk),
        )
        .route(
            "/minimize_risk_given_return",
            post(handlers::minimize_risk_given_return),
        )
        .route("/efficient_semivariance", post(handlers::efficient_semivariance))
        .route("/efficient_cvar", post(handlers::efficient_cvar))
        .route("/optimize_hrp", post(handlers::optimize_hrp))
        .fallback(handlers::not_found)
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}
