//! HTTP request handlers for the web adapter.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::Uri,
};
use log::error;
use std::sync::Arc;

use crate::domain::pipeline::{self, PortfolioRequest, PortfolioResponse};
use crate::domain::strategy::StrategyKind;

use super::{AppState, WebError};

type Body = Result<Json<PortfolioRequest>, JsonRejection>;
type Reply = Result<Json<PortfolioResponse>, WebError>;

pub async fn hello() -> &'static str {
    "Hello, World!"
}

pub async fn not_found(uri: Uri) -> WebError {
    WebError::not_found(format!("no route for {}", uri.path()))
}

async fn optimize_route(state: Arc<AppState>, kind: StrategyKind, body: Body) -> Reply {
    let Json(request) = body.map_err(|e| WebError::bad_request(e.body_text()))?;

    let port = Arc::clone(&state.price_port);
    let settings = Arc::clone(&state.settings);
    let result = tokio::task::spawn_blocking(move || {
        pipeline::optimize(port.as_ref(), kind, &request, &settings)
    })
    .await
    .map_err(|e| WebError::internal(format!("optimization task failed: {e}")))?;

    match result {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("{kind} failed: {e}");
            Err(e.into())
        }
    }
}

pub async fn optimize_min_volatility(State(state): State<Arc<AppState>>, body: Body) -> Reply {
    optimize_route(state, StrategyKind::MinVolatility, body).await
}

pub async fn max_sharpe_with_sector_constraints(
    State(state): State<Arc<AppState>>,
    body: Body,
) -> Reply {
    optimize_route(state, StrategyKind::MaxSharpeWithSectorConstraints, body).await
}

pub async fn maximize_return_given_risk(State(state): State<Arc<AppState>>, body: Body) -> Reply {
    optimize_route(state, StrategyKind::MaximizeReturnGivenRisk, body).await
}

pub async fn minimize_risk_given_return(State(state): State<Arc<AppState>>, body: Body) -> Reply {
    optimize_route(state, StrategyKind::MinimizeRiskGivenReturn, body).await
}

pub async fn efficient_semivariance(State(state): State<Arc<AppState>>, body: Body) -> Reply {
    optimize_route(state, StrategyKind::EfficientSemivariance, body).await
}

pub async fn efficient_cvar(State(state): State<Arc<AppState>>, body: Body) -> Reply {
    optimize_route(state, StrategyKind::EfficientCvar, body).await
}

pub async fn optimize_hrp(State(state): State<Arc<AppState>>, body: Body) -> Reply {
    optimize_route(state, StrategyKind::Hrp, body).await
}
