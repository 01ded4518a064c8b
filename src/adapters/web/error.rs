//! HTTP error responses for the web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::AllocatorError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &AllocatorError) -> StatusCode {
    match err {
        AllocatorError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        AllocatorError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AllocatorError::Infeasible { .. }
        | AllocatorError::SolverFailure { .. }
        | AllocatorError::PriceFetch { .. }
        | AllocatorError::ConfigParse { .. }
        | AllocatorError::ConfigMissing { .. }
        | AllocatorError::ConfigInvalid { .. }
        | AllocatorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AllocatorError> for WebError {
    fn from(err: AllocatorError) -> Self {
        Self::new(status_from_error(&err), err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_are_client_errors() {
        let err = WebError::from(AllocatorError::invalid_request("no tickers"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("no tickers"));
    }

    #[test]
    fn optimizer_errors_are_server_errors() {
        assert_eq!(
            status_from_error(&AllocatorError::infeasible("sector bounds")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_from_error(&AllocatorError::solver("no convergence")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_from_error(&AllocatorError::InsufficientData {
                observations: 1,
                minimum: 2
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
