//! Domain error types.

/// Top-level error type for portfolio-allocator.
#[derive(Debug, thiserror::Error)]
pub enum AllocatorError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price data unavailable for {ticker}: {reason}")]
    PriceFetch { ticker: String, reason: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("insufficient data: have {observations} return observations, need {minimum}")]
    InsufficientData { observations: usize, minimum: usize },

    #[error("optimization infeasible: {reason}")]
    Infeasible { reason: String },

    #[error("solver failure: {reason}")]
    SolverFailure { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AllocatorError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn infeasible(reason: impl Into<String>) -> Self {
        Self::Infeasible {
            reason: reason.into(),
        }
    }

    pub fn solver(reason: impl Into<String>) -> Self {
        Self::SolverFailure {
            reason: reason.into(),
        }
    }
}

impl From<&AllocatorError> for std::process::ExitCode {
    fn from(err: &AllocatorError) -> Self {
        let code: u8 = match err {
            AllocatorError::Io(_) => 1,
            AllocatorError::ConfigParse { .. }
            | AllocatorError::ConfigMissing { .. }
            | AllocatorError::ConfigInvalid { .. } => 2,
            AllocatorError::PriceFetch { .. } => 3,
            AllocatorError::InvalidRequest { .. } => 4,
            AllocatorError::InsufficientData { .. }
            | AllocatorError::Infeasible { .. }
            | AllocatorError::SolverFailure { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
