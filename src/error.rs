use crate::model::{InsightError, ParserError};
use thiserror::Error;

/// Failure of one facade request. Every variant is reported to the caller,
/// none of them stop the server.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("parse error: {0}")]
    Parse(#[from] ParserError),

    #[error("upstream error: {0}")]
    Upstream(#[from] InsightError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::Parse(_) => "parse_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
