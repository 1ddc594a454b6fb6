use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Upload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("{program} exited with {status}")]
    ExternalProcess { program: String, status: String },

    #[error("{program} did not finish within {seconds}s")]
    Timeout { program: String, seconds: u64 },
}

impl AppError {
    fn title(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "Invalid request",
            Self::InvalidPayload(_) => "Invalid payload",
            Self::PayloadTooLarge(_) => "Payload too large",
            Self::NotFound(_) => "Not found",
            Self::Storage(_) => "Storage failure",
            Self::Computation(_) => "Computation failed",
            Self::ExternalProcess { .. } => "External reconstructor failed",
            Self::Timeout { .. } => "External reconstructor timed out",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            Self::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Computation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ExternalProcess { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        HttpResponse::build(self.status_code())
            .json(ErrorResponse::with_details(self.title(), self.to_string()))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Computation(format!("worker task failed: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors that were wrapped on the way up.
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => Self::Computation(format!("{:#}", other)),
        }
    }
}
