use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key store error: {0}")]
    Store(String),
}

// Implement alias for Result to simplify usage
pub type AppResult<T> = Result<T, AppError>;

/// Failures of the relay pipeline. Each one is turned into a JSON
/// `{error, message}` body before it leaves the handler.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidUrl(String),

    #[error("Only http:// and https:// URLs are allowed")]
    InvalidProtocol,

    #[error("{0}")]
    UpstreamFailed(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ProxyError::InvalidUrl(_) | ProxyError::InvalidProtocol => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short machine code carried in the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Unauthorized(_) => "Unauthorized",
            ProxyError::InvalidUrl(_) => "Invalid URL format",
            ProxyError::InvalidProtocol => "Invalid protocol",
            ProxyError::UpstreamFailed(_) => "Proxy request failed",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
