//! Server error types with HTTP status code mapping

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tessella::TessellaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Rejected request or unusable upstream document
    #[error("{0}")]
    Engine(#[from] TessellaError),

    /// Upstream could not be reached or answered with an error status
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// Upstream did not answer within the configured timeout
    #[error("Upstream request timed out: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Engine(e) if e.is_validation() => StatusCode::NOT_FOUND,
            Self::Engine(TessellaError::InvalidConfig(_)) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Engine(_) | Self::Upstream(_) | Self::Timeout(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(e: reqwest::Error) -> Self {
        let target = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "upstream".to_string());
        if e.is_timeout() {
            Self::Timeout(target)
        } else {
            Self::Upstream(format!("{target}: {e}"))
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "{}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "{}", self);
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
