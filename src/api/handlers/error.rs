use axum::{
    extract::multipart::MultipartError,
    http::{header::InvalidHeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{auth::PasswordError, inference::InferenceError, storage::StoreError};

/// Failures a handler turns into a plain-text HTTP response.
///
/// Client errors carry a short message; server errors are logged and answered
/// with a generic body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not authenticated")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("Malformed upload: {0}")]
    Upload(#[from] MultipartError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Header(#[from] InvalidHeaderValue),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Inference(InferenceError::InvalidImage(_)) => {
                StatusCode::BAD_REQUEST
            }
            // 413 when the body limit is hit, 400 otherwise
            Self::Upload(err) => err.status(),
            Self::Inference(InferenceError::Busy) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Inference(InferenceError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Store(_)
            | Self::Password(_)
            | Self::Inference(_)
            | Self::Header(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Inference(InferenceError::InvalidImage(_)) => "Invalid image file".to_string(),
            Self::Inference(InferenceError::Busy) => {
                "Detection service is busy, try again later".to_string()
            }
            Self::Inference(InferenceError::Timeout(_)) => "Detection timed out".to_string(),
            _ if status.is_server_error() => "Internal server error".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!("Request failed: {self}");
        } else {
            warn!("Request rejected: {self}");
        }

        (status, message).into_response()
    }
}
