//! HTTP response types and error mapping
//!
//! Maps the playback error taxonomy to status codes and the JSON error
//! bodies clients rely on. Mid-stream conditions never pass through here;
//! by then the status line is committed and errors only end the body.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::errors::PlayerError;

/// Body of `/player/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "OK",
            service: "BakwaasFM Player Proxy",
            timestamp: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl PlayerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PlayerError::EntityNotFound { .. } | PlayerError::NoSourceUrl { .. } => {
                StatusCode::NOT_FOUND
            }
            PlayerError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            PlayerError::UpstreamConnect { .. }
            | PlayerError::UpstreamTimeout { .. }
            | PlayerError::TranscodeStartup { .. }
            | PlayerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable client-facing message; details stay in the logs.
    pub fn client_message(&self) -> &'static str {
        use crate::models::EntityKind;
        match self {
            PlayerError::EntityNotFound { kind, .. } => match kind {
                EntityKind::Station => "Station not found",
                EntityKind::Radio => "Radio item not found",
                _ => "Stream not found",
            },
            PlayerError::NoSourceUrl { kind, .. } => match kind {
                EntityKind::Stream => "No stream URL available",
                _ => "No audio URL available",
            },
            PlayerError::InvalidUrl { .. } => "Invalid URL format",
            PlayerError::UpstreamConnect { .. } => "Failed to connect to stream",
            PlayerError::UpstreamTimeout { .. } => "Stream timed out",
            PlayerError::TranscodeStartup { .. } => "Failed to transcode stream",
            PlayerError::Internal { .. } => "Failed to load stream",
        }
    }
}

impl IntoResponse for PlayerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.client_message().to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        response
    }
}
