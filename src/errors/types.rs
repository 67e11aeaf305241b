//! Error type definitions for the player proxy

use thiserror::Error;

use crate::models::EntityKind;

/// Top-level error type for the playback pipeline
///
/// Client disconnection is deliberately absent: it is a normal session
/// outcome, not an error.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Requested entity is absent from the catalog
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: EntityKind, id: String },

    /// Entity exists but carries no playable URL
    #[error("no playable URL for {kind} {id}")]
    NoSourceUrl { kind: EntityKind, id: String },

    /// Caller-supplied URL failed validation
    #[error("invalid URL: {reason}")]
    InvalidUrl { reason: String },

    /// Upstream connection or request failed before any byte was forwarded
    #[error("failed to connect to upstream {url}: {message}")]
    UpstreamConnect { url: String, message: String },

    /// Upstream produced no response headers within the inactivity window
    #[error("upstream timed out after {timeout:?}: {url}")]
    UpstreamTimeout {
        url: String,
        timeout: std::time::Duration,
    },

    /// The transcoder subprocess could not be started
    #[error("failed to start transcoder: {message}")]
    TranscodeStartup { message: String },

    /// Generic internal errors
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PlayerError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn no_source_url(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NoSourceUrl {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            reason: reason.into(),
        }
    }

    pub fn upstream_connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamConnect {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn transcode_startup(message: impl Into<String>) -> Self {
        Self::TranscodeStartup {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
