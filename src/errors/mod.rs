//! Centralized error handling for the player proxy
//!
//! The taxonomy distinguishes errors that can still change the HTTP status
//! line (resolution failures, connect failures, transcoder startup) from
//! mid-stream conditions, which are logged and end the response without a
//! status change. The HTTP mapping lives in the web layer.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using PlayerError
pub type PlayerResult<T> = Result<T, PlayerError>;
