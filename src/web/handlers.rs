//! Player route handlers
//!
//! Thin handlers: build the playback request, delegate to the player
//! service, and map errors through the shared response layer.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};

use crate::models::{EntityKind, PlaybackRequest};
use crate::web::AppState;
use crate::web::responses::HealthResponse;

fn range_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

async fn play(state: AppState, request: PlaybackRequest, headers: HeaderMap) -> Response {
    match state.player.play(request, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

pub async fn play_station(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request =
        PlaybackRequest::for_entity(EntityKind::Station, id).with_range(range_of(&headers));
    play(state, request, headers).await
}

pub async fn play_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request =
        PlaybackRequest::for_entity(EntityKind::Stream, id).with_range(range_of(&headers));
    play(state, request, headers).await
}

pub async fn play_radio(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request =
        PlaybackRequest::for_entity(EntityKind::Radio, id).with_range(range_of(&headers));
    play(state, request, headers).await
}

/// Caller-supplied URL player. The path segment arrives percent-decoded;
/// scheme validation happens in the resolver before any connection attempt.
pub async fn play_url(
    State(state): State<AppState>,
    Path(encoded_url): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request = PlaybackRequest::for_url(encoded_url).with_range(range_of(&headers));
    play(state, request, headers).await
}

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::ok())
}

/// Bare OPTIONS requests (non-preflight) get an empty 200; real CORS
/// preflights are answered by the CORS layer before reaching the router.
pub async fn options_ok() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
}
