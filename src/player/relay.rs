//! Direct-path HTTP stream relay
//!
//! One upstream connection per inbound request; the client's `Range` and
//! `Accept-Encoding` travel upstream verbatim, the upstream status is
//! mirrored verbatim (200 and 206 partial content both pass through), and
//! only a fixed whitelist of upstream response headers reaches the client.
//!
//! Key behaviors:
//!   - No total request timeout (live streams must remain open); a single
//!     inactivity window bounds both the wait for response headers and the
//!     gap between body chunks.
//!   - The body is a pull-based stream: hyper polls for the next chunk only
//!     when the client socket can accept more bytes, so a slow client
//!     pauses the upstream read instead of growing a write buffer.
//!   - Dropping the body (client disconnect) drops the upstream response,
//!     closing its connection; the session guard records the cancellation.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode, header};
use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PlayerConfig;
use crate::errors::{PlayerError, PlayerResult};
use crate::models::ResolvedSource;
use crate::player::session::{SessionGuard, SessionState, SessionTracker};

/// Upstream response headers forwarded to the client; everything else is
/// dropped so upstream internals never leak through the relay.
const FORWARDED_RESPONSE_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "content-range",
    "accept-ranges",
    "cache-control",
    "last-modified",
    "etag",
];

/// Add the synthetic headers every relayed response carries: CORS plus the
/// relay identity and the logical stream type/title.
pub fn apply_stream_headers(headers: &mut HeaderMap, source: &ResolvedSource) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Range, Content-Type"),
    );
    headers.insert(
        HeaderName::from_static("x-bakwaasfm-player"),
        HeaderValue::from_static("true"),
    );
    if let Ok(value) = HeaderValue::from_str(source.entity_kind.as_str()) {
        headers.insert(HeaderName::from_static("x-stream-type"), value);
    }
    let encoded_title = urlencoding::encode(&source.display_title).into_owned();
    if let Ok(value) = HeaderValue::from_str(&encoded_title) {
        headers.insert(HeaderName::from_static("x-stream-title"), value);
    }
}

fn copy_whitelisted_headers(upstream: &HeaderMap, dest: &mut HeaderMap) {
    for &name in FORWARDED_RESPONSE_HEADERS {
        if let Some(value) = upstream.get(name) {
            dest.insert(HeaderName::from_static(name), value.clone());
        }
    }
}

pub struct ProtocolRelay {
    client: reqwest::Client,
    upstream_timeout: Duration,
}

impl ProtocolRelay {
    pub fn new(config: &PlayerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout_duration())
            .build()?;

        Ok(Self {
            client,
            upstream_timeout: config.upstream_timeout_duration(),
        })
    }

    /// Open the upstream connection and return the streaming response.
    ///
    /// Fails only before any byte has been forwarded; once the response is
    /// built, upstream errors and inactivity end the body without touching
    /// the already-committed status line.
    pub async fn stream(
        &self,
        source: &ResolvedSource,
        request_headers: &HeaderMap,
        tracker: SessionTracker,
        session_id: Uuid,
    ) -> PlayerResult<Response<Body>> {
        let mut forwarded = HeaderMap::new();
        forwarded.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        forwarded.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        // Range forwarding enables client-side seeking
        if let Some(range) = request_headers.get(header::RANGE) {
            forwarded.insert(header::RANGE, range.clone());
        }
        if let Some(encoding) = request_headers.get(header::ACCEPT_ENCODING) {
            forwarded.insert(header::ACCEPT_ENCODING, encoding.clone());
        }

        let send = self.client.get(source.url.as_str()).headers(forwarded).send();
        let upstream = match tokio::time::timeout(self.upstream_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(PlayerError::upstream_connect(
                    source.url.as_str(),
                    e.to_string(),
                ));
            }
            Err(_) => {
                return Err(PlayerError::UpstreamTimeout {
                    url: source.url.clone(),
                    timeout: self.upstream_timeout,
                });
            }
        };

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        info!(
            session = %session_id,
            status = %status,
            title = %source.display_title,
            "Upstream responded"
        );

        let mut builder = Response::builder().status(status);
        if let Some(headers) = builder.headers_mut() {
            copy_whitelisted_headers(upstream.headers(), headers);
            apply_stream_headers(headers, source);
        }

        let idle = self.upstream_timeout;
        let title = source.display_title.clone();
        let guard = SessionGuard::new(tracker.clone(), session_id);
        let mut upstream_body = upstream.bytes_stream();

        let body_stream = async_stream::stream! {
            let _guard = guard;
            loop {
                match tokio::time::timeout(idle, upstream_body.next()).await {
                    Ok(Some(Ok(chunk))) => {
                        tracker.add_bytes(session_id, chunk.len() as u64).await;
                        yield Ok::<bytes::Bytes, std::io::Error>(chunk);
                    }
                    Ok(Some(Err(e))) => {
                        // Status line is committed; best-effort delivery ends here
                        warn!(session = %session_id, title = %title, "Upstream read error: {e}");
                        tracker.finish(session_id, SessionState::Completed).await;
                        break;
                    }
                    Ok(None) => {
                        debug!(session = %session_id, title = %title, "Upstream body ended");
                        tracker.finish(session_id, SessionState::Completed).await;
                        break;
                    }
                    Err(_) => {
                        warn!(
                            session = %session_id,
                            title = %title,
                            "Upstream idle past {idle:?}, destroying relay"
                        );
                        tracker.finish(session_id, SessionState::Completed).await;
                        break;
                    }
                }
            }
        };

        builder
            .body(Body::from_stream(body_stream))
            .map_err(|e| PlayerError::internal(format!("failed to build relay response: {e}")))
    }
}
