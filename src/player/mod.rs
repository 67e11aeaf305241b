//! The playback pipeline
//!
//! One inbound request flows through: resolve the source, branch on its
//! classification, then stream through either the byte relay or the
//! transcoding bridge, with the whole lifetime tracked as a session.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Response};
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::PlayerResult;
use crate::models::{PlaybackRequest, SourceKind};
use crate::store::EntityStore;

pub mod relay;
pub mod resolver;
pub mod session;
pub mod transcode;

pub use resolver::SourceResolver;
pub use session::{RelaySession, SessionState, SessionTracker};

pub struct PlayerService {
    resolver: SourceResolver,
    relay: relay::ProtocolRelay,
    bridge: transcode::TranscodeBridge,
    pub sessions: SessionTracker,
}

impl PlayerService {
    pub fn new(store: Arc<dyn EntityStore>, config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            resolver: SourceResolver::new(store, &config.player)?,
            relay: relay::ProtocolRelay::new(&config.player)?,
            bridge: transcode::TranscodeBridge::new(config.transcode.clone()),
            sessions: SessionTracker::new(),
        })
    }

    /// Handle one playback request end to end. Errors returned here happened
    /// before any byte reached the client and may still become an error
    /// status; everything later is handled inside the response body.
    pub async fn play(
        &self,
        request: PlaybackRequest,
        request_headers: &HeaderMap,
    ) -> PlayerResult<Response<Body>> {
        let session_id = self.sessions.begin(request.kind).await;
        self.sessions
            .transition(session_id, SessionState::Resolving)
            .await;

        let source = match self.resolver.resolve(&request).await {
            Ok(source) => source,
            Err(e) => {
                self.sessions
                    .finish(session_id, SessionState::Errored)
                    .await;
                return Err(e);
            }
        };
        self.sessions
            .describe(session_id, &source.display_title, &source.url)
            .await;
        info!(
            session = %session_id,
            stream_type = %source.entity_kind,
            title = %source.display_title,
            "Streaming from {}",
            source.url
        );

        let result = match source.kind {
            SourceKind::Direct => {
                self.sessions
                    .transition(session_id, SessionState::Streaming)
                    .await;
                self.relay
                    .stream(&source, request_headers, self.sessions.clone(), session_id)
                    .await
            }
            SourceKind::Playlist => {
                if request.range.is_some() {
                    // Known limitation: transcoding always starts at the
                    // playlist start, so seeking is not available here
                    debug!(session = %session_id, "Range ignored on playlist path");
                }
                self.sessions
                    .transition(session_id, SessionState::Transcoding)
                    .await;
                self.bridge
                    .stream(&source, self.sessions.clone(), session_id)
                    .await
            }
        };

        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                self.sessions
                    .finish(session_id, SessionState::Errored)
                    .await;
                Err(e)
            }
        }
    }
}
