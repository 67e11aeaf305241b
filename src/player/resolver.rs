//! Source resolution for playback requests
//!
//! Turns a [`PlaybackRequest`] into a [`ResolvedSource`]: catalog lookup,
//! optional single-hop redirect resolution, and playlist classification.
//! Redirect resolution deliberately disables automatic following: the probe
//! reads the `Location` header of the first response and nothing more, so
//! CDN entry points that answer with one 302 are resolved without chasing
//! redirect chains.

use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect;
use tracing::{debug, info, warn};

use crate::config::{PlayerConfig, RedirectPolicy};
use crate::errors::{PlayerError, PlayerResult};
use crate::models::{EntityKind, PlaybackRequest, ResolvedSource, SourceKind};
use crate::store::EntityStore;
use crate::utils::url::UrlUtils;

pub struct SourceResolver {
    store: Arc<dyn EntityStore>,
    probe: reqwest::Client,
    policy: RedirectPolicy,
    probe_timeout: Duration,
}

impl SourceResolver {
    pub fn new(store: Arc<dyn EntityStore>, config: &PlayerConfig) -> anyhow::Result<Self> {
        let probe = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::none())
            .connect_timeout(config.connect_timeout_duration())
            .build()?;

        Ok(Self {
            store,
            probe,
            policy: config.resolve_redirects.clone(),
            probe_timeout: config.upstream_timeout_duration(),
        })
    }

    /// Resolve a playback request to a concrete source, or fail with the
    /// 404/400 taxonomy. Also fires the play-count increment for catalog
    /// entities.
    pub async fn resolve(&self, request: &PlaybackRequest) -> PlayerResult<ResolvedSource> {
        let (url, display_title, entity_id) = self.lookup(request).await?;

        let url = if self.policy.for_kind(request.kind) {
            self.resolve_redirect_hop(&url).await
        } else {
            url
        };

        let kind = if UrlUtils::is_hls_playlist(&url) {
            SourceKind::Playlist
        } else {
            SourceKind::Direct
        };

        if request.kind != EntityKind::RawUrl {
            let store = self.store.clone();
            let entity_kind = request.kind;
            let id = entity_id.clone();
            tokio::spawn(async move {
                store.increment_play_count(entity_kind, &id).await;
            });
        }

        debug!(
            kind = ?kind,
            title = %display_title,
            url = %url,
            "Source resolved"
        );

        Ok(ResolvedSource {
            url,
            kind,
            display_title,
            entity_kind: request.kind,
            entity_id,
        })
    }

    async fn lookup(&self, request: &PlaybackRequest) -> PlayerResult<(String, String, String)> {
        match request.kind {
            EntityKind::Station => {
                let id = request.entity_id.as_deref().unwrap_or_default();
                let station = self
                    .store
                    .station_by_id(id)
                    .await
                    .ok_or_else(|| PlayerError::not_found(EntityKind::Station, id))?;
                let url = station
                    .mp3_url
                    .ok_or_else(|| PlayerError::no_source_url(EntityKind::Station, id))?;
                Ok((url, station.name, station.id))
            }
            EntityKind::Stream => {
                let key = request.entity_id.as_deref().unwrap_or_default();
                let stream = self
                    .store
                    .stream_by_key(key)
                    .await
                    .ok_or_else(|| PlayerError::not_found(EntityKind::Stream, key))?;
                let url = stream
                    .url
                    .ok_or_else(|| PlayerError::no_source_url(EntityKind::Stream, key))?;
                let title = stream.name.unwrap_or_else(|| "Radio Stream".to_string());
                Ok((url, title, stream.stream_id))
            }
            EntityKind::Radio => {
                let id = request.entity_id.as_deref().unwrap_or_default();
                let radio = self
                    .store
                    .radio_by_id(id)
                    .await
                    .ok_or_else(|| PlayerError::not_found(EntityKind::Radio, id))?;
                let url = radio
                    .audio_url
                    .ok_or_else(|| PlayerError::no_source_url(EntityKind::Radio, id))?;
                Ok((url, radio.title, radio.id))
            }
            EntityKind::RawUrl => {
                let raw = request.raw_url.as_deref().unwrap_or_default();
                let parsed =
                    UrlUtils::validate_playable(raw).map_err(PlayerError::invalid_url)?;
                let url = parsed.to_string();
                Ok((url.clone(), "Direct Stream".to_string(), url))
            }
        }
    }

    /// Resolve at most one redirect hop. Probe failures are logged and leave
    /// the original URL in place; the relay will surface any real
    /// connectivity problem itself.
    async fn resolve_redirect_hop(&self, url: &str) -> String {
        let response = match tokio::time::timeout(self.probe_timeout, self.probe.get(url).send())
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Redirect probe failed for {url}: {e}");
                return url.to_string();
            }
            Err(_) => {
                warn!("Redirect probe timed out for {url}");
                return url.to_string();
            }
        };

        if !response.status().is_redirection() {
            return url.to_string();
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok());

        match location.and_then(|loc| UrlUtils::resolve_location(url, loc)) {
            Some(resolved) => {
                info!("Redirect resolved: {url} -> {resolved}");
                resolved
            }
            None => url.to_string(),
        }
    }
}
