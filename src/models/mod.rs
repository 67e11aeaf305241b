//! Core data model for the player proxy
//!
//! The playback pipeline works on three shapes: the inbound
//! [`PlaybackRequest`], the [`ResolvedSource`] produced by the resolver, and
//! the catalog entities served by the entity store.

use serde::{Deserialize, Serialize};

/// The kind of entity a playback request addresses.
///
/// Serialized values double as the `X-Stream-Type` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Station,
    Stream,
    Radio,
    #[serde(rename = "url")]
    RawUrl,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Station => "station",
            EntityKind::Stream => "stream",
            EntityKind::Radio => "radio",
            EntityKind::RawUrl => "url",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a resolved source URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Progressive media servable by byte-range passthrough
    Direct,
    /// HLS `.m3u8` manifest requiring transcoding into a continuous stream
    Playlist,
}

/// One inbound playback request, created per HTTP request.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub kind: EntityKind,
    pub entity_id: Option<String>,
    pub raw_url: Option<String>,
    /// Client `Range` header, forwarded verbatim on the direct path
    pub range: Option<String>,
}

impl PlaybackRequest {
    pub fn for_entity(kind: EntityKind, entity_id: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: Some(entity_id.into()),
            raw_url: None,
            range: None,
        }
    }

    pub fn for_url(raw_url: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::RawUrl,
            entity_id: None,
            raw_url: Some(raw_url.into()),
            range: None,
        }
    }

    pub fn with_range(mut self, range: Option<String>) -> Self {
        self.range = range;
        self
    }
}

/// Output of the source resolver; owned by exactly one relay or transcode
/// session for the lifetime of a request.
///
/// Invariant: `kind == Playlist` iff the URL path (query string ignored)
/// ends in `.m3u8`.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub url: String,
    pub kind: SourceKind,
    pub display_title: String,
    pub entity_kind: EntityKind,
    pub entity_id: String,
}

/// A radio station from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub mp3_url: Option<String>,
    #[serde(default)]
    pub play_count: u64,
}

/// A live stream from the catalog; addressable by its logical `stream_id`
/// as well as its internal `id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEntry {
    pub id: String,
    pub stream_id: String,
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub play_count: u64,
}

/// A recorded radio programme from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioProgramme {
    pub id: String,
    pub title: String,
    pub audio_url: Option<String>,
    #[serde(default)]
    pub views: u64,
}
