//! Entity store boundary
//!
//! The relay subsystem consumes the catalog through this trait only. Lookups
//! return `None` for absent entities; the resolver maps that to the 404
//! error taxonomy. Play-count increments are fire-and-forget analytics with
//! no consistency requirement relative to the relay.

use async_trait::async_trait;

use crate::models::{EntityKind, RadioProgramme, Station, StreamEntry};

pub mod memory;

pub use memory::MemoryEntityStore;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn station_by_id(&self, id: &str) -> Option<Station>;

    /// Looks up a stream by its logical `stream_id` first, falling back to
    /// the internal `id`.
    async fn stream_by_key(&self, key: &str) -> Option<StreamEntry>;

    async fn radio_by_id(&self, id: &str) -> Option<RadioProgramme>;

    /// Best-effort play analytics; never blocks or fails a playback request.
    async fn increment_play_count(&self, kind: EntityKind, id: &str);
}
