//! In-memory entity store
//!
//! Keeps the catalog in process memory, optionally seeded from a JSON file
//! at startup. Sufficient for running the proxy against a fixed catalog and
//! for exercising the playback pipeline in tests.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use super::EntityStore;
use crate::models::{EntityKind, RadioProgramme, Station, StreamEntry};

/// Seed file shape: `{"stations": [...], "streams": [...], "radios": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub stations: Vec<Station>,
    #[serde(default)]
    pub streams: Vec<StreamEntry>,
    #[serde(default)]
    pub radios: Vec<RadioProgramme>,
}

#[derive(Default)]
pub struct MemoryEntityStore {
    stations: RwLock<HashMap<String, Station>>,
    streams: RwLock<Vec<StreamEntry>>,
    radios: RwLock<HashMap<String, RadioProgramme>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_seed_file(&self, path: &Path) -> Result<()> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read catalog seed {}", path.display()))?;
        let seed: CatalogSeed = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse catalog seed {}", path.display()))?;

        info!(
            "Seeding catalog: {} stations, {} streams, {} radio programmes",
            seed.stations.len(),
            seed.streams.len(),
            seed.radios.len()
        );
        self.load_seed(seed).await;
        Ok(())
    }

    pub async fn load_seed(&self, seed: CatalogSeed) {
        let mut stations = self.stations.write().await;
        for station in seed.stations {
            stations.insert(station.id.clone(), station);
        }
        drop(stations);

        self.streams.write().await.extend(seed.streams);

        let mut radios = self.radios.write().await;
        for radio in seed.radios {
            radios.insert(radio.id.clone(), radio);
        }
    }

    pub async fn insert_station(&self, station: Station) {
        self.stations
            .write()
            .await
            .insert(station.id.clone(), station);
    }

    pub async fn insert_stream(&self, stream: StreamEntry) {
        self.streams.write().await.push(stream);
    }

    pub async fn insert_radio(&self, radio: RadioProgramme) {
        self.radios.write().await.insert(radio.id.clone(), radio);
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn station_by_id(&self, id: &str) -> Option<Station> {
        self.stations.read().await.get(id).cloned()
    }

    async fn stream_by_key(&self, key: &str) -> Option<StreamEntry> {
        let streams = self.streams.read().await;
        streams
            .iter()
            .find(|s| s.stream_id == key)
            .or_else(|| streams.iter().find(|s| s.id == key))
            .cloned()
    }

    async fn radio_by_id(&self, id: &str) -> Option<RadioProgramme> {
        self.radios.read().await.get(id).cloned()
    }

    async fn increment_play_count(&self, kind: EntityKind, id: &str) {
        match kind {
            EntityKind::Station => {
                if let Some(station) = self.stations.write().await.get_mut(id) {
                    station.play_count += 1;
                }
            }
            EntityKind::Stream => {
                let mut streams = self.streams.write().await;
                if let Some(stream) = streams
                    .iter_mut()
                    .find(|s| s.stream_id == id || s.id == id)
                {
                    stream.play_count += 1;
                }
            }
            EntityKind::Radio => {
                if let Some(radio) = self.radios.write().await.get_mut(id) {
                    radio.views += 1;
                }
            }
            EntityKind::RawUrl => {}
        }
    }
}
