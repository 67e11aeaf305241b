use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

/// Settings for the relay pipeline itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// User-Agent sent on every upstream request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Upstream inactivity window: bounds both the wait for response
    /// headers and the gap between body chunks
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout: String,
    /// TCP connect timeout for upstream requests
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
    /// Per-entity-kind single-hop redirect resolution policy
    #[serde(default)]
    pub resolve_redirects: RedirectPolicy,
}

/// Which entity kinds get one explicit redirect hop resolved before the
/// relay connects. Uniform by default; the historical station-only
/// behavior remains expressible by disabling the other kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectPolicy {
    #[serde(default = "default_true")]
    pub station: bool,
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default = "default_true")]
    pub radio: bool,
    #[serde(default = "default_true")]
    pub url: bool,
}

impl RedirectPolicy {
    pub fn for_kind(&self, kind: crate::models::EntityKind) -> bool {
        use crate::models::EntityKind;
        match kind {
            EntityKind::Station => self.station,
            EntityKind::Stream => self.stream,
            EntityKind::Radio => self.radio,
            EntityKind::RawUrl => self.url,
        }
    }
}

/// FFmpeg transcoder settings for the playlist path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    #[serde(default = "default_ffmpeg_command")]
    pub ffmpeg_command: String,
    /// Target container/encoding passed to `-f`
    #[serde(default = "default_output_format")]
    pub output_format: String,
    /// Audio bitrate passed to `-b:a`
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

impl TranscodeConfig {
    /// Content type advertised for the transcoded stream
    pub fn content_type(&self) -> &'static str {
        match self.output_format.as_str() {
            "mp3" => "audio/mpeg",
            "aac" | "adts" => "audio/aac",
            "ogg" => "audio/ogg",
            "wav" => "audio/wav",
            _ => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Optional JSON file the in-memory store is seeded from at startup
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_upstream_timeout() -> String {
    "30s".to_string()
}

fn default_connect_timeout() -> String {
    "10s".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ffmpeg_command() -> String {
    DEFAULT_FFMPEG_COMMAND.to_string()
}

fn default_output_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            upstream_timeout: default_upstream_timeout(),
            connect_timeout: default_connect_timeout(),
            resolve_redirects: RedirectPolicy::default(),
        }
    }
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            station: true,
            stream: true,
            radio: true,
            url: true,
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_command: default_ffmpeg_command(),
            output_format: default_output_format(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            player: PlayerConfig::default(),
            transcode: TranscodeConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl PlayerConfig {
    pub fn upstream_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.upstream_timeout).unwrap_or(Duration::from_secs(30))
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.connect_timeout).unwrap_or(Duration::from_secs(10))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}
