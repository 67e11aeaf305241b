//! Default values for configuration

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_USER_AGENT: &str = "BakwaasFM-Player/1.0";

pub const DEFAULT_FFMPEG_COMMAND: &str = "ffmpeg";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3";
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
