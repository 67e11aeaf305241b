//! HLS transcoding bridge
//!
//! Playlist sources cannot be byte-relayed, so an external ffmpeg process
//! reads the manifest at native playback speed (`-re`) and writes a
//! continuous encoded audio stream to stdout, which becomes the response
//! body. Client `Range` headers are not honored on this path: transcoding
//! starts at the live/playlist start on every request. That is a known
//! limitation of HLS reassembly, not a bug.
//!
//! The child process handle lives inside the body stream; dropping the body
//! for any reason (client disconnect, teardown) kills the process. Closing
//! the output pipe alone is never relied on to stop the transcoder.

use std::process::Stdio;

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode, header};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::TranscodeConfig;
use crate::errors::{PlayerError, PlayerResult};
use crate::models::ResolvedSource;
use crate::player::relay::apply_stream_headers;
use crate::player::session::{SessionGuard, SessionState, SessionTracker};

const STDOUT_CHUNK_SIZE: usize = 8192;

/// Owns the transcoder child for the lifetime of one response body.
struct ChildGuard {
    child: tokio::process::Child,
    session: Uuid,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            debug!(session = %self.session, "Killing transcoder process");
            if let Err(e) = self.child.start_kill() {
                warn!(session = %self.session, "Failed to kill transcoder: {e}");
            }
        }
    }
}

pub struct TranscodeBridge {
    config: TranscodeConfig,
}

impl TranscodeBridge {
    pub fn new(config: TranscodeConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, input_url: &str) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "warning".to_string(),
            // Read the playlist at native playback speed
            "-re".to_string(),
            "-i".to_string(),
            input_url.to_string(),
            "-vn".to_string(),
            "-f".to_string(),
            self.config.output_format.clone(),
            "-b:a".to_string(),
            self.config.audio_bitrate.clone(),
            "pipe:1".to_string(),
        ]
    }

    /// Spawn the transcoder and stream its output as the response body.
    /// Spawn failure is the only error that can still change the status
    /// line; runtime transcoder errors end the body.
    pub async fn stream(
        &self,
        source: &ResolvedSource,
        tracker: SessionTracker,
        session_id: Uuid,
    ) -> PlayerResult<Response<Body>> {
        let args = self.build_args(&source.url);
        debug!(session = %session_id, command = %self.config.ffmpeg_command, ?args, "Spawning transcoder");

        let mut cmd = Command::new(&self.config.ffmpeg_command);
        cmd.args(&args);
        cmd.kill_on_drop(true);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            PlayerError::transcode_startup(format!(
                "failed to spawn {}: {e}",
                self.config.ffmpeg_command
            ))
        })?;

        info!(
            session = %session_id,
            title = %source.display_title,
            "Started transcoding"
        );

        if let Some(stderr) = child.stderr.take() {
            let title = source.display_title.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let lower = line.to_lowercase();
                    if lower.contains("error")
                        || lower.contains("failed")
                        || lower.contains("invalid")
                        || lower.contains("not found")
                    {
                        error!(session = %session_id, title = %title, "ffmpeg: {line}");
                    } else if lower.contains("warning") || lower.contains("deprecated") {
                        warn!(session = %session_id, title = %title, "ffmpeg: {line}");
                    } else {
                        debug!(session = %session_id, title = %title, "ffmpeg: {line}");
                    }
                }
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::transcode_startup("transcoder stdout unavailable"))?;

        let mut builder = Response::builder().status(StatusCode::OK);
        if let Some(headers) = builder.headers_mut() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(self.config.content_type()),
            );
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            apply_stream_headers(headers, source);
        }

        let title = source.display_title.clone();
        let guard = SessionGuard::new(tracker.clone(), session_id);
        let mut output = ReaderStream::with_capacity(stdout, STDOUT_CHUNK_SIZE);

        let body_stream = async_stream::stream! {
            let _guard = guard;
            let mut child = ChildGuard { child, session: session_id };
            while let Some(next) = output.next().await {
                match next {
                    Ok(chunk) => {
                        tracker.add_bytes(session_id, chunk.len() as u64).await;
                        yield Ok::<bytes::Bytes, std::io::Error>(chunk);
                    }
                    Err(e) => {
                        error!(session = %session_id, title = %title, "Transcoder read error: {e}");
                        break;
                    }
                }
            }
            info!(session = %session_id, title = %title, "Transcoding ended");
            tracker.finish(session_id, SessionState::Completed).await;
            if let Ok(Some(status)) = child.child.try_wait() {
                debug!(session = %session_id, "Transcoder exited with {status}");
            }
        };

        builder
            .body(Body::from_stream(body_stream))
            .map_err(|e| PlayerError::internal(format!("failed to build transcode response: {e}")))
    }
}
