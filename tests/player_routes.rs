//! Player route integration tests
//!
//! Exercises the playback pipeline end to end against in-process upstream
//! servers bound to ephemeral ports: range passthrough, redirect hop
//! resolution, playlist transcoding, error mapping, upstream timeouts, and
//! disconnect teardown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header};
use axum::routing::get;
use axum_test::TestServer;
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

use bakwaasfm_proxy::config::{Config, RedirectPolicy};
use bakwaasfm_proxy::models::{RadioProgramme, Station, StreamEntry};
use bakwaasfm_proxy::player::PlayerService;
use bakwaasfm_proxy::store::MemoryEntityStore;
use bakwaasfm_proxy::web::{AppState, WebServer};

fn test_config(resolve_redirects: bool) -> Config {
    let mut config = Config::default();
    config.player.upstream_timeout = "2s".to_string();
    config.player.connect_timeout = "2s".to_string();
    if !resolve_redirects {
        config.player.resolve_redirects = RedirectPolicy {
            station: false,
            stream: false,
            radio: false,
            url: false,
        };
    }
    config
}

fn build_app(config: Config, store: MemoryEntityStore) -> (Router, Arc<PlayerService>) {
    let player =
        Arc::new(PlayerService::new(Arc::new(store), &config).expect("failed to build service"));
    let app = WebServer::create_router(AppState {
        config,
        player: player.clone(),
    });
    (app, player)
}

async fn spawn_upstream(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind upstream");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn station(id: &str, name: &str, url: &str) -> Station {
    Station {
        id: id.to_string(),
        name: name.to_string(),
        mp3_url: Some(url.to_string()),
        play_count: 0,
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _player) = build_app(test_config(false), MemoryEntityStore::new());
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["service"], "BakwaasFM Player Proxy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_missing_station_returns_404_json() {
    let (app, _player) = build_app(test_config(false), MemoryEntityStore::new());
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/station/does-not-exist").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["error"], "Station not found");
}

#[tokio::test]
async fn test_station_without_source_url_returns_404() {
    let store = MemoryEntityStore::new();
    store
        .insert_station(Station {
            id: "silent".to_string(),
            name: "Silent FM".to_string(),
            mp3_url: None,
            play_count: 0,
        })
        .await;
    let (app, _player) = build_app(test_config(false), store);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/station/silent").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "No audio URL available");
}

#[tokio::test]
async fn test_raw_url_with_bad_scheme_returns_400() {
    let (app, _player) = build_app(test_config(false), MemoryEntityStore::new());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/player/url/ftp%3A%2F%2Fexample.com%2Fsong.mp3")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid URL format");
}

#[tokio::test]
async fn test_range_passthrough_mirrors_206_and_content_range() {
    // Upstream replies 206 + Content-Range only when the client's exact
    // Range header arrived; a 200 here would mean the relay dropped it.
    let upstream = Router::new().route(
        "/track.mp3",
        get(|headers: HeaderMap| async move {
            match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
                Some("bytes=100-199") => (
                    StatusCode::PARTIAL_CONTENT,
                    [
                        (header::CONTENT_RANGE, "bytes 100-199/1000"),
                        (header::ACCEPT_RANGES, "bytes"),
                    ],
                    vec![0u8; 100],
                ),
                _ => (
                    StatusCode::OK,
                    [
                        (header::CONTENT_RANGE, "bytes 0-999/1000"),
                        (header::ACCEPT_RANGES, "bytes"),
                    ],
                    vec![0u8; 1000],
                ),
            }
        }),
    );
    let addr = spawn_upstream(upstream).await;

    let store = MemoryEntityStore::new();
    store
        .insert_station(station(
            "abc",
            "Desi Hits",
            &format!("http://{addr}/track.mp3"),
        ))
        .await;
    let (app, _player) = build_app(test_config(false), store);
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/player/station/abc")
        .add_header(header::RANGE, HeaderValue::from_static("bytes=100-199"))
        .await;

    assert_eq!(response.status_code(), StatusCode::PARTIAL_CONTENT);
    let headers = response.headers();
    assert_eq!(headers.get("content-range").unwrap(), "bytes 100-199/1000");
    assert_eq!(headers.get("accept-ranges").unwrap(), "bytes");
    assert_eq!(headers.get("x-bakwaasfm-player").unwrap(), "true");
    assert_eq!(headers.get("x-stream-type").unwrap(), "station");
    assert_eq!(response.as_bytes().len(), 100);
}

#[tokio::test]
async fn test_relay_identifies_itself_upstream() {
    let upstream = Router::new().route(
        "/ua.mp3",
        get(|headers: HeaderMap| async move {
            headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("missing")
                .to_string()
        }),
    );
    let addr = spawn_upstream(upstream).await;

    let store = MemoryEntityStore::new();
    store
        .insert_station(station("ua", "UA FM", &format!("http://{addr}/ua.mp3")))
        .await;
    let (app, _player) = build_app(test_config(false), store);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/station/ua").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "BakwaasFM-Player/1.0");
}

#[tokio::test]
async fn test_upstream_internal_headers_are_dropped() {
    let upstream = Router::new().route(
        "/stream",
        get(|| async {
            (
                [
                    (header::ETAG, "\"v123\""),
                    (header::HeaderName::from_static("x-backend-node"), "edge-7"),
                    (header::SET_COOKIE, "sid=1"),
                ],
                "audio",
            )
        }),
    );
    let addr = spawn_upstream(upstream).await;

    let store = MemoryEntityStore::new();
    store
        .insert_station(station("s", "S", &format!("http://{addr}/stream")))
        .await;
    let (app, _player) = build_app(test_config(false), store);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/station/s").await;
    let headers = response.headers();
    assert_eq!(headers.get("etag").unwrap(), "\"v123\"");
    assert!(headers.get("x-backend-node").is_none());
    assert!(headers.get("set-cookie").is_none());
}

#[tokio::test]
async fn test_station_redirect_hop_is_resolved() {
    // Scenario A: the stored URL answers 302; the relay must connect to the
    // Location target, not the original URL.
    let target_hits = Arc::new(AtomicUsize::new(0));
    let hits = target_hits.clone();
    let target = Router::new().route(
        "/live.mp3",
        get(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "LIVEAUDIODATA"
            }
        }),
    );
    let target_addr = spawn_upstream(target).await;

    let location = format!("http://{target_addr}/live.mp3");
    let entry = Router::new().route(
        "/entry",
        get(move || {
            let location = location.clone();
            async move { (StatusCode::FOUND, [(header::LOCATION, location)], "") }
        }),
    );
    let entry_addr = spawn_upstream(entry).await;

    let store = MemoryEntityStore::new();
    store
        .insert_station(station(
            "abc",
            "Redirecting FM",
            &format!("http://{entry_addr}/entry"),
        ))
        .await;
    let (app, _player) = build_app(test_config(true), store);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/station/abc").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "LIVEAUDIODATA");
    assert_eq!(target_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_playlist_source_uses_transcoder() {
    // Scenario B: a .m3u8 source goes through the transcoding bridge. The
    // bridge is exercised with `echo` standing in for ffmpeg, so the body is
    // the argument list it was spawned with.
    let mut config = test_config(false);
    config.transcode.ffmpeg_command = "echo".to_string();

    let store = MemoryEntityStore::new();
    store
        .insert_stream(StreamEntry {
            id: "internal-9".to_string(),
            stream_id: "xyz".to_string(),
            name: Some("HLS Radio".to_string()),
            url: Some("https://cdn.example/live/playlist.m3u8".to_string()),
            play_count: 0,
        })
        .await;
    let (app, _player) = build_app(config, store);
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/player/stream/xyz")
        .add_header(header::RANGE, HeaderValue::from_static("bytes=0-"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "audio/mpeg");
    assert_eq!(headers.get("x-stream-type").unwrap(), "stream");
    assert_eq!(headers.get("x-stream-title").unwrap(), "HLS%20Radio");
    // No range negotiation on the transcode path
    assert!(headers.get("content-range").is_none());
    assert!(headers.get("accept-ranges").is_none());

    let body = response.text();
    assert!(body.contains("playlist.m3u8"));
    assert!(body.contains("-re"));
}

#[tokio::test]
async fn test_transcoder_spawn_failure_returns_500() {
    let mut config = test_config(false);
    config.transcode.ffmpeg_command = "/nonexistent/transcoder-binary".to_string();

    let store = MemoryEntityStore::new();
    store
        .insert_radio(RadioProgramme {
            id: "r1".to_string(),
            title: "Morning Show".to_string(),
            audio_url: Some("https://cdn.example/shows/morning.m3u8".to_string()),
            views: 0,
        })
        .await;
    let (app, player) = build_app(config, store);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/radio/r1").await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "Failed to transcode stream");

    assert_eq!(player.sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_upstream_header_timeout_returns_500() {
    // Upstream accepts the connection but never sends headers within the
    // inactivity window; no bytes were sent, so the client gets a 500.
    let upstream = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "too late"
        }),
    );
    let addr = spawn_upstream(upstream).await;

    let mut config = test_config(false);
    config.player.upstream_timeout = "1s".to_string();

    let store = MemoryEntityStore::new();
    store
        .insert_station(station("slow", "Slow FM", &format!("http://{addr}/slow")))
        .await;
    let (app, player) = build_app(config, store);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/station/slow").await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "Stream timed out");

    assert_eq!(player.sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_full_relay_preserves_body_length() {
    let payload = vec![7u8; 64 * 1024];
    let expected_len = payload.len();
    let upstream = Router::new().route(
        "/big",
        get(move || {
            let payload = payload.clone();
            async move { payload }
        }),
    );
    let addr = spawn_upstream(upstream).await;

    let store = MemoryEntityStore::new();
    store
        .insert_station(station("big", "Big FM", &format!("http://{addr}/big")))
        .await;
    let (app, _player) = build_app(test_config(false), store);
    let server = TestServer::new(app).unwrap();

    let response = server.get("/player/station/big").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.as_bytes().len(), expected_len);
}

#[tokio::test]
async fn test_options_preflight_gets_cors_headers() {
    let (app, _player) = build_app(test_config(false), MemoryEntityStore::new());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/player/station/abc")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "range")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_client_disconnect_tears_down_relay_session() {
    // An endless upstream; the client reads one chunk and hangs up. The
    // session must drain (and the upstream connection with it) shortly after.
    let upstream = Router::new().route(
        "/endless",
        get(|| async {
            let stream = async_stream::stream! {
                loop {
                    yield Ok::<_, std::io::Error>(bytes::Bytes::from_static(b"chunkchunkchunk"));
                    tokio::time::sleep(Duration::from_millis(25)).await;
                }
            };
            Body::from_stream(stream)
        }),
    );
    let upstream_addr = spawn_upstream(upstream).await;

    let store = MemoryEntityStore::new();
    store
        .insert_station(station(
            "endless",
            "Endless FM",
            &format!("http://{upstream_addr}/endless"),
        ))
        .await;
    let (app, player) = build_app(test_config(false), store);
    let proxy_addr = spawn_upstream(app).await;

    let response = reqwest::get(format!("http://{proxy_addr}/player/station/endless"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(player.sessions.active_count().await, 1);

    let mut body = response.bytes_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(!first.is_empty());
    drop(body);

    let mut drained = false;
    for _ in 0..100 {
        if player.sessions.active_count().await == 0 {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(drained, "session was not torn down after client disconnect");
}

#[tokio::test]
async fn test_client_disconnect_kills_transcoder() {
    // `yes` echoes its arguments forever: an endless transcoder stand-in.
    // Dropping the response must end the session, which kills the process.
    let mut config = test_config(false);
    config.transcode.ffmpeg_command = "yes".to_string();

    let store = MemoryEntityStore::new();
    store
        .insert_station(station(
            "hls",
            "Endless HLS",
            "https://cdn.example/live/playlist.m3u8",
        ))
        .await;
    let (app, player) = build_app(config, store);
    let proxy_addr = spawn_upstream(app).await;

    let response = reqwest::get(format!("http://{proxy_addr}/player/station/hls"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "audio/mpeg"
    );

    let mut body = response.bytes_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(!first.is_empty());
    drop(body);

    let mut drained = false;
    for _ in 0..100 {
        if player.sessions.active_count().await == 0 {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(drained, "transcode session was not torn down after disconnect");
}
