//! Web layer
//!
//! HTTP surface of the player proxy: the `/player/*` routes, CORS handling
//! (preflights answered with 200 and permissive headers), shared state, and
//! server lifecycle with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::http::{Method, header};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::player::PlayerService;

pub mod handlers;
pub mod responses;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub player: Arc<PlayerService>,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: Config, player: Arc<PlayerService>) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        let app = Self::create_router(AppState { config, player });
        Ok(Self { app, addr })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::RANGE, header::CONTENT_TYPE]);

        Router::new()
            .route(
                "/player/station/{id}",
                get(handlers::play_station).options(handlers::options_ok),
            )
            .route(
                "/player/stream/{id}",
                get(handlers::play_stream).options(handlers::options_ok),
            )
            .route(
                "/player/radio/{id}",
                get(handlers::play_radio).options(handlers::options_ok),
            )
            .route(
                "/player/url/{encoded_url}",
                get(handlers::play_url).options(handlers::options_ok),
            )
            .route("/player/health", get(handlers::health))
            .layer(cors)
            .with_state(state)
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    /// Serve with a notification when the server is actually listening or
    /// fails to bind, shutting down gracefully on SIGTERM/SIGINT.
    pub async fn serve_with_signal(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                let _ = ready_signal.send(Ok(()));

                let shutdown_signal = async {
                    #[cfg(unix)]
                    {
                        use tokio::signal::unix::{SignalKind, signal};
                        let mut sigterm = signal(SignalKind::terminate())
                            .expect("failed to install SIGTERM handler");
                        let mut sigint = signal(SignalKind::interrupt())
                            .expect("failed to install SIGINT handler");

                        tokio::select! {
                            _ = sigterm.recv() => {
                                tracing::info!("Received SIGTERM, shutting down gracefully");
                            }
                            _ = sigint.recv() => {
                                tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully");
                            }
                        }
                    }

                    #[cfg(not(unix))]
                    {
                        use tokio::signal;
                        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
                        tracing::info!("Received Ctrl+C, shutting down gracefully");
                    }
                };

                axum::serve(listener, self.app)
                    .with_graceful_shutdown(shutdown_signal)
                    .await?;
                Ok(())
            }
            Err(bind_error) => {
                let message = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", message)));
                Err(anyhow::anyhow!("{}", message))
            }
        }
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
