use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bakwaasfm_proxy::{
    config::Config,
    player::PlayerService,
    store::{EntityStore, MemoryEntityStore},
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "bakwaasfm-proxy")]
#[command(version)]
#[command(about = "A streaming player proxy with HLS transcoding and range passthrough")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("bakwaasfm_proxy={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting BakwaasFM Player Proxy v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let store = MemoryEntityStore::new();
    if let Some(seed_path) = &config.catalog.seed_path {
        store.load_seed_file(seed_path).await?;
    }
    let store: Arc<dyn EntityStore> = Arc::new(store);

    let player = Arc::new(PlayerService::new(store, &config)?);
    player
        .sessions
        .start_summary_reporter(Duration::from_secs(30));

    let web_server = WebServer::new(config, player)?;
    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );

    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_signal(server_ready_tx).await {
            tracing::error!("Web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => {
            info!("Web server is now listening");
        }
        Ok(Err(bind_error)) => {
            tracing::error!("Failed to bind web server: {}", bind_error);
            return Err(bind_error);
        }
        Err(_) => {
            tracing::error!("Web server task completed without signaling");
            return Err(anyhow::anyhow!("Web server failed to start"));
        }
    }

    server_handle.await?;

    Ok(())
}
