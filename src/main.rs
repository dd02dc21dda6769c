use clap::Parser;
use dotenvy::dotenv;
use gridfs_uploader::config::{Cli, UploaderConfig};
use gridfs_uploader::infrastructure::{filesystem, storage};
use gridfs_uploader::{AppState, create_app};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment, flags & logging
    dotenv().ok();
    let config = UploaderConfig::from_cli(Cli::parse())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridfs_uploader=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting uploader [Blob backend: {}]...", config.blob.backend);

    // 2. Storage. Failing here exits before the port is bound.
    let blob_store = storage::setup_blob_store(&config.blob).await?;
    filesystem::prepare_upload_dir(&config.upload_dir).await?;

    if config.print.allowed_printers.is_empty() {
        info!("🖨️  Printing disabled (no printers allowed)");
    } else {
        info!(
            "🖨️  Printing via '{}' to: {}",
            config.print.command,
            config.print.allowed_printers.join(", ")
        );
    }

    // 3. HTTP server
    let port = config.port;
    let state = AppState::new(config, blob_store);

    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ Server listening on: http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Uploader exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
