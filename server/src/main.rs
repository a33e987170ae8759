use anyhow::Context;
use tracing::info;

use tts_core::PiperEngine;
use tts_gateway::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting TTS gateway...");

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: addr={}:{}, rate={}, volume={}, voice_index={}, chunk_size={}",
        config.host, config.port, config.rate, config.volume, config.voice_index, config.chunk_size
    );

    info!("Loading Piper voices from {}", config.voice_map.display());
    let engine = PiperEngine::from_map_file(&config.voice_map, config.voice_index)
        .with_context(|| format!("Could not initialize speech engine from {}", config.voice_map.display()))?;

    let server = Server::with_engine(config, engine)?;

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.stop();
    });

    server.start().await?;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
