use std::{sync::Arc, time::Instant};

use tokio::sync::watch;
use tts_core::SynthesisAdapter;

use crate::config::ServerConfig;
use crate::metrics::GatewayMetrics;
use crate::session::SessionRegistry;
use crate::streamer::ChunkStreamer;

/// Everything a session needs, shared across all connections.
#[derive(Clone)]
pub struct AppState {
    pub adapter: Arc<SynthesisAdapter>,
    pub registry: Arc<SessionRegistry>,
    pub metrics: Arc<GatewayMetrics>,
    pub streamer: ChunkStreamer,
    pub config: ServerConfig,
    /// Flips to `true` once when the server is asked to stop.
    pub shutdown: watch::Receiver<bool>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        adapter: Arc<SynthesisAdapter>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            adapter,
            registry: Arc::new(SessionRegistry::new()),
            metrics: Arc::new(GatewayMetrics::new()),
            streamer: ChunkStreamer::new(config.chunk_size, config.chunk_delay()),
            config,
            shutdown,
            started_at: Instant::now(),
        }
    }
}
