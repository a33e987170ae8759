//! Listener, routes, and the start/stop lifecycle.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tts_core::{SpeechEngine, SynthesisAdapter};

use crate::config::ServerConfig;
use crate::error::GatewayError;
use crate::metrics::MetricsSnapshot;
use crate::session::{Session, SessionEntry, SessionRegistry};
use crate::state::AppState;

/// Stops a running [`Server`] from anywhere, e.g. a signal handler.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ServerHandle {
    /// Begin graceful shutdown. Calling it again has no further effect.
    pub fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Shutdown requested");
        }
    }
}

pub struct Server {
    state: AppState,
    handle: ServerHandle,
}

impl Server {
    pub fn new(config: ServerConfig, adapter: SynthesisAdapter) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            state: AppState::new(config, Arc::new(adapter), rx),
            handle: ServerHandle { shutdown: Arc::new(tx) },
        }
    }

    /// Start the synthesis adapter around `engine` and build the server.
    pub fn with_engine<E: SpeechEngine>(config: ServerConfig, engine: E) -> Result<Self, GatewayError> {
        let adapter = SynthesisAdapter::start(engine, config.voice_params(), config.adapter_options())?;
        Ok(Self::new(config, adapter))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.state.registry
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn router(&self) -> Router {
        let middleware_stack = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .into_inner();

        Router::new()
            .route("/", get(ws_handler))
            .route("/health", get(health_check))
            .route("/sessions", get(list_sessions))
            .route("/metrics", get(metrics_endpoint))
            // Any other path is treated as a WebSocket endpoint too.
            .fallback(ws_handler)
            .layer(middleware_stack)
            .with_state(self.state.clone())
    }

    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        let addr = self
            .state
            .config
            .bind_addr()
            .map_err(|e| GatewayError::Bind {
                addr: format!("{}:{}", self.state.config.host, self.state.config.port),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
            })?;
        TcpListener::bind(addr).await.map_err(|source| GatewayError::Bind {
            addr: addr.to_string(),
            source,
        })
    }

    /// Bind and serve until [`Server::stop`] is called.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`Server::stop`] is called.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        info!("TTS gateway listening on ws://{addr}");

        let mut shutdown = self.state.shutdown.clone();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stopping| *stopping).await;
            })
            .await;

        // No new connections from here on. Open sessions see the flag and
        // close after their current request.
        self.handle.stop();
        let grace = self.state.config.shutdown_grace();
        if !self.state.registry.wait_until_empty(grace).await {
            warn!(
                "{} session(s) still open after {:?}, shutting down anyway",
                self.state.registry.len(),
                grace
            );
        }
        self.state.adapter.shutdown().await;
        info!("TTS gateway stopped");

        result.map_err(GatewayError::from)
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let max = state.config.max_message_size;
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    Session::accept(state, sender).run(receiver).await;
}

pub async fn health_check() -> &'static str {
    "ok"
}

#[derive(Serialize)]
pub struct SessionsResponse {
    pub count: usize,
    pub sessions: Vec<SessionEntry>,
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    let sessions = state.registry.snapshot();
    Json(SessionsResponse {
        count: sessions.len(),
        sessions,
    })
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot(
        state.registry.len(),
        state.started_at.elapsed().as_secs(),
    ))
}
