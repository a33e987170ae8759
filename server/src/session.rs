//! Per-connection state and the session registry.

use std::{
    fmt::Display,
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn, Instrument};

use crate::error::TransportError;
use crate::protocol::ServerMessage;
use crate::router;
use crate::state::AppState;
use crate::transport::MessageSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEntry {
    pub id: String,
    pub connected_at: DateTime<Utc>,
    pub state: SessionState,
}

/// Live sessions by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new session in `Connecting`; it is removed when the guard drops.
    pub fn register(self: &Arc<Self>) -> SessionGuard {
        let id = uuid::Uuid::new_v4().to_string();
        let connected_at = Utc::now();
        let entry = SessionEntry {
            id: id.clone(),
            connected_at,
            state: SessionState::Connecting,
        };
        self.sessions.insert(id.clone(), entry);
        SessionGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    pub fn set_state(&self, id: &str, state: SessionState) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.state = state;
        }
    }

    pub fn get(&self, id: &str) -> Option<SessionEntry> {
        self.sessions.get(id).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions ordered by connection time.
    pub fn snapshot(&self) -> Vec<SessionEntry> {
        let mut entries: Vec<SessionEntry> = self.sessions.iter().map(|e| e.clone()).collect();
        entries.sort_by_key(|e| e.connected_at);
        entries
    }

    /// Wait for every session to go away. Returns `false` on timeout.
    pub async fn wait_until_empty(&self, timeout: Duration) -> bool {
        let drained = async {
            while !self.is_empty() {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }

    fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }
}

/// Registry membership of one session.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: String,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        debug!(session_id = %self.id, "Session removed from registry");
    }
}

/// One client connection.
pub struct Session<S: MessageSink> {
    guard: SessionGuard,
    state: SessionState,
    sink: S,
    app: AppState,
}

impl<S: MessageSink> Session<S> {
    pub fn accept(app: AppState, sink: S) -> Self {
        let guard = app.registry.register();
        app.metrics.connections_total.fetch_add(1, Ordering::Relaxed);
        info!(session_id = %guard.id(), "New connection");
        Self {
            guard,
            state: SessionState::Connecting,
            sink,
            app,
        }
    }

    pub fn id(&self) -> &str {
        self.guard.id()
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session_id = %self.guard.id(), from = ?self.state, to = ?next, "Session state");
        self.state = next;
        self.app.registry.set_state(self.guard.id(), next);
    }

    /// Send the welcome message and become `Active`.
    pub async fn open(&mut self) -> Result<(), TransportError> {
        let welcome = ServerMessage::welcome(self.guard.id(), self.app.adapter.voice_info());
        self.sink.send(welcome).await?;
        self.transition(SessionState::Active);
        Ok(())
    }

    pub async fn handle_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        router::dispatch(&self.app, self.guard.id(), &mut self.sink, frame).await
    }

    pub async fn handle_binary(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        router::dispatch_binary(&self.app, self.guard.id(), &mut self.sink, frame).await
    }

    /// Close the transport and leave the registry.
    pub async fn close(mut self) {
        self.transition(SessionState::Closing);
        self.sink.close().await;
        self.transition(SessionState::Closed);
        info!(session_id = %self.guard.id(), "Connection cleaned up");
    }

    /// Drive the session until the client leaves, the transport fails, or
    /// the server shuts down.
    ///
    /// Requests are handled one at a time; a request in progress when
    /// shutdown is signalled runs to completion first.
    pub async fn run<R, E>(mut self, inbound: R)
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display,
    {
        let span = tracing::info_span!("session", session_id = %self.guard.id());
        async move {
            if let Err(e) = self.open().await {
                warn!("Failed to send welcome: {e}");
                self.close().await;
                return;
            }
            self.serve(inbound).await;
            self.close().await;
        }
        .instrument(span)
        .await
    }

    async fn serve<R, E>(&mut self, mut inbound: R)
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display,
    {
        let mut shutdown = self.app.shutdown.clone();
        loop {
            if *shutdown.borrow() {
                info!("Closing for server shutdown");
                break;
            }

            let frame = tokio::select! {
                frame = inbound.next() => frame,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let result = match frame {
                Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str()).await,
                Some(Ok(Message::Binary(bytes))) => self.handle_binary(&bytes).await,
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected");
                    break;
                }
                Some(Ok(_)) => Ok(()),
                Some(Err(e)) => {
                    warn!("Receive error: {e}");
                    break;
                }
            };

            if let Err(e) = result {
                warn!("Tearing down session: {e}");
                break;
            }
        }
    }
}
