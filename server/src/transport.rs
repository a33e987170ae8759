use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{stream::SplitSink, SinkExt};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::protocol::ServerMessage;

/// Where a session writes its outbound messages.
#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: ServerMessage) -> Result<(), TransportError>;

    async fn close(&mut self) {}
}

#[async_trait]
impl MessageSink for SplitSink<WebSocket, Message> {
    async fn send(&mut self, message: ServerMessage) -> Result<(), TransportError> {
        let text = message
            .to_json()
            .map_err(|e| TransportError(format!("encode {}: {e}", message.kind())))?;
        SinkExt::send(self, Message::Text(text.into()))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = SinkExt::close(self).await;
    }
}

/// In-process sink, used to drive sessions without a socket.
#[async_trait]
impl MessageSink for mpsc::UnboundedSender<ServerMessage> {
    async fn send(&mut self, message: ServerMessage) -> Result<(), TransportError> {
        mpsc::UnboundedSender::send(self, message)
            .map_err(|_| TransportError("receiver dropped".into()))
    }
}
