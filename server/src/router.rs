//! Classifies inbound frames and runs the matching handler.
//!
//! Handlers return `Result<(), RequestError>`; [`dispatch`] is the only place
//! a `RequestError` turns into a wire `error` message.

use std::sync::atomic::Ordering;

use tracing::{error, warn};

use crate::error::{ProtocolError, RequestError, TransportError};
use crate::protocol::{ClientMessage, Request, ServerMessage, INVALID_REQUEST_ID};
use crate::state::AppState;
use crate::transport::MessageSink;
use crate::validation::validate_text;

/// Handle one inbound frame.
///
/// Only a transport failure is returned; every other error is reported to
/// the client and the session carries on.
pub async fn dispatch<S: MessageSink>(
    state: &AppState,
    session_id: &str,
    sink: &mut S,
    frame: &str,
) -> Result<(), TransportError> {
    state.metrics.messages_received.fetch_add(1, Ordering::Relaxed);

    let (request_id, result) = match ClientMessage::decode(frame) {
        Ok(message) => {
            let (request_id, request) = message.into_request();
            let result = match request {
                Ok(request) => handle(state, sink, &request_id, request).await,
                Err(e) => Err(e.into()),
            };
            (request_id, result)
        }
        Err(e) => (INVALID_REQUEST_ID.to_string(), Err(e.into())),
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) => report(state, session_id, sink, &request_id, err).await,
    }
}

/// Handle one binary frame. It must hold UTF-8 JSON, like a text frame.
pub async fn dispatch_binary<S: MessageSink>(
    state: &AppState,
    session_id: &str,
    sink: &mut S,
    frame: &[u8],
) -> Result<(), TransportError> {
    match std::str::from_utf8(frame) {
        Ok(text) => dispatch(state, session_id, sink, text).await,
        Err(e) => {
            state.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
            let err = RequestError::from(ProtocolError::from(e));
            report(state, session_id, sink, INVALID_REQUEST_ID, err).await
        }
    }
}

async fn handle<S: MessageSink>(
    state: &AppState,
    sink: &mut S,
    request_id: &str,
    request: Request,
) -> Result<(), RequestError> {
    state.metrics.record_request(request.name());

    match request {
        Request::Synthesize { text } => {
            validate_text(&text)?;
            state
                .streamer
                .synthesize_and_stream(sink, &state.adapter, &state.metrics, request_id, &text)
                .await?;
            state.metrics.syntheses_completed.fetch_add(1, Ordering::Relaxed);
        }
        Request::GetVoices => {
            sink.send(ServerMessage::voice_info(request_id, state.adapter.voice_info()))
                .await?;
        }
        Request::Ping => {
            sink.send(ServerMessage::pong(request_id)).await?;
        }
    }
    Ok(())
}

async fn report<S: MessageSink>(
    state: &AppState,
    session_id: &str,
    sink: &mut S,
    request_id: &str,
    err: RequestError,
) -> Result<(), TransportError> {
    state.metrics.record_error(err.kind());

    match err {
        RequestError::Transport(e) => {
            warn!(session_id, request_id, "Transport failure: {e}");
            Err(e)
        }
        RequestError::Synthesis(e) => {
            error!(session_id, request_id, "Synthesis failed: {e}");
            sink.send(ServerMessage::error(request_id, RequestError::Synthesis(e).to_string()))
                .await
        }
        other => {
            warn!(session_id, request_id, kind = other.kind(), "Rejected request: {other}");
            sink.send(ServerMessage::error(request_id, other.to_string())).await
        }
    }
}
