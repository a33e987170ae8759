//! Wire format: JSON text frames in both directions.

use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};
use tts_core::{AudioChunk, VoiceInfo};

use crate::error::ProtocolError;

pub const SERVICE_NAME: &str = "Streaming TTS Service";
pub const PROTOCOL_VERSION: &str = "1.0.0";
pub const SUPPORTED_FORMATS: &[&str] = &["wav"];

/// Request id used when an inbound frame could not be decoded at all.
pub const INVALID_REQUEST_ID: &str = "invalid";

/// Seconds since the Unix epoch, with millisecond precision.
pub fn timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Inbound envelope, before classification.
///
/// Fields are read loosely: a field of the wrong type only matters to the
/// request that uses it.
#[derive(Debug, Clone)]
pub struct ClientMessage {
    fields: Map<String, Value>,
}

/// A classified inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Synthesize { text: String },
    GetVoices,
    Ping,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Synthesize { .. } => "synthesize",
            Request::GetVoices => "get_voices",
            Request::Ping => "ping",
        }
    }
}

impl ClientMessage {
    /// Parse a frame; anything but a JSON object is rejected.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        match serde_json::from_str::<Value>(frame)? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(ProtocolError::NotAnObject),
        }
    }

    /// Resolve the request id (generating one if absent) and classify.
    pub fn into_request(self) -> (String, Result<Request, ProtocolError>) {
        let request_id = match self.fields.get("request_id") {
            Some(Value::String(id)) => id.clone(),
            None | Some(Value::Null) => new_request_id(),
            Some(other) => other.to_string(),
        };
        let kind = match self.fields.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };
        let request = match kind.as_str() {
            "synthesize" => match self.fields.get("text") {
                Some(Value::String(text)) => Ok(Request::Synthesize { text: text.clone() }),
                None | Some(Value::Null) => Err(ProtocolError::MissingField("text")),
                Some(_) => Err(ProtocolError::InvalidField("text")),
            },
            "get_voices" => Ok(Request::GetVoices),
            "ping" => Ok(Request::Ping),
            _ => Err(ProtocolError::UnknownType(kind)),
        };
        (request_id, request)
    }
}

/// Outbound messages. Every variant carries `request_id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        request_id: String,
        connection_id: String,
        service: String,
        version: String,
        supported_formats: Vec<String>,
        voice_info: VoiceInfo,
        timestamp: f64,
    },
    VoiceInfo {
        request_id: String,
        data: VoiceInfo,
        timestamp: f64,
    },
    SynthesisStart {
        request_id: String,
        text_length: usize,
        timestamp: f64,
    },
    AudioChunk {
        request_id: String,
        chunk_index: u32,
        audio_data: String,
        chunk_size: usize,
        total_size: usize,
        is_final: bool,
        timestamp: f64,
    },
    SynthesisComplete {
        request_id: String,
        total_chunks: u32,
        total_size: usize,
        timestamp: f64,
    },
    Pong {
        request_id: String,
        timestamp: f64,
    },
    Error {
        request_id: String,
        message: String,
        timestamp: f64,
    },
}

impl ServerMessage {
    pub fn welcome(connection_id: &str, voice_info: &VoiceInfo) -> Self {
        ServerMessage::Welcome {
            request_id: new_request_id(),
            connection_id: connection_id.to_string(),
            service: SERVICE_NAME.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            supported_formats: SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect(),
            voice_info: voice_info.clone(),
            timestamp: timestamp(),
        }
    }

    pub fn voice_info(request_id: &str, data: &VoiceInfo) -> Self {
        ServerMessage::VoiceInfo {
            request_id: request_id.to_string(),
            data: data.clone(),
            timestamp: timestamp(),
        }
    }

    pub fn synthesis_start(request_id: &str, text_length: usize) -> Self {
        ServerMessage::SynthesisStart {
            request_id: request_id.to_string(),
            text_length,
            timestamp: timestamp(),
        }
    }

    pub fn audio_chunk(request_id: &str, chunk: &AudioChunk<'_>) -> Self {
        ServerMessage::AudioChunk {
            request_id: request_id.to_string(),
            chunk_index: chunk.index,
            audio_data: base64::engine::general_purpose::STANDARD.encode(chunk.data),
            chunk_size: chunk.data.len(),
            total_size: chunk.running_total,
            is_final: chunk.is_final,
            timestamp: timestamp(),
        }
    }

    pub fn synthesis_complete(request_id: &str, total_chunks: u32, total_size: usize) -> Self {
        ServerMessage::SynthesisComplete {
            request_id: request_id.to_string(),
            total_chunks,
            total_size,
            timestamp: timestamp(),
        }
    }

    pub fn pong(request_id: &str) -> Self {
        ServerMessage::Pong {
            request_id: request_id.to_string(),
            timestamp: timestamp(),
        }
    }

    pub fn error(request_id: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            request_id: request_id.to_string(),
            message: message.into(),
            timestamp: timestamp(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::VoiceInfo { .. } => "voice_info",
            ServerMessage::SynthesisStart { .. } => "synthesis_start",
            ServerMessage::AudioChunk { .. } => "audio_chunk",
            ServerMessage::SynthesisComplete { .. } => "synthesis_complete",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Error { .. } => "error",
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            ServerMessage::Welcome { request_id, .. }
            | ServerMessage::VoiceInfo { request_id, .. }
            | ServerMessage::SynthesisStart { request_id, .. }
            | ServerMessage::AudioChunk { request_id, .. }
            | ServerMessage::SynthesisComplete { request_id, .. }
            | ServerMessage::Pong { request_id, .. }
            | ServerMessage::Error { request_id, .. } => request_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
