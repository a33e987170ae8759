//! Common utilities for integration and e2e tests

#![allow(dead_code)]

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tts_core::{SpeechEngine, VoiceDescriptor};
use tts_gateway::{GatewayError, Server, ServerConfig};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Text containing this marker makes [`ToneEngine`] fail.
pub const FAIL_MARKER: &str = "FAIL";

/// Deterministic stand-in for a real speech engine.
#[derive(Debug, Clone, Default)]
pub struct ToneEngine {
    pub delay: Duration,
}

impl ToneEngine {
    pub fn slow(delay: Duration) -> Self {
        Self { delay }
    }
}

/// The exact bytes [`ToneEngine`] writes for `text`.
pub fn expected_audio(text: &str) -> Vec<u8> {
    let mut audio = b"RIFF".to_vec();
    let body = text.as_bytes();
    let target = 3000 + body.len() * 97;
    while audio.len() < target {
        audio.extend_from_slice(body);
    }
    audio.truncate(target);
    audio
}

impl SpeechEngine for ToneEngine {
    fn set_rate(&mut self, _rate: u32) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_volume(&mut self, _volume: f32) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_voice(&mut self, index: usize) -> anyhow::Result<()> {
        if index >= 2 {
            anyhow::bail!("no voice {index}");
        }
        Ok(())
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        vec![
            VoiceDescriptor { id: 0, name: "tone-low".into() },
            VoiceDescriptor { id: 1, name: "tone-high".into() },
        ]
    }

    fn synthesize_to_file(&mut self, text: &str, path: &Path) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        if text.contains(FAIL_MARKER) {
            anyhow::bail!("tone generator jammed");
        }
        std::fs::write(path, expected_audio(text))?;
        Ok(())
    }

    fn stop(&mut self) {}
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub server: Arc<Server>,
    pub task: JoinHandle<Result<(), GatewayError>>,
    pub scratch: tempfile::TempDir,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

pub fn test_config(scratch: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        chunk_size: 1024,
        chunk_delay_ms: 0,
        shutdown_grace_secs: 2,
        scratch_dir: Some(scratch.to_path_buf()),
        ..ServerConfig::default()
    }
}

/// Build a server around [`ToneEngine`] without binding it.
pub fn build_server(engine: ToneEngine) -> (Server, tempfile::TempDir) {
    let scratch = tempfile::tempdir().unwrap();
    let server = Server::with_engine(test_config(scratch.path()), engine).unwrap();
    (server, scratch)
}

pub async fn spawn_server() -> TestServer {
    spawn_server_with(ToneEngine::default()).await
}

pub async fn spawn_server_with(engine: ToneEngine) -> TestServer {
    let (server, scratch) = build_server(engine);
    let server = Arc::new(server);
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let running = server.clone();
    let task = tokio::spawn(async move { running.serve(listener).await });

    TestServer { addr, server, task, scratch }
}

pub async fn connect(server: &TestServer) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(server.url()).await.unwrap();
    ws
}

/// Connect and consume the welcome message.
pub async fn connect_welcomed(server: &TestServer) -> (WsClient, Value) {
    let mut ws = connect(server).await;
    let welcome = recv_json(&mut ws).await;
    assert_eq!(welcome["type"], "welcome");
    (ws, welcome)
}

pub async fn send_raw(ws: &mut WsClient, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

pub async fn send_json(ws: &mut WsClient, value: Value) {
    send_raw(ws, &value.to_string()).await;
}

/// Next text frame as JSON. Panics on close or timeout.
pub async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let message = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection closed")
            .expect("websocket error");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(_) => panic!("server closed the connection"),
            _ => continue,
        }
    }
}

/// Messages up to and including the first one whose type is in `terminal`.
pub async fn recv_until(ws: &mut WsClient, terminal: &[&str]) -> Vec<Value> {
    let mut out = Vec::new();
    loop {
        let message = recv_json(ws).await;
        let done = terminal.contains(&message["type"].as_str().unwrap_or_default());
        out.push(message);
        if done {
            return out;
        }
    }
}

/// Check one request's stream and return the reassembled audio.
pub fn assert_well_formed_stream(messages: &[Value], request_id: &str) -> Vec<u8> {
    use base64::Engine;

    assert_eq!(messages.first().unwrap()["type"], "synthesis_start");
    let complete = messages.last().unwrap();
    assert_eq!(complete["type"], "synthesis_complete");

    let chunks: Vec<&Value> = messages[1..messages.len() - 1].iter().collect();
    assert!(!chunks.is_empty());

    let mut audio = Vec::new();
    let mut running = 0u64;
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk["type"], "audio_chunk");
        assert_eq!(chunk["request_id"], request_id);
        assert_eq!(chunk["chunk_index"].as_u64().unwrap(), i as u64 + 1);

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(chunk["audio_data"].as_str().unwrap())
            .unwrap();
        assert_eq!(chunk["chunk_size"].as_u64().unwrap(), bytes.len() as u64);
        running += bytes.len() as u64;
        assert_eq!(chunk["total_size"].as_u64().unwrap(), running);
        assert_eq!(chunk["is_final"].as_bool().unwrap(), i == chunks.len() - 1);
        audio.extend_from_slice(&bytes);
    }

    assert_eq!(complete["request_id"], request_id);
    assert_eq!(complete["total_chunks"].as_u64().unwrap(), chunks.len() as u64);
    assert_eq!(complete["total_size"].as_u64().unwrap(), running);
    audio
}
