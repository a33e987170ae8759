//! Command-line client for the TTS gateway.
//!
//! ```bash
//! tts-client --text "Hello there" --output hello.wav
//! tts-client --ping
//! tts-client --voices
//! ```

use std::path::PathBuf;

use anyhow::Context;
use base64::Engine;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tts-client")]
#[command(about = "Send text to a TTS gateway and save the streamed audio")]
struct Args {
    /// Gateway URL
    #[arg(long, default_value = "ws://localhost:8765", env = "TTS_GATEWAY_URL")]
    url: String,

    /// Text to synthesize
    #[arg(short, long)]
    text: Option<String>,

    /// Where to write the received audio
    #[arg(short, long, default_value = "output.wav")]
    output: PathBuf,

    /// Request id to send (generated by the server when omitted)
    #[arg(long)]
    request_id: Option<String>,

    /// Send a ping instead of a synthesis request
    #[arg(long)]
    ping: bool,

    /// Ask for the voice list instead of a synthesis request
    #[arg(long)]
    voices: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let (ws, _) = tokio_tungstenite::connect_async(args.url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", args.url))?;
    let (mut write, mut read) = ws.split();

    let welcome = next_json(&mut read).await?;
    info!("Server welcome: {welcome}");

    let mut request = if args.ping {
        json!({ "type": "ping" })
    } else if args.voices {
        json!({ "type": "get_voices" })
    } else {
        let text = args
            .text
            .clone()
            .context("--text is required unless --ping or --voices is given")?;
        json!({ "type": "synthesize", "text": text })
    };
    if let Some(id) = &args.request_id {
        request["request_id"] = json!(id);
    }
    write.send(Message::Text(request.to_string().into())).await?;

    let mut audio: Vec<u8> = Vec::new();
    let mut chunks: u64 = 0;
    loop {
        let message = next_json(&mut read).await?;
        match message["type"].as_str().unwrap_or_default() {
            "pong" => {
                info!("pong for request {}", message["request_id"]);
                break;
            }
            "voice_info" => {
                println!("{}", serde_json::to_string_pretty(&message["data"])?);
                break;
            }
            "synthesis_start" => info!("Synthesis started, text length {}", message["text_length"]),
            "audio_chunk" => {
                chunks += 1;
                let index = message["chunk_index"].as_u64().unwrap_or_default();
                if index != chunks {
                    warn!("Chunk {index} arrived, expected {chunks}");
                }
                let data = message["audio_data"].as_str().unwrap_or_default();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .context("audio_data is not valid base64")?;
                audio.extend_from_slice(&bytes);
            }
            "synthesis_complete" => {
                let declared_chunks = message["total_chunks"].as_u64().unwrap_or_default();
                let declared_size = message["total_size"].as_u64().unwrap_or_default();
                if declared_chunks != chunks || declared_size != audio.len() as u64 {
                    anyhow::bail!(
                        "Server declared {declared_chunks} chunks / {declared_size} bytes, received {chunks} / {}",
                        audio.len()
                    );
                }
                std::fs::write(&args.output, &audio)
                    .with_context(|| format!("Failed to write {}", args.output.display()))?;
                info!("Wrote {} bytes in {chunks} chunks to {}", audio.len(), args.output.display());
                break;
            }
            "error" => anyhow::bail!("Server error: {}", message["message"]),
            other => warn!("Ignoring message of type {other:?}"),
        }
    }

    let _ = write.send(Message::Close(None)).await;
    Ok(())
}

async fn next_json<S>(read: &mut S) -> anyhow::Result<Value>
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
            Message::Close(_) => break,
            _ => continue,
        }
    }
    anyhow::bail!("Connection closed by server")
}
