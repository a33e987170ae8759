//! Chunked delivery of synthesized audio over a session.

use std::time::{Duration, Instant};

use tracing::{debug, info};
use tts_core::{AudioChunks, SynthesisAdapter};

use crate::error::{RequestError, TransportError};
use crate::metrics::GatewayMetrics;
use crate::protocol::ServerMessage;
use crate::transport::MessageSink;

/// What was actually put on the wire for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub total_chunks: u32,
    pub total_size: usize,
}

#[derive(Debug, Clone)]
pub struct ChunkStreamer {
    chunk_size: usize,
    pacing: Duration,
}

impl ChunkStreamer {
    pub fn new(chunk_size: usize, pacing: Duration) -> Self {
        Self { chunk_size, pacing }
    }

    /// `synthesis_start`, synthesis, chunks, `synthesis_complete`.
    ///
    /// On a synthesis failure nothing after `synthesis_start` is sent and the
    /// error is returned for the router to report. `text` must be validated.
    pub async fn synthesize_and_stream<S: MessageSink>(
        &self,
        sink: &mut S,
        adapter: &SynthesisAdapter,
        metrics: &GatewayMetrics,
        request_id: &str,
        text: &str,
    ) -> Result<StreamSummary, RequestError> {
        let text_length = text.chars().count();
        sink.send(ServerMessage::synthesis_start(request_id, text_length))
            .await?;
        info!(request_id, text_length, "Synthesis started");

        let started = Instant::now();
        let audio = adapter.synthesize(text).await?;
        metrics
            .synthesis_latency
            .record(started.elapsed().as_millis() as u64);

        let summary = self.stream(sink, metrics, request_id, &audio).await?;
        info!(
            request_id,
            total_chunks = summary.total_chunks,
            total_size = summary.total_size,
            "Audio stream complete"
        );
        Ok(summary)
    }

    /// Send `audio` as numbered chunks followed by `synthesis_complete`.
    ///
    /// The totals in `synthesis_complete` are counted from the chunks that
    /// were sent, not derived from the buffer length.
    pub async fn stream<S: MessageSink>(
        &self,
        sink: &mut S,
        metrics: &GatewayMetrics,
        request_id: &str,
        audio: &[u8],
    ) -> Result<StreamSummary, TransportError> {
        let mut summary = StreamSummary { total_chunks: 0, total_size: 0 };

        for chunk in AudioChunks::new(audio, self.chunk_size) {
            sink.send(ServerMessage::audio_chunk(request_id, &chunk)).await?;
            summary.total_chunks += 1;
            summary.total_size += chunk.data.len();
            metrics.record_chunk(chunk.data.len());
            debug!(request_id, chunk_index = chunk.index, size = chunk.data.len(), "Chunk sent");

            if !chunk.is_final && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        sink.send(ServerMessage::synthesis_complete(
            request_id,
            summary.total_chunks,
            summary.total_size,
        ))
        .await?;
        Ok(summary)
    }
}
