use std::path::Path;

use serde::{Deserialize, Serialize};

/// Rate the engines treat as "natural speed", in words per minute.
pub const NATURAL_RATE_WPM: u32 = 150;

/// A voice the engine can speak with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub id: usize,
    pub name: String,
}

/// Process-wide voice settings, applied once when the adapter starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Words per minute.
    pub rate: u32,
    /// 0.0 ..= 1.0
    pub volume: f32,
    pub voice_index: usize,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            rate: NATURAL_RATE_WPM,
            volume: 0.9,
            voice_index: 0,
        }
    }
}

/// Snapshot of the engine configuration reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub rate: u32,
    pub volume: f32,
    pub voice_index: usize,
    pub current_voice: String,
    pub available_voices: usize,
    pub voices: Vec<VoiceDescriptor>,
}

impl VoiceInfo {
    pub fn new(params: VoiceParams, voices: Vec<VoiceDescriptor>) -> Self {
        let current_voice = voices
            .get(params.voice_index)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        Self {
            rate: params.rate,
            volume: params.volume,
            voice_index: params.voice_index,
            current_voice,
            available_voices: voices.len(),
            voices,
        }
    }
}

/// Blocking text-to-speech engine.
///
/// Implementations are not assumed to be reentrant; the adapter owns the
/// engine on a single worker thread and never calls it concurrently.
pub trait SpeechEngine: Send + 'static {
    fn set_rate(&mut self, rate: u32) -> anyhow::Result<()>;

    fn set_volume(&mut self, volume: f32) -> anyhow::Result<()>;

    /// Select a voice by its index in [`SpeechEngine::voices`].
    fn set_voice(&mut self, index: usize) -> anyhow::Result<()>;

    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Synthesize `text` and write the encoded audio to `path`.
    fn synthesize_to_file(&mut self, text: &str, path: &Path) -> anyhow::Result<()>;

    /// Release engine resources. Called once, from the worker, on shutdown.
    fn stop(&mut self);
}
