//! Speech synthesis building blocks for the streaming TTS gateway.
//!
//! [`SynthesisAdapter`] owns a blocking [`SpeechEngine`] and serves jobs off
//! the async runtime; [`AudioChunks`] slices the resulting audio for the wire.

pub mod adapter;
pub mod chunk;
pub mod engine;
pub mod error;
pub mod piper;
mod wav;

pub use adapter::{AdapterOptions, SynthesisAdapter};
pub use chunk::{AudioChunk, AudioChunks, DEFAULT_CHUNK_SIZE};
pub use engine::{SpeechEngine, VoiceDescriptor, VoiceInfo, VoiceParams, NATURAL_RATE_WPM};
pub use error::SynthesisError;
pub use piper::{PiperEngine, VoiceModel};
pub use wav::write_wav;
