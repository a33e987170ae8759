//! [`SpeechEngine`] backed by Piper ONNX voices.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use tracing::{info, warn};

use crate::engine::{SpeechEngine, VoiceDescriptor, NATURAL_RATE_WPM};
use crate::wav;

/// One entry of the voice map.
#[derive(Debug, Clone)]
pub struct VoiceModel {
    pub name: String,
    pub config: PathBuf,
}

struct LoadedVoice {
    index: usize,
    synth: PiperSpeechSynthesizer,
    sample_rate: u32,
}

pub struct PiperEngine {
    voices: Vec<VoiceModel>,
    rate: u32,
    volume: f32,
    voice_index: usize,
    loaded: Option<LoadedVoice>,
}

impl std::fmt::Debug for PiperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiperEngine")
            .field("voices", &self.voices)
            .field("rate", &self.rate)
            .field("volume", &self.volume)
            .field("voice_index", &self.voice_index)
            .field("loaded", &self.loaded.as_ref().map(|l| l.index))
            .finish()
    }
}

impl PiperEngine {
    /// Build from a voice list and load the selected voice eagerly.
    ///
    /// An out-of-range `voice_index` falls back to the first voice.
    pub fn new(voices: Vec<VoiceModel>, voice_index: usize) -> anyhow::Result<Self> {
        if voices.is_empty() {
            anyhow::bail!("no Piper voices configured");
        }
        let voice_index = if voice_index < voices.len() {
            voice_index
        } else {
            warn!("Voice index {voice_index} out of range, loading voice 0");
            0
        };
        let mut engine = Self {
            voices,
            rate: NATURAL_RATE_WPM,
            volume: 1.0,
            voice_index,
            loaded: None,
        };
        engine.ensure_loaded()?;
        Ok(engine)
    }

    /// Load from a voice map such as `models/map.json`.
    ///
    /// Entries are either `"name": "path/to/voice.onnx.json"` or
    /// `"name": { "config": "...", "display_name": "..." }`; voices are
    /// indexed in key order.
    pub fn from_map_file<P: AsRef<Path>>(p: P, voice_index: usize) -> anyhow::Result<Self> {
        Self::new(Self::read_voice_map(p)?, voice_index)
    }

    pub fn read_voice_map<P: AsRef<Path>>(p: P) -> anyhow::Result<Vec<VoiceModel>> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        parse_voice_map(&text)
    }

    fn read_sample_rate(cfg_path: &Path) -> anyhow::Result<u32> {
        let text = fs::read_to_string(cfg_path)
            .with_context(|| format!("Failed to read config file: {}", cfg_path.display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;

        let sample_rate = json
            .get("audio")
            .and_then(|a| a.get("sample_rate"))
            .and_then(|sr| sr.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;

        Ok(sample_rate as u32)
    }

    fn ensure_loaded(&mut self) -> anyhow::Result<&LoadedVoice> {
        let stale = self.loaded.as_ref().map_or(true, |l| l.index != self.voice_index);
        if stale {
            let voice = &self.voices[self.voice_index];
            let sample_rate = Self::read_sample_rate(&voice.config)?;
            let model = piper_rs::from_config_path(&voice.config)
                .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
            let synth = PiperSpeechSynthesizer::new(model)?;
            info!(voice = %voice.name, sample_rate, "Loaded Piper voice");
            self.loaded = Some(LoadedVoice {
                index: self.voice_index,
                synth,
                sample_rate,
            });
        }
        self.loaded
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Piper voice not loaded"))
    }
}

impl SpeechEngine for PiperEngine {
    fn set_rate(&mut self, rate: u32) -> anyhow::Result<()> {
        if rate == 0 {
            anyhow::bail!("rate must be positive");
        }
        self.rate = rate;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            anyhow::bail!("volume {volume} outside 0.0..=1.0");
        }
        self.volume = volume;
        Ok(())
    }

    fn set_voice(&mut self, index: usize) -> anyhow::Result<()> {
        if index >= self.voices.len() {
            anyhow::bail!("voice index {index} out of range ({} voices)", self.voices.len());
        }
        let previous = self.voice_index;
        self.voice_index = index;
        if let Err(e) = self.ensure_loaded() {
            warn!("Could not load voice {index}: {e:#}");
            self.voice_index = previous;
            return Err(e);
        }
        Ok(())
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices
            .iter()
            .enumerate()
            .map(|(id, v)| VoiceDescriptor { id, name: v.name.clone() })
            .collect()
    }

    fn synthesize_to_file(&mut self, text: &str, path: &Path) -> anyhow::Result<()> {
        let (rate, volume) = (self.rate, self.volume);
        let voice = self.ensure_loaded()?;

        let iter: PiperSpeechStreamParallel = voice
            .synth
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        for part in iter {
            samples.extend(
                part.map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                    .into_vec(),
            );
        }

        let mut samples = wav::apply_rate(&samples, rate);
        wav::apply_volume(&mut samples, volume);
        wav::write_wav(path, &samples, voice.sample_rate)
    }

    fn stop(&mut self) {
        if self.loaded.take().is_some() {
            info!("Piper voice released");
        }
    }
}

fn parse_voice_map(text: &str) -> anyhow::Result<Vec<VoiceModel>> {
    let json: serde_json::Value =
        serde_json::from_str(text).with_context(|| "voice map is not valid JSON")?;
    let obj = json
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("voice map must be a JSON object"))?;

    // BTreeMap keeps voice indices stable across runs.
    let mut voices = BTreeMap::new();
    for (key, v) in obj {
        let model = match v {
            serde_json::Value::String(path) => VoiceModel {
                name: key.clone(),
                config: PathBuf::from(path),
            },
            serde_json::Value::Object(o) => {
                let config = o
                    .get("config")
                    .and_then(|x| x.as_str())
                    .ok_or_else(|| anyhow::anyhow!("missing 'config' for voice {}", key))?;
                let name = o
                    .get("display_name")
                    .and_then(|x| x.as_str())
                    .unwrap_or(key)
                    .to_string();
                VoiceModel {
                    name,
                    config: PathBuf::from(config),
                }
            }
            _ => {
                return Err(anyhow::anyhow!(
                    "invalid entry for voice {} (expected string or object)",
                    key
                ));
            }
        };
        voices.insert(key.clone(), model);
    }
    Ok(voices.into_values().collect())
}
