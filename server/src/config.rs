// Configuration for the gateway process, loaded once at startup.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use tts_core::{AdapterOptions, VoiceParams, DEFAULT_CHUNK_SIZE, NATURAL_RATE_WPM};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rate: u32,
    pub volume: f32,
    pub voice_index: usize,
    pub chunk_size: usize,
    pub max_message_size: usize,
    pub chunk_delay_ms: u64,
    pub synthesis_timeout_secs: Option<u64>,
    pub queue_depth: usize,
    pub shutdown_grace_secs: u64,
    pub voice_map: PathBuf,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            rate: NATURAL_RATE_WPM,
            volume: 0.9,
            voice_index: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: 10 * 1024 * 1024,
            chunk_delay_ms: 1,
            synthesis_timeout_secs: None,
            queue_depth: 64,
            shutdown_grace_secs: 5,
            voice_map: PathBuf::from("models/map.json"),
            scratch_dir: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let rate = env_parse("TTS_RATE")
            .filter(|r: &u32| *r > 0)
            .unwrap_or(defaults.rate);

        let volume = env_parse::<f32>("TTS_VOLUME")
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(defaults.volume);

        let voice_index = env_parse("TTS_VOICE_INDEX").unwrap_or(defaults.voice_index);

        let chunk_size = env_parse("CHUNK_SIZE")
            .filter(|c: &usize| *c > 0)
            .unwrap_or(defaults.chunk_size);

        let max_message_size = env_parse("MAX_MESSAGE_SIZE")
            .filter(|m: &usize| *m > 0)
            .unwrap_or(defaults.max_message_size);

        let chunk_delay_ms = env_parse("CHUNK_DELAY_MS").unwrap_or(defaults.chunk_delay_ms);

        let synthesis_timeout_secs = env_parse("SYNTHESIS_TIMEOUT_SECS").filter(|t: &u64| *t > 0);

        let queue_depth = env_parse("SYNTHESIS_QUEUE_DEPTH")
            .filter(|q: &usize| *q > 0)
            .unwrap_or(defaults.queue_depth);

        let shutdown_grace_secs =
            env_parse("SHUTDOWN_GRACE_SECS").unwrap_or(defaults.shutdown_grace_secs);

        let voice_map = std::env::var("VOICE_MAP")
            .ok()
            .map(PathBuf::from)
            .unwrap_or(defaults.voice_map);

        let scratch_dir = std::env::var("SCRATCH_DIR")
            .ok()
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);

        Self {
            host,
            port,
            rate,
            volume,
            voice_index,
            chunk_size,
            max_message_size,
            chunk_delay_ms,
            synthesis_timeout_secs,
            queue_depth,
            shutdown_grace_secs,
            voice_map,
            scratch_dir,
        }
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}:{}: {e}", self.host, self.port))
    }

    pub fn voice_params(&self) -> VoiceParams {
        VoiceParams {
            rate: self.rate,
            volume: self.volume,
            voice_index: self.voice_index,
        }
    }

    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            queue_depth: self.queue_depth,
            timeout: self.synthesis_timeout_secs.map(Duration::from_secs),
            scratch_dir: self.scratch_dir.clone(),
        }
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
