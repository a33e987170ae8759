//! Off-runtime access to a blocking [`SpeechEngine`].
//!
//! The engine is moved onto one dedicated worker thread. Sessions submit
//! jobs through a bounded FIFO queue and await the result on a oneshot, so a
//! slow synthesis never blocks the async runtime and the engine is never
//! entered by two jobs at once.

use std::{
    fs,
    io::ErrorKind,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{Mutex, RwLock},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::engine::{SpeechEngine, VoiceInfo, VoiceParams};
use crate::error::SynthesisError;

/// File name the engine writes inside each job's scratch directory.
pub const SCRATCH_ARTIFACT: &str = "synthesis.wav";

const SCRATCH_PREFIX: &str = "tts-scratch-";

#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Jobs that may wait for the engine before submitters start queueing.
    pub queue_depth: usize,
    /// Upper bound on queueing plus synthesis. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Where scratch directories are created; system temp dir when `None`.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            timeout: None,
            scratch_dir: None,
        }
    }
}

struct Job {
    text: String,
    reply: oneshot::Sender<Result<Vec<u8>, SynthesisError>>,
}

pub struct SynthesisAdapter {
    jobs: RwLock<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    voice_info: VoiceInfo,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for SynthesisAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisAdapter")
            .field("voice_info", &self.voice_info)
            .field("timeout", &self.timeout)
            .field("running", &self.is_running())
            .finish()
    }
}

impl SynthesisAdapter {
    /// Configure `engine` with `params` and hand it to the worker thread.
    ///
    /// Rate and volume failures are fatal, and so is a voice that exists but
    /// cannot be selected. An out-of-range voice index is logged, the engine
    /// keeps its default voice and `current_voice` reports "Unknown".
    pub fn start<E: SpeechEngine>(
        mut engine: E,
        params: VoiceParams,
        options: AdapterOptions,
    ) -> Result<Self, SynthesisError> {
        engine.set_rate(params.rate)?;
        engine.set_volume(params.volume)?;
        let available = engine.voices().len();
        if params.voice_index < available {
            engine.set_voice(params.voice_index)?;
        } else {
            warn!(
                "Voice index {} out of range ({available} voices), keeping default voice",
                params.voice_index
            );
        }

        let voice_info = VoiceInfo::new(params, engine.voices());
        info!("Speech engine ready with {} voice(s)", voice_info.available_voices);
        for voice in &voice_info.voices {
            info!("Voice {}: {}", voice.id, voice.name);
        }

        let (tx, rx) = mpsc::channel(options.queue_depth.max(1));
        let scratch_dir = options.scratch_dir;
        let worker = std::thread::Builder::new()
            .name("tts-engine".into())
            .spawn(move || run_worker(engine, rx, scratch_dir))
            .map_err(|e| SynthesisError::Engine(format!("failed to spawn engine worker: {e}")))?;

        Ok(Self {
            jobs: RwLock::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            voice_info,
            timeout: options.timeout,
        })
    }

    pub fn voice_info(&self) -> &VoiceInfo {
        &self.voice_info
    }

    pub fn is_running(&self) -> bool {
        self.jobs.read().map(|j| j.is_some()).unwrap_or(false)
    }

    /// Synthesize `text` into encoded audio bytes.
    ///
    /// `text` must already be validated. Waits in FIFO order behind other
    /// submitters; never returns empty audio as success.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let jobs = self.sender()?;
        let job = async move {
            let (reply, rx) = oneshot::channel();
            jobs.send(Job { text: text.to_string(), reply })
                .await
                .map_err(|_| SynthesisError::Unavailable)?;
            rx.await.map_err(|_| SynthesisError::Unavailable)?
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, job)
                .await
                .map_err(|_| SynthesisError::Timeout(limit))?,
            None => job.await,
        }
    }

    /// Stop accepting jobs, let queued ones finish, release the engine.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let sender = self.jobs.write().ok().and_then(|mut j| j.take());
        if sender.is_none() {
            return;
        }
        drop(sender);

        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => info!("Speech engine stopped"),
                Ok(Err(_)) => error!("Speech engine worker panicked during shutdown"),
                Err(e) => error!("Task join error: {e}"),
            }
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Job>, SynthesisError> {
        self.jobs
            .read()
            .map_err(|_| SynthesisError::Unavailable)?
            .clone()
            .ok_or(SynthesisError::Unavailable)
    }
}

impl Drop for SynthesisAdapter {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain and stop the engine.
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.take();
        }
    }
}

fn run_worker<E: SpeechEngine>(
    mut engine: E,
    mut jobs: mpsc::Receiver<Job>,
    scratch_dir: Option<PathBuf>,
) {
    while let Some(Job { text, reply }) = jobs.blocking_recv() {
        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            synthesize_job(&mut engine, &text, scratch_dir.as_deref())
        }))
        .unwrap_or_else(|_| {
            error!("Speech engine panicked");
            Err(SynthesisError::Panicked)
        });

        match &result {
            Ok(audio) => debug!(
                bytes = audio.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Synthesis finished"
            ),
            Err(e) => warn!("Synthesis failed: {e}"),
        }

        if reply.send(result).is_err() {
            debug!("Requester went away before synthesis finished");
        }
    }
    engine.stop();
}

/// Run one job inside its own scratch directory.
///
/// The directory is removed when `scratch` drops, on every return path and
/// during unwinding.
fn synthesize_job<E: SpeechEngine>(
    engine: &mut E,
    text: &str,
    scratch_dir: Option<&Path>,
) -> Result<Vec<u8>, SynthesisError> {
    let scratch = match scratch_dir {
        Some(root) => tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir_in(root)?,
        None => tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?,
    };
    let artifact = scratch.path().join(SCRATCH_ARTIFACT);

    engine.synthesize_to_file(text, &artifact)?;

    let audio = match fs::read(&artifact) {
        Ok(audio) => audio,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(SynthesisError::MissingOutput),
        Err(e) => return Err(e.into()),
    };
    if audio.is_empty() {
        return Err(SynthesisError::EmptyOutput);
    }
    Ok(audio)
}
