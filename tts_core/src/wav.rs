use std::path::Path;

use anyhow::Context;

use crate::engine::NATURAL_RATE_WPM;

/// Write f32 samples in [-1.0, 1.0] as 16-bit mono PCM WAV.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    const I16_MAX_F32: f32 = i16::MAX as f32;
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16;
        writer
            .write_sample(v)
            .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
    }
    writer
        .finalize()
        .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    Ok(())
}

/// Scale samples by `volume` (0.0 ..= 1.0).
pub fn apply_volume(samples: &mut [f32], volume: f32) {
    let volume = volume.clamp(0.0, 1.0);
    if (volume - 1.0).abs() < f32::EPSILON {
        return;
    }
    for s in samples.iter_mut() {
        *s *= volume;
    }
}

/// Speed the utterance up or down to match `rate` words per minute.
///
/// Linear-interpolation resampling; pitch shifts with speed.
pub fn apply_rate(samples: &[f32], rate: u32) -> Vec<f32> {
    if rate == 0 || rate == NATURAL_RATE_WPM || samples.len() < 2 {
        return samples.to_vec();
    }
    let speed = rate as f64 / NATURAL_RATE_WPM as f64;
    let out_len = ((samples.len() as f64) / speed).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * speed;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = (pos - lo as f64) as f32;
            samples[lo] + (samples[hi] - samples[lo]) * frac
        })
        .collect()
}
