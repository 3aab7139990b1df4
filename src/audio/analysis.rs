use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::features::FeatureFrameSet;
use crate::error::RenderError;

const N_FFT: usize = 2048;
/// Samples kept per frame for the waveform descriptor.
pub const WAVEFORM_POINTS: usize = 200;
pub const DEFAULT_BANDS: usize = 64;

const TOP_DB: f32 = 80.0;
const AMIN: f32 = 1e-10;
const NORM_EPSILON: f32 = 1e-6;

/// Extract amplitude, mel bands and waveform chunks at the video frame rate.
///
/// The three extractions run independently and are truncated to a common
/// length. A clip shorter than one hop fails with [`RenderError::AudioTooShort`].
pub fn analyze(
    samples: &[f32],
    sample_rate: u32,
    fps: u32,
    n_bands: usize,
) -> Result<FeatureFrameSet, RenderError> {
    if fps == 0 || sample_rate < fps {
        return Err(RenderError::Config(format!(
            "fps {} is incompatible with sample rate {}",
            fps, sample_rate
        )));
    }
    if n_bands == 0 {
        return Err(RenderError::Config("band count must be positive".into()));
    }

    let hop = (sample_rate / fps) as usize;
    if samples.len() / hop == 0 {
        return Err(RenderError::AudioTooShort {
            samples: samples.len(),
            sample_rate,
            fps,
        });
    }

    log::info!("Pass 1: Amplitude envelope (hop={})...", hop);
    let amplitude = amplitude_envelope(samples, hop);

    log::info!("Pass 2: Mel spectrum ({} bands)...", n_bands);
    let bands = mel_bands(samples, sample_rate, hop, n_bands);

    log::info!("Pass 3: Waveform chunks ({} points)...", WAVEFORM_POINTS);
    let waveform = waveform_chunks(samples, hop, WAVEFORM_POINTS);

    let features = FeatureFrameSet::from_parts(amplitude, bands, waveform);
    log::info!("Analysis complete: {} frames", features.len());
    Ok(features)
}

/// Peak magnitude per chunk, splitting the signal into `len / hop` chunks
/// where the first `len % n` chunks carry one extra sample.
fn amplitude_envelope(samples: &[f32], hop: usize) -> Vec<f32> {
    let n = samples.len() / hop;
    if n == 0 {
        return Vec::new();
    }

    let base = samples.len() / n;
    let extra = samples.len() % n;
    let mut envelope = Vec::with_capacity(n);
    let mut start = 0;

    for i in 0..n {
        let len = base + usize::from(i < extra);
        let chunk = &samples[start..start + len];
        let peak = chunk.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        envelope.push(peak.min(1.0));
        start += len;
    }

    envelope
}

fn mel_bands(samples: &[f32], sample_rate: u32, hop: usize, n_bands: usize) -> Vec<Vec<f32>> {
    // Centered frames: frame t covers [t*hop - N_FFT/2, t*hop + N_FFT/2)
    let n_frames = 1 + samples.len() / hop;
    let pad = N_FFT / 2;
    let window = hann_window(N_FFT);
    let filters = mel_filterbank(sample_rate, N_FFT, n_bands);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(N_FFT);

    let mel_power: Vec<Vec<f32>> = (0..n_frames)
        .into_par_iter()
        .map(|t| {
            let mut buffer = vec![Complex::new(0.0f32, 0.0); N_FFT];
            let origin = t * hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let pos = origin + i;
                if pos >= pad && pos - pad < samples.len() {
                    *slot = Complex::new(samples[pos - pad] * window[i], 0.0);
                }
            }
            fft.process(&mut buffer);

            let power: Vec<f32> = buffer[..=N_FFT / 2].iter().map(|c| c.norm_sqr()).collect();
            filters.iter().map(|f| f.apply(&power)).collect()
        })
        .collect();

    // power -> dB relative to the loudest cell, floored TOP_DB below the peak
    let ref_power = mel_power
        .iter()
        .flatten()
        .copied()
        .fold(0.0f32, f32::max)
        .max(AMIN);
    let ref_db = 10.0 * ref_power.log10();

    let mut db: Vec<Vec<f32>> = mel_power
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|p| 10.0 * p.max(AMIN).log10() - ref_db)
                .collect()
        })
        .collect();

    let max_db = db.iter().flatten().copied().fold(f32::NEG_INFINITY, f32::max);
    let floor = max_db - TOP_DB;
    for v in db.iter_mut().flatten() {
        *v = v.max(floor);
    }

    let min_db = db.iter().flatten().copied().fold(f32::INFINITY, f32::min);
    let range = max_db - min_db + NORM_EPSILON;
    for v in db.iter_mut().flatten() {
        *v = ((*v - min_db) / range).clamp(0.0, 1.0);
    }

    db
}

fn waveform_chunks(samples: &[f32], hop: usize, points: usize) -> Vec<Vec<f32>> {
    let n = samples.len() / hop;
    (0..n)
        .map(|i| {
            let start = i * hop;
            let end = (start + hop).min(samples.len());
            let chunk = &samples[start..end];
            if chunk.is_empty() {
                return vec![0.0; points];
            }
            let last = (chunk.len() - 1) as f64;
            let denom = (points.max(2) - 1) as f64;
            (0..points)
                .map(|k| {
                    let idx = (k as f64 * last / denom) as usize;
                    chunk[idx.min(chunk.len() - 1)]
                })
                .collect()
        })
        .collect()
}

/// Triangular mel filter over a contiguous run of FFT bins.
struct MelFilter {
    start: usize,
    weights: Vec<f32>,
}

impl MelFilter {
    fn apply(&self, power: &[f32]) -> f32 {
        self.weights
            .iter()
            .zip(&power[self.start..])
            .map(|(w, p)| w * p)
            .sum()
    }
}

/// Slaney-style mel filterbank with area normalisation.
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<MelFilter> {
    let n_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;
    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|i| i as f64 * nyquist / (n_bins - 1) as f64)
        .collect();

    let min_mel = hz_to_mel(0.0);
    let max_mel = hz_to_mel(nyquist);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (right - left);
            let dense: Vec<f32> = fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - left) / (center - left);
                    let falling = (right - f) / (right - center);
                    (rising.min(falling).max(0.0) * enorm) as f32
                })
                .collect();

            let start = dense.iter().position(|&w| w > 0.0).unwrap_or(0);
            let end = dense
                .iter()
                .rposition(|&w| w > 0.0)
                .map_or(start, |i| i + 1);
            MelFilter {
                start,
                weights: dense[start..end].to_vec(),
            }
        })
        .collect()
}

const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;
const MEL_MIN_LOG_MEL: f64 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_log_step() -> f64 {
    6.4f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        mel * MEL_F_SP
    }
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}
