//! Harmonic/percussive source separation
//!
//! Median filtering of the magnitude spectrogram: along time it keeps
//! sustained partials (harmonic), along frequency it keeps broadband
//! transients (percussive). Soft masks built from both are applied to the
//! complex STFT and inverted. With a margin above 1.0 a bin has to dominate
//! by that factor to be assigned, and the remainder is discarded.

use crate::stft::Stft;
use rustfft::num_complex::Complex;

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;
/// Median kernel length in frames (time) and bins (frequency)
const KERNEL: usize = 31;

/// Separated components, each the same length as the input
#[derive(Debug, Clone)]
pub struct Separation {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
}

/// Split `samples` into harmonic and percussive components
pub fn decompose(samples: &[f32], margin: f32) -> Separation {
    let stft = Stft::new(FFT_SIZE, HOP_SIZE);
    let mut spectrum = stft.forward(samples);
    if spectrum.is_empty() {
        return Separation {
            harmonic: vec![0.0; samples.len()],
            percussive: vec![0.0; samples.len()],
        };
    }

    let magnitude = magnitudes(&spectrum);
    let harmonic_env = median_over_time(&magnitude, KERNEL);
    let percussive_env = median_over_frequency(&magnitude, KERNEL);
    drop(magnitude);

    let margin = margin.max(1.0);
    let mut percussive_spec = spectrum.clone();
    for (f, (h_frame, p_frame)) in spectrum.iter_mut().zip(percussive_spec.iter_mut()).enumerate() {
        for (k, (h_bin, p_bin)) in h_frame.iter_mut().zip(p_frame.iter_mut()).enumerate() {
            let h = harmonic_env[f][k];
            let p = percussive_env[f][k];
            *h_bin *= soft_mask(h, margin * p);
            *p_bin *= soft_mask(p, margin * h);
        }
    }

    Separation {
        harmonic: stft.inverse(&spectrum, samples.len()),
        percussive: stft.inverse(&percussive_spec, samples.len()),
    }
}

/// Harmonic component only
///
/// The percussive envelope is computed one frame at a time and the mask is
/// applied in place, so only one inverse transform runs.
pub fn harmonic(samples: &[f32], margin: f32) -> Vec<f32> {
    let stft = Stft::new(FFT_SIZE, HOP_SIZE);
    let mut spectrum = stft.forward(samples);
    if spectrum.is_empty() {
        return vec![0.0; samples.len()];
    }

    let magnitude = magnitudes(&spectrum);
    let harmonic_env = median_over_time(&magnitude, KERNEL);

    let margin = margin.max(1.0);
    let mut scratch = Vec::with_capacity(KERNEL);
    for ((frame, mag), h_env) in spectrum.iter_mut().zip(&magnitude).zip(&harmonic_env) {
        let p_env = frame_median(mag, KERNEL, &mut scratch);
        for ((bin, &h), &p) in frame.iter_mut().zip(h_env).zip(&p_env) {
            *bin *= soft_mask(h, margin * p);
        }
    }
    drop(magnitude);
    drop(harmonic_env);

    stft.inverse(&spectrum, samples.len())
}

fn magnitudes(spectrum: &[Vec<Complex<f32>>]) -> Vec<Vec<f32>> {
    spectrum
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect()
}

/// Wiener-style mask `x^2 / (x^2 + reference^2)`
#[inline]
fn soft_mask(x: f32, reference: f32) -> f32 {
    let x2 = x * x;
    let denom = x2 + reference * reference;
    if denom > f32::MIN_POSITIVE {
        x2 / denom
    } else {
        0.0
    }
}

/// Median of each bin across neighbouring frames
fn median_over_time(magnitude: &[Vec<f32>], kernel: usize) -> Vec<Vec<f32>> {
    let frames = magnitude.len();
    let bins = magnitude[0].len();
    let half = kernel / 2;
    let mut out = vec![vec![0.0f32; bins]; frames];
    let mut scratch = Vec::with_capacity(kernel);

    for k in 0..bins {
        for f in 0..frames {
            scratch.clear();
            let lo = f.saturating_sub(half);
            let hi = (f + half + 1).min(frames);
            scratch.extend(magnitude[lo..hi].iter().map(|frame| frame[k]));
            out[f][k] = median(&mut scratch);
        }
    }
    out
}

/// Median of each frame across neighbouring bins
fn median_over_frequency(magnitude: &[Vec<f32>], kernel: usize) -> Vec<Vec<f32>> {
    let mut scratch = Vec::with_capacity(kernel);
    magnitude
        .iter()
        .map(|frame| frame_median(frame, kernel, &mut scratch))
        .collect()
}

/// Median of one frame across neighbouring bins
fn frame_median(frame: &[f32], kernel: usize, scratch: &mut Vec<f32>) -> Vec<f32> {
    let half = kernel / 2;
    (0..frame.len())
        .map(|k| {
            scratch.clear();
            let lo = k.saturating_sub(half);
            let hi = (k + half + 1).min(frame.len());
            scratch.extend_from_slice(&frame[lo..hi]);
            median(scratch)
        })
        .collect()
}

/// Median via partial sort; window edges shrink the window instead of padding
fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}
