//! Tempo estimation
//!
//! The key pipeline only needs a scalar BPM, so tempo sits behind a trait.
//! The default estimator builds a spectral-flux onset function and picks
//! the strongest autocorrelation lag in the 70-180 BPM range.

use crate::stft::Stft;

/// Anything that can turn mono PCM into a BPM estimate
pub trait TempoEstimator: Send + Sync {
    /// `None` when no periodic pulse is found
    fn estimate_bpm(&self, samples: &[f32], sample_rate: u32) -> Option<f32>;
}

/// Reports the same tempo for every track (or none)
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTempo(pub Option<f32>);

impl TempoEstimator for FixedTempo {
    fn estimate_bpm(&self, _samples: &[f32], _sample_rate: u32) -> Option<f32> {
        self.0
    }
}

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;
/// Autocorrelation below this is treated as "no pulse"
const MIN_CORRELATION: f32 = 0.1;
/// Only the first part of a track is scanned
const MAX_ANALYSIS_SECS: f32 = 30.0;

/// Spectral-flux onset detection plus autocorrelation
#[derive(Debug, Clone)]
pub struct OnsetTempoEstimator {
    min_bpm: f32,
    max_bpm: f32,
}

impl Default for OnsetTempoEstimator {
    fn default() -> Self {
        Self {
            min_bpm: 70.0,
            max_bpm: 180.0,
        }
    }
}

impl OnsetTempoEstimator {
    pub fn new(min_bpm: f32, max_bpm: f32) -> Self {
        Self { min_bpm, max_bpm }
    }

    /// Half-wave rectified spectral flux, normalized to a peak of 1.0
    fn onset_function(&self, samples: &[f32]) -> Vec<f32> {
        let stft = Stft::new(FFT_SIZE, HOP_SIZE);
        let mut onset_fn = Vec::new();
        let mut prev: Option<Vec<f32>> = None;

        for power in stft.power_spectra(samples) {
            let spectrum: Vec<f32> = power.iter().map(|p| p.sqrt()).collect();
            // Only increases in magnitude indicate an onset
            if let Some(prev) = &prev {
                let flux: f32 = spectrum
                    .iter()
                    .zip(prev)
                    .map(|(curr, prev)| (curr - prev).max(0.0))
                    .sum();
                onset_fn.push(flux);
            }
            prev = Some(spectrum);
        }

        let max = onset_fn.iter().cloned().fold(0.0f32, f32::max);
        if max > 0.0 {
            for v in &mut onset_fn {
                *v /= max;
            }
        }
        onset_fn
    }

    /// Octave errors: fold tempi outside the range back in and prefer the
    /// doubled tempo for slow readings when it correlates almost as well
    fn disambiguate_octave(&self, onset_fn: &[f32], raw_bpm: f32, frames_per_second: f32) -> f32 {
        if raw_bpm < self.min_bpm {
            return raw_bpm * 2.0;
        }
        if raw_bpm > self.max_bpm {
            return raw_bpm / 2.0;
        }

        let doubled = raw_bpm * 2.0;
        if raw_bpm <= 95.0 && doubled <= self.max_bpm {
            let original_lag = (frames_per_second * 60.0 / raw_bpm) as usize;
            let doubled_lag = (frames_per_second * 60.0 / doubled) as usize;
            let original = correlation_at_lag(onset_fn, original_lag);
            let doubled_corr = correlation_at_lag(onset_fn, doubled_lag);
            if doubled_corr / original.max(0.001) > 0.7 {
                return doubled;
            }
        }
        raw_bpm
    }
}

impl TempoEstimator for OnsetTempoEstimator {
    fn estimate_bpm(&self, samples: &[f32], sample_rate: u32) -> Option<f32> {
        if sample_rate == 0 || samples.len() < sample_rate as usize * 4 {
            return None;
        }
        let limit = (MAX_ANALYSIS_SECS * sample_rate as f32) as usize;
        let onset_fn = self.onset_function(&samples[..samples.len().min(limit)]);

        let frames_per_second = sample_rate as f32 / HOP_SIZE as f32;
        let min_lag = ((frames_per_second * 60.0 / self.max_bpm) as usize).max(1);
        let max_lag = (frames_per_second * 60.0 / self.min_bpm).ceil() as usize;
        if onset_fn.len() < 2 * max_lag + 2 {
            return None;
        }

        let mut best_lag = 0;
        let mut best_correlation = 0.0f32;
        for lag in min_lag..=max_lag {
            let correlation = correlation_at_lag(&onset_fn, lag);
            if correlation > best_correlation {
                best_correlation = correlation;
                best_lag = lag;
            }
        }
        if best_lag == 0 || best_correlation < MIN_CORRELATION {
            return None;
        }

        let raw_bpm = 60.0 * frames_per_second / best_lag as f32;
        let bpm = self.disambiguate_octave(&onset_fn, raw_bpm, frames_per_second);
        tracing::debug!(bpm, correlation = best_correlation, "Estimated tempo");
        Some(bpm)
    }
}

/// Normalized correlation of the onset function with itself at `lag`
fn correlation_at_lag(onset_fn: &[f32], lag: usize) -> f32 {
    if lag == 0 || lag >= onset_fn.len() / 2 {
        return 0.0;
    }

    let mut correlation = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..(onset_fn.len() - lag) {
        correlation += onset_fn[i] * onset_fn[i + lag];
        norm_a += onset_fn[i] * onset_fn[i];
        norm_b += onset_fn[i + lag] * onset_fn[i + lag];
    }

    let norm = (norm_a * norm_b).sqrt();
    if norm > 0.0 {
        correlation / norm
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(bpm: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        let period = (60.0 / bpm * sample_rate as f32) as usize;
        let mut samples = vec![0.0f32; n];
        for start in (0..n).step_by(period) {
            // Short decaying burst
            for i in 0..200usize.min(n - start) {
                let sign = if i % 2 == 0 { 0.8 } else { -0.8 };
                samples[start + i] = (1.0 - i as f32 / 200.0) * sign;
            }
        }
        samples
    }

    #[test]
    fn test_click_track_tempo() {
        let estimator = OnsetTempoEstimator::default();
        let bpm = estimator
            .estimate_bpm(&click_track(120.0, 22050, 12.0), 22050)
            .unwrap();
        assert!((bpm - 120.0).abs() < 4.0, "{bpm}");
    }

    #[test]
    fn test_silence_and_short_input() {
        let estimator = OnsetTempoEstimator::default();
        assert_eq!(estimator.estimate_bpm(&vec![0.0; 22050 * 10], 22050), None);
        assert_eq!(estimator.estimate_bpm(&[0.1; 1000], 22050), None);
        assert_eq!(estimator.estimate_bpm(&[0.1; 1000], 0), None);
    }

    #[test]
    fn test_fixed_tempo() {
        assert_eq!(FixedTempo(Some(128.0)).estimate_bpm(&[], 44100), Some(128.0));
        assert_eq!(FixedTempo::default().estimate_bpm(&[0.5; 10], 44100), None);
    }

    #[test]
    fn test_correlation_at_lag_bounds() {
        let onset = [1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        assert!((correlation_at_lag(&onset, 2) - 1.0).abs() < 1e-6);
        assert_eq!(correlation_at_lag(&onset, 1), 0.0);
        assert_eq!(correlation_at_lag(&onset, 0), 0.0);
        assert_eq!(correlation_at_lag(&onset, 4), 0.0);
    }
}
