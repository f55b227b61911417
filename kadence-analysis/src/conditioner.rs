//! Signal conditioning ahead of chroma extraction
//!
//! 1. RMS loudness normalization so every track is analyzed at the same level
//! 2. Tuning estimation on the normalized signal
//! 3. Harmonic/percussive separation, keeping only the harmonic part
//! 4. 4th-order Butterworth band-pass (80 Hz - 5 kHz by default)
//! 5. A separate 2nd-order low-pass (150 Hz) for bass chroma

use crate::config::AnalysisConfig;
use crate::filter::ButterworthFilter;
use crate::hpss;
use crate::signal::rms;
use crate::tuning::estimate_tuning;

const BAND_PASS_ORDER: usize = 4;
const BASS_ORDER: usize = 2;

/// Output of conditioning, all buffers the same length as the input
#[derive(Debug, Clone)]
pub struct ConditionedSignal {
    /// Loudness-normalized signal (before separation and filtering)
    pub normalized: Vec<f32>,
    /// Harmonic, band-limited signal used for chroma
    pub filtered: Vec<f32>,
    /// Low-passed bass register used to corroborate the tonic
    pub bass: Vec<f32>,
    /// Deviation from A440 in fractional semitones
    pub tuning: f32,
    /// Gain applied by normalization in dB
    pub gain_db: f32,
}

/// Scale `samples` in place so their RMS equals `target_db` dBFS
///
/// Returns the gain applied in dB. Silence is left untouched (0 dB).
pub fn normalize_rms(samples: &mut [f32], target_db: f32) -> f32 {
    let level = rms(samples);
    if level <= 0.0 {
        return 0.0;
    }
    let current_db = 20.0 * level.log10();
    let gain_db = target_db - current_db;
    let gain = 10f32.powf(gain_db / 20.0);
    for s in samples.iter_mut() {
        *s *= gain;
    }
    gain_db
}

/// Prepares a mono signal for tonal analysis
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    sample_rate: u32,
    target_rms_db: f32,
    hpss_margin: f32,
    band_low_hz: f32,
    band_high_hz: f32,
    bass_cutoff_hz: f32,
}

impl SignalConditioner {
    pub fn new(sample_rate: u32, config: &AnalysisConfig) -> Self {
        Self {
            sample_rate,
            target_rms_db: config.target_rms_db,
            hpss_margin: config.hpss_margin,
            band_low_hz: config.band_low_hz,
            band_high_hz: config.band_high_hz,
            bass_cutoff_hz: config.bass_cutoff_hz,
        }
    }

    /// Run the full conditioning chain
    pub fn condition(&self, samples: &[f32]) -> ConditionedSignal {
        let mut normalized = samples.to_vec();
        let gain_db = normalize_rms(&mut normalized, self.target_rms_db);
        let tuning = estimate_tuning(&normalized, self.sample_rate);
        let filtered = self.harmonic_band(&normalized);
        let bass = self.bass(&normalized);

        tracing::debug!(
            gain_db,
            tuning,
            samples = samples.len(),
            "Conditioned signal"
        );

        ConditionedSignal {
            normalized,
            filtered,
            bass,
            tuning,
            gain_db,
        }
    }

    /// Harmonic component, band-limited to the pitch-relevant range
    pub fn harmonic_band(&self, samples: &[f32]) -> Vec<f32> {
        let harmonic = hpss::harmonic(samples, self.hpss_margin);
        ButterworthFilter::band_pass(
            self.sample_rate,
            self.band_low_hz,
            self.band_high_hz,
            BAND_PASS_ORDER,
        )
        .apply(&harmonic)
    }

    /// Bass register only
    pub fn bass(&self, samples: &[f32]) -> Vec<f32> {
        ButterworthFilter::low_pass(self.sample_rate, self.bass_cutoff_hz, BASS_ORDER).apply(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_normalize_to_target() {
        let mut samples: Vec<f32> = (0..44100)
            .map(|i| 0.8 * (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let gain_db = normalize_rms(&mut samples, -20.0);
        assert!(gain_db < 0.0);
        let level_db = 20.0 * rms(&samples).log10();
        assert!((level_db + 20.0).abs() < 0.01, "{level_db}");
    }

    #[test]
    fn test_normalize_silence_unchanged() {
        let mut samples = vec![0.0f32; 1000];
        assert_eq!(normalize_rms(&mut samples, -20.0), 0.0);
        assert!(samples.iter().all(|&s| s == 0.0));

        let mut empty: Vec<f32> = Vec::new();
        assert_eq!(normalize_rms(&mut empty, -20.0), 0.0);
    }

    #[test]
    fn test_condition_shapes() {
        let sample_rate = 22050;
        let samples: Vec<f32> = (0..sample_rate * 2)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.3 * (2.0 * PI * 110.0 * t).sin() + 0.3 * (2.0 * PI * 880.0 * t).sin()
            })
            .collect();
        let conditioner = SignalConditioner::new(sample_rate as u32, &AnalysisConfig::default());
        let out = conditioner.condition(&samples);

        assert_eq!(out.normalized.len(), samples.len());
        assert_eq!(out.filtered.len(), samples.len());
        assert_eq!(out.bass.len(), samples.len());
        assert!(out.tuning.abs() < 0.05);

        // Bass keeps 110 Hz and drops most of 880 Hz
        let tail = samples.len() / 2..;
        assert!(rms(&out.bass[tail.clone()]) > 0.5 * rms(&out.normalized[tail.clone()]));
        assert!(rms(&out.filtered[tail]) > 0.0);
    }

    #[test]
    fn test_condition_silence() {
        let conditioner = SignalConditioner::new(22050, &AnalysisConfig::default());
        let out = conditioner.condition(&[0.0; 30000]);
        assert_eq!(out.tuning, 0.0);
        assert!(out.filtered.iter().all(|&s| s == 0.0));
        assert!(out.bass.iter().all(|&s| s == 0.0));
    }
}
