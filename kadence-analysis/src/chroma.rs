//! Chroma (pitch-class energy) extraction
//!
//! Every FFT bin in the musical range is mapped onto the pitch grid defined
//! by the track's own tuning, not the nominal 440 Hz grid:
//! - at 12 bins/octave a bin goes to its nearest pitch class, weighted down
//!   the further it sits from the pitch center
//! - at 24 bins/octave a bin is split between the two nearest half-semitone
//!   sub-bins, and each semitone's pair of sub-bins is folded back to one
//!   pitch class, which keeps energy near a semitone boundary from being
//!   dropped or assigned to a single neighbour.

use crate::config::AnalysisConfig;
use crate::signal::{peak, rms};
use crate::stft::Stft;
use crate::tuning::reference_frequency;
use std::ops::{Add, Index};

/// Minimum added to the min-max range so a flat vector normalizes to zeros
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// Energy per pitch class, index 0 = C
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChromaVector(pub [f32; 12]);

impl ChromaVector {
    pub fn new(values: [f32; 12]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32; 12] {
        &self.0
    }

    /// Value at a pitch class, taken modulo 12
    pub fn at(&self, pitch_class: usize) -> f32 {
        self.0[pitch_class % 12]
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Min-max scaled to [0, 1]
    pub fn normalized(&self) -> ChromaVector {
        let min = self.0.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = self.0.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min + NORMALIZE_EPSILON;
        ChromaVector(self.0.map(|v| ((v - min) / range).clamp(0.0, 1.0)))
    }

    /// Scaled to sum to 1 (unchanged if the sum is zero)
    pub fn unit_sum(&self) -> ChromaVector {
        let sum = self.sum();
        if sum > 0.0 {
            ChromaVector(self.0.map(|v| v / sum))
        } else {
            *self
        }
    }

    /// Element-wise mean, `None` for an empty slice
    pub fn mean(vectors: &[ChromaVector]) -> Option<ChromaVector> {
        if vectors.is_empty() {
            return None;
        }
        let total = vectors.iter().fold(ChromaVector::default(), |acc, v| acc + *v);
        Some(ChromaVector(total.0.map(|v| v / vectors.len() as f32)))
    }
}

impl Add for ChromaVector {
    type Output = ChromaVector;

    fn add(self, rhs: ChromaVector) -> ChromaVector {
        let mut out = self.0;
        for (o, r) in out.iter_mut().zip(rhs.0) {
            *o += r;
        }
        ChromaVector(out)
    }
}

impl Index<usize> for ChromaVector {
    type Output = f32;

    fn index(&self, pitch_class: usize) -> &f32 {
        &self.0[pitch_class % 12]
    }
}

/// Where one FFT bin's energy goes: up to two sub-bins with weights
#[derive(Debug, Clone, Copy)]
struct BinTarget {
    sub_bins: [(u8, f32); 2],
}

/// Extracts tuning-corrected chroma vectors from signal windows
pub struct ChromaExtractor {
    stft: Stft,
    bins_per_octave: usize,
    targets: Vec<Option<BinTarget>>,
    silence_rms: f32,
    silence_peak: f32,
}

impl ChromaExtractor {
    /// Full-band extractor (55 Hz - 4 kHz) at the configured resolution
    pub fn full_band(sample_rate: u32, tuning: f32, config: &AnalysisConfig) -> Self {
        let fft_size = if sample_rate > 32000 { 8192 } else { 4096 };
        Self::with_range(
            sample_rate,
            tuning,
            fft_size,
            55.0,
            4000.0,
            config.bins_per_octave as usize,
            config,
        )
    }

    /// Bass-register extractor (30 - 260 Hz), longer frames, 12 bins/octave
    pub fn bass(sample_rate: u32, tuning: f32, config: &AnalysisConfig) -> Self {
        let fft_size = if sample_rate > 32000 { 16384 } else { 8192 };
        Self::with_range(sample_rate, tuning, fft_size, 30.0, 260.0, 12, config)
    }

    fn with_range(
        sample_rate: u32,
        tuning: f32,
        fft_size: usize,
        min_freq: f32,
        max_freq: f32,
        bins_per_octave: usize,
        config: &AnalysisConfig,
    ) -> Self {
        let bins_per_octave = if bins_per_octave == 24 { 24 } else { 12 };
        Self {
            stft: Stft::new(fft_size, fft_size / 2),
            bins_per_octave,
            targets: bin_targets(
                fft_size,
                sample_rate,
                tuning,
                min_freq,
                max_freq,
                bins_per_octave,
            ),
            silence_rms: config.silence_rms_threshold,
            silence_peak: config.silence_peak_threshold,
        }
    }

    /// Shortest window that yields at least one frame
    pub fn min_window_len(&self) -> usize {
        self.stft.fft_size()
    }

    /// True if the window should not be analyzed at all
    pub fn is_silent(&self, window: &[f32]) -> bool {
        peak(window) < self.silence_peak || rms(window) < self.silence_rms
    }

    /// Mean chroma of all frames in `window`
    ///
    /// `None` if the window is shorter than one frame or near-silent.
    pub fn extract(&self, window: &[f32]) -> Option<ChromaVector> {
        if window.len() < self.min_window_len() || self.is_silent(window) {
            return None;
        }

        let spectra = self.stft.power_spectra(window);
        let mut sub_bins = vec![0.0f32; self.bins_per_octave];
        for power in &spectra {
            for (p, target) in power.iter().zip(&self.targets) {
                if let Some(target) = target {
                    for &(bin, weight) in &target.sub_bins {
                        sub_bins[bin as usize] += p * weight;
                    }
                }
            }
        }

        let frames = spectra.len().max(1) as f32;
        let mut chroma = [0.0f32; 12];
        if self.bins_per_octave == 24 {
            for (pc, slot) in chroma.iter_mut().enumerate() {
                *slot = (sub_bins[2 * pc] + sub_bins[2 * pc + 1]) / 2.0 / frames;
            }
        } else {
            for (pc, slot) in chroma.iter_mut().enumerate() {
                *slot = sub_bins[pc] / frames;
            }
        }
        Some(ChromaVector(chroma))
    }
}

/// Map FFT bins to pitch sub-bins on the tuned grid
///
/// Weights include the pitch-distance weight and an octave decay
/// (~3 dB per octave above 500 Hz) that keeps upper harmonics from
/// outweighing fundamentals.
fn bin_targets(
    fft_size: usize,
    sample_rate: u32,
    tuning: f32,
    min_freq: f32,
    max_freq: f32,
    bins_per_octave: usize,
) -> Vec<Option<BinTarget>> {
    let nyquist = sample_rate as f32 / 2.0;
    // C4 on the tuned grid; pitch class 0 sits on every C
    let c_ref = reference_frequency(tuning) * 2f32.powf(-9.0 / 12.0);

    (0..fft_size / 2 + 1)
        .map(|bin| {
            let freq = bin as f32 * sample_rate as f32 / fft_size as f32;
            if freq < min_freq || freq > max_freq || freq >= nyquist {
                return None;
            }
            let semis = 12.0 * (freq / c_ref).log2();
            let octave_decay = (500.0 / freq.max(500.0)).sqrt();

            let sub_bins = if bins_per_octave == 24 {
                // Sub-bin j is centered on (j - 0.5) / 2 semitones
                let u = 2.0 * semis + 0.5;
                let lower = u.floor();
                let frac = u - lower;
                let lower = lower.rem_euclid(24.0) as u8;
                [
                    (lower, (1.0 - frac) * octave_decay),
                    ((lower + 1) % 24, frac * octave_decay),
                ]
            } else {
                let nearest = semis.round();
                let detune = (semis - nearest).abs();
                let weight = (1.0 - detune.min(0.5) * 2.0).max(0.0);
                let pc = nearest.rem_euclid(12.0) as u8;
                [(pc, weight * octave_decay), (pc, 0.0)]
            };
            Some(BinTarget { sub_bins })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SR: u32 = 22050;

    fn chord(freqs: &[f32], secs: f32) -> Vec<f32> {
        let n = (SR as f32 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SR as f32;
                0.3 * freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>()
            })
            .collect()
    }

    fn strongest(chroma: &ChromaVector, n: usize) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..12).collect();
        idx.sort_by(|&a, &b| chroma[b].total_cmp(&chroma[a]));
        let mut top = idx[..n].to_vec();
        top.sort();
        top
    }

    #[test]
    fn test_normalized_range() {
        let v = ChromaVector::new([
            2.0, 4.0, 6.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 10.0,
        ]);
        let n = v.normalized();
        assert_eq!(n[0], 0.0);
        assert!((n[11] - 1.0).abs() < 1e-5);
        assert!(n.values().iter().all(|x| (0.0..=1.0).contains(x)));

        // Flat vectors normalize to zeros instead of dividing by zero
        let flat = ChromaVector::new([0.5; 12]).normalized();
        assert!(flat.values().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_mean_and_unit_sum() {
        let a = ChromaVector::new([1.0; 12]);
        let b = ChromaVector::new([3.0; 12]);
        let m = ChromaVector::mean(&[a, b]).unwrap();
        assert_eq!(m[5], 2.0);
        assert!(ChromaVector::mean(&[]).is_none());
        assert!((a.unit_sum().sum() - 1.0).abs() < 1e-6);
        assert_eq!(ChromaVector::default().unit_sum(), ChromaVector::default());
    }

    #[test]
    fn test_index_wraps() {
        let mut values = [0.0; 12];
        values[2] = 1.0;
        let v = ChromaVector::new(values);
        assert_eq!(v[14], 1.0);
        assert_eq!(v.at(26), 1.0);
    }

    #[test]
    fn test_a_major_triad_chroma() {
        let config = AnalysisConfig::default();
        let extractor = ChromaExtractor::full_band(SR, 0.0, &config);
        let chroma = extractor
            .extract(&chord(&[440.0, 554.37, 659.26], 2.0))
            .unwrap();
        assert_eq!(strongest(&chroma, 3), vec![1, 4, 9]); // C#, E, A
    }

    #[test]
    fn test_twelve_bin_resolution() {
        let config = AnalysisConfig {
            bins_per_octave: 12,
            ..Default::default()
        };
        let extractor = ChromaExtractor::full_band(SR, 0.0, &config);
        let chroma = extractor
            .extract(&chord(&[261.63, 329.63, 392.0], 2.0))
            .unwrap();
        assert_eq!(strongest(&chroma, 3), vec![0, 4, 7]); // C, E, G
    }

    #[test]
    fn test_tuning_correction() {
        // A C major chord played a third of a semitone sharp
        let ratio = 2f32.powf(0.35 / 12.0);
        let samples = chord(&[261.63 * ratio, 329.63 * ratio, 392.0 * ratio], 2.0);
        let config = AnalysisConfig {
            bins_per_octave: 12,
            ..Default::default()
        };

        let naive = ChromaExtractor::full_band(SR, 0.0, &config)
            .extract(&samples)
            .unwrap();
        let corrected = ChromaExtractor::full_band(SR, 0.35, &config)
            .extract(&samples)
            .unwrap();

        let triad = |c: &ChromaVector| c[0] + c[4] + c[7];
        assert!(triad(&corrected) > triad(&naive));
        assert_eq!(strongest(&corrected, 3), vec![0, 4, 7]);
    }

    #[test]
    fn test_bass_extractor() {
        let config = AnalysisConfig::default();
        let extractor = ChromaExtractor::bass(SR, 0.0, &config);
        let chroma = extractor.extract(&chord(&[55.0], 3.0)).unwrap();
        assert_eq!(strongest(&chroma, 1), vec![9]); // A1
    }

    #[test]
    fn test_silent_and_short_windows_skipped() {
        let config = AnalysisConfig::default();
        let extractor = ChromaExtractor::full_band(SR, 0.0, &config);
        assert!(extractor.extract(&[0.0; 50000]).is_none());
        assert!(extractor.extract(&[0.0005; 50000]).is_none());
        assert!(extractor.extract(&chord(&[440.0], 0.1)).is_none());
        assert_eq!(extractor.min_window_len(), 4096);
    }
}
