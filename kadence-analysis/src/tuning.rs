//! Deviation of a recording from the A4 = 440 Hz grid
//!
//! Spectral peaks are located with parabolic interpolation, the stronger
//! half of them is mapped onto the equal-tempered grid, and the most common
//! deviation (histogram at 0.01 semitone resolution) is the offset.

use crate::stft::Stft;

/// Reference frequency for A4
pub const A4_FREQ: f32 = 440.0;

const FFT_SIZE: usize = 4096;
const HOP_SIZE: usize = 2048;
const MIN_FREQ: f32 = 150.0;
const MAX_FREQ: f32 = 4000.0;
/// Peaks below this fraction of the frame maximum are ignored
const PEAK_THRESHOLD: f32 = 0.1;
/// Histogram resolution in semitones
const RESOLUTION: f32 = 0.01;

/// Estimated tuning offset in fractional semitones, in (-0.5, 0.5)
///
/// Returns 0.0 when no usable peak is found (silence, noise-free DC, too short).
pub fn estimate_tuning(samples: &[f32], sample_rate: u32) -> f32 {
    let peaks = spectral_peaks(samples, sample_rate);
    if peaks.is_empty() {
        return 0.0;
    }

    let mut mags: Vec<f32> = peaks.iter().map(|&(_, m)| m).collect();
    let mid = mags.len() / 2;
    let (_, &mut threshold, _) = mags.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));

    let deviations: Vec<f32> = peaks
        .iter()
        .filter(|&&(_, m)| m >= threshold)
        .map(|&(freq, _)| semitone_deviation(freq))
        .collect();
    histogram_mode(&deviations)
}

/// Reference frequency implied by a tuning offset, e.g. 0.1 -> ~442.5 Hz
pub fn reference_frequency(tuning: f32) -> f32 {
    A4_FREQ * 2f32.powf(tuning / 12.0)
}

/// Distance of `freq` from the nearest equal-tempered pitch, in [-0.5, 0.5]
pub fn semitone_deviation(freq: f32) -> f32 {
    let semis = 12.0 * (freq / A4_FREQ).log2();
    semis - semis.round()
}

/// `(frequency, magnitude)` of interpolated local maxima in every frame
fn spectral_peaks(samples: &[f32], sample_rate: u32) -> Vec<(f32, f32)> {
    let stft = Stft::new(FFT_SIZE, HOP_SIZE);
    let bin_hz = sample_rate as f32 / FFT_SIZE as f32;
    let lo = ((MIN_FREQ / bin_hz).ceil() as usize).max(1);
    let hi = ((MAX_FREQ.min(sample_rate as f32 / 2.0) / bin_hz) as usize).min(FFT_SIZE / 2 - 1);

    let mut peaks = Vec::new();
    if lo >= hi {
        return peaks;
    }

    for power in stft.power_spectra(samples) {
        let mag: Vec<f32> = power.iter().map(|p| p.sqrt()).collect();
        let max = mag.iter().cloned().fold(0.0f32, f32::max);
        if max <= 0.0 {
            continue;
        }
        let floor = PEAK_THRESHOLD * max;

        for k in lo..hi {
            let (before, elem, after) = (mag[k - 1], mag[k], mag[k + 1]);
            if elem > floor && elem > before && elem >= after {
                // Quadratic fit on log magnitude is close to exact for a Hann main lobe
                let (a, b, c) = (before.max(1e-12).ln(), elem.ln(), after.max(1e-12).ln());
                let denom = a - 2.0 * b + c;
                let shift = if denom.abs() > f32::EPSILON {
                    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
                } else {
                    0.0
                };
                peaks.push(((k as f32 + shift) * bin_hz, elem));
            }
        }
    }
    peaks
}

/// Most populated histogram bin; ties go to the lowest bin
fn histogram_mode(deviations: &[f32]) -> f32 {
    let bins = (1.0 / RESOLUTION).round() as usize;
    let mut counts = vec![0usize; bins];
    for &d in deviations {
        let idx = (((d + 0.5) / RESOLUTION).floor().max(0.0) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let mut best = 0;
    for (i, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = i;
        }
    }
    -0.5 + (best as f32 + 0.5) * RESOLUTION
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn chord(freqs: &[f32], sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() / freqs.len() as f32
            })
            .collect()
    }

    #[test]
    fn test_concert_pitch_is_zero() {
        let samples = chord(&[440.0, 554.37, 659.26], 22050, 3.0);
        let tuning = estimate_tuning(&samples, 22050);
        assert!(tuning.abs() < 0.03, "{tuning}");
    }

    #[test]
    fn test_detuned_recording() {
        let offset = 0.25f32;
        let ratio = 2f32.powf(offset / 12.0);
        let samples = chord(&[440.0 * ratio, 329.63 * ratio, 523.25 * ratio], 22050, 3.0);
        let tuning = estimate_tuning(&samples, 22050);
        assert!((tuning - offset).abs() < 0.04, "{tuning}");
    }

    #[test]
    fn test_silence_and_short_input() {
        assert_eq!(estimate_tuning(&[0.0; 44100], 22050), 0.0);
        assert_eq!(estimate_tuning(&[0.3; 100], 22050), 0.0);
    }

    #[test]
    fn test_reference_frequency() {
        assert_eq!(reference_frequency(0.0), 440.0);
        assert!((reference_frequency(1.0) - 466.16).abs() < 0.01);
        assert!((reference_frequency(0.1) - 442.55).abs() < 0.05);
    }

    #[test]
    fn test_semitone_deviation() {
        assert!(semitone_deviation(440.0).abs() < 1e-6);
        assert!((semitone_deviation(440.0 * 2f32.powf(0.2 / 12.0)) - 0.2).abs() < 1e-4);
        assert!(semitone_deviation(261.63).abs() < 0.01);
    }

    #[test]
    fn test_histogram_mode() {
        assert!((histogram_mode(&[0.101, 0.102, 0.3]) - 0.105).abs() < 1e-5);
        assert!((histogram_mode(&[-0.5]) + 0.495).abs() < 1e-5);
        // Bin centre, not its lower edge
        assert!((histogram_mode(&[0.2001, 0.2099]) - 0.205).abs() < 1e-5);
    }
}
