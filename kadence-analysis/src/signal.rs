//! Decoded mono PCM buffers and time-based views into them

use crate::error::AnalysisError;
use std::ops::Range;

/// Immutable mono PCM buffer with its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    /// Wrap mono samples; rejects a zero sample rate and non-finite samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidInput("sample rate is zero".into()));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::InvalidInput(format!(
                "non-finite sample at index {pos}"
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Downmix interleaved multi-channel audio to mono
    pub fn from_interleaved(
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> Result<Self, AnalysisError> {
        if channels == 0 {
            return Err(AnalysisError::InvalidInput("channel count is zero".into()));
        }
        let channels = channels as usize;
        let mono = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        Self::new(mono, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples in `[start_secs, start_secs + len_secs)`, clipped to the buffer
    pub fn window(&self, start_secs: f64, len_secs: f64) -> &[f32] {
        &self.samples[window_range(self.samples.len(), self.sample_rate, start_secs, len_secs)]
    }

    /// The last `secs` seconds (the whole buffer if shorter)
    pub fn tail(&self, secs: f64) -> &[f32] {
        tail(&self.samples, self.sample_rate, secs)
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Sample range for a time window, clipped to `len`
pub fn window_range(len: usize, sample_rate: u32, start_secs: f64, len_secs: f64) -> Range<usize> {
    let start = seconds_to_samples(start_secs, sample_rate).min(len);
    let end = seconds_to_samples(start_secs + len_secs, sample_rate).min(len);
    start..end.max(start)
}

/// The last `secs` seconds of `samples`
pub fn tail(samples: &[f32], sample_rate: u32, secs: f64) -> &[f32] {
    let n = seconds_to_samples(secs, sample_rate).min(samples.len());
    &samples[samples.len() - n..]
}

pub fn seconds_to_samples(secs: f64, sample_rate: u32) -> usize {
    (secs.max(0.0) * sample_rate as f64).round() as usize
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_input() {
        assert!(AudioSignal::new(vec![0.0; 10], 0).is_err());
        assert!(AudioSignal::new(vec![0.0, f32::NAN], 44100).is_err());
        assert!(AudioSignal::new(Vec::new(), 44100).is_ok());
    }

    #[test]
    fn test_duration_and_windows() {
        let signal = AudioSignal::new((0..1000).map(|i| i as f32).collect(), 100).unwrap();
        assert!((signal.duration_secs() - 10.0).abs() < 1e-9);

        let w = signal.window(2.0, 3.0);
        assert_eq!(w.len(), 300);
        assert_eq!(w[0], 200.0);

        // Clipped at the end
        assert_eq!(signal.window(9.0, 5.0).len(), 100);
        assert!(signal.window(20.0, 1.0).is_empty());

        let t = signal.tail(2.5);
        assert_eq!(t.len(), 250);
        assert_eq!(t[0], 750.0);
        assert_eq!(signal.tail(100.0).len(), 1000);
    }

    #[test]
    fn test_downmix() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = AudioSignal::from_interleaved(&stereo, 2, 48000).unwrap();
        assert_eq!(mono.samples(), &[0.5, 0.5, 0.0]);
        assert!(AudioSignal::from_interleaved(&stereo, 0, 48000).is_err());
    }

    #[test]
    fn test_levels() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(peak(&[0.1, -0.7, 0.3]), 0.7);
    }
}
