//! Short-time Fourier transform shared by separation, tuning and chroma

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Periodic Hann window
pub fn hann(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Forward/inverse STFT with a Hann window
pub struct Stft {
    fft_size: usize,
    hop_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl Stft {
    pub fn new(fft_size: usize, hop_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft_size,
            hop_size: hop_size.max(1),
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
            window: hann(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of non-redundant bins per frame
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Centered complex STFT: the signal is zero-padded by half a frame on
    /// both sides so every sample is covered by full window overlap
    pub fn forward(&self, samples: &[f32]) -> Vec<Vec<Complex<f32>>> {
        let pad = self.fft_size / 2;
        let padded_len = samples.len() + 2 * pad;
        let frame_count = if padded_len >= self.fft_size {
            (padded_len - self.fft_size) / self.hop_size + 1
        } else {
            0
        };

        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_size];
        let mut frames = Vec::with_capacity(frame_count);
        for f in 0..frame_count {
            let start = f * self.hop_size;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = (start + i) as isize - pad as isize;
                let sample = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..self.bins()].to_vec());
        }
        frames
    }

    /// Weighted overlap-add inverse of [`Stft::forward`], trimmed to `len`
    pub fn inverse(&self, frames: &[Vec<Complex<f32>>], len: usize) -> Vec<f32> {
        let n = self.fft_size;
        let pad = n / 2;
        let total = frames.len().saturating_sub(1) * self.hop_size + n;
        let mut output = vec![0.0f32; total];
        let mut norm = vec![0.0f32; total];
        let mut buffer = vec![Complex::new(0.0, 0.0); n];

        for (f, frame) in frames.iter().enumerate() {
            // Rebuild the full spectrum from its Hermitian half
            for k in 0..n {
                buffer[k] = if k < frame.len() {
                    frame[k]
                } else {
                    frame.get(n - k).map(|c| c.conj()).unwrap_or_default()
                };
            }
            self.inverse.process(&mut buffer);

            let start = f * self.hop_size;
            for i in 0..n {
                let w = self.window[i];
                output[start + i] += buffer[i].re / n as f32 * w;
                norm[start + i] += w * w;
            }
        }

        (0..len)
            .map(|i| {
                let j = i + pad;
                match (output.get(j), norm.get(j)) {
                    (Some(&v), Some(&w)) if w > 1e-8 => v / w,
                    _ => 0.0,
                }
            })
            .collect()
    }

    /// Uncentered power spectra (|X|^2) of every full frame
    pub fn power_spectra(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_size];
        let mut spectra = Vec::new();
        let mut pos = 0;
        while pos + self.fft_size <= samples.len() {
            for (i, (s, w)) in samples[pos..pos + self.fft_size]
                .iter()
                .zip(&self.window)
                .enumerate()
            {
                buffer[i] = Complex::new(s * w, 0.0);
            }
            self.forward.process(&mut buffer);
            spectra.push(buffer[..self.bins()].iter().map(|c| c.norm_sqr()).collect());
            pos += self.hop_size;
        }
        spectra
    }
}
