//! Butterworth filters built from cascaded biquad sections
//!
//! Coefficients follow the RBJ Audio EQ Cookbook; an order-N Butterworth
//! response is N/2 second-order sections with the pole-pair Q values.
//! Internal state is f64 so low cutoffs stay stable at high sample rates.

use std::f64::consts::PI;

/// Normalized biquad coefficients (a0 = 1)
#[derive(Clone, Copy, Debug, Default)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    fn low_pass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let omega = 2.0 * PI * cutoff / sample_rate;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_omega) / 2.0 / a0,
            b1: (1.0 - cos_omega) / a0,
            b2: (1.0 - cos_omega) / 2.0 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn high_pass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let omega = 2.0 * PI * cutoff / sample_rate;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_omega) / 2.0 / a0,
            b1: -(1.0 + cos_omega) / a0,
            b2: (1.0 + cos_omega) / 2.0 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Direct form I state for one section
#[derive(Clone, Debug, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Pole-pair Q values of an even-order Butterworth prototype
fn butterworth_qs(order: usize) -> Vec<f64> {
    let n = order.max(2).next_multiple_of(2);
    (0..n / 2)
        .map(|k| 1.0 / (2.0 * (PI * (2 * k + 1) as f64 / (2 * n) as f64).cos()))
        .collect()
}

/// Cascade of biquad sections forming a Butterworth response
#[derive(Clone, Debug)]
pub struct ButterworthFilter {
    sections: Vec<(BiquadCoeffs, BiquadState)>,
}

impl ButterworthFilter {
    /// Low-pass of the given order (odd orders round up to the next even one)
    pub fn low_pass(sample_rate: u32, cutoff: f32, order: usize) -> Self {
        let sr = sample_rate as f64;
        let cutoff = clamp_cutoff(sr, cutoff);
        Self::from_sections(
            butterworth_qs(order)
                .into_iter()
                .map(|q| BiquadCoeffs::low_pass(sr, cutoff, q)),
        )
    }

    /// High-pass of the given order (odd orders round up to the next even one)
    pub fn high_pass(sample_rate: u32, cutoff: f32, order: usize) -> Self {
        let sr = sample_rate as f64;
        let cutoff = clamp_cutoff(sr, cutoff);
        Self::from_sections(
            butterworth_qs(order)
                .into_iter()
                .map(|q| BiquadCoeffs::high_pass(sr, cutoff, q)),
        )
    }

    /// High-pass at `low` followed by low-pass at `high`, each of `order`
    ///
    /// An upper edge at or above Nyquist leaves only the high-pass.
    pub fn band_pass(sample_rate: u32, low: f32, high: f32, order: usize) -> Self {
        let mut filter = Self::high_pass(sample_rate, low, order);
        if (high as f64) < sample_rate as f64 * 0.5 {
            filter
                .sections
                .extend(Self::low_pass(sample_rate, high, order).sections);
        }
        filter
    }

    fn from_sections(coeffs: impl Iterator<Item = BiquadCoeffs>) -> Self {
        Self {
            sections: coeffs.map(|c| (c, BiquadState::default())).collect(),
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut x = input as f64;
        for (coeffs, state) in &mut self.sections {
            x = state.process(x, coeffs);
        }
        x as f32
    }

    /// Filter a whole buffer from a cleared state
    pub fn apply(&mut self, samples: &[f32]) -> Vec<f32> {
        self.reset();
        samples.iter().map(|&s| self.process(s)).collect()
    }

    pub fn reset(&mut self) {
        for (_, state) in &mut self.sections {
            *state = BiquadState::default();
        }
    }

    /// Number of second-order sections
    pub fn order(&self) -> usize {
        self.sections.len() * 2
    }
}

/// Keep the cutoff inside (0, Nyquist) so the bilinear transform stays defined
fn clamp_cutoff(sample_rate: f64, cutoff: f32) -> f64 {
    let max = sample_rate * 0.49;
    (cutoff as f64).clamp(max.min(1.0), max)
}
