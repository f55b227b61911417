//! Tonal reference profiles and the correlation used to match them
//!
//! Every profile is a compile-time table indexed from the tonic (index 0).
//! Rotating a profile by `n` moves its tonic weight to pitch class `n`.

use crate::camelot::Mode;

/// Expected pitch-class energy distribution for one key family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneProfile {
    pub name: &'static str,
    pub major: [f32; 12],
    pub minor: [f32; 12],
    /// Triad-only profiles get the family multiplier when blended
    pub sparse: bool,
}

impl ToneProfile {
    pub fn weights(&self, mode: Mode) -> &[f32; 12] {
        match mode {
            Mode::Major => &self.major,
            Mode::Minor => &self.minor,
        }
    }

    /// Weights rotated so that the tonic lands on `root`
    pub fn rotated(&self, mode: Mode, root: u8) -> [f32; 12] {
        rotate(self.weights(mode), root as usize)
    }
}

/// Krumhansl-Kessler probe-tone ratings
pub const KRUMHANSL: ToneProfile = ToneProfile {
    name: "krumhansl",
    major: [
        6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
    ],
    minor: [
        6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
    ],
    sparse: false,
};

/// Root, third and fifth only
pub const TRIAD: ToneProfile = ToneProfile {
    name: "triad",
    major: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
    minor: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
    sparse: true,
};

/// Sha'ath (2011) profiles tuned for electronic/dance music (libKeyFinder)
pub const SHAATH: ToneProfile = ToneProfile {
    name: "shaath",
    major: [
        6.6, 2.0, 3.5, 2.3, 4.6, 4.0, 2.5, 5.2, 2.4, 3.7, 2.3, 3.4,
    ],
    minor: [
        6.5, 2.8, 3.5, 5.4, 2.7, 3.5, 2.5, 5.2, 4.0, 2.7, 4.3, 3.2,
    ],
    sparse: false,
};

/// Which profile families the classifier scores against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileSet {
    /// Krumhansl-Kessler 12-tone weights
    Classical,
    /// Sparse triad template
    #[default]
    Triad,
    /// Triad template competing with Krumhansl-Kessler
    Blend,
    /// Sha'ath weights
    Electronic,
}

impl ProfileSet {
    /// Families in evaluation order; earlier families win ties
    pub fn profiles(&self) -> &'static [ToneProfile] {
        const CLASSICAL: [ToneProfile; 1] = [KRUMHANSL];
        const TRIAD_ONLY: [ToneProfile; 1] = [TRIAD];
        const BLEND: [ToneProfile; 2] = [TRIAD, KRUMHANSL];
        const ELECTRONIC: [ToneProfile; 1] = [SHAATH];
        match self {
            ProfileSet::Classical => &CLASSICAL,
            ProfileSet::Triad => &TRIAD_ONLY,
            ProfileSet::Blend => &BLEND,
            ProfileSet::Electronic => &ELECTRONIC,
        }
    }

    /// Blends mix a sparse family with a dense one
    pub fn is_blend(&self) -> bool {
        let profiles = self.profiles();
        profiles.len() > 1 && profiles.iter().any(|p| p.sparse)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classical" | "krumhansl" => Some(ProfileSet::Classical),
            "triad" => Some(ProfileSet::Triad),
            "blend" => Some(ProfileSet::Blend),
            "electronic" | "shaath" => Some(ProfileSet::Electronic),
            _ => None,
        }
    }
}

/// Cyclic rotation: `out[(i + n) % 12] = v[i]`
pub fn rotate(v: &[f32; 12], n: usize) -> [f32; 12] {
    let mut out = [0.0f32; 12];
    for (i, &value) in v.iter().enumerate() {
        out[(i + n) % 12] = value;
    }
    out
}

/// Pearson correlation coefficient between two 12-element vectors
///
/// Returns 0.0 when either vector is constant (undefined correlation).
pub fn pearson(a: &[f32; 12], b: &[f32; 12]) -> f32 {
    let mean_a: f32 = a.iter().sum::<f32>() / 12.0;
    let mean_b: f32 = b.iter().sum::<f32>() / 12.0;

    let mut numerator = 0.0f32;
    let mut denom_a = 0.0f32;
    let mut denom_b = 0.0f32;

    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    // Self-correlation is exactly 1, not 1 - rounding
    if a == b && denom_a > 0.0 {
        return 1.0;
    }

    let denom = (denom_a * denom_b).sqrt();
    if denom > 0.0 {
        (numerator / denom).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAMP: [f32; 12] = [
        1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
    ];

    #[test]
    fn test_rotate_identity_and_cycle() {
        assert_eq!(rotate(&RAMP, 0), RAMP);
        assert_eq!(rotate(&RAMP, 12), RAMP);
        for profile in [KRUMHANSL, TRIAD, SHAATH] {
            for mode in Mode::ALL {
                for i in 0..12 {
                    let there = rotate(profile.weights(mode), i);
                    let back = rotate(&there, 12 - i);
                    assert_eq!(&back, profile.weights(mode), "{} {i}", profile.name);
                }
            }
        }
    }

    #[test]
    fn test_rotate_moves_tonic() {
        let rotated = TRIAD.rotated(Mode::Major, 9);
        // A major: A, C#, E
        assert_eq!(rotated[9], 1.0);
        assert_eq!(rotated[1], 1.0);
        assert_eq!(rotated[4], 1.0);
        assert_eq!(rotated.iter().sum::<f32>(), 3.0);
    }

    #[test]
    fn test_correlate_perfect() {
        assert_eq!(pearson(&RAMP, &RAMP), 1.0);
        for profile in [KRUMHANSL, TRIAD, SHAATH] {
            let p = rotate(&profile.major, 0);
            assert_eq!(pearson(&p, &profile.major), 1.0);
        }
    }

    #[test]
    fn test_correlate_inverse() {
        let mut reversed = RAMP;
        reversed.reverse();
        assert!((pearson(&RAMP, &reversed) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_correlate_constant_is_zero() {
        assert_eq!(pearson(&[0.5; 12], &RAMP), 0.0);
        assert_eq!(pearson(&[0.0; 12], &[0.0; 12]), 0.0);
    }

    #[test]
    fn test_correlation_bounds() {
        for profile in [KRUMHANSL, TRIAD, SHAATH] {
            for mode in Mode::ALL {
                for root in 0..12u8 {
                    let r = pearson(&RAMP, &profile.rotated(mode, root));
                    assert!((-1.0..=1.0).contains(&r), "{r}");
                }
            }
        }
    }

    #[test]
    fn test_profile_sets() {
        assert!(ProfileSet::Blend.is_blend());
        assert!(!ProfileSet::Triad.is_blend());
        assert!(!ProfileSet::Classical.is_blend());
        assert_eq!(ProfileSet::Blend.profiles()[0].name, "triad");
        assert_eq!(ProfileSet::parse("Shaath"), Some(ProfileSet::Electronic));
        assert_eq!(ProfileSet::parse("nope"), None);
    }
}
