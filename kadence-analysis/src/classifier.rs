//! Template-matching key classifier
//!
//! A chroma vector is compared against every rotation of each profile
//! family in the configured set. Correlations are then adjusted by a few
//! musically motivated cues (bass fundamental, fifth, harmonic-minor
//! dominant) before the best candidate is picked.

use crate::camelot::{Key, Mode};
use crate::chroma::ChromaVector;
use crate::config::{AnalysisConfig, HeuristicWeights};
use crate::profiles::{pearson, ProfileSet, ToneProfile};

/// A scored key hypothesis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyCandidate {
    pub key: Key,
    /// Correlation plus bonuses; may exceed 1.0
    pub score: f32,
}

/// Scores chroma vectors against rotated tone profiles
#[derive(Debug, Clone)]
pub struct KeyClassifier {
    profiles: &'static [ToneProfile],
    blend: bool,
    weights: HeuristicWeights,
}

impl KeyClassifier {
    pub fn new(profile_set: ProfileSet, weights: HeuristicWeights) -> Self {
        Self {
            profiles: profile_set.profiles(),
            blend: profile_set.is_blend(),
            weights,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.profile_set, config.heuristics.clone())
    }

    /// Best key for `chroma`, optionally corroborated by bass chroma
    ///
    /// Ties keep the first candidate reached: families in set order, then
    /// major before minor, then roots 0..11.
    pub fn classify(&self, chroma: &ChromaVector, bass: Option<&ChromaVector>) -> KeyCandidate {
        let chroma = chroma.normalized();
        let bass = bass.map(ChromaVector::normalized);

        let mut best = KeyCandidate {
            key: Key::major(0),
            score: f32::NEG_INFINITY,
        };

        for profile in self.profiles {
            for mode in Mode::ALL {
                for root in 0..12u8 {
                    let correlation = pearson(chroma.values(), &profile.rotated(mode, root));
                    let score = self.adjust(correlation, root, mode, profile, &chroma, bass.as_ref());
                    if score > best.score {
                        best = KeyCandidate {
                            key: Key::new(root, mode),
                            score,
                        };
                    }
                }
            }
        }
        best
    }

    /// Raw correlations of the 24 keys against the first family, indexed by
    /// [`Key::index`]
    pub fn correlations(&self, chroma: &ChromaVector) -> [f32; 24] {
        let chroma = chroma.normalized();
        let mut out = [0.0f32; 24];
        if let Some(profile) = self.profiles.first() {
            for key in Key::all() {
                out[key.index()] =
                    pearson(chroma.values(), &profile.rotated(key.mode(), key.root()));
            }
        }
        out
    }

    /// Apply bonuses in fixed order: bass, fifth, minor dominant, family
    fn adjust(
        &self,
        correlation: f32,
        root: u8,
        mode: Mode,
        profile: &ToneProfile,
        chroma: &ChromaVector,
        bass: Option<&ChromaVector>,
    ) -> f32 {
        let w = &self.weights;
        let root = root as usize;
        let mut score = correlation;

        if let Some(bass) = bass {
            if bass[root] > w.bass_threshold {
                score += w.bass_bonus;
            }
        }

        if chroma[root + 7] > w.fifth_threshold {
            score += w.fifth_bonus;
        }

        if mode == Mode::Minor
            && chroma[root + 7] > w.minor_dominant_threshold
            && chroma[root + 11] > w.minor_leading_threshold
        {
            score *= w.minor_multiplier;
        }

        if self.blend && profile.sparse {
            score *= w.triad_multiplier;
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{KRUMHANSL, TRIAD};

    fn triad_chroma(root: usize, minor: bool) -> ChromaVector {
        let mut v = [0.05f32; 12];
        v[root % 12] = 1.0;
        v[(root + if minor { 3 } else { 4 }) % 12] = 0.8;
        v[(root + 7) % 12] = 0.9;
        ChromaVector::new(v)
    }

    fn default_classifier() -> KeyClassifier {
        KeyClassifier::new(ProfileSet::Triad, HeuristicWeights::default())
    }

    #[test]
    fn test_classify_major_triads() {
        let classifier = default_classifier();
        for root in 0..12 {
            let candidate = classifier.classify(&triad_chroma(root, false), None);
            assert_eq!(candidate.key, Key::major(root as u8));
            assert!(candidate.score > 1.0);
        }
    }

    #[test]
    fn test_classify_minor_triads() {
        let classifier = default_classifier();
        for root in 0..12 {
            let candidate = classifier.classify(&triad_chroma(root, true), None);
            assert_eq!(candidate.key, Key::minor(root as u8));
        }
    }

    #[test]
    fn test_classify_krumhansl_scale() {
        // C major scale with the tonic emphasized
        let chroma = ChromaVector::new(KRUMHANSL.major);
        let classifier = KeyClassifier::new(ProfileSet::Classical, HeuristicWeights::default());
        assert_eq!(classifier.classify(&chroma, None).key, Key::major(0));
    }

    #[test]
    fn test_correlations_bounded() {
        let classifier = default_classifier();
        let inputs = [
            triad_chroma(3, false),
            ChromaVector::new([0.0; 12]),
            ChromaVector::new([
                0.3, 0.9, 0.1, 0.4, 0.2, 0.8, 0.5, 0.0, 0.6, 0.7, 0.05, 1.0,
            ]),
        ];
        for chroma in inputs {
            for r in classifier.correlations(&chroma) {
                assert!((-1.0..=1.0).contains(&r), "{r}");
            }
        }
    }

    #[test]
    fn test_perfect_template_correlation() {
        let classifier = default_classifier();
        let chroma = ChromaVector::new(TRIAD.major);
        let correlations = classifier.correlations(&chroma);
        assert!((correlations[Key::major(0).index()] - 1.0).abs() < 1e-5);
        assert!(correlations[Key::minor(0).index()] < 0.9);
    }

    #[test]
    fn test_bass_bonus_applied() {
        let classifier = default_classifier();
        // Ambiguous chroma: C and E equally strong with G and B
        let mut v = [0.0f32; 12];
        v[0] = 1.0;
        v[4] = 1.0;
        v[7] = 1.0;
        v[11] = 1.0;
        let chroma = ChromaVector::new(v);

        let without = classifier.classify(&chroma, None);
        assert_eq!(without.key, Key::major(0));

        let mut bass = [0.0f32; 12];
        bass[4] = 1.0;
        let with = classifier.classify(&chroma, Some(&ChromaVector::new(bass)));
        assert_eq!(with.key, Key::minor(4));
    }

    #[test]
    fn test_minor_dominant_multiplier() {
        let weights = HeuristicWeights::default();
        let classifier = KeyClassifier::new(ProfileSet::Triad, weights.clone());
        // A minor with E (fifth) and G# (leading tone) present
        let mut v = [0.0f32; 12];
        v[9] = 1.0;
        v[0] = 0.9;
        v[4] = 0.9;
        v[8] = 0.5;
        let chroma = ChromaVector::new(v);
        let candidate = classifier.classify(&chroma, None);
        assert_eq!(candidate.key, Key::minor(9));

        let raw = classifier.correlations(&chroma)[Key::minor(9).index()];
        let normalized = chroma.normalized();
        let mut expected = raw;
        if normalized[4] > weights.fifth_threshold {
            expected += weights.fifth_bonus;
        }
        expected *= weights.minor_multiplier;
        assert!((candidate.score - expected).abs() < 1e-5);
    }

    #[test]
    fn test_blend_prefers_triad_family() {
        let blend = KeyClassifier::new(ProfileSet::Blend, HeuristicWeights::default());
        let candidate = blend.classify(&triad_chroma(7, false), None);
        assert_eq!(candidate.key, Key::major(7));
        assert!(candidate.score > 1.25);
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        // Flat chroma correlates 0 with everything
        let candidate = default_classifier().classify(&ChromaVector::new([0.2; 12]), None);
        assert_eq!(candidate.key, Key::major(0));
        assert_eq!(candidate.score, 0.0);
    }
}
