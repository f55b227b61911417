//! Detection of a second strong key within one track

use crate::camelot::Key;
use crate::chroma::ChromaVector;
use crate::classifier::{KeyCandidate, KeyClassifier};
use crate::config::{AnalysisConfig, HeuristicWeights};
use crate::profiles::ProfileSet;
use crate::voting::VoteTally;

/// A secondary key holding a large share of the votes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulation {
    /// Second-ranked key by votes
    pub target: Key,
    /// Its share of all votes
    pub share: f32,
}

/// Flag a modulation if the runner-up holds more than `threshold` of the votes
pub fn detect(tally: &VoteTally, threshold: f32) -> Option<Modulation> {
    let ranked = tally.ranked();
    let &(target, _) = ranked.get(1)?;
    let share = tally.share(target);
    (share > threshold).then_some(Modulation { target, share })
}

/// Flags modulations and optionally re-resolves the tonic
#[derive(Debug, Clone)]
pub struct ModulationDetector {
    threshold: f32,
    resolve_globally: bool,
    global: KeyClassifier,
}

impl ModulationDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            threshold: config.modulation_share_threshold,
            resolve_globally: config.resolve_modulation_globally,
            // Whole-track re-resolution always uses the triad family
            global: KeyClassifier::new(ProfileSet::Triad, config.heuristics.clone()),
        }
    }

    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            resolve_globally: false,
            global: KeyClassifier::new(ProfileSet::Triad, HeuristicWeights::default()),
        }
    }

    pub fn detect(&self, tally: &VoteTally) -> Option<Modulation> {
        detect(tally, self.threshold)
    }

    /// Tonic from the whole-track chroma, if global resolution is enabled
    pub fn resolve(&self, whole_track: &ChromaVector) -> Option<KeyCandidate> {
        self.resolve_globally
            .then(|| self.global.classify(whole_track, None))
    }
}

/// The key to report as the modulation target for a final verdict
///
/// The top two keys by votes, minus the final key. `None` when the final
/// key is neither (or no second key exists).
pub fn reported_target(tally: &VoteTally, final_key: Key) -> Option<Key> {
    tally
        .ranked()
        .into_iter()
        .take(2)
        .map(|(key, _)| key)
        .find(|&key| key != final_key)
}
