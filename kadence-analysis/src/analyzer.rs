//! End-to-end key analysis of one track

use crate::cadence::arbitrate;
use crate::camelot::CamelotKey;
use crate::chroma::{ChromaExtractor, ChromaVector};
use crate::classifier::KeyClassifier;
use crate::conditioner::SignalConditioner;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::modulation::{reported_target, ModulationDetector};
use crate::result::{clamp_confidence, AnalysisResult, NoResultReason};
use crate::signal::{peak, tail, window_range, AudioSignal};
use crate::tempo::{OnsetTempoEstimator, TempoEstimator};
use crate::voting::VotingAggregator;

/// Lowest sample rate the filter bank and chroma ranges are defined for
pub const MIN_SAMPLE_RATE: u32 = 4000;

/// Runs the full pipeline: conditioning, per-window chroma and
/// classification, voting, modulation check, cadence arbitration
pub struct KeyAnalyzer {
    config: AnalysisConfig,
    tempo: Box<dyn TempoEstimator>,
}

impl KeyAnalyzer {
    /// Analyzer with the default onset-based tempo estimator
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::with_tempo_estimator(config, OnsetTempoEstimator::default())
    }

    pub fn with_tempo_estimator(
        config: AnalysisConfig,
        tempo: impl TempoEstimator + 'static,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            tempo: Box::new(tempo),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one track
    ///
    /// Silent input and inputs where no window votes produce a no-result
    /// record rather than an error.
    pub fn analyze(&self, signal: &AudioSignal) -> Result<AnalysisResult, AnalysisError> {
        match self.detect(signal) {
            Ok(result) => Ok(result),
            Err(err) => match NoResultReason::from_error(&err) {
                Some(reason) => {
                    tracing::warn!(%reason, "No key detected");
                    Ok(AnalysisResult::no_result(reason))
                }
                None => Err(err),
            },
        }
    }

    fn detect(&self, signal: &AudioSignal) -> Result<AnalysisResult, AnalysisError> {
        let config = &self.config;
        let sample_rate = signal.sample_rate();
        if sample_rate < MIN_SAMPLE_RATE {
            return Err(AnalysisError::InvalidInput(format!(
                "sample rate {sample_rate} Hz is below {MIN_SAMPLE_RATE} Hz"
            )));
        }
        if signal.is_empty() || peak(signal.samples()) == 0.0 {
            return Err(AnalysisError::EmptySignal);
        }

        let conditioned = SignalConditioner::new(sample_rate, config).condition(signal.samples());
        let full_band = ChromaExtractor::full_band(sample_rate, conditioned.tuning, config);
        let bass_band = ChromaExtractor::bass(sample_rate, conditioned.tuning, config);
        let classifier = KeyClassifier::from_config(config);

        // Chroma of every voting window, for whole-track re-resolution
        let mut track_chroma: Vec<ChromaVector> = Vec::new();
        let len = conditioned.filtered.len();
        let voting = VotingAggregator::new(config).aggregate(signal.duration_secs(), |window| {
            let range = window_range(len, sample_rate, window.start_secs, window.len_secs);
            let chroma = full_band.extract(&conditioned.filtered[range.clone()])?;
            let bass = bass_band.extract(&conditioned.bass[range]);
            track_chroma.push(chroma.unit_sum());
            Some(classifier.classify(&chroma, bass.as_ref()))
        });

        if track_chroma.is_empty() {
            return Err(AnalysisError::EmptySignal);
        }
        let majority = voting.tally.dominant().ok_or(AnalysisError::NoConvergence)?;

        let detector = ModulationDetector::new(config);
        let modulation = detector.detect(&voting.tally);
        let mut body_key = majority;
        if let Some(modulation) = &modulation {
            tracing::debug!(
                secondary = %modulation.target,
                share = modulation.share,
                "Second key above modulation threshold"
            );
            if let Some(global) = ChromaVector::mean(&track_chroma).and_then(|c| detector.resolve(&c)) {
                body_key = global.key;
            }
        }

        let terminal_secs = config.terminal_seconds;
        let terminal = full_band
            .extract(tail(&conditioned.filtered, sample_rate, terminal_secs))
            .map(|chroma| {
                let bass = bass_band.extract(tail(&conditioned.bass, sample_rate, terminal_secs));
                classifier.classify(&chroma, bass.as_ref()).key
            });

        let (key, rule) = arbitrate(body_key, terminal);
        let bonus = if rule.corroborates() {
            config.cadence_bonus as f32
        } else {
            0.0
        };
        let mean_score = voting.mean_score().unwrap_or(0.0);
        let confidence = clamp_confidence(mean_score * 100.0 + bonus);

        let modulation_target = modulation
            .as_ref()
            .and_then(|_| reported_target(&voting.tally, key));
        let tempo_bpm = self.tempo.estimate_bpm(signal.samples(), sample_rate);

        tracing::info!(
            key = %key,
            camelot = CamelotKey::from_key(key).code(),
            confidence,
            rule = %rule,
            majority = %majority,
            terminal = ?terminal.map(|k| k.to_string()),
            "Key detected"
        );

        Ok(AnalysisResult {
            key: Some(key),
            camelot: Some(CamelotKey::from_key(key)),
            confidence,
            tempo_bpm,
            tuning: conditioned.tuning,
            modulation: modulation.is_some(),
            modulation_target,
            cadence_rule: rule,
            timeline: voting.timeline,
            no_result: None,
        })
    }
}

/// Analyze `signal` with the default tempo estimator
pub fn analyze(signal: &AudioSignal, config: &AnalysisConfig) -> Result<AnalysisResult, AnalysisError> {
    KeyAnalyzer::new(config.clone())?.analyze(signal)
}
