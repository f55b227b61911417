//! Final per-track analysis record

use crate::cadence::CadenceRule;
use crate::camelot::{CamelotKey, Key, UNKNOWN_CAMELOT};
use crate::error::AnalysisError;
use crate::tuning::reference_frequency;
use crate::voting::TimelineEntry;
use std::fmt;

/// Highest confidence ever reported
pub const MAX_CONFIDENCE: u8 = 99;

/// Why a track has no key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoResultReason {
    /// Nothing audible after conditioning
    EmptySignal,
    /// No window produced a vote
    NoConvergence,
}

impl NoResultReason {
    pub fn from_error(error: &AnalysisError) -> Option<Self> {
        match error {
            AnalysisError::EmptySignal => Some(NoResultReason::EmptySignal),
            AnalysisError::NoConvergence => Some(NoResultReason::NoConvergence),
            _ => None,
        }
    }
}

impl fmt::Display for NoResultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoResultReason::EmptySignal => write!(f, "signal is silent"),
            NoResultReason::NoConvergence => write!(f, "no window produced a key"),
        }
    }
}

/// Key analysis of one track
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Detected key, `None` for a no-result record
    pub key: Option<Key>,
    pub camelot: Option<CamelotKey>,
    /// 0 - 99
    pub confidence: u8,
    pub tempo_bpm: Option<f32>,
    /// Deviation from A440 in fractional semitones
    pub tuning: f32,
    /// A second key held a large share of the votes
    pub modulation: bool,
    pub modulation_target: Option<Key>,
    pub cadence_rule: CadenceRule,
    pub timeline: Vec<TimelineEntry>,
    pub no_result: Option<NoResultReason>,
}

impl AnalysisResult {
    /// Record for a track where no key could be determined
    pub fn no_result(reason: NoResultReason) -> Self {
        Self {
            key: None,
            camelot: None,
            confidence: 0,
            tempo_bpm: None,
            tuning: 0.0,
            modulation: false,
            modulation_target: None,
            cadence_rule: CadenceRule::Default,
            timeline: Vec::new(),
            no_result: Some(reason),
        }
    }

    pub fn is_detected(&self) -> bool {
        self.key.is_some()
    }

    /// Camelot code, or `"??"` when no key was detected
    pub fn camelot_code(&self) -> &'static str {
        self.camelot.map_or(UNKNOWN_CAMELOT, |c| c.code())
    }

    pub fn modulation_camelot(&self) -> Option<CamelotKey> {
        self.modulation_target.map(CamelotKey::from_key)
    }

    /// Whether the secondary key sits next to the main key on the wheel
    pub fn modulation_is_compatible(&self) -> Option<bool> {
        let main = self.camelot?;
        self.modulation_camelot().map(|target| main.is_compatible(&target))
    }

    /// Keys that mix harmonically with the detected one
    pub fn compatible_keys(&self) -> Vec<CamelotKey> {
        self.camelot.map(|c| c.compatible_keys()).unwrap_or_default()
    }

    /// Concert pitch implied by the tuning offset, to 0.1 Hz
    pub fn reference_hz(&self) -> f32 {
        (reference_frequency(self.tuning) * 10.0).round() / 10.0
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(key) = self.key else {
            let reason = self.no_result.map(|r| r.to_string());
            return write!(
                f,
                "no key ({})",
                reason.as_deref().unwrap_or("unknown reason")
            );
        };
        write!(f, "{key} ({}) {}%", self.camelot_code(), self.confidence)?;
        if let Some(bpm) = self.tempo_bpm {
            write!(f, " {bpm:.1} BPM")?;
        }
        if let Some(target) = self.modulation_target.filter(|_| self.modulation) {
            write!(f, " -> {target} ({}", CamelotKey::from_key(target).code())?;
            if self.modulation_is_compatible() == Some(true) {
                write!(f, ", compatible")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Clamp a raw confidence value into 0..=99
pub fn clamp_confidence(raw: f32) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, MAX_CONFIDENCE as f32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected() -> AnalysisResult {
        AnalysisResult {
            key: Some(Key::major(9)),
            camelot: Some(CamelotKey::from_key(Key::major(9))),
            confidence: 92,
            tempo_bpm: Some(124.0),
            tuning: 0.0,
            modulation: false,
            modulation_target: None,
            cadence_rule: CadenceRule::Stable,
            timeline: Vec::new(),
            no_result: None,
        }
    }

    #[test]
    fn test_no_result_record() {
        let result = AnalysisResult::no_result(NoResultReason::EmptySignal);
        assert!(!result.is_detected());
        assert_eq!(result.confidence, 0);
        assert_eq!(result.camelot_code(), "??");
        assert_eq!(result.to_string(), "no key (signal is silent)");
    }

    #[test]
    fn test_detected_display() {
        let mut result = detected();
        assert_eq!(result.camelot_code(), "11B");
        assert_eq!(result.to_string(), "A major (11B) 92% 124.0 BPM");

        result.modulation = true;
        result.modulation_target = Some(Key::minor(6));
        assert!(result.to_string().ends_with("-> F# minor (11A, compatible)"));
        assert_eq!(result.modulation_camelot().map(|c| c.code()), Some("11A"));
        assert_eq!(result.modulation_is_compatible(), Some(true));

        result.modulation_target = Some(Key::minor(1));
        assert!(result.to_string().ends_with("-> C# minor (12A)"));
        assert_eq!(result.modulation_is_compatible(), Some(false));
    }

    #[test]
    fn test_compatible_keys() {
        let codes: Vec<&str> = detected().compatible_keys().iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec!["11B", "11A", "10B", "12B"]);
        assert!(AnalysisResult::no_result(NoResultReason::NoConvergence)
            .compatible_keys()
            .is_empty());
        assert_eq!(detected().modulation_is_compatible(), None);
    }

    #[test]
    fn test_reference_hz() {
        let mut result = detected();
        assert_eq!(result.reference_hz(), 440.0);
        result.tuning = 0.1;
        assert!((result.reference_hz() - 442.5).abs() < 1e-3);
        result.tuning = -0.5;
        assert!((result.reference_hz() - 427.5).abs() < 1e-3);
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(-12.0), 0);
        assert_eq!(clamp_confidence(57.4), 57);
        assert_eq!(clamp_confidence(104.0), 99);
        assert_eq!(clamp_confidence(f32::NAN), 0);
    }

    #[test]
    fn test_reason_from_error() {
        assert_eq!(
            NoResultReason::from_error(&AnalysisError::NoConvergence),
            Some(NoResultReason::NoConvergence)
        );
        assert_eq!(
            NoResultReason::from_error(&AnalysisError::DecodeFailure("x".into())),
            None
        );
    }
}
