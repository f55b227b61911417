//! Analysis configuration parameters

use crate::error::AnalysisError;
use crate::profiles::ProfileSet;

/// Score adjustments applied on top of template correlation
///
/// Thresholds compare against min-max normalized chroma (0.0 - 1.0).
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicWeights {
    /// Bass chroma level at the root that counts as a present fundamental
    pub bass_threshold: f32,
    /// Added when the bass fundamental is present
    pub bass_bonus: f32,
    /// Chroma level a perfect fifth above the root that counts as stable
    pub fifth_threshold: f32,
    /// Added when the fifth is present
    pub fifth_bonus: f32,
    /// Minor candidates: required level at the dominant (root + 7)
    pub minor_dominant_threshold: f32,
    /// Minor candidates: required level at the leading tone (root + 11)
    pub minor_leading_threshold: f32,
    /// Minor candidates: score multiplier when both cues are present
    pub minor_multiplier: f32,
    /// Sparse triad family multiplier inside a blended profile set
    pub triad_multiplier: f32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            bass_threshold: 0.7,
            bass_bonus: 0.3,
            fifth_threshold: 0.6,
            fifth_bonus: 0.1,
            minor_dominant_threshold: 0.5,
            minor_leading_threshold: 0.3,
            minor_multiplier: 1.3,
            triad_multiplier: 1.25,
        }
    }
}

/// Parameters for one track analysis
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    // Conditioning
    /// RMS normalization target in dBFS (default: -20.0)
    pub target_rms_db: f32,
    /// Harmonic/percussive separation margin (default: 3.0)
    /// Higher values remove more drums at the cost of tonal detail
    pub hpss_margin: f32,
    /// Band-pass lower edge in Hz (default: 80.0)
    pub band_low_hz: f32,
    /// Band-pass upper edge in Hz (default: 5000.0)
    pub band_high_hz: f32,
    /// Bass low-pass cutoff in Hz (default: 150.0)
    pub bass_cutoff_hz: f32,

    // Feature extraction
    /// Pitch resolution before folding to 12 classes, 12 or 24 (default: 24)
    pub bins_per_octave: u32,
    /// Windows with RMS below this are skipped (default: 0.001)
    pub silence_rms_threshold: f32,
    /// Windows with peak amplitude below this are skipped (default: 0.001)
    pub silence_peak_threshold: f32,

    // Classification
    /// Template families to score against (default: Triad)
    pub profile_set: ProfileSet,
    pub heuristics: HeuristicWeights,

    // Voting
    /// Analysis window length in seconds (default: 6.0)
    pub window_seconds: f64,
    /// Hop between window starts in seconds (default: 3.0)
    pub step_seconds: f64,
    /// Windows starting inside this intro span get `edge_weight` (default: 15.0)
    pub lead_in_seconds: f64,
    /// Windows starting inside this outro span get `edge_weight` (default: 15.0)
    pub lead_out_seconds: f64,
    /// Vote multiplier for intro/outro windows (default: 1.3)
    pub edge_weight: f32,

    // Arbitration
    /// Length of the ending used for the terminal key (default: 8.0)
    pub terminal_seconds: f64,
    /// Confidence points added when the ending corroborates the verdict (default: 5)
    pub cadence_bonus: u8,
    /// Vote share above which a second key counts as a modulation (default: 0.3)
    pub modulation_share_threshold: f32,
    /// Re-resolve the tonic from whole-track chroma when modulating (default: true)
    pub resolve_modulation_globally: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_rms_db: -20.0,
            hpss_margin: 3.0,
            band_low_hz: 80.0,
            band_high_hz: 5000.0,
            bass_cutoff_hz: 150.0,
            bins_per_octave: 24,
            silence_rms_threshold: 0.001,
            silence_peak_threshold: 0.001,
            profile_set: ProfileSet::default(),
            heuristics: HeuristicWeights::default(),
            window_seconds: 6.0,
            step_seconds: 3.0,
            lead_in_seconds: 15.0,
            lead_out_seconds: 15.0,
            edge_weight: 1.3,
            terminal_seconds: 8.0,
            cadence_bonus: 5,
            modulation_share_threshold: 0.3,
            resolve_modulation_globally: true,
        }
    }
}

impl AnalysisConfig {
    /// Check ranges that would otherwise produce nonsense or loop forever
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: &str| Err(AnalysisError::InvalidConfig(msg.to_string()));

        if !(self.window_seconds > 0.0) {
            return invalid("window_seconds must be positive");
        }
        if !(self.step_seconds > 0.0) {
            return invalid("step_seconds must be positive");
        }
        if !(self.terminal_seconds > 0.0) {
            return invalid("terminal_seconds must be positive");
        }
        if self.lead_in_seconds < 0.0 || self.lead_out_seconds < 0.0 {
            return invalid("lead-in and lead-out must not be negative");
        }
        if !(self.edge_weight >= 1.0) {
            return invalid("edge_weight must be at least 1.0");
        }
        if !(0.0..1.0).contains(&self.modulation_share_threshold) {
            return invalid("modulation_share_threshold must be in [0, 1)");
        }
        if self.bins_per_octave != 12 && self.bins_per_octave != 24 {
            return invalid("bins_per_octave must be 12 or 24");
        }
        if !(self.band_low_hz > 0.0 && self.band_low_hz < self.band_high_hz) {
            return invalid("band-pass edges must satisfy 0 < low < high");
        }
        if !(self.bass_cutoff_hz > 0.0) {
            return invalid("bass_cutoff_hz must be positive");
        }
        if !(self.hpss_margin >= 1.0) {
            return invalid("hpss_margin must be at least 1.0");
        }
        if self.silence_rms_threshold < 0.0 || self.silence_peak_threshold < 0.0 {
            return invalid("silence thresholds must not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.modulation_share_threshold, 0.3);
        assert_eq!(config.profile_set, ProfileSet::Triad);
    }

    #[test]
    fn test_rejects_bad_windows() {
        let config = AnalysisConfig {
            step_seconds: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidConfig(_))
        ));

        let config = AnalysisConfig {
            window_seconds: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let config = AnalysisConfig {
            modulation_share_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            bins_per_octave: 36,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            band_low_hz: 6000.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
