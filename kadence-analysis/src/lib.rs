//! Harmonic analysis for Kadence
//!
//! Determines the musical key of a recorded track: loudness normalization,
//! harmonic/percussive separation and band-limiting, tuning-corrected
//! chroma, template matching, multi-window voting and cadence arbitration.
//! Results carry the Camelot wheel code used for harmonic mixing.

mod analyzer;
mod cadence;
mod camelot;
mod chroma;
mod classifier;
mod conditioner;
mod config;
mod error;
mod filter;
mod hpss;
mod modulation;
mod profiles;
mod result;
mod signal;
mod stft;
mod tempo;
mod tuning;
mod voting;

pub use analyzer::{analyze, KeyAnalyzer, MIN_SAMPLE_RATE};
pub use cadence::{arbitrate, CadenceRule};
pub use camelot::{camelot_code, parse_note, CamelotKey, Key, Mode, NOTE_NAMES, UNKNOWN_CAMELOT};
pub use chroma::{ChromaExtractor, ChromaVector};
pub use classifier::{KeyCandidate, KeyClassifier};
pub use conditioner::{normalize_rms, ConditionedSignal, SignalConditioner};
pub use config::{AnalysisConfig, HeuristicWeights};
pub use error::AnalysisError;
pub use filter::ButterworthFilter;
pub use hpss::{decompose as separate_harmonic_percussive, Separation};
pub use modulation::{detect as detect_modulation, reported_target, Modulation, ModulationDetector};
pub use profiles::{pearson, rotate, ProfileSet, ToneProfile, KRUMHANSL, SHAATH, TRIAD};
pub use result::{AnalysisResult, NoResultReason, MAX_CONFIDENCE};
pub use signal::AudioSignal;
pub use tempo::{FixedTempo, OnsetTempoEstimator, TempoEstimator};
pub use tuning::{estimate_tuning, reference_frequency, A4_FREQ};
pub use voting::{AnalysisWindow, TimelineEntry, VoteTally, VotingAggregator, VotingOutcome};

/// Sample rate the decoder resamples to before analysis
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;
