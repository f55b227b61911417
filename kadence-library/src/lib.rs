//! Track handling for Kadence - decoding, batch analysis, config

mod batch;
mod config;
mod loader;

pub use batch::{
    collect_audio_files, default_workers, BatchAnalyzer, BatchError, BatchProgress, BatchSummary, TrackOutcome,
    TrackReport, DEFAULT_EXTENSIONS,
};
pub use config::Config;
pub use loader::{downmix, resample, LoadError, LoadedTrack, TrackLoader, TrackMetadata};
