//! Batch key analysis with a bounded worker pool
//!
//! Jobs are queued as `(index, job)` on a crossbeam channel and pulled by a
//! fixed number of workers. Each worker decodes and analyzes one track at a
//! time, sends `(index, outcome)` back and drops the track before taking
//! the next job. Outcomes are returned in submission order.

use crate::loader::{LoadError, TrackLoader, TrackMetadata};
use crossbeam_channel::{self, Receiver, Sender};
use kadence_analysis::{AnalysisConfig, AnalysisError, AnalysisResult, AudioSignal, Key, KeyAnalyzer, TempoEstimator};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// File extensions picked up when collecting a directory
pub const DEFAULT_EXTENSIONS: [&str; 6] = ["mp3", "flac", "wav", "ogg", "m4a", "aac"];

/// Progress updates during a batch run
#[derive(Debug, Clone, PartialEq)]
pub enum BatchProgress {
    /// Batch started
    Started {
        /// Number of jobs queued
        total: usize,
    },
    /// A worker picked up a file
    Analyzing {
        /// 1-based position in the batch
        current: usize,
        total: usize,
        path: PathBuf,
    },
    /// A file finished; `key` is `None` for no-result tracks
    Analyzed {
        current: usize,
        total: usize,
        path: PathBuf,
        key: Option<Key>,
        confidence: u8,
    },
    /// A file could not be decoded or analyzed
    Failed { path: PathBuf, message: String },
    /// All jobs done
    Complete {
        detected: usize,
        no_key: usize,
        failed: usize,
    },
}

/// Error type for one batch job
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Analysis of one decoded file
#[derive(Debug, Clone)]
pub struct TrackReport {
    pub metadata: TrackMetadata,
    pub result: AnalysisResult,
}

/// Outcome of one file in a batch
#[derive(Debug)]
pub struct TrackOutcome {
    pub path: PathBuf,
    pub outcome: Result<TrackReport, BatchError>,
}

/// Counts over a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub detected: usize,
    pub no_key: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(outcomes: &[TrackOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match &outcome.outcome {
                Ok(report) if report.result.is_detected() => summary.detected += 1,
                Ok(_) => summary.no_key += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Default worker count: one per available core
pub fn default_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Runs key analysis over many tracks in parallel
pub struct BatchAnalyzer {
    analyzer: KeyAnalyzer,
    loader: TrackLoader,
    workers: usize,
}

impl BatchAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Ok(Self::from_analyzer(KeyAnalyzer::new(config)?))
    }

    pub fn with_tempo_estimator(
        config: AnalysisConfig,
        tempo: impl TempoEstimator + 'static,
    ) -> Result<Self, AnalysisError> {
        Ok(Self::from_analyzer(KeyAnalyzer::with_tempo_estimator(config, tempo)?))
    }

    fn from_analyzer(analyzer: KeyAnalyzer) -> Self {
        Self {
            analyzer,
            loader: TrackLoader::new(),
            workers: default_workers(),
        }
    }

    /// Set the worker count (at least 1)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Decode and analyze `files`, blocking until all are done
    pub fn analyze_files(
        &self,
        files: Vec<PathBuf>,
        progress_tx: Option<Sender<BatchProgress>>,
    ) -> Vec<TrackOutcome> {
        let total = files.len();
        send(&progress_tx, BatchProgress::Started { total });

        let outcomes = self.run(files, |analyzer, index, path| {
            let current = index + 1;
            send(
                &progress_tx,
                BatchProgress::Analyzing {
                    current,
                    total,
                    path: path.clone(),
                },
            );

            let outcome = analyze_file(&self.loader, analyzer, &path);
            match &outcome {
                Ok(report) => send(
                    &progress_tx,
                    BatchProgress::Analyzed {
                        current,
                        total,
                        path: path.clone(),
                        key: report.result.key,
                        confidence: report.result.confidence,
                    },
                ),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping track");
                    send(
                        &progress_tx,
                        BatchProgress::Failed {
                            path: path.clone(),
                            message: e.to_string(),
                        },
                    );
                }
            }
            TrackOutcome { path, outcome }
        });

        let summary = BatchSummary::of(&outcomes);
        tracing::info!(
            detected = summary.detected,
            no_key = summary.no_key,
            failed = summary.failed,
            "Batch complete"
        );
        send(
            &progress_tx,
            BatchProgress::Complete {
                detected: summary.detected,
                no_key: summary.no_key,
                failed: summary.failed,
            },
        );
        outcomes
    }

    /// Analyze already-decoded signals
    pub fn analyze_signals(&self, signals: Vec<AudioSignal>) -> Vec<Result<AnalysisResult, AnalysisError>> {
        self.run(signals, |analyzer, _, signal| analyzer.analyze(&signal))
    }

    /// Run `files` on a background thread
    ///
    /// Returns a receiver for progress updates and a handle yielding the
    /// ordered outcomes.
    pub fn spawn(self, files: Vec<PathBuf>) -> (Receiver<BatchProgress>, JoinHandle<Vec<TrackOutcome>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::spawn(move || self.analyze_files(files, Some(tx)));
        (rx, handle)
    }

    /// Process `jobs` on the worker pool, returning results in job order
    fn run<J, R, F>(&self, jobs: Vec<J>, work: F) -> Vec<R>
    where
        J: Send,
        R: Send,
        F: Fn(&KeyAnalyzer, usize, J) -> R + Sync,
    {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = crossbeam_channel::bounded::<(usize, J)>(total);
        for job in jobs.into_iter().enumerate() {
            // Capacity equals the job count and the receiver is alive
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, R)>();
        let worker_count = self.workers.min(total).max(1);
        tracing::debug!(jobs = total, workers = worker_count, "Starting batch");

        thread::scope(|scope| {
            for _ in 0..worker_count {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let work = &work;
                let analyzer = &self.analyzer;
                scope.spawn(move || {
                    for (index, job) in job_rx.iter() {
                        if result_tx.send((index, work(analyzer, index, job))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for (index, result) in result_rx.iter() {
            slots[index] = Some(result);
        }
        slots.into_iter().flatten().collect()
    }
}

fn send(progress_tx: &Option<Sender<BatchProgress>>, event: BatchProgress) {
    if let Some(tx) = progress_tx {
        let _ = tx.send(event);
    }
}

/// Decode one file and analyze it
fn analyze_file(loader: &TrackLoader, analyzer: &KeyAnalyzer, path: &Path) -> Result<TrackReport, BatchError> {
    let track = loader.load(path)?;
    let result = analyzer.analyze(&track.signal)?;
    Ok(TrackReport {
        metadata: track.metadata,
        result,
    })
}

/// Collect audio files under `dir`, sorted by path
///
/// Unreadable directories are skipped.
pub fn collect_audio_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Cannot read directory");
            return files;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            if has_extension(&path, extensions) {
                files.push(path);
            }
        } else if path.is_dir() && recursive {
            files.extend(collect_audio_files(&path, extensions, recursive));
        }
    }

    files.sort();
    files
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
