//! Kadence - musical key detection for DJ harmonic mixing
//!
//! Analyzes audio files or folders and prints key, Camelot code,
//! confidence and tempo for each track.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use kadence_analysis::{AnalysisConfig, ProfileSet};
use kadence_library::{
    collect_audio_files, default_workers, BatchAnalyzer, BatchProgress, Config, TrackOutcome, DEFAULT_EXTENSIONS,
};

#[derive(Parser, Debug)]
#[command(name = "kadence", version, about = "Musical key detection with Camelot codes")]
struct Args {
    /// Audio files or folders to analyze (defaults to the last analyzed folder)
    paths: Vec<PathBuf>,

    /// Worker threads for batch analysis
    #[arg(short, long)]
    workers: Option<usize>,

    /// Profile family: classical, triad, blend or electronic
    #[arg(short, long, value_parser = parse_profile_set)]
    profile: Option<ProfileSet>,

    /// Pitch resolution before folding to 12 classes (12 or 24)
    #[arg(long)]
    bins: Option<u32>,

    /// Do not descend into subfolders
    #[arg(long)]
    no_recursive: bool,

    /// Print the key of every analysis window
    #[arg(long)]
    timeline: bool,

    /// Print the Camelot codes each track mixes with
    #[arg(long)]
    mixes: bool,
}

fn parse_profile_set(s: &str) -> Result<ProfileSet, String> {
    ProfileSet::parse(s).ok_or_else(|| format!("unknown profile set '{s}'"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load();

    let paths = if args.paths.is_empty() {
        let folder = config
            .last_folder
            .clone()
            .ok_or_else(|| anyhow!("no input given and no previously analyzed folder"))?;
        info!(folder = %folder.display(), "Using last analyzed folder");
        vec![folder]
    } else {
        args.paths.clone()
    };

    let mut files = Vec::new();
    for path in &paths {
        if path.is_dir() {
            files.extend(collect_audio_files(path, &DEFAULT_EXTENSIONS, !args.no_recursive));
            config.last_folder = Some(path.clone());
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            warn!(path = %path.display(), "No such file or folder");
        }
    }
    if files.is_empty() {
        bail!("no audio files found");
    }

    let mut analysis = AnalysisConfig::default();
    config.apply_to(&mut analysis);
    if let Some(profile_set) = args.profile {
        analysis.profile_set = profile_set;
    }
    if let Some(bins) = args.bins {
        analysis.bins_per_octave = bins;
    }
    let workers = args.workers.or(config.workers).unwrap_or_else(default_workers);

    let batch = BatchAnalyzer::new(analysis)
        .context("invalid analysis configuration")?
        .workers(workers);
    let (progress_rx, handle) = batch.spawn(files);

    for event in progress_rx.iter() {
        match event {
            BatchProgress::Started { total } => info!(total, workers, "Analyzing tracks"),
            BatchProgress::Analyzing { current, total, path } => {
                eprintln!("[{current}/{total}] {}", path.display());
            }
            BatchProgress::Complete {
                detected,
                no_key,
                failed,
            } => info!(detected, no_key, failed, "Done"),
            BatchProgress::Analyzed { .. } | BatchProgress::Failed { .. } => {}
        }
    }

    let outcomes = handle
        .join()
        .map_err(|_| anyhow!("batch thread panicked"))?;
    for outcome in &outcomes {
        print_outcome(outcome, &args);
    }

    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    Ok(())
}

fn print_outcome(outcome: &TrackOutcome, args: &Args) {
    let name = outcome.path.display();
    let report = match &outcome.outcome {
        Ok(report) => report,
        Err(e) => {
            println!("{name}\terror: {e}");
            return;
        }
    };

    let result = &report.result;
    println!("{name}\t{result}\tA={:.1} Hz", result.reference_hz());
    if args.mixes && result.is_detected() {
        let codes: Vec<&str> = result.compatible_keys().iter().map(|c| c.code()).collect();
        println!("  mixes with {}", codes.join(" "));
    }
    if args.timeline {
        for entry in &result.timeline {
            println!("  {:>7.1}s  {} ({:.2})", entry.start_secs, entry.key, entry.score);
        }
    }
}
