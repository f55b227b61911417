//! Multi-window key voting
//!
//! The classifier is run over overlapping windows. Each window votes for
//! its best key with weight proportional to its score; windows near the
//! start or end of the track count extra since intros and outros tend to
//! state the home key plainly.

use crate::camelot::Key;
use crate::classifier::KeyCandidate;
use crate::config::AnalysisConfig;

/// Weighted integer votes per key, indexed by [`Key::index`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    votes: [u64; 24],
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: Key, votes: u64) {
        self.votes[key.index()] += votes;
    }

    /// Vote for a window result: `round(max(score, 0) * 100 * weight)`
    ///
    /// Returns the number of votes cast.
    pub fn cast(&mut self, candidate: &KeyCandidate, weight: f32) -> u64 {
        let votes = (candidate.score.max(0.0) * 100.0 * weight).round() as u64;
        self.add(candidate.key, votes);
        votes
    }

    pub fn votes(&self, key: Key) -> u64 {
        self.votes[key.index()]
    }

    pub fn total(&self) -> u64 {
        self.votes.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Share of all votes held by `key`, 0.0 for an empty tally
    pub fn share(&self, key: Key) -> f32 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.votes(key) as f32 / total as f32
        }
    }

    /// Keys with at least one vote, most votes first; ties by key index
    pub fn ranked(&self) -> Vec<(Key, u64)> {
        let mut ranked: Vec<(Key, u64)> = Key::all()
            .map(|key| (key, self.votes(key)))
            .filter(|&(_, votes)| votes > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.index().cmp(&b.0.index())));
        ranked
    }

    /// Key with the most votes, `None` when nothing was voted
    pub fn dominant(&self) -> Option<Key> {
        self.ranked().first().map(|&(key, _)| key)
    }
}

/// One analysis window's verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineEntry {
    pub start_secs: f64,
    pub key: Key,
    pub score: f32,
}

/// Position and vote weight of one analysis window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisWindow {
    pub start_secs: f64,
    pub len_secs: f64,
    pub weight: f32,
}

/// Everything voting produced for one track
#[derive(Debug, Clone, Default)]
pub struct VotingOutcome {
    pub tally: VoteTally,
    pub timeline: Vec<TimelineEntry>,
}

impl VotingOutcome {
    /// Mean score of the windows that voted
    pub fn mean_score(&self) -> Option<f32> {
        if self.timeline.is_empty() {
            return None;
        }
        let sum: f32 = self.timeline.iter().map(|e| e.score).sum();
        Some(sum / self.timeline.len() as f32)
    }
}

/// Slides a window over the track and tallies per-window verdicts
#[derive(Debug, Clone, PartialEq)]
pub struct VotingAggregator {
    window_seconds: f64,
    step_seconds: f64,
    lead_in_seconds: f64,
    lead_out_seconds: f64,
    edge_weight: f32,
}

impl VotingAggregator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            window_seconds: config.window_seconds,
            step_seconds: config.step_seconds,
            lead_in_seconds: config.lead_in_seconds,
            lead_out_seconds: config.lead_out_seconds,
            edge_weight: config.edge_weight,
        }
    }

    /// Windows covering a track of `duration` seconds
    ///
    /// A track shorter than one window is a single window.
    pub fn windows(&self, duration: f64) -> Vec<AnalysisWindow> {
        if duration <= 0.0 {
            return Vec::new();
        }
        if duration < self.window_seconds {
            return vec![AnalysisWindow {
                start_secs: 0.0,
                len_secs: duration,
                weight: self.weight_at(0.0, duration),
            }];
        }

        let mut windows = Vec::new();
        let mut index = 0u32;
        loop {
            // Multiply instead of accumulating so long tracks don't drift
            let start = index as f64 * self.step_seconds;
            if start + self.window_seconds > duration + 1e-9 {
                break;
            }
            windows.push(AnalysisWindow {
                start_secs: start,
                len_secs: self.window_seconds,
                weight: self.weight_at(start, duration),
            });
            index += 1;
        }
        windows
    }

    /// `edge_weight` for windows starting in the intro or outro, else 1.0
    pub fn weight_at(&self, start_secs: f64, duration: f64) -> f32 {
        if start_secs < self.lead_in_seconds || start_secs > duration - self.lead_out_seconds {
            self.edge_weight
        } else {
            1.0
        }
    }

    /// Score every window with `score_window` and tally the results
    ///
    /// `score_window` returns `None` for windows that should not vote
    /// (silence, too short).
    pub fn aggregate<F>(&self, duration: f64, mut score_window: F) -> VotingOutcome
    where
        F: FnMut(&AnalysisWindow) -> Option<KeyCandidate>,
    {
        let mut outcome = VotingOutcome::default();
        for window in self.windows(duration) {
            let Some(candidate) = score_window(&window) else {
                tracing::trace!(start = window.start_secs, "Skipping silent window");
                continue;
            };
            outcome.tally.cast(&candidate, window.weight);
            outcome.timeline.push(TimelineEntry {
                start_secs: window.start_secs,
                key: candidate.key,
                score: candidate.score,
            });
        }
        tracing::debug!(
            windows = outcome.timeline.len(),
            total_votes = outcome.tally.total(),
            "Window voting complete"
        );
        outcome
    }
}
