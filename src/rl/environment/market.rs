//! Replayed Order Book Environment
//!
//! Gym-like environment that walks the enhanced full channel table row by
//! row. At every row the agent either lets the event pass or flags it as
//! spoofing, and is rewarded against the row's anomaly score.

use std::ops::Range;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::observation::FeatureMatrix;
use crate::config::TrialConfig;
use crate::data::EventTable;
use crate::error::{LobError, Result};
use crate::rl::config::RewardConfig;

/// Which split of the table the environment replays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    /// Leading `train_split` fraction, random episode windows
    Train,
    /// Remaining rows, replayed once in order
    Eval,
}

/// Action that can be taken in the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvAction {
    /// Let the event pass
    Pass,
    /// Flag the event as spoofing
    Flag,
}

impl EnvAction {
    pub const COUNT: usize = 2;

    pub fn index(&self) -> usize {
        match self {
            EnvAction::Pass => 0,
            EnvAction::Flag => 1,
        }
    }
}

impl From<usize> for EnvAction {
    fn from(action: usize) -> Self {
        match action {
            1 => EnvAction::Flag,
            _ => EnvAction::Pass,
        }
    }
}

/// Result of taking a step in the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Observation of the next row (the last row again once done)
    pub observation: Vec<f32>,
    /// Reward signal
    pub reward: f32,
    /// Whether episode is done
    pub done: bool,
    /// Additional info
    pub info: StepInfo,
}

/// Additional step information
#[derive(Debug, Clone, Copy, Default)]
pub struct StepInfo {
    /// Table row the action was judged against
    pub row: usize,
    /// Anomaly score of that row
    pub anomaly_score: f32,
    /// Score reached the spoofing threshold
    pub is_spoof: bool,
    /// Agent flagged the row
    pub flagged: bool,
}

/// Confusion counts of the current episode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpisodeStats {
    pub true_positives: usize,
    pub false_positives: usize,
    pub missed_spoofs: usize,
    pub true_negatives: usize,
}

impl EpisodeStats {
    fn record(&mut self, is_spoof: bool, flagged: bool) {
        match (is_spoof, flagged) {
            (true, true) => self.true_positives += 1,
            (false, true) => self.false_positives += 1,
            (true, false) => self.missed_spoofs += 1,
            (false, false) => self.true_negatives += 1,
        }
    }

    pub fn steps(&self) -> usize {
        self.true_positives + self.false_positives + self.missed_spoofs + self.true_negatives
    }

    pub fn precision(&self) -> f64 {
        let flagged = self.true_positives + self.false_positives;
        if flagged == 0 {
            return 0.0;
        }
        self.true_positives as f64 / flagged as f64
    }

    pub fn recall(&self) -> f64 {
        let spoofs = self.true_positives + self.missed_spoofs;
        if spoofs == 0 {
            return 0.0;
        }
        self.true_positives as f64 / spoofs as f64
    }
}

/// Spoofing detection environment over a replayed table
pub struct MarketEnvironment {
    features: FeatureMatrix,
    mode: EnvMode,
    rows: Range<usize>,
    spoofing_threshold: f32,
    reward: RewardConfig,
    max_steps: usize,
    cursor: usize,
    end: usize,
    stats: EpisodeStats,
    rng: StdRng,
}

impl MarketEnvironment {
    /// Build the environment over `table` for the given split
    pub fn new(table: &EventTable, config: &TrialConfig, mode: EnvMode) -> Result<Self> {
        let features = FeatureMatrix::encode(table, &config.feature_weights)?;
        let rows = split_rows(features.num_rows(), config.train_split, mode)?;

        let rng = match config.training.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        debug!(
            ?mode,
            rows = rows.len(),
            features = features.num_features(),
            "Market environment ready"
        );

        Ok(Self {
            features,
            mode,
            cursor: rows.start,
            end: rows.start,
            rows,
            spoofing_threshold: config.spoofing_threshold,
            reward: config.reward.clone(),
            max_steps: config.training.max_steps_per_episode.max(1),
            stats: EpisodeStats::default(),
            rng,
        })
    }

    /// Load the trial's enhanced table and build the environment over it
    pub fn from_config(config: &TrialConfig, mode: EnvMode) -> Result<Self> {
        Self::from_path(&config.data_path, config, mode)
    }

    pub fn from_path(path: &Path, config: &TrialConfig, mode: EnvMode) -> Result<Self> {
        let table = EventTable::read_csv(path)?;
        Self::new(&table, config, mode)
    }

    /// Reset the environment for a new episode
    pub fn reset(&mut self) -> Vec<f32> {
        let available = self.rows.len();
        let (start, length) = match self.mode {
            EnvMode::Train => {
                let length = self.max_steps.min(available);
                let offset = self.rng.gen_range(0..=available - length);
                (self.rows.start + offset, length)
            }
            EnvMode::Eval => (self.rows.start, available),
        };

        self.cursor = start;
        self.end = start + length;
        self.stats = EpisodeStats::default();

        self.features.observations[self.cursor].clone()
    }

    /// Take a step in the environment
    pub fn step(&mut self, action: EnvAction) -> StepResult {
        let row = self.cursor.min(self.end.saturating_sub(1));
        let anomaly_score = self.features.anomaly_scores[row];
        let is_spoof = anomaly_score >= self.spoofing_threshold;
        let flagged = action == EnvAction::Flag;

        let reward = self.reward_for(is_spoof, flagged);
        self.stats.record(is_spoof, flagged);

        self.cursor = row + 1;
        let done = self.cursor >= self.end;
        let next = if done { row } else { self.cursor };

        StepResult {
            observation: self.features.observations[next].clone(),
            reward,
            done,
            info: StepInfo {
                row,
                anomaly_score,
                is_spoof,
                flagged,
            },
        }
    }

    fn reward_for(&self, is_spoof: bool, flagged: bool) -> f32 {
        match (is_spoof, flagged) {
            (true, true) => self.reward.true_positive,
            (false, true) => -self.reward.false_positive_penalty,
            (true, false) => -self.reward.missed_spoof_penalty,
            (false, false) => self.reward.true_negative,
        }
    }

    /// Observation width
    pub fn num_features(&self) -> usize {
        self.features.num_features()
    }

    pub fn num_actions(&self) -> usize {
        EnvAction::COUNT
    }

    /// Rows in this environment's split
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn mode(&self) -> EnvMode {
        self.mode
    }

    pub fn stats(&self) -> EpisodeStats {
        self.stats
    }
}

/// Row range of a split: training takes the first `floor(n * split)` rows
fn split_rows(n: usize, split: f64, mode: EnvMode) -> Result<Range<usize>> {
    let boundary = ((n as f64) * split).floor() as usize;
    let boundary = boundary.min(n);
    let rows = match mode {
        EnvMode::Train => 0..boundary,
        EnvMode::Eval => boundary..n,
    };
    if rows.is_empty() {
        return Err(LobError::Environment(format!(
            "{mode:?} split of {n} rows at {split} is empty"
        )));
    }
    Ok(rows)
}
