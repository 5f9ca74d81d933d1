//! RL Configuration
//!
//! Configuration structs for the PPO trainer, the market environment and
//! its reward shaping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LobError, Result};

/// Name of the feature-weights preset with every feature group enabled
pub const DEFAULT_FEATURE_WEIGHTS: &str = "default";

/// Name of the preset that silences the rolling-statistics features
pub const NO_ROLLING_STATS_FEATURE_WEIGHTS: &str = "no_rolling_stats";

/// PPO algorithm hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Mini-batch size
    pub batch_size: usize,
    /// Number of PPO epochs per update
    pub n_epochs: usize,
    /// Discount factor (gamma)
    pub gamma: f32,
    /// GAE lambda
    pub gae_lambda: f32,
    /// PPO clip range
    pub clip_range: f32,
    /// Value function coefficient
    pub vf_coef: f32,
    /// Entropy bonus coefficient
    pub ent_coef: f32,
    /// Maximum gradient norm for clipping
    pub max_grad_norm: f32,
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            learning_rate: 5e-4,
            batch_size: 64,
            n_epochs: 10,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_range: 0.2,
            vf_coef: 0.5,
            ent_coef: 0.01,
            max_grad_norm: 0.5,
        }
    }
}

/// Training loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of rollout episodes (one PPO update each)
    pub episodes: usize,
    /// Episode length cap in training mode
    pub max_steps_per_episode: usize,
    /// Hidden dimension of the policy network
    pub hidden_dim: usize,
    /// Seed for episode windows and action sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 20,
            max_steps_per_episode: 512,
            hidden_dim: 128,
            seed: None,
        }
    }
}

/// Per-group multipliers applied to engineered features.
///
/// A weight of zero removes the group's influence on both the observation
/// and the anomaly score while keeping the observation width unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub price: f32,
    pub size: f32,
    pub rolling_stats: f32,
    pub order_flow_imbalance: f32,
    pub cancellation_ratio: f32,
    pub hour_of_day: f32,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            price: 1.0,
            size: 1.0,
            rolling_stats: 1.0,
            order_flow_imbalance: 1.0,
            cancellation_ratio: 1.0,
            hour_of_day: 0.5,
        }
    }
}

impl FeatureWeights {
    /// Default weights with the rolling statistics switched off
    pub fn without_rolling_stats() -> Self {
        Self {
            rolling_stats: 0.0,
            ..Self::default()
        }
    }

    /// The built-in presets, keyed by name
    pub fn presets() -> BTreeMap<String, FeatureWeights> {
        let mut presets = BTreeMap::new();
        presets.insert(DEFAULT_FEATURE_WEIGHTS.to_string(), Self::default());
        presets.insert(
            NO_ROLLING_STATS_FEATURE_WEIGHTS.to_string(),
            Self::without_rolling_stats(),
        );
        presets
    }
}

/// Reward function configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Reward for flagging a spoofing row
    pub true_positive: f32,
    /// Penalty for flagging a legitimate row
    pub false_positive_penalty: f32,
    /// Penalty for letting a spoofing row pass
    pub missed_spoof_penalty: f32,
    /// Reward for letting a legitimate row pass
    pub true_negative: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            true_positive: 1.0,
            false_positive_penalty: 1.0,
            missed_spoof_penalty: 1.0,
            true_negative: 0.01,
        }
    }
}

/// Market environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Anomaly score at or above which a row counts as spoofing
    pub spoofing_threshold: f32,
    /// Active preset in `feature_weights`
    pub feature_weights_key: String,
    /// Fraction of rows used for training; the rest is the evaluation split
    pub train_split: f64,
    /// Named feature-weights presets
    pub feature_weights: BTreeMap<String, FeatureWeights>,
    /// Reward shaping
    pub reward: RewardConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            spoofing_threshold: 0.8,
            feature_weights_key: DEFAULT_FEATURE_WEIGHTS.to_string(),
            train_split: 0.8,
            feature_weights: FeatureWeights::presets(),
            reward: RewardConfig::default(),
        }
    }
}

impl EnvironmentConfig {
    /// Look up a feature-weights preset by name
    pub fn resolve_weights(&self, key: &str) -> Result<FeatureWeights> {
        self.feature_weights
            .get(key)
            .copied()
            .ok_or_else(|| LobError::UnknownFeatureWeights(key.to_string()))
    }
}
