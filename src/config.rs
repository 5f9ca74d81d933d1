use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::features::RollingOp;
use crate::rl::config::{
    EnvironmentConfig, FeatureWeights, PPOConfig, RewardConfig, TrainingConfig,
};
use crate::tuning::Hyperparameters;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub features: FeatureConfig,
    pub ppo: PPOConfig,
    pub training: TrainingConfig,
    pub environment: EnvironmentConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Processed full channel events (input of feature extraction)
    pub full_channel_processed: PathBuf,
    /// Processed ticker events (input of feature extraction)
    pub ticker_processed: PathBuf,
    /// Enhanced full channel events (output of feature extraction, input of the environment)
    pub full_channel_enhanced: PathBuf,
    /// Enhanced ticker events
    pub ticker_enhanced: PathBuf,
    /// Directory for tuning reports and plot series
    pub output_dir: PathBuf,
    /// Directory for policy checkpoints
    pub model_dir: PathBuf,
    /// Directory for per-subsystem log files
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            full_channel_processed: PathBuf::from("data/processed/full_channel_processed.csv"),
            ticker_processed: PathBuf::from("data/processed/ticker_processed.csv"),
            full_channel_enhanced: PathBuf::from("data/enhanced/full_channel_enhanced.csv"),
            ticker_enhanced: PathBuf::from("data/enhanced/ticker_enhanced.csv"),
            output_dir: PathBuf::from("output"),
            model_dir: PathBuf::from("models"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Window sizes for rolling statistics
    pub rolling_windows: Vec<usize>,
    /// Rolling operations applied for every window
    pub operations: Vec<RollingOp>,
    /// Hours that get a one-hot column (`hour_{h}`)
    pub hours: Vec<u32>,
    /// Trailing window (events) of the order flow imbalance sum
    pub order_flow_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolling_windows: vec![5, 10, 20],
            operations: vec![RollingOp::Mean, RollingOp::Std, RollingOp::Var],
            hours: (0..24).collect(),
            order_flow_window: 10,
        }
    }
}

impl FeatureConfig {
    /// Column names of the predeclared hour categories
    pub fn hour_columns(&self) -> Vec<String> {
        self.hours.iter().map(|h| format!("hour_{h}")).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Concurrent trials (0 = all available cores)
    pub max_workers: usize,
}

impl SearchConfig {
    /// Effective worker count
    pub fn workers(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("LOBPPO_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (LOBPPO__PPO__LEARNING_RATE, etc.)
            .add_source(
                Environment::with_prefix("LOBPPO")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Hyperparameters currently configured
    pub fn current_hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            learning_rate: self.ppo.learning_rate,
            batch_size: self.ppo.batch_size,
            epochs: self.ppo.n_epochs,
            spoofing_threshold: self.environment.spoofing_threshold,
            feature_weights_key: self.environment.feature_weights_key.clone(),
        }
    }

    /// Derive the immutable configuration of one trial.
    ///
    /// `self` is never modified; the trial gets its own copy of every tunable
    /// and a checkpoint path keyed by `trial_name`.
    pub fn trial_config(&self, params: &Hyperparameters, trial_name: &str) -> Result<TrialConfig> {
        let feature_weights = self
            .environment
            .resolve_weights(&params.feature_weights_key)?;

        let ppo = PPOConfig {
            learning_rate: params.learning_rate,
            batch_size: params.batch_size,
            n_epochs: params.epochs,
            ..self.ppo.clone()
        };

        Ok(TrialConfig {
            trial_name: trial_name.to_string(),
            ppo,
            training: self.training.clone(),
            spoofing_threshold: params.spoofing_threshold,
            feature_weights_key: params.feature_weights_key.clone(),
            feature_weights,
            train_split: self.environment.train_split,
            reward: self.environment.reward.clone(),
            data_path: self.paths.full_channel_enhanced.clone(),
            checkpoint_path: self
                .paths
                .model_dir
                .join(format!("ppo_policy_{trial_name}.mpk")),
            plot_dir: self.paths.output_dir.join("plots"),
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.ppo.learning_rate <= 0.0 {
            errors.push("ppo.learning_rate must be positive".to_string());
        }
        if self.ppo.batch_size == 0 {
            errors.push("ppo.batch_size must be at least 1".to_string());
        }
        if self.ppo.n_epochs == 0 {
            errors.push("ppo.n_epochs must be at least 1".to_string());
        }
        if self.training.episodes == 0 {
            errors.push("training.episodes must be at least 1".to_string());
        }

        let threshold = self.environment.spoofing_threshold;
        if threshold <= 0.0 || threshold >= 1.0 {
            errors.push("environment.spoofing_threshold must be between 0 and 1".to_string());
        }

        let split = self.environment.train_split;
        if split <= 0.0 || split >= 1.0 {
            errors.push("environment.train_split must be between 0 and 1".to_string());
        }

        if !self
            .environment
            .feature_weights
            .contains_key(&self.environment.feature_weights_key)
        {
            errors.push(format!(
                "environment.feature_weights has no preset named '{}'",
                self.environment.feature_weights_key
            ));
        }

        if let Some(h) = self.features.hours.iter().find(|h| **h > 23) {
            errors.push(format!("features.hours contains invalid hour {h}"));
        }

        if self.features.order_flow_window == 0 {
            errors.push("features.order_flow_window must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration of a single train-then-evaluate trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialConfig {
    /// Unique trial identity, used in file names
    pub trial_name: String,
    pub ppo: PPOConfig,
    pub training: TrainingConfig,
    pub spoofing_threshold: f32,
    pub feature_weights_key: String,
    pub feature_weights: FeatureWeights,
    pub train_split: f64,
    pub reward: RewardConfig,
    /// Enhanced full channel table replayed by the environment
    pub data_path: PathBuf,
    /// Where this trial's trained policy is written and read back
    pub checkpoint_path: PathBuf,
    /// Where this trial's loss and evaluation series are written
    pub plot_dir: PathBuf,
}
