//! Reinforcement Learning Module
//!
//! PPO spoofing detector built on the Burn framework.
//!
//! - **Environment**: the enhanced order book table replayed row by row
//! - **Action Space**: discrete (pass / flag as spoofing)
//! - **Algorithm**: PPO with GAE over a shared-trunk actor-critic

pub mod algorithms;
pub mod config;
pub mod environment;
pub mod memory;
pub mod networks;
pub mod training;

// Config exports
pub use config::{EnvironmentConfig, FeatureWeights, PPOConfig, RewardConfig, TrainingConfig};

// Environment exports
pub use environment::{EnvAction, EnvMode, MarketEnvironment, StepResult};

// Training exports
pub use training::{save_plots, test_model, train_model, Checkpointer, EvaluationData, LossRecord};
