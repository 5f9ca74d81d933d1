//! Spoofing Detection Environment
//!
//! Replays the enhanced order book table as a gym-like environment for
//! training and evaluating the detection policy.

mod market;
mod observation;

pub use market::{EnvAction, EnvMode, EpisodeStats, MarketEnvironment, StepInfo, StepResult};
pub use observation::{anomaly_scores, FeatureGroup, FeatureMatrix};
