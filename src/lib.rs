pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod logging;
pub mod rl;
pub mod tuning;

pub use config::{AppConfig, TrialConfig};
pub use data::EventTable;
pub use error::{LobError, Result};
pub use features::extract_features;
pub use tuning::{
    evaluate_hyperparameters, tune_hyperparameters, Hyperparameters, PpoTrialEvaluator,
    TrialEvaluator, TrialResult,
};
