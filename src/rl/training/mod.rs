//! Training Infrastructure
//!
//! Training loops, checkpointing, and evaluation utilities.

pub mod checkpointing;
pub mod plots;
pub mod trainer;

pub use checkpointing::Checkpointer;
pub use plots::{save_plots, PlotFiles};
pub use trainer::{
    summarize_losses, test_model, train_model, EvaluationData, EvaluationStep, LossRecord,
    TrainingSummary,
};
