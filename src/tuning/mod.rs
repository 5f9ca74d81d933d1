//! Hyperparameter Tuning
//!
//! Trial evaluation, the two-phase search driver and its report.

pub mod report;
pub mod search;
pub mod trial;

pub use report::{save_results, ReportFiles, ResultRow, RESULTS_FILE_STEM};
pub use search::{phase1_trials, phase2_trials, rank_results, run_phase, tune_hyperparameters, SearchOutcome};
pub use trial::{
    evaluate_hyperparameters, Hyperparameters, PpoTrialEvaluator, SearchPhase, Trial,
    TrialEvaluator, TrialFailure, TrialResult, TrialStep,
};
