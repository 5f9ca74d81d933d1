//! Two-phase Hyperparameter Search
//!
//! Phase 1 compares the feature-weights presets at the configured PPO
//! settings; phase 2 sweeps a fixed list of PPO settings. Trials of a phase
//! run concurrently on the blocking pool, phase 2 starts once phase 1 has
//! finished, and failed trials are dropped from the ranking.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::report::{save_results, ReportFiles};
use super::trial::{
    evaluate_hyperparameters, Hyperparameters, SearchPhase, Trial, TrialEvaluator, TrialResult,
};
use crate::config::AppConfig;
use crate::error::Result;
use crate::rl::config::{DEFAULT_FEATURE_WEIGHTS, NO_ROLLING_STATS_FEATURE_WEIGHTS};

/// Phase 2 combinations: (learning_rate, batch_size, epochs, spoofing_threshold)
pub const PPO_SWEEP: [(f64, usize, usize, f32); 10] = [
    (1e-4, 128, 20, 0.8),
    (5e-4, 128, 20, 0.8),
    (1e-3, 64, 20, 0.8),
    (5e-4, 64, 20, 0.8),
    (1e-3, 128, 20, 0.7),
    (5e-4, 128, 20, 0.7),
    (1e-3, 64, 20, 0.7),
    (5e-4, 64, 20, 0.7),
    (1e-4, 128, 10, 0.8),
    (1e-4, 64, 10, 0.8),
];

/// Phase 1: the configured PPO settings with and without rolling statistics
pub fn phase1_trials(config: &AppConfig) -> Vec<Trial> {
    [DEFAULT_FEATURE_WEIGHTS, NO_ROLLING_STATS_FEATURE_WEIGHTS]
        .into_iter()
        .enumerate()
        .map(|(index, key)| {
            let params = Hyperparameters {
                feature_weights_key: key.to_string(),
                ..config.current_hyperparameters()
            };
            Trial::new(SearchPhase::RollingStatsAblation, index, params)
        })
        .collect()
}

/// Phase 2: the fixed PPO sweep, all on the default feature weights
pub fn phase2_trials() -> Vec<Trial> {
    PPO_SWEEP
        .iter()
        .enumerate()
        .map(|(index, &(learning_rate, batch_size, epochs, spoofing_threshold))| {
            let params = Hyperparameters {
                learning_rate,
                batch_size,
                epochs,
                spoofing_threshold,
                feature_weights_key: DEFAULT_FEATURE_WEIGHTS.to_string(),
            };
            Trial::new(SearchPhase::PpoSweep, index, params)
        })
        .collect()
}

/// Evaluate every trial with at most `workers` running at once.
///
/// The returned vector is aligned with `trials`; `None` marks a failed trial.
pub async fn run_phase(
    trials: Vec<Trial>,
    evaluator: Arc<dyn TrialEvaluator>,
    workers: usize,
) -> Vec<Option<TrialResult>> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut outcomes: Vec<Option<TrialResult>> = vec![None; trials.len()];
    let mut tasks = JoinSet::new();

    for (slot, trial) in trials.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let evaluator = evaluator.clone();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (slot, None);
            };
            let name = trial.name();
            let handle = tokio::task::spawn_blocking(move || {
                evaluate_hyperparameters(evaluator.as_ref(), &trial)
            });
            match handle.await {
                Ok(outcome) => (slot, outcome),
                Err(e) => {
                    error!(trial = %name, "Trial task failed: {}", e);
                    (slot, None)
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, outcome)) => outcomes[slot] = outcome,
            Err(e) => error!("Trial task failed: {}", e),
        }
    }

    outcomes
}

/// Drop failed trials and sort by descending total reward.
///
/// Ties keep their submission order; a NaN reward ranks last.
pub fn rank_results(outcomes: Vec<Option<TrialResult>>) -> Vec<TrialResult> {
    let key = |r: &TrialResult| {
        if r.total_reward.is_nan() {
            f64::NEG_INFINITY
        } else {
            r.total_reward
        }
    };
    let mut results: Vec<TrialResult> = outcomes.into_iter().flatten().collect();
    results.sort_by(|a, b| key(b).total_cmp(&key(a)));
    results
}

/// Summary of a finished search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Successful trials, best first
    pub results: Vec<TrialResult>,
    pub attempted: usize,
    pub failed: usize,
    pub report: ReportFiles,
}

/// Run both phases and persist the ranked results to `paths.output_dir`
pub async fn tune_hyperparameters(
    config: &AppConfig,
    evaluator: Arc<dyn TrialEvaluator>,
) -> Result<SearchOutcome> {
    let workers = config.search.workers();
    let run_id = uuid::Uuid::new_v4();

    let phase1 = phase1_trials(config);
    let phase2 = phase2_trials();
    let attempted = phase1.len() + phase2.len();

    info!(%run_id, trials = phase1.len(), workers, "Phase 1: rolling-stats ablation");
    let mut outcomes = run_phase(phase1, evaluator.clone(), workers).await;

    info!(%run_id, trials = phase2.len(), workers, "Phase 2: PPO parameter sweep");
    outcomes.extend(run_phase(phase2, evaluator, workers).await);

    let results = rank_results(outcomes);
    let failed = attempted - results.len();
    if failed > 0 {
        warn!(failed, attempted, "Some trials failed and were skipped");
    }

    let report = save_results(&config.paths.output_dir, &results)?;
    info!(%run_id, "Hyperparameter tuning completed and results saved.");

    Ok(SearchOutcome {
        results,
        attempted,
        failed,
        report,
    })
}
