//! Trial Evaluation
//!
//! One hyperparameter combination trained, checkpointed, evaluated and
//! scored. Every step reports which stage failed instead of aborting the
//! surrounding search.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use burn::backend::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, info_span};

use crate::config::AppConfig;
use crate::rl::algorithms::adam_optimizer;
use crate::rl::environment::{EnvAction, EnvMode, MarketEnvironment};
use crate::rl::networks::PolicyNetworkConfig;
use crate::rl::training::{save_plots, test_model, train_model, Checkpointer};

type TrainBackend = Autodiff<NdArray<f32>>;
type InferenceBackend = NdArray<f32>;

/// The five tunables of one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub spoofing_threshold: f32,
    pub feature_weights_key: String,
}

impl fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LR={}, Batch Size={}, Epochs={}, Spoofing Threshold={}, Feature Weights={}",
            self.learning_rate,
            self.batch_size,
            self.epochs,
            self.spoofing_threshold,
            self.feature_weights_key
        )
    }
}

/// Search phase a trial belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// Feature-weights presets with and without rolling statistics
    RollingStatsAblation,
    /// Learning rate / batch size / epochs / threshold sweep
    PpoSweep,
    /// A combination run on its own, outside the search
    Single,
}

impl SearchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPhase::RollingStatsAblation => "phase1",
            SearchPhase::PpoSweep => "phase2",
            SearchPhase::Single => "single",
        }
    }
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A combination scheduled for evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Position within its phase
    pub index: usize,
    pub phase: SearchPhase,
    pub params: Hyperparameters,
}

impl Trial {
    pub fn new(phase: SearchPhase, index: usize, params: Hyperparameters) -> Self {
        Self {
            index,
            phase,
            params,
        }
    }

    /// A stand-alone trial; its files never collide with a search trial's
    pub fn single(params: Hyperparameters) -> Self {
        Self::new(SearchPhase::Single, 0, params)
    }

    /// Unique name used for the trial's checkpoint and plot files
    pub fn name(&self) -> String {
        format!("{}_{}", self.phase, self.index)
    }
}

/// Scored trial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub trial: String,
    /// Sum of the evaluation reward series
    pub total_reward: f64,
    pub params: Hyperparameters,
}

/// Stage of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStep {
    Configure,
    BuildTrainEnvironment,
    BuildNetwork,
    Train,
    BuildEvalEnvironment,
    LoadCheckpoint,
    Evaluate,
    Plot,
}

impl fmt::Display for TrialStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrialStep::Configure => "configure",
            TrialStep::BuildTrainEnvironment => "build training environment",
            TrialStep::BuildNetwork => "build network",
            TrialStep::Train => "train",
            TrialStep::BuildEvalEnvironment => "build evaluation environment",
            TrialStep::LoadCheckpoint => "load checkpoint",
            TrialStep::Evaluate => "evaluate",
            TrialStep::Plot => "save plots",
        };
        f.write_str(name)
    }
}

/// Why a trial produced no result
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{step} failed: {reason}")]
pub struct TrialFailure {
    pub step: TrialStep,
    pub reason: String,
}

impl TrialFailure {
    pub fn new(step: TrialStep, reason: impl fmt::Display) -> Self {
        Self {
            step,
            reason: reason.to_string(),
        }
    }
}

trait AtStep<T> {
    fn at(self, step: TrialStep) -> Result<T, TrialFailure>;
}

impl<T, E: fmt::Display> AtStep<T> for Result<T, E> {
    fn at(self, step: TrialStep) -> Result<T, TrialFailure> {
        self.map_err(|e| TrialFailure::new(step, e))
    }
}

/// Runs one trial to a score
pub trait TrialEvaluator: Send + Sync {
    fn evaluate(&self, trial: &Trial) -> Result<TrialResult, TrialFailure>;
}

/// Train a PPO policy, reload it from its checkpoint and score it on the
/// evaluation split.
pub struct PpoTrialEvaluator {
    config: AppConfig,
}

impl PpoTrialEvaluator {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl TrialEvaluator for PpoTrialEvaluator {
    fn evaluate(&self, trial: &Trial) -> Result<TrialResult, TrialFailure> {
        let device = NdArrayDevice::default();
        let config = self
            .config
            .trial_config(&trial.params, &trial.name())
            .at(TrialStep::Configure)?;

        // Training phase
        let mut env =
            MarketEnvironment::from_config(&config, EnvMode::Train).at(TrialStep::BuildTrainEnvironment)?;
        let num_features = env.reset().len();
        if num_features == 0 {
            return Err(TrialFailure::new(
                TrialStep::BuildNetwork,
                "environment produced an empty observation",
            ));
        }
        let network_config = PolicyNetworkConfig::new(num_features)
            .with_num_actions(EnvAction::COUNT)
            .with_hidden_dim(config.training.hidden_dim);
        let network = network_config.init::<TrainBackend>(&device);
        let mut optimizer = adam_optimizer::<TrainBackend>(&config.ppo);
        let (_, losses) =
            train_model(&mut env, network, &mut optimizer, &config, &device).at(TrialStep::Train)?;

        // Testing phase
        let mut env =
            MarketEnvironment::from_config(&config, EnvMode::Eval).at(TrialStep::BuildEvalEnvironment)?;
        let model = network_config.init::<InferenceBackend>(&device);
        let model = Checkpointer::for_trial(&config)
            .load::<InferenceBackend, _>(model, &device)
            .at(TrialStep::LoadCheckpoint)?;
        let data = test_model(&mut env, &model, &device).at(TrialStep::Evaluate)?;

        let total_reward = data.total_reward() as f64;
        info!(
            "Total Reward for combination {}: {}",
            trial.params, total_reward
        );

        save_plots(&config.plot_dir, &config.trial_name, &losses, &data).at(TrialStep::Plot)?;

        Ok(TrialResult {
            trial: trial.name(),
            total_reward,
            params: trial.params.clone(),
        })
    }
}

/// Evaluate one trial; a failure (or panic) is logged and yields `None`.
pub fn evaluate_hyperparameters(
    evaluator: &dyn TrialEvaluator,
    trial: &Trial,
) -> Option<TrialResult> {
    let span = info_span!("trial", index = trial.index, phase = %trial.phase);
    let _enter = span.enter();

    info!("Testing combination: {}", trial.params);

    match catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(trial))) {
        Ok(Ok(result)) => Some(result),
        Ok(Err(failure)) => {
            error!(
                step = %failure.step,
                "An error occurred for combination {}: {}",
                trial.params, failure
            );
            None
        }
        Err(_) => {
            error!("Trial panicked for combination {}", trial.params);
            None
        }
    }
}
