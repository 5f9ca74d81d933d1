//! Training Loop
//!
//! Rollout collection, PPO updates and greedy evaluation over the market
//! environment.

use burn::optim::Optimizer;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::Serialize;
use tracing::{debug, info};

use super::checkpointing::Checkpointer;
use crate::config::TrialConfig;
use crate::error::{LobError, Result};
use crate::rl::algorithms::ppo::{greedy_action, PPOTrainer};
use crate::rl::environment::{EnvAction, EpisodeStats, MarketEnvironment};
use crate::rl::memory::{RolloutBuffer, Transition};
use crate::rl::networks::PPOPolicyNetwork;

/// Losses of one PPO update (one per training episode)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossRecord {
    pub episode: usize,
    pub steps: usize,
    pub episode_reward: f32,
    pub policy_loss: f32,
    pub value_loss: f32,
    pub entropy: f32,
    pub total_loss: f32,
    pub approx_kl: f32,
    pub precision: f64,
    pub recall: f64,
}

/// One evaluation step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationStep {
    pub step: usize,
    pub row: usize,
    pub action: usize,
    pub reward: f32,
    pub cumulative_reward: f32,
    pub anomaly_score: f32,
    pub is_spoof: bool,
}

/// Output of an evaluation run
#[derive(Debug, Clone, Default)]
pub struct EvaluationData {
    pub steps: Vec<EvaluationStep>,
    pub stats: EpisodeStats,
}

impl EvaluationData {
    /// Reward series in step order
    pub fn rewards(&self) -> Vec<f32> {
        self.steps.iter().map(|s| s.reward).collect()
    }

    pub fn actions(&self) -> Vec<usize> {
        self.steps.iter().map(|s| s.action).collect()
    }

    pub fn total_reward(&self) -> f32 {
        self.steps.iter().map(|s| s.reward).sum()
    }
}

/// Training summary statistics
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    /// Number of episodes
    pub num_episodes: usize,
    /// Average reward per episode
    pub avg_reward: f32,
    /// Average episode length
    pub avg_episode_length: f32,
    /// Loss of the final update
    pub final_loss: f32,
}

/// Calculate training summary statistics
pub fn summarize_losses(records: &[LossRecord]) -> TrainingSummary {
    let Some(last) = records.last() else {
        return TrainingSummary::default();
    };
    let n = records.len() as f32;

    TrainingSummary {
        num_episodes: records.len(),
        avg_reward: records.iter().map(|r| r.episode_reward).sum::<f32>() / n,
        avg_episode_length: records.iter().map(|r| r.steps as f32).sum::<f32>() / n,
        final_loss: last.total_loss,
    }
}

/// Train the policy on the environment and persist it.
///
/// Runs `training.episodes` episodes; every episode is collected with the
/// current policy and followed by one PPO update. The trained weights are
/// written to the trial's checkpoint before returning.
pub fn train_model<B, O>(
    env: &mut MarketEnvironment,
    mut model: PPOPolicyNetwork<B>,
    optimizer: &mut O,
    config: &TrialConfig,
    device: &B::Device,
) -> Result<(PPOPolicyNetwork<B>, Vec<LossRecord>)>
where
    B: AutodiffBackend,
    O: Optimizer<PPOPolicyNetwork<B>, B>,
{
    let episodes = config.training.episodes;
    let mut trainer = PPOTrainer::<B>::new(config.ppo.clone(), device.clone(), config.training.seed);
    let mut buffer = RolloutBuffer::with_capacity(config.training.max_steps_per_episode);
    let mut losses = Vec::with_capacity(episodes);

    info!(
        trial = %config.trial_name,
        episodes,
        rows = env.num_rows(),
        "Starting training"
    );

    for episode in 0..episodes {
        buffer.clear();
        let mut state = env.reset();

        loop {
            let (action, log_prob, value) = trainer.select_action(&model, &state)?;
            let result = env.step(EnvAction::from(action));

            buffer.push(Transition {
                state,
                action,
                reward: result.reward,
                done: result.done,
                log_prob,
                value,
            });
            state = result.observation;

            if result.done {
                break;
            }
        }

        buffer.compute_advantages(config.ppo.gamma, config.ppo.gae_lambda, 0.0);
        let (updated, output) = trainer.update(model, optimizer, &buffer)?;
        model = updated;

        let stats = env.stats();
        let record = LossRecord {
            episode,
            steps: buffer.len(),
            episode_reward: buffer.total_reward(),
            policy_loss: output.policy_loss,
            value_loss: output.value_loss,
            entropy: output.entropy,
            total_loss: output.total_loss,
            approx_kl: output.approx_kl,
            precision: stats.precision(),
            recall: stats.recall(),
        };

        if !record.total_loss.is_finite() {
            return Err(LobError::Tensor(format!(
                "loss diverged at episode {episode}"
            )));
        }

        debug!(
            "Episode {}/{}: reward={:.2}, loss={:.4}, entropy={:.3}, precision={:.2}, recall={:.2}",
            episode + 1,
            episodes,
            record.episode_reward,
            record.total_loss,
            record.entropy,
            record.precision,
            record.recall
        );

        losses.push(record);
    }

    Checkpointer::for_trial(config).save::<B, _>(&model)?;

    let summary = summarize_losses(&losses);
    info!(
        trial = %config.trial_name,
        avg_reward = summary.avg_reward,
        final_loss = summary.final_loss,
        "Training complete"
    );

    Ok((model, losses))
}

/// Replay the evaluation split once with greedy actions
pub fn test_model<B: Backend>(
    env: &mut MarketEnvironment,
    model: &PPOPolicyNetwork<B>,
    device: &B::Device,
) -> Result<EvaluationData> {
    let mut state = env.reset();
    let mut data = EvaluationData::default();
    let mut cumulative_reward = 0.0;

    loop {
        let action = greedy_action(model, &state, device)?;
        let result = env.step(EnvAction::from(action));
        cumulative_reward += result.reward;

        data.steps.push(EvaluationStep {
            step: data.steps.len(),
            row: result.info.row,
            action,
            reward: result.reward,
            cumulative_reward,
            anomaly_score: result.info.anomaly_score,
            is_spoof: result.info.is_spoof,
        });
        state = result.observation;

        if result.done {
            break;
        }
    }

    data.stats = env.stats();
    info!(
        steps = data.steps.len(),
        total_reward = cumulative_reward,
        precision = data.stats.precision(),
        recall = data.stats.recall(),
        "Evaluation complete"
    );

    Ok(data)
}
