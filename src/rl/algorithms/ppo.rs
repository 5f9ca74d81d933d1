//! Proximal Policy Optimization (PPO)
//!
//! Clipped-surrogate PPO with Generalized Advantage Estimation over the
//! shared-trunk policy network. Action selection runs on any backend; the
//! update needs an autodiff backend.

use burn::grad_clipping::GradientClippingConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{LobError, Result};
use crate::rl::config::PPOConfig;
use crate::rl::memory::RolloutBuffer;
use crate::rl::networks::PPOPolicyNetwork;

/// PPO Training output, averaged over the mini-batches of one update
#[derive(Debug, Clone, Default)]
pub struct PPOOutput {
    /// Clipped surrogate policy loss
    pub policy_loss: f32,
    /// Value loss
    pub value_loss: f32,
    /// Entropy bonus
    pub entropy: f32,
    /// Combined objective that was minimized
    pub total_loss: f32,
    /// Approximate KL divergence (diagnostic)
    pub approx_kl: f32,
    /// Gradient steps taken
    pub minibatches: usize,
}

/// Adam over the policy network with gradient-norm clipping
pub fn adam_optimizer<B: AutodiffBackend>(
    config: &PPOConfig,
) -> impl Optimizer<PPOPolicyNetwork<B>, B> {
    AdamConfig::new()
        .with_grad_clipping(Some(GradientClippingConfig::Norm(config.max_grad_norm)))
        .init()
}

/// Row-major observations as a `[rows, width]` tensor
pub fn states_tensor<B: Backend>(
    states: &[&[f32]],
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    let width = states.first().map(|s| s.len()).unwrap_or(0);
    if states.iter().any(|s| s.len() != width) {
        return Err(LobError::Tensor(
            "observations of a batch differ in width".to_string(),
        ));
    }
    let flat: Vec<f32> = states.iter().flat_map(|s| s.iter().copied()).collect();
    Ok(Tensor::from_data(
        TensorData::new(flat, [states.len(), width]).convert::<B::FloatElem>(),
        device,
    ))
}

fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| LobError::Tensor(format!("{e:?}")))
}

/// Most probable action for one observation
pub fn greedy_action<B: Backend>(
    model: &PPOPolicyNetwork<B>,
    state: &[f32],
    device: &B::Device,
) -> Result<usize> {
    let (logits, _) = model.forward(states_tensor(&[state], device)?);
    let logits = tensor_to_vec(logits)?;

    Ok(logits
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if *v > best.1 {
                (i, *v)
            } else {
                best
            }
        })
        .0)
}

/// PPO Trainer
///
/// Samples actions from the current policy and applies clipped PPO
/// updates to the network it is handed.
pub struct PPOTrainer<B: AutodiffBackend> {
    config: PPOConfig,
    device: B::Device,
    rng: StdRng,
    step_count: usize,
}

impl<B: AutodiffBackend> PPOTrainer<B> {
    /// Create a new PPO trainer
    pub fn new(config: PPOConfig, device: B::Device, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            device,
            rng,
            step_count: 0,
        }
    }

    /// Sample an action from the policy
    ///
    /// Returns (action_index, log_prob, value_estimate)
    pub fn select_action(
        &mut self,
        model: &PPOPolicyNetwork<B>,
        state: &[f32],
    ) -> Result<(usize, f32, f32)> {
        let (logits, value) = model.forward(states_tensor(&[state], &self.device)?);
        let log_probs = tensor_to_vec(log_softmax(logits, 1))?;
        let value = value.into_scalar().elem::<f32>();

        let probs: Vec<f32> = log_probs.iter().map(|lp| lp.exp()).collect();
        let dist = WeightedIndex::new(&probs)
            .map_err(|e| LobError::Tensor(format!("invalid action distribution: {e}")))?;
        let action = dist.sample(&mut self.rng);

        Ok((action, log_probs[action], value))
    }

    /// Run `n_epochs` of mini-batch updates over a rollout whose advantages
    /// have already been computed.
    pub fn update<O>(
        &mut self,
        mut model: PPOPolicyNetwork<B>,
        optimizer: &mut O,
        buffer: &RolloutBuffer,
    ) -> Result<(PPOPolicyNetwork<B>, PPOOutput)>
    where
        O: Optimizer<PPOPolicyNetwork<B>, B>,
    {
        let mut output = PPOOutput::default();
        if buffer.is_empty() {
            return Ok((model, output));
        }
        if buffer.advantages().len() != buffer.len() {
            return Err(LobError::Internal(
                "rollout advantages were not computed before the update".to_string(),
            ));
        }

        let transitions = buffer.transitions();
        let clip = self.config.clip_range;

        for _epoch in 0..self.config.n_epochs {
            for batch in buffer.minibatch_indices(self.config.batch_size, &mut self.rng) {
                let n = batch.len();
                let states: Vec<&[f32]> = batch
                    .iter()
                    .map(|&i| transitions[i].state.as_slice())
                    .collect();
                let states = states_tensor::<B>(&states, &self.device)?;

                let actions: Vec<i64> = batch.iter().map(|&i| transitions[i].action as i64).collect();
                let actions = Tensor::<B, 2, Int>::from_data(
                    TensorData::new(actions, [n, 1]).convert::<B::IntElem>(),
                    &self.device,
                );

                let column = |values: Vec<f32>| {
                    Tensor::<B, 1>::from_data(
                        TensorData::new(values, [n]).convert::<B::FloatElem>(),
                        &self.device,
                    )
                };
                let old_log_probs = column(batch.iter().map(|&i| transitions[i].log_prob).collect());
                let advantages = column(batch.iter().map(|&i| buffer.advantages()[i]).collect());
                let returns = column(batch.iter().map(|&i| buffer.returns()[i]).collect());

                let (logits, values) = model.forward(states);
                let log_probs = log_softmax(logits, 1);
                let action_log_probs = log_probs.clone().gather(1, actions).squeeze::<1>(1);

                let ratio = (action_log_probs.clone() - old_log_probs.clone()).exp();
                let surr1 = ratio.clone() * advantages.clone();
                let surr2 = ratio.clamp(1.0 - clip, 1.0 + clip) * advantages;
                let policy_loss = surr1.min_pair(surr2).mean().neg();

                let value_loss = (returns - values.squeeze::<1>(1)).powf_scalar(2.0).mean();

                let probs = log_probs.clone().exp();
                let entropy = (probs * log_probs).sum_dim(1).neg().mean();

                let loss = policy_loss.clone() + value_loss.clone() * self.config.vf_coef
                    - entropy.clone() * self.config.ent_coef;

                output.policy_loss += policy_loss.into_scalar().elem::<f32>();
                output.value_loss += value_loss.into_scalar().elem::<f32>();
                output.entropy += entropy.into_scalar().elem::<f32>();
                output.total_loss += loss.clone().into_scalar().elem::<f32>();
                output.approx_kl += (old_log_probs - action_log_probs)
                    .mean()
                    .into_scalar()
                    .elem::<f32>();
                output.minibatches += 1;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optimizer.step(self.config.learning_rate, model, grads);
            }
        }

        if output.minibatches > 0 {
            let n = output.minibatches as f32;
            output.policy_loss /= n;
            output.value_loss /= n;
            output.entropy /= n;
            output.total_loss /= n;
            output.approx_kl /= n;
        }
        self.step_count += 1;

        Ok((model, output))
    }

    /// Updates performed so far
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Get configuration
    pub fn config(&self) -> &PPOConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::memory::Transition;
    use crate::rl::networks::PolicyNetworkConfig;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type TrainBackend = Autodiff<NdArray<f32>>;

    fn config() -> PPOConfig {
        PPOConfig {
            batch_size: 4,
            n_epochs: 2,
            ..PPOConfig::default()
        }
    }

    #[test]
    fn test_states_tensor_shape_and_width_check() {
        let device = Default::default();
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let tensor = states_tensor::<NdArray<f32>>(&[&a, &b], &device).unwrap();
        assert_eq!(tensor.dims(), [2, 3]);

        let short = [1.0];
        assert!(states_tensor::<NdArray<f32>>(&[&a, &short], &device).is_err());
    }

    #[test]
    fn test_select_action_in_range() {
        let device = Default::default();
        let model = PolicyNetworkConfig::new(3)
            .with_hidden_dim(8)
            .init::<TrainBackend>(&device);
        let mut trainer = PPOTrainer::<TrainBackend>::new(config(), device, Some(3));

        for _ in 0..10 {
            let (action, log_prob, value) =
                trainer.select_action(&model, &[0.1, -0.2, 0.3]).unwrap();
            assert!(action < 2);
            assert!(log_prob <= 0.0);
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_update_runs_every_minibatch() {
        let device = Default::default();
        let model = PolicyNetworkConfig::new(3)
            .with_hidden_dim(8)
            .init::<TrainBackend>(&device);
        let mut optimizer = adam_optimizer::<TrainBackend>(&config());
        let mut trainer = PPOTrainer::<TrainBackend>::new(config(), device, Some(3));

        let mut buffer = RolloutBuffer::new();
        for i in 0..10 {
            let state = vec![i as f32 / 10.0, 0.5, -0.5];
            let (action, log_prob, value) = trainer.select_action(&model, &state).unwrap();
            buffer.push(Transition {
                state,
                action,
                reward: if action == 1 { 1.0 } else { -1.0 },
                done: i == 9,
                log_prob,
                value,
            });
        }
        buffer.compute_advantages(0.99, 0.95, 0.0);

        let (_model, output) = trainer.update(model, &mut optimizer, &buffer).unwrap();

        // 10 samples in batches of 4 -> 3 per epoch, 2 epochs
        assert_eq!(output.minibatches, 6);
        assert!(output.total_loss.is_finite());
        assert!(output.entropy > 0.0);
        assert_eq!(trainer.step_count(), 1);
    }

    #[test]
    fn test_update_requires_advantages() {
        let device = Default::default();
        let model = PolicyNetworkConfig::new(2).init::<TrainBackend>(&device);
        let mut optimizer = adam_optimizer::<TrainBackend>(&config());
        let mut trainer = PPOTrainer::<TrainBackend>::new(config(), device, None);

        let mut buffer = RolloutBuffer::new();
        buffer.push(Transition {
            state: vec![0.0, 0.0],
            action: 0,
            reward: 0.0,
            done: true,
            log_prob: -0.7,
            value: 0.0,
        });

        assert!(trainer.update(model, &mut optimizer, &buffer).is_err());
    }
}
