//! Rollout Buffer
//!
//! On-policy experience storage for PPO updates.

use rand::seq::SliceRandom;
use rand::Rng;

/// A single transition in the environment
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation the action was chosen from
    pub state: Vec<f32>,
    /// Action index taken
    pub action: usize,
    /// Reward received
    pub reward: f32,
    /// Whether episode terminated
    pub done: bool,
    /// Log probability of the action under the acting policy
    pub log_prob: f32,
    /// Value estimate at state
    pub value: f32,
}

/// Rollout buffer for on-policy algorithms (PPO)
///
/// Stores one collected episode; advantages are filled in by
/// [`RolloutBuffer::compute_advantages`] before the update.
#[derive(Debug, Default)]
pub struct RolloutBuffer {
    transitions: Vec<Transition>,
    advantages: Vec<f32>,
    returns: Vec<f32>,
}

impl RolloutBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            transitions: Vec::with_capacity(capacity),
            advantages: Vec::new(),
            returns: Vec::new(),
        }
    }

    /// Add a transition
    pub fn push(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn advantages(&self) -> &[f32] {
        &self.advantages
    }

    pub fn returns(&self) -> &[f32] {
        &self.returns
    }

    /// Sum of rewards over the stored rollout
    pub fn total_reward(&self) -> f32 {
        self.transitions.iter().map(|t| t.reward).sum()
    }

    /// Compute advantages and returns using GAE
    pub fn compute_advantages(&mut self, gamma: f32, gae_lambda: f32, last_value: f32) {
        let n = self.transitions.len();
        self.advantages = vec![0.0; n];
        self.returns = vec![0.0; n];

        let mut gae = 0.0;
        let mut next_value = last_value;

        for t in (0..n).rev() {
            let transition = &self.transitions[t];
            let mask = if transition.done { 0.0 } else { 1.0 };

            let delta = transition.reward + gamma * next_value * mask - transition.value;
            gae = delta + gamma * gae_lambda * mask * gae;

            self.advantages[t] = gae;
            self.returns[t] = gae + transition.value;
            next_value = transition.value;
        }

        // Normalize advantages
        if n > 1 {
            let mean: f32 = self.advantages.iter().sum::<f32>() / n as f32;
            let var: f32 = self
                .advantages
                .iter()
                .map(|a| (a - mean).powi(2))
                .sum::<f32>()
                / n as f32;
            let std = var.sqrt().max(1e-8);

            for adv in &mut self.advantages {
                *adv = (*adv - mean) / std;
            }
        }
    }

    /// Shuffled index mini-batches covering the whole rollout
    pub fn minibatch_indices<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.transitions.len()).collect();
        indices.shuffle(rng);

        indices
            .chunks(batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.transitions.clear();
        self.advantages.clear();
        self.returns.clear();
    }
}
