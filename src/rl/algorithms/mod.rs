//! RL Algorithms
//!
//! Implementations of reinforcement learning algorithms.

pub mod ppo;

pub use ppo::{adam_optimizer, greedy_action, PPOOutput, PPOTrainer};
