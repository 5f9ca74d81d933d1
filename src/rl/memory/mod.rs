//! Experience Memory
//!
//! Rollout storage for on-policy updates.

pub mod rollout;

pub use rollout::{RolloutBuffer, Transition};
