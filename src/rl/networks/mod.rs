//! Neural Network Architectures
//!
//! Actor-critic network for the spoofing detection policy.

pub mod policy;

pub use policy::{PPOPolicyNetwork, PolicyNetworkConfig};
