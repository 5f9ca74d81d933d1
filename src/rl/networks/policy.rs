//! Policy Network
//!
//! Actor-critic network for the binary pass/flag decision: a shared MLP
//! trunk feeding a policy head (action logits) and a value head.

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::softmax;

/// Policy network configuration
#[derive(Config, Debug)]
pub struct PolicyNetworkConfig {
    /// Observation width
    pub input_dim: usize,
    /// Number of discrete actions
    #[config(default = "2")]
    pub num_actions: usize,
    /// Hidden dimension of the shared trunk
    #[config(default = "128")]
    pub hidden_dim: usize,
}

/// Actor-critic network used by the PPO trainer
#[derive(Module, Debug)]
pub struct PPOPolicyNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    policy_head: Linear<B>,
    value_head: Linear<B>,
    activation: Relu,
}

impl PolicyNetworkConfig {
    /// Initialize the network
    pub fn init<B: Backend>(&self, device: &B::Device) -> PPOPolicyNetwork<B> {
        PPOPolicyNetwork {
            fc1: LinearConfig::new(self.input_dim, self.hidden_dim).init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.hidden_dim).init(device),
            policy_head: LinearConfig::new(self.hidden_dim, self.num_actions).init(device),
            value_head: LinearConfig::new(self.hidden_dim, 1).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> PPOPolicyNetwork<B> {
    /// Forward pass returning (action logits `[batch, actions]`, values `[batch, 1]`)
    pub fn forward(&self, state: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let hidden = self.activation.forward(self.fc1.forward(state));
        let hidden = self.activation.forward(self.fc2.forward(hidden));

        let logits = self.policy_head.forward(hidden.clone());
        let value = self.value_head.forward(hidden);

        (logits, value)
    }

    /// Get action probabilities (softmax over logits)
    pub fn action_probs(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let (logits, _) = self.forward(state);
        softmax(logits, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let network = PolicyNetworkConfig::new(6)
            .with_hidden_dim(16)
            .init::<TestBackend>(&device);

        let state = Tensor::<TestBackend, 2>::zeros([3, 6], &device);
        let (logits, value) = network.forward(state);

        assert_eq!(logits.dims(), [3, 2]);
        assert_eq!(value.dims(), [3, 1]);
    }

    #[test]
    fn test_action_probs_sum_to_one() {
        let device = Default::default();
        let network = PolicyNetworkConfig::new(4)
            .with_hidden_dim(8)
            .init::<TestBackend>(&device);

        let state = Tensor::<TestBackend, 2>::ones([2, 4], &device);
        let probs = network
            .action_probs(state)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();

        assert!((probs[0] + probs[1] - 1.0).abs() < 1e-5);
        assert!((probs[2] + probs[3] - 1.0).abs() < 1e-5);
    }
}
