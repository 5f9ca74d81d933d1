//! Model Checkpointing
//!
//! Save and load policy weights for one trial.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use tracing::info;

use crate::config::TrialConfig;
use crate::error::{LobError, Result};

/// Checkpointer bound to a single checkpoint file
#[derive(Debug, Clone)]
pub struct Checkpointer {
    path: PathBuf,
}

impl Checkpointer {
    /// Create a checkpointer for `path` (`.mpk` extension)
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().with_extension("mpk"),
        }
    }

    /// The checkpoint a trial trains into and evaluates from
    pub fn for_trial(config: &TrialConfig) -> Self {
        Self::new(&config.checkpoint_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the checkpoint exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Save a model, creating the parent directory when missing
    pub fn save<B, M>(&self, model: &M) -> Result<PathBuf>
    where
        B: Backend,
        M: Module<B>,
    {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(self.path.clone(), &recorder)
            .map_err(|e| LobError::Checkpoint(format!("Failed to save checkpoint: {e:?}")))?;

        info!("Saved checkpoint to {:?}", self.path);
        Ok(self.path.clone())
    }

    /// Load saved weights into `model`
    pub fn load<B, M>(&self, model: M, device: &B::Device) -> Result<M>
    where
        B: Backend,
        M: Module<B>,
    {
        if !self.exists() {
            return Err(LobError::Checkpoint(format!(
                "Checkpoint not found: {:?}",
                self.path
            )));
        }

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let model = model
            .load_file(self.path.clone(), &recorder, device)
            .map_err(|e| LobError::Checkpoint(format!("Failed to load checkpoint: {e:?}")))?;

        info!("Loaded checkpoint from {:?}", self.path);
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::networks::{PPOPolicyNetwork, PolicyNetworkConfig};
    use burn_ndarray::NdArray;
    use std::env::temp_dir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_checkpoint_path() {
        let checkpointer = Checkpointer::new(temp_dir().join("test_ckpt").join("ppo_policy_a"));
        assert!(checkpointer
            .path()
            .to_string_lossy()
            .ends_with("ppo_policy_a.mpk"));
    }

    #[test]
    fn test_missing_checkpoint() {
        let device = Default::default();
        let checkpointer = Checkpointer::new(
            temp_dir().join(format!("lobppo_missing_{}.mpk", uuid::Uuid::new_v4())),
        );
        let model: PPOPolicyNetwork<TestBackend> = PolicyNetworkConfig::new(3).init(&device);
        let err = checkpointer.load::<TestBackend, _>(model, &device).unwrap_err();
        assert!(matches!(err, LobError::Checkpoint(_)));
    }

    #[test]
    fn test_save_then_load_restores_weights() {
        let device = Default::default();
        let dir = temp_dir().join(format!("lobppo_ckpt_{}", uuid::Uuid::new_v4()));
        let checkpointer = Checkpointer::new(dir.join("ppo_policy_t.mpk"));

        let config = PolicyNetworkConfig::new(3).with_hidden_dim(8);
        let trained: PPOPolicyNetwork<TestBackend> = config.init(&device);
        checkpointer.save::<TestBackend, _>(&trained).unwrap();
        assert!(checkpointer.exists());

        let fresh: PPOPolicyNetwork<TestBackend> = config.init(&device);
        let loaded = checkpointer.load::<TestBackend, _>(fresh, &device).unwrap();

        let state = Tensor::<TestBackend, 2>::ones([1, 3], &device);
        let (expected, _) = trained.forward(state.clone());
        let (actual, _) = loaded.forward(state);
        let expected = expected.into_data().to_vec::<f32>().unwrap();
        let actual = actual.into_data().to_vec::<f32>().unwrap();
        for (a, b) in expected.iter().zip(&actual) {
            assert!((a - b).abs() < 1e-6);
        }

        let _ = fs::remove_dir_all(&dir);
    }
}
