// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Keeps the best model seen so far, plus what is needed to
// rebuild it.
//
// Files in the output directory:
//   model.mpk          ← parameters of the best epoch, overwritten
//                        on every strict improvement in dev loss
//   best_epoch.json    ← which epoch produced model.mpk
//   train_config.json  ← TrainConfig used for the run
//
// The model is written with NamedMpkFileRecorder at full
// precision, so a reloaded model reproduces the saved forward
// output exactly.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};

use crate::application::train_use_case::TrainConfig;

const MODEL_FILE: &str = "model";
const BEST_EPOCH_FILE: &str = "best_epoch.json";
const CONFIG_FILE: &str = "train_config.json";

type Recorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Manages the checkpoint directory of one run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!("Cannot create checkpoint dir '{}': {}", dir.display(), e);
        }
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the model file as it lands on disk (the recorder
    /// appends the `.mpk` extension).
    pub fn checkpoint_file(&self) -> PathBuf {
        self.dir.join(MODEL_FILE).with_extension("mpk")
    }

    /// Overwrite the checkpoint with `model` and record `epoch`.
    /// A failure here ends the run.
    pub fn save_best<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        let path = self.dir.join(MODEL_FILE);
        model
            .clone()
            .save_file(path.clone(), &Recorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let epoch_path = self.dir.join(BEST_EPOCH_FILE);
        fs::write(&epoch_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", epoch_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the checkpointed parameters into `model`, which must
    /// have the architecture the checkpoint was saved from.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let path = self.dir.join(MODEL_FILE);
        if let Ok(epoch) = self.best_epoch() {
            tracing::info!("Loading checkpoint from epoch {}", epoch);
        }
        model
            .load_file(path.clone(), &Recorder::new(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })
    }

    /// Read best_epoch.json.
    pub fn best_epoch(&self) -> Result<usize> {
        let path = self.dir.join(BEST_EPOCH_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'evaluate'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{ConvLstmNetConfig, StatefulSequenceModel};
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_reload_reproduces_forward_output() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().to_str().unwrap());
        let device = Default::default();
        let config = ConvLstmNetConfig::new(1, 4, 4, vec![3, 2]);

        let saved = config.init::<TestBackend>(&device);
        ckpt.save_best(&saved, 7).unwrap();
        assert!(ckpt.checkpoint_file().exists());
        assert_eq!(ckpt.best_epoch().unwrap(), 7);

        let fresh = config.init::<TestBackend>(&device);
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        let input = Tensor::<TestBackend, 3>::random(
            [2, 3, 16],
            burn::tensor::Distribution::Default,
            &device,
        );
        let mut rng = StdRng::seed_from_u64(0);
        let (a, _) = saved.forward_sequence(input.clone(), None, 1.0, &mut rng);
        let (b, _) = loaded.forward_sequence(input, None, 1.0, &mut rng);

        let a = a.into_data().to_vec::<f32>().unwrap();
        let b = b.into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_save_overwrites_single_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().to_str().unwrap());
        let device = Default::default();
        let model = ConvLstmNetConfig::new(1, 2, 2, vec![2]).init::<TestBackend>(&device);

        ckpt.save_best(&model, 0).unwrap();
        ckpt.save_best(&model, 3).unwrap();

        let mpk_files = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("mpk"))
            .count();
        assert_eq!(mpk_files, 1);
        assert_eq!(ckpt.best_epoch().unwrap(), 3);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().to_str().unwrap());
        let cfg = TrainConfig {
            batch_size: 6,
            hidden_dims: vec![8, 4],
            ..TrainConfig::default()
        };

        ckpt.save_config(&cfg).unwrap();
        let back = ckpt.load_config().unwrap();

        assert_eq!(back.batch_size, 6);
        assert_eq!(back.hidden_dims, vec![8, 4]);
    }

    #[test]
    fn test_load_without_training_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().to_str().unwrap());
        assert!(ckpt.load_config().is_err());
        assert!(ckpt.best_epoch().is_err());
    }
}
