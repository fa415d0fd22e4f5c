// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Validate the configuration     (this layer)
//   Step 2: Load or synthesize sequences   (Layer 4 - data)
//   Step 3: Normalize intensities          (Layer 4 - data)
//   Step 4: Split train / dev / test       (Layer 4 - data)
//   Step 5: Save config for evaluation     (Layer 6 - infra)
//   Step 6: Open results sinks and plotter (Layer 6 - infra)
//   Step 7: Run the training loop          (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    loader::{JsonSequenceLoader, SyntheticPrecipitation},
    preprocessor::Normalization,
    splitter::{split_train_dev_test, DataSplit},
};
use crate::domain::{
    sequence::MapShape,
    traits::{ResultsSink, SequenceSource},
};
use crate::infra::{
    checkpoint::CheckpointManager, metrics::CsvResultsSink, plot::ErrorCurvePlotter,
    results_db::SqliteResultsSink,
};
use crate::ml::loss::LossFunction;
use crate::ml::trainer::{run_training, TrainingHooks};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings of a training run. Saved next to the checkpoint so
// `evaluate` can rebuild the same model and the same data split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub output_dir:                  String,
    /// JSON dataset; synthetic rain cells are generated when unset
    pub data_path:                   Option<String>,
    pub synthetic_sequences:         usize,
    pub synthetic_len:               usize,
    pub channels:                    usize,
    pub height:                      usize,
    pub width:                       usize,
    pub normalize:                   Normalization,
    pub train_fraction:              f64,
    pub dev_fraction:                f64,
    /// Steps per training window; yields max_len - 1 input/target pairs
    pub max_len:                     usize,
    pub batch_size:                  usize,
    pub epochs:                      usize,
    pub patience:                    usize,
    pub lr:                          f64,
    pub hidden_dims:                 Vec<usize>,
    pub kernel_size:                 usize,
    pub bias:                        bool,
    pub loss:                        LossFunction,
    pub include_partial_train_batch: bool,
    pub include_partial_dev_batch:   bool,
    pub experiment_id:               i64,
    pub results_db:                  Option<String>,
    pub plot:                        bool,
    pub seed:                        u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            output_dir:                  "checkpoints".to_string(),
            data_path:                   None,
            synthetic_sequences:         200,
            synthetic_len:               12,
            channels:                    1,
            height:                      16,
            width:                       16,
            normalize:                   Normalization::None,
            train_fraction:              0.7,
            dev_fraction:                0.15,
            max_len:                     10,
            batch_size:                  16,
            epochs:                      20,
            patience:                    5,
            lr:                          1e-3,
            hidden_dims:                 vec![16, 16],
            kernel_size:                 3,
            bias:                        true,
            loss:                        LossFunction::Mse,
            include_partial_train_batch: false,
            include_partial_dev_batch:   true,
            experiment_id:               0,
            results_db:                  None,
            plot:                        false,
            seed:                        42,
        }
    }
}

impl TrainConfig {
    /// Reject settings that cannot produce a run.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.epochs > 0, "epochs must be positive");
        ensure!(self.max_len >= 2, "max_len must be at least 2, got {}", self.max_len);
        ensure!(self.lr > 0.0, "lr must be positive, got {}", self.lr);
        ensure!(!self.hidden_dims.is_empty(), "at least one hidden layer is required");
        ensure!(
            self.hidden_dims.iter().all(|&d| d > 0),
            "hidden dims must be positive: {:?}",
            self.hidden_dims
        );
        // "same" padding of kernel/2 keeps the grid size only for odd kernels
        ensure!(
            self.kernel_size % 2 == 1,
            "kernel_size must be odd, got {}",
            self.kernel_size
        );
        Ok(())
    }

    pub fn map_shape(&self) -> MapShape {
        MapShape::new(self.channels, self.height, self.width)
    }
}

/// Load the configured sequences, normalize them and split them.
/// Deterministic for a given config, so evaluation sees the same
/// test rows that training held out.
pub fn load_split(cfg: &TrainConfig) -> Result<DataSplit> {
    let source: Box<dyn SequenceSource> = match &cfg.data_path {
        Some(path) => {
            tracing::info!("Loading sequences from '{}'", path);
            Box::new(JsonSequenceLoader::new(path))
        }
        None => Box::new(SyntheticPrecipitation::new(
            cfg.synthetic_sequences,
            cfg.synthetic_len,
            cfg.map_shape(),
            cfg.seed,
        )),
    };
    let mut set = source.load()?;

    ensure!(
        cfg.max_len <= set.seq_len(),
        "max_len {} exceeds the sequence length {}",
        cfg.max_len,
        set.seq_len()
    );

    cfg.normalize.normalize(&mut set);
    split_train_dev_test(&set, cfg.train_fraction, cfg.dev_fraction, cfg.seed)
}

/// What a finished run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_dev_loss: f64,
    pub stopped_early: bool,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate().context("Invalid training configuration")?;

        // ── Steps 2-4: Data ───────────────────────────────────────────────────
        let split = load_split(cfg)?;
        tracing::info!(
            "Split: {} train, {} dev, {} test sequences",
            split.train.len(),
            split.dev.len(),
            split.test.len()
        );

        // ── Step 5: Save config for evaluation ────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.output_dir);
        checkpoints.save_config(cfg)?;

        // ── Step 6: Results sinks and plotter ─────────────────────────────────
        let mut sinks: Vec<Box<dyn ResultsSink>> = Vec::new();
        match CsvResultsSink::new(&cfg.output_dir) {
            Ok(csv) => sinks.push(Box::new(csv)),
            Err(e) => tracing::warn!("CSV metrics disabled: {:#}", e),
        }
        if let Some(db) = cfg.results_db.as_deref().and_then(|path| SqliteResultsSink::connect_or_skip(path)) {
            sinks.push(Box::new(db));
        }
        let plotter = cfg
            .plot
            .then(|| ErrorCurvePlotter::new(&cfg.output_dir, cfg.hidden_dims.len()));

        // ── Step 7: Training loop (Layer 5) ───────────────────────────────────
        let hooks = TrainingHooks {
            checkpoints: &checkpoints,
            sinks: &mut sinks,
            plotter: plotter.as_ref(),
        };
        let report = run_training(cfg, &split.train, &split.dev, hooks)?;

        match report.best_epoch {
            Some(epoch) => tracing::info!(
                "Best dev loss {:.6} at epoch {} ({} epochs run)",
                report.best_dev_loss,
                epoch,
                report.epochs_run
            ),
            None => tracing::warn!("No epoch produced a finite dev loss; no checkpoint written"),
        }

        Ok(TrainSummary {
            epochs_run: report.epochs_run,
            best_epoch: report.best_epoch,
            best_dev_loss: report.best_dev_loss,
            stopped_early: report.stopped_early,
        })
    }
}
