// ============================================================
// Layer 2 - EvaluateUseCase
// ============================================================
// Scores the best checkpoint of a finished run on its held-out
// test split:
//
//   Step 1: Load the run's TrainConfig           (Layer 6 - infra)
//   Step 2: Rebuild the same data split          (Layer 4 - data)
//   Step 3: Rebuild the model, load the weights  (Layer 5 - ml)
//   Step 4: Free-running rollout from zero state (Layer 5 - ml)

use anyhow::{Context, Result};

use crate::application::train_use_case::load_split;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::evaluator::EvaluationReport;
use crate::ml::inferencer::Inferencer;

#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub best_epoch: Option<usize>,
    pub test_sequences: usize,
    pub report: EvaluationReport,
}

pub struct EvaluateUseCase {
    output_dir: String,
}

impl EvaluateUseCase {
    pub fn new(output_dir: impl Into<String>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    pub fn execute(&self) -> Result<EvaluationSummary> {
        let checkpoints = CheckpointManager::new(&self.output_dir);
        let cfg = checkpoints.load_config()?;

        let split = load_split(&cfg)?;
        tracing::info!("Evaluating on {} test sequences", split.test.len());

        let inferencer = Inferencer::from_checkpoint(&checkpoints, &split.test)?;
        let report = inferencer
            .evaluate(&split.test)
            .context("Cannot evaluate on the test split")?;

        tracing::info!(
            "Test loss {:.6} over {} steps",
            report.total_loss,
            report.step_losses.len()
        );

        Ok(EvaluationSummary {
            best_epoch: checkpoints.best_epoch().ok(),
            test_sequences: split.test.len(),
            report,
        })
    }
}
