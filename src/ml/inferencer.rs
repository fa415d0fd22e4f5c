// ============================================================
// Layer 5 - Inferencer
// ============================================================
use anyhow::Result;
use burn::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::{prepare_dev, to_tensor};
use crate::domain::sequence::SequenceSet;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::evaluator::{evaluate, EvaluationReport};
use crate::ml::model::ConvLstmNet;
use crate::ml::trainer::model_config;
use crate::ml::InferenceBackend;

pub struct Inferencer {
    model: ConvLstmNet<InferenceBackend>,
    cfg: TrainConfig,
    device: <InferenceBackend as Backend>::Device,
}

impl Inferencer {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, data: &SequenceSet) -> Result<Self> {
        let device = Default::default();
        let cfg = ckpt_manager.load_config()?;
        let model: ConvLstmNet<InferenceBackend> = model_config(&cfg, data.shape()).init(&device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self { model, cfg, device })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.cfg
    }

    /// Evaluate on held-out sequences starting from a zero state.
    /// Sequences are framed the same way as the dev set during training.
    pub fn evaluate(&self, seqs: &SequenceSet) -> Result<EvaluationReport> {
        let pair = prepare_dev(
            seqs.data(),
            self.cfg.batch_size,
            self.cfg.max_len,
            self.cfg.include_partial_dev_batch,
        )?;
        let x = to_tensor::<InferenceBackend>(&pair.input, &self.device);
        let y = to_tensor::<InferenceBackend>(&pair.target, &self.device);

        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let (report, _) = evaluate(&self.model, self.cfg.loss, &x, &y, None, &mut rng);
        Ok(report)
    }
}
