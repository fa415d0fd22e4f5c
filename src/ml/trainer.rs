// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Epoch loop with scheduled sampling, early stopping and
// best-model checkpointing, driven by Adam.
//
// Per epoch:
//   1. Shuffle the training rows (fresh permutation)
//   2. For every minibatch: forward with the carried recurrent
//      state and current epsilon, loss, backward, Adam step
//   3. Decay epsilon for the next epoch
//   4. Evaluate on the dev set with model.valid() (no autodiff),
//      starting from the state training finished with
//   5. Report (train_loss, dev_loss) to every results sink
//   6. Early stopping and checkpoint on improvement
//
// Recurrent state is threaded through every minibatch and epoch.
// It is detached before each minibatch so backpropagation stops
// at the minibatch boundary. Evaluation receives a copy of it on
// the inner backend; whatever evaluation ends with is dropped and
// training resumes from its own state.
//
// Reference: Burn Book §5 (Training), Kingma & Ba (2015) Adam

use std::time::Instant;

use anyhow::{ensure, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::{next_step_pair, prepare_dev, shuffle_rows, to_tensor, MinibatchPlan};
use crate::domain::{results::EpochResult, sequence::{MapShape, SequenceSet}, traits::ResultsSink};
use crate::infra::{checkpoint::CheckpointManager, plot::ErrorCurvePlotter};
use crate::ml::evaluator::evaluate;
use crate::ml::model::{ConvLstmNet, ConvLstmNetConfig, NetState, StatefulSequenceModel};
use crate::ml::schedule::EpsilonScheduler;
use crate::ml::TrainBackend;

// ─── Early stopping ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Strictly lower dev loss than every earlier epoch
    Improved,
    NoImprovement,
    /// bad_count exceeded patience; stop training
    Converged,
}

/// Tracks the best dev loss and the run of epochs since it was set.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_loss: f64,
    best_epoch: Option<usize>,
    bad_count: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_loss: f64::INFINITY,
            best_epoch: None,
            bad_count: 0,
        }
    }

    pub fn observe(&mut self, epoch: usize, dev_loss: f64) -> Verdict {
        self.bad_count += 1;
        if dev_loss < self.best_loss {
            self.bad_count = 0;
            self.best_loss = dev_loss;
            self.best_epoch = Some(epoch);
            return Verdict::Improved;
        }
        if self.bad_count > self.patience {
            Verdict::Converged
        } else {
            Verdict::NoImprovement
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn bad_count(&self) -> usize {
        self.bad_count
    }
}

// ─── Hooks and report ─────────────────────────────────────────────────────────
/// Side channels the loop writes to. Sinks and plotter are optional.
pub struct TrainingHooks<'a> {
    pub checkpoints: &'a CheckpointManager,
    pub sinks: &'a mut [Box<dyn ResultsSink>],
    pub plotter: Option<&'a ErrorCurvePlotter>,
}

pub struct TrainingReport<M> {
    /// The model after the last epoch run (the best one is on disk)
    pub model: M,
    pub epochs_run: usize,
    pub minibatches_per_epoch: usize,
    pub best_epoch: Option<usize>,
    pub best_dev_loss: f64,
    pub stopped_early: bool,
    pub history: Vec<EpochResult>,
}

/// Model architecture for a run, from the config and the data's map shape.
pub fn model_config(cfg: &TrainConfig, shape: MapShape) -> ConvLstmNetConfig {
    ConvLstmNetConfig::new(shape.channels, shape.height, shape.width, cfg.hidden_dims.clone())
        .with_kernel_size([cfg.kernel_size, cfg.kernel_size])
        .with_bias(cfg.bias)
}

pub fn run_training(
    cfg: &TrainConfig,
    train_seqs: &SequenceSet,
    dev_seqs: &SequenceSet,
    hooks: TrainingHooks<'_>,
) -> Result<TrainingReport<ConvLstmNet<TrainBackend>>> {
    let device = <TrainBackend as Backend>::Device::default();
    tracing::info!("Using device: {:?}", device);

    let model: ConvLstmNet<TrainBackend> = model_config(cfg, train_seqs.shape()).init(&device);
    tracing::info!(
        "Model ready: {} ConvLSTM layers, hidden dims {:?}",
        model.num_layers(),
        cfg.hidden_dims
    );

    train_loop(cfg, model, train_seqs, dev_seqs, &device, hooks)
}

pub fn train_loop<B, M>(
    cfg: &TrainConfig,
    mut model: M,
    train_seqs: &SequenceSet,
    dev_seqs: &SequenceSet,
    device: &B::Device,
    mut hooks: TrainingHooks<'_>,
) -> Result<TrainingReport<M>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + StatefulSequenceModel<B>,
    M::InnerModule: StatefulSequenceModel<B::InnerBackend>,
{
    tracing::info!("Training started... exp_id = {}", cfg.experiment_id);
    let started = Instant::now();

    // ── Dev set: row blocks become extra time steps of one batch ─────────────
    let dev = prepare_dev(
        dev_seqs.data(),
        cfg.batch_size,
        cfg.max_len,
        cfg.include_partial_dev_batch,
    )?;
    let dev_x = to_tensor::<B::InnerBackend>(&dev.input, device);
    let dev_y = to_tensor::<B::InnerBackend>(&dev.target, device);

    // ── Minibatch plan is fixed for the run; only the row order changes ──────
    let num_seqs = train_seqs.len();
    let plan = MinibatchPlan::new(num_seqs, cfg.batch_size, cfg.include_partial_train_batch);
    ensure!(
        !plan.is_empty(),
        "Training set of {} sequences has no minibatch of size {}",
        num_seqs,
        cfg.batch_size
    );
    tracing::info!("Number of minibatches per epoch: {}", plan.len());

    let schedule = EpsilonScheduler::new(cfg.epochs);
    let mut epsilon = EpsilonScheduler::INITIAL;
    let mut stopping = EarlyStopping::new(cfg.patience);
    let mut optim = AdamConfig::new().init::<B, M>();
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let mut state: Option<NetState<B>> = None;
    let mut history = Vec::with_capacity(cfg.epochs);
    let mut epochs_run = 0;
    let mut stopped_early = false;

    for epoch in 0..cfg.epochs {
        tracing::info!("Epoch {}", epoch);
        epochs_run += 1;

        // ── Training phase ────────────────────────────────────────────────────
        let shuffled = shuffle_rows(train_seqs.data(), &mut rng);
        let mut train_loss_sum = 0.0f64;

        for rows in plan.iter() {
            let pair = next_step_pair(&shuffled, rows.clone(), cfg.max_len);
            let mb_x = to_tensor::<B>(&pair.input, device);
            let mb_y = to_tensor::<B>(&pair.target, device);

            let carried = state.take().map(NetState::detach);
            let (outputs, next) = model.forward_sequence(mb_x, carried, epsilon, &mut rng);
            state = Some(next);

            let loss = cfg.loss.compute(outputs, mb_y);
            let loss_val = loss.clone().into_scalar().elem::<f64>();
            tracing::debug!("Train loss = {:.7}", loss_val);
            train_loss_sum += loss_val;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let train_loss = train_loss_sum / plan.len() as f64;
        let epoch_epsilon = epsilon;
        epsilon = schedule.epsilon(epoch);
        tracing::info!("Linear decay applied. epsilon={:.5}", epsilon);

        // ── Evaluation phase (inner backend, no gradient tracking) ────────────
        let model_valid = model.valid();
        let eval_state = state.clone().map(NetState::into_inner);
        let (report, _) = evaluate(&model_valid, cfg.loss, &dev_x, &dev_y, eval_state, &mut rng);
        let dev_loss = report.total_loss;

        let result = EpochResult::new(cfg.experiment_id, epoch, train_loss, dev_loss, epoch_epsilon);
        for sink in hooks.sinks.iter_mut() {
            if let Err(e) = sink.report(&result) {
                tracing::warn!("Results sink failed for epoch {}: {:#}", epoch, e);
            }
        }
        if let Some(plotter) = hooks.plotter {
            match plotter.plot(epoch, &report.error_curve) {
                Ok(Some(path)) => tracing::info!("Saved error curve to '{}'", path.display()),
                Ok(None) => {}
                Err(e) => tracing::warn!("Could not plot epoch {}: {:#}", epoch, e),
            }
        }
        history.push(result);

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.6} | dev_loss={:.6} | epsilon={:.3}",
            epoch,
            cfg.epochs,
            train_loss,
            dev_loss,
            epoch_epsilon,
        );

        // ── Convergence ───────────────────────────────────────────────────────
        match stopping.observe(epoch, dev_loss) {
            Verdict::Improved => {
                hooks.checkpoints.save_best::<B, M>(&model, epoch)?;
                tracing::info!("New best dev loss {:.6}; checkpoint saved", dev_loss);
            }
            Verdict::NoImprovement => {
                tracing::debug!("No improvement for {} epoch(s)", stopping.bad_count());
            }
            Verdict::Converged => {
                tracing::info!("Converged due to early stopping...");
                stopped_early = true;
                break;
            }
        }
    }

    tracing::info!("Training finished in {:.1?}", started.elapsed());

    Ok(TrainingReport {
        model,
        epochs_run,
        minibatches_per_epoch: plan.len(),
        best_epoch: stopping.best_epoch(),
        best_dev_loss: stopping.best_loss(),
        stopped_early,
        history,
    })
}
