// ============================================================
// Layer 5 - Evaluation Loop
// ============================================================
// Runs a frozen model over a dev (or test) sequence one time step
// at a time and accumulates the loss.
//
// Evaluation always samples the model's own previous prediction
// (epsilon = 0): it is a free-running rollout that starts from
// whatever recurrent state the caller hands in. The training loop
// passes the state it finished the epoch with; the evaluate
// command passes None.
//
// The reported dev loss is the SUM of per-step losses, not the
// mean. Comparing runs with different dev lengths needs external
// normalisation (step_losses.len() is available for that).

use burn::prelude::*;
use rand::Rng;

use crate::ml::loss::LossFunction;
use crate::ml::model::{NetState, StatefulSequenceModel};

/// Sampling rate used for every evaluation step.
pub const EVAL_EPSILON: f64 = 0.0;

/// Per-step mean and standard deviation of the absolute error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorCurve {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ErrorCurve {
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    /// Sum of step_losses
    pub total_loss: f64,
    pub step_losses: Vec<f64>,
    pub error_curve: ErrorCurve,
}

/// Evaluate `model` on `dev_x` / `dev_y` (both [batch, time, features]).
///
/// Returns the report and the recurrent state after the last step.
pub fn evaluate<B, M, R>(
    model: &M,
    loss_fn: LossFunction,
    dev_x: &Tensor<B, 3>,
    dev_y: &Tensor<B, 3>,
    state: Option<NetState<B>>,
    rng: &mut R,
) -> (EvaluationReport, Option<NetState<B>>)
where
    B: Backend,
    M: StatefulSequenceModel<B>,
    R: Rng,
{
    let [batch_size, seq_len, features] = dev_x.dims();
    tracing::info!("Evaluating on dev set... ({} precipitation maps)", seq_len);

    // step 0 reads dev_x; only the layer states carry over
    let mut state = state.map(NetState::into_carried);
    let mut step_losses = Vec::with_capacity(seq_len);
    let mut error_curve = ErrorCurve::default();

    for step in 0..seq_len {
        let frame = dev_x
            .clone()
            .slice([0..batch_size, step..step + 1, 0..features])
            .reshape([batch_size, features]);
        let target = dev_y
            .clone()
            .slice([0..batch_size, step..step + 1, 0..features])
            .reshape([batch_size, features]);

        let (prediction, next) = model.forward_step(frame, state, EVAL_EPSILON, rng);
        state = Some(next);

        let step_loss = loss_fn
            .compute(prediction.clone(), target.clone())
            .into_scalar()
            .elem::<f64>();
        tracing::debug!("Step {} loss = {:.10}", step, step_loss);
        step_losses.push(step_loss);

        let abs_err = (prediction - target).abs();
        let mean = abs_err.clone().mean().into_scalar().elem::<f64>();
        let var = abs_err
            .sub_scalar(mean)
            .powf_scalar(2.0)
            .mean()
            .into_scalar()
            .elem::<f64>();
        error_curve.mean.push(mean);
        error_curve.std.push(var.sqrt());
    }

    let total_loss = step_losses.iter().sum();
    let report = EvaluationReport {
        total_loss,
        step_losses,
        error_curve,
    };
    (report, state)
}
