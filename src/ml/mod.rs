// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// Everything that touches the recurrent model lives here.
//
//   cell.rs       - ConvLSTM cell: one gated convolutional step
//                   over (hidden, memory) spatial state
//
//   model.rs      - Stacked ConvLSTM with a 1x1 output head and
//                   scheduled sampling; owns no state between
//                   calls (NetState is threaded by the caller)
//
//   schedule.rs   - Linear epsilon decay for scheduled sampling
//
//   loss.rs       - MSE / MAE regression loss
//
//   trainer.rs    - Epoch loop: minibatches, Adam, evaluation,
//                   early stopping, best checkpoint
//
//   evaluator.rs  - Free-running evaluation, summed step losses
//
//   inferencer.rs - Rebuilds a trained model from its checkpoint
//                   and evaluates it on held-out data
//
// Backends:
//   Training runs on Autodiff<NdArray> (CPU) by default, or on
//   Autodiff<Wgpu> with the `wgpu` cargo feature. Evaluation
//   uses the inner backend, which records no gradients.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

use burn::tensor::backend::AutodiffBackend;

pub mod cell;
pub mod evaluator;
pub mod inferencer;
pub mod loss;
pub mod model;
pub mod schedule;
pub mod trainer;

#[cfg(not(feature = "wgpu"))]
pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

#[cfg(feature = "wgpu")]
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub type InferenceBackend = <TrainBackend as AutodiffBackend>::InnerBackend;
