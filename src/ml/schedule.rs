// ============================================================
// Layer 5 - Scheduled Sampling Schedule
// ============================================================
// Epsilon is the probability that the ground-truth previous frame
// (rather than the model's own prediction) is fed into the next
// step. It starts at 1.0 (pure teacher forcing) and decays
// linearly to 0 over the configured number of epochs:
//
//   epsilon(epoch) = max(0, 1 - epoch / epochs)
//
// The decay constant is fixed when the scheduler is built and
// never changes for the rest of the run.
//
// Reference: Bengio et al. (2015) Scheduled Sampling for
//            Sequence Prediction with Recurrent Neural Networks

/// Linear epsilon decay for scheduled sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonScheduler {
    decay_constant: f64,
}

impl EpsilonScheduler {
    /// Epsilon at the start of training, before any decay.
    pub const INITIAL: f64 = 1.0;

    /// Build the schedule for a run of `epochs` epochs.
    /// `epochs` must be non-zero (checked by `TrainConfig::validate`).
    pub fn new(epochs: usize) -> Self {
        Self {
            decay_constant: -1.0 / epochs as f64,
        }
    }

    pub fn decay_constant(&self) -> f64 {
        self.decay_constant
    }

    pub fn epsilon(&self, epoch: usize) -> f64 {
        (1.0 + self.decay_constant * epoch as f64).max(0.0)
    }
}
