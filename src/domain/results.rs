// ============================================================
// Layer 3 - Epoch Result Domain Type
// ============================================================
// One row of experiment results: what a results sink receives
// after every epoch.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochResult {
    /// Identifies the run in a shared results store
    pub experiment_id: i64,

    /// Zero-based epoch index
    pub epoch: usize,

    /// Mean minibatch loss over the epoch
    pub train_loss: f64,

    /// Summed per-step loss over the dev sequence
    pub dev_loss: f64,

    /// Scheduled-sampling epsilon used while training this epoch
    pub epsilon: f64,
}

impl EpochResult {
    pub fn new(
        experiment_id: i64,
        epoch: usize,
        train_loss: f64,
        dev_loss: f64,
        epsilon: f64,
    ) -> Self {
        Self { experiment_id, epoch, train_loss, dev_loss, epsilon }
    }
}
