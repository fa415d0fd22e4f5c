// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and all
// their flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::data::preprocessor::Normalization;
use crate::ml::loss::LossFunction;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a ConvLSTM on precipitation map sequences
    Train(TrainArgs),

    /// Score the best checkpoint of a run on its test split
    Evaluate(EvaluateArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory for the checkpoint, config, metrics and plots
    #[arg(long, default_value = "checkpoints")]
    pub output_dir: String,

    /// JSON dataset file; synthetic rain cells are used when omitted
    #[arg(long)]
    pub data_path: Option<String>,

    /// Number of synthetic sequences to generate
    #[arg(long, default_value_t = 200)]
    pub synthetic_sequences: usize,

    /// Frames per synthetic sequence
    #[arg(long, default_value_t = 12)]
    pub synthetic_len: usize,

    #[arg(long, default_value_t = 1)]
    pub channels: usize,

    #[arg(long, default_value_t = 16)]
    pub height: usize,

    #[arg(long, default_value_t = 16)]
    pub width: usize,

    #[arg(long, value_enum, default_value_t = Normalization::None)]
    pub normalize: Normalization,

    #[arg(long, default_value_t = 0.7)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 0.15)]
    pub dev_fraction: f64,

    /// Steps per training window (at least 2)
    #[arg(long, default_value_t = 10)]
    pub max_len: usize,

    /// Sequences per minibatch
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    /// Epochs without a new best dev loss tolerated before stopping
    #[arg(long, default_value_t = 5)]
    pub patience: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Hidden channels per ConvLSTM layer, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = vec![16, 16])]
    pub hidden_dims: Vec<usize>,

    /// Square convolution kernel size (odd)
    #[arg(long, default_value_t = 3)]
    pub kernel_size: usize,

    /// Build the gate convolutions without a bias term
    #[arg(long)]
    pub no_bias: bool,

    #[arg(long, value_enum, default_value_t = LossFunction::Mse)]
    pub loss: LossFunction,

    /// Also train on the last, smaller minibatch of each epoch
    #[arg(long)]
    pub include_partial_train_batch: bool,

    /// Fail instead of using a dev set smaller than one minibatch
    #[arg(long)]
    pub require_full_dev_batch: bool,

    /// Identifies this run in the results store
    #[arg(long, default_value_t = 0)]
    pub experiment_id: i64,

    /// SQLite database to report epoch results to
    #[arg(long)]
    pub results_db: Option<String>,

    /// Write error-curve plots at epochs 0, 10 and 19
    #[arg(long)]
    pub plot: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            output_dir:                  a.output_dir,
            data_path:                   a.data_path,
            synthetic_sequences:         a.synthetic_sequences,
            synthetic_len:               a.synthetic_len,
            channels:                    a.channels,
            height:                      a.height,
            width:                       a.width,
            normalize:                   a.normalize,
            train_fraction:              a.train_fraction,
            dev_fraction:                a.dev_fraction,
            max_len:                     a.max_len,
            batch_size:                  a.batch_size,
            epochs:                      a.epochs,
            patience:                    a.patience,
            lr:                          a.lr,
            hidden_dims:                 a.hidden_dims,
            kernel_size:                 a.kernel_size,
            bias:                        !a.no_bias,
            loss:                        a.loss,
            include_partial_train_batch: a.include_partial_train_batch,
            include_partial_dev_batch:   !a.require_full_dev_batch,
            experiment_id:               a.experiment_id,
            results_db:                  a.results_db,
            plot:                        a.plot,
            seed:                        a.seed,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Output directory of the training run
    #[arg(long, default_value = "checkpoints")]
    pub output_dir: String,
}
