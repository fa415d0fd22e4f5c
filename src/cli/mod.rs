// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and hands the work to Layer 2 (application).
//
//   1. `train`    → trains a ConvLSTM and keeps the best checkpoint
//   2. `evaluate` → scores that checkpoint on the held-out test split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "precip-convlstm",
    version = "0.1.0",
    about = "Train a ConvLSTM on precipitation map sequences, then evaluate it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Writing run artifacts to: {}", args.output_dir);
    let summary = TrainUseCase::new(args.into()).execute()?;

    match summary.best_epoch {
        Some(epoch) => println!(
            "Training complete after {} epochs{}. Best dev loss {:.6} at epoch {}.",
            summary.epochs_run,
            if summary.stopped_early { " (early stop)" } else { "" },
            summary.best_dev_loss,
            epoch
        ),
        None => println!("Training complete. No checkpoint was saved."),
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let summary = EvaluateUseCase::new(args.output_dir).execute()?;

    if let Some(epoch) = summary.best_epoch {
        println!("Checkpoint from epoch {epoch}");
    }
    println!(
        "Test loss: {:.6} ({} sequences, {} steps)",
        summary.report.total_loss,
        summary.test_sequences,
        summary.report.step_losses.len()
    );
    Ok(())
}
