// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Side channels of a training run that touch the filesystem or
// a database:
//
//   checkpoint.rs  → best-model parameters, best epoch and the
//                    run's TrainConfig
//   metrics.rs     → CSV results sink (metrics.csv)
//   results_db.rs  → SQLite results sink, optional
//   plot.rs        → per-step dev error curves as PNG
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Epoch results appended to a CSV file
pub mod metrics;

/// Epoch results inserted into SQLite
pub mod results_db;

/// Error-curve plots
pub mod plot;
