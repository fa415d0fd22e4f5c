// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The application layer talks to data sources and result stores
// only through these traits, so a file loader and a synthetic
// generator (or a CSV log and a SQLite table) are
// interchangeable.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Trait Objects)

use anyhow::Result;

use crate::domain::results::EpochResult;
use crate::domain::sequence::SequenceSet;

// ─── SequenceSource ───────────────────────────────────────────────────────────
/// Anything that can produce a set of gridded map sequences.
///
/// Implementations:
///   - JsonSequenceLoader     → reads a JSON dataset file
///   - SyntheticPrecipitation → generates drifting rain cells
pub trait SequenceSource {
    fn load(&self) -> Result<SequenceSet>;
}

// ─── ResultsSink ──────────────────────────────────────────────────────────────
/// Receives (train_loss, dev_loss) after every epoch.
///
/// Implementations:
///   - CsvResultsSink    → appends to metrics.csv
///   - SqliteResultsSink → inserts into a results table
///
/// The training loop treats a failed report as non-fatal.
pub trait ResultsSink {
    fn report(&mut self, result: &EpochResult) -> Result<()>;
}
