// ============================================================
// Layer 6 - CSV Results Sink
// ============================================================
// Appends one row per epoch to metrics.csv in the output
// directory. The header is written only when the file is new,
// so repeated runs (different exp_id) share one file.
//
// Example:
//   exp_id,epoch,train_loss,dev_loss,epsilon
//   0,0,0.412300,3.118200,1.000000
//   0,1,0.288100,2.705400,1.000000
//   0,2,0.250900,2.615000,0.950000
//
// Reading it:
//   - dev_loss is a SUM over dev steps, so it is larger than
//     train_loss (a per-minibatch mean) by roughly the number
//     of dev steps
//   - a rising dev_loss while epsilon falls usually means the
//     model is not yet robust to its own predictions
//
// Reference: Rust Book §12 (I/O and File Handling)

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::domain::{results::EpochResult, traits::ResultsSink};

pub const CSV_HEADER: &str = "exp_id,epoch,train_loss,dev_loss,epsilon";

pub struct CsvResultsSink {
    csv_path: PathBuf,
}

impl CsvResultsSink {
    /// Create the sink, writing the header if metrics.csv is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl ResultsSink for CsvResultsSink {
    fn report(&mut self, r: &EpochResult) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6}",
            r.experiment_id, r.epoch, r.train_loss, r.dev_loss, r.epsilon,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, dev_loss={:.4}",
            r.epoch,
            r.train_loss,
            r.dev_loss,
        );
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_rows_under_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvResultsSink::new(dir.path()).unwrap();
        sink.report(&EpochResult::new(3, 0, 0.5, 2.25, 1.0)).unwrap();
        sink.report(&EpochResult::new(3, 1, 0.25, 2.0, 0.95)).unwrap();

        // reopening must not write a second header
        let mut again = CsvResultsSink::new(dir.path()).unwrap();
        again.report(&EpochResult::new(4, 0, 1.0, 3.0, 1.0)).unwrap();

        let text = fs::read_to_string(sink.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "3,0,0.500000,2.250000,1.000000");
        assert_eq!(lines[2], "3,1,0.250000,2.000000,0.950000");
        assert!(lines[3].starts_with("4,0,"));
    }
}
