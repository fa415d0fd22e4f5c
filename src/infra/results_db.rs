// ============================================================
// Layer 6 - SQLite Results Sink
// ============================================================
// Inserts one row per epoch into a shared results database:
//
//   results(exp_id, epoch, train_loss, dev_loss)
//
// Several experiments write to the same table, told apart by
// exp_id. The database is optional: when it cannot be opened the
// run continues with the remaining sinks.
//
// Reference: rusqlite documentation (Connection, params!)

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::domain::{results::EpochResult, traits::ResultsSink};

pub struct SqliteResultsSink {
    conn: Connection,
}

impl SqliteResultsSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Cannot open results database '{}'", path.display()))?;
        Self::with_connection(conn)
    }

    /// Open the database, or log a warning and return None.
    pub fn connect_or_skip(path: impl AsRef<Path>) -> Option<Self> {
        match Self::open(path.as_ref()) {
            Ok(sink) => {
                tracing::info!("Reporting results to '{}'", path.as_ref().display());
                Some(sink)
            }
            Err(e) => {
                tracing::warn!("Results database unavailable, continuing without it: {:#}", e);
                None
            }
        }
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS results(
                exp_id     INTEGER NOT NULL,
                epoch      INTEGER NOT NULL,
                train_loss REAL    NOT NULL,
                dev_loss   REAL    NOT NULL
            );",
        )
        .context("Cannot create results table")?;
        Ok(Self { conn })
    }
}

impl ResultsSink for SqliteResultsSink {
    fn report(&mut self, r: &EpochResult) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO results(exp_id, epoch, train_loss, dev_loss) VALUES(?1, ?2, ?3, ?4)",
                params![r.experiment_id, r.epoch as i64, r.train_loss, r.dev_loss],
            )
            .with_context(|| format!("Cannot insert result for epoch {}", r.epoch))?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// (epoch, train_loss, dev_loss) rows of one experiment, by epoch.
    fn rows(sink: &SqliteResultsSink, experiment_id: i64) -> Vec<(i64, f64, f64)> {
        let mut stmt = sink
            .conn
            .prepare("SELECT epoch, train_loss, dev_loss FROM results WHERE exp_id = ?1 ORDER BY epoch")
            .unwrap();
        stmt.query_map(params![experiment_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_inserts_rows_per_experiment() {
        let conn = Connection::open_in_memory().unwrap();
        let mut sink = SqliteResultsSink::with_connection(conn).unwrap();

        sink.report(&EpochResult::new(1, 0, 0.5, 4.0, 1.0)).unwrap();
        sink.report(&EpochResult::new(1, 1, 0.4, 3.5, 0.9)).unwrap();
        sink.report(&EpochResult::new(2, 0, 0.7, 5.0, 1.0)).unwrap();

        assert_eq!(rows(&sink, 1), vec![(0, 0.5, 4.0), (1, 0.4, 3.5)]);
        assert_eq!(rows(&sink, 2).len(), 1);
    }

    #[test]
    fn test_unreachable_database_is_skipped() {
        assert!(SqliteResultsSink::connect_or_skip("/no/such/dir/results.db").is_none());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.db");
        {
            let mut sink = SqliteResultsSink::open(&path).unwrap();
            sink.report(&EpochResult::new(9, 0, 1.0, 2.0, 1.0)).unwrap();
        }
        let sink = SqliteResultsSink::open(&path).unwrap();
        assert_eq!(rows(&sink, 9), vec![(0, 1.0, 2.0)]);
    }
}
