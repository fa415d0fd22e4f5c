// ============================================================
// Layer 4 - Sequence Sources
// ============================================================
// Two ways to obtain a SequenceSet:
//
//   JsonSequenceLoader     → reads a dataset file of the form
//
//     {
//       "channels": 1, "height": 16, "width": 16,
//       "sequences": [            // n sequences
//         [                       //   t frames each
//           [0.0, 0.3, ...]       //     c*h*w values, row-major
//         ]
//       ]
//     }
//
//   SyntheticPrecipitation → a seeded generator of rain cells:
//     Gaussian blobs that drift across the grid at a constant
//     velocity, so the next frame is predictable from the
//     previous ones. Intensities are never negative.
//
// Both implement the SequenceSource trait from Layer 3.
//
// Reference: serde_json documentation
//            rand crate documentation (StdRng, gen_range)

use std::{fs, path::PathBuf};

use anyhow::{ensure, Context, Result};
use ndarray::Array3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;

use crate::domain::sequence::{MapShape, SequenceSet};
use crate::domain::traits::SequenceSource;

// ─── JSON file ────────────────────────────────────────────────────────────────
#[derive(Debug, Deserialize)]
struct JsonDataset {
    channels: usize,
    height: usize,
    width: usize,
    sequences: Vec<Vec<Vec<f32>>>,
}

pub struct JsonSequenceLoader {
    path: PathBuf,
}

impl JsonSequenceLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SequenceSource for JsonSequenceLoader {
    fn load(&self) -> Result<SequenceSet> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read dataset '{}'", self.path.display()))?;
        let dataset: JsonDataset = serde_json::from_str(&json)
            .with_context(|| format!("Invalid dataset file '{}'", self.path.display()))?;

        let shape = MapShape::new(dataset.channels, dataset.height, dataset.width);
        let set = dataset_to_set(dataset.sequences, shape)?;

        tracing::info!(
            "Loaded {} sequences of {} frames from '{}'",
            set.len(),
            set.seq_len(),
            self.path.display()
        );
        Ok(set)
    }
}

/// Pack nested frames into one dense array, checking every
/// sequence and frame has the same length.
fn dataset_to_set(sequences: Vec<Vec<Vec<f32>>>, shape: MapShape) -> Result<SequenceSet> {
    ensure!(!sequences.is_empty(), "Dataset contains no sequences");
    let features = shape.features();
    ensure!(features > 0, "Map shape {:?} has no cells", shape);

    let seq_len = sequences[0].len();
    let num_seqs = sequences.len();
    let mut values = Vec::with_capacity(num_seqs * seq_len * features);

    for (i, seq) in sequences.into_iter().enumerate() {
        ensure!(
            seq.len() == seq_len,
            "Sequence {} has {} frames, expected {}",
            i,
            seq.len(),
            seq_len
        );
        for (t, frame) in seq.into_iter().enumerate() {
            ensure!(
                frame.len() == features,
                "Sequence {} frame {} has {} values, expected {}",
                i,
                t,
                frame.len(),
                features
            );
            values.extend(frame);
        }
    }

    let data = Array3::from_shape_vec((num_seqs, seq_len, features), values)?;
    SequenceSet::new(data, shape)
}

// ─── Synthetic rain cells ─────────────────────────────────────────────────────
#[derive(Debug, Clone)]
struct RainCell {
    row: f32,
    col: f32,
    d_row: f32,
    d_col: f32,
    sigma: f32,
    peak: f32,
}

pub struct SyntheticPrecipitation {
    num_sequences: usize,
    seq_len: usize,
    shape: MapShape,
    seed: u64,
}

impl SyntheticPrecipitation {
    pub const MAX_CELLS: usize = 3;

    pub fn new(num_sequences: usize, seq_len: usize, shape: MapShape, seed: u64) -> Self {
        Self { num_sequences, seq_len, shape, seed }
    }

    fn random_cell(&self, rng: &mut StdRng) -> RainCell {
        let h = self.shape.height as f32;
        let w = self.shape.width as f32;
        let scale = h.min(w);
        RainCell {
            row: rng.gen_range(0.0..h),
            col: rng.gen_range(0.0..w),
            d_row: rng.gen_range(-0.1..0.1) * scale,
            d_col: rng.gen_range(-0.1..0.1) * scale,
            sigma: rng.gen_range(0.1..0.25) * scale,
            peak: rng.gen_range(0.5..5.0),
        }
    }
}

impl SequenceSource for SyntheticPrecipitation {
    fn load(&self) -> Result<SequenceSet> {
        let MapShape { channels, height, width } = self.shape;
        let cells_per_map = height * width;
        ensure!(cells_per_map > 0 && channels > 0, "Map shape {:?} has no cells", self.shape);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut data = Array3::<f32>::zeros((self.num_sequences, self.seq_len, self.shape.features()));

        for n in 0..self.num_sequences {
            let count = rng.gen_range(1..=Self::MAX_CELLS);
            let cells: Vec<RainCell> = (0..count).map(|_| self.random_cell(&mut rng)).collect();

            for t in 0..self.seq_len {
                let dt = t as f32;
                for cell in &cells {
                    let row0 = cell.row + cell.d_row * dt;
                    let col0 = cell.col + cell.d_col * dt;
                    let denom = 2.0 * cell.sigma * cell.sigma;

                    for r in 0..height {
                        for c in 0..width {
                            let dr = r as f32 - row0;
                            let dc = c as f32 - col0;
                            let intensity = cell.peak * (-(dr * dr + dc * dc) / denom).exp();
                            // later channels see a weaker copy of the same field
                            for ch in 0..channels {
                                let f = ch * cells_per_map + r * width + c;
                                data[[n, t, f]] += intensity / (ch + 1) as f32;
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(
            "Generated {} synthetic sequences of {} frames on a {}x{} grid",
            self.num_sequences,
            self.seq_len,
            height,
            width
        );
        SequenceSet::new(data, self.shape)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_loads_json_dataset() {
        let file = write_json(
            r#"{"channels": 1, "height": 1, "width": 2,
                "sequences": [[[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]],
                              [[6.0, 7.0], [8.0, 9.0], [10.0, 11.0]]]}"#,
        );
        let set = JsonSequenceLoader::new(file.path()).load().unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.seq_len(), 3);
        assert_eq!(set.shape(), MapShape::new(1, 1, 2));
        assert_eq!(set.data()[[1, 2, 1]], 11.0);
    }

    #[test]
    fn test_rejects_ragged_sequences() {
        let file = write_json(
            r#"{"channels": 1, "height": 1, "width": 1,
                "sequences": [[[0.0], [1.0]], [[2.0]]]}"#,
        );
        assert!(JsonSequenceLoader::new(file.path()).load().is_err());
    }

    #[test]
    fn test_rejects_wrong_frame_size() {
        let file = write_json(
            r#"{"channels": 1, "height": 2, "width": 2,
                "sequences": [[[0.0, 1.0, 2.0]]]}"#,
        );
        assert!(JsonSequenceLoader::new(file.path()).load().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(JsonSequenceLoader::new("/no/such/dataset.json").load().is_err());
    }

    #[test]
    fn test_synthetic_is_seeded_and_non_negative() {
        let shape = MapShape::new(2, 6, 5);
        let a = SyntheticPrecipitation::new(3, 4, shape, 9).load().unwrap();
        let b = SyntheticPrecipitation::new(3, 4, shape, 9).load().unwrap();

        assert_eq!(a.data().dim(), (3, 4, 60));
        assert_eq!(a.data(), b.data());
        assert!(a.data().iter().all(|v| *v >= 0.0 && v.is_finite()));
        assert!(a.data().iter().any(|v| *v > 0.0));
    }
}
