// ============================================================
// Layer 4 - Train/Dev/Test Splitter
// ============================================================
// Shuffles sequence rows and splits them into three sets:
//   - Training set: updates model weights
//   - Dev set:      early stopping and checkpoint selection
//   - Test set:     held out for the final evaluate command
//
// The shuffle is seeded so `evaluate` can rebuild exactly the
// test split that `train` held out.
//
// Sizes are round(n * train_fraction) and round(n * dev_fraction),
// clamped to what is left; the test set gets the remainder.
//
// Reference: rand crate documentation (SliceRandom, StdRng)

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::sequence::SequenceSet;

#[derive(Debug, Clone)]
pub struct DataSplit {
    pub train: SequenceSet,
    pub dev: SequenceSet,
    pub test: SequenceSet,
}

/// Randomly shuffle `items` and split into (first, rest).
pub fn split_shuffled<T>(mut items: Vec<T>, first_fraction: f64, rng: &mut StdRng) -> (Vec<T>, Vec<T>) {
    items.shuffle(rng);
    let total = items.len();
    let split_at = ((total as f64) * first_fraction).round() as usize;
    let rest = items.split_off(split_at.min(total));
    (items, rest)
}

/// Split sequence rows into train, dev and test sets.
pub fn split_train_dev_test(
    set: &SequenceSet,
    train_fraction: f64,
    dev_fraction: f64,
    seed: u64,
) -> Result<DataSplit> {
    ensure!(
        train_fraction > 0.0 && dev_fraction > 0.0 && train_fraction + dev_fraction <= 1.0,
        "Invalid split fractions: train {} dev {}",
        train_fraction,
        dev_fraction
    );

    let total = set.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let (train_rows, rest) = split_shuffled((0..total).collect(), train_fraction, &mut rng);

    let dev_count = ((total as f64) * dev_fraction).round() as usize;
    let mut dev_rows = rest;
    let test_rows = dev_rows.split_off(dev_count.min(dev_rows.len()));

    tracing::debug!(
        "Dataset split: {} train, {} dev, {} test",
        train_rows.len(),
        dev_rows.len(),
        test_rows.len()
    );

    Ok(DataSplit {
        train: set.select_rows(&train_rows),
        dev: set.select_rows(&dev_rows),
        test: set.select_rows(&test_rows),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sequence::MapShape;
    use ndarray::Array3;

    fn indexed_set(n: usize) -> SequenceSet {
        let data = Array3::from_shape_fn((n, 2, 1), |(r, _, _)| r as f32);
        SequenceSet::new(data, MapShape::new(1, 1, 1)).unwrap()
    }

    fn first_values(set: &SequenceSet) -> Vec<usize> {
        (0..set.len()).map(|r| set.data()[[r, 0, 0]] as usize).collect()
    }

    #[test]
    fn test_correct_split_sizes() {
        let split = split_train_dev_test(&indexed_set(100), 0.7, 0.2, 1).unwrap();
        assert_eq!(split.train.len(), 70);
        assert_eq!(split.dev.len(), 20);
        assert_eq!(split.test.len(), 10);
    }

    #[test]
    fn test_all_rows_preserved_once() {
        let split = split_train_dev_test(&indexed_set(37), 0.6, 0.25, 5).unwrap();
        let mut rows = first_values(&split.train);
        rows.extend(first_values(&split.dev));
        rows.extend(first_values(&split.test));
        rows.sort_unstable();
        assert_eq!(rows, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let set = indexed_set(30);
        let a = split_train_dev_test(&set, 0.5, 0.3, 42).unwrap();
        let b = split_train_dev_test(&set, 0.5, 0.3, 42).unwrap();
        assert_eq!(first_values(&a.test), first_values(&b.test));
        assert_eq!(first_values(&a.train), first_values(&b.train));
    }

    #[test]
    fn test_rejects_fractions_over_one() {
        assert!(split_train_dev_test(&indexed_set(10), 0.8, 0.3, 0).is_err());
    }

    #[test]
    fn test_split_shuffled_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let (a, b) = split_shuffled(Vec::<usize>::new(), 0.8, &mut rng);
        assert!(a.is_empty());
        assert!(b.is_empty());
    }
}
