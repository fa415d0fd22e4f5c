// ============================================================
// Layer 4 - Intensity Normalization
// ============================================================
// Precipitation intensities are heavy-tailed: most cells are dry
// and a few carry most of the rain. A log transform compresses
// that range before training.
//
//   Log:  x' = ln(1 + max(x, 0))
//   None: identity
//
// Negative inputs are clamped to 0 under Log; they can only come
// from sensor noise. Losses are reported in normalized units.
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::sequence::SequenceSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    #[default]
    None,
    Log,
}

impl Normalization {
    pub fn normalize_value(self, x: f32) -> f32 {
        match self {
            Normalization::None => x,
            Normalization::Log => x.max(0.0).ln_1p(),
        }
    }

    /// Normalize every value of `set` in place.
    pub fn normalize(self, set: &mut SequenceSet) {
        if self == Normalization::None {
            return;
        }
        set.map_inplace(|x| self.normalize_value(x));
        tracing::debug!("Applied {:?} normalization to {} sequences", self, set.len());
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sequence::MapShape;
    use ndarray::Array3;

    #[test]
    fn test_log_clamps_negatives() {
        assert_eq!(Normalization::Log.normalize_value(-3.0), 0.0);
        assert_eq!(Normalization::Log.normalize_value(0.0), 0.0);
    }

    #[test]
    fn test_log_compresses_heavy_rain() {
        let n = Normalization::Log;
        assert!((n.normalize_value(std::f32::consts::E - 1.0) - 1.0).abs() < 1e-6);
        assert!(n.normalize_value(1000.0) < 7.0);
    }

    #[test]
    fn test_none_leaves_set_untouched() {
        let data = Array3::from_elem((1, 2, 1), -2.5f32);
        let mut set = SequenceSet::new(data.clone(), MapShape::new(1, 1, 1)).unwrap();
        Normalization::None.normalize(&mut set);
        assert_eq!(set.data(), &data);
    }

    #[test]
    fn test_normalizes_whole_set() {
        let data = Array3::from_elem((2, 2, 1), std::f32::consts::E - 1.0);
        let mut set = SequenceSet::new(data, MapShape::new(1, 1, 1)).unwrap();
        Normalization::Log.normalize(&mut set);
        assert!(set.data().iter().all(|v| (v - 1.0).abs() < 1e-6));
    }
}
