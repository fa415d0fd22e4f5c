// ============================================================
// Layer 3 - Sequence Set Domain Type
// ============================================================
// A set of equally long sequences of gridded maps, stored as one
// dense 3-D array:
//
//   data[sequence, time, feature]
//
// Each time step is a whole map flattened in row-major
// (channel, row, column) order, so
//
//   feature = channel * (height * width) + row * width + column
//
// MapShape keeps the grid geometry next to the data so the model
// can unflatten frames back into [channels, height, width].
//
// Reference: ndarray documentation (ArrayBase, Axis)

use anyhow::{ensure, Result};
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

/// Geometry of one map: channels per cell and grid size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl MapShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width }
    }

    /// Length of one flattened map
    pub fn features(&self) -> usize {
        self.channels * self.height * self.width
    }
}

/// Dense (sequence, time, feature) array with its map geometry.
#[derive(Debug, Clone)]
pub struct SequenceSet {
    data: Array3<f32>,
    shape: MapShape,
}

impl SequenceSet {
    pub fn new(data: Array3<f32>, shape: MapShape) -> Result<Self> {
        let features = data.len_of(Axis(2));
        ensure!(
            features == shape.features(),
            "Frame length {} does not match map shape {:?} ({} features)",
            features,
            shape,
            shape.features()
        );
        Ok(Self { data, shape })
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn shape(&self) -> MapShape {
        self.shape
    }

    /// Number of sequences
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time steps per sequence
    pub fn seq_len(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// A new set holding the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), rows),
            shape: self.shape,
        }
    }

    /// Apply `f` to every value in place.
    pub fn map_inplace(&mut self, f: impl Fn(f32) -> f32) {
        self.data.mapv_inplace(f);
    }
}
