// ============================================================
// Layer 4 - Sequence Batcher
// ============================================================
// Turns host-side (sequence, time, feature) arrays into the
// next-step input/target pairs the recurrent model trains on.
//
// Next-step framing for a window of max_len steps:
//
//   input  = steps 0 ..= max_len - 2
//   target = steps 1 ..= max_len - 1
//
// so target[t] is the frame that follows input[t].
//
// Training minibatches are contiguous row ranges of a freshly
// shuffled copy of the training set. The dev set is arranged as
// ONE batch of mb rows: every further block of mb rows is framed
// the same way and appended along the TIME axis, so the dev
// "sequence" is blocks * (max_len - 1) steps long. Rows past the
// last full block are not used.
//
// Reference: ndarray documentation (s! macro, concatenate)
//            Burn Book §3 (Tensor creation from data)

use std::ops::Range;

use anyhow::{bail, ensure, Result};
use burn::prelude::*;
use burn::tensor::TensorData;
use ndarray::{concatenate, s, Array3, Axis};
use rand::{seq::SliceRandom, Rng};

// ─── NextStepPair ─────────────────────────────────────────────────────────────
/// Input frames and the frames that follow them, both
/// shaped (rows, max_len - 1, features).
#[derive(Debug, Clone)]
pub struct NextStepPair {
    pub input: Array3<f32>,
    pub target: Array3<f32>,
}

// ─── MinibatchPlan ────────────────────────────────────────────────────────────
/// Row ranges of one training epoch.
///
/// With `include_partial` unset the count is `num_seqs / mb`
/// (floor) and trailing rows are skipped.
#[derive(Debug, Clone)]
pub struct MinibatchPlan {
    ranges: Vec<Range<usize>>,
}

impl MinibatchPlan {
    pub fn new(num_seqs: usize, mb: usize, include_partial: bool) -> Self {
        if mb == 0 {
            return Self { ranges: Vec::new() };
        }
        let full = num_seqs / mb;
        let mut ranges: Vec<Range<usize>> = (0..full).map(|i| i * mb..(i + 1) * mb).collect();
        if include_partial && num_seqs % mb != 0 {
            ranges.push(full * mb..num_seqs);
        }
        Self { ranges }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range<usize>> {
        self.ranges.iter()
    }
}

// ─── Framing ──────────────────────────────────────────────────────────────────
/// Frame rows `rows` of `data` into next-step input and target.
///
/// Panics if `rows` or `max_len` exceed the array bounds.
pub fn next_step_pair(data: &Array3<f32>, rows: Range<usize>, max_len: usize) -> NextStepPair {
    let input = data.slice(s![rows.clone(), 0..max_len - 1, ..]).to_owned();
    let target = data.slice(s![rows, 1..max_len, ..]).to_owned();
    NextStepPair { input, target }
}

/// Build the dev batch: row blocks of `mb` concatenated along time.
///
/// The first block is rows `0..min(mb, n)`. When fewer than `mb`
/// rows exist that short block is the whole dev batch, unless
/// `include_partial` is unset, which makes it an error.
pub fn prepare_dev(
    data: &Array3<f32>,
    mb: usize,
    max_len: usize,
    include_partial: bool,
) -> Result<NextStepPair> {
    let (num_seqs, seq_len, _) = data.dim();
    ensure!(num_seqs > 0, "Dev set is empty");
    ensure!(mb > 0, "Minibatch size must be positive");
    ensure!(
        (2..=seq_len).contains(&max_len),
        "max_len {} must be between 2 and the sequence length {}",
        max_len,
        seq_len
    );
    if num_seqs < mb && !include_partial {
        bail!(
            "Dev set has {} sequences, fewer than one minibatch of {}",
            num_seqs,
            mb
        );
    }

    let first = next_step_pair(data, 0..mb.min(num_seqs), max_len);
    let mut inputs = vec![first.input];
    let mut targets = vec![first.target];

    for block in 1..num_seqs / mb {
        let pair = next_step_pair(data, block * mb..(block + 1) * mb, max_len);
        inputs.push(pair.input);
        targets.push(pair.target);
    }

    tracing::debug!(
        "Dev batch: {} block(s) of {} rows, {} steps",
        inputs.len(),
        mb.min(num_seqs),
        inputs.len() * (max_len - 1)
    );

    let input_views: Vec<_> = inputs.iter().map(|a| a.view()).collect();
    let target_views: Vec<_> = targets.iter().map(|a| a.view()).collect();
    Ok(NextStepPair {
        input: concatenate(Axis(1), &input_views)?,
        target: concatenate(Axis(1), &target_views)?,
    })
}

/// A copy of `data` with its rows in a fresh random order.
pub fn shuffle_rows<R: Rng>(data: &Array3<f32>, rng: &mut R) -> Array3<f32> {
    let mut order: Vec<usize> = (0..data.len_of(Axis(0))).collect();
    order.shuffle(rng);
    data.select(Axis(0), &order)
}

/// Copy a host array onto `device` as a float tensor of the same shape.
pub fn to_tensor<B: Backend>(data: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (a, b, c) = data.dim();
    let values: Vec<f32> = data.iter().copied().collect();
    Tensor::from_data(TensorData::new(values, [a, b, c]), device)
}
