// ============================================================
// Layer 5 - Stacked ConvLSTM Sequence Model
// ============================================================
// Wraps a stack of ConvLSTM cells and a 1x1 convolution head
// that maps the top hidden map back to the input channels. The
// model reads one frame per time step and predicts the next one.
//
// Sequences arrive flattened: [batch, time, features] with
// features = channels * height * width. Each frame is reshaped to
// [batch, channels, height, width] before it enters the stack.
//
// Scheduled sampling: at every step the first layer receives the
// ground-truth frame with probability epsilon, otherwise the
// model's own previous prediction. With epsilon = 1 this is plain
// teacher forcing; with epsilon = 0 it is a free-running rollout.
//
// Recurrent state is owned by the caller. Every forward call takes
// the previous NetState (or None for a fresh sequence) and returns
// the state after the last step, so the training loop can carry it
// across minibatches, epochs and into evaluation. Only the layer
// states cross a forward_sequence call: its first step always reads
// the supplied frame. forward_step keeps the last prediction so a
// step-by-step rollout can feed it back.

use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::Rng;

use crate::ml::cell::{ConvLstmCell, ConvLstmCellConfig, SpatialState};

// ─── Model contract ───────────────────────────────────────────────────────────
/// What the training and evaluation loops need from a recurrent model.
pub trait StatefulSequenceModel<B: Backend> {
    /// Run every step of `input` ([batch, time, features]).
    /// Returns next-step predictions with the same shape and the final state.
    fn forward_sequence<R: Rng>(
        &self,
        input: Tensor<B, 3>,
        state: Option<NetState<B>>,
        epsilon: f64,
        rng: &mut R,
    ) -> (Tensor<B, 3>, NetState<B>);

    /// Run a single step on `frame` ([batch, features]).
    fn forward_step<R: Rng>(
        &self,
        frame: Tensor<B, 2>,
        state: Option<NetState<B>>,
        epsilon: f64,
        rng: &mut R,
    ) -> (Tensor<B, 2>, NetState<B>);
}

// ─── NetState ─────────────────────────────────────────────────────────────────
/// Recurrent state of the whole stack: one SpatialState per layer plus
/// the last prediction, which scheduled sampling may feed back in.
#[derive(Clone, Debug)]
pub struct NetState<B: Backend> {
    pub layers: Vec<SpatialState<B>>,
    pub last_prediction: Option<Tensor<B, 2>>,
}

impl<B: Backend> NetState<B> {
    pub fn batch_size(&self) -> Option<usize> {
        self.layers.first().map(SpatialState::batch_size)
    }

    /// Move every tensor to `device`. Logged because it copies the whole state.
    pub fn to_device(self, device: &B::Device) -> Self {
        let needs_move = self
            .layers
            .first()
            .is_some_and(|layer| layer.device() != *device);
        if !needs_move {
            return self;
        }

        tracing::debug!("Migrating recurrent state to {:?}", device);
        Self {
            layers: self
                .layers
                .into_iter()
                .map(|layer| layer.to_device(device))
                .collect(),
            last_prediction: self.last_prediction.map(|p| p.to_device(device)),
        }
    }

    /// Keep the layer states and drop the last prediction, so the
    /// next call starts from its own first frame.
    pub fn into_carried(self) -> Self {
        Self {
            layers: self.layers,
            last_prediction: None,
        }
    }

    /// Stop gradients from flowing back into earlier minibatches.
    pub fn detach(self) -> Self {
        Self {
            layers: self.layers.into_iter().map(SpatialState::detach).collect(),
            last_prediction: self.last_prediction.map(|p| p.detach()),
        }
    }
}

impl<B: AutodiffBackend> NetState<B> {
    pub fn into_inner(self) -> NetState<B::InnerBackend> {
        NetState {
            layers: self.layers.into_iter().map(SpatialState::into_inner).collect(),
            last_prediction: self.last_prediction.map(|p| p.inner()),
        }
    }
}

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ConvLstmNetConfig {
    /// Channels per grid cell in the input maps
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    /// Hidden channels of each stacked layer, bottom first
    pub hidden_dims: Vec<usize>,
    #[config(default = "[3, 3]")]
    pub kernel_size: [usize; 2],
    #[config(default = true)]
    pub bias: bool,
}

impl ConvLstmNetConfig {
    pub fn features(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvLstmNet<B> {
        let mut input_dim = self.channels;
        let mut cells = Vec::with_capacity(self.hidden_dims.len());
        for &hidden_dim in &self.hidden_dims {
            cells.push(
                ConvLstmCellConfig::new(input_dim, hidden_dim, self.height, self.width)
                    .with_kernel_size(self.kernel_size)
                    .with_bias(self.bias)
                    .init(device),
            );
            input_dim = hidden_dim;
        }

        let head = Conv2dConfig::new([input_dim, self.channels], [1, 1]).init(device);

        ConvLstmNet {
            cells,
            head,
            channels: self.channels,
            height: self.height,
            width: self.width,
        }
    }
}

// ─── ConvLstmNet ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConvLstmNet<B: Backend> {
    cells: Vec<ConvLstmCell<B>>,
    head: Conv2d<B>,
    #[module(skip)]
    channels: usize,
    #[module(skip)]
    height: usize,
    #[module(skip)]
    width: usize,
}

impl<B: Backend> ConvLstmNet<B> {
    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    pub fn init_state(&self, batch_size: usize, device: &B::Device) -> NetState<B> {
        NetState {
            layers: self
                .cells
                .iter()
                .map(|cell| cell.init_state(batch_size, device))
                .collect(),
            last_prediction: None,
        }
    }

    /// Reuse the carried state when it fits this batch, otherwise start from zero.
    fn resolve_state(
        &self,
        state: Option<NetState<B>>,
        batch_size: usize,
        device: &B::Device,
    ) -> NetState<B> {
        match state {
            Some(state) if state.batch_size() == Some(batch_size) => state.to_device(device),
            Some(state) => {
                tracing::warn!(
                    carried = ?state.batch_size(),
                    batch_size,
                    "Recurrent state batch size differs from input; resetting to zeros"
                );
                self.init_state(batch_size, device)
            }
            None => self.init_state(batch_size, device),
        }
    }

    /// One time step: choose the input frame, run the stack, predict the next frame.
    fn advance<R: Rng>(
        &self,
        truth: Tensor<B, 2>,
        state: NetState<B>,
        epsilon: f64,
        rng: &mut R,
    ) -> (Tensor<B, 2>, NetState<B>) {
        let NetState { layers, last_prediction } = state;

        let frame = match last_prediction {
            Some(previous) if rng.gen::<f64>() >= epsilon => previous,
            _ => truth,
        };
        let [batch_size, features] = frame.dims();

        let mut x = frame.reshape([batch_size, self.channels, self.height, self.width]);
        let mut next_layers = Vec::with_capacity(layers.len());
        for (cell, layer_state) in self.cells.iter().zip(layers) {
            let next = cell.step(x, layer_state);
            x = next.hidden.clone();
            next_layers.push(next);
        }

        let prediction = self.head.forward(x).reshape([batch_size, features]);
        let state = NetState {
            layers: next_layers,
            last_prediction: Some(prediction.clone().detach()),
        };
        (prediction, state)
    }
}

impl<B: Backend> StatefulSequenceModel<B> for ConvLstmNet<B> {
    fn forward_sequence<R: Rng>(
        &self,
        input: Tensor<B, 3>,
        state: Option<NetState<B>>,
        epsilon: f64,
        rng: &mut R,
    ) -> (Tensor<B, 3>, NetState<B>) {
        let [batch_size, seq_len, features] = input.dims();
        let device = input.device();

        let mut state = self.resolve_state(state.map(NetState::into_carried), batch_size, &device);
        let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let truth = input
                .clone()
                .slice([0..batch_size, t..t + 1, 0..features])
                .reshape([batch_size, features]);
            let (prediction, next) = self.advance(truth, state, epsilon, rng);
            state = next;
            outputs.push(prediction);
        }

        (Tensor::stack(outputs, 1), state)
    }

    fn forward_step<R: Rng>(
        &self,
        frame: Tensor<B, 2>,
        state: Option<NetState<B>>,
        epsilon: f64,
        rng: &mut R,
    ) -> (Tensor<B, 2>, NetState<B>) {
        let [batch_size, _] = frame.dims();
        let state = self.resolve_state(state, batch_size, &frame.device());
        self.advance(frame, state, epsilon, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray<f32>;

    fn small_net(device: &<TestBackend as Backend>::Device) -> ConvLstmNet<TestBackend> {
        ConvLstmNetConfig::new(2, 4, 4, vec![3, 5]).init(device)
    }

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_forward_sequence_shapes() {
        let device = Default::default();
        let net = small_net(&device);
        let mut rng = StdRng::seed_from_u64(7);

        let input = Tensor::<TestBackend, 3>::zeros([3, 6, 32], &device);
        let (output, state) = net.forward_sequence(input, None, 1.0, &mut rng);

        assert_eq!(output.dims(), [3, 6, 32]);
        assert_eq!(state.layers.len(), 2);
        assert_eq!(state.layers[0].hidden.dims(), [3, 3, 4, 4]);
        assert_eq!(state.layers[1].memory.dims(), [3, 5, 4, 4]);
        assert_eq!(state.last_prediction.map(|p| p.dims()), Some([3, 32]));
    }

    #[test]
    fn test_carried_state_changes_output() {
        let device = Default::default();
        let net = small_net(&device);
        let mut rng = StdRng::seed_from_u64(1);

        let warmup = Tensor::<TestBackend, 3>::random(
            [2, 4, 32],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let (_, state) = net.forward_sequence(warmup, None, 1.0, &mut rng);

        let input = Tensor::<TestBackend, 3>::ones([2, 3, 32], &device);
        let (fresh, _) = net.forward_sequence(input.clone(), None, 1.0, &mut rng);
        let (carried, _) = net.forward_sequence(input, Some(state), 1.0, &mut rng);

        let diff: f32 = (fresh - carried).abs().sum().into_scalar();
        assert!(diff > 0.0, "carried state should influence the predictions");
    }

    #[test]
    fn test_batch_mismatch_resets_state() {
        let device = Default::default();
        let net = small_net(&device);
        let mut rng = StdRng::seed_from_u64(3);

        let (_, state) = net.forward_sequence(
            Tensor::<TestBackend, 3>::ones([4, 2, 32], &device),
            None,
            1.0,
            &mut rng,
        );

        let input = Tensor::<TestBackend, 3>::ones([2, 2, 32], &device);
        let (reset, _) = net.forward_sequence(input.clone(), Some(state), 1.0, &mut rng);
        let (fresh, _) = net.forward_sequence(input, None, 1.0, &mut rng);

        assert_eq!(values(reset), values(fresh));
    }

    #[test]
    fn test_teacher_forcing_ignores_rng() {
        // With epsilon = 1 every step reads ground truth, so the RNG is irrelevant
        let device = Default::default();
        let net = small_net(&device);
        let input = Tensor::<TestBackend, 3>::random(
            [2, 5, 32],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let (a, _) = net.forward_sequence(input.clone(), None, 1.0, &mut StdRng::seed_from_u64(1));
        let (b, _) = net.forward_sequence(input, None, 1.0, &mut StdRng::seed_from_u64(99));

        assert_eq!(values(a), values(b));
    }

    #[test]
    fn test_free_running_ignores_later_ground_truth() {
        // With epsilon = 0 only the first frame is read; later frames are predictions
        let device = Default::default();
        let net = small_net(&device);
        let mut rng = StdRng::seed_from_u64(5);

        let first = Tensor::<TestBackend, 3>::ones([1, 1, 32], &device);
        let a = Tensor::cat(
            vec![first.clone(), Tensor::<TestBackend, 3>::zeros([1, 3, 32], &device)],
            1,
        );
        let b = Tensor::cat(
            vec![first, Tensor::<TestBackend, 3>::ones([1, 3, 32], &device) * 9.0],
            1,
        );

        let (out_a, _) = net.forward_sequence(a, None, 0.0, &mut rng);
        let (out_b, _) = net.forward_sequence(b, None, 0.0, &mut rng);

        assert_eq!(values(out_a), values(out_b));
    }

    #[test]
    fn test_carried_state_still_reads_first_frame() {
        // epsilon = 0 from a warmed state: step 0 must use the new input,
        // not the prediction left over from the previous call
        let device = Default::default();
        let net = small_net(&device);
        let mut rng = StdRng::seed_from_u64(13);

        let warmup = Tensor::<TestBackend, 3>::random(
            [2, 3, 32],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let (_, carried) = net.forward_sequence(warmup, None, 1.0, &mut rng);
        assert!(carried.last_prediction.is_some());

        let zeros = Tensor::<TestBackend, 3>::zeros([2, 1, 32], &device);
        let large = Tensor::<TestBackend, 3>::ones([2, 1, 32], &device) * 50.0;
        let (a, _) = net.forward_sequence(zeros, Some(carried.clone()), 0.0, &mut rng);
        let (b, _) = net.forward_sequence(large, Some(carried), 0.0, &mut rng);

        let diff: f32 = (a - b).abs().sum().into_scalar();
        assert!(diff > 0.0, "first frame was ignored");
    }

    #[test]
    fn test_into_carried_drops_prediction_only() {
        let device = Default::default();
        let net = small_net(&device);
        let mut rng = StdRng::seed_from_u64(17);

        let input = Tensor::<TestBackend, 3>::ones([1, 2, 32], &device);
        let (_, state) = net.forward_sequence(input, None, 1.0, &mut rng);
        let carried = state.into_carried();

        assert!(carried.last_prediction.is_none());
        assert_eq!(carried.layers.len(), 2);
        assert_eq!(carried.batch_size(), Some(1));
    }

    #[test]
    fn test_forward_step_matches_sequence_of_one() {
        let device = Default::default();
        let net = small_net(&device);
        let mut rng = StdRng::seed_from_u64(11);

        let frame = Tensor::<TestBackend, 2>::random(
            [2, 32],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let (step, _) = net.forward_step(frame.clone(), None, 1.0, &mut rng);
        let (seq, _) = net.forward_sequence(frame.reshape([2, 1, 32]), None, 1.0, &mut rng);

        assert_eq!(values(step), values(seq));
    }
}
