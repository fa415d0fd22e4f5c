// ============================================================
// Layer 5 - Convolutional LSTM Cell
// ============================================================
// One time step of a gated convolutional recurrence.
//
// A plain LSTM produces its gates with dense matrices. Here the
// gates come from a single 2-D convolution over the stacked
// [input | hidden | memory] feature maps, so every gate value
// only looks at a small spatial neighbourhood of the grid:
//
//   z            = conv([x, h, c])          (4 * hidden_dim channels)
//   i, f, o, g   = split(z, 4)
//   c'           = σ(f) ⊙ c + σ(i) ⊙ tanh(g)
//   h'           = σ(o) ⊙ tanh(c')
//
// Tensor shapes (all NCHW):
//   input  [batch, input_dim,  H, W]
//   hidden [batch, hidden_dim, H, W]
//   memory [batch, hidden_dim, H, W]
//
// The cell never moves tensors between devices. Callers hand it
// co-located input and state (see NetState::to_device).
//
// Reference: Shi et al. (2015) Convolutional LSTM Network
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::{activation, backend::AutodiffBackend},
};

// ─── SpatialState ─────────────────────────────────────────────────────────────
/// The (hidden, memory) pair carried between time steps.
/// Both tensors always share the shape [batch, hidden_dim, H, W].
#[derive(Clone, Debug)]
pub struct SpatialState<B: Backend> {
    pub hidden: Tensor<B, 4>,
    pub memory: Tensor<B, 4>,
}

impl<B: Backend> SpatialState<B> {
    pub fn new(hidden: Tensor<B, 4>, memory: Tensor<B, 4>) -> Self {
        Self { hidden, memory }
    }

    pub fn batch_size(&self) -> usize {
        self.hidden.dims()[0]
    }

    pub fn device(&self) -> B::Device {
        self.hidden.device()
    }

    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            hidden: self.hidden.to_device(device),
            memory: self.memory.to_device(device),
        }
    }

    /// Cut both tensors out of the autodiff graph.
    pub fn detach(self) -> Self {
        Self {
            hidden: self.hidden.detach(),
            memory: self.memory.detach(),
        }
    }
}

impl<B: AutodiffBackend> SpatialState<B> {
    /// Same state on the inner backend, without gradient tracking.
    pub fn into_inner(self) -> SpatialState<B::InnerBackend> {
        SpatialState {
            hidden: self.hidden.inner(),
            memory: self.memory.inner(),
        }
    }
}

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ConvLstmCellConfig {
    /// Channels of the incoming feature map
    pub input_dim: usize,
    /// Channels of the hidden and memory maps
    pub hidden_dim: usize,
    pub height: usize,
    pub width: usize,
    /// Kernel size as [kh, kw]; padding is [kh / 2, kw / 2]
    #[config(default = "[3, 3]")]
    pub kernel_size: [usize; 2],
    #[config(default = true)]
    pub bias: bool,
}

impl ConvLstmCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvLstmCell<B> {
        let [kh, kw] = self.kernel_size;

        // in: x ⊕ h ⊕ c, out: one block of channels per gate
        let conv = Conv2dConfig::new(
            [self.input_dim + 2 * self.hidden_dim, 4 * self.hidden_dim],
            [kh, kw],
        )
        .with_padding(PaddingConfig2d::Explicit(kh / 2, kw / 2))
        .with_bias(self.bias)
        .init(device);

        ConvLstmCell {
            conv,
            hidden_dim: self.hidden_dim,
            height: self.height,
            width: self.width,
        }
    }
}

// ─── ConvLstmCell ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConvLstmCell<B: Backend> {
    conv: Conv2d<B>,
    #[module(skip)]
    hidden_dim: usize,
    #[module(skip)]
    height: usize,
    #[module(skip)]
    width: usize,
}

impl<B: Backend> ConvLstmCell<B> {
    /// All-zero hidden and memory maps for a fresh sequence.
    pub fn init_state(&self, batch_size: usize, device: &B::Device) -> SpatialState<B> {
        let shape = [batch_size, self.hidden_dim, self.height, self.width];
        SpatialState::new(Tensor::zeros(shape, device), Tensor::zeros(shape, device))
    }

    /// Advance the recurrence by one time step.
    ///
    /// # Arguments
    /// * `input` - Feature map of shape `[batch, input_dim, H, W]`
    /// * `state` - Previous (hidden, memory), each `[batch, hidden_dim, H, W]`
    ///
    /// # Returns
    /// The next (hidden, memory) pair with the same shape as `state`
    pub fn step(&self, input: Tensor<B, 4>, state: SpatialState<B>) -> SpatialState<B> {
        let SpatialState { hidden, memory } = state;

        let combined = Tensor::cat(vec![input, hidden, memory.clone()], 1);
        let gates = self.conv.forward(combined);

        // Order of the channel blocks: input, forget, output, candidate
        let chunks = gates.chunk(4, 1);
        let input_gate = activation::sigmoid(chunks[0].clone());
        let forget_gate = activation::sigmoid(chunks[1].clone());
        let output_gate = activation::sigmoid(chunks[2].clone());
        let candidate = chunks[3].clone().tanh();

        let memory = forget_gate * memory + input_gate * candidate;
        let hidden = output_gate * memory.clone().tanh();

        SpatialState::new(hidden, memory)
    }
}
