// ============================================================
// Layer 5 - Regression Loss
// ============================================================
// The precipitation maps are real-valued, so both training and
// evaluation use an element-wise regression loss averaged over
// every batch row, time step and grid cell.

use burn::{
    nn::loss::{MseLoss, Reduction},
    prelude::*,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LossFunction {
    /// Mean squared error
    #[default]
    Mse,
    /// Mean absolute error
    Mae,
}

impl LossFunction {
    pub fn compute<B: Backend, const D: usize>(
        &self,
        prediction: Tensor<B, D>,
        target: Tensor<B, D>,
    ) -> Tensor<B, 1> {
        match self {
            LossFunction::Mse => MseLoss::new().forward(prediction, target, Reduction::Mean),
            LossFunction::Mae => (prediction - target).abs().mean(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_known_values() {
        let device = Default::default();
        let prediction = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let target = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [3.0, 8.0]], &device);

        // errors: 0, 2, 0, -4
        let mse: f32 = LossFunction::Mse
            .compute(prediction.clone(), target.clone())
            .into_scalar();
        let mae: f32 = LossFunction::Mae.compute(prediction, target).into_scalar();

        assert!((mse - 5.0).abs() < 1e-6);
        assert!((mae - 1.5).abs() < 1e-6);
    }
}
