use ndarray::{Array2, ArrayView2};

use crate::{Result, arch::loss::LossFn};

pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Makes a forward pass, keeping the metadata needed by `backprop`.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Makes a forward pass without mutating the model.
    fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model over
    /// the whole given batch. The gradient is **added** onto `grad`, `params` is left untouched.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer, the same size as `params`, accumulating the gradient.
    /// * `loss_fn` - The loss function.
    /// * `x` - The input samples, one per row.
    /// * `y` - The expected outputs, one per row.
    ///
    /// # Returns
    /// The loss of the batch.
    fn backprop<L: LossFn>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32>;
}
