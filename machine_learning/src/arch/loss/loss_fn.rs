use ndarray::{Array2, ArrayView2};

/// A loss function comparing a batch of predictions against its targets, row by row.
pub trait LossFn {
    /// Returns the scalar loss of the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;

    /// Returns the derivative of `loss` with respect to every entry of `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}
