use std::num::NonZeroUsize;

use log::{info, warn};
use ndarray::ArrayView2;

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    optimization::Optimizer,
};

/// A full-batch model trainer.
///
/// Every epoch runs the whole dataset through the model in its original order, backpropagates
/// the loss and takes a single optimizer step.
pub struct Trainer<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    grad: Vec<f32>,
    optimizer: O,
    loss_fn: L,
    model: M,

    epochs: usize,
    log_interval: NonZeroUsize,
}

impl<M, O, L> Trainer<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    /// Returns a new `Trainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer updating the parameters after each epoch.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `epochs` - The exact amount of epochs `train` runs.
    /// * `log_interval` - Every how many epochs the loss gets logged.
    pub fn new(
        model: M,
        optimizer: O,
        loss_fn: L,
        epochs: usize,
        log_interval: NonZeroUsize,
    ) -> Self {
        Self {
            grad: vec![0.0; model.size()],
            model,
            optimizer,
            loss_fn,
            epochs,
            log_interval,
        }
    }

    /// Trains `params` for the configured amount of epochs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, updated in place.
    /// * `x` - The input samples, one per row.
    /// * `y` - The expected outputs, one per row.
    ///
    /// # Returns
    /// The loss of every epoch, or an error as soon as the loss stops being finite.
    pub fn train(
        &mut self,
        params: &mut [f32],
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<Vec<f32>> {
        if params.len() != self.grad.len() {
            return Err(MlErr::SizeMismatch {
                what: "trainer parameters",
                got: params.len(),
                expected: self.grad.len(),
            });
        }

        let mut losses = Vec::with_capacity(self.epochs);

        for epoch in 0..self.epochs {
            self.grad.fill(0.0);

            let loss = self
                .model
                .backprop(params, &mut self.grad, &self.loss_fn, x, y)?;

            if !loss.is_finite() {
                warn!("aborting training, epoch {epoch} produced a loss of {loss}");
                return Err(MlErr::NonFiniteLoss { epoch, loss });
            }

            if epoch % self.log_interval.get() == 0 {
                info!("Epoch {epoch}, Loss: {loss:.6}");
            }

            self.optimizer.update_params(&self.grad, params)?;
            losses.push(loss);
        }

        Ok(losses)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consumes the trainer, handing back its model.
    pub fn into_model(self) -> M {
        self.model
    }
}
