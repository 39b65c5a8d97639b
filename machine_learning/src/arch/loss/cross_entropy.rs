use ndarray::{Array2, ArrayView2, Axis, Zip};

use super::LossFn;

/// Softmax cross-entropy loss function, averaged over the batch.
///
/// `y_pred` holds raw logits and `y` one-hot (or any per-row probability distribution) targets.
#[derive(Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.nrows();
        if n == 0 {
            return 0.;
        }

        let log_probs = log_softmax(y_pred);
        let total = Zip::from(&log_probs)
            .and(&y)
            .fold(0., |acc, &lp, &t| if t == 0. { acc } else { acc - t * lp });

        total / n as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.nrows().max(1) as f32;
        (softmax(y_pred) - &y) / n
    }
}

/// Normalizes each row of `logits` into a probability distribution.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut probs = logits.to_owned();

    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }

    probs
}

fn log_softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut log_probs = logits.to_owned();

    for mut row in log_probs.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum = row.fold(0., |acc, &v| acc + (v - max).exp()).ln();
        row.mapv_inplace(|v| v - max - log_sum);
    }

    log_probs
}
