use super::Optimizer;
use crate::{MlErr, Result};

/// Adam, with the bias correction folded into the step size.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step: i32,

    // First and second moment estimates
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Adam {
    pub const BETA1: f32 = 0.9;
    pub const BETA2: f32 = 0.999;
    pub const EPSILON: f32 = 1e-8;

    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters it will update.
    /// * `learning_rate` - The size of the first, bias corrected, step.
    /// * `beta1`, `beta2` - Decay rates of the moment estimates.
    /// * `epsilon` - Keeps the update finite when the second moment is zero.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            step: 0,
            m: vec![0.; len],
            v: vec![0.; len],
        }
    }

    /// Creates a new `Adam` optimizer with the usual `beta1`, `beta2` and `epsilon`.
    pub fn with_learning_rate(len: usize, learning_rate: f32) -> Self {
        Self::new(len, learning_rate, Self::BETA1, Self::BETA2, Self::EPSILON)
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        for (what, got) in [("gradient", grad.len()), ("parameters", params.len())] {
            if got != self.m.len() {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected: self.m.len(),
                });
            }
        }

        self.step += 1;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let bc1 = 1. - b1.powi(self.step);
        let bc2 = 1. - b2.powi(self.step);
        // Folding the bias correction in here scales epsilon by sqrt(bc2).
        let step_size = self.learning_rate * bc2.sqrt() / bc1;

        let moments = self.m.iter_mut().zip(self.v.iter_mut());
        for ((p, &g), (m, v)) in params.iter_mut().zip(grad).zip(moments) {
            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;
            *p -= step_size * *m / (v.sqrt() + eps);
        }

        Ok(())
    }
}
