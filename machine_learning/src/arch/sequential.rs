use std::{cell::RefCell, rc::Rc};

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, activations::ActFn, layers::Dense, loss::LossFn};
use crate::{
    MlErr, Result,
    initialization::{ChainedParamGen, ParamGen, RandParamGen},
};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters of every layer live back to back in a single flat buffer, in layer order.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Creates the two layer classifier: `Dense(in_features → hidden) → ReLU → Dense(hidden →
    /// num_classes)`, outputting logits.
    pub fn classifier(in_features: usize, hidden: usize, num_classes: usize) -> Self {
        Self::new([
            Dense::new((in_features, hidden), Some(ActFn::relu())),
            Dense::new((hidden, num_classes), None),
        ])
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Returns the width of the input this model expects.
    pub fn in_features(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.dim().0)
    }

    /// Returns the width of the output of this model.
    pub fn out_features(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.dim().1)
    }

    /// Samples a fresh set of parameters for this model.
    ///
    /// Every weight and bias of a layer is drawn from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`, layer
    /// by layer and weights before biases, so a seeded `rng` always yields the same parameters.
    ///
    /// # Arguments
    /// * `rng` - The random number generator to draw from.
    ///
    /// # Returns
    /// The flat parameter buffer or an error if a layer has no inputs.
    pub fn init_params<R: Rng + 'static>(&self, rng: Rc<RefCell<R>>) -> Result<Vec<f32>> {
        let mut param_gens: Vec<Box<dyn ParamGen>> = Vec::with_capacity(2 * self.layers.len());

        for layer in &self.layers {
            let (n, m) = layer.dim();
            param_gens.push(Box::new(RandParamGen::linear_default(rng.clone(), n * m, n)?));
            param_gens.push(Box::new(RandParamGen::linear_default(rng.clone(), m, n)?));
        }

        let size = self.size();
        ChainedParamGen::new(param_gens)
            .take_exact(size)
            .ok_or(MlErr::SizeMismatch {
                what: "initial parameters",
                got: 0,
                expected: size,
            })
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("model parameters", params.len())?;

        let mut rest = params;
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let (layer_params, tail) = rest.split_at(layer.size());
            a = layer.forward(layer_params, a.view())?;
            rest = tail;
        }

        Ok(a)
    }

    fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("model parameters", params.len())?;

        let mut rest = params;
        let mut a = x.to_owned();

        for layer in &self.layers {
            let (layer_params, tail) = rest.split_at(layer.size());
            a = layer.infer(layer_params, a.view())?;
            rest = tail;
        }

        Ok(a)
    }

    fn backprop<L: LossFn>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32> {
        self.check_len("model gradient", grad.len())?;

        let y_pred = self.forward(params, x)?;
        if y_pred.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "targets",
                got: y.len(),
                expected: y_pred.len(),
            });
        }

        let loss = loss_fn.loss(y_pred.view(), y);
        let mut d = loss_fn.loss_prime(y_pred.view(), y);

        let mut end = params.len();
        for layer in self.layers.iter().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::loss::CrossEntropy;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    fn seeded(seed: u64) -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(seed)))
    }

    #[test]
    fn classifier_has_expected_shape() {
        let model = Sequential::classifier(13, 32, 6);

        assert_eq!(model.size(), 32 * 13 + 32 + 6 * 32 + 6);
        assert_eq!(model.in_features(), 13);
        assert_eq!(model.out_features(), 6);
    }

    #[test]
    fn init_params_is_deterministic_and_bounded() {
        let model = Sequential::classifier(4, 8, 3);

        let a = model.init_params(seeded(0)).unwrap();
        let b = model.init_params(seeded(0)).unwrap();
        let c = model.init_params(seeded(1)).unwrap();

        assert_eq!(a.len(), model.size());
        assert_eq!(a, b);
        assert_ne!(a, c);

        // The first layer has fan-in 4, the second 8.
        let (first, second) = a.split_at(model.layers()[0].size());
        assert!(first.iter().all(|p| p.abs() <= 0.5));
        assert!(second.iter().all(|p| p.abs() <= 1. / 8f32.sqrt()));
    }

    #[test]
    fn infer_outputs_one_row_per_sample() {
        let model = Sequential::classifier(2, 4, 3);
        let params = model.init_params(seeded(3)).unwrap();
        let x = array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]];

        let logits = model.infer(&params, x.view()).unwrap();

        assert_eq!(logits.dim(), (3, 3));
    }

    #[test]
    fn rejects_parameter_buffer_of_wrong_size() {
        let model = Sequential::classifier(2, 4, 3);
        let x = array![[0.1, 0.2]];

        assert!(model.infer(&[0.; 3], x.view()).is_err());
    }

    fn assert_grad_matches(
        mut model: Sequential,
        params: Vec<f32>,
        x: Array2<f32>,
        y: Array2<f32>,
    ) {
        let loss_fn = CrossEntropy::new();

        let mut grad = vec![0.; model.size()];
        model
            .backprop(&params, &mut grad, &loss_fn, x.view(), y.view())
            .unwrap();

        let loss_at = |params: &[f32]| {
            let logits = model.infer(params, x.view()).unwrap();
            loss_fn.loss(logits.view(), y.view())
        };

        let eps = 1e-3;
        for (i, &g) in grad.iter().enumerate() {
            let mut plus = params.clone();
            plus[i] += eps;
            let mut minus = params.clone();
            minus[i] -= eps;

            let numeric = (loss_at(&plus) - loss_at(&minus)) / (2. * eps);
            assert!((numeric - g).abs() < 1e-3, "param {i}: {numeric} vs {g}");
        }
    }

    #[test]
    fn backprop_matches_finite_differences() {
        let model = Sequential::new([Dense::new((3, 5), None), Dense::new((5, 2), None)]);
        let params = model.init_params(seeded(11)).unwrap();
        let x = array![[0.5, -1.2, 0.3], [1.5, 0.2, -0.7], [-0.3, 0.8, 0.9]];
        let y = array![[1., 0.], [0., 1.], [0., 1.]];

        assert_grad_matches(model, params, x, y);
    }

    #[test]
    fn backprop_through_relu_matches_finite_differences() {
        let model = Sequential::classifier(2, 2, 2);
        // Hidden pre-activations are [0.7, 0.2] and [1.5, -0.5], away from the kink.
        let params = vec![
            1., 0., 0., -1., 0.5, 0.5, // first layer
            0.3, -0.2, 0.1, 0.4, 0., 0.1, // second layer
        ];
        let x = array![[0.2, 0.3], [1., 1.]];
        let y = array![[0., 1.], [1., 0.]];

        assert_grad_matches(model, params, x, y);
    }

    #[test]
    fn backprop_rejects_mismatched_targets() {
        let mut model = Sequential::classifier(2, 4, 3);
        let params = model.init_params(seeded(0)).unwrap();
        let mut grad = vec![0.; model.size()];
        let x = array![[0.1, 0.2]];
        let y = array![[1., 0.]];

        let result = model.backprop(&params, &mut grad, &CrossEntropy::new(), x.view(), y.view());

        assert!(matches!(result, Err(MlErr::SizeMismatch { what: "targets", .. })));
    }
}
