use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `a = act_fn(x · wᵀ + b)`.
///
/// The layer doesn't own its parameters. It reads them from a slice laid out as the weights in
/// `(out, in)` row-major order followed by the `out` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - The activation applied to the layer's output, if any.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: Array2::zeros((0, dim.0)),
            z: Array2::zeros((0, dim.1)),
        }
    }

    /// Returns the amount of inputs and outputs of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        self.act_fn
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Makes a forward pass through the layer, keeping what `backward` needs.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.linear(params, x)?;
        let a = self.activate(&z);

        self.x = x.to_owned();
        self.z = z;
        Ok(a)
    }

    /// Makes a forward pass through the layer without touching its metadata.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.linear(params, x)?;
        Ok(self.activate(&z))
    }

    /// Backpropagates the delta of this layer's output.
    ///
    /// The gradient of the weights and biases is **added** onto `grad`, so it must be zeroed out
    /// before the first layer of a pass is reached.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `grad` - This layer's slice of the gradient.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "layer delta",
                got: d.len(),
                expected: self.z.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &d.t(), &self.x, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w))
    }

    fn linear(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "layer input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w.t(), 0.0, &mut z);
        z += &b;

        Ok(z)
    }

    fn activate(&self, z: &Array2<f32>) -> Array2<f32> {
        match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        }
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("layer gradient", grad.len())?;

        let (n, m) = self.dim;
        let (dw_raw, db_raw) = grad.split_at_mut(n * m);
        let dw = ArrayViewMut2::from_shape((m, n), dw_raw).map_err(|_| self.mismatch(n * m))?;
        let db = ArrayViewMut1::from_shape(m, db_raw).map_err(|_| self.mismatch(m))?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("layer parameters", params.len())?;

        let (n, m) = self.dim;
        let (w_raw, b_raw) = params.split_at(n * m);
        let weights = ArrayView2::from_shape((m, n), w_raw).map_err(|_| self.mismatch(n * m))?;
        let biases = ArrayView1::from_shape(m, b_raw).map_err(|_| self.mismatch(m))?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }

    fn mismatch(&self, expected: usize) -> MlErr {
        MlErr::SizeMismatch {
            what: "layer shape",
            got: self.size,
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // w = [[1, 2], [3, 4], [5, 6]], b = [0.5, -10, 0]
    const PARAMS: [f32; 9] = [1., 2., 3., 4., 5., 6., 0.5, -10., 0.];

    #[test]
    fn forward_applies_weights_bias_and_activation() {
        let mut layer = Dense::new((2, 3), Some(ActFn::relu()));
        let x = array![[1., 1.], [0., -1.]];

        let a = layer.forward(&PARAMS, x.view()).unwrap();

        assert_eq!(a, array![[3.5, 0., 11.], [0., 0., 0.]]);
    }

    #[test]
    fn infer_matches_forward() {
        let mut layer = Dense::new((2, 3), None);
        let x = array![[0.3, -0.7]];

        let inferred = layer.infer(&PARAMS, x.view()).unwrap();
        let forwarded = layer.forward(&PARAMS, x.view()).unwrap();

        assert_eq!(inferred, forwarded);
    }

    #[test]
    fn backward_accumulates_gradient() {
        let mut layer = Dense::new((2, 3), None);
        let x = array![[1., 2.]];
        layer.forward(&PARAMS, x.view()).unwrap();

        let mut grad = [1.; 9];
        let d = array![[1., 0., -1.]];
        let d_prev = layer.backward(&PARAMS, &mut grad, d).unwrap();

        // dw = dᵀ · x and db = d, both added on top of the ones.
        assert_eq!(grad, [2., 3., 1., 1., 0., -1., 2., 1., 0.]);
        assert_eq!(d_prev, array![[-4., -4.]]);
    }

    #[test]
    fn rejects_wrong_input_width() {
        let layer = Dense::new((2, 3), None);
        let x = array![[1., 2., 3.]];

        assert!(matches!(
            layer.infer(&PARAMS, x.view()),
            Err(MlErr::SizeMismatch { got: 3, expected: 2, .. })
        ));
    }

    #[test]
    fn rejects_wrong_parameter_count() {
        let layer = Dense::new((2, 3), None);
        let x = array![[1., 2.]];

        assert!(layer.infer(&PARAMS[..8], x.view()).is_err());
    }

    #[test]
    fn backward_before_forward_fails() {
        let layer = Dense::new((2, 3), None);
        let mut grad = [0.; 9];

        assert!(layer.backward(&PARAMS, &mut grad, array![[1., 1., 1.]]).is_err());
    }
}
