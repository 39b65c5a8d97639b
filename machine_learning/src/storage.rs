//! Persistence of trained parameters as safetensors files.
//!
//! Layer `i` (1-based) of a `Sequential` is stored as the tensors `fc{i}.weight`, shaped
//! `[out, in]`, and `fc{i}.bias`, shaped `[out]`. This is the state dict layout of the equivalent
//! PyTorch module, so the files load there too.

use std::{collections::HashMap, fs, path::Path};

use log::debug;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{
    MlErr, Result,
    arch::{Model, Sequential, activations::ActFn, layers::Dense},
};

/// Writes `params` to `path`, creating its parent directories and overwriting any existing file.
///
/// # Arguments
/// * `path` - Where to write the weights.
/// * `model` - The model `params` belong to.
/// * `params` - The model's flat parameter buffer.
pub fn save<P: AsRef<Path>>(path: P, model: &Sequential, params: &[f32]) -> Result<()> {
    let path = path.as_ref();

    if params.len() != model.size() {
        return Err(MlErr::SizeMismatch {
            what: "saved parameters",
            got: params.len(),
            expected: model.size(),
        });
    }

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let mut tensors = Vec::with_capacity(2 * model.layers().len());
    let mut rest = params;

    for (i, layer) in model.layers().iter().enumerate() {
        let (n, m) = layer.dim();
        let (layer_params, tail) = rest.split_at(layer.size());
        let (weights, biases) = layer_params.split_at(n * m);

        let weights = TensorView::new(Dtype::F32, vec![m, n], bytemuck::cast_slice(weights))?;
        let biases = TensorView::new(Dtype::F32, vec![m], bytemuck::cast_slice(biases))?;
        tensors.push((format!("fc{}.weight", i + 1), weights));
        tensors.push((format!("fc{}.bias", i + 1), biases));

        rest = tail;
    }

    let metadata = Some(HashMap::from([("format".to_string(), "pt".to_string())]));
    safetensors::serialize_to_file(tensors, &metadata, path)?;
    debug!("wrote {} parameters to {}", params.len(), path.display());

    Ok(())
}

/// Reads the weights at `path`, rebuilding the model they belong to.
///
/// Every layer but the last is followed by a ReLU.
///
/// # Returns
/// The model and its flat parameter buffer, or `MlErr::Storage` if the file doesn't describe a
/// chain of dense layers.
pub fn load<P: AsRef<Path>>(path: P) -> Result<(Sequential, Vec<f32>)> {
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes)?;

    let mut dims: Vec<(usize, usize)> = Vec::new();
    let mut params = Vec::new();

    loop {
        let i = dims.len() + 1;
        let Ok(weights) = tensors.tensor(&format!("fc{i}.weight")) else {
            break;
        };
        let biases = tensors
            .tensor(&format!("fc{i}.bias"))
            .map_err(|_| MlErr::Storage(format!("missing tensor fc{i}.bias")))?;

        let &[m, n] = weights.shape() else {
            return Err(MlErr::Storage(format!(
                "fc{i}.weight has shape {:?}, expected [out, in]",
                weights.shape()
            )));
        };

        if biases.shape() != [m] {
            return Err(MlErr::Storage(format!(
                "fc{i}.bias has shape {:?}, expected [{m}]",
                biases.shape()
            )));
        }

        if let Some(&(_, prev_m)) = dims.last() {
            if prev_m != n {
                return Err(MlErr::Storage(format!(
                    "fc{i} takes {n} inputs but the previous layer outputs {prev_m}"
                )));
            }
        }

        params.extend(read_f32(&weights, i)?);
        params.extend(read_f32(&biases, i)?);
        dims.push((n, m));
    }

    if dims.is_empty() {
        return Err(MlErr::Storage("missing tensor fc1.weight".into()));
    }

    let last = dims.len() - 1;
    let model = Sequential::new(
        dims.into_iter()
            .enumerate()
            .map(|(i, dim)| Dense::new(dim, (i != last).then(ActFn::relu))),
    );

    debug!("read {} parameters from the weights file", params.len());
    Ok((model, params))
}

fn read_f32(view: &TensorView<'_>, layer: usize) -> Result<Vec<f32>> {
    if view.dtype() != Dtype::F32 {
        return Err(MlErr::Storage(format!(
            "fc{layer} is stored as {:?}, expected F32",
            view.dtype()
        )));
    }

    Ok(bytemuck::pod_collect_to_vec(view.data()))
}
