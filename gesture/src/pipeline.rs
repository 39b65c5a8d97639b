use std::{cell::RefCell, io, path::Path, path::PathBuf, rc::Rc};

use anyhow::Context;
use log::info;
use machine_learning::{
    arch::{Model, Sequential, loss::CrossEntropy},
    dataset::Dataset,
    optimization::Adam,
    storage,
    training::Trainer,
};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    config::TrainConfig,
    features::{self, NUM_FEATURES},
    report::{self, Prediction},
};

/// What a training run leaves behind.
#[derive(Debug)]
pub struct TrainOutcome {
    pub model: Sequential,
    pub params: Vec<f32>,
    pub num_classes: usize,
    /// The loss of every epoch.
    pub losses: Vec<f32>,
    pub predictions: Vec<Prediction>,
    pub weights_path: PathBuf,
}

/// Runs the whole training pipeline: load the dataset, train the classifier on it, report its
/// predictions over the training samples to `out` and save the weights.
///
/// # Arguments
/// * `config` - The configuration of the run.
/// * `out` - Where the predictions and the save confirmation get written.
pub fn train<W: io::Write>(config: &TrainConfig, out: &mut W) -> anyhow::Result<TrainOutcome> {
    config.validate()?;

    let dataset = Dataset::from_csv(&config.data_path)
        .with_context(|| format!("cannot load dataset '{}'", config.data_path.display()))?;
    info!(
        "loaded {} samples with {} features and {} classes",
        dataset.len(),
        dataset.in_features(),
        dataset.num_classes()
    );

    let model = Sequential::classifier(dataset.in_features(), config.hidden, dataset.num_classes());
    let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(config.seed)));
    let mut params = model.init_params(rng)?;
    info!("training {} parameters for {} epochs", model.size(), config.epochs);

    let optimizer = Adam::with_learning_rate(model.size(), config.learning_rate);
    let mut trainer = Trainer::new(
        model,
        optimizer,
        CrossEntropy::new(),
        config.epochs,
        config.log_interval()?,
    );

    let targets = dataset.one_hot();
    let losses = trainer.train(&mut params, dataset.x(), targets.view())?;
    let model = trainer.into_model();

    let predictions = report::predict(&model, &params, dataset.x())?;
    report::write_predictions(out, &predictions)?;

    storage::save(&config.output_path, &model, &params).with_context(|| {
        format!("cannot save weights to '{}'", config.output_path.display())
    })?;
    writeln!(out, "Weights saved to {}", config.output_path.display())?;

    Ok(TrainOutcome {
        model,
        params,
        num_classes: dataset.num_classes(),
        losses,
        predictions,
        weights_path: config.output_path.clone(),
    })
}

/// Classifies the samples of a feature CSV, laid out like the training dataset, with the weights
/// at `weights`. The label column is ignored, so it may hold any placeholder number.
pub fn predict_features<W: io::Write>(
    weights: &Path,
    features_path: &Path,
    out: &mut W,
) -> anyhow::Result<Vec<Prediction>> {
    let (model, params) = load_weights(weights)?;
    let x = Dataset::features_from_csv(features_path)
        .with_context(|| format!("cannot load features '{}'", features_path.display()))?;

    let predictions = report::predict(&model, &params, x.view())?;
    report::write_predictions(out, &predictions)?;
    Ok(predictions)
}

/// Classifies a single raw accelerometer recording, a CSV of `ax,ay,az` rows with a header, with
/// the weights at `weights`.
pub fn predict_recording<W: io::Write>(
    weights: &Path,
    recording_path: &Path,
    out: &mut W,
) -> anyhow::Result<Prediction> {
    let (model, params) = load_weights(weights)?;
    let samples = features::read_recording(recording_path)?;
    let features = features::extract_features(&samples)
        .with_context(|| format!("recording '{}' is empty", recording_path.display()))?;

    let x = Array2::from_shape_vec((1, NUM_FEATURES), features.to_vec())?;
    let mut predictions = report::predict(&model, &params, x.view())?;
    report::write_predictions(out, &predictions)?;

    predictions
        .pop()
        .context("the model produced no prediction")
}

fn load_weights(path: &Path) -> anyhow::Result<(Sequential, Vec<f32>)> {
    let (model, params) = storage::load(path)
        .with_context(|| format!("cannot load weights '{}'", path.display()))?;
    info!(
        "loaded a model with {} inputs and {} classes",
        model.in_features(),
        model.out_features()
    );

    Ok((model, params))
}
