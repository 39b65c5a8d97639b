use std::{fmt, io};

use machine_learning::{
    Result,
    arch::{Model, loss::softmax},
};
use ndarray::ArrayView2;

/// The classification of a single sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub input: Vec<f32>,
    /// The predicted class, 1-based like the labels of the dataset.
    pub label: usize,
    /// The probability of the predicted class.
    pub confidence: f32,
    pub probs: Vec<f32>,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} -> label {} prob {:.3}  probs [",
            self.input, self.label, self.confidence
        )?;

        for (i, p) in self.probs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p:.3}")?;
        }

        f.write_str("]")
    }
}

/// Classifies every row of `x`.
///
/// # Arguments
/// * `model` - The model producing the logits.
/// * `params` - The model's parameters.
/// * `x` - The samples to classify, one per row.
///
/// # Returns
/// One prediction per row, or an error if `x` or `params` don't fit the model.
pub fn predict<M: Model>(
    model: &M,
    params: &[f32],
    x: ArrayView2<f32>,
) -> Result<Vec<Prediction>> {
    let logits = model.infer(params, x)?;
    let probs = softmax(logits.view());

    let predictions = x
        .rows()
        .into_iter()
        .zip(probs.rows())
        .map(|(input, probs)| {
            let mut best = 0;
            for (class, &p) in probs.iter().enumerate() {
                if p > probs[best] {
                    best = class;
                }
            }

            Prediction {
                input: input.to_vec(),
                label: best + 1,
                confidence: probs[best],
                probs: probs.to_vec(),
            }
        })
        .collect();

    Ok(predictions)
}

/// Writes the predictions block, one line per sample.
pub fn write_predictions<W: io::Write>(
    out: &mut W,
    predictions: &[Prediction],
) -> io::Result<()> {
    writeln!(out, "\nPredictions:")?;
    for prediction in predictions {
        writeln!(out, "{prediction}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use machine_learning::arch::{Sequential, layers::Dense};
    use ndarray::array;

    /// A single identity-like layer, so the logits are the inputs themselves.
    fn passthrough() -> (Sequential, Vec<f32>) {
        let model = Sequential::new([Dense::new((2, 2), None)]);
        (model, vec![1., 0., 0., 1., 0., 0.])
    }

    #[test]
    fn picks_the_most_likely_class() {
        let (model, params) = passthrough();
        let x = array![[2., 0.], [0., 3.]];

        let predictions = predict(&model, &params, x.view()).unwrap();

        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].label, 1);
        assert_eq!(predictions[1].label, 2);
        assert_eq!(predictions[1].input, [0., 3.]);
        for prediction in &predictions {
            assert!((prediction.probs.iter().sum::<f32>() - 1.).abs() < 1e-5);
            assert!(prediction.confidence > 0.5);
        }
    }

    #[test]
    fn ties_go_to_the_first_class() {
        let (model, params) = passthrough();
        let x = array![[1., 1.]];

        let predictions = predict(&model, &params, x.view()).unwrap();

        assert_eq!(predictions[0].label, 1);
        assert_eq!(predictions[0].confidence, 0.5);
    }

    #[test]
    fn wrong_feature_width_is_an_error() {
        let (model, params) = passthrough();
        let x = array![[1., 1., 1.]];

        assert!(predict(&model, &params, x.view()).is_err());
    }

    #[test]
    fn formats_like_the_console_report() {
        let prediction = Prediction {
            input: vec![0.1, 0.2],
            label: 1,
            confidence: 0.97315,
            probs: vec![0.97315, 0.02685],
        };

        assert_eq!(
            prediction.to_string(),
            "[0.1, 0.2] -> label 1 prob 0.973  probs [0.973, 0.027]"
        );
    }

    #[test]
    fn writes_a_block_of_lines() {
        let prediction = Prediction {
            input: vec![1.0],
            label: 1,
            confidence: 1.,
            probs: vec![1.],
        };
        let mut out = Vec::new();

        write_predictions(&mut out, &[prediction.clone(), prediction]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "\nPredictions:\n[1.0] -> label 1 prob 1.000  probs [1.000]\n[1.0] -> label 1 prob 1.000  probs [1.000]\n"
        );
    }
}
