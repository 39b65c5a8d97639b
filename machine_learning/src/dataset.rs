use std::{fs::File, io, path::Path};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::{MlErr, Result};

/// A labeled, tabular dataset held in memory.
///
/// Every sample has `in_features` real-valued features and a 0-based class label lower than
/// `num_classes`.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array1<usize>,
    num_classes: usize,
}

impl Dataset {
    /// Loads a dataset from a CSV file.
    ///
    /// The first row is a header and is discarded. Every other row is `label,feature_1,...`,
    /// where `label` is a 1-based class index.
    ///
    /// # Arguments
    /// * `path` - The path to the CSV file.
    ///
    /// # Returns
    /// The dataset or a `MlErr::DataFormat` describing why the file couldn't be loaded.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(open(path.as_ref())?)
    }

    /// Loads a dataset from any CSV source, see `Dataset::from_csv`.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        Self::from_rows(&read_table(reader)?)
    }

    /// Loads only the feature matrix of a CSV file laid out like the one `Dataset::from_csv`
    /// takes. The label column must still be numeric but its values are not checked, so
    /// unlabeled samples can carry any placeholder there.
    pub fn features_from_csv<P: AsRef<Path>>(path: P) -> Result<Array2<f32>> {
        Self::features_from_reader(open(path.as_ref())?)
    }

    /// Loads only the feature matrix of any CSV source, see `Dataset::features_from_csv`.
    pub fn features_from_reader<R: io::Read>(reader: R) -> Result<Array2<f32>> {
        let (x, _) = split_rows(&read_table(reader)?)?;
        Ok(x)
    }

    /// Builds a dataset from raw table rows of the form `[label, feature_1, ...]`.
    ///
    /// # Returns
    /// An error if there are no rows, no feature columns, rows of different widths, or a label
    /// that isn't a positive integer.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let (x, raw_labels) = split_rows(rows)?;

        let y = raw_labels
            .iter()
            .enumerate()
            .map(|(i, &raw)| {
                parse_label(raw).ok_or_else(|| {
                    MlErr::data_format(
                        None,
                        format!("row {}: label {raw} is not a positive integer", i + 1),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(x, Array1::from(y))
    }

    /// Creates a new `Dataset` out of a feature matrix and its 0-based labels.
    pub fn new(x: Array2<f32>, y: Array1<usize>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "labels",
                got: y.len(),
                expected: x.nrows(),
            });
        }

        let Some(&max) = y.iter().max() else {
            return Err(MlErr::data_format(None, "the dataset has no samples"));
        };

        Ok(Self {
            x,
            y,
            num_classes: max + 1,
        })
    }

    /// The feature matrix, one sample per row.
    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    /// The 0-based label of every sample.
    pub fn labels(&self) -> ArrayView1<'_, usize> {
        self.y.view()
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn in_features(&self) -> usize {
        self.x.ncols()
    }

    /// Returns the labels encoded as a `(len, num_classes)` one-hot matrix.
    pub fn one_hot(&self) -> Array2<f32> {
        let mut targets = Array2::zeros((self.len(), self.num_classes));
        for (i, &label) in self.y.iter().enumerate() {
            targets[[i, label]] = 1.;
        }

        targets
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| MlErr::data_format(None, format!("cannot read '{}': {e}", path.display())))
}

/// Parses every record after the header into numbers. All records must be as wide as the first
/// one, the header's own width is irrelevant.
fn read_table<R: io::Read>(reader: R) -> Result<Vec<Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut width = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|pos| pos.line() as usize);

        let width = *width.get_or_insert(record.len());
        if record.len() != width {
            return Err(MlErr::data_format(
                line,
                format!("expected {width} columns, got {}", record.len()),
            ));
        }

        let row = record
            .iter()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    MlErr::data_format(line, format!("cannot parse '{token}' as a number"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        rows.push(row);
    }

    Ok(rows)
}

/// Splits `[label, feature_1, ...]` rows into the feature matrix and the raw labels.
fn split_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<(Array2<f32>, Vec<f64>)> {
    let Some(first) = rows.first() else {
        return Err(MlErr::data_format(None, "the dataset has no samples"));
    };

    let width = first.as_ref().len();
    if width < 2 {
        return Err(MlErr::data_format(
            None,
            "expected a label column followed by at least one feature column",
        ));
    }

    let in_features = width - 1;
    let mut x = Vec::with_capacity(rows.len() * in_features);
    let mut labels = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        if row.len() != width {
            return Err(MlErr::data_format(
                None,
                format!("row {}: expected {width} columns, got {}", i + 1, row.len()),
            ));
        }

        labels.push(row[0]);
        x.extend(row[1..].iter().map(|&v| v as f32));
    }

    let x = Array2::from_shape_vec((rows.len(), in_features), x)
        .map_err(|e| MlErr::data_format(None, e.to_string()))?;

    Ok((x, labels))
}

fn parse_label(raw: f64) -> Option<usize> {
    if raw.is_finite() && raw.fract() == 0. && raw >= 1. {
        Some(raw as usize - 1)
    } else {
        None
    }
}

fn csv_err(e: csv::Error) -> MlErr {
    let line = e.position().map(|pos| pos.line() as usize);
    MlErr::data_format(line, e.to_string())
}
