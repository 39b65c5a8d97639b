//! Reduction of a raw accelerometer recording to the feature vector the classifier consumes.

use std::{io, path::Path};

use anyhow::{Context, bail};

/// The amount of features `extract_features` produces.
pub const NUM_FEATURES: usize = 13;

/// Running statistics of a single accelerometer axis.
///
/// Sums are kept in `f64` since the standard deviation comes from `E[v²] - E[v]²`.
#[derive(Debug, Clone, Copy)]
struct AxisStats {
    sum: f64,
    sum_sq: f64,
    min: f32,
    max: f32,
    count: usize,
}

impl Default for AxisStats {
    fn default() -> Self {
        Self {
            sum: 0.,
            sum_sq: 0.,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            count: 0,
        }
    }
}

impl AxisStats {
    fn add(&mut self, v: f32) {
        let v64 = f64::from(v);
        self.sum += v64;
        self.sum_sq += v64 * v64;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.count += 1;
    }

    fn mean(&self) -> f32 {
        (self.sum / self.count as f64) as f32
    }

    /// Population standard deviation.
    fn std_dev(&self) -> f32 {
        let mean = self.sum / self.count as f64;
        (self.sum_sq / self.count as f64 - mean * mean).max(0.).sqrt() as f32
    }

    fn rms(&self) -> f32 {
        (self.sum_sq / self.count as f64).sqrt() as f32
    }

    fn peak_to_peak(&self) -> f32 {
        self.max - self.min
    }
}

/// Reduces a recording of `[ax, ay, az]` samples to its features.
///
/// For each axis, in order, the mean, standard deviation, RMS and peak-to-peak amplitude,
/// followed by the RMS of the acceleration magnitude.
///
/// # Returns
/// `None` if the recording is empty.
pub fn extract_features(samples: &[[f32; 3]]) -> Option<[f32; NUM_FEATURES]> {
    if samples.is_empty() {
        return None;
    }

    let mut axes = [AxisStats::default(); 3];
    let mut magnitude_sum_sq = 0f64;

    for sample in samples {
        for (axis, &v) in axes.iter_mut().zip(sample) {
            axis.add(v);
        }
        magnitude_sum_sq += sample.iter().map(|&v| f64::from(v).powi(2)).sum::<f64>();
    }

    let mut features = [0.; NUM_FEATURES];
    for (chunk, axis) in features.chunks_exact_mut(4).zip(&axes) {
        chunk.copy_from_slice(&[axis.mean(), axis.std_dev(), axis.rms(), axis.peak_to_peak()]);
    }
    features[12] = (magnitude_sum_sq / samples.len() as f64).sqrt() as f32;

    Some(features)
}

/// Reads a recording from a CSV file of `ax,ay,az` rows. The first row is a header.
pub fn read_recording<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<[f32; 3]>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open recording '{}'", path.display()))?;

    parse_recording(file).with_context(|| format!("invalid recording '{}'", path.display()))
}

fn parse_recording<R: io::Read>(reader: R) -> anyhow::Result<Vec<[f32; 3]>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |pos| pos.line());

        if record.len() != 3 {
            bail!("line {line}: expected 3 columns, found {}", record.len());
        }

        let mut sample = [0.; 3];
        for (v, field) in sample.iter_mut().zip(record.iter()) {
            *v = field
                .parse()
                .with_context(|| format!("line {line}: '{field}' is not a number"))?;
        }
        samples.push(sample);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-5;

    fn assert_close(got: f32, expected: f32) {
        assert!((got - expected).abs() < TOL, "{got} != {expected}");
    }

    #[test]
    fn parses_recording_rows() {
        let csv = "ax,ay,az\n0.1, -0.2, 9.8\n0.0,0.0,9.81\n";
        let samples = parse_recording(csv.as_bytes()).unwrap();

        assert_eq!(samples, vec![[0.1, -0.2, 9.8], [0., 0., 9.81]]);
    }

    #[test]
    fn malformed_recording_rows() {
        assert!(parse_recording("ax,ay,az\n1,2\n".as_bytes()).is_err());
        assert!(parse_recording("ax,ay,az\n1,2,up\n".as_bytes()).is_err());
    }

    #[test]
    fn empty_recording() {
        assert!(extract_features(&[]).is_none());
    }

    #[test]
    fn at_rest_on_the_table() {
        let samples = [[0., 0., 9.81]; 50];
        let features = extract_features(&samples).unwrap();

        assert_eq!(&features[..8], &[0.; 8]);
        assert_close(features[8], 9.81);
        assert_close(features[9], 0.);
        assert_close(features[10], 9.81);
        assert_close(features[11], 0.);
        assert_close(features[12], 9.81);
    }

    #[test]
    fn per_axis_statistics() {
        let samples = [[1., -2., 0.], [3., 2., 0.]];
        let features = extract_features(&samples).unwrap();

        // x: mean 2, std 1, rms sqrt(5), p2p 2
        assert_close(features[0], 2.);
        assert_close(features[1], 1.);
        assert_close(features[2], 5f32.sqrt());
        assert_close(features[3], 2.);
        // y: mean 0, std 2, rms 2, p2p 4
        assert_close(features[4], 0.);
        assert_close(features[5], 2.);
        assert_close(features[6], 2.);
        assert_close(features[7], 4.);
        // |a|² is 5 and 13
        assert_close(features[12], 9f32.sqrt());
    }
}
