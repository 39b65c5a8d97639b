use std::{fs, num::NonZeroUsize, path::Path, path::PathBuf};

use anyhow::{Context, bail};
use serde::Deserialize;

/// Everything a training run needs to know, from where the samples are to where the weights go.
///
/// Missing fields in a config file fall back to the defaults of `TrainConfig::default`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub hidden: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub seed: u64,
    pub log_interval: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data.csv"),
            output_path: PathBuf::from("out/gesture_model_weights.safetensors"),
            hidden: 32,
            epochs: 500,
            learning_rate: 0.01,
            seed: 0,
            log_interval: 50,
        }
    }
}

impl TrainConfig {
    /// Loads a `TrainConfig` from a JSON file.
    ///
    /// # Errors
    /// If the file can't be read, isn't valid JSON or holds an invalid configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config '{}'", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid config '{}'", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the hyperparameters describe a run that can actually happen.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.epochs == 0 {
            bail!("epochs must be greater than 0");
        }
        if self.hidden == 0 {
            bail!("hidden must be greater than 0");
        }
        if self.log_interval == 0 {
            bail!("log_interval must be greater than 0");
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0. {
            bail!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            );
        }

        Ok(())
    }

    pub(crate) fn log_interval(&self) -> anyhow::Result<NonZeroUsize> {
        NonZeroUsize::new(self.log_interval).context("log_interval must be greater than 0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let config = TrainConfig::default();

        assert_eq!(config.hidden, 32);
        assert_eq!(config.epochs, 500);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.log_interval, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: TrainConfig =
            serde_json::from_str(r#"{ "epochs": 10, "data_path": "gestures.csv" }"#).unwrap();

        assert_eq!(config.epochs, 10);
        assert_eq!(config.data_path, PathBuf::from("gestures.csv"));
        assert_eq!(config.hidden, 32);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<TrainConfig>(r#"{ "epoch": 10 }"#).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad = [
            TrainConfig {
                epochs: 0,
                ..Default::default()
            },
            TrainConfig {
                hidden: 0,
                ..Default::default()
            },
            TrainConfig {
                log_interval: 0,
                ..Default::default()
            },
            TrainConfig {
                learning_rate: -0.1,
                ..Default::default()
            },
            TrainConfig {
                learning_rate: f32::NAN,
                ..Default::default()
            },
        ];

        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        fs::write(&path, r#"{ "seed": 7, "learning_rate": 0.05 }"#).unwrap();

        let config = TrainConfig::from_file(&path).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.learning_rate, 0.05);
    }

    #[test]
    fn from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        fs::write(&path, r#"{ "epochs": 0 }"#).unwrap();

        assert!(TrainConfig::from_file(&path).is_err());
    }
}
