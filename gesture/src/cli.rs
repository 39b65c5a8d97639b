use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::TrainConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Trains and runs the gesture classifier")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the classifier on a labeled dataset and save its weights.
    Train {
        /// JSON file with the training configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV dataset, the first column holds the 1-based label.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Where the trained weights get saved.
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        epochs: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Classify samples with previously saved weights.
    Predict {
        #[arg(long)]
        weights: PathBuf,

        #[command(flatten)]
        input: PredictInput,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct PredictInput {
    /// CSV of feature rows laid out like the training dataset.
    #[arg(long)]
    pub features: Option<PathBuf>,

    /// CSV of raw `ax,ay,az` accelerometer samples from a single recording.
    #[arg(long)]
    pub samples: Option<PathBuf>,
}

/// Builds the training configuration, the flags given on the command line take precedence over
/// the ones in the config file. The merged result is validated once the run starts.
pub fn train_config(
    config: Option<PathBuf>,
    data: Option<PathBuf>,
    output: Option<PathBuf>,
    epochs: Option<usize>,
    seed: Option<u64>,
) -> anyhow::Result<TrainConfig> {
    let mut cfg = match config {
        Some(path) => TrainConfig::from_file(path)?,
        None => TrainConfig::default(),
    };

    if let Some(data) = data {
        cfg.data_path = data;
    }
    if let Some(output) = output {
        cfg.output_path = output;
    }
    if let Some(epochs) = epochs {
        cfg.epochs = epochs;
    }
    if let Some(seed) = seed {
        cfg.seed = seed;
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_defaults() {
        let cli = Cli::try_parse_from(["gesture", "train"]).unwrap();
        let Commands::Train {
            config,
            data,
            output,
            epochs,
            seed,
        } = cli.command
        else {
            panic!("expected the train command");
        };

        let cfg = train_config(config, data, output, epochs, seed).unwrap();
        assert_eq!(cfg, TrainConfig::default());
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = train_config(
            None,
            Some("gestures.csv".into()),
            None,
            Some(20),
            Some(7),
        )
        .unwrap();

        assert_eq!(cfg.data_path, PathBuf::from("gestures.csv"));
        assert_eq!(cfg.epochs, 20);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.hidden, 32);
    }

    #[test]
    fn zero_epochs_flag_is_rejected_by_the_run() {
        let cfg = train_config(None, None, None, Some(0), None).unwrap();

        assert_eq!(cfg.epochs, 0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn predict_needs_exactly_one_input() {
        assert!(Cli::try_parse_from(["gesture", "predict", "--weights", "w"]).is_err());
        assert!(
            Cli::try_parse_from([
                "gesture", "predict", "--weights", "w", "--features", "f", "--samples", "s"
            ])
            .is_err()
        );

        let cli =
            Cli::try_parse_from(["gesture", "predict", "--weights", "w", "--samples", "s"])
                .unwrap();
        let Commands::Predict { input, .. } = cli.command else {
            panic!("expected the predict command");
        };
        assert_eq!(input.samples, Some(PathBuf::from("s")));
        assert!(input.features.is_none());
    }
}
