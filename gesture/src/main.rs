use std::io;

use clap::Parser;
use env_logger::Env;

use gesture::cli::{self, Cli, Commands, PredictInput};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Train {
            config,
            data,
            output,
            epochs,
            seed,
        } => {
            let config = cli::train_config(config, data, output, epochs, seed)?;
            gesture::train(&config, &mut out)?;
        }
        Commands::Predict {
            weights,
            input: PredictInput { features, samples },
        } => {
            // clap's group guarantees exactly one of them
            if let Some(features) = features {
                gesture::predict_features(&weights, &features, &mut out)?;
            } else if let Some(samples) = samples {
                gesture::predict_recording(&weights, &samples, &mut out)?;
            }
        }
    }

    Ok(())
}
