pub mod cli;
pub mod config;
pub mod features;
pub mod pipeline;
pub mod report;

pub use config::TrainConfig;
pub use pipeline::{TrainOutcome, predict_features, predict_recording, train};
