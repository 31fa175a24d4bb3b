//! catsdogs - DenseNet training harness
//!
//! Trains a DenseNet image classifier on an in-memory `.npy` dataset,
//! measures per-sample inference latency once before training, and keeps a
//! JSON experiment log that is rewritten after every epoch.
//!
//! # Pipeline
//!
//! - **Data**: four `.npy` arrays loaded into a [`DatasetSplit`]
//! - **Model**: anything implementing [`Model`]; [`DenseNetClassifier`] is the
//!   candle backend
//! - **Profiling**: [`profiling::sample_latency`] times repeated random batches
//! - **Training**: [`Trainer`] drives epochs with a step-decay learning rate
//!
//! # Example
//!
//! ```ignore
//! use catsdogs::{DatasetSplit, DenseNetClassifier, ExperimentConfig, Trainer};
//!
//! let config = ExperimentConfig::default();
//! let data = DatasetSplit::from_directory(&config.dataset_dir)?;
//! let model = DenseNetClassifier::new(config.densenet_config(&data), config.sgd_config(), &device)?;
//! let latency = catsdogs::profiling::sample_latency(&model, &data.batch_shape(config.batch_size), 25)?;
//! let mut trainer = Trainer::new(model, config.training_config())?;
//! trainer.train(&data, latency.mean)?;
//! ```

pub mod config;
pub mod data;
pub mod layers;
pub mod models;
pub mod profiling;
pub mod training;
pub mod utils;

// Re-export commonly used items
pub use config::ExperimentConfig;
pub use data::{DatasetSplit, ImageDataset};
pub use models::{DenseNetClassifier, DenseNetConfig, Evaluation, Model};
pub use training::{ExperimentLog, Trainer, TrainingConfig};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExperimentError>;
