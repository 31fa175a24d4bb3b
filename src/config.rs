/// Experiment configuration
///
/// Collects every hyperparameter and path of a run. Defaults match the
/// command-line defaults of `run_catsdogs`.
use std::path::PathBuf;

use crate::data::DatasetSplit;
use crate::models::DenseNetConfig;
use crate::training::{SgdConfig, TrainingConfig};

/// Evaluation batch size used on the test set every epoch
pub const EVAL_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExperimentConfig {
    /// Training batch size (also the profiling batch size)
    pub batch_size: usize,

    /// Number of training epochs
    pub nb_epoch: usize,

    /// Network depth; `(depth - 4) / 3` conv layers per dense block
    pub depth: usize,

    /// Number of dense blocks
    pub nb_dense_block: usize,

    /// Initial number of conv filters
    pub nb_filter: usize,

    /// Number of new filters added by each conv layer
    pub growth_rate: usize,

    /// Dropout rate
    pub dropout_rate: f32,

    /// Initial learning rate
    pub learning_rate: f64,

    /// L2 regularization on weights
    pub weight_decay: f64,

    /// Log file name, relative to `log_dir`
    pub logfile: String,

    /// Directory holding the experiment log
    pub log_dir: PathBuf,

    /// Directory holding architecture dumps
    pub figures_dir: PathBuf,

    /// Directory containing rgb_{train,test}_{in,out}.npy
    pub dataset_dir: PathBuf,

    /// Write the architecture summary to `figures_dir`
    pub plot_architecture: bool,

    /// Number of timed inference batches
    pub latency_repeat: usize,

    /// Optional safetensors output for the trained weights
    pub save_weights: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            nb_epoch: 30,
            depth: 7,
            nb_dense_block: 1,
            nb_filter: 16,
            growth_rate: 12,
            dropout_rate: 0.2,
            learning_rate: 1e-3,
            weight_decay: 1e-4,
            logfile: "experiment_log_cifar10.json".to_string(),
            log_dir: PathBuf::from("./log"),
            figures_dir: PathBuf::from("./figures"),
            dataset_dir: PathBuf::from("./datasets/cats_vs_dogs"),
            plot_architecture: false,
            latency_repeat: 25,
            save_weights: None,
        }
    }
}

impl ExperimentConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 {
            return Err(crate::ExperimentError::Config(
                "batch_size must be > 0".to_string(),
            ));
        }

        if self.nb_epoch == 0 {
            return Err(crate::ExperimentError::Config(
                "nb_epoch must be > 0".to_string(),
            ));
        }

        if !(self.learning_rate > 0.0) {
            return Err(crate::ExperimentError::Config(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }

        if self.weight_decay < 0.0 {
            return Err(crate::ExperimentError::Config(format!(
                "weight_decay must be >= 0, got {}",
                self.weight_decay
            )));
        }

        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(crate::ExperimentError::Config(format!(
                "dropout_rate must be in [0, 1), got {}",
                self.dropout_rate
            )));
        }

        if self.latency_repeat == 0 {
            return Err(crate::ExperimentError::Config(
                "latency_repeat must be > 0".to_string(),
            ));
        }

        if self.depth < 4 || (self.depth - 4) % 3 != 0 {
            return Err(crate::ExperimentError::Config(format!(
                "depth must be 3N + 4, got {}",
                self.depth
            )));
        }

        if self.nb_dense_block == 0 || self.nb_filter == 0 || self.growth_rate == 0 {
            return Err(crate::ExperimentError::Config(
                "nb_dense_block, nb_filter and growth_rate must be > 0".to_string(),
            ));
        }

        if self.logfile.is_empty() {
            return Err(crate::ExperimentError::Config(
                "logfile must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Full path of the JSON experiment log
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.logfile)
    }

    /// Training loop settings
    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            nb_epoch: self.nb_epoch,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            eval_batch_size: EVAL_BATCH_SIZE,
            log_path: self.log_path(),
            shuffle: true,
        }
    }

    /// Optimizer settings: Nesterov SGD with momentum 0.9
    pub fn sgd_config(&self) -> SgdConfig {
        SgdConfig {
            lr: self.learning_rate,
            momentum: 0.9,
            nesterov: true,
            weight_decay: self.weight_decay,
        }
    }

    /// Network settings, with input channels and classes taken from the data
    pub fn densenet_config(&self, data: &DatasetSplit) -> DenseNetConfig {
        let [_, _, channels] = data.train.image_dims();
        DenseNetConfig {
            depth: self.depth,
            nb_dense_block: self.nb_dense_block,
            nb_filter: self.nb_filter,
            growth_rate: self.growth_rate,
            dropout_rate: self.dropout_rate,
            in_channels: channels,
            num_classes: data.train.num_classes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.latency_repeat, 25);
        assert_eq!(
            config.log_path(),
            PathBuf::from("./log").join("experiment_log_cifar10.json")
        );
    }

    #[test]
    fn test_rejects_bad_depth() {
        let config = ExperimentConfig {
            depth: 8,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(crate::ExperimentError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_zero_batch_and_epochs() {
        let config = ExperimentConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ExperimentConfig {
            nb_epoch: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_training_config_uses_fixed_eval_batch() {
        let config = ExperimentConfig {
            batch_size: 16,
            ..Default::default()
        };
        let training = config.training_config();
        assert_eq!(training.batch_size, 16);
        assert_eq!(training.eval_batch_size, 64);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = ExperimentConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.nb_filter, config.nb_filter);
        assert_eq!(parsed.dataset_dir, config.dataset_dir);
    }
}
