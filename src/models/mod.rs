/// Model capability contract and the candle DenseNet backend
use candle_core::{Device, Tensor};

use crate::data::BatchDataLoader;

pub mod classifier;
pub mod densenet;

pub use classifier::DenseNetClassifier;
pub use densenet::{DenseNet, DenseNetConfig};

/// Loss and accuracy over a full evaluation pass
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

/// Operations the training loop and latency profiler need from a model.
///
/// Loaders handed to `fit_one_pass` and `evaluate` are already reset; the
/// implementation drains them until `next_batch` returns `None`.
pub trait Model {
    /// Device that input batches should live on
    fn device(&self) -> &Device;

    /// Inference on one batch, without updating any state
    fn predict(&self, batch: &Tensor) -> crate::Result<Tensor>;

    /// One full training pass; returns the mean training loss
    fn fit_one_pass(&mut self, batches: &mut dyn BatchDataLoader) -> crate::Result<f32>;

    /// Sample-weighted mean loss and accuracy over every batch
    fn evaluate(&mut self, batches: &mut dyn BatchDataLoader) -> crate::Result<Evaluation>;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);

    /// Serializable snapshot of the optimizer hyperparameters
    fn optimizer_config(&self) -> crate::Result<serde_json::Value>;
}
