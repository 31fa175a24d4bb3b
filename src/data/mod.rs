/// Data loading modules for image classification
pub mod numpy_dataset;

pub use numpy_dataset::{DatasetSplit, ImageDataLoader, ImageDataset};

use candle_core::{Device, Result, Tensor};

/// Generic data loader trait
pub trait BatchDataLoader {
    /// Get next batch of (input, target) tensors
    fn next_batch(&mut self, device: &Device) -> Result<Option<(Tensor, Tensor)>>;

    /// Reset loader for new epoch
    fn reset(&mut self);

    /// Get total number of batches
    fn num_batches(&self) -> usize;

    /// Nominal batch size; the final batch may be shorter
    fn batch_size(&self) -> usize;
}
