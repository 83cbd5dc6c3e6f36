/// Dataset windowing and batching
pub mod wavelet_dataset;

pub use wavelet_dataset::{
    create_train_and_test_datasets, DatasetMetadata, WaveletDataLoader, WaveletDataset,
    WaveletSource,
};

use candle_core::{Result, Tensor};

use crate::signals::SignalSet;

/// One batch of windowed samples
#[derive(Debug, Clone)]
pub struct Batch {
    /// Wavelet windows [batch, timesteps, frequencies, channels]
    pub inputs: Tensor,
    /// Ground truth at each output step
    pub labels: SignalSet,
}

impl Batch {
    pub fn len(&self) -> Result<usize> {
        self.inputs.dim(0)
    }
}

/// Generic data loader trait
pub trait BatchDataLoader {
    /// Get next batch, `None` once the epoch is exhausted
    fn next_batch(&mut self) -> Result<Option<Batch>>;

    /// Reset loader for new epoch
    fn reset(&mut self);

    /// Get total number of batches
    fn num_batches(&self) -> usize;
}
