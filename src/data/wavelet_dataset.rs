/// Wavelet recordings exported as NumPy arrays, windowed into decoder samples
use candle_core::{Device, Result, Tensor};
use ndarray::{s, Array1, Array2, Array3};
use ndarray_npy::ReadNpyExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use super::{Batch, BatchDataLoader};
use crate::config::DecoderOptions;
use crate::signals::SignalSet;
use crate::split::CvSplit;

fn default_model_function() -> String {
    "the_decoder".to_string()
}

/// Metadata from dataset.json
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetMetadata {
    /// Name of the network architecture the recording was trained with
    #[serde(default = "default_model_function")]
    pub model_function: String,
    /// Wavelet sampling rate in Hz
    #[serde(default)]
    pub sampling_rate: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self {
            model_function: default_model_function(),
            sampling_rate: None,
            description: "Unknown".to_string(),
        }
    }
}

/// Full-length arrays of one preprocessed recording
pub struct WaveletSource {
    wavelets: Array3<f32>,       // [N, frequencies, channels]
    position: Array2<f32>,       // [N, 2]
    head_direction: Array1<f32>, // [N], degrees
    speed: Array1<f32>,          // [N]
    metadata: DatasetMetadata,
}

fn read_npy<A: ReadNpyExt>(path: &Path) -> crate::Result<A> {
    let file = File::open(path).map_err(|e| {
        crate::DecoderError::Dataset(format!("Failed to open {}: {}", path.display(), e))
    })?;
    Ok(A::read_npy(BufReader::new(file))?)
}

impl WaveletSource {
    /// Load from a directory containing `inputs/` and `outputs/` .npy files
    pub fn from_directory<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let dir = path.as_ref();

        log::info!("Loading wavelet dataset from: {:?}", dir);

        let metadata_path = dir.join("dataset.json");
        let metadata: DatasetMetadata = if metadata_path.exists() {
            let file = File::open(&metadata_path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            log::warn!("dataset.json not found, using defaults");
            DatasetMetadata::default()
        };

        let wavelets: Array3<f32> = read_npy(&dir.join("inputs/wavelets.npy"))?;
        log::info!("Loaded wavelets: shape {:?}", wavelets.shape());

        let position: Array2<f32> = read_npy(&dir.join("outputs/position.npy"))?;
        let head_direction: Array1<f32> = read_npy(&dir.join("outputs/head_direction.npy"))?;
        let speed: Array1<f32> = read_npy(&dir.join("outputs/speed.npy"))?;

        let source = Self::new(wavelets, position, head_direction, speed, metadata)?;

        log::info!(
            "Dataset loaded: {} rows, {} frequencies, {} channels, model_function={}",
            source.num_rows(),
            source.num_frequencies(),
            source.num_channels(),
            source.metadata.model_function
        );

        Ok(source)
    }

    /// Build from in-memory arrays, checking that row counts agree
    pub fn new(
        wavelets: Array3<f32>,
        position: Array2<f32>,
        head_direction: Array1<f32>,
        speed: Array1<f32>,
        metadata: DatasetMetadata,
    ) -> crate::Result<Self> {
        let rows = wavelets.shape()[0];

        if position.ncols() != 2 {
            return Err(crate::DecoderError::Dataset(format!(
                "position must have 2 columns, got shape {:?}",
                position.shape()
            )));
        }

        if position.nrows() != rows || head_direction.len() != rows || speed.len() != rows {
            return Err(crate::DecoderError::Dataset(format!(
                "Row mismatch: wavelets {} / position {} / head_direction {} / speed {}",
                rows,
                position.nrows(),
                head_direction.len(),
                speed.len()
            )));
        }

        Ok(Self {
            wavelets,
            position,
            head_direction,
            speed,
            metadata,
        })
    }

    /// Number of time rows in the recording
    pub fn num_rows(&self) -> usize {
        self.wavelets.shape()[0]
    }

    pub fn num_frequencies(&self) -> usize {
        self.wavelets.shape()[1]
    }

    pub fn num_channels(&self) -> usize {
        self.wavelets.shape()[2]
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }
}

/// A set of sample windows over a shared source
pub struct WaveletDataset {
    source: Arc<WaveletSource>,
    indices: Vec<usize>,
    timesteps: usize,
    stride: usize,
}

impl WaveletDataset {
    /// Create a dataset of windows starting at `indices`
    ///
    /// Every index must leave room for a full window.
    pub fn new(
        source: Arc<WaveletSource>,
        indices: Vec<usize>,
        timesteps: usize,
        stride: usize,
    ) -> crate::Result<Self> {
        if stride == 0 || timesteps % stride != 0 {
            return Err(crate::DecoderError::Dataset(format!(
                "window of {} steps not divisible by output stride {}",
                timesteps, stride
            )));
        }

        let limit = source.num_rows().saturating_sub(timesteps);
        if let Some(&bad) = indices.iter().find(|&&i| i >= limit) {
            return Err(crate::DecoderError::Dataset(format!(
                "sample index {} out of range [0, {})",
                bad, limit
            )));
        }

        Ok(Self {
            source,
            indices,
            timesteps,
            stride,
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    /// Label steps per window
    pub fn output_steps(&self) -> usize {
        self.timesteps / self.stride
    }

    pub fn num_frequencies(&self) -> usize {
        self.source.num_frequencies()
    }

    pub fn num_channels(&self) -> usize {
        self.source.num_channels()
    }

    /// Architecture name declared by the recording
    pub fn model_function(&self) -> &str {
        &self.source.metadata.model_function
    }

    /// Append the input window of sample `pos` to `out`
    fn extend_input(&self, pos: usize, out: &mut Vec<f32>) {
        let start = self.indices[pos];
        let window = self
            .source
            .wavelets
            .slice(s![start..start + self.timesteps, .., ..]);
        out.extend(window.iter().copied());
    }

    /// Append the labels of sample `pos`; label step j reads row start + j * stride
    fn extend_labels(
        &self,
        pos: usize,
        position: &mut Vec<f32>,
        head_direction: &mut Vec<f32>,
        speed: &mut Vec<f32>,
    ) {
        let start = self.indices[pos];
        for step in 0..self.output_steps() {
            let row = start + step * self.stride;
            position.extend(self.source.position.row(row).iter().copied());
            head_direction.push(self.source.head_direction[row]);
            speed.push(self.source.speed[row]);
        }
    }

    /// Assemble a batch from dataset positions
    pub fn batch(&self, positions: &[usize], device: &Device) -> Result<Batch> {
        let batch_size = positions.len();
        let steps = self.output_steps();

        let mut inputs = Vec::new();
        let mut position = Vec::with_capacity(batch_size * steps * 2);
        let mut head_direction = Vec::with_capacity(batch_size * steps);
        let mut speed = Vec::with_capacity(batch_size * steps);

        for &pos in positions {
            self.extend_input(pos, &mut inputs);
            self.extend_labels(pos, &mut position, &mut head_direction, &mut speed);
        }

        let inputs = Tensor::from_vec(
            inputs,
            (
                batch_size,
                self.timesteps,
                self.num_frequencies(),
                self.num_channels(),
            ),
            device,
        )?;

        let labels = SignalSet::new(
            Tensor::from_vec(position, (batch_size, steps, 2), device)?,
            Tensor::from_vec(head_direction, (batch_size, steps), device)?,
            Tensor::from_vec(speed, (batch_size, steps), device)?,
        );

        Ok(Batch { inputs, labels })
    }
}

/// Build the train and test datasets of one cross-validation split
pub fn create_train_and_test_datasets(
    options: &DecoderOptions,
    source: Arc<WaveletSource>,
    split: &CvSplit,
) -> crate::Result<(WaveletDataset, WaveletDataset)> {
    let train = WaveletDataset::new(
        Arc::clone(&source),
        split.training.clone(),
        options.model_timesteps,
        options.output_stride,
    )?;
    let test = WaveletDataset::new(
        source,
        split.test.clone(),
        options.model_timesteps,
        options.output_stride,
    )?;

    log::info!(
        "Fold {}: {} training samples, {} test samples",
        split.fold,
        train.len(),
        test.len()
    );

    Ok((train, test))
}

/// Batching loader over a wavelet dataset
pub struct WaveletDataLoader {
    dataset: WaveletDataset,
    batch_size: usize,
    current_idx: usize,
    order: Vec<usize>,
    shuffle: bool,
    random_batches: bool,
    device: Device,
}

impl WaveletDataLoader {
    /// Create new data loader
    pub fn new(
        dataset: WaveletDataset,
        batch_size: usize,
        shuffle: bool,
        random_batches: bool,
        device: Device,
    ) -> Self {
        let mut order: Vec<usize> = (0..dataset.len()).collect();

        if shuffle {
            use rand::seq::SliceRandom;
            let mut rng = rand::thread_rng();
            order.shuffle(&mut rng);
        }

        Self {
            dataset,
            batch_size,
            current_idx: 0,
            order,
            shuffle,
            random_batches,
            device,
        }
    }

    /// Loader configured from evaluation options
    pub fn from_options(dataset: WaveletDataset, options: &DecoderOptions, device: Device) -> Self {
        Self::new(
            dataset,
            options.batch_size,
            options.shuffle,
            options.random_batches,
            device,
        )
    }

    /// Get next batch
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.current_idx >= self.order.len() {
            return Ok(None);
        }

        let end_idx = (self.current_idx + self.batch_size).min(self.order.len());

        let positions: Vec<usize> = if self.random_batches {
            use rand::Rng;
            let mut rng = rand::thread_rng();
            (self.current_idx..end_idx)
                .map(|_| rng.gen_range(0..self.order.len()))
                .collect()
        } else {
            self.order[self.current_idx..end_idx].to_vec()
        };

        self.current_idx = end_idx;

        self.dataset.batch(&positions, &self.device).map(Some)
    }

    /// Reset loader for new epoch
    pub fn reset(&mut self) {
        self.current_idx = 0;

        if self.shuffle {
            use rand::seq::SliceRandom;
            let mut rng = rand::thread_rng();
            self.order.shuffle(&mut rng);
        }
    }

    /// Get number of batches
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Get dataset reference
    pub fn dataset(&self) -> &WaveletDataset {
        &self.dataset
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl BatchDataLoader for WaveletDataLoader {
    fn next_batch(&mut self) -> Result<Option<Batch>> {
        WaveletDataLoader::next_batch(self)
    }

    fn reset(&mut self) {
        WaveletDataLoader::reset(self)
    }

    fn num_batches(&self) -> usize {
        WaveletDataLoader::num_batches(self)
    }
}
