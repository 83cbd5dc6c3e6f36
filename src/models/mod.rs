/// Wavelet decoder networks
use candle_core::{Result, Tensor, D};
use candle_nn::VarBuilder;

use crate::config::ModelConfig;
use crate::data::WaveletDataset;
use crate::layers::{rms_norm, CastedLinear, DenseElu};
use crate::signals::{Signal, SignalSet};

pub mod loader;

pub use loader::{load_for_dataset, load_model};

/// Anything that maps a wavelet batch to the three decoded signals
pub trait SignalDecoder {
    /// Decode inputs [batch, timesteps, frequencies, channels]
    fn decode(&self, inputs: &Tensor) -> Result<SignalSet>;
}

/// Known network architectures, selected by the name a dataset declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFunction {
    /// Dense ELU encoder shared by three linear heads
    TheDecoder,
    /// Linear heads directly on the pooled wavelet features
    LinearDecoder,
}

impl ModelFunction {
    pub const ALL: [ModelFunction; 2] = [ModelFunction::TheDecoder, ModelFunction::LinearDecoder];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFunction::TheDecoder => "the_decoder",
            ModelFunction::LinearDecoder => "linear_decoder",
        }
    }

    /// Resolve an architecture from its name
    pub fn from_name(name: &str) -> crate::Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == name)
            .ok_or_else(|| crate::DecoderError::unknown("model function", name))
    }

    /// Construct the architecture, taking parameters from `vb`
    pub fn build(
        &self,
        config: &ModelConfig,
        dims: DecoderDims,
        vb: VarBuilder,
    ) -> crate::Result<WaveletDecoder> {
        let num_layers = match self {
            ModelFunction::TheDecoder => config.num_dense_layers,
            ModelFunction::LinearDecoder => 0,
        };
        WaveletDecoder::new(dims, config.num_units_dense, num_layers, vb)
    }
}

/// Input and output geometry of a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderDims {
    pub timesteps: usize,
    pub frequencies: usize,
    pub channels: usize,
    /// Input steps pooled into one output step
    pub output_stride: usize,
}

impl DecoderDims {
    pub fn for_dataset(dataset: &WaveletDataset, output_stride: usize) -> Self {
        Self {
            timesteps: dataset.timesteps(),
            frequencies: dataset.num_frequencies(),
            channels: dataset.num_channels(),
            output_stride,
        }
    }

    /// Wavelet features per time step
    pub fn features(&self) -> usize {
        self.frequencies * self.channels
    }

    pub fn output_steps(&self) -> usize {
        self.timesteps / self.output_stride
    }
}

/// Decoder from wavelet windows to position, head direction and speed
///
/// Each time step's wavelet features are RMS-normalized and encoded by a
/// stack of dense ELU layers; encodings are averaged over `output_stride`
/// steps and fed to one linear head per signal.
pub struct WaveletDecoder {
    dims: DecoderDims,
    encoder: Vec<DenseElu>,
    heads: [CastedLinear; 3],
    norm_eps: f64,
}

impl WaveletDecoder {
    pub fn new(
        dims: DecoderDims,
        hidden_size: usize,
        num_layers: usize,
        vb: VarBuilder,
    ) -> crate::Result<Self> {
        if dims.output_stride == 0 || dims.timesteps % dims.output_stride != 0 {
            return Err(crate::DecoderError::Model(format!(
                "timesteps {} not divisible by output stride {}",
                dims.timesteps, dims.output_stride
            )));
        }

        let mut encoder = Vec::with_capacity(num_layers);
        let mut width = dims.features();
        let encoder_vb = vb.pp("encoder");
        for i in 0..num_layers {
            let layer = DenseElu::new(width, hidden_size, encoder_vb.pp(format!("layer_{}", i)))?;
            width = layer.out_features();
            encoder.push(layer);
        }

        let head = |signal: Signal| {
            CastedLinear::new(width, signal.width(), true, vb.pp(format!("{}_head", signal)))
        };
        let heads = [
            head(Signal::Position)?,
            head(Signal::HeadDirection)?,
            head(Signal::Speed)?,
        ];

        Ok(Self {
            dims,
            encoder,
            heads,
            norm_eps: 1e-6,
        })
    }

    pub fn dims(&self) -> DecoderDims {
        self.dims
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `inputs` - Wavelet windows [batch, timesteps, frequencies, channels]
    ///
    /// # Returns
    /// Predictions with `timesteps / output_stride` steps per sample
    pub fn forward(&self, inputs: &Tensor) -> Result<SignalSet> {
        let (batch, timesteps, _, _) = inputs.dims4()?;
        let steps = timesteps / self.dims.output_stride;

        let mut hidden = inputs.reshape((batch, timesteps, self.dims.features()))?;
        hidden = rms_norm(&hidden, self.norm_eps)?;
        for layer in &self.encoder {
            hidden = layer.forward(&hidden)?;
        }

        let width = hidden.dim(D::Minus1)?;
        let pooled = hidden
            .reshape((batch, steps, self.dims.output_stride, width))?
            .mean(2)?;

        let [position_head, head_direction_head, speed_head] = &self.heads;
        let position = position_head.forward(&pooled)?;
        let head_direction = head_direction_head.forward(&pooled)?.squeeze(D::Minus1)?;
        let speed = speed_head.forward(&pooled)?.squeeze(D::Minus1)?;

        Ok(SignalSet::new(position, head_direction, speed))
    }
}

impl SignalDecoder for WaveletDecoder {
    fn decode(&self, inputs: &Tensor) -> Result<SignalSet> {
        Ok(self.forward(inputs)?.detach())
    }
}
