/// Options for a decoder evaluation run
///
/// `Default` holds the reference evaluation settings:
/// 64-step windows, five cross-validation folds, batches of eight, no
/// shuffling, and step 3 plotted.
use std::path::{Path, PathBuf};

use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::loss::{LossFunctions, LossWeights};
use crate::viz::PlotConfig;

/// Compute device, resolved once and handed to every constructor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceConfig {
    /// Always run on the CPU
    Cpu,
    /// Use CUDA device 0 if available, otherwise the CPU
    #[default]
    Auto,
    /// A specific CUDA device ordinal
    Cuda(usize),
}

impl DeviceConfig {
    /// Create the candle device
    pub fn resolve(&self) -> crate::Result<Device> {
        let device = match self {
            DeviceConfig::Cpu => Device::Cpu,
            DeviceConfig::Auto => {
                if candle_core::utils::cuda_is_available() {
                    Device::new_cuda(0)?
                } else {
                    Device::Cpu
                }
            }
            DeviceConfig::Cuda(ordinal) => Device::new_cuda(*ordinal)?,
        };
        Ok(device)
    }
}

/// Architecture hyperparameters of the decoder network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Width of the shared dense encoder
    pub num_units_dense: usize,
    /// Number of dense encoder layers
    pub num_dense_layers: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_units_dense: 1024,
            num_dense_layers: 2,
        }
    }
}

/// Full set of evaluation options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Directory holding the preprocessed `.npy` arrays
    pub data_path: PathBuf,

    /// Safetensors snapshot of the trained decoder
    pub model_path: PathBuf,

    /// Input time steps per sample window
    pub model_timesteps: usize,

    /// Input time steps per label step
    pub output_stride: usize,

    /// Number of cross-validation folds
    pub num_cvs: usize,

    /// Samples per batch
    pub batch_size: usize,

    /// Shuffle sample order each epoch
    pub shuffle: bool,

    /// Draw each batch's samples at random from the index set
    pub random_batches: bool,

    /// Compute per-batch losses during evaluation
    pub track_losses: bool,

    pub device: DeviceConfig,

    pub model: ModelConfig,

    pub loss_functions: LossFunctions,

    pub loss_weights: LossWeights,

    pub plot: PlotConfig,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/preprocessed_final"),
            model_path: PathBuf::from("models/MJ_trained_0.safetensors"),
            model_timesteps: 64,
            output_stride: 8,
            num_cvs: 5,
            batch_size: 8,
            shuffle: false,
            random_batches: false,
            track_losses: false,
            device: DeviceConfig::default(),
            model: ModelConfig::default(),
            loss_functions: LossFunctions::default(),
            loss_weights: LossWeights::default(),
            plot: PlotConfig::default(),
        }
    }
}

impl DecoderOptions {
    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let options: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        options.validate()?;
        Ok(options)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.model_timesteps == 0 || self.output_stride == 0 {
            return Err(crate::DecoderError::Config(
                "model_timesteps and output_stride must be > 0".to_string(),
            ));
        }

        if self.model_timesteps % self.output_stride != 0 {
            return Err(crate::DecoderError::Config(format!(
                "model_timesteps ({}) must be divisible by output_stride ({})",
                self.model_timesteps, self.output_stride
            )));
        }

        if self.num_cvs < 2 {
            return Err(crate::DecoderError::Config(format!(
                "num_cvs must be >= 2 to leave a test fold, got {}",
                self.num_cvs
            )));
        }

        if self.batch_size == 0 {
            return Err(crate::DecoderError::Config(
                "batch_size must be > 0".to_string(),
            ));
        }

        if self.model.num_units_dense == 0 || self.model.num_dense_layers == 0 {
            return Err(crate::DecoderError::Config(
                "num_units_dense and num_dense_layers must be > 0".to_string(),
            ));
        }

        if self.plot.plot_step >= self.output_steps() {
            return Err(crate::DecoderError::Config(format!(
                "plot_step {} out of range for {} output steps",
                self.plot.plot_step,
                self.output_steps()
            )));
        }

        self.plot.validate()
    }

    /// Label steps per sample window
    pub fn output_steps(&self) -> usize {
        self.model_timesteps / self.output_stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::LossFunction;

    #[test]
    fn test_default_is_valid() {
        let options = DecoderOptions::default();
        options.validate().unwrap();
        assert_eq!(options.output_steps(), 8);
        assert_eq!(options.plot.plot_step, 3);
        assert!(!options.shuffle);
    }

    #[test]
    fn test_rejects_single_fold() {
        let options = DecoderOptions {
            num_cvs: 1,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(crate::DecoderError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_plot_step_past_window() {
        let mut options = DecoderOptions {
            model_timesteps: 16,
            output_stride: 8,
            ..Default::default()
        };
        options.plot.plot_step = 2;
        assert!(options.validate().is_err());

        options.plot.plot_step = 1;
        options.validate().unwrap();
    }

    #[test]
    fn test_rejects_uneven_stride() {
        let options = DecoderOptions {
            model_timesteps: 60,
            output_stride: 8,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "num_cvs": 4,
            "device": "cpu",
            "loss_functions": { "speed": "euclidean_loss" }
        }"#;

        let options: DecoderOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.num_cvs, 4);
        assert_eq!(options.device, DeviceConfig::Cpu);
        assert_eq!(options.batch_size, 8);
        assert_eq!(options.loss_functions.speed, LossFunction::Euclidean);
        assert_eq!(options.loss_functions.position, LossFunction::Euclidean);
    }

    #[test]
    fn test_unknown_loss_name_fails_at_load() {
        let json = r#"{ "loss_functions": { "speed": "huber" } }"#;
        assert!(serde_json::from_str::<DecoderOptions>(json).is_err());
    }

    #[test]
    fn test_rejects_unbounded_plot_values() {
        let json = r#"{ "plot": { "pause_ms": 1e300 } }"#;
        let options: DecoderOptions = serde_json::from_str(json).unwrap();
        assert!(matches!(
            options.validate(),
            Err(crate::DecoderError::Config(_))
        ));

        let mut options = DecoderOptions::default();
        options.plot.compass_limit = 0.0;
        assert!(options.validate().is_err());

        let mut options = DecoderOptions::default();
        options.plot.width = 0;
        assert!(options.validate().is_err());

        let mut options = DecoderOptions::default();
        options.plot.position_y_max = f64::NAN;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_cuda_device_json() {
        let device: DeviceConfig = serde_json::from_str(r#"{ "cuda": 1 }"#).unwrap();
        assert_eq!(device, DeviceConfig::Cuda(1));
        assert_eq!(DeviceConfig::default(), DeviceConfig::Auto);
        assert_eq!(DeviceConfig::Cpu.resolve().unwrap().is_cpu(), true);
    }
}
