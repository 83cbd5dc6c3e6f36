//! Wavelet decoder evaluation
//!
//! Loads a pretrained decoder that maps wavelet-transformed neural recordings
//! to behavioural signals (position, head direction, speed) and replays it
//! over a held-out cross-validation fold, plotting predictions against the
//! recorded ground truth sample by sample.
//!
//! # Pipeline
//!
//! - **Data**: [`data::WaveletSource`] holds the arrays, [`data::WaveletDataLoader`]
//!   windows them into batches
//! - **Split**: [`split::CrossValidation`] builds contiguous folds
//! - **Model**: [`models::load_model`] restores a [`models::WaveletDecoder`]
//!   from safetensors
//! - **Evaluation**: [`eval::Evaluator`] drives inference and feeds frames to
//!   the plot window and to [`viz::LivePlot`] image files
//!
//! # Example
//!
//! ```ignore
//! use wavelet_decoder::{DecoderOptions, eval::run};
//!
//! let options = DecoderOptions::default();
//! let report = run(&options)?;
//! println!("{} frames", report.frames);
//! ```

pub mod config;
pub mod data;
pub mod eval;
pub mod layers;
pub mod loss;
pub mod models;
pub mod signals;
pub mod split;
pub mod viz;

// Re-export commonly used items
pub use config::{DecoderOptions, DeviceConfig};
pub use models::WaveletDecoder;
pub use signals::{Signal, SignalSet};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Unknown {kind} name: '{name}'")]
    UnknownName { kind: &'static str, name: String },

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("NumPy read error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecoderError {
    pub(crate) fn unknown(kind: &'static str, name: &str) -> Self {
        Self::UnknownName {
            kind,
            name: name.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DecoderError>;
