/// Neural network layer primitives
///
/// - Dense projections with dtype casting and ELU activation
/// - RMS normalization of wavelet features
pub mod activations;
pub mod normalization;

pub use activations::{CastedLinear, DenseElu};
pub use normalization::rms_norm;
