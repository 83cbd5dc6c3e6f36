/// Weight loading from safetensors files
use std::path::Path;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;

use super::{DecoderDims, ModelFunction, WaveletDecoder};
use crate::config::DecoderOptions;
use crate::data::WaveletDataset;

/// Load a decoder from a safetensors file
///
/// Parameter names and shapes must match the architecture; a mismatch
/// surfaces as a candle error.
///
/// # Arguments
/// * `function` - Architecture to instantiate
/// * `options` - Run options (architecture hyperparameters)
/// * `dims` - Input/output geometry
/// * `weights_path` - Path to safetensors file
/// * `device` - Device to load model on
pub fn load_model<P: AsRef<Path>>(
    function: ModelFunction,
    options: &DecoderOptions,
    dims: DecoderDims,
    weights_path: P,
    device: &Device,
) -> crate::Result<WaveletDecoder> {
    let weights_path = weights_path.as_ref();
    if !weights_path.exists() {
        return Err(crate::DecoderError::Model(format!(
            "checkpoint not found: {}",
            weights_path.display()
        )));
    }

    log::info!(
        "Loading {} weights from {}",
        function.name(),
        weights_path.display()
    );

    // Weights are memory-mapped read-only; they carry no gradient state
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };

    function.build(&options.model, dims, vb)
}

/// Load the decoder declared by a dataset's `model_function`
pub fn load_for_dataset(
    options: &DecoderOptions,
    dataset: &WaveletDataset,
    device: &Device,
) -> crate::Result<WaveletDecoder> {
    let function = ModelFunction::from_name(dataset.model_function())?;
    let dims = DecoderDims::for_dataset(dataset, options.output_stride);
    load_model(function, options, dims, &options.model_path, device)
}
