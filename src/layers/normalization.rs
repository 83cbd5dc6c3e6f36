/// RMS normalization of per-timestep wavelet features
use candle_core::{DType, Result, Tensor};

/// RMS Normalization function
///
/// Scales the last dimension to unit root mean square. The computation is
/// done in f32, then cast back to the original dtype.
pub fn rms_norm(hidden_states: &Tensor, variance_epsilon: f64) -> Result<Tensor> {
    let input_dtype = hidden_states.dtype();

    let hidden_states = if input_dtype != DType::F32 {
        hidden_states.to_dtype(DType::F32)?
    } else {
        hidden_states.clone()
    };

    let variance = hidden_states.sqr()?.mean_keepdim(candle_core::D::Minus1)?;
    let normalized = hidden_states.broadcast_div(&(variance + variance_epsilon)?.sqrt()?)?;

    if input_dtype != DType::F32 {
        normalized.to_dtype(input_dtype)
    } else {
        Ok(normalized)
    }
}
