/// Dense layers of the decoder network
use candle_core::{Result, Tensor};
use candle_nn::{Init, VarBuilder};

/// Linear layer with automatic dtype casting
///
/// Casts weights and bias to the input dtype before computation, so an f32
/// snapshot can be applied to f64 inputs and vice versa.
pub struct CastedLinear {
    weight: Tensor,
    bias: Option<Tensor>,
}

impl CastedLinear {
    /// Create new CastedLinear layer
    ///
    /// # Arguments
    /// * `in_features` - Input dimension
    /// * `out_features` - Output dimension
    /// * `bias` - Whether to include bias
    /// * `vb` - VarBuilder for parameter lookup
    pub fn new(
        in_features: usize,
        out_features: usize,
        bias: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let init_ws = candle_nn::init::DEFAULT_KAIMING_NORMAL;
        let weight = vb.get_with_hints((out_features, in_features), "weight", init_ws)?;

        let bias = if bias {
            let bound = 1. / (in_features as f64).sqrt();
            let init_bs = Init::Uniform {
                lo: -bound,
                up: bound,
            };
            Some(vb.get_with_hints(out_features, "bias", init_bs)?)
        } else {
            None
        };

        Ok(Self { weight, bias })
    }

    pub fn out_features(&self) -> usize {
        self.weight.dims()[0]
    }

    /// Forward pass: input @ weight^T + bias
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let input_dtype = input.dtype();

        let weight = if self.weight.dtype() != input_dtype {
            self.weight.to_dtype(input_dtype)?
        } else {
            self.weight.clone()
        };

        let output = input.broadcast_matmul(&weight.t()?)?;

        if let Some(ref b) = self.bias {
            let bias = if b.dtype() != input_dtype {
                b.to_dtype(input_dtype)?
            } else {
                b.clone()
            };
            output.broadcast_add(&bias)
        } else {
            Ok(output)
        }
    }
}

/// Linear projection followed by ELU
pub struct DenseElu {
    linear: CastedLinear,
    alpha: f64,
}

impl DenseElu {
    pub fn new(in_features: usize, out_features: usize, vb: VarBuilder) -> Result<Self> {
        let linear = CastedLinear::new(in_features, out_features, true, vb)?;
        Ok(Self { linear, alpha: 1.0 })
    }

    pub fn out_features(&self) -> usize {
        self.linear.out_features()
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.linear.forward(x)?.elu(self.alpha)
    }
}
