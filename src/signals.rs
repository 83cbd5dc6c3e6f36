/// Behavioural target signals decoded from the wavelet inputs
use candle_core::{IndexOp, Result, Tensor};
use serde::{Deserialize, Serialize};

/// One of the three decoded signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// 2D coordinate of the subject
    Position,
    /// Heading angle in degrees
    HeadDirection,
    /// Running speed
    Speed,
}

impl Signal {
    /// All signals in model output order
    pub const ALL: [Signal; 3] = [Signal::Position, Signal::HeadDirection, Signal::Speed];

    /// Name used in option files and dataset groups
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Position => "position",
            Signal::HeadDirection => "head_direction",
            Signal::Speed => "speed",
        }
    }

    /// Resolve a signal from its name
    pub fn from_name(name: &str) -> crate::Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name() == name)
            .ok_or_else(|| crate::DecoderError::unknown("signal", name))
    }

    /// Number of values per time step
    pub fn width(&self) -> usize {
        match self {
            Signal::Position => 2,
            Signal::HeadDirection | Signal::Speed => 1,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Labels or predictions for a batch, one tensor per signal
///
/// Shapes:
/// - `position`: [batch, steps, 2]
/// - `head_direction`: [batch, steps]
/// - `speed`: [batch, steps]
#[derive(Debug, Clone)]
pub struct SignalSet {
    pub position: Tensor,
    pub head_direction: Tensor,
    pub speed: Tensor,
}

impl SignalSet {
    pub fn new(position: Tensor, head_direction: Tensor, speed: Tensor) -> Self {
        Self {
            position,
            head_direction,
            speed,
        }
    }

    /// Tensor for a given signal
    pub fn get(&self, signal: Signal) -> &Tensor {
        match signal {
            Signal::Position => &self.position,
            Signal::HeadDirection => &self.head_direction,
            Signal::Speed => &self.speed,
        }
    }

    /// Number of samples in the batch
    pub fn batch_size(&self) -> Result<usize> {
        self.position.dim(0)
    }

    /// Number of output steps per sample
    pub fn steps(&self) -> Result<usize> {
        self.position.dim(1)
    }

    /// Drop any autograd history
    pub fn detach(&self) -> Self {
        Self {
            position: self.position.detach(),
            head_direction: self.head_direction.detach(),
            speed: self.speed.detach(),
        }
    }

    /// Pull one output step of every sample out to host memory
    pub fn step_values(&self, step: usize) -> Result<Vec<StepValues>> {
        let position = self
            .position
            .i((.., step, ..))?
            .to_dtype(candle_core::DType::F32)?
            .to_vec2::<f32>()?;
        let head_direction = self
            .head_direction
            .i((.., step))?
            .to_dtype(candle_core::DType::F32)?
            .to_vec1::<f32>()?;
        let speed = self
            .speed
            .i((.., step))?
            .to_dtype(candle_core::DType::F32)?
            .to_vec1::<f32>()?;

        Ok(position
            .into_iter()
            .zip(head_direction)
            .zip(speed)
            .map(|((p, hd), s)| StepValues {
                position: [p[0] as f64, p[1] as f64],
                head_direction: hd as f64,
                speed: s as f64,
            })
            .collect())
    }
}

/// Signal values of a single sample at a single output step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepValues {
    pub position: [f64; 2],
    /// Degrees
    pub head_direction: f64,
    pub speed: f64,
}
