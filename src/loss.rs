/// Per-signal loss functions and aggregation
///
/// Loss functions are a closed set selected by name when options are loaded,
/// so an unknown name fails before any data is touched.
use candle_core::{DType, Result, Tensor, D};
use serde::{Deserialize, Serialize};

use crate::signals::{Signal, SignalSet};

/// Available loss functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossFunction {
    /// Mean Euclidean distance over the last axis
    #[serde(rename = "euclidean_loss")]
    Euclidean,
    /// Mean absolute angular error, wrapped to [-pi, pi]
    #[serde(rename = "cyclical_mae_rad")]
    CyclicalMaeRad,
    /// Mean absolute error
    #[serde(rename = "mae")]
    Mae,
}

impl LossFunction {
    pub fn name(&self) -> &'static str {
        match self {
            LossFunction::Euclidean => "euclidean_loss",
            LossFunction::CyclicalMaeRad => "cyclical_mae_rad",
            LossFunction::Mae => "mae",
        }
    }

    /// Resolve a loss function from its name
    pub fn from_name(name: &str) -> crate::Result<Self> {
        match name {
            "euclidean_loss" => Ok(LossFunction::Euclidean),
            "cyclical_mae_rad" => Ok(LossFunction::CyclicalMaeRad),
            "mae" => Ok(LossFunction::Mae),
            other => Err(crate::DecoderError::unknown("loss function", other)),
        }
    }

    /// Compute the mean loss between labels and predictions
    ///
    /// Angles for `CyclicalMaeRad` are given in degrees and compared in radians.
    pub fn compute(&self, y_true: &Tensor, y_pred: &Tensor) -> Result<f64> {
        let y_true = y_true.to_dtype(DType::F32)?;
        let y_pred = y_pred.to_dtype(DType::F32)?;
        let diff = (y_true - y_pred)?;

        let loss = match self {
            LossFunction::Euclidean => {
                // Scalar-per-step signals are treated as 1-D points
                let diff = if diff.rank() < 3 {
                    diff.unsqueeze(D::Minus1)?
                } else {
                    diff
                };
                diff.sqr()?.sum(D::Minus1)?.sqrt()?.mean_all()?
            }
            LossFunction::Mae => diff.abs()?.mean_all()?,
            LossFunction::CyclicalMaeRad => {
                let values = diff.flatten_all()?.to_vec1::<f32>()?;
                let total: f64 = values
                    .iter()
                    .map(|&d| {
                        let rad = (d as f64).to_radians();
                        rad.sin().atan2(rad.cos()).abs()
                    })
                    .sum();
                return Ok(total / values.len() as f64);
            }
        };

        loss.to_dtype(DType::F64)?.to_scalar::<f64>()
    }
}

/// Loss function per signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossFunctions {
    pub position: LossFunction,
    pub head_direction: LossFunction,
    pub speed: LossFunction,
}

impl Default for LossFunctions {
    fn default() -> Self {
        Self {
            position: LossFunction::Euclidean,
            head_direction: LossFunction::CyclicalMaeRad,
            speed: LossFunction::Mae,
        }
    }
}

impl LossFunctions {
    pub fn get(&self, signal: Signal) -> LossFunction {
        match signal {
            Signal::Position => self.position,
            Signal::HeadDirection => self.head_direction,
            Signal::Speed => self.speed,
        }
    }
}

/// Weight of each signal in the combined loss
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossWeights {
    pub position: f64,
    pub head_direction: f64,
    pub speed: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            position: 1.0,
            head_direction: 25.0,
            speed: 2.0,
        }
    }
}

impl LossWeights {
    pub fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Position => self.position,
            Signal::HeadDirection => self.head_direction,
            Signal::Speed => self.speed,
        }
    }
}

/// Arithmetic mean; NaN for an empty slice
pub fn aggregate_mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Collects per-batch losses for each signal
#[derive(Debug, Default, Clone)]
pub struct LossTracker {
    position: Vec<f64>,
    head_direction: Vec<f64>,
    speed: Vec<f64>,
}

impl LossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn values_mut(&mut self, signal: Signal) -> &mut Vec<f64> {
        match signal {
            Signal::Position => &mut self.position,
            Signal::HeadDirection => &mut self.head_direction,
            Signal::Speed => &mut self.speed,
        }
    }

    /// Recorded losses for a signal
    pub fn values(&self, signal: Signal) -> &[f64] {
        match signal {
            Signal::Position => &self.position,
            Signal::HeadDirection => &self.head_direction,
            Signal::Speed => &self.speed,
        }
    }

    pub fn record(&mut self, signal: Signal, loss: f64) {
        self.values_mut(signal).push(loss);
    }

    /// Compute and record the loss of every signal for one batch
    pub fn record_batch(
        &mut self,
        functions: &LossFunctions,
        labels: &SignalSet,
        predictions: &SignalSet,
    ) -> Result<()> {
        for signal in Signal::ALL {
            let loss = functions
                .get(signal)
                .compute(labels.get(signal), predictions.get(signal))?;
            self.record(signal, loss);
        }
        Ok(())
    }

    /// Number of batches recorded
    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Reduce the recorded losses to means
    pub fn summary(&self, weights: &LossWeights) -> LossSummary {
        let position = aggregate_mean(&self.position);
        let head_direction = aggregate_mean(&self.head_direction);
        let speed = aggregate_mean(&self.speed);
        let weighted = weights.position * position
            + weights.head_direction * head_direction
            + weights.speed * speed;

        LossSummary {
            position,
            head_direction,
            speed,
            weighted,
        }
    }
}

/// Mean loss per signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossSummary {
    pub position: f64,
    pub head_direction: f64,
    pub speed: f64,
    pub weighted: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_euclidean_loss() -> Result<()> {
        let device = Device::Cpu;
        let y_true = Tensor::new(&[[[3f32, 4.0], [0.0, 0.0]]], &device)?;
        let y_pred = Tensor::zeros((1, 2, 2), DType::F32, &device)?;

        let loss = LossFunction::Euclidean.compute(&y_true, &y_pred)?;
        // distances 5 and 0
        assert!((loss - 2.5).abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn test_euclidean_loss_on_scalar_steps() -> Result<()> {
        let device = Device::Cpu;
        let y_true = Tensor::new(&[[1f32, -2.0]], &device)?;
        let y_pred = Tensor::zeros((1, 2), DType::F32, &device)?;

        let loss = LossFunction::Euclidean.compute(&y_true, &y_pred)?;
        assert!((loss - 1.5).abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn test_mae() -> Result<()> {
        let device = Device::Cpu;
        let y_true = Tensor::new(&[[1f32, 2.0, 3.0]], &device)?;
        let y_pred = Tensor::new(&[[1.5f32, 2.5, 2.5]], &device)?;

        let loss = LossFunction::Mae.compute(&y_true, &y_pred)?;
        assert!((loss - 0.5).abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn test_cyclical_mae_wraps() -> Result<()> {
        let device = Device::Cpu;
        let y_true = Tensor::new(&[[350f32]], &device)?;
        let y_pred = Tensor::new(&[[10f32]], &device)?;

        let loss = LossFunction::CyclicalMaeRad.compute(&y_true, &y_pred)?;
        assert!((loss - 20f64.to_radians()).abs() < 1e-5, "got {}", loss);

        Ok(())
    }

    #[test]
    fn test_loss_names() {
        for f in [
            LossFunction::Euclidean,
            LossFunction::CyclicalMaeRad,
            LossFunction::Mae,
        ] {
            assert_eq!(LossFunction::from_name(f.name()).unwrap(), f);
        }
        assert!(LossFunction::from_name("mse").is_err());
    }

    #[test]
    fn test_empty_mean_is_not_finite() {
        assert!(!aggregate_mean(&[]).is_finite());
        assert_eq!(aggregate_mean(&[1.0, 3.0]), 2.0);

        let summary = LossTracker::new().summary(&LossWeights::default());
        assert!(summary.position.is_nan());
        assert!(summary.head_direction.is_nan());
        assert!(summary.speed.is_nan());
        assert!(summary.weighted.is_nan());
    }

    #[test]
    fn test_record_batch() -> Result<()> {
        let device = Device::Cpu;
        let labels = SignalSet::new(
            Tensor::new(&[[[3f32, 4.0]]], &device)?,
            Tensor::new(&[[90f32]], &device)?,
            Tensor::new(&[[1f32]], &device)?,
        );
        let predictions = SignalSet::new(
            Tensor::zeros((1, 1, 2), DType::F32, &device)?,
            Tensor::new(&[[90f32]], &device)?,
            Tensor::new(&[[0.5f32]], &device)?,
        );

        let mut tracker = LossTracker::new();
        tracker.record_batch(&LossFunctions::default(), &labels, &predictions)?;
        assert_eq!(tracker.len(), 1);

        let summary = tracker.summary(&LossWeights::default());
        assert!((summary.position - 5.0).abs() < 1e-6);
        assert!(summary.head_direction.abs() < 1e-6);
        assert!((summary.speed - 0.5).abs() < 1e-6);
        assert!((summary.weighted - 6.0).abs() < 1e-5);

        Ok(())
    }
}
