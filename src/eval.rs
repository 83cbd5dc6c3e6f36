/// Evaluation loop: decode held-out batches and plot one step per sample
use std::sync::Arc;

use crate::config::DecoderOptions;
use crate::data::{create_train_and_test_datasets, BatchDataLoader, WaveletDataLoader, WaveletSource};
use crate::loss::{LossSummary, LossTracker};
use crate::models::{load_for_dataset, SignalDecoder};
use crate::split::CrossValidation;
use crate::viz::{Frame, FrameSink, LivePlot, PlotConfig};

/// Outcome of an evaluation pass
#[derive(Debug, Clone, Copy)]
pub struct EvaluationReport {
    /// Frames shown, one per test sample
    pub frames: usize,
    pub batches: usize,
    /// Mean loss per signal; NaN when losses were not tracked
    pub losses: LossSummary,
}

/// Runs a decoder over a loader and feeds every sample to a frame sink
pub struct Evaluator<'a, D: SignalDecoder> {
    decoder: &'a D,
    options: &'a DecoderOptions,
}

impl<'a, D: SignalDecoder> Evaluator<'a, D> {
    pub fn new(decoder: &'a D, options: &'a DecoderOptions) -> Self {
        Self { decoder, options }
    }

    /// Evaluate every batch the loader yields
    pub fn run<L, S>(&self, loader: &mut L, sink: &mut S) -> crate::Result<EvaluationReport>
    where
        L: BatchDataLoader,
        S: FrameSink,
    {
        let step = self.options.plot.plot_step;
        let mut tracker = LossTracker::new();
        let mut frame_index = 1;
        let mut batches = 0;

        log::info!(
            "Evaluating {} batches, plotting output step {}",
            loader.num_batches(),
            step
        );

        loader.reset();
        while let Some(batch) = loader.next_batch()? {
            let predictions = self.decoder.decode(&batch.inputs)?;

            let truth = batch.labels.step_values(step)?;
            let predicted = predictions.step_values(step)?;

            for (truth, prediction) in truth.into_iter().zip(predicted) {
                sink.show(&Frame {
                    index: frame_index,
                    truth,
                    prediction,
                })?;
                log::info!("Frame {}", frame_index);
                frame_index += 1;
            }

            if self.options.track_losses {
                tracker.record_batch(&self.options.loss_functions, &batch.labels, &predictions)?;
            }
            batches += 1;
        }

        if tracker.is_empty() {
            log::warn!("No losses recorded; reported loss means are undefined");
        }

        let losses = tracker.summary(&self.options.loss_weights);
        log::info!("Position loss: {}", losses.position);
        log::info!("HD loss: {}", losses.head_direction);
        log::info!("Speed loss: {}", losses.speed);

        Ok(EvaluationReport {
            frames: frame_index - 1,
            batches,
            losses,
        })
    }
}

/// Full evaluation: load data and model, hold out the last fold, plot it
pub fn run(options: &DecoderOptions) -> crate::Result<EvaluationReport> {
    options.validate()?;

    let device = options.device.resolve()?;
    log::info!("Using device: {:?}", device);

    let source = Arc::new(WaveletSource::from_directory(&options.data_path)?);

    let cv = CrossValidation::for_recording(
        source.num_rows(),
        options.model_timesteps,
        options.num_cvs,
    );
    let split = cv.last_fold_split()?;

    let (_train, test) = create_train_and_test_datasets(options, source, &split)?;

    let decoder = load_for_dataset(options, &test, &device)?;

    let mut loader = WaveletDataLoader::from_options(test, options, device);
    let files = LivePlot::new(options.plot.clone())?;
    let evaluator = Evaluator::new(&decoder, options);

    let report = if options.plot.window {
        run_windowed(&evaluator, &mut loader, files, &options.plot)?
    } else {
        let mut files = files;
        evaluator.run(&mut loader, &mut files)?
    };

    log::info!("Evaluation complete: {} frames", report.frames);
    Ok(report)
}

/// Show frames in a window; image files are still written when configured
#[cfg(feature = "window")]
fn run_windowed<D: SignalDecoder, L: BatchDataLoader>(
    evaluator: &Evaluator<'_, D>,
    loader: &mut L,
    files: LivePlot,
    plot: &PlotConfig,
) -> crate::Result<EvaluationReport> {
    let window = crate::viz::WindowPlot::new(plot.clone())?;
    let mut sinks = (window, files.unpaced());
    evaluator.run(loader, &mut sinks)
}

#[cfg(not(feature = "window"))]
fn run_windowed<D: SignalDecoder, L: BatchDataLoader>(
    _evaluator: &Evaluator<'_, D>,
    _loader: &mut L,
    _files: LivePlot,
    _plot: &PlotConfig,
) -> crate::Result<EvaluationReport> {
    Err(crate::DecoderError::Config(
        "built without the `window` feature; set plot.window to false".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DatasetMetadata, WaveletDataset};
    use crate::signals::SignalSet;
    use candle_core::{DType, Result, Tensor};
    use ndarray::{Array1, Array2, Array3};

    /// Predicts the same constants the fixture recording holds
    struct ConstantDecoder {
        steps: usize,
        position: [f32; 2],
        head_direction: f32,
        speed: f32,
    }

    impl SignalDecoder for ConstantDecoder {
        fn decode(&self, inputs: &Tensor) -> Result<SignalSet> {
            let batch = inputs.dim(0)?;
            let device = inputs.device();
            let position = Tensor::new(&self.position, device)?
                .reshape((1, 1, 2))?
                .broadcast_as((batch, self.steps, 2))?
                .contiguous()?;
            let head_direction =
                (Tensor::ones((batch, self.steps), DType::F32, device)? * self.head_direction as f64)?;
            let speed = (Tensor::ones((batch, self.steps), DType::F32, device)? * self.speed as f64)?;
            Ok(SignalSet::new(position, head_direction, speed))
        }
    }

    #[derive(Default)]
    struct FrameLog(Vec<Frame>);

    impl FrameSink for FrameLog {
        fn show(&mut self, frame: &Frame) -> crate::Result<()> {
            self.0.push(*frame);
            Ok(())
        }
    }

    fn constant_loader(rows: usize, indices: Vec<usize>, batch_size: usize) -> WaveletDataLoader {
        let source = WaveletSource::new(
            Array3::ones((rows, 2, 2)),
            Array2::from_shape_fn((rows, 2), |(_, k)| if k == 0 { 100.0 } else { 200.0 }),
            Array1::from_elem(rows, 30.0),
            Array1::from_elem(rows, 0.1),
            DatasetMetadata::default(),
        )
        .unwrap();
        let dataset = WaveletDataset::new(Arc::new(source), indices, 8, 2).unwrap();
        WaveletDataLoader::new(dataset, batch_size, false, false, candle_core::Device::Cpu)
    }

    /// Emits values that depend only on the output step
    struct StepDecoder {
        steps: usize,
    }

    impl SignalDecoder for StepDecoder {
        fn decode(&self, inputs: &Tensor) -> Result<SignalSet> {
            let batch = inputs.dim(0)?;
            let steps = Tensor::arange(0f32, self.steps as f32, inputs.device())?
                .reshape((1, self.steps))?
                .broadcast_as((batch, self.steps))?
                .contiguous()?;

            let position = Tensor::stack(&[(&steps + 500.0)?, (&steps + 600.0)?], 2)?;
            let head_direction = (&steps + 1000.0)?;
            let speed = (&steps * 0.5)?;
            Ok(SignalSet::new(position, head_direction, speed))
        }
    }

    /// Labels ramp with the row number: position [2r, 2r+1], heading r, speed r/4
    fn ramp_loader(rows: usize, indices: Vec<usize>, batch_size: usize) -> WaveletDataLoader {
        let source = WaveletSource::new(
            Array3::zeros((rows, 2, 2)),
            Array2::from_shape_fn((rows, 2), |(r, k)| (r * 2 + k) as f32),
            Array1::from_shape_fn(rows, |r| r as f32),
            Array1::from_shape_fn(rows, |r| r as f32 * 0.25),
            DatasetMetadata::default(),
        )
        .unwrap();
        let dataset = WaveletDataset::new(Arc::new(source), indices, 8, 2).unwrap();
        WaveletDataLoader::new(dataset, batch_size, false, false, candle_core::Device::Cpu)
    }

    fn decoder() -> ConstantDecoder {
        ConstantDecoder {
            steps: 4,
            position: [100.0, 200.0],
            head_direction: 30.0,
            speed: 0.1,
        }
    }

    fn options(track_losses: bool) -> DecoderOptions {
        let mut options = DecoderOptions {
            model_timesteps: 8,
            output_stride: 2,
            track_losses,
            ..Default::default()
        };
        options.plot.plot_step = 3;
        options
    }

    #[test]
    fn test_one_frame_per_sample() -> crate::Result<()> {
        let mut loader = constant_loader(30, (12..19).collect(), 3);
        let mut frames = FrameLog::default();
        let decoder = decoder();
        let options = options(true);

        let report = Evaluator::new(&decoder, &options).run(&mut loader, &mut frames)?;

        assert_eq!(report.frames, 7);
        assert_eq!(report.batches, 3);
        let indices: Vec<usize> = frames.0.iter().map(|f| f.index).collect();
        assert_eq!(indices, (1..=7).collect::<Vec<_>>());

        let frame = frames.0[0];
        assert_eq!(frame.truth.position, [100.0, 200.0]);
        assert!((frame.truth.head_direction - 30.0).abs() < 1e-6);

        assert!(report.losses.position.abs() < 1e-6);
        assert!(report.losses.head_direction.abs() < 1e-6);
        assert!(report.losses.speed.abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn test_frames_hold_the_plotted_step() -> crate::Result<()> {
        for plot_step in [3, 1] {
            let mut loader = ramp_loader(30, (12..17).collect(), 2);
            let mut frames = FrameLog::default();
            let decoder = StepDecoder { steps: 4 };
            let mut options = options(false);
            options.plot.plot_step = plot_step;

            Evaluator::new(&decoder, &options).run(&mut loader, &mut frames)?;
            assert_eq!(frames.0.len(), 5);

            let step = plot_step as f64;
            for (k, frame) in frames.0.iter().enumerate() {
                // Label step j of the window starting at row i is row i + j * stride
                let row = (12 + k + plot_step * 2) as f64;
                assert_eq!(frame.truth.position, [2.0 * row, 2.0 * row + 1.0]);
                assert_eq!(frame.truth.head_direction, row);
                assert_eq!(frame.truth.speed, row * 0.25);

                assert_eq!(frame.prediction.position, [500.0 + step, 600.0 + step]);
                assert_eq!(frame.prediction.head_direction, 1000.0 + step);
                assert_eq!(frame.prediction.speed, step * 0.5);
            }
        }

        Ok(())
    }

    #[test]
    fn test_untracked_losses_are_nan() -> crate::Result<()> {
        let mut loader = constant_loader(30, vec![0, 1], 8);
        let mut frames = FrameLog::default();
        let decoder = decoder();
        let options = options(false);

        let report = Evaluator::new(&decoder, &options).run(&mut loader, &mut frames)?;

        assert_eq!(report.frames, 2);
        assert!(!report.losses.position.is_finite());
        assert!(!report.losses.head_direction.is_finite());
        assert!(!report.losses.speed.is_finite());

        Ok(())
    }

    #[test]
    fn test_empty_test_set() -> crate::Result<()> {
        let mut loader = constant_loader(30, Vec::new(), 8);
        let mut frames = FrameLog::default();
        let decoder = decoder();
        let options = options(true);

        let report = Evaluator::new(&decoder, &options).run(&mut loader, &mut frames)?;
        assert_eq!(report.frames, 0);
        assert_eq!(report.batches, 0);
        assert!(frames.0.is_empty());

        Ok(())
    }

    #[test]
    fn test_run_rejects_invalid_options() {
        let options = DecoderOptions {
            num_cvs: 0,
            ..Default::default()
        };
        assert!(matches!(run(&options), Err(crate::DecoderError::Config(_))));
    }
}
