//! Two-panel live plot of decoded vs recorded behaviour
//!
//! The left panel scatters the true (green) and predicted (red) position in
//! arena coordinates. The right panel is a compass: one arrow per source
//! whose direction is the head direction and whose length is the speed.
//!
//! Frames are drawn with plotters onto any backend. [`WindowPlot`] shows them
//! in a desktop window; [`LivePlot`] writes them to image files.

use std::path::PathBuf;
use std::time::Duration;

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::signals::StepValues;

const PANEL_BACKGROUND: RGBColor = RGBColor(0xE6, 0xE6, 0xE6);
const COMPASS_GRID: RGBColor = RGBColor(0x31, 0x69, 0x31);
const RING_SEGMENTS: usize = 72;

/// Longest accepted per-frame pause
const MAX_PAUSE_MS: f64 = 60_000.0;
/// Largest accepted image side, in pixels
const MAX_SIDE: u32 = 8192;

#[cfg(feature = "window")]
mod window;

#[cfg(feature = "window")]
pub use window::{pack_rgb, WindowPlot};

/// Plot layout and output options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Output step of each window that is plotted
    pub plot_step: usize,
    /// Delay after each frame, in milliseconds
    pub pause_ms: f64,
    /// Show frames in a desktop window
    pub window: bool,
    pub window_title: String,
    /// Image rewritten on every frame
    pub live_frame: Option<PathBuf>,
    /// Directory receiving `<frame>.png` for every frame
    pub export_dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    /// Arena extent on the position panel
    pub position_x_max: f64,
    pub position_y_max: f64,
    /// Radial limit of the compass panel
    pub compass_limit: f64,
    /// Spacing of compass rings
    pub compass_ring: f64,
    /// Draw captions and axis labels (needs system fonts)
    pub show_labels: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            plot_step: 3,
            pause_ms: 0.1,
            window: true,
            window_title: "Wavelet decoder".to_string(),
            live_frame: None,
            export_dir: None,
            width: 1000,
            height: 400,
            position_x_max: 750.0,
            position_y_max: 600.0,
            compass_limit: 0.2,
            compass_ring: 0.05,
            show_labels: true,
        }
    }
}

impl PlotConfig {
    pub fn pause(&self) -> Duration {
        Duration::try_from_secs_f64(self.pause_ms / 1000.0).unwrap_or(Duration::ZERO)
    }

    /// Check layout and timing values
    pub fn validate(&self) -> crate::Result<()> {
        if !self.pause_ms.is_finite() || !(0.0..=MAX_PAUSE_MS).contains(&self.pause_ms) {
            return Err(crate::DecoderError::Config(format!(
                "pause_ms must be within [0, {}], got {}",
                MAX_PAUSE_MS, self.pause_ms
            )));
        }

        if self.width == 0 || self.height == 0 || self.width > MAX_SIDE || self.height > MAX_SIDE {
            return Err(crate::DecoderError::Config(format!(
                "plot size {}x{} must be within 1..={} on each side",
                self.width, self.height, MAX_SIDE
            )));
        }

        let extents = [
            ("position_x_max", self.position_x_max),
            ("position_y_max", self.position_y_max),
            ("compass_limit", self.compass_limit),
        ];
        for (name, value) in extents {
            if !value.is_finite() || value <= 0.0 {
                return Err(crate::DecoderError::Config(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )));
            }
        }

        if !self.compass_ring.is_finite() || self.compass_ring < 0.0 {
            return Err(crate::DecoderError::Config(format!(
                "compass_ring must be finite and >= 0, got {}",
                self.compass_ring
            )));
        }

        Ok(())
    }

    /// Radii of the compass rings inside the limit
    pub fn ring_radii(&self) -> Vec<f64> {
        if self.compass_ring <= 0.0 {
            return Vec::new();
        }
        (1..)
            .map(|k| k as f64 * self.compass_ring)
            .take_while(|r| *r < self.compass_limit - 1e-12)
            .collect()
    }
}

/// Cartesian arrow for a heading in degrees and a speed
pub fn compass_vector(speed: f64, angle_degrees: f64) -> (f64, f64) {
    let angle = angle_degrees * std::f64::consts::PI / 180.0;
    (speed * angle.cos(), speed * angle.sin())
}

/// One sample at the plotted step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Running frame counter, starting at 1
    pub index: usize,
    pub truth: StepValues,
    pub prediction: StepValues,
}

impl Frame {
    pub fn truth_arrow(&self) -> (f64, f64) {
        compass_vector(self.truth.speed, self.truth.head_direction)
    }

    pub fn prediction_arrow(&self) -> (f64, f64) {
        compass_vector(self.prediction.speed, self.prediction.head_direction)
    }
}

/// Receives every frame of an evaluation
pub trait FrameSink {
    fn show(&mut self, frame: &Frame) -> crate::Result<()>;
}

impl<A: FrameSink, B: FrameSink> FrameSink for (A, B) {
    fn show(&mut self, frame: &Frame) -> crate::Result<()> {
        self.0.show(frame)?;
        self.1.show(frame)
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> crate::DecoderError {
    crate::DecoderError::Plot(e.to_string())
}

/// Arrow from the origin with a small two-stroke head
fn arrow_paths(tip: (f64, f64), head_len: f64) -> Vec<Vec<(f64, f64)>> {
    let mut paths = vec![vec![(0.0, 0.0), tip]];

    let length = (tip.0 * tip.0 + tip.1 * tip.1).sqrt();
    if length > 0.0 {
        let heading = tip.1.atan2(tip.0);
        let head_len = head_len.min(length * 0.5);
        for side in [-1.0, 1.0] {
            let theta = heading + std::f64::consts::PI + side * 25f64.to_radians();
            paths.push(vec![
                tip,
                (tip.0 + head_len * theta.cos(), tip.1 + head_len * theta.sin()),
            ]);
        }
    }

    paths
}

fn draw_position_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    frame: &Frame,
    config: &PlotConfig,
) -> crate::Result<()> {
    area.fill(&PANEL_BACKGROUND).map_err(plot_err)?;

    let mut builder = ChartBuilder::on(area);
    builder.margin(10);
    if config.show_labels {
        builder
            .caption("Position", ("sans-serif", 18))
            .x_label_area_size(30)
            .y_label_area_size(40);
    }
    let mut chart = builder
        .build_cartesian_2d(0f64..config.position_x_max, 0f64..config.position_y_max)
        .map_err(plot_err)?;

    if config.show_labels {
        chart.configure_mesh().draw().map_err(plot_err)?;
    }

    let points = [
        (frame.truth.position, GREEN),
        (frame.prediction.position, RED),
    ];
    chart
        .draw_series(
            points
                .iter()
                .map(|([x, y], color)| Circle::new((*x, *y), 5, color.filled())),
        )
        .map_err(plot_err)?;

    Ok(())
}

fn draw_compass_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    frame: &Frame,
    config: &PlotConfig,
) -> crate::Result<()> {
    area.fill(&PANEL_BACKGROUND).map_err(plot_err)?;

    let limit = config.compass_limit;
    let mut builder = ChartBuilder::on(area);
    builder.margin(10);
    if config.show_labels {
        builder.caption("Heading / speed", ("sans-serif", 18));
    }
    let mut chart = builder
        .build_cartesian_2d(-limit..limit, -limit..limit)
        .map_err(plot_err)?;

    let ring = |r: f64| {
        (0..=RING_SEGMENTS)
            .map(|k| {
                let theta = 2.0 * std::f64::consts::PI * k as f64 / RING_SEGMENTS as f64;
                (r * theta.cos(), r * theta.sin())
            })
            .collect::<Vec<_>>()
    };

    let mut grid: Vec<Vec<(f64, f64)>> =
        config.ring_radii().into_iter().map(|r| ring(r)).collect();
    grid.push(ring(limit));
    for spoke in 0..8 {
        grid.push(vec![(0.0, 0.0), compass_vector(limit, spoke as f64 * 45.0)]);
    }
    chart
        .draw_series(
            grid.into_iter()
                .map(|path| PathElement::new(path, COMPASS_GRID.stroke_width(1))),
        )
        .map_err(plot_err)?;

    let head_len = limit * 0.08;
    for (tip, color) in [
        (frame.truth_arrow(), GREEN),
        (frame.prediction_arrow(), RED),
    ] {
        chart
            .draw_series(
                arrow_paths(tip, head_len)
                    .into_iter()
                    .map(|path| PathElement::new(path, color.mix(0.5).stroke_width(2))),
            )
            .map_err(plot_err)?;
    }

    Ok(())
}

/// Draw both panels of a frame onto a drawing area
pub fn draw_frame<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    frame: &Frame,
    config: &PlotConfig,
) -> crate::Result<()> {
    root.fill(&WHITE).map_err(plot_err)?;
    let panels = root.split_evenly((1, 2));
    draw_position_panel(&panels[0], frame, config)?;
    draw_compass_panel(&panels[1], frame, config)?;
    Ok(())
}

/// Frame sink writing PNG images, paced by a short pause
///
/// Writes the live frame and the per-frame export when they are configured.
pub struct LivePlot {
    config: PlotConfig,
    pause: Duration,
}

impl LivePlot {
    pub fn new(config: PlotConfig) -> crate::Result<Self> {
        if let Some(ref dir) = config.export_dir {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = config.live_frame.as_ref().and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pause = config.pause();
        Ok(Self { config, pause })
    }

    /// Drop the per-frame pause, for use next to a sink that paces itself
    pub fn unpaced(mut self) -> Self {
        self.pause = Duration::ZERO;
        self
    }

    fn render_png(&self, path: &std::path::Path, frame: &Frame) -> crate::Result<()> {
        let root =
            BitMapBackend::new(path, (self.config.width, self.config.height)).into_drawing_area();
        draw_frame(&root, frame, &self.config)?;
        root.present().map_err(plot_err)
    }
}

impl FrameSink for LivePlot {
    fn show(&mut self, frame: &Frame) -> crate::Result<()> {
        if let Some(ref path) = self.config.live_frame {
            self.render_png(path, frame)?;
        }
        if let Some(ref dir) = self.config.export_dir {
            self.render_png(&dir.join(format!("{}.png", frame.index)), frame)?;
        }

        if !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame {
            index: 1,
            truth: StepValues {
                position: [300.0, 200.0],
                head_direction: 90.0,
                speed: 0.1,
            },
            prediction: StepValues {
                position: [320.0, 180.0],
                head_direction: 45.0,
                speed: 0.15,
            },
        }
    }

    fn quiet_config() -> PlotConfig {
        PlotConfig {
            pause_ms: 0.0,
            live_frame: None,
            show_labels: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_compass_vector_magnitude_is_speed() {
        for speed in [0.0, 0.05, 0.13, 1.0, 42.0] {
            for angle in [-720.0, -90.0, 0.0, 33.3, 90.0, 180.0, 271.5, 1000.0] {
                let (x, y) = compass_vector(speed, angle);
                assert!(((x * x + y * y).sqrt() - speed).abs() < 1e-9);
            }
        }

        let (x, y) = compass_vector(2.0, 90.0);
        assert!(x.abs() < 1e-12);
        assert!((y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ring_radii() {
        let radii = PlotConfig::default().ring_radii();
        assert_eq!(radii.len(), 3);
        assert!((radii[2] - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_pause_bounds() {
        let mut config = PlotConfig::default();
        assert!((config.pause().as_secs_f64() - 1e-4).abs() < 1e-9);
        config.validate().unwrap();

        config.pause_ms = 1e300;
        assert_eq!(config.pause(), Duration::ZERO);
        assert!(config.validate().is_err());

        config.pause_ms = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sink_pair_forwards_in_order() -> crate::Result<()> {
        #[derive(Default)]
        struct Seen(Vec<usize>);

        impl FrameSink for Seen {
            fn show(&mut self, frame: &Frame) -> crate::Result<()> {
                self.0.push(frame.index);
                Ok(())
            }
        }

        let mut pair = (Seen::default(), Seen::default());
        pair.show(&sample_frame())?;
        pair.show(&Frame {
            index: 2,
            ..sample_frame()
        })?;

        assert_eq!(pair.0 .0, vec![1, 2]);
        assert_eq!(pair.1 .0, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_arrow_head_only_for_nonzero_arrow() {
        assert_eq!(arrow_paths((0.0, 0.0), 0.01).len(), 1);
        let paths = arrow_paths((0.1, 0.0), 0.01);
        assert_eq!(paths.len(), 3);
        // Head strokes point back towards the origin
        assert!(paths[1][1].0 < 0.1);
        assert!(paths[2][1].0 < 0.1);
    }

    #[test]
    fn test_draw_frame_svg() -> crate::Result<()> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (400, 200)).into_drawing_area();
            draw_frame(&root, &sample_frame(), &quiet_config())?;
            root.present().map_err(plot_err)?;
        }

        let svg = svg.to_uppercase();
        assert!(svg.contains("<SVG"));
        assert!(svg.contains("#00FF00"));
        assert!(svg.contains("#FF0000"));

        Ok(())
    }

    #[test]
    fn test_live_plot_writes_images() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = PlotConfig {
            width: 200,
            height: 100,
            live_frame: Some(dir.path().join("live/frame.png")),
            export_dir: Some(dir.path().join("imgs")),
            ..quiet_config()
        };

        let mut plot = LivePlot::new(config)?;
        plot.show(&sample_frame())?;
        plot.show(&Frame {
            index: 2,
            ..sample_frame()
        })?;

        assert!(dir.path().join("live/frame.png").exists());
        assert!(dir.path().join("imgs/1.png").exists());
        assert!(dir.path().join("imgs/2.png").exists());

        Ok(())
    }
}
