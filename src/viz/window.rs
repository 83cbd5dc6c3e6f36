//! Desktop window for the live two-panel view
//!
//! The evaluation loop drives the window. Each frame is rasterised by
//! plotters into an RGB buffer and copied onto a softbuffer surface. The
//! winit event loop is then pumped for the length of the pause, which keeps
//! the window responsive between frames.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use plotters::prelude::*;
use softbuffer::{Context, Surface};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use super::{draw_frame, plot_err, Frame, FrameSink, PlotConfig};

/// Pack 8-bit RGB triples into the `0RGB` words a softbuffer surface takes
pub fn pack_rgb(rgb: &[u8], out: &mut [u32]) {
    for (pixel, chunk) in out.iter_mut().zip(rgb.chunks_exact(3)) {
        *pixel = (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
    }
}

/// Open window and the surface drawing into it
struct Presenter {
    // Field order: the surface is dropped before its context
    surface: Surface<Arc<Window>, Arc<Window>>,
    _context: Context<Arc<Window>>,
}

/// Event handler owning the window state
struct WindowApp {
    title: String,
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    presenter: Option<Presenter>,
    closed: bool,
    error: Option<String>,
}

impl WindowApp {
    fn open(&self, event_loop: &ActiveEventLoop) -> Result<Presenter, String> {
        let (width, height) = match (NonZeroU32::new(self.width), NonZeroU32::new(self.height)) {
            (Some(w), Some(h)) => (w, h),
            _ => return Err("window size must be non-zero".to_string()),
        };

        let attrs = Window::default_attributes()
            .with_title(self.title.as_str())
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(attrs).map_err(|e| e.to_string())?);

        let context = Context::new(window.clone()).map_err(|e| e.to_string())?;
        let mut surface = Surface::new(&context, window).map_err(|e| e.to_string())?;
        surface.resize(width, height).map_err(|e| e.to_string())?;

        Ok(Presenter {
            surface,
            _context: context,
        })
    }

    /// Copy the current pixels onto the window
    fn present(&mut self) -> Result<(), String> {
        let Some(ref mut presenter) = self.presenter else {
            return Ok(());
        };

        let mut buffer = presenter.surface.buffer_mut().map_err(|e| e.to_string())?;
        let n = buffer.len().min(self.pixels.len());
        buffer[..n].copy_from_slice(&self.pixels[..n]);
        buffer.present().map_err(|e| e.to_string())
    }

    fn close(&mut self) {
        if !self.closed {
            log::info!("Plot window closed; evaluation continues without live display");
        }
        self.closed = true;
        self.presenter = None;
    }
}

impl ApplicationHandler for WindowApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.presenter.is_some() || self.closed {
            return;
        }

        match self.open(event_loop) {
            Ok(presenter) => {
                log::debug!("Opened plot window {}x{}", self.width, self.height);
                self.presenter = Some(presenter);
            }
            Err(e) => self.error = Some(e),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close(),

            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                self.close()
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.present() {
                    self.error = Some(e);
                }
            }

            _ => {}
        }
    }
}

/// Frame sink showing every frame in a desktop window
///
/// Closing the window (or pressing Escape) stops the live display; the
/// remaining frames are still passed through so the run completes.
pub struct WindowPlot {
    event_loop: EventLoop<()>,
    app: WindowApp,
    rgb: Vec<u8>,
    pause: Duration,
    config: PlotConfig,
}

impl WindowPlot {
    /// Create the event loop; the window itself opens with the first frame
    ///
    /// Must be called on the main thread. Fails when no display is available.
    pub fn new(config: PlotConfig) -> crate::Result<Self> {
        let event_loop = EventLoop::new().map_err(plot_err)?;

        let pixels = config.width as usize * config.height as usize;
        let app = WindowApp {
            title: config.window_title.clone(),
            width: config.width,
            height: config.height,
            pixels: vec![0; pixels],
            presenter: None,
            closed: false,
            error: None,
        };

        Ok(Self {
            event_loop,
            app,
            rgb: vec![0; pixels * 3],
            pause: config.pause(),
            config,
        })
    }

    pub fn is_open(&self) -> bool {
        !self.app.closed
    }

    fn pump(&mut self, timeout: Duration) -> crate::Result<()> {
        if let PumpStatus::Exit(_) = self.event_loop.pump_app_events(Some(timeout), &mut self.app) {
            self.app.close();
        }

        match self.app.error.take() {
            Some(e) => Err(crate::DecoderError::Plot(e)),
            None => Ok(()),
        }
    }
}

impl FrameSink for WindowPlot {
    fn show(&mut self, frame: &Frame) -> crate::Result<()> {
        if self.app.closed {
            return Ok(());
        }

        {
            let root = BitMapBackend::with_buffer(&mut self.rgb, (self.config.width, self.config.height))
                .into_drawing_area();
            draw_frame(&root, frame, &self.config)?;
            root.present().map_err(plot_err)?;
        }
        pack_rgb(&self.rgb, &mut self.app.pixels);

        // First pump opens the window
        self.pump(Duration::ZERO)?;
        self.app.present().map_err(crate::DecoderError::Plot)?;

        let deadline = Instant::now() + self.pause;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || self.app.closed {
                break;
            }
            self.pump(remaining)?;
        }

        Ok(())
    }
}
