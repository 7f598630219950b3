//! Sketch builder and runners.
//!
//! Use method chaining to configure, then either open a window with
//! [`Sketch::run`] or write frames to disk with [`Sketch::export`].
//!
//! ```ignore
//! use trailshade::prelude::*;
//!
//! Sketch::new()
//!     .with_driver(DriverKind::Pointer)
//!     .with_decay(0.04)
//!     .run()?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::backend::{select_backend, BackendPreference, GpuBackend};
use crate::config::SketchConfig;
use crate::driver::{DriverKind, ImpulseDriver, OrbitDriver, PointerCell, PointerDriver};
use crate::error::{RenderError, SketchError};
use crate::frame::FrameLoop;
use crate::mesh::{default_scene, ImmediateLoader, ThreadedLoader};
use crate::time::Time;

/// A trail sketch builder.
#[derive(Debug, Clone, Default)]
pub struct Sketch {
    config: SketchConfig,
}

impl Sketch {
    /// Create a sketch with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: SketchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    /// Surface size in pixels.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Trail buffer resolution relative to the surface.
    pub fn with_trail_scale(mut self, scale: f32) -> Self {
        self.config.trail_scale = scale;
        self
    }

    /// Black-layer opacity per frame.
    pub fn with_decay(mut self, decay: f32) -> Self {
        self.config.decay = decay;
        self
    }

    /// Impulse radius as a fraction of the trail width.
    pub fn with_radius_fraction(mut self, fraction: f32) -> Self {
        self.config.radius_fraction = fraction;
        self
    }

    pub fn with_blur(mut self, blur: u32) -> Self {
        self.config.blur = blur;
        self
    }

    pub fn with_min_scale(mut self, min_scale: f32) -> Self {
        self.config.min_scale = min_scale;
        self
    }

    pub fn with_driver(mut self, driver: DriverKind) -> Self {
        self.config.driver = driver;
        self
    }

    pub fn with_orbit_amplitude(mut self, amplitude: f32) -> Self {
        self.config.orbit_amplitude = amplitude;
        self
    }

    pub fn with_loop_seconds(mut self, seconds: f32) -> Self {
        self.config.loop_seconds = seconds;
        self
    }

    pub fn with_export_fps(mut self, fps: f32) -> Self {
        self.config.export_fps = fps;
        self
    }

    /// Background color as `0xRRGGBB`.
    pub fn with_clear_color(mut self, rgb: u32) -> Self {
        self.config.clear_color = rgb;
        self
    }

    pub fn with_diffuse(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.diffuse = Some(path.into());
        self
    }

    pub fn with_emissive(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.emissive = Some(path.into());
        self
    }

    pub fn with_mesh_resolution(mut self, resolution: u32) -> Self {
        self.config.mesh_resolution = resolution;
        self
    }

    pub fn with_model_offset(mut self, offset: [f32; 3]) -> Self {
        self.config.model_offset = offset;
        self
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.config.backend = backend;
        self
    }

    /// Open a window and run until it is closed or Escape is pressed.
    ///
    /// Windowed mode always renders with wgpu.
    pub fn run(self) -> Result<(), SketchError> {
        let config = self.config.sanitized();
        if config.backend == BackendPreference::Software {
            log::warn!("The software backend is headless only; the window renders with wgpu");
        }

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(config);
        event_loop.run_app(&mut app)?;
        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Render frames headless and write them as PNG files into `out_dir`.
    ///
    /// Uses the orbit driver and a fixed step of `1 / export_fps`. With no
    /// frame count, one full playhead loop is written.
    pub fn export(self, out_dir: impl AsRef<Path>, frames: Option<u32>) -> Result<Vec<PathBuf>, SketchError> {
        let config = SketchConfig {
            driver: DriverKind::Orbit,
            ..self.config.sanitized()
        };
        let out_dir = out_dir.as_ref();
        let mut frame_loop = headless_loop(&config)?;
        let frames = frames.unwrap_or_else(|| frame_loop.playhead().frames_per_loop(config.export_fps));

        fs::create_dir_all(out_dir)?;
        log::info!("Exporting {} frames to {}", frames, out_dir.display());

        let mut written = Vec::with_capacity(frames as usize);
        for i in 0..frames {
            frame_loop.tick()?;
            let image = frame_loop.capture().ok_or(SketchError::Capture)?;
            let path = out_dir.join(format!("frame_{:05}.png", i));
            image.save(&path)?;
            log::trace!("Wrote {}", path.display());
            written.push(path);
        }
        log::info!("Export finished: {} frames", written.len());
        Ok(written)
    }

    /// Frame loop on an offscreen backend with the scene already queued.
    pub fn headless(self) -> Result<FrameLoop, SketchError> {
        headless_loop(&self.config.sanitized())
    }
}

fn headless_loop(config: &SketchConfig) -> Result<FrameLoop, SketchError> {
    let backend = select_backend(config.backend, config.width, config.height)?;
    let driver = make_driver(config, &PointerCell::new());
    let loader = ImmediateLoader::new(default_scene(config));
    let time = Time::fixed(1.0 / config.export_fps);
    Ok(FrameLoop::new(config, backend, driver, Box::new(loader)).with_time(time))
}

fn make_driver(config: &SketchConfig, pointer: &PointerCell) -> Box<dyn ImpulseDriver> {
    match config.driver {
        DriverKind::Orbit => Box::new(OrbitDriver::new(Vec2::ONE).with_amplitude(config.orbit_amplitude)),
        DriverKind::Pointer => Box::new(PointerDriver::new(pointer.clone())),
    }
}

struct App {
    config: SketchConfig,
    window: Option<Arc<Window>>,
    frame_loop: Option<FrameLoop>,
    pointer: PointerCell,
    error: Option<SketchError>,
}

impl App {
    fn new(config: SketchConfig) -> Self {
        Self {
            config,
            window: None,
            frame_loop: None,
            pointer: PointerCell::new(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SketchError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(self.config.width, self.config.height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        let backend = match GpuBackend::windowed(window.clone()) {
            Ok(backend) => backend,
            Err(e) => return self.fail(event_loop, e.into()),
        };

        let config = self.config.clone();
        let loader = ThreadedLoader::spawn(move || default_scene(&config));
        let driver = make_driver(&self.config, &self.pointer);
        self.frame_loop = Some(FrameLoop::new(
            &self.config,
            Box::new(backend),
            driver,
            Box::new(loader),
        ));
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(frame_loop) = &mut self.frame_loop {
                    frame_loop.request_resize(size.width, size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer.observe(position.x as f32, position.y as f32);
            }
            WindowEvent::RedrawRequested => {
                if let Some(frame_loop) = &mut self.frame_loop {
                    match frame_loop.tick() {
                        Ok(()) => {}
                        Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                            frame_loop.reconfigure();
                        }
                        Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                            return self.fail(
                                event_loop,
                                SketchError::Render(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)),
                            );
                        }
                        Err(e) => log::warn!("Render error: {}", e),
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_config() {
        let sketch = Sketch::new()
            .with_size(320, 240)
            .with_decay(0.1)
            .with_driver(DriverKind::Pointer)
            .with_backend(BackendPreference::Software)
            .with_clear_color(0x102030);
        let config = sketch.config();
        assert_eq!((config.width, config.height), (320, 240));
        assert_eq!(config.decay, 0.1);
        assert_eq!(config.driver, DriverKind::Pointer);
        assert_eq!(config.backend, BackendPreference::Software);
        assert_eq!(config.clear_color, 0x102030);
    }

    #[test]
    fn test_make_driver_kind() {
        let pointer = PointerCell::new();
        let config = SketchConfig::default();
        assert_eq!(make_driver(&config, &pointer).name(), "orbit");
        let config = SketchConfig {
            driver: DriverKind::Pointer,
            ..Default::default()
        };
        assert_eq!(make_driver(&config, &pointer).name(), "pointer");
    }

    #[test]
    fn test_export_software_frames() {
        let dir = std::env::temp_dir().join(format!("trailshade-export-{}", std::process::id()));
        let written = Sketch::new()
            .with_size(48, 32)
            .with_mesh_resolution(8)
            .with_backend(BackendPreference::Software)
            .export(&dir, Some(3))
            .unwrap();
        assert_eq!(written.len(), 3);
        for path in &written {
            let img = image::open(path).unwrap();
            assert_eq!((img.width(), img.height()), (48, 32));
        }
        let _ = fs::remove_dir_all(&dir);
    }
}
