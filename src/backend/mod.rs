//! Render backends.
//!
//! The frame loop talks to a [`RenderBackend`] trait object and never asks
//! which one it has. Two implementations exist:
//!
//! - [`GpuBackend`]: wgpu, drawing to a window surface or to an offscreen
//!   texture that is read back after each frame.
//! - [`SoftwareBackend`]: a CPU rasterizer calling the stage functions in
//!   [`crate::stages`] directly.
//!
//! The choice is made once, at startup, by [`select_backend`].

mod gpu;
mod software;

use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{GpuError, RenderError};
use crate::mesh::MeshInstance;
use crate::stages::CameraMatrices;
use crate::trail::TrailBuffer;

pub use gpu::GpuBackend;
pub use software::SoftwareBackend;

/// Everything one render pass needs.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub trail: &'a TrailBuffer,
    /// The trail raster changed since the last successful render.
    pub trail_dirty: bool,
    pub matrices: CameraMatrices,
    /// Render target size in pixels.
    pub viewport: Vec2,
    /// Background color, sRGB components in `[0, 1]`.
    pub clear_color: [f32; 3],
    /// Meshes to draw. Empty while the scene is loading.
    pub scene: &'a [MeshInstance],
}

/// A render target plus the machinery to draw a [`Frame`] into it.
pub trait RenderBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Current target size in pixels.
    fn size(&self) -> (u32, u32);

    /// Resize the target. Zero dimensions are clamped to 1.
    fn resize(&mut self, width: u32, height: u32);

    /// Recover a lost or outdated presentation target.
    fn reconfigure(&mut self) {}

    /// Prepare per-mesh resources for a newly loaded scene.
    fn install_scene(&mut self, scene: &[MeshInstance]);

    /// Draw one frame.
    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError>;

    /// The last rendered frame, for targets that can be read back.
    fn capture(&self) -> Option<RgbaImage>;
}

/// Which backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// GPU if an adapter is available, otherwise software.
    #[default]
    Auto,
    /// GPU or fail.
    Gpu,
    /// Always the CPU rasterizer.
    Software,
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendPreference::Auto => write!(f, "auto"),
            BackendPreference::Gpu => write!(f, "gpu"),
            BackendPreference::Software => write!(f, "software"),
        }
    }
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "gpu" | "wgpu" => Ok(BackendPreference::Gpu),
            "software" | "cpu" => Ok(BackendPreference::Software),
            other => Err(format!(
                "unknown backend '{}', expected 'auto', 'gpu' or 'software'",
                other
            )),
        }
    }
}

/// Build an offscreen backend of the given size.
///
/// `Auto` probes for an adapter once and falls back to software when none is
/// found. `Gpu` without an adapter is an error.
pub fn select_backend(
    preference: BackendPreference,
    width: u32,
    height: u32,
) -> Result<Box<dyn RenderBackend>, GpuError> {
    let backend: Box<dyn RenderBackend> = match preference {
        BackendPreference::Software => Box::new(SoftwareBackend::new(width, height)),
        BackendPreference::Gpu => Box::new(GpuBackend::offscreen(width, height)?),
        BackendPreference::Auto => match GpuBackend::offscreen(width, height) {
            Ok(gpu) => Box::new(gpu),
            Err(GpuError::NoAdapter) => {
                log::info!("No GPU adapter found, using the software backend");
                Box::new(SoftwareBackend::new(width, height))
            }
            Err(e) => return Err(e),
        },
    };
    log::info!(
        "Selected {} backend ({}x{}, preference {})",
        backend.name(),
        width,
        height,
        preference
    );
    Ok(backend)
}
