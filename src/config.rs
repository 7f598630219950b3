//! Sketch configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! { "decay": 0.05, "driver": "pointer", "diffuse": "assets/diffuse.png" }
//! ```
//!
//! Loaded values pass through [`SketchConfig::sanitized`] before use, which
//! clamps anything out of range instead of rejecting it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::BackendPreference;
use crate::driver::{DriverKind, DEFAULT_ORBIT_AMPLITUDE};
use crate::error::ConfigError;
use crate::stages::MIN_SCALE;
use crate::time::DEFAULT_LOOP_SECONDS;
use crate::trail::{DEFAULT_BLUR, DEFAULT_DECAY, DEFAULT_RADIUS_FRACTION, MAX_BLUR};

/// Largest surface or export dimension accepted.
pub const MAX_DIMENSION: u32 = 8192;

/// Complete sketch configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SketchConfig {
    /// Window title.
    pub title: String,
    /// Surface width in pixels (window inner size, or export size).
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Trail buffer resolution relative to the surface, in `(0, 1]`.
    pub trail_scale: f32,
    /// Opacity of the black layer composited over the trail each frame.
    pub decay: f32,
    /// Impulse radius as a fraction of the trail buffer width.
    pub radius_fraction: f32,
    /// Blur radius applied to each impulse stamp, in pixels.
    pub blur: u32,
    /// Depth scale of untouched vertices.
    pub min_scale: f32,
    pub driver: DriverKind,
    /// Orbit radius in NDC units.
    pub orbit_amplitude: f32,
    /// Playhead loop length in seconds.
    pub loop_seconds: f32,
    /// Frame rate used by `export`.
    pub export_fps: f32,
    /// Background color as `0xRRGGBB` (sRGB).
    pub clear_color: u32,
    /// Optional diffuse texture image.
    pub diffuse: Option<PathBuf>,
    /// Optional emissive texture image.
    pub emissive: Option<PathBuf>,
    /// Grid resolution of the generated relief mesh.
    pub mesh_resolution: u32,
    /// Model translation in world space.
    pub model_offset: [f32; 3],
    pub backend: BackendPreference,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            title: "trailshade".into(),
            width: 1280,
            height: 720,
            trail_scale: 1.0,
            decay: DEFAULT_DECAY,
            radius_fraction: DEFAULT_RADIUS_FRACTION,
            blur: DEFAULT_BLUR,
            min_scale: MIN_SCALE,
            driver: DriverKind::Orbit,
            orbit_amplitude: DEFAULT_ORBIT_AMPLITUDE,
            loop_seconds: DEFAULT_LOOP_SECONDS,
            export_fps: 60.0,
            clear_color: 0x333333,
            diffuse: None,
            emissive: None,
            mesh_resolution: 128,
            model_offset: [0.0, 0.0, 0.0],
            backend: BackendPreference::Auto,
        }
    }
}

impl SketchConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Copy with every value clamped into its valid range.
    ///
    /// Non-finite floats fall back to their defaults.
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        Self {
            title: self.title.clone(),
            width: self.width.clamp(1, MAX_DIMENSION),
            height: self.height.clamp(1, MAX_DIMENSION),
            trail_scale: finite_or(self.trail_scale, d.trail_scale).clamp(0.05, 1.0),
            decay: finite_or(self.decay, d.decay).clamp(0.0, 1.0),
            radius_fraction: finite_or(self.radius_fraction, d.radius_fraction).clamp(0.001, 1.0),
            blur: self.blur.min(MAX_BLUR),
            min_scale: finite_or(self.min_scale, d.min_scale).clamp(0.0, 1.0),
            driver: self.driver,
            orbit_amplitude: finite_or(self.orbit_amplitude, d.orbit_amplitude).clamp(0.0, 1.0),
            loop_seconds: positive_or(self.loop_seconds, d.loop_seconds),
            export_fps: positive_or(self.export_fps, d.export_fps).min(240.0),
            clear_color: self.clear_color & 0x00ff_ffff,
            diffuse: self.diffuse.clone(),
            emissive: self.emissive.clone(),
            mesh_resolution: self.mesh_resolution.clamp(1, 1024),
            model_offset: self.model_offset.map(|c| finite_or(c, 0.0)),
            backend: self.backend,
        }
    }

    /// Trail buffer size for a surface size.
    pub fn trail_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.trail_scale).round() as u32).max(1);
        (scale(width), scale(height))
    }

    /// Impulse radius in pixels for a trail buffer width.
    pub fn trail_radius(&self, buffer_width: u32) -> f32 {
        self.radius_fraction * buffer_width as f32
    }

    /// Clear color as sRGB components in `[0, 1]`.
    pub fn clear_color_srgb(&self) -> [f32; 3] {
        let c = self.clear_color;
        [
            ((c >> 16) & 0xff) as f32 / 255.0,
            ((c >> 8) & 0xff) as f32 / 255.0,
            (c & 0xff) as f32 / 255.0,
        ]
    }
}

fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

fn positive_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        fallback
    }
}
