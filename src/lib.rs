//! # trailshade
//!
//! A textured mesh displaced and re-colored in real time by a decaying
//! "trail" buffer painted by a moving point.
//!
//! Every frame, an [`ImpulseDriver`] picks a point (the mouse, or a circle
//! walked by the playhead), the [`TrailBuffer`] fades and deposits a soft
//! radial stamp there, and the render pass samples the trail in screen space
//! twice:
//!
//! - per vertex, to scale each vertex's local depth ([`DisplacementStage`]);
//! - per fragment, to pick a point along a six-level ramp built from the
//!   mesh's diffuse and emissive textures ([`ColorBlendStage`]).
//!
//! ## Quick Start
//!
//! ```ignore
//! use trailshade::prelude::*;
//!
//! fn main() -> Result<(), SketchError> {
//!     Sketch::new()
//!         .with_driver(DriverKind::Pointer)
//!         .with_diffuse("assets/diffuse.png")
//!         .with_emissive("assets/emissive.png")
//!         .run()
//! }
//! ```
//!
//! ## Headless
//!
//! [`Sketch::export`] renders PNG frames offscreen. With
//! [`BackendPreference::Auto`] it uses the GPU when an adapter exists and
//! the CPU rasterizer otherwise; both run the same stage definitions.
//!
//! ## Trail semantics
//!
//! ```
//! use trailshade::{TrailBuffer, Vec2};
//!
//! let mut trail = TrailBuffer::new(100, 100).with_decay(0.025).with_radius(12.0);
//! trail.update(Some(Vec2::new(50.0, 50.0)));
//! let peak = trail.get(50, 50);
//! assert!(peak > 0.35);
//!
//! trail.update(None);
//! assert!((trail.get(50, 50) - peak * 0.975).abs() < 1e-6);
//! ```

pub mod backend;
pub mod camera;
pub mod config;
pub mod driver;
pub mod error;
pub mod frame;
pub mod mesh;
pub mod shader;
pub mod sketch;
pub mod stages;
pub mod texture;
pub mod time;
pub mod trail;

pub use glam::{Mat4, Vec2, Vec3, Vec4};

pub use backend::{select_backend, BackendPreference, Frame, GpuBackend, RenderBackend, SoftwareBackend};
pub use camera::Camera;
pub use config::SketchConfig;
pub use driver::{DriverKind, FrameInfo, ImpulseDriver, OrbitDriver, PointerCell, PointerDriver};
pub use error::{AssetError, ConfigError, GpuError, RenderError, SketchError};
pub use frame::{FrameLoop, LoopState};
pub use mesh::{
    default_scene, relief_mesh, ImmediateLoader, MeshAsset, MeshInstance, SceneAsset, SceneLoader, ThreadedLoader,
    TrailMaterial,
};
pub use sketch::Sketch;
pub use stages::{
    compute_blended_color, compute_displaced_position, CameraMatrices, ColorBlendStage, DisplacementStage,
    TrailSampler,
};
pub use texture::{AddressMode, FilterMode, TextureConfig};
pub use time::{Playhead, Step, Time};
pub use trail::TrailBuffer;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use trailshade::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::BackendPreference;
    pub use crate::config::SketchConfig;
    pub use crate::driver::DriverKind;
    pub use crate::error::SketchError;
    pub use crate::sketch::Sketch;
    pub use crate::stages::{ColorBlendStage, DisplacementStage};
    pub use crate::texture::TextureConfig;
    pub use crate::trail::TrailBuffer;
    pub use crate::{Vec2, Vec3, Vec4};
}
