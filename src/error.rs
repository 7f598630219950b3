//! Error types for trailshade.
//!
//! This module provides error types for GPU initialization, asset loading,
//! configuration, rendering and the sketch runner.

use std::fmt;

/// Errors that can occur during GPU initialization.
///
/// These are fatal at startup: there is no retry.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Failed to map buffer for reading.
    BufferMapping(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with Vulkan/Metal/DX12 support, or use the software backend."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur while loading a scene.
///
/// A failed load leaves the frame loop idle; it is logged, never retried.
#[derive(Debug)]
pub enum AssetError {
    /// Failed to decode an image file.
    ImageLoad(image::ImageError),
    /// Failed to read a file from disk.
    Io(std::io::Error),
    /// Raw texture data does not match its declared size.
    InvalidTexture(String),
    /// Mesh streams are inconsistent.
    InvalidMesh { mesh: String, reason: String },
    /// The loader thread went away without delivering a scene.
    LoaderDisconnected,
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::ImageLoad(e) => write!(f, "Failed to load image: {}", e),
            AssetError::Io(e) => write!(f, "Failed to read asset file: {}", e),
            AssetError::InvalidTexture(msg) => write!(f, "Invalid texture: {}", msg),
            AssetError::InvalidMesh { mesh, reason } => write!(f, "Invalid mesh '{}': {}", mesh, reason),
            AssetError::LoaderDisconnected => write!(f, "Scene loader stopped without delivering a scene"),
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::ImageLoad(e) => Some(e),
            AssetError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for AssetError {
    fn from(e: image::ImageError) -> Self {
        AssetError::ImageLoad(e)
    }
}

impl From<std::io::Error> for AssetError {
    fn from(e: std::io::Error) -> Self {
        AssetError::Io(e)
    }
}

/// Errors that can occur when reading a sketch configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the file.
    Io(std::io::Error),
    /// The file is not valid JSON for [`SketchConfig`](crate::SketchConfig).
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Errors returned by a single render pass.
#[derive(Debug)]
pub enum RenderError {
    /// The swapchain texture could not be acquired.
    Surface(wgpu::SurfaceError),
    /// Reading an offscreen frame back failed.
    Gpu(GpuError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Surface(e) => write!(f, "Surface error: {}", e),
            RenderError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Surface(e) => Some(e),
            RenderError::Gpu(e) => Some(e),
        }
    }
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(e: wgpu::SurfaceError) -> Self {
        RenderError::Surface(e)
    }
}

impl From<GpuError> for RenderError {
    fn from(e: GpuError) -> Self {
        RenderError::Gpu(e)
    }
}

/// Errors that can occur when running or exporting a sketch.
#[derive(Debug)]
pub enum SketchError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// Configuration could not be loaded.
    Config(ConfigError),
    /// A render pass failed during export.
    Render(RenderError),
    /// Writing exported frames failed.
    Export(std::io::Error),
    /// Encoding an exported frame failed.
    Image(image::ImageError),
    /// The backend cannot read rendered frames back.
    Capture,
}

impl fmt::Display for SketchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SketchError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SketchError::Window(e) => write!(f, "Failed to create window: {}", e),
            SketchError::Gpu(e) => write!(f, "GPU error: {}", e),
            SketchError::Config(e) => write!(f, "Config error: {}", e),
            SketchError::Render(e) => write!(f, "Render error: {}", e),
            SketchError::Export(e) => write!(f, "Failed to write frame: {}", e),
            SketchError::Image(e) => write!(f, "Failed to encode frame: {}", e),
            SketchError::Capture => write!(f, "Backend cannot read rendered frames back"),
        }
    }
}

impl std::error::Error for SketchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SketchError::EventLoop(e) => Some(e),
            SketchError::Window(e) => Some(e),
            SketchError::Gpu(e) => Some(e),
            SketchError::Config(e) => Some(e),
            SketchError::Render(e) => Some(e),
            SketchError::Export(e) => Some(e),
            SketchError::Image(e) => Some(e),
            SketchError::Capture => None,
        }
    }
}

impl From<winit::error::EventLoopError> for SketchError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SketchError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SketchError {
    fn from(e: winit::error::OsError) -> Self {
        SketchError::Window(e)
    }
}

impl From<GpuError> for SketchError {
    fn from(e: GpuError) -> Self {
        SketchError::Gpu(e)
    }
}

impl From<ConfigError> for SketchError {
    fn from(e: ConfigError) -> Self {
        SketchError::Config(e)
    }
}

impl From<RenderError> for SketchError {
    fn from(e: RenderError) -> Self {
        SketchError::Render(e)
    }
}

impl From<std::io::Error> for SketchError {
    fn from(e: std::io::Error) -> Self {
        SketchError::Export(e)
    }
}

impl From<image::ImageError> for SketchError {
    fn from(e: image::ImageError) -> Self {
        SketchError::Image(e)
    }
}
