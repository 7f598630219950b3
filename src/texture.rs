//! Texture data for mesh materials.
//!
//! Textures hold sRGB-encoded RGBA8 data. The GPU backend uploads them as
//! `Rgba8UnormSrgb` so sampling returns linear values; [`TextureConfig::sample`]
//! performs the same decode so the software backend sees identical inputs.
//!
//! # Supported Formats
//!
//! - PNG (recommended)
//! - JPEG

use std::path::Path;

use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::AssetError;

/// Filter mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Smooth linear filtering (default).
    #[default]
    Linear,
    /// Sharp nearest-neighbor filtering.
    Nearest,
}

/// Address mode for texture wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    /// Coordinates outside 0-1 use edge pixels (default).
    #[default]
    ClampToEdge,
    /// Tile the texture.
    Repeat,
    /// Mirror the texture at boundaries.
    MirrorRepeat,
}

impl AddressMode {
    /// Resolve an integer texel coordinate against a dimension.
    fn resolve(self, i: i64, size: u32) -> u32 {
        let n = size as i64;
        let i = match self {
            AddressMode::ClampToEdge => i.clamp(0, n - 1),
            AddressMode::Repeat => i.rem_euclid(n),
            AddressMode::MirrorRepeat => {
                let period = i.rem_euclid(2 * n);
                if period < n {
                    period
                } else {
                    2 * n - 1 - period
                }
            }
        };
        i as u32
    }
}

/// One RGBA8 texture with its sampling state.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureConfig {
    /// Raw RGBA pixel data (width * height * 4 bytes), row-major, top row first.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub filter: FilterMode,
    pub address_mode: AddressMode,
}

impl TextureConfig {
    /// Create a texture from raw RGBA data.
    ///
    /// Fails if the data length does not match `width * height * 4` or a
    /// dimension is zero.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self, AssetError> {
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidTexture(format!(
                "zero-sized texture {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(AssetError::InvalidTexture(format!(
                "RGBA data size mismatch: {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
        })
    }

    /// Take ownership of a decoded image.
    pub fn from_image(img: image::RgbaImage) -> Result<Self, AssetError> {
        let (width, height) = img.dimensions();
        Self::from_rgba(img.into_raw(), width, height)
    }

    /// Load a texture from an image file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let img = image::open(path)?.into_rgba8();
        log::debug!(
            "Loaded texture '{}' ({}x{})",
            path.display(),
            img.width(),
            img.height()
        );
        Self::from_image(img)
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }

    /// Create a solid color texture (1x1 pixel).
    pub fn solid(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            data: vec![r, g, b, a],
            width: 1,
            height: 1,
            filter: FilterMode::Nearest,
            address_mode: AddressMode::ClampToEdge,
        }
    }

    /// Vertical gradient from `top` to `bottom`, `width` texels wide.
    pub fn gradient(width: u32, height: u32, top: [u8; 4], bottom: [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let t = y as f32 / (height - 1).max(1) as f32;
            let row = [
                lerp_u8(top[0], bottom[0], t),
                lerp_u8(top[1], bottom[1], t),
                lerp_u8(top[2], bottom[2], t),
                lerp_u8(top[3], bottom[3], t),
            ];
            for _ in 0..width {
                data.extend_from_slice(&row);
            }
        }
        Self {
            data,
            width,
            height,
            filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
        }
    }

    /// Hash noise with independent channels, tiled.
    pub fn noise(size: u32, seed: u32) -> Self {
        let size = size.max(1);
        let data = (0..size * size)
            .flat_map(|i| {
                let bits = mix_bits(u64::from(i) | (u64::from(seed) << 32));
                [bits as u8, (bits >> 8) as u8, (bits >> 16) as u8, 255]
            })
            .collect();
        Self {
            data,
            width: size,
            height: size,
            filter: FilterMode::Linear,
            address_mode: AddressMode::Repeat,
        }
    }

    /// Decoded (linear) texel at integer coordinates, addressed by the
    /// texture's address mode.
    pub fn texel(&self, x: i64, y: i64) -> Vec4 {
        let x = self.address_mode.resolve(x, self.width);
        let y = self.address_mode.resolve(y, self.height);
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.data[i..i + 4];
        Vec4::new(
            srgb_to_linear(px[0]),
            srgb_to_linear(px[1]),
            srgb_to_linear(px[2]),
            px[3] as f32 / 255.0,
        )
    }

    /// Sample at normalized `uv` (top-left origin) with texel centers at
    /// `+0.5`, matching the GPU sampler.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if !uv.is_finite() {
            return self.texel(0, 0);
        }
        let p = uv * Vec2::new(self.width as f32, self.height as f32) - 0.5;
        match self.filter {
            FilterMode::Nearest => {
                let q = (p + 0.5).floor();
                self.texel(q.x as i64, q.y as i64)
            }
            FilterMode::Linear => {
                let base = p.floor();
                let f = p - base;
                let (x0, y0) = (base.x as i64, base.y as i64);
                let top = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), f.x);
                let bottom = self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), f.x);
                top.lerp(bottom, f.y)
            }
        }
    }
}

/// sRGB byte to linear intensity.
pub fn srgb_to_linear(c: u8) -> f32 {
    srgb_component_to_linear(c as f32 / 255.0)
}

/// sRGB component in `[0, 1]` to linear.
pub fn srgb_component_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear intensity to an sRGB byte.
pub fn linear_to_srgb(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let s = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0).round() as u8
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (f32::from(a) * (1.0 - t) + f32::from(b) * t).round() as u8
}

/// SplitMix64 finalizer.
fn mix_bits(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
