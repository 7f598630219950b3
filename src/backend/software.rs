//! CPU rasterizer.
//!
//! Draws the same frame the GPU pipeline draws, by running the stage
//! functions per vertex and per pixel. Slow, but available everywhere and
//! exact enough to test against.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
use image::{Rgba, RgbaImage};

use super::{Frame, RenderBackend};
use crate::error::RenderError;
use crate::mesh::MeshInstance;
use crate::texture::linear_to_srgb;

/// Vertices closer than this to the eye plane are not rasterized.
const MIN_CLIP_W: f32 = 1.0e-4;

/// A vertex after displacement and projection.
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    /// Pixel position, origin top-left.
    pos: Vec2,
    /// Depth in `[0, 1]`.
    depth: f32,
    inv_w: f32,
    /// Texture UV divided by clip w, for perspective-correct interpolation.
    uv_over_w: Vec2,
    visible: bool,
}

/// Renders into an [`RgbaImage`] with a float depth buffer.
pub struct SoftwareBackend {
    color: RgbaImage,
    depth: Vec<f32>,
    triangles_drawn: usize,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            color: RgbaImage::new(width, height),
            depth: vec![f32::INFINITY; (width * height) as usize],
            triangles_drawn: 0,
        }
    }

    /// The color buffer.
    pub fn image(&self) -> &RgbaImage {
        &self.color
    }

    /// Triangles that covered at least one pixel in the last frame.
    pub fn triangles_drawn(&self) -> usize {
        self.triangles_drawn
    }

    fn clear(&mut self, clear_color: [f32; 3]) {
        let [r, g, b] = clear_color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        let px = Rgba([r, g, b, 255]);
        self.color.pixels_mut().for_each(|p| *p = px);
        self.depth.fill(f32::INFINITY);
    }

    fn draw_instance(&mut self, instance: &MeshInstance, frame: &Frame<'_>) {
        let (width, height) = self.color.dimensions();
        let target = Vec2::new(width as f32, height as f32);
        let mesh = &instance.mesh;
        let material = &instance.material;

        let vertices: Vec<ScreenVertex> = mesh
            .positions
            .iter()
            .zip(&mesh.uvs)
            .map(|(&position, &uv)| {
                let displaced = material.displacement.apply(position, &frame.matrices, frame.trail);
                project(frame.matrices.clip(displaced.position), uv, target)
            })
            .collect();

        for tri in mesh.indices.chunks_exact(3) {
            let v = [
                vertices[tri[0] as usize],
                vertices[tri[1] as usize],
                vertices[tri[2] as usize],
            ];
            if !v.iter().all(|v| v.visible) {
                continue;
            }
            if self.raster_triangle(&v, instance, frame) {
                self.triangles_drawn += 1;
            }
        }
    }

    /// Fill one triangle. Returns whether any pixel was written.
    fn raster_triangle(&mut self, v: &[ScreenVertex; 3], instance: &MeshInstance, frame: &Frame<'_>) -> bool {
        let (width, height) = self.color.dimensions();
        let area = edge(v[0].pos, v[1].pos, v[2].pos);
        if area.abs() < f32::EPSILON {
            return false;
        }

        let min = v[0].pos.min(v[1].pos).min(v[2].pos).floor().max(Vec2::ZERO);
        let max = v[0].pos.max(v[1].pos).max(v[2].pos).ceil();
        let x0 = min.x as u32;
        let y0 = min.y as u32;
        let x1 = (max.x.max(0.0) as u32).min(width);
        let y1 = (max.y.max(0.0) as u32).min(height);

        let material = &instance.material;
        let mut wrote = false;
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b = Vec3::new(
                    edge(v[1].pos, v[2].pos, p),
                    edge(v[2].pos, v[0].pos, p),
                    edge(v[0].pos, v[1].pos, p),
                ) / area;
                if b.min_element() < 0.0 {
                    continue;
                }

                let depth = b.x * v[0].depth + b.y * v[1].depth + b.z * v[2].depth;
                let i = (y * width + x) as usize;
                if !(0.0..=1.0).contains(&depth) || depth >= self.depth[i] {
                    continue;
                }

                let inv_w = b.x * v[0].inv_w + b.y * v[1].inv_w + b.z * v[2].inv_w;
                let uv = (v[0].uv_over_w * b.x + v[1].uv_over_w * b.y + v[2].uv_over_w * b.z) / inv_w;

                let diffuse = material.diffuse.sample(uv);
                let emissive = material.emissive.sample(uv);
                let color = material
                    .color_blend
                    .shade(p, frame.viewport, diffuse, emissive, frame.trail);

                self.depth[i] = depth;
                self.color.put_pixel(x, y, encode(color));
                wrote = true;
            }
        }
        wrote
    }
}

fn project(clip: Vec4, uv: Vec2, target: Vec2) -> ScreenVertex {
    if clip.w < MIN_CLIP_W || !clip.is_finite() {
        return ScreenVertex {
            pos: Vec2::ZERO,
            depth: 0.0,
            inv_w: 0.0,
            uv_over_w: Vec2::ZERO,
            visible: false,
        };
    }
    let inv_w = 1.0 / clip.w;
    let ndc = clip.xyz() * inv_w;
    ScreenVertex {
        pos: Vec2::new((ndc.x + 1.0) * 0.5 * target.x, (1.0 - ndc.y) * 0.5 * target.y),
        depth: ndc.z,
        inv_w,
        uv_over_w: uv * inv_w,
        visible: true,
    }
}

/// Twice the signed area of `(a, b, p)`.
#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn encode(color: Vec4) -> Rgba<u8> {
    Rgba([
        linear_to_srgb(color.x),
        linear_to_srgb(color.y),
        linear_to_srgb(color.z),
        (color.w.clamp(0.0, 1.0) * 255.0).round() as u8,
    ])
}

impl RenderBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn size(&self) -> (u32, u32) {
        self.color.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) != self.color.dimensions() {
            log::debug!("Software target resized to {}x{}", width, height);
            self.color = RgbaImage::new(width, height);
            self.depth = vec![f32::INFINITY; (width * height) as usize];
        }
    }

    fn install_scene(&mut self, scene: &[MeshInstance]) {
        let triangles: usize = scene.iter().map(|m| m.mesh.triangle_count()).sum();
        log::debug!(
            "Software backend drawing {} meshes, {} triangles",
            scene.len(),
            triangles
        );
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        self.clear(frame.clear_color);
        self.triangles_drawn = 0;
        for instance in frame.scene {
            self.draw_instance(instance, frame);
        }
        Ok(())
    }

    fn capture(&self) -> Option<RgbaImage> {
        Some(self.color.clone())
    }
}
