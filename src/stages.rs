//! Displacement and color-blend stages.
//!
//! Both stages read the trail in normalized screen space. The vertex side
//! derives its UV from the clip-space position ([`clip_to_trail_uv`]); the
//! fragment side derives it from the framebuffer coordinate
//! ([`frag_coord_to_trail_uv`]). The two must agree for the same point or
//! displacement and color drift apart as the camera moves.
//!
//! The functions here are the reference definitions. The WGSL emitted by
//! [`crate::shader`] mirrors them line for line, and the software backend
//! calls them directly.

use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::trail::TrailBuffer;

/// Depth scale of a vertex with zero trail intensity.
pub const MIN_SCALE: f32 = 0.03;

/// Number of color levels fed to the blend stage.
pub const LEVEL_COUNT: usize = 6;

/// Smoothstep bands `(low, high)` for levels 1 through 5.
pub const BLEND_BANDS: [(f32, f32); LEVEL_COUNT - 1] =
    [(0.0, 0.2), (0.2, 0.4), (0.4, 0.6), (0.6, 0.8), (0.8, 1.0)];

/// Anything the stages can read trail intensity from.
pub trait TrailSampler {
    /// Intensity at normalized `uv` (top-left origin).
    fn sample(&self, uv: Vec2) -> f32;
}

impl TrailSampler for TrailBuffer {
    fn sample(&self, uv: Vec2) -> f32 {
        TrailBuffer::sample(self, uv)
    }
}

impl<F: Fn(Vec2) -> f32> TrailSampler for F {
    fn sample(&self, uv: Vec2) -> f32 {
        self(uv)
    }
}

/// Projection and model-view matrices for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub projection: Mat4,
    pub model_view: Mat4,
}

impl CameraMatrices {
    /// Identity projection and model-view.
    pub const IDENTITY: Self = Self {
        projection: Mat4::IDENTITY,
        model_view: Mat4::IDENTITY,
    };

    /// Clip-space position of a local-space point.
    #[inline]
    pub fn clip(&self, local: Vec3) -> Vec4 {
        self.projection * self.model_view * local.extend(1.0)
    }
}

/// Clip position to trail UV: perspective divide, remap `[-1, 1]` to
/// `[0, 1]`, then flip Y for the buffer's top-left origin.
#[inline]
pub fn clip_to_trail_uv(clip: Vec4) -> Vec2 {
    let ndc = clip.xy() / safe_w(clip.w);
    let mut uv = (ndc + 1.0) / 2.0;
    uv.y = 1.0 - uv.y;
    uv
}

/// Clip position to framebuffer pixel coordinates (origin top-left).
#[inline]
pub fn clip_to_frag_coord(clip: Vec4, viewport: Vec2) -> Vec2 {
    let ndc = clip.xy() / safe_w(clip.w);
    Vec2::new((ndc.x + 1.0) * 0.5 * viewport.x, (1.0 - ndc.y) * 0.5 * viewport.y)
}

/// Framebuffer pixel coordinates to trail UV.
#[inline]
pub fn frag_coord_to_trail_uv(frag_coord: Vec2, viewport: Vec2) -> Vec2 {
    frag_coord / viewport.max(Vec2::ONE)
}

fn safe_w(w: f32) -> f32 {
    if w.abs() < f32::EPSILON {
        f32::EPSILON
    } else {
        w
    }
}

/// Hermite smoothstep, `0` below `low`, `1` above `high`.
#[inline]
pub fn smoothstep(low: f32, high: f32, x: f32) -> f32 {
    if high <= low {
        return if x < low { 0.0 } else { 1.0 };
    }
    let t = ((x - low) / (high - low)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Linear blend, exact at `t = 0` and `t = 1`.
#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Result of running the displacement stage on one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displaced {
    /// Displaced local-space position.
    pub position: Vec3,
    /// Trail UV of the undisplaced vertex.
    pub trail_uv: Vec2,
    /// Trail intensity sampled at `trail_uv`.
    pub intensity: f32,
}

/// Scales each vertex's local depth by the trail intensity under it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacementStage {
    /// Depth scale at zero intensity.
    pub min_scale: f32,
}

impl Default for DisplacementStage {
    fn default() -> Self {
        Self {
            min_scale: MIN_SCALE,
        }
    }
}

impl DisplacementStage {
    /// Create a stage with a custom rest scale.
    pub fn new(min_scale: f32) -> Self {
        Self {
            min_scale: if min_scale.is_finite() { min_scale.clamp(0.0, 1.0) } else { MIN_SCALE },
        }
    }

    /// Depth scale for a given intensity.
    #[inline]
    pub fn depth_scale(&self, intensity: f32) -> f32 {
        mix(self.min_scale, 1.0, intensity)
    }

    /// Scale `vertex.z` for a given intensity.
    #[inline]
    pub fn displace(&self, vertex: Vec3, intensity: f32) -> Vec3 {
        Vec3::new(vertex.x, vertex.y, vertex.z * self.depth_scale(intensity))
    }

    /// Project, sample the trail under the vertex, displace.
    pub fn apply(&self, vertex: Vec3, camera: &CameraMatrices, trail: &impl TrailSampler) -> Displaced {
        let trail_uv = clip_to_trail_uv(camera.clip(vertex));
        let intensity = trail.sample(trail_uv);
        Displaced {
            position: self.displace(vertex, intensity),
            trail_uv,
            intensity,
        }
    }
}

/// Blends six ordered levels by trail intensity through smoothstep bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBlendStage {
    pub bands: [(f32, f32); LEVEL_COUNT - 1],
}

impl Default for ColorBlendStage {
    fn default() -> Self {
        Self { bands: BLEND_BANDS }
    }
}

impl ColorBlendStage {
    /// Blend levels into a single scalar.
    pub fn blend_scalar(&self, levels: &[f32; LEVEL_COUNT], intensity: f32) -> f32 {
        let mut value = levels[0];
        for (level, &(low, high)) in levels[1..].iter().zip(&self.bands) {
            value = mix(value, *level, smoothstep(low, high, intensity));
        }
        value
    }

    /// Blend levels into an opaque grey color.
    pub fn blend(&self, levels: &[f32; LEVEL_COUNT], intensity: f32) -> Vec4 {
        let v = self.blend_scalar(levels, intensity);
        Vec4::new(v, v, v, 1.0)
    }

    /// Full fragment: screen UV from the frag coord, trail sample, levels from
    /// the two texels, blend.
    pub fn shade(
        &self,
        frag_coord: Vec2,
        viewport: Vec2,
        diffuse: Vec4,
        emissive: Vec4,
        trail: &impl TrailSampler,
    ) -> Vec4 {
        let intensity = trail.sample(frag_coord_to_trail_uv(frag_coord, viewport));
        self.blend(&levels_from_texels(diffuse, emissive), intensity)
    }
}

/// Channel order of the blend levels: emissive b, g, r, then diffuse b, g, r.
pub fn levels_from_texels(diffuse: Vec4, emissive: Vec4) -> [f32; LEVEL_COUNT] {
    [emissive.z, emissive.y, emissive.x, diffuse.z, diffuse.y, diffuse.x]
}

/// Displace a vertex with the default stage.
pub fn compute_displaced_position(vertex: Vec3, camera: &CameraMatrices, trail: &impl TrailSampler) -> Vec3 {
    DisplacementStage::default().apply(vertex, camera, trail).position
}

/// Blend six levels with the default bands.
pub fn compute_blended_color(levels: &[f32; LEVEL_COUNT], intensity: f32) -> Vec4 {
    ColorBlendStage::default().blend(levels, intensity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const LEVELS: [f32; LEVEL_COUNT] = [0.05, 0.2, 0.35, 0.6, 0.8, 0.95];

    #[test]
    fn test_origin_maps_to_center() {
        let clip = CameraMatrices::IDENTITY.clip(Vec3::ZERO);
        assert_eq!(clip_to_trail_uv(clip), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn test_uv_flips_vertical() {
        // NDC top-left corner is trail UV (0, 0).
        let uv = clip_to_trail_uv(Vec4::new(-1.0, 1.0, 0.0, 1.0));
        assert_eq!(uv, Vec2::new(0.0, 0.0));
        let uv = clip_to_trail_uv(Vec4::new(2.0, -2.0, 0.0, 2.0));
        assert_eq!(uv, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_vertex_and_fragment_uv_agree() {
        let mut rng = StdRng::seed_from_u64(7);
        let viewport = Vec2::new(1280.0, 720.0);
        for _ in 0..500 {
            let eye = Vec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(5.0..20.0),
            );
            let camera = CameraMatrices {
                projection: Mat4::perspective_rh(
                    rng.gen_range(20.0f32..90.0).to_radians(),
                    viewport.x / viewport.y,
                    0.1,
                    100.0,
                ),
                model_view: Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y)
                    * Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)),
            };
            let vertex = Vec3::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
            );
            let clip = camera.clip(vertex);
            if clip.w < 0.1 {
                continue;
            }
            let vertex_uv = clip_to_trail_uv(clip);
            let fragment_uv = frag_coord_to_trail_uv(clip_to_frag_coord(clip, viewport), viewport);
            let tolerance = 1e-5 * vertex_uv.abs().max_element().max(1.0);
            assert!(
                (vertex_uv - fragment_uv).abs().max_element() < tolerance,
                "{:?} vs {:?}",
                vertex_uv,
                fragment_uv
            );
        }
    }

    #[test]
    fn test_displacement_scales_depth_only() {
        let stage = DisplacementStage::default();
        let v = Vec3::new(1.0, -2.0, 4.0);
        assert_eq!(stage.displace(v, 0.0), Vec3::new(1.0, -2.0, 4.0 * MIN_SCALE));
        assert_eq!(stage.displace(v, 1.0), v);
        let half = stage.displace(v, 0.5);
        assert!((half.z - 4.0 * (MIN_SCALE + 1.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_displacement_samples_under_vertex() {
        let trail = |uv: Vec2| -> f32 { if uv.x > 0.5 { 1.0 } else { 0.0 } };
        let camera = CameraMatrices::IDENTITY;
        let right = compute_displaced_position(Vec3::new(0.5, 0.0, 2.0), &camera, &trail);
        let left = compute_displaced_position(Vec3::new(-0.5, 0.0, 2.0), &camera, &trail);
        assert_eq!(right.z, 2.0);
        assert!((left.z - 2.0 * MIN_SCALE).abs() < 1e-6);
    }

    #[test]
    fn test_blend_endpoints_exact() {
        assert_eq!(compute_blended_color(&LEVELS, 0.0), Vec4::new(0.05, 0.05, 0.05, 1.0));
        assert_eq!(compute_blended_color(&LEVELS, 1.0), Vec4::new(0.95, 0.95, 0.95, 1.0));
    }

    #[test]
    fn test_blend_midpoint_between_levels_2_and_3() {
        let stage = ColorBlendStage::default();
        let v = stage.blend_scalar(&LEVELS, 0.5);
        assert!(v > LEVELS[2] && v < LEVELS[3]);
        assert!((v - (LEVELS[2] + LEVELS[3]) / 2.0).abs() < 1e-6);

        // Perturbing level 0 or level 5 has no effect at the midpoint.
        let mut other = LEVELS;
        other[0] = 100.0;
        other[5] = -100.0;
        assert_eq!(stage.blend_scalar(&other, 0.5), v);
    }

    #[test]
    fn test_blend_continuous_at_band_edges() {
        let stage = ColorBlendStage::default();
        for &(low, _) in &BLEND_BANDS[1..] {
            let below = stage.blend_scalar(&LEVELS, low - 1e-4);
            let above = stage.blend_scalar(&LEVELS, low + 1e-4);
            assert!((below - above).abs() < 1e-3);
        }
    }

    #[test]
    fn test_blend_monotonic_for_sorted_levels() {
        let stage = ColorBlendStage::default();
        let mut last = stage.blend_scalar(&LEVELS, 0.0);
        for i in 1..=200 {
            let v = stage.blend_scalar(&LEVELS, i as f32 / 200.0);
            assert!(v >= last - 1e-6);
            last = v;
        }
    }

    #[test]
    fn test_level_order() {
        let diffuse = Vec4::new(0.1, 0.2, 0.3, 1.0);
        let emissive = Vec4::new(0.4, 0.5, 0.6, 1.0);
        assert_eq!(levels_from_texels(diffuse, emissive), [0.6, 0.5, 0.4, 0.3, 0.2, 0.1]);
    }

    #[test]
    fn test_shade_uses_fragment_uv() {
        let stage = ColorBlendStage::default();
        let trail = |uv: Vec2| -> f32 { if uv.y < 0.5 { 1.0 } else { 0.0 } };
        let diffuse = Vec4::new(0.9, 0.0, 0.0, 1.0);
        let emissive = Vec4::new(0.0, 0.0, 0.1, 1.0);
        let viewport = Vec2::new(100.0, 100.0);
        let top = stage.shade(Vec2::new(50.0, 10.0), viewport, diffuse, emissive, &trail);
        let bottom = stage.shade(Vec2::new(50.0, 90.0), viewport, diffuse, emissive, &trail);
        assert_eq!(top.x, 0.9);
        assert_eq!(bottom.x, 0.1);
    }

    #[test]
    fn test_smoothstep() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
        assert_eq!(smoothstep(0.3, 0.3, 0.2), 0.0);
        assert_eq!(smoothstep(0.3, 0.3, 0.3), 1.0);
    }
}
