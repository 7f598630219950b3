//! WGSL generation for the trail material.
//!
//! Each stage renders itself to a WGSL function the same way the Rust
//! reference in [`crate::stages`] computes it. [`mesh_shader`] assembles
//! the full vertex + fragment module.
//!
//! Bindings:
//!
//! | Group | Binding | Resource |
//! |-------|---------|----------|
//! | 0 | 0 | `uniforms` (model-view, projection, viewport) |
//! | 0 | 1 | `trail_tex` (R8 trail mirror) |
//! | 0 | 2 | `trail_sampler` |
//! | 1 | 0 | `diffuse_tex` |
//! | 1 | 1 | `diffuse_sampler` |
//! | 1 | 2 | `emissive_tex` |
//! | 1 | 3 | `emissive_sampler` |

use crate::stages::{ColorBlendStage, DisplacementStage, LEVEL_COUNT};

/// Channel expression for each blend level, in level order.
const LEVEL_SOURCES: [&str; LEVEL_COUNT] = [
    "emissive.b",
    "emissive.g",
    "emissive.r",
    "diffuse.b",
    "diffuse.g",
    "diffuse.r",
];

/// Format an `f32` as a WGSL float literal.
pub fn wgsl_float(v: f32) -> String {
    format!("{:?}", v)
}

/// Shared bindings and the screen-space UV helpers.
pub const COMMON_WGSL: &str = r#"struct Uniforms {
    model_view: mat4x4<f32>,
    projection: mat4x4<f32>,
    viewport: vec2<f32>,
    _padding: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
@group(0) @binding(1)
var trail_tex: texture_2d<f32>;
@group(0) @binding(2)
var trail_sampler: sampler;

@group(1) @binding(0)
var diffuse_tex: texture_2d<f32>;
@group(1) @binding(1)
var diffuse_sampler: sampler;
@group(1) @binding(2)
var emissive_tex: texture_2d<f32>;
@group(1) @binding(3)
var emissive_sampler: sampler;

fn clip_to_trail_uv(clip: vec4<f32>) -> vec2<f32> {
    let ndc = clip.xy / clip.w;
    var uv = (ndc + vec2<f32>(1.0)) / 2.0;
    uv.y = 1.0 - uv.y;
    return uv;
}

fn frag_coord_to_trail_uv(frag_coord: vec2<f32>) -> vec2<f32> {
    return frag_coord / max(uniforms.viewport, vec2<f32>(1.0));
}

fn sample_trail(uv: vec2<f32>) -> f32 {
    return textureSampleLevel(trail_tex, trail_sampler, uv, 0.0).r;
}
"#;

impl DisplacementStage {
    /// `fn displace(position, intensity) -> vec3<f32>`.
    pub fn to_wgsl(&self) -> String {
        format!(
            r#"fn displace(position: vec3<f32>, intensity: f32) -> vec3<f32> {{
    var p = position;
    p.z = p.z * mix({min_scale}, 1.0, intensity);
    return p;
}}
"#,
            min_scale = wgsl_float(self.min_scale)
        )
    }
}

impl ColorBlendStage {
    /// `fn color_ramp(diffuse, emissive, intensity) -> f32`.
    pub fn to_wgsl(&self) -> String {
        let steps: String = LEVEL_SOURCES[1..]
            .iter()
            .zip(&self.bands)
            .map(|(source, (low, high))| {
                format!(
                    "    value = mix(value, {source}, smoothstep({}, {}, intensity));\n",
                    wgsl_float(*low),
                    wgsl_float(*high)
                )
            })
            .collect();

        format!(
            r#"fn color_ramp(diffuse: vec3<f32>, emissive: vec3<f32>, intensity: f32) -> f32 {{
    var value = {first};
{steps}    return value;
}}
"#,
            first = LEVEL_SOURCES[0]
        )
    }
}

/// Full render module for one material.
pub fn mesh_shader(displacement: &DisplacementStage, color_blend: &ColorBlendStage) -> String {
    let displace_fn = displacement.to_wgsl();
    let ramp_fn = color_blend.to_wgsl();

    format!(
        r#"{COMMON_WGSL}
{displace_fn}
{ramp_fn}
struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}};

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
) -> VertexOutput {{
    let mvp = uniforms.projection * uniforms.model_view;
    let intensity = sample_trail(clip_to_trail_uv(mvp * vec4<f32>(position, 1.0)));
    let displaced = displace(position, intensity);

    var out: VertexOutput;
    out.clip_position = mvp * vec4<f32>(displaced, 1.0);
    out.uv = uv;
    return out;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    let diffuse = textureSample(diffuse_tex, diffuse_sampler, in.uv).rgb;
    let emissive = textureSample(emissive_tex, emissive_sampler, in.uv).rgb;
    let intensity = sample_trail(frag_coord_to_trail_uv(in.clip_position.xy));
    let value = color_ramp(diffuse, emissive, intensity);
    return vec4<f32>(vec3<f32>(value), 1.0);
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgsl_float_keeps_decimal_point() {
        assert_eq!(wgsl_float(1.0), "1.0");
        assert_eq!(wgsl_float(0.03), "0.03");
        assert_eq!(wgsl_float(0.0), "0.0");
    }

    #[test]
    fn test_displacement_wgsl_uses_min_scale() {
        let code = DisplacementStage::new(0.25).to_wgsl();
        assert!(code.contains("fn displace("));
        assert!(code.contains("mix(0.25, 1.0, intensity)"));
    }

    #[test]
    fn test_color_ramp_level_order() {
        let code = ColorBlendStage::default().to_wgsl();
        assert!(code.contains("var value = emissive.b;"));
        let order = ["emissive.g", "emissive.r", "diffuse.b", "diffuse.g", "diffuse.r"];
        let mut last = 0;
        for source in order {
            let at = code.find(&format!("mix(value, {source},")).expect(source);
            assert!(at > last);
            last = at;
        }
        assert!(code.contains("smoothstep(0.8, 1.0, intensity)"));
    }

    #[test]
    fn test_mesh_shader_entry_points() {
        let code = mesh_shader(&DisplacementStage::default(), &ColorBlendStage::default());
        assert!(code.contains("fn vs_main("));
        assert!(code.contains("fn fs_main("));
        assert!(code.contains("fn clip_to_trail_uv("));
        assert!(code.contains("fn color_ramp("));
    }
}
