//! Mesh assets, per-mesh trail materials and the scene loader seam.
//!
//! A scene arrives as a [`SceneAsset`]: a list of textured triangle meshes
//! and one model transform. Installing it into the frame loop pairs each mesh
//! with its own [`TrailMaterial`].
//!
//! Loading is the only asynchronous step of the sketch. A [`SceneLoader`] is
//! polled once per frame until it hands back a result; [`ThreadedLoader`]
//! builds the scene on a worker thread.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::config::SketchConfig;
use crate::error::AssetError;
use crate::shader::mesh_shader;
use crate::stages::{ColorBlendStage, DisplacementStage};
use crate::texture::TextureConfig;

/// Interleaved vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    /// Buffer layout matching `@location(0) position, @location(1) uv`.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// A textured triangle mesh.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Triangle list, counter-clockwise front faces.
    pub indices: Vec<u32>,
    /// Source of levels 3-5 of the color blend.
    pub diffuse: Arc<TextureConfig>,
    /// Source of levels 0-2 of the color blend.
    pub emissive: Arc<TextureConfig>,
}

impl MeshAsset {
    /// Check that the vertex streams and indices agree.
    pub fn validate(&self) -> Result<(), AssetError> {
        let invalid = |reason: String| AssetError::InvalidMesh {
            mesh: self.name.clone(),
            reason,
        };
        if self.positions.is_empty() {
            return Err(invalid("no vertices".into()));
        }
        if self.uvs.len() != self.positions.len() {
            return Err(invalid(format!(
                "{} uvs for {} positions",
                self.uvs.len(),
                self.positions.len()
            )));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(invalid(format!(
                "index count {} is not a non-empty multiple of 3",
                self.indices.len()
            )));
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= self.positions.len()) {
            return Err(invalid(format!("index {} out of range", bad)));
        }
        if !self.positions.iter().all(|p| p.is_finite()) {
            return Err(invalid("non-finite position".into()));
        }
        Ok(())
    }

    /// Interleaved vertices for upload.
    pub fn vertices(&self) -> Vec<MeshVertex> {
        self.positions
            .iter()
            .zip(&self.uvs)
            .map(|(p, uv)| MeshVertex {
                position: p.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Everything the loader delivers.
#[derive(Debug, Clone)]
pub struct SceneAsset {
    pub meshes: Vec<MeshAsset>,
    /// Model transform applied to every mesh.
    pub transform: Mat4,
}

impl SceneAsset {
    /// Validate every mesh.
    pub fn validate(&self) -> Result<(), AssetError> {
        self.meshes.iter().try_for_each(MeshAsset::validate)
    }
}

/// Per-mesh material: both stages plus the two textures they read.
#[derive(Debug, Clone)]
pub struct TrailMaterial {
    pub displacement: DisplacementStage,
    pub color_blend: ColorBlendStage,
    pub diffuse: Arc<TextureConfig>,
    pub emissive: Arc<TextureConfig>,
}

impl TrailMaterial {
    /// Material for a mesh, referencing its textures.
    pub fn for_mesh(mesh: &MeshAsset, displacement: DisplacementStage, color_blend: ColorBlendStage) -> Self {
        Self {
            displacement,
            color_blend,
            diffuse: Arc::clone(&mesh.diffuse),
            emissive: Arc::clone(&mesh.emissive),
        }
    }

    /// WGSL module implementing this material.
    pub fn shader_source(&self) -> String {
        mesh_shader(&self.displacement, &self.color_blend)
    }
}

/// A mesh ready to draw.
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub mesh: Arc<MeshAsset>,
    pub material: TrailMaterial,
}

/// Grid mesh with a rolling relief along local +Z.
///
/// `cols` x `rows` quads span `size` in X/Y, centered on the origin. The
/// relief height reaches `depth`; the displacement stage flattens it
/// wherever the trail is dark.
pub fn relief_mesh(
    name: &str,
    cols: u32,
    rows: u32,
    size: Vec2,
    depth: f32,
    diffuse: Arc<TextureConfig>,
    emissive: Arc<TextureConfig>,
) -> MeshAsset {
    let cols = cols.max(1);
    let rows = rows.max(1);
    let mut positions = Vec::with_capacity(((cols + 1) * (rows + 1)) as usize);
    let mut uvs = Vec::with_capacity(positions.capacity());

    for j in 0..=rows {
        let v = j as f32 / rows as f32;
        for i in 0..=cols {
            let u = i as f32 / cols as f32;
            let x = (u - 0.5) * size.x;
            let y = (0.5 - v) * size.y;
            positions.push(Vec3::new(x, y, depth * relief_height(u, v)));
            uvs.push(Vec2::new(u, v));
        }
    }

    let stride = cols + 1;
    let mut indices = Vec::with_capacity((cols * rows * 6) as usize);
    for j in 0..rows {
        for i in 0..cols {
            let a = j * stride + i;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            // Row j is above row j + 1, so a-c-b winds counter-clockwise.
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    MeshAsset {
        name: name.to_string(),
        positions,
        uvs,
        indices,
        diffuse,
        emissive,
    }
}

/// Height in `[0, 1]`: ripples fading toward the border.
fn relief_height(u: f32, v: f32) -> f32 {
    use std::f32::consts::PI;
    let ripple = 0.5 + 0.5 * (u * 6.0 * PI).sin() * (v * 4.0 * PI).cos();
    let border = (u * PI).sin() * (v * PI).sin();
    ripple * border
}

/// Supplies a scene to the frame loop.
pub trait SceneLoader {
    /// `None` while still loading. A result is delivered exactly once.
    fn poll(&mut self) -> Option<Result<SceneAsset, AssetError>>;
}

/// Runs a builder closure on a worker thread.
pub struct ThreadedLoader {
    rx: Option<Receiver<Result<SceneAsset, AssetError>>>,
    spawn_error: Option<AssetError>,
}

impl ThreadedLoader {
    /// Start building a scene in the background.
    pub fn spawn<F>(build: F) -> Self
    where
        F: FnOnce() -> Result<SceneAsset, AssetError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("scene-loader".into())
            .spawn(move || {
                let result = build().and_then(|scene| scene.validate().map(|_| scene));
                // The receiver may already be gone if the sketch exited.
                let _ = tx.send(result);
            });
        match spawned {
            Ok(_) => Self {
                rx: Some(rx),
                spawn_error: None,
            },
            Err(e) => Self {
                rx: None,
                spawn_error: Some(AssetError::Io(e)),
            },
        }
    }
}

impl SceneLoader for ThreadedLoader {
    fn poll(&mut self) -> Option<Result<SceneAsset, AssetError>> {
        if let Some(e) = self.spawn_error.take() {
            return Some(Err(e));
        }
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Some(Err(AssetError::LoaderDisconnected))
            }
        }
    }
}

/// Delivers a ready-made result on the first poll.
#[derive(Debug)]
pub struct ImmediateLoader(Option<Result<SceneAsset, AssetError>>);

impl ImmediateLoader {
    pub fn new(result: Result<SceneAsset, AssetError>) -> Self {
        Self(Some(result.and_then(|scene| scene.validate().map(|_| scene))))
    }
}

impl SceneLoader for ImmediateLoader {
    fn poll(&mut self) -> Option<Result<SceneAsset, AssetError>> {
        self.0.take()
    }
}

fn load_or(path: Option<&std::path::Path>, fallback: impl FnOnce() -> TextureConfig) -> Result<TextureConfig, AssetError> {
    match path {
        Some(path) => TextureConfig::from_file(path),
        None => Ok(fallback()),
    }
}

/// The sketch's scene: one relief mesh with configured or generated textures.
pub fn default_scene(config: &SketchConfig) -> Result<SceneAsset, AssetError> {
    let diffuse = load_or(config.diffuse.as_deref(), || TextureConfig::noise(256, 7))?;
    let emissive = load_or(config.emissive.as_deref(), || {
        TextureConfig::gradient(4, 256, [40, 70, 90, 255], [90, 40, 20, 255])
    })?;
    let res = config.mesh_resolution.max(1);
    let mesh = relief_mesh(
        "relief",
        res,
        res,
        Vec2::new(6.0, 6.0),
        1.5,
        Arc::new(diffuse),
        Arc::new(emissive),
    );
    Ok(SceneAsset {
        meshes: vec![mesh],
        transform: Mat4::from_translation(Vec3::from_array(config.model_offset)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn white() -> Arc<TextureConfig> {
        Arc::new(TextureConfig::solid(255, 255, 255, 255))
    }

    fn quad() -> MeshAsset {
        relief_mesh("quad", 1, 1, Vec2::ONE, 0.0, white(), white())
    }

    fn wait(loader: &mut impl SceneLoader) -> Result<SceneAsset, AssetError> {
        let start = Instant::now();
        loop {
            if let Some(result) = loader.poll() {
                return result;
            }
            assert!(start.elapsed() < Duration::from_secs(5), "loader timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_relief_mesh_counts() {
        let mesh = relief_mesh("m", 4, 3, Vec2::new(2.0, 1.0), 1.0, white(), white());
        assert_eq!(mesh.positions.len(), 5 * 4);
        assert_eq!(mesh.triangle_count(), 4 * 3 * 2);
        assert!(mesh.validate().is_ok());
        // Border vertices sit flat.
        assert_eq!(mesh.positions[0].z, 0.0);
        assert_eq!(mesh.positions[0].truncate(), Vec2::new(-1.0, 0.5));
    }

    #[test]
    fn test_relief_winding_faces_camera() {
        let mesh = quad();
        let p = |i: u32| mesh.positions[i as usize];
        let (a, b, c) = (p(mesh.indices[0]), p(mesh.indices[1]), p(mesh.indices[2]));
        assert!((b - a).cross(c - a).z > 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let mut mesh = quad();
        mesh.indices.push(99);
        assert!(mesh.validate().is_err());
        mesh.indices.extend_from_slice(&[0, 0]);
        assert!(matches!(mesh.validate(), Err(AssetError::InvalidMesh { .. })));

        let mut mesh = quad();
        mesh.uvs.pop();
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_vertices_interleave() {
        let mesh = quad();
        let verts = mesh.vertices();
        assert_eq!(verts.len(), 4);
        assert_eq!(verts[3].uv, [1.0, 1.0]);
        assert_eq!(std::mem::size_of::<MeshVertex>(), 20);
    }

    #[test]
    fn test_material_shares_textures() {
        let mesh = quad();
        let material = TrailMaterial::for_mesh(&mesh, DisplacementStage::default(), ColorBlendStage::default());
        assert!(Arc::ptr_eq(&material.diffuse, &mesh.diffuse));
        assert!(material.shader_source().contains("fn vs_main("));
    }

    #[test]
    fn test_threaded_loader_delivers_once() {
        let mut loader = ThreadedLoader::spawn(|| {
            Ok(SceneAsset {
                meshes: vec![quad()],
                transform: Mat4::IDENTITY,
            })
        });
        let scene = wait(&mut loader).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert!(loader.poll().is_none());
    }

    #[test]
    fn test_threaded_loader_reports_error() {
        let mut loader = ThreadedLoader::spawn(|| Err(AssetError::InvalidTexture("broken".into())));
        assert!(matches!(wait(&mut loader), Err(AssetError::InvalidTexture(_))));
    }

    #[test]
    fn test_threaded_loader_validates() {
        let mut loader = ThreadedLoader::spawn(|| {
            let mut mesh = quad();
            mesh.indices.clear();
            Ok(SceneAsset {
                meshes: vec![mesh],
                transform: Mat4::IDENTITY,
            })
        });
        assert!(matches!(wait(&mut loader), Err(AssetError::InvalidMesh { .. })));
    }

    #[test]
    fn test_threaded_loader_panic_is_disconnect() {
        let mut loader = ThreadedLoader::spawn(|| panic!("loader exploded"));
        assert!(matches!(wait(&mut loader), Err(AssetError::LoaderDisconnected)));
    }

    #[test]
    fn test_default_scene() {
        let config = SketchConfig {
            mesh_resolution: 8,
            model_offset: [0.0, 2.0, 0.0],
            ..Default::default()
        };
        let scene = default_scene(&config).unwrap();
        assert!(scene.validate().is_ok());
        assert_eq!(scene.transform.w_axis.y, 2.0);
    }

    #[test]
    fn test_default_scene_missing_texture() {
        let config = SketchConfig {
            diffuse: Some("/definitely/not/here.png".into()),
            ..Default::default()
        };
        assert!(default_scene(&config).is_err());
    }
}
