//! The per-frame loop.
//!
//! Each [`FrameLoop::tick`]:
//!
//! 1. applies the most recent pending resize, if any;
//! 2. polls the scene loader while the loop is still idle;
//! 3. advances time and asks the driver for this frame's point;
//! 4. updates the trail and marks its GPU mirror stale;
//! 5. renders, clearing the stale flag once the backend accepted the frame.
//!
//! The loop is `Idle` (background only) until the loader delivers a scene,
//! then `Active` for good. A failed load is logged and leaves it idle.

use std::sync::Arc;

use glam::{Mat4, Vec2};
use image::RgbaImage;

use crate::backend::{Frame, RenderBackend};
use crate::camera::Camera;
use crate::config::SketchConfig;
use crate::driver::{FrameInfo, ImpulseDriver};
use crate::error::RenderError;
use crate::mesh::{MeshInstance, SceneLoader, TrailMaterial};
use crate::stages::{ColorBlendStage, DisplacementStage};
use crate::time::{Playhead, Time};
use crate::trail::TrailBuffer;

/// Whether a scene has been installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No meshes yet; frames show the background only.
    Idle,
    /// Meshes and materials installed.
    Active,
}

/// Owns all per-frame state of a running sketch.
pub struct FrameLoop {
    backend: Box<dyn RenderBackend>,
    driver: Box<dyn ImpulseDriver>,
    loader: Option<Box<dyn SceneLoader>>,
    state: LoopState,
    trail: TrailBuffer,
    trail_dirty: bool,
    config: SketchConfig,
    camera: Camera,
    model: Mat4,
    scene: Vec<MeshInstance>,
    displacement: DisplacementStage,
    color_blend: ColorBlendStage,
    clear_color: [f32; 3],
    time: Time,
    playhead: Playhead,
    pending_resize: Option<(u32, u32)>,
}

impl FrameLoop {
    /// Build a loop around a backend, driver and scene loader.
    ///
    /// The trail buffer and camera are sized to the backend's target.
    pub fn new(
        config: &SketchConfig,
        backend: Box<dyn RenderBackend>,
        mut driver: Box<dyn ImpulseDriver>,
        loader: Box<dyn SceneLoader>,
    ) -> Self {
        let config = config.sanitized();
        let (width, height) = backend.size();
        let (tw, th) = config.trail_size(width, height);
        let trail = TrailBuffer::new(tw, th)
            .with_decay(config.decay)
            .with_radius(config.trail_radius(tw))
            .with_blur(config.blur);
        driver.resize(Vec2::new(width as f32, height as f32), trail.size());

        log::info!(
            "Frame loop: {} backend, {} driver, surface {}x{}, trail {}x{}",
            backend.name(),
            driver.name(),
            width,
            height,
            tw,
            th
        );

        Self {
            backend,
            driver,
            loader: Some(loader),
            state: LoopState::Idle,
            trail,
            trail_dirty: true,
            camera: Camera::new(width as f32 / height as f32),
            model: Mat4::IDENTITY,
            scene: Vec::new(),
            displacement: DisplacementStage::new(config.min_scale),
            color_blend: ColorBlendStage::default(),
            clear_color: config.clear_color_srgb(),
            time: Time::new(),
            playhead: Playhead::new(config.loop_seconds),
            pending_resize: None,
            config,
        }
    }

    /// Replace the time source, e.g. with [`Time::fixed`] for export.
    pub fn with_time(mut self, time: Time) -> Self {
        self.time = time;
        self
    }

    /// Queue a resize for the start of the next tick. Later requests
    /// replace earlier ones.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some((width.max(1), height.max(1)));
    }

    /// Run one frame.
    pub fn tick(&mut self) -> Result<(), RenderError> {
        if let Some((width, height)) = self.pending_resize.take() {
            self.apply_resize(width, height);
        }

        self.poll_loader();

        let (elapsed, _) = self.time.update();
        let info = FrameInfo {
            phase: self.playhead.phase(elapsed),
            elapsed,
            frame: self.time.frame(),
        };
        let point = self.driver.next_point(&info);
        self.trail.update(point);
        self.trail_dirty = true;
        log::trace!("frame {} phase {:.3} point {:?}", info.frame, info.phase, point);

        let (width, height) = self.backend.size();
        let scene: &[MeshInstance] = match self.state {
            LoopState::Idle => &[],
            LoopState::Active => &self.scene,
        };
        let frame = Frame {
            trail: &self.trail,
            trail_dirty: self.trail_dirty,
            matrices: self.camera.matrices(self.model),
            viewport: Vec2::new(width as f32, height as f32),
            clear_color: self.clear_color,
            scene,
        };
        self.backend.render(&frame)?;
        self.trail_dirty = false;
        Ok(())
    }

    fn apply_resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
        let (width, height) = self.backend.size();
        let (tw, th) = self.config.trail_size(width, height);
        self.trail.resize(tw, th);
        self.trail.set_radius(self.config.trail_radius(tw));
        self.driver
            .resize(Vec2::new(width as f32, height as f32), self.trail.size());
        self.camera.set_aspect(width, height);
        self.trail_dirty = true;
        log::debug!("Resized to {}x{} (trail {}x{})", width, height, tw, th);
    }

    fn poll_loader(&mut self) {
        let Some(loader) = self.loader.as_mut() else {
            return;
        };
        match loader.poll() {
            None => {}
            Some(Ok(scene)) => {
                self.loader = None;
                self.model = scene.transform;
                self.scene = scene
                    .meshes
                    .into_iter()
                    .map(|mesh| {
                        let material = TrailMaterial::for_mesh(&mesh, self.displacement, self.color_blend);
                        MeshInstance {
                            mesh: Arc::new(mesh),
                            material,
                        }
                    })
                    .collect();
                self.backend.install_scene(&self.scene);
                self.state = LoopState::Active;
                log::info!("Scene installed: {} meshes", self.scene.len());
            }
            Some(Err(e)) => {
                self.loader = None;
                log::warn!("Scene failed to load, staying idle: {}", e);
            }
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn trail(&self) -> &TrailBuffer {
        &self.trail
    }

    /// Whether the trail changed since the last successful render.
    pub fn trail_dirty(&self) -> bool {
        self.trail_dirty
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    /// Recover the backend's target after a lost surface.
    pub fn reconfigure(&mut self) {
        self.backend.reconfigure();
    }

    /// The last rendered frame, if the backend can read it back.
    pub fn capture(&self) -> Option<RgbaImage> {
        self.backend.capture()
    }

    pub fn playhead(&self) -> Playhead {
        self.playhead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::OrbitDriver;
    use crate::error::AssetError;
    use crate::mesh::{relief_mesh, ImmediateLoader, SceneAsset};
    use crate::texture::TextureConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    struct Rendered {
        meshes: usize,
        viewport: Vec2,
        trail_size: (u32, u32),
        trail_dirty: bool,
    }

    #[derive(Default)]
    struct Record {
        frames: Vec<Rendered>,
        installs: usize,
        resizes: Vec<(u32, u32)>,
        fail_next: bool,
    }

    struct MockBackend {
        size: (u32, u32),
        record: Rc<RefCell<Record>>,
    }

    impl RenderBackend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width.max(1), height.max(1));
            self.record.borrow_mut().resizes.push(self.size);
        }

        fn install_scene(&mut self, _scene: &[MeshInstance]) {
            self.record.borrow_mut().installs += 1;
        }

        fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
            let mut record = self.record.borrow_mut();
            if std::mem::take(&mut record.fail_next) {
                return Err(RenderError::Surface(wgpu::SurfaceError::Lost));
            }
            record.frames.push(Rendered {
                meshes: frame.scene.len(),
                viewport: frame.viewport,
                trail_size: (frame.trail.width(), frame.trail.height()),
                trail_dirty: frame.trail_dirty,
            });
            Ok(())
        }

        fn capture(&self) -> Option<RgbaImage> {
            None
        }
    }

    struct NeverLoader;

    impl SceneLoader for NeverLoader {
        fn poll(&mut self) -> Option<Result<SceneAsset, AssetError>> {
            None
        }
    }

    fn scene() -> SceneAsset {
        let tex = Arc::new(TextureConfig::solid(200, 100, 50, 255));
        SceneAsset {
            meshes: vec![relief_mesh("m", 2, 2, Vec2::ONE, 0.5, tex.clone(), tex)],
            transform: Mat4::IDENTITY,
        }
    }

    fn frame_loop(loader: Box<dyn SceneLoader>) -> (FrameLoop, Rc<RefCell<Record>>) {
        let record = Rc::new(RefCell::new(Record::default()));
        let backend = MockBackend {
            size: (100, 50),
            record: Rc::clone(&record),
        };
        let config = SketchConfig::default();
        let driver = OrbitDriver::new(Vec2::ONE);
        let frame_loop = FrameLoop::new(&config, Box::new(backend), Box::new(driver), loader)
            .with_time(Time::fixed(1.0 / 60.0));
        (frame_loop, record)
    }

    #[test]
    fn test_idle_renders_background_only() {
        let (mut frame_loop, record) = frame_loop(Box::new(NeverLoader));
        for _ in 0..3 {
            frame_loop.tick().unwrap();
        }
        assert_eq!(frame_loop.state(), LoopState::Idle);
        let record = record.borrow();
        assert_eq!(record.frames.len(), 3);
        assert!(record.frames.iter().all(|f| f.meshes == 0));
        assert_eq!(record.installs, 0);
    }

    #[test]
    fn test_transitions_to_active_once() {
        let (mut frame_loop, record) = frame_loop(Box::new(ImmediateLoader::new(Ok(scene()))));
        frame_loop.tick().unwrap();
        assert_eq!(frame_loop.state(), LoopState::Active);
        frame_loop.tick().unwrap();
        frame_loop.tick().unwrap();

        let record = record.borrow();
        assert_eq!(record.installs, 1);
        assert!(record.frames.iter().all(|f| f.meshes == 1));
    }

    #[test]
    fn test_failed_load_stays_idle() {
        let failed = Err(AssetError::InvalidTexture("corrupt".into()));
        let (mut frame_loop, record) = frame_loop(Box::new(ImmediateLoader::new(failed)));
        for _ in 0..5 {
            frame_loop.tick().unwrap();
        }
        assert_eq!(frame_loop.state(), LoopState::Idle);
        assert_eq!(record.borrow().installs, 0);
    }

    #[test]
    fn test_resize_applies_at_next_tick() {
        let (mut frame_loop, record) = frame_loop(Box::new(NeverLoader));
        frame_loop.tick().unwrap();

        frame_loop.request_resize(300, 200);
        frame_loop.request_resize(64, 32);
        assert_eq!(frame_loop.backend().size(), (100, 50));
        assert_eq!(frame_loop.trail().width(), 100);

        frame_loop.tick().unwrap();
        let record = record.borrow();
        // Only the last request is applied.
        assert_eq!(record.resizes, vec![(64, 32)]);
        let last = record.frames.last().unwrap();
        assert_eq!(last.viewport, Vec2::new(64.0, 32.0));
        assert_eq!(last.trail_size, (64, 32));
        assert_eq!(frame_loop.camera().aspect, 2.0);
    }

    #[test]
    fn test_zero_resize_clamped() {
        let (mut frame_loop, _record) = frame_loop(Box::new(NeverLoader));
        frame_loop.request_resize(0, 0);
        frame_loop.tick().unwrap();
        assert_eq!(frame_loop.backend().size(), (1, 1));
        assert_eq!(frame_loop.trail().width(), 1);
    }

    #[test]
    fn test_render_error_keeps_trail_dirty() {
        let (mut frame_loop, record) = frame_loop(Box::new(NeverLoader));
        record.borrow_mut().fail_next = true;
        assert!(frame_loop.tick().is_err());
        assert!(frame_loop.trail_dirty());

        frame_loop.tick().unwrap();
        assert!(!frame_loop.trail_dirty());
        assert!(record.borrow().frames[0].trail_dirty);
    }

    #[test]
    fn test_orbit_paints_trail() {
        let (mut frame_loop, _record) = frame_loop(Box::new(NeverLoader));
        frame_loop.tick().unwrap();
        assert!(frame_loop.trail().max_value() > 0.3);
        assert_eq!(frame_loop.time().frame(), 1);
    }

    #[test]
    fn test_fixed_time_is_deterministic() {
        let (mut a, _) = frame_loop(Box::new(NeverLoader));
        let (mut b, _) = frame_loop(Box::new(NeverLoader));
        for _ in 0..20 {
            a.tick().unwrap();
            b.tick().unwrap();
        }
        assert_eq!(a.trail().raster(), b.trail().raster());
    }
}
