//! Perspective camera for the sketch.

use glam::{Mat4, Vec3};

use crate::stages::CameraMatrices;

/// Perspective camera orbiting a target point.
///
/// The default frames the scene from 15 units out along +Z with a 30° vertical
/// field of view. Yaw and pitch stay fixed unless the host changes them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Point the camera looks at.
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Width over height of the render surface.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a camera with the sketch's default framing.
    pub fn new(aspect: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: 15.0,
            target: Vec3::ZERO,
            fov_y_degrees: 30.0,
            aspect: sanitize_aspect(aspect),
            near: 0.1,
            far: 100.0,
        }
    }

    /// Update the aspect ratio after a surface resize.
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = sanitize_aspect(width.max(1) as f32 / height.max(1) as f32);
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Calculate the view matrix for rendering.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Projection with a `[0, 1]` depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    /// Matrices for drawing an object with the given model transform.
    pub fn matrices(&self, model: Mat4) -> CameraMatrices {
        CameraMatrices {
            projection: self.projection_matrix(),
            model_view: self.view_matrix() * model,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::clip_to_trail_uv;
    use glam::Vec2;

    #[test]
    fn test_default_position() {
        let camera = Camera::new(1.0);
        assert!((camera.position() - Vec3::new(0.0, 0.0, 15.0)).length() < 1e-5);
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::new(1.5);
        let clip = camera.matrices(Mat4::IDENTITY).clip(Vec3::ZERO);
        let uv = clip_to_trail_uv(clip);
        assert!((uv - Vec2::splat(0.5)).abs().max_element() < 1e-5);
    }

    #[test]
    fn test_up_is_top_of_trail() {
        let camera = Camera::new(1.0);
        let clip = camera.matrices(Mat4::IDENTITY).clip(Vec3::new(0.0, 1.0, 0.0));
        assert!(clip_to_trail_uv(clip).y < 0.5);
    }

    #[test]
    fn test_set_aspect_guards_zero() {
        let mut camera = Camera::new(1.0);
        camera.set_aspect(800, 0);
        assert_eq!(camera.aspect, 800.0);
        camera.set_aspect(400, 200);
        assert_eq!(camera.aspect, 2.0);
        assert_eq!(Camera::new(f32::NAN).aspect, 1.0);
    }
}
