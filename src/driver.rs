//! Impulse drivers: where the trail is painted each frame.
//!
//! A driver turns "what happened this frame" into an optional point in trail
//! buffer pixel space. Two variants exist:
//!
//! - [`PointerDriver`] follows the live pointer through a [`PointerCell`]
//!   written by the window's input handler.
//! - [`OrbitDriver`] walks a circle parameterized by the playhead phase, so a
//!   given phase always paints the same spot.

use std::cell::Cell;
use std::f32::consts::TAU;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Per-frame timing handed to drivers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameInfo {
    /// Looping playhead phase in `[0, 1)`.
    pub phase: f32,
    /// Seconds since the sketch started.
    pub elapsed: f32,
    /// Frame counter.
    pub frame: u64,
}

/// Produces the impulse point for the current frame.
pub trait ImpulseDriver {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// The point to deposit this frame, in trail buffer pixels.
    fn next_point(&mut self, frame: &FrameInfo) -> Option<Vec2>;

    /// Called when the surface or trail buffer changes size.
    fn resize(&mut self, surface: Vec2, buffer: Vec2);
}

/// Which driver a sketch uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Animated circular path (deterministic).
    #[default]
    Orbit,
    /// Live mouse pointer.
    Pointer,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Orbit => write!(f, "orbit"),
            DriverKind::Pointer => write!(f, "pointer"),
        }
    }
}

impl FromStr for DriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orbit" => Ok(DriverKind::Orbit),
            "pointer" | "mouse" => Ok(DriverKind::Pointer),
            other => Err(format!("unknown driver '{}', expected 'orbit' or 'pointer'", other)),
        }
    }
}

/// Map a normalized device coordinate to pixels (NDC is y-up, pixels are y-down).
#[inline]
pub fn ndc_to_pixel(ndc: Vec2, size: Vec2) -> Vec2 {
    Vec2::new((ndc.x + 1.0) * 0.5 * size.x, (1.0 - ndc.y) * 0.5 * size.y)
}

/// Latest observed pointer position, shared between the input handler and
/// the frame loop on the same thread.
///
/// Writes overwrite; the frame loop reads once per frame.
#[derive(Debug, Clone, Default)]
pub struct PointerCell(Rc<Cell<Option<Vec2>>>);

impl PointerCell {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pointer position in surface pixels. Non-finite input is dropped.
    pub fn observe(&self, x: f32, y: f32) {
        let p = Vec2::new(x, y);
        if p.is_finite() {
            self.0.set(Some(p));
        }
    }

    /// Forget the last position.
    pub fn clear(&self) {
        self.0.set(None);
    }

    /// Last observed position, if any.
    pub fn latest(&self) -> Option<Vec2> {
        self.0.get()
    }
}

/// Follows the live pointer.
#[derive(Debug, Clone)]
pub struct PointerDriver {
    cell: PointerCell,
    scale: Vec2,
}

impl PointerDriver {
    /// Create a driver reading from `cell`.
    pub fn new(cell: PointerCell) -> Self {
        Self {
            cell,
            scale: Vec2::ONE,
        }
    }
}

impl ImpulseDriver for PointerDriver {
    fn name(&self) -> &'static str {
        "pointer"
    }

    fn next_point(&mut self, _frame: &FrameInfo) -> Option<Vec2> {
        self.cell.latest().map(|p| p * self.scale)
    }

    fn resize(&mut self, surface: Vec2, buffer: Vec2) {
        self.scale = buffer / surface.max(Vec2::ONE);
    }
}

/// Default orbit amplitude in NDC units.
pub const DEFAULT_ORBIT_AMPLITUDE: f32 = 0.5;

/// Walks a circle: `(sin 2πp, cos 2πp) * amplitude` in NDC.
#[derive(Debug, Clone)]
pub struct OrbitDriver {
    amplitude: f32,
    buffer: Vec2,
}

impl OrbitDriver {
    /// Create an orbit over a buffer of the given pixel size.
    pub fn new(buffer: Vec2) -> Self {
        Self {
            amplitude: DEFAULT_ORBIT_AMPLITUDE,
            buffer,
        }
    }

    /// Set the orbit amplitude in NDC units.
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        if amplitude.is_finite() {
            self.amplitude = amplitude;
        }
        self
    }

    /// Point in NDC for a phase (wrapped into `[0, 1)`).
    pub fn ndc_at(&self, phase: f32) -> Vec2 {
        let angle = phase.rem_euclid(1.0) * TAU;
        Vec2::new(angle.sin(), angle.cos()) * self.amplitude
    }

    /// Point in buffer pixels for a phase.
    pub fn point_at(&self, phase: f32) -> Vec2 {
        ndc_to_pixel(self.ndc_at(phase), self.buffer)
    }
}

impl ImpulseDriver for OrbitDriver {
    fn name(&self) -> &'static str {
        "orbit"
    }

    fn next_point(&mut self, frame: &FrameInfo) -> Option<Vec2> {
        if !frame.phase.is_finite() {
            return None;
        }
        Some(self.point_at(frame.phase))
    }

    fn resize(&mut self, _surface: Vec2, buffer: Vec2) {
        self.buffer = buffer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    #[test]
    fn test_orbit_phase_wraps() {
        let orbit = OrbitDriver::new(Vec2::new(200.0, 100.0));
        assert!(close(orbit.point_at(0.0), orbit.point_at(1.0)));
        assert!(close(orbit.point_at(0.25), orbit.point_at(-0.75)));
    }

    #[test]
    fn test_orbit_quarter_phase() {
        let orbit = OrbitDriver::new(Vec2::new(200.0, 100.0)).with_amplitude(1.0);
        // sin = 1, cos = 0 → right edge, vertical center.
        assert!(close(orbit.point_at(0.25), Vec2::new(200.0, 50.0)));
        // sin = 0, cos = 1 → top center.
        assert!(close(orbit.point_at(0.0), Vec2::new(100.0, 0.0)));
    }

    #[test]
    fn test_orbit_default_amplitude() {
        let orbit = OrbitDriver::new(Vec2::new(100.0, 100.0));
        assert!(close(orbit.point_at(0.25), Vec2::new(75.0, 50.0)));
    }

    #[test]
    fn test_orbit_deterministic() {
        let mut orbit = OrbitDriver::new(Vec2::new(64.0, 64.0));
        let frame = FrameInfo {
            phase: 0.37,
            ..Default::default()
        };
        let a = orbit.next_point(&frame);
        let b = orbit.next_point(&frame);
        assert_eq!(a, b);
    }

    #[test]
    fn test_orbit_follows_resize() {
        let mut orbit = OrbitDriver::new(Vec2::new(100.0, 100.0)).with_amplitude(1.0);
        orbit.resize(Vec2::new(800.0, 600.0), Vec2::new(50.0, 40.0));
        assert!(close(orbit.point_at(0.25), Vec2::new(50.0, 20.0)));
    }

    #[test]
    fn test_pointer_absent_until_observed() {
        let cell = PointerCell::new();
        let mut driver = PointerDriver::new(cell.clone());
        assert_eq!(driver.next_point(&FrameInfo::default()), None);

        cell.observe(10.0, 20.0);
        assert_eq!(driver.next_point(&FrameInfo::default()), Some(Vec2::new(10.0, 20.0)));
        // Keeps reporting the last observation.
        assert_eq!(driver.next_point(&FrameInfo::default()), Some(Vec2::new(10.0, 20.0)));
    }

    #[test]
    fn test_pointer_drops_non_finite() {
        let cell = PointerCell::new();
        cell.observe(f32::NAN, 1.0);
        assert_eq!(cell.latest(), None);
        cell.observe(3.0, 4.0);
        cell.observe(f32::INFINITY, 1.0);
        assert_eq!(cell.latest(), Some(Vec2::new(3.0, 4.0)));
    }

    #[test]
    fn test_pointer_scales_to_buffer() {
        let cell = PointerCell::new();
        let mut driver = PointerDriver::new(cell.clone());
        driver.resize(Vec2::new(800.0, 600.0), Vec2::new(400.0, 300.0));
        cell.observe(100.0, 60.0);
        assert_eq!(driver.next_point(&FrameInfo::default()), Some(Vec2::new(50.0, 30.0)));
    }

    #[test]
    fn test_driver_kind_parse() {
        assert_eq!("orbit".parse::<DriverKind>(), Ok(DriverKind::Orbit));
        assert_eq!("Mouse".parse::<DriverKind>(), Ok(DriverKind::Pointer));
        assert!("spiral".parse::<DriverKind>().is_err());
    }
}
