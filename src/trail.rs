//! Decaying 2D trail buffer.
//!
//! The trail buffer is a single-channel intensity raster (row-major, top-left
//! origin) that records recent pointer activity. Each [`TrailBuffer::update`]
//! fades the whole raster a little and, when a point is supplied, stamps a
//! soft radial impulse at that point.
//!
//! # Example
//!
//! ```
//! use trailshade::{TrailBuffer, Vec2};
//!
//! let mut trail = TrailBuffer::new(128, 128).with_radius(10.0);
//! trail.update(Some(Vec2::new(64.0, 64.0)));
//! assert!(trail.get(64, 64) > 0.3);
//!
//! trail.update(None);
//! assert!(trail.get(64, 64) < 1.0);
//! ```

use glam::Vec2;

/// Gradient stops `(offset, intensity)` of an impulse, from center to rim.
///
/// Offsets are fractions of the falloff extent (`radius * FALLOFF_EXTENT`).
pub const FALLOFF_STOPS: [(f32, f32); 9] = [
    (0.0, 0.7),
    (0.08, 0.5),
    (0.15, 0.35),
    (0.25, 0.2),
    (0.35, 0.12),
    (0.5, 0.06),
    (0.65, 0.03),
    (0.8, 0.01),
    (1.0, 0.0),
];

/// Ratio between the falloff extent and the impulse radius.
pub const FALLOFF_EXTENT: f32 = 2.5;

/// Intensity at the very center of an impulse, before blur.
pub const PEAK_INTENSITY: f32 = 0.7;

/// Default black-layer opacity applied per update.
pub const DEFAULT_DECAY: f32 = 0.025;

/// Default impulse radius as a fraction of the buffer width.
pub const DEFAULT_RADIUS_FRACTION: f32 = 0.12;

/// Default stamp blur radius in pixels.
pub const DEFAULT_BLUR: u32 = 1;

const MIN_RADIUS: f32 = 0.5;
/// Largest accepted blur radius.
pub const MAX_BLUR: u32 = 8;

// Values below this are flushed to zero so decay never lingers in subnormals.
const FLUSH_THRESHOLD: f32 = 1.0e-6;

/// Evaluate the impulse falloff at normalized distance `t` (0 = center, 1 = rim).
///
/// Piecewise linear between [`FALLOFF_STOPS`]; zero at and beyond the rim.
pub fn falloff(t: f32) -> f32 {
    if !(t > 0.0) {
        return FALLOFF_STOPS[0].1;
    }
    for pair in FALLOFF_STOPS.windows(2) {
        let (t0, v0) = pair[0];
        let (t1, v1) = pair[1];
        if t <= t1 {
            let f = (t - t0) / (t1 - t0);
            return v0 + (v1 - v0) * f;
        }
    }
    0.0
}

/// A 2D raster of intensities in `[0, 1]` with exponential decay.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    width: u32,
    height: u32,
    decay: f32,
    radius: f32,
    blur: u32,
    raster: Vec<f32>,
    // Reused between updates for the impulse stamp.
    stamp: Vec<f32>,
    scratch: Vec<f32>,
}

impl TrailBuffer {
    /// Create a cleared buffer.
    ///
    /// Dimensions are clamped to at least 1×1. The impulse radius defaults to
    /// [`DEFAULT_RADIUS_FRACTION`] of the width.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            decay: DEFAULT_DECAY,
            radius: (width as f32 * DEFAULT_RADIUS_FRACTION).max(MIN_RADIUS),
            blur: DEFAULT_BLUR,
            raster: vec![0.0; (width * height) as usize],
            stamp: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Set the decay factor (clamped to `[0, 1]`).
    pub fn with_decay(mut self, decay: f32) -> Self {
        self.set_decay(decay);
        self
    }

    /// Set the impulse radius in pixels.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.set_radius(radius);
        self
    }

    /// Set the stamp blur radius in pixels.
    pub fn with_blur(mut self, blur: u32) -> Self {
        self.set_blur(blur);
        self
    }

    /// Buffer width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Buffer size in pixels.
    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Opacity of the black layer composited per update.
    #[inline]
    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Impulse radius in pixels. The falloff reaches zero at `radius * 2.5`.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Stamp blur radius in pixels.
    #[inline]
    pub fn blur(&self) -> u32 {
        self.blur
    }

    /// Set the decay factor. Clamped to `[0, 1]`; non-finite values are ignored.
    pub fn set_decay(&mut self, decay: f32) {
        if decay.is_finite() {
            self.decay = decay.clamp(0.0, 1.0);
        }
    }

    /// Set the impulse radius. Clamped to a small positive minimum.
    pub fn set_radius(&mut self, radius: f32) {
        if radius.is_finite() {
            self.radius = radius.max(MIN_RADIUS);
        }
    }

    /// Set the stamp blur radius. Clamped to `[0, 8]`.
    pub fn set_blur(&mut self, blur: u32) {
        self.blur = blur.min(MAX_BLUR);
    }

    /// Current intensities, row-major, top-left origin.
    #[inline]
    pub fn raster(&self) -> &[f32] {
        &self.raster
    }

    /// Intensity at a pixel. Out-of-range coordinates read as 0.
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.raster[(y * self.width + x) as usize]
    }

    /// Largest intensity in the raster.
    pub fn max_value(&self) -> f32 {
        self.raster.iter().copied().fold(0.0, f32::max)
    }

    /// 8-bit quantized copy of the raster for texture upload.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.raster
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.raster.fill(0.0);
    }

    /// Reallocate at new dimensions and clear. Dimensions are clamped to ≥ 1×1.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.raster.clear();
        self.raster.resize((self.width * self.height) as usize, 0.0);
    }

    /// Advance one frame: decay everything, then deposit an impulse at `point`.
    ///
    /// `point` is in buffer pixel space. A missing or non-finite point only
    /// decays the buffer.
    pub fn update(&mut self, point: Option<Vec2>) {
        self.fade();
        if let Some(point) = point.filter(|p| p.is_finite()) {
            self.deposit(point);
        }
    }

    /// Composite a black layer of opacity `decay` over the raster.
    fn fade(&mut self) {
        let keep = 1.0 - self.decay;
        for v in &mut self.raster {
            *v *= keep;
            if *v < FLUSH_THRESHOLD {
                *v = 0.0;
            }
        }
    }

    /// Stamp a blurred radial falloff and composite it as white source-over.
    fn deposit(&mut self, point: Vec2) {
        let extent = self.radius * FALLOFF_EXTENT;
        let pad = extent + self.blur as f32 + 1.0;

        let x0 = (point.x - pad).floor().max(0.0) as i64;
        let y0 = (point.y - pad).floor().max(0.0) as i64;
        let x1 = ((point.x + pad).ceil() as i64).min(self.width as i64);
        let y1 = ((point.y + pad).ceil() as i64).min(self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let w = (x1 - x0) as usize;
        let h = (y1 - y0) as usize;
        self.stamp.clear();
        self.stamp.resize(w * h, 0.0);

        for j in 0..h {
            let cy = (y0 as usize + j) as f32 + 0.5;
            for i in 0..w {
                let cx = (x0 as usize + i) as f32 + 0.5;
                let dist = Vec2::new(cx, cy).distance(point);
                if dist < extent {
                    self.stamp[j * w + i] = falloff(dist / extent);
                }
            }
        }

        if self.blur > 0 {
            let kernel = binomial_kernel(self.blur);
            blur_separable(&mut self.stamp, &mut self.scratch, w, h, &kernel);
        }

        let stride = self.width as usize;
        for j in 0..h {
            let row = (y0 as usize + j) * stride + x0 as usize;
            for i in 0..w {
                let s = self.stamp[j * w + i];
                if s > 0.0 {
                    let v = &mut self.raster[row + i];
                    *v = (*v + s * (1.0 - *v)).clamp(0.0, 1.0);
                }
            }
        }
    }

    /// Bilinear sample at normalized `uv` with clamp-to-edge addressing.
    ///
    /// Texel centers sit at `(i + 0.5) / width`, matching a linear GPU sampler.
    pub fn sample(&self, uv: Vec2) -> f32 {
        if !uv.is_finite() {
            return 0.0;
        }
        let x = (uv.x * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let y = (uv.y * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);

        let xi = x.floor() as u32;
        let yi = y.floor() as u32;
        let xn = (xi + 1).min(self.width - 1);
        let yn = (yi + 1).min(self.height - 1);
        let fx = x - xi as f32;
        let fy = y - yi as f32;

        let top = self.get(xi, yi) * (1.0 - fx) + self.get(xn, yi) * fx;
        let bottom = self.get(xi, yn) * (1.0 - fx) + self.get(xn, yn) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// Normalized binomial weights of length `2 * radius + 1`.
fn binomial_kernel(radius: u32) -> Vec<f32> {
    let n = (2 * radius) as usize;
    let mut row = vec![1.0f64];
    for _ in 0..n {
        let mut next = vec![1.0f64; row.len() + 1];
        for k in 1..row.len() {
            next[k] = row[k - 1] + row[k];
        }
        row = next;
    }
    let sum: f64 = row.iter().sum();
    row.iter().map(|w| (w / sum) as f32).collect()
}

/// Horizontal then vertical convolution; samples outside the window are zero.
fn blur_separable(data: &mut [f32], scratch: &mut Vec<f32>, w: usize, h: usize, kernel: &[f32]) {
    let r = (kernel.len() / 2) as isize;
    scratch.clear();
    scratch.resize(w * h, 0.0);

    for j in 0..h {
        for i in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let x = i as isize + k as isize - r;
                if x >= 0 && (x as usize) < w {
                    acc += data[j * w + x as usize] * weight;
                }
            }
            scratch[j * w + i] = acc;
        }
    }

    for j in 0..h {
        for i in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let y = j as isize + k as isize - r;
                if y >= 0 && (y as usize) < h {
                    acc += scratch[y as usize * w + i] * weight;
                }
            }
            data[j * w + i] = acc;
        }
    }
}
