//! Frame timing and the looping playhead.
//!
//! [`Time`] measures wall-clock frames, or advances by a fixed step when one
//! is set so exported sequences come out identical run to run. [`Playhead`]
//! folds elapsed seconds into the `[0, 1)` phase the orbit driver follows.
//!
//! ```
//! use trailshade::time::{Playhead, Time};
//!
//! let mut time = Time::fixed(0.5);
//! time.update();
//! time.update();
//!
//! let playhead = Playhead::new(4.0);
//! assert_eq!(playhead.phase(time.elapsed()), 0.25);
//! ```

use std::time::{Duration, Instant};

/// Loop length of the playhead when none is configured.
pub const DEFAULT_LOOP_SECONDS: f32 = 6.0;

/// How often the FPS estimate refreshes.
const FPS_WINDOW: Duration = Duration::from_millis(500);

/// How a [`Time`] advances on each update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Wall-clock time between updates.
    Measured,
    /// A constant number of seconds per update.
    Fixed(f32),
}

impl Step {
    /// `Fixed` with a usable step, `Measured` otherwise.
    fn checked(self) -> Self {
        match self {
            Step::Fixed(dt) if dt.is_finite() && dt > 0.0 => self,
            _ => Step::Measured,
        }
    }
}

/// Frames counted over a short wall-clock window.
#[derive(Debug)]
struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl FpsMeter {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    fn count(&mut self, now: Instant) {
        self.frames += 1;
        let span = now.duration_since(self.window_start);
        if span >= FPS_WINDOW {
            self.fps = self.frames as f32 / span.as_secs_f32();
            self.frames = 0;
            self.window_start = now;
            log::trace!("{:.1} fps", self.fps);
        }
    }
}

/// Clock driving the frame loop.
#[derive(Debug)]
pub struct Time {
    step: Step,
    last_update: Instant,
    /// Accumulated scaled seconds.
    elapsed: f32,
    delta: f32,
    frame: u64,
    scale: f32,
    paused: bool,
    meter: FpsMeter,
}

impl Time {
    /// Wall-clock timing starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            step: Step::Measured,
            last_update: now,
            elapsed: 0.0,
            delta: 0.0,
            frame: 0,
            scale: 1.0,
            paused: false,
            meter: FpsMeter::new(now),
        }
    }

    /// Timing that advances by `delta` seconds per update.
    pub fn fixed(delta: f32) -> Self {
        let mut time = Self::new();
        time.set_step(Step::Fixed(delta));
        time
    }

    /// Advance one frame and return `(elapsed, delta)`.
    ///
    /// Paused updates count the frame but add no time.
    pub fn update(&mut self) -> (f32, f32) {
        let now = Instant::now();
        let measured = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.frame += 1;
        self.meter.count(now);

        let step = match self.step {
            Step::Measured => measured,
            Step::Fixed(dt) => dt,
        };
        self.delta = if self.paused { 0.0 } else { step * self.scale };
        self.elapsed += self.delta;
        (self.elapsed, self.delta)
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Number of updates so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Measured frame rate, refreshed twice a second.
    pub fn fps(&self) -> f32 {
        self.meter.fps
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Switch stepping mode. A fixed step that is not finite and positive
    /// falls back to `Measured`.
    pub fn set_step(&mut self, step: Step) {
        self.step = step.checked();
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Multiplier on every step. Negative values clamp to 0; NaN is ignored.
    pub fn set_scale(&mut self, scale: f32) {
        if !scale.is_nan() {
            self.scale = scale.clamp(0.0, f32::MAX);
        }
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps elapsed seconds to a looping phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playhead {
    duration: f32,
}

impl Playhead {
    /// Loop over `duration` seconds. Invalid durations fall back to the default.
    pub fn new(duration: f32) -> Self {
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            DEFAULT_LOOP_SECONDS
        };
        Self { duration }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Phase in `[0, 1)` for an elapsed time.
    pub fn phase(&self, elapsed: f32) -> f32 {
        if !elapsed.is_finite() {
            return 0.0;
        }
        let phase = (elapsed / self.duration).rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative inputs.
        if phase >= 1.0 {
            0.0
        } else {
            phase
        }
    }

    /// Number of frames covering one loop at `fps`.
    pub fn frames_per_loop(&self, fps: f32) -> u32 {
        (self.duration * fps.max(1.0)).round().max(1.0) as u32
    }
}

impl Default for Playhead {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        let time = Time::default();
        assert_eq!((time.elapsed(), time.delta(), time.frame()), (0.0, 0.0, 0));
        assert_eq!(time.step(), Step::Measured);
        assert_eq!(time.scale(), 1.0);
    }

    #[test]
    fn test_measured_step_advances() {
        let mut time = Time::new();
        std::thread::sleep(Duration::from_millis(5));
        let (elapsed, delta) = time.update();
        assert!(delta > 0.0);
        assert_eq!(elapsed, delta);
    }

    #[test]
    fn test_fixed_step_ignores_wall_clock() {
        let mut time = Time::fixed(1.0 / 60.0);
        std::thread::sleep(Duration::from_millis(20));
        for _ in 0..60 {
            time.update();
        }
        assert!((time.elapsed() - 1.0).abs() < 1e-4);
        assert_eq!(time.frame(), 60);
    }

    #[test]
    fn test_invalid_fixed_step_is_measured() {
        assert_eq!(Time::fixed(0.0).step(), Step::Measured);
        assert_eq!(Time::fixed(f32::NAN).step(), Step::Measured);
        assert_eq!(Time::fixed(0.25).step(), Step::Fixed(0.25));
    }

    #[test]
    fn test_paused_counts_frames_only() {
        let mut time = Time::fixed(0.1);
        time.update();
        time.set_paused(true);
        let (elapsed, delta) = time.update();
        assert_eq!(delta, 0.0);
        assert!((elapsed - 0.1).abs() < 1e-6);
        assert_eq!(time.frame(), 2);

        time.set_paused(false);
        time.update();
        assert!((time.elapsed() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_scale() {
        let mut time = Time::fixed(0.5);
        time.set_scale(2.0);
        assert_eq!(time.update().1, 1.0);

        time.set_scale(-3.0);
        assert_eq!(time.scale(), 0.0);
        time.set_scale(f32::NAN);
        assert_eq!(time.scale(), 0.0);
    }

    #[test]
    fn test_playhead_wraps() {
        let playhead = Playhead::new(6.0);
        assert_eq!(playhead.phase(0.0), 0.0);
        assert!((playhead.phase(1.5) - 0.25).abs() < 1e-6);
        assert!((playhead.phase(7.5) - 0.25).abs() < 1e-6);
        assert!(playhead.phase(6.0) < 1e-6);
        assert_eq!(playhead.phase(f32::NAN), 0.0);
        let p = playhead.phase(-1e-9);
        assert!((0.0..1.0).contains(&p));
    }

    #[test]
    fn test_playhead_invalid_duration() {
        assert_eq!(Playhead::new(0.0).duration(), DEFAULT_LOOP_SECONDS);
        assert_eq!(Playhead::new(f32::INFINITY).duration(), DEFAULT_LOOP_SECONDS);
        assert_eq!(Playhead::default().frames_per_loop(60.0), 360);
    }
}
