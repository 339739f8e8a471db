#![forbid(unsafe_code)]

//! Clock-driven progress primitives shared by the sweep and reveal drivers.
//!
//! A [`Timeline`] never reads the wall clock itself. Drivers feed it the time
//! that passed since their last frame, which keeps sweeps reproducible under
//! test: a synthetic `Duration` is as good as a real one.
//!
//! - [`Clock`]: elapsed time over a fixed span, shaped by an [`Easing`].
//! - [`Ramp`]: a two-keyframe scalar track sampled by progress.
//! - [`milestone::Milestones`]: threshold and end-of-span detection.

pub mod milestone;

use std::time::Duration;

/// Shape applied to a clock's elapsed fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    /// Constant velocity. Sweeps always run linear.
    #[default]
    Linear,
    /// Quadratic acceleration then deceleration, for the reveal scale.
    EaseInOut,
}

impl Easing {
    /// Map `t` onto the curve. Input outside [0, 1] is clamped first.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseInOut if t < 0.5 => 2.0 * t * t,
            Self::EaseInOut => {
                let rem = 2.0 - 2.0 * t;
                1.0 - rem * rem * 0.5
            }
        }
    }
}

/// Value `t` of the way from `from` to `to`.
#[inline]
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Something that moves from 0 to 1 as time is fed into it.
pub trait Timeline {
    /// Feed `dt` of elapsed time.
    fn advance(&mut self, dt: Duration);

    /// Shaped progress in [0, 1].
    fn progress(&self) -> f32;

    /// True once the whole span has elapsed.
    fn is_finished(&self) -> bool;

    /// Back to zero elapsed time.
    fn rewind(&mut self);
}

/// Elapsed time over a fixed span.
///
/// Time is kept as a [`Duration`] rather than a float accumulator, so a
/// multi-second sweep fed in 16 ms slices lands exactly on its span. An
/// empty span still needs one `advance` call before it reports finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    span: Duration,
    elapsed: Duration,
    easing: Easing,
}

impl Clock {
    pub fn new(span: Duration) -> Self {
        Self {
            span: span.max(Duration::from_nanos(1)),
            elapsed: Duration::ZERO,
            easing: Easing::Linear,
        }
    }

    #[must_use]
    pub fn with_easing(self, easing: Easing) -> Self {
        Self { easing, ..self }
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Unshaped elapsed fraction, clamped to [0, 1].
    pub fn fraction(&self) -> f32 {
        let ratio = self.elapsed.as_secs_f64() / self.span.as_secs_f64();
        ratio.min(1.0) as f32
    }
}

impl Timeline for Clock {
    fn advance(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt);
    }

    fn progress(&self) -> f32 {
        self.easing.apply(self.fraction())
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.span
    }

    fn rewind(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}

/// A scalar track with two keyframes.
///
/// Before `start_at` the track holds `from`; after `end_at` it holds `to`;
/// in between it interpolates linearly. Sampling takes a progress value,
/// typically [`Timeline::progress`] of the driving clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    from: f32,
    to: f32,
    start_at: f32,
    end_at: f32,
}

impl Ramp {
    /// A ramp from `from` to `to` spanning the whole [0, 1] range.
    pub fn new(from: f32, to: f32) -> Self {
        Self {
            from,
            to,
            start_at: 0.0,
            end_at: 1.0,
        }
    }

    /// Restrict the ramp to the progress window `[start_at, end_at]`.
    ///
    /// The window is clamped to [0, 1]; an empty or inverted window turns the
    /// ramp into a step at `start_at`.
    #[must_use]
    pub fn between(mut self, start_at: f32, end_at: f32) -> Self {
        self.start_at = start_at.clamp(0.0, 1.0);
        self.end_at = end_at.clamp(self.start_at, 1.0);
        self
    }

    /// Value at the start keyframe.
    pub fn from(&self) -> f32 {
        self.from
    }

    /// Value at the end keyframe.
    pub fn to(&self) -> f32 {
        self.to
    }

    /// Sample the track at progress `t`.
    pub fn sample(&self, t: f32) -> f32 {
        if t <= self.start_at {
            return self.from;
        }
        if t >= self.end_at {
            return self.to;
        }
        let span = self.end_at - self.start_at;
        lerp(self.from, self.to, (t - self.start_at) / span)
    }
}
