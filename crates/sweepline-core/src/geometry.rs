#![forbid(unsafe_code)]

//! Bar geometry.
//!
//! Pure functions mapping values and sweep progress to pixel geometry. The
//! track is the full width of the indicator; bars are positioned by their
//! left edge (`x_px`) and may sit partly or fully outside the track while a
//! sweep enters or leaves.

use crate::animation::{Ramp, lerp};
use crate::config::SweepDirection;

/// Width in pixels of the determinate bar for `value`.
///
/// `round((value - min) / (max - min) * track_px)`, clamped to
/// `[0, track_px]`. An empty or inverted range and non-finite inputs map to
/// zero instead of dividing by zero.
pub fn determinate_width(value: f64, min: f64, max: f64, track_px: u32) -> u32 {
    let span = max - min;
    if !(span > 0.0) || !span.is_finite() || !value.is_finite() {
        return 0;
    }
    let fraction = ((value - min) / span).clamp(0.0, 1.0);
    (fraction * f64::from(track_px)).round() as u32
}

/// One of the two indeterminate bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepBar {
    /// Leading bar: half the track wide, grows to 1.4×.
    A,
    /// Trailing bar: 0.6 of the track wide, shrinks to 0.2×.
    B,
}

impl SweepBar {
    /// Both bars, in start order.
    pub const ALL: [SweepBar; 2] = [SweepBar::A, SweepBar::B];

    /// The other bar.
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Bar width as a fraction of the track.
    pub fn width_factor(self) -> f32 {
        match self {
            Self::A => 0.5,
            Self::B => 0.6,
        }
    }

    /// Horizontal scale reached halfway through a cycle.
    pub fn target_scale(self) -> f32 {
        match self {
            Self::A => 1.4,
            Self::B => 0.2,
        }
    }

    /// Unscaled bar width for a track.
    pub fn width_px(self, track_px: u32) -> u32 {
        (track_px as f32 * self.width_factor()) as u32
    }
}

/// Placement of a sweep bar on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepGeometry {
    /// Left edge of the unscaled bar, relative to the track start.
    pub x_px: f32,
    /// Horizontal scale factor.
    pub scale_x: f32,
    /// Unscaled bar width.
    pub width_px: u32,
}

/// The translate + scale path one bar follows during a cycle.
///
/// Captured when the cycle starts: later track or direction changes affect
/// the next cycle only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPath {
    from_x: f32,
    to_x: f32,
    scale: Ramp,
    width_px: u32,
}

impl SweepPath {
    /// Path for `bar` across a `track_px` wide track.
    pub fn new(bar: SweepBar, direction: SweepDirection, track_px: u32) -> Self {
        let width_px = bar.width_px(track_px);
        let width = width_px as f32;
        let track = track_px as f32;
        let target = bar.target_scale();
        let grows = target >= 1.0;

        let (from_x, to_x) = match direction {
            SweepDirection::Ltr if grows => (-width, track * target),
            SweepDirection::Ltr => (-width, track),
            SweepDirection::Rtl if grows => (track, -(width * target)),
            SweepDirection::Rtl => (track, -width),
        };

        Self {
            from_x,
            to_x,
            scale: Ramp::new(1.0, target).between(0.0, 0.5),
            width_px,
        }
    }

    /// Geometry at `progress` in [0, 1].
    pub fn at(&self, progress: f32) -> SweepGeometry {
        let t = progress.clamp(0.0, 1.0);
        SweepGeometry {
            x_px: lerp(self.from_x, self.to_x, t),
            scale_x: self.scale.sample(t),
            width_px: self.width_px,
        }
    }

    /// Pose before the cycle starts: off-track at the entry edge, unscaled.
    pub fn rest_pose(&self) -> SweepGeometry {
        self.at(0.0)
    }

    /// Start and end offsets.
    pub fn span(&self) -> (f32, f32) {
        (self.from_x, self.to_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_value_on_200px_track_is_100px() {
        assert_eq!(determinate_width(50.0, 0.0, 100.0, 200), 100);
    }

    #[test]
    fn width_rounds_to_nearest_pixel() {
        // 1/3 of 100 = 33.33 -> 33; 2/3 of 100 = 66.67 -> 67
        assert_eq!(determinate_width(1.0, 0.0, 3.0, 100), 33);
        assert_eq!(determinate_width(2.0, 0.0, 3.0, 100), 67);
    }

    #[test]
    fn width_clamps_outside_range() {
        assert_eq!(determinate_width(-10.0, 0.0, 100.0, 200), 0);
        assert_eq!(determinate_width(250.0, 0.0, 100.0, 200), 200);
    }

    #[test]
    fn degenerate_range_is_zero() {
        assert_eq!(determinate_width(5.0, 5.0, 5.0, 200), 0);
        assert_eq!(determinate_width(5.0, 10.0, 0.0, 200), 0);
        assert_eq!(determinate_width(f64::NAN, 0.0, 100.0, 200), 0);
    }

    #[test]
    fn bar_widths() {
        assert_eq!(SweepBar::A.width_px(200), 100);
        assert_eq!(SweepBar::B.width_px(200), 120);
        assert_eq!(SweepBar::A.other(), SweepBar::B);
    }

    #[test]
    fn ltr_growing_bar_overshoots_track() {
        let path = SweepPath::new(SweepBar::A, SweepDirection::Ltr, 200);
        assert_eq!(path.span(), (-100.0, 280.0));
        let mid = path.at(0.5);
        assert!((mid.x_px - 90.0).abs() < 1e-4);
        assert!((mid.scale_x - 1.4).abs() < 1e-6);
    }

    #[test]
    fn ltr_shrinking_bar_ends_at_track_edge() {
        let path = SweepPath::new(SweepBar::B, SweepDirection::Ltr, 200);
        assert_eq!(path.span(), (-120.0, 200.0));
        assert!((path.at(1.0).scale_x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn rtl_mirrors_ltr() {
        let a = SweepPath::new(SweepBar::A, SweepDirection::Rtl, 200);
        assert_eq!(a.span(), (200.0, -140.0));
        let b = SweepPath::new(SweepBar::B, SweepDirection::Rtl, 200);
        assert_eq!(b.span(), (200.0, -120.0));
    }

    #[test]
    fn rest_pose_is_unscaled_at_entry_edge() {
        let pose = SweepPath::new(SweepBar::B, SweepDirection::Ltr, 300).rest_pose();
        assert_eq!(pose.x_px, -180.0);
        assert_eq!(pose.scale_x, 1.0);
        assert_eq!(pose.width_px, 180);
    }
}
