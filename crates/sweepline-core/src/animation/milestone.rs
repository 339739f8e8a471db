#![forbid(unsafe_code)]

//! Threshold and end-of-span detection on top of a [`Timeline`].
//!
//! The sweep driver needs two edges per cycle: the frame on which progress
//! first goes *strictly* past the retrigger threshold, and the frame on which
//! the span runs out. [`Milestones::advance`] reports both as a [`Reached`]
//! value, so the owning cycle stays a plain state machine with nothing to
//! drain or subscribe to.
//!
//! Each edge is reported once per run. [`Milestones::rewind`] re-arms both.

use std::time::Duration;

use super::Timeline;

/// Edges hit during a single [`Milestones::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reached {
    /// Progress went past the threshold on this advance.
    pub threshold: bool,
    /// The span ran out on this advance.
    pub end: bool,
}

impl Reached {
    /// Neither edge was hit.
    pub fn is_empty(&self) -> bool {
        !self.threshold && !self.end
    }
}

/// A timeline plus edge tracking.
#[derive(Debug, Clone)]
pub struct Milestones<T> {
    timeline: T,
    threshold: Option<f32>,
    past_threshold: bool,
    ended: bool,
}

impl<T: Timeline> Milestones<T> {
    /// Track the end of `timeline` only.
    pub fn new(timeline: T) -> Self {
        Self {
            timeline,
            threshold: None,
            past_threshold: false,
            ended: false,
        }
    }

    /// Also report when progress exceeds `threshold`, clamped to [0, 1].
    /// A NaN or infinite threshold leaves the edge disabled.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold
            .is_finite()
            .then(|| threshold.clamp(0.0, 1.0))
            .or(self.threshold);
        self
    }

    pub fn threshold(&self) -> Option<f32> {
        self.threshold
    }

    pub fn timeline(&self) -> &T {
        &self.timeline
    }

    pub fn progress(&self) -> f32 {
        self.timeline.progress()
    }

    /// Feed `dt` and report which edges were newly hit.
    pub fn advance(&mut self, dt: Duration) -> Reached {
        self.timeline.advance(dt);
        let mut reached = Reached::default();

        let over = self
            .threshold
            .is_some_and(|t| self.timeline.progress() > t);
        if over && !self.past_threshold {
            self.past_threshold = true;
            reached.threshold = true;
        }
        if self.timeline.is_finished() && !self.ended {
            self.ended = true;
            reached.end = true;
        }
        reached
    }

    /// Restart the timeline and re-arm both edges.
    pub fn rewind(&mut self) {
        self.timeline.rewind();
        self.past_threshold = false;
        self.ended = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Clock;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn end_only_without_threshold() {
        let mut m = Milestones::new(Clock::new(ms(32)));
        assert!(m.advance(ms(16)).is_empty());
        assert_eq!(
            m.advance(ms(16)),
            Reached {
                threshold: false,
                end: true
            }
        );
        assert!(m.advance(ms(16)).is_empty(), "end is reported once");
    }

    #[test]
    fn landing_on_threshold_does_not_count() {
        let mut m = Milestones::new(Clock::new(ms(1000))).with_threshold(0.5);
        assert!(m.advance(ms(500)).is_empty());
        assert!(m.advance(ms(1)).threshold);
        assert!(!m.advance(ms(100)).threshold);
    }

    #[test]
    fn one_long_step_hits_both_edges() {
        let mut m = Milestones::new(Clock::new(ms(100))).with_threshold(0.9);
        let reached = m.advance(ms(250));
        assert!(reached.threshold && reached.end);
    }

    #[test]
    fn rewind_rearms() {
        let mut m = Milestones::new(Clock::new(ms(100))).with_threshold(0.2);
        m.advance(ms(200));
        m.rewind();
        assert_eq!(m.progress(), 0.0);
        let reached = m.advance(ms(200));
        assert!(reached.threshold && reached.end);
    }

    #[test]
    fn threshold_is_clamped_and_nan_rejected() {
        let m = Milestones::new(Clock::new(ms(100))).with_threshold(f32::NAN);
        assert_eq!(m.threshold(), None);
        let m = m.with_threshold(-2.0);
        assert_eq!(m.threshold(), Some(0.0));
        let m = m.with_threshold(f32::INFINITY);
        assert_eq!(m.threshold(), Some(0.0), "keeps the previous value");
    }
}
