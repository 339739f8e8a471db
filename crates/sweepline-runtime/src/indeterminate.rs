#![forbid(unsafe_code)]

//! Indeterminate (two-bar sweep) driver.
//!
//! Two [`SweepCycle`]s, one per bar, share no state. Each cycle runs a linear
//! [`Clock`] over the sweep duration under [`Milestones`], which reports the
//! frame where progress exceeds the cycle's retrigger threshold. That edge
//! *arms* the cycle for the rest of its run. On every frame, an armed cycle
//! starts the opposite bar if the opposite bar is idle. A cycle can therefore
//! retrigger more than once when the other bar runs shorter, for instance
//! after a rate change. The trigger is live through the frame on which its
//! cycle ends and is dropped on the next one.
//!
//! The driver starts bar A. Later starts come from triggers, so the bars
//! leapfrog indefinitely; if both bars end on the same frame with nothing
//! armed, A is started again. Thresholds are redrawn on every start, while
//! duration, direction and track width are captured at start and hold for
//! that cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sweepline_core::animation::Clock;
use sweepline_core::animation::milestone::Milestones;
use sweepline_core::{
    SweepBar, SweepDirection, SweepGeometry, SweepPath, ThresholdSampler, TimingModel,
};

use crate::bridge::RenderBridge;
use crate::engine::{EngineExit, StopSignal, contain_tick};
use crate::surface::SurfaceUpdate;

/// Nominal frame period of the sweep engine.
pub const FRAME_PERIOD: Duration = Duration::from_millis(16);

/// Parameters captured when a cycle starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSettings {
    pub duration: Duration,
    pub direction: SweepDirection,
    pub track_px: u32,
}

impl CycleSettings {
    /// Current settings from the shared model.
    pub fn from_model(model: &TimingModel) -> Self {
        Self {
            duration: model.sweep_duration(),
            direction: model.sweep_direction(),
            track_px: model.track_width(),
        }
    }
}

/// Whether a bar is mid-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Idle,
    Running,
}

/// One bar's sweep.
#[derive(Debug)]
pub struct SweepCycle {
    bar: SweepBar,
    clock: Option<Milestones<Clock>>,
    path: SweepPath,
    geometry: SweepGeometry,
    threshold: f32,
    armed: bool,
    cycles: u64,
}

impl SweepCycle {
    /// An idle cycle resting at the entry edge.
    pub fn new(bar: SweepBar, settings: &CycleSettings) -> Self {
        let path = SweepPath::new(bar, settings.direction, settings.track_px);
        Self {
            bar,
            clock: None,
            path,
            geometry: path.rest_pose(),
            threshold: 1.0,
            armed: false,
            cycles: 0,
        }
    }

    pub fn bar(&self) -> SweepBar {
        self.bar
    }

    pub fn phase(&self) -> SweepPhase {
        if self.clock.is_some() {
            SweepPhase::Running
        } else {
            SweepPhase::Idle
        }
    }

    /// Start a new cycle, replacing any cycle in flight. Returns the
    /// starting pose.
    pub fn start(&mut self, settings: &CycleSettings, threshold: f32) -> SweepGeometry {
        let clock = Milestones::new(Clock::new(settings.duration)).with_threshold(threshold);
        self.threshold = clock.threshold().unwrap_or(threshold);
        self.clock = Some(clock);
        self.path = SweepPath::new(self.bar, settings.direction, settings.track_px);
        self.geometry = self.path.rest_pose();
        self.armed = false;
        self.cycles += 1;
        self.geometry
    }

    /// Drop the cycle in flight, if any.
    pub fn cancel(&mut self) {
        self.clock = None;
        self.armed = false;
    }

    /// Advance by `dt`. Returns the new pose while running.
    pub fn advance(&mut self, dt: Duration) -> Option<SweepGeometry> {
        let Some(clock) = self.clock.as_mut() else {
            self.armed = false;
            return None;
        };
        let reached = clock.advance(dt);
        self.geometry = self.path.at(clock.progress());

        if reached.threshold {
            self.armed = true;
        }
        if reached.end {
            self.clock = None;
        }
        Some(self.geometry)
    }

    /// Whether this cycle is past its threshold, counting the frame on which
    /// it ended.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Last pose produced.
    pub fn geometry(&self) -> SweepGeometry {
        self.geometry
    }

    /// Elapsed fraction of the running cycle; 0 when idle.
    pub fn progress(&self) -> f32 {
        self.clock.as_ref().map_or(0.0, |c| c.timeline().fraction())
    }

    /// Threshold drawn for the current (or last) cycle.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Duration of the running cycle.
    pub fn duration(&self) -> Option<Duration> {
        self.clock.as_ref().map(|c| c.timeline().span())
    }

    /// Cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// A pose to deliver for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepFrame {
    pub bar: SweepBar,
    pub geometry: SweepGeometry,
}

impl From<SweepFrame> for SurfaceUpdate {
    fn from(frame: SweepFrame) -> Self {
        SurfaceUpdate::Sweep {
            bar: frame.bar,
            geometry: frame.geometry,
        }
    }
}

/// Both sweep cycles and the threshold source.
#[derive(Debug)]
pub struct IndeterminateDriver {
    a: SweepCycle,
    b: SweepCycle,
    sampler: ThresholdSampler,
}

impl IndeterminateDriver {
    pub fn new(sampler: ThresholdSampler, settings: &CycleSettings) -> Self {
        Self {
            a: SweepCycle::new(SweepBar::A, settings),
            b: SweepCycle::new(SweepBar::B, settings),
            sampler,
        }
    }

    pub fn cycle(&self, bar: SweepBar) -> &SweepCycle {
        match bar {
            SweepBar::A => &self.a,
            SweepBar::B => &self.b,
        }
    }

    /// Start bar A. Returns its starting pose.
    pub fn begin(&mut self, settings: &CycleSettings) -> SweepFrame {
        let threshold = self.sampler.sample();
        SweepFrame {
            bar: SweepBar::A,
            geometry: self.a.start(settings, threshold),
        }
    }

    /// Advance both cycles by `dt` and fire any armed triggers.
    ///
    /// `settings` applies to cycles started during this frame.
    pub fn advance(&mut self, dt: Duration, settings: &CycleSettings) -> Vec<SweepFrame> {
        let mut frames = Vec::with_capacity(4);
        for cycle in [&mut self.a, &mut self.b] {
            if let Some(geometry) = cycle.advance(dt) {
                frames.push(SweepFrame {
                    bar: cycle.bar(),
                    geometry,
                });
            }
        }

        retrigger(&mut self.a, &mut self.b, &mut self.sampler, settings, &mut frames);
        retrigger(&mut self.b, &mut self.a, &mut self.sampler, settings, &mut frames);

        if self.a.phase() == SweepPhase::Idle
            && self.b.phase() == SweepPhase::Idle
            && !self.a.is_armed()
            && !self.b.is_armed()
        {
            frames.push(self.begin(settings));
        }
        frames
    }
}

fn retrigger(
    source: &mut SweepCycle,
    target: &mut SweepCycle,
    sampler: &mut ThresholdSampler,
    settings: &CycleSettings,
    frames: &mut Vec<SweepFrame>,
) {
    // Checked every frame and never consumed: the source stays armed until
    // its own cycle ends, so a short target cycle can be restarted again.
    if source.is_armed() && target.phase() == SweepPhase::Idle {
        let geometry = target.start(settings, sampler.sample());
        frames.push(SweepFrame {
            bar: target.bar(),
            geometry,
        });
    }
}

fn deliver(
    frames: impl IntoIterator<Item = SweepFrame>,
    bridge: &RenderBridge,
    stop: &StopSignal,
) -> Result<(), EngineExit> {
    for frame in frames {
        bridge.apply(frame.into(), stop)?;
    }
    Ok(())
}

/// Engine body for indeterminate mode.
///
/// `seed` makes threshold draws reproducible.
pub fn run_indeterminate(
    model: Arc<TimingModel>,
    bridge: RenderBridge,
    stop: StopSignal,
    seed: Option<u64>,
) -> EngineExit {
    let settings = CycleSettings::from_model(&model);
    let mut driver = IndeterminateDriver::new(ThresholdSampler::from_seed(seed), &settings);

    let first = driver.begin(&settings);
    if let Some(exit) = check(contain_tick(|| deliver([first], &bridge, &stop))) {
        return exit;
    }

    let mut last = Instant::now();
    loop {
        if stop.wait_timeout(FRAME_PERIOD) {
            return EngineExit::Cancelled;
        }
        let now = Instant::now();
        let dt = now.saturating_duration_since(last);
        last = now;

        let frame = contain_tick(|| {
            let settings = CycleSettings::from_model(&model);
            let frames = driver.advance(dt, &settings);
            tracing::trace!(frames = frames.len(), "sweep frame");
            deliver(frames, &bridge, &stop)
        });
        if let Some(exit) = check(frame) {
            return exit;
        }
    }
}

fn check(result: Result<Result<(), EngineExit>, String>) -> Option<EngineExit> {
    let exit = match result {
        Ok(Ok(())) => return None,
        Ok(Err(exit)) => exit,
        Err(msg) => EngineExit::Faulted(msg),
    };
    if exit.is_fault() {
        tracing::error!(%exit, "sweep driver stopped on fault");
    }
    Some(exit)
}
