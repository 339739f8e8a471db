#![forbid(unsafe_code)]

//! Determinate driver.
//!
//! Moves the determinate bar toward the width implied by the current value,
//! one pixel per tick. The target is recomputed at the start of every tick,
//! so a value change mid-animation retargets smoothly from the current width.
//!
//! Tick order: read target, deliver the current width, wait one rate period
//! (observing the stop signal), then step. When the bar is already at the
//! target the driver idles until the target generation or the track width
//! changes.

use std::sync::Arc;
use std::time::Duration;

use sweepline_core::TimingModel;

use crate::bridge::RenderBridge;
use crate::engine::{EngineExit, StopSignal, contain_tick};
use crate::surface::{BarSlot, SurfaceUpdate};

/// Poll period while idle at the target.
const IDLE_POLL: Duration = Duration::from_millis(4);

/// Width state of the determinate bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeterminateDriver {
    width: u32,
}

impl DeterminateDriver {
    /// Driver starting at width 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bar width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Move one pixel toward `target`. Returns `false` when already there.
    pub fn step_toward(&mut self, target: u32) -> bool {
        match self.width.cmp(&target) {
            std::cmp::Ordering::Less => {
                self.width += 1;
                true
            }
            std::cmp::Ordering::Greater => {
                self.width -= 1;
                true
            }
            std::cmp::Ordering::Equal => false,
        }
    }
}

#[derive(Debug)]
enum Tick {
    Moved,
    Settled { generation: u64, track: u32 },
    Stopped,
}

fn tick(
    driver: &mut DeterminateDriver,
    model: &TimingModel,
    bridge: &RenderBridge,
    stop: &StopSignal,
) -> Result<Tick, EngineExit> {
    let generation = model.target_generation();
    let track = model.track_width();
    let target = model.target_width();

    bridge.apply(
        SurfaceUpdate::Determinate {
            width_px: driver.width(),
        },
        stop,
    )?;

    let rate = model.determinate_rate();
    let stopped = if rate.is_immediate() {
        stop.is_stopped()
    } else {
        stop.wait_timeout(rate.as_duration())
    };
    if stopped {
        return Ok(Tick::Stopped);
    }

    if driver.step_toward(target) {
        Ok(Tick::Moved)
    } else {
        Ok(Tick::Settled { generation, track })
    }
}

/// Wait until the target may have moved. Returns the exit reason if the
/// engine should end instead.
fn idle(
    model: &TimingModel,
    bridge: &RenderBridge,
    stop: &StopSignal,
    generation: u64,
    track: u32,
) -> Option<EngineExit> {
    loop {
        if stop.wait_timeout(IDLE_POLL) {
            return Some(EngineExit::Cancelled);
        }
        if let Some(msg) = bridge.take_fault(BarSlot::Determinate) {
            return Some(EngineExit::Faulted(msg));
        }
        if model.target_generation() != generation || model.track_width() != track {
            return None;
        }
    }
}

/// Engine body for determinate mode.
pub fn run_determinate(
    model: Arc<TimingModel>,
    bridge: RenderBridge,
    stop: StopSignal,
) -> EngineExit {
    let mut driver = DeterminateDriver::new();
    loop {
        let outcome = match contain_tick(|| tick(&mut driver, &model, &bridge, &stop)) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(exit)) => return log_exit(exit),
            Err(msg) => return log_exit(EngineExit::Faulted(msg)),
        };
        match outcome {
            Tick::Moved => {
                tracing::trace!(width = driver.width(), "determinate step");
            }
            Tick::Settled { generation, track } => {
                tracing::trace!(width = driver.width(), "determinate idle");
                if let Some(exit) = idle(&model, &bridge, &stop, generation, track) {
                    return log_exit(exit);
                }
            }
            Tick::Stopped => return EngineExit::Cancelled,
        }
    }
}

fn log_exit(exit: EngineExit) -> EngineExit {
    if exit.is_fault() {
        tracing::error!(%exit, "determinate driver stopped on fault");
    }
    exit
}
