#![forbid(unsafe_code)]

//! Lifecycle controller.
//!
//! Owns the single [`EngineHandle`] and decides when engines start, stop and
//! restart.
//!
//! ```text
//! Stopped ──start──▶ Starting ──joined, track > 0, visible──▶ Running(mode)
//!    ▲                  ▲                                        │
//!    │                  └──── mode or direction change ──── Stopping
//!    │                                                           │
//!    └──────────── hide, stop(), engine fault ◀─────────────────┘
//! ```
//!
//! Every transition that ends an engine goes through *trigger, then join*,
//! so a replacement engine is spawned only after the old thread has exited.
//! After every stop the bars are put back in their pre-start pose.

use std::fmt;
use std::io;
use std::sync::Arc;

use sweepline_core::{IndicatorMode, SweepBar, SweepPath, TimingModel};

use crate::bridge::RenderBridge;
use crate::determinate::run_determinate;
use crate::engine::{EngineExit, EngineHandle, EngineStats};
use crate::indeterminate::run_indeterminate;
use crate::surface::SurfaceUpdate;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No engine; nothing pending.
    Stopped,
    /// A start was requested and is waiting for layout or visibility.
    Starting,
    /// An engine is live.
    Running(IndicatorMode),
    /// An engine is being joined.
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Starting => f.write_str("starting"),
            Self::Running(mode) => write!(f, "running({mode})"),
            Self::Stopping => f.write_str("stopping"),
        }
    }
}

/// Why an engine is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ModeChange,
    DirectionChange,
    Hidden,
    Requested,
}

impl StopReason {
    /// Whether the controller starts a fresh engine after stopping.
    pub fn restarts(self) -> bool {
        matches!(self, Self::ModeChange | Self::DirectionChange)
    }
}

/// Why a start did not reach `Running`.
#[derive(Debug)]
pub enum StartError {
    /// Layout has not reported a track width yet.
    ZeroTrackWidth,
    /// The indicator is hidden.
    Hidden,
    /// The engine thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroTrackWidth => f.write_str("track width is zero"),
            Self::Hidden => f.write_str("indicator is hidden"),
            Self::Spawn(err) => write!(f, "failed to spawn engine: {err}"),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl StartError {
    /// Whether the start is still pending (the controller stays `Starting`).
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::ZeroTrackWidth | Self::Hidden)
    }
}

/// The controller. Not thread-safe on its own; the indicator wraps it in a
/// mutex.
pub struct Lifecycle {
    state: LifecycleState,
    engine: Option<EngineHandle>,
    visible: bool,
    started_once: bool,
    next_engine_id: u64,
    model: Arc<TimingModel>,
    bridge: RenderBridge,
    stats: Arc<EngineStats>,
    seed: Option<u64>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("visible", &self.visible)
            .field("started_once", &self.started_once)
            .finish()
    }
}

impl Lifecycle {
    /// A stopped, visible controller.
    ///
    /// `seed`, when given, makes sweep thresholds reproducible across engines.
    pub fn new(
        model: Arc<TimingModel>,
        bridge: RenderBridge,
        stats: Arc<EngineStats>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            state: LifecycleState::Stopped,
            engine: None,
            visible: true,
            started_once: false,
            next_engine_id: 0,
            model,
            bridge,
            stats,
            seed,
        }
    }

    /// Current state, after reaping an engine that ended on its own.
    pub fn state(&mut self) -> LifecycleState {
        self.reap();
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether an engine thread is currently owned.
    pub fn has_engine(&mut self) -> bool {
        self.reap();
        self.engine.is_some()
    }

    /// Id of the live engine, if any.
    pub fn engine_id(&self) -> Option<u64> {
        self.engine.as_ref().map(EngineHandle::id)
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "lifecycle transition");
            self.state = next;
        }
    }

    /// Ask for an engine. A no-op while one is already running.
    pub fn request_start(&mut self) -> Result<(), StartError> {
        self.reap();
        if let LifecycleState::Running(_) = self.state {
            return Ok(());
        }
        self.transition(LifecycleState::Starting);
        self.try_complete_start()
    }

    /// Finish a pending start if layout and visibility allow it.
    pub fn try_complete_start(&mut self) -> Result<(), StartError> {
        if self.state != LifecycleState::Starting {
            return Ok(());
        }
        if let Some(previous) = self.engine.take() {
            let exit = previous.stop();
            self.log_exit(&exit);
        }
        if !self.visible {
            return Err(StartError::Hidden);
        }
        if self.model.track_width() == 0 {
            return Err(StartError::ZeroTrackWidth);
        }

        self.bridge.reset_gates();
        let mode = self.model.mode();
        let id = self.next_engine_id;
        self.next_engine_id += 1;
        let model = Arc::clone(&self.model);
        let bridge = self.bridge.clone();
        let stats = Arc::clone(&self.stats);

        let spawned = match mode {
            IndicatorMode::Determinate => {
                EngineHandle::spawn(id, mode, stats, move |stop| {
                    run_determinate(model, bridge, stop)
                })
            }
            IndicatorMode::Indeterminate => {
                let seed = self.seed.map(|s| s.wrapping_add(id));
                EngineHandle::spawn(id, mode, stats, move |stop| {
                    run_indeterminate(model, bridge, stop, seed)
                })
            }
        };

        match spawned {
            Ok(engine) => {
                self.engine = Some(engine);
                self.started_once = true;
                self.transition(LifecycleState::Running(mode));
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to spawn engine");
                self.transition(LifecycleState::Stopped);
                Err(StartError::Spawn(err))
            }
        }
    }

    /// Stop the engine, reset the bars and, for mode or direction changes,
    /// start again with the new settings.
    ///
    /// Returns how the engine ended, if one was live.
    pub fn stop(&mut self, reason: StopReason) -> Option<EngineExit> {
        let was_active = matches!(
            self.state,
            LifecycleState::Running(_) | LifecycleState::Starting
        );
        self.transition(LifecycleState::Stopping);
        let exit = self.engine.take().map(EngineHandle::stop);
        if let Some(exit) = &exit {
            self.log_exit(exit);
        }
        self.reset_bars();

        if reason.restarts() && was_active {
            self.transition(LifecycleState::Starting);
            if let Err(err) = self.try_complete_start() {
                tracing::debug!(%err, ?reason, "restart deferred");
            }
        } else {
            self.transition(LifecycleState::Stopped);
        }
        exit
    }

    /// Host layout callback; `model` already holds the new width.
    pub fn on_layout(&mut self, track_px: u32) -> Result<(), StartError> {
        self.reap();
        match self.state {
            LifecycleState::Starting => self.try_complete_start(),
            LifecycleState::Stopped if !self.started_once && self.visible && track_px > 0 => {
                self.request_start()
            }
            _ => Ok(()),
        }
    }

    /// Collect an engine that exited without being asked to.
    pub fn reap(&mut self) {
        if !self.engine.as_ref().is_some_and(EngineHandle::is_finished) {
            return;
        }
        if let Some(engine) = self.engine.take() {
            let exit = engine.stop();
            self.log_exit(&exit);
            self.reset_bars();
            self.transition(LifecycleState::Stopped);
        }
    }

    /// Put every bar in its pre-start pose.
    pub fn reset_bars(&self) {
        let direction = self.model.sweep_direction();
        let track = self.model.track_width();
        let mut updates = vec![SurfaceUpdate::Determinate { width_px: 0 }];
        updates.extend(SweepBar::ALL.map(|bar| SurfaceUpdate::Sweep {
            bar,
            geometry: SweepPath::new(bar, direction, track).rest_pose(),
        }));
        for update in updates {
            if let Err(err) = self.bridge.post(update) {
                tracing::debug!(%err, "bar reset dropped");
                break;
            }
        }
    }

    fn log_exit(&self, exit: &EngineExit) {
        if exit.is_fault() {
            tracing::warn!(%exit, "engine ended on fault");
        } else {
            tracing::debug!(%exit, "engine ended");
        }
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            let _ = engine.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::UiContext;
    use crate::surface::{RecordingSurface, SurfaceLog};
    use std::thread;
    use std::time::Duration;
    use sweepline_core::{IndicatorConfig, SweepDirection};

    struct Fixture {
        lifecycle: Lifecycle,
        model: Arc<TimingModel>,
        stats: Arc<EngineStats>,
        log: SurfaceLog,
        _ui: UiContext,
    }

    fn fixture(config: IndicatorConfig) -> Fixture {
        let model = Arc::new(TimingModel::new(&config));
        let stats = Arc::new(EngineStats::default());
        let (surface, log) = RecordingSurface::new();
        let ui = UiContext::spawn(Box::new(surface)).expect("spawn ui");
        let lifecycle = Lifecycle::new(Arc::clone(&model), ui.bridge(), Arc::clone(&stats), Some(1));
        Fixture {
            lifecycle,
            model,
            stats,
            log,
            _ui: ui,
        }
    }

    #[test]
    fn start_waits_for_layout() {
        let mut f = fixture(IndicatorConfig::default());
        let err = f.lifecycle.request_start().expect_err("no layout yet");
        assert!(matches!(err, StartError::ZeroTrackWidth));
        assert!(err.is_pending());
        assert_eq!(f.lifecycle.state(), LifecycleState::Starting);

        f.model.set_track_width(100);
        f.lifecycle.on_layout(100).expect("start completes");
        assert_eq!(
            f.lifecycle.state(),
            LifecycleState::Running(IndicatorMode::Determinate)
        );
    }

    #[test]
    fn first_layout_starts_when_never_started() {
        let mut f = fixture(IndicatorConfig::default());
        f.model.set_track_width(50);
        f.lifecycle.on_layout(50).expect("start");
        assert!(matches!(f.lifecycle.state(), LifecycleState::Running(_)));

        f.lifecycle.stop(StopReason::Requested);
        f.lifecycle.on_layout(60).expect("no-op");
        assert_eq!(f.lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn request_start_is_idempotent_while_running() {
        let mut f = fixture(IndicatorConfig::default());
        f.model.set_track_width(100);
        f.lifecycle.request_start().expect("start");
        let id = f.lifecycle.engine_id();
        f.lifecycle.request_start().expect("no-op");
        assert_eq!(f.lifecycle.engine_id(), id);
        assert_eq!(id, Some(0));
    }

    #[test]
    fn mode_change_restarts_with_new_mode() {
        let mut f = fixture(IndicatorConfig::default());
        f.model.set_track_width(100);
        f.lifecycle.request_start().expect("start");
        f.model.set_mode(IndicatorMode::Indeterminate);
        let exit = f.lifecycle.stop(StopReason::ModeChange);
        assert_eq!(exit, Some(EngineExit::Cancelled));
        assert_eq!(
            f.lifecycle.state(),
            LifecycleState::Running(IndicatorMode::Indeterminate)
        );
        assert!(f.stats.snapshot().peak <= 1);
    }

    #[test]
    fn hide_stops_without_restart() {
        let mut f = fixture(IndicatorConfig::default());
        f.model.set_track_width(100);
        f.lifecycle.request_start().expect("start");
        f.lifecycle.set_visible(false);
        f.lifecycle.stop(StopReason::Hidden);
        assert_eq!(f.lifecycle.state(), LifecycleState::Stopped);
        assert!(matches!(
            f.lifecycle.request_start(),
            Err(StartError::Hidden)
        ));
    }

    #[test]
    fn stop_resets_bars_to_direction_aware_pose() {
        let mut f = fixture(
            IndicatorConfig::default()
                .with_mode(IndicatorMode::Indeterminate)
                .with_sweep_direction(SweepDirection::Rtl),
        );
        f.model.set_track_width(200);
        f.lifecycle.request_start().expect("start");
        thread::sleep(Duration::from_millis(40));
        f.lifecycle.stop(StopReason::Requested);
        f.lifecycle.bridge.flush().expect("flush");

        assert_eq!(f.log.last_width(), Some(0));
        let a = f.log.sweep_frames(SweepBar::A);
        let rest = a.last().expect("reset pose");
        assert_eq!(rest.x_px, 200.0);
        assert_eq!(rest.scale_x, 1.0);
    }

    #[test]
    fn faulted_engine_is_reaped_to_stopped() {
        let model = Arc::new(TimingModel::new(
            &IndicatorConfig::default()
                .with_value(100.0)
                .with_determinate_rate(0.0),
        ));
        model.set_track_width(100);
        let stats = Arc::new(EngineStats::default());
        let (surface, _log) = RecordingSurface::new();
        let ui = UiContext::spawn(Box::new(surface.panicking_after(2))).expect("spawn ui");
        let mut lifecycle = Lifecycle::new(Arc::clone(&model), ui.bridge(), Arc::clone(&stats), None);

        lifecycle.request_start().expect("start");
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while lifecycle.state() != LifecycleState::Stopped {
            assert!(std::time::Instant::now() < deadline, "engine never faulted");
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(stats.snapshot().faulted, 1);
        assert_eq!(stats.snapshot().live, 0);
    }
}
