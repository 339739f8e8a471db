#![forbid(unsafe_code)]

//! The host-facing progress indicator.
//!
//! [`ProgressIndicator`] ties the shared [`TimingModel`], the UI context and
//! the lifecycle controller together. Every method may be called from any
//! thread. Setters that only change timing write the model and take effect on
//! the next tick or cycle; setters that change what the engine *is* (mode,
//! direction, visibility) go through the lifecycle controller.

use std::sync::{Arc, Mutex, MutexGuard};

use sweepline_core::{
    Color, ConfigError, DeterminateRate, IndicatorConfig, IndicatorMode, SweepDirection,
    TimingModel,
};

use crate::bridge::{BridgeError, RenderBridge, UiContext, VISIBILITY_DURATION};
use crate::engine::{EngineStats, EngineStatsSnapshot};
use crate::error::IndicatorError;
use crate::lifecycle::{Lifecycle, LifecycleState, StartError, StopReason};
use crate::surface::{Surface, SurfaceUpdate};

/// A two-mode progress indicator.
///
/// # Example
///
/// ```
/// use sweepline_runtime::{ProgressIndicator, RecordingSurface};
/// use sweepline_core::IndicatorConfig;
///
/// let (surface, log) = RecordingSurface::new();
/// let indicator = ProgressIndicator::new(
///     IndicatorConfig::default().with_determinate_rate(0.0),
///     surface,
/// )?;
/// indicator.on_layout(200);
/// indicator.set_value(50.0);
/// # indicator.stop();
/// # indicator.flush()?;
/// # let _ = log;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ProgressIndicator {
    model: Arc<TimingModel>,
    stats: Arc<EngineStats>,
    // Dropped before `ui` so the engine is joined while the UI context runs.
    lifecycle: Mutex<Lifecycle>,
    bridge: RenderBridge,
    ui: UiContext,
}

impl std::fmt::Debug for ProgressIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressIndicator")
            .field("config", &self.model.snapshot())
            .field("lifecycle", &*self.lifecycle())
            .field("ui", &self.ui)
            .finish()
    }
}

impl ProgressIndicator {
    /// Validate `config`, spawn the UI context and hand it `surface`.
    ///
    /// No engine runs until layout reports a track width.
    pub fn new(
        config: IndicatorConfig,
        surface: impl Surface + 'static,
    ) -> Result<Self, IndicatorError> {
        Self::build(config, Box::new(surface), None)
    }

    /// Like [`new`](Self::new), with reproducible sweep thresholds.
    pub fn with_threshold_seed(
        config: IndicatorConfig,
        surface: impl Surface + 'static,
        seed: u64,
    ) -> Result<Self, IndicatorError> {
        Self::build(config, Box::new(surface), Some(seed))
    }

    fn build(
        config: IndicatorConfig,
        surface: Box<dyn Surface>,
        seed: Option<u64>,
    ) -> Result<Self, IndicatorError> {
        config.validate().map_err(|errors| {
            tracing::warn!(count = errors.len(), "rejected indicator configuration");
            IndicatorError::InvalidConfig(errors)
        })?;

        let model = Arc::new(TimingModel::new(&config));
        let ui = UiContext::spawn(surface)?;
        let bridge = ui.bridge();
        let stats = Arc::new(EngineStats::default());
        let lifecycle = Lifecycle::new(
            Arc::clone(&model),
            bridge.clone(),
            Arc::clone(&stats),
            seed,
        );
        let paint = SurfaceUpdate::Colors {
            bar: config.bar_color,
            track: config.track_color,
        };
        if let Err(err) = bridge.post(paint) {
            tracing::warn!(%err, "initial colors not delivered");
        }
        lifecycle.reset_bars();
        tracing::debug!(mode = %config.mode, "progress indicator created");

        Ok(Self {
            model,
            stats,
            lifecycle: Mutex::new(lifecycle),
            bridge,
            ui,
        })
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn report_start(result: Result<(), StartError>) {
        match result {
            Ok(()) => {}
            Err(err) if err.is_pending() => tracing::trace!(%err, "start pending"),
            Err(err) => tracing::error!(%err, "engine start failed"),
        }
    }

    // --- mode ---------------------------------------------------------------

    /// Switch modes. A running engine is stopped and restarted in the new
    /// mode.
    pub fn set_mode(&self, mode: IndicatorMode) {
        let mut lifecycle = self.lifecycle();
        if self.model.set_mode(mode) {
            lifecycle.stop(StopReason::ModeChange);
        }
    }

    pub fn mode(&self) -> IndicatorMode {
        self.model.mode()
    }

    // --- value and range ----------------------------------------------------

    /// Set the determinate value. Starts the engine if it is stopped and the
    /// indicator is visible.
    pub fn set_value(&self, value: f64) {
        let mut lifecycle = self.lifecycle();
        self.model.set_value(value);
        if lifecycle.state() == LifecycleState::Stopped && lifecycle.is_visible() {
            Self::report_start(lifecycle.request_start());
        }
    }

    pub fn value(&self) -> f64 {
        self.model.value()
    }

    pub fn set_min_value(&self, min: f64) -> Result<(), IndicatorError> {
        self.model.set_min_value(min).map_err(Self::rejected)
    }

    pub fn set_max_value(&self, max: f64) -> Result<(), IndicatorError> {
        self.model.set_max_value(max).map_err(Self::rejected)
    }

    /// Replace both bounds at once; use this when the new range does not
    /// overlap the old one.
    pub fn set_range(&self, min: f64, max: f64) -> Result<(), IndicatorError> {
        self.model.set_range(min, max).map_err(Self::rejected)
    }

    pub fn min_value(&self) -> f64 {
        self.model.min_value()
    }

    pub fn max_value(&self) -> f64 {
        self.model.max_value()
    }

    fn rejected(err: ConfigError) -> IndicatorError {
        tracing::warn!(%err, "rejected setting");
        IndicatorError::Config(err)
    }

    // --- rates --------------------------------------------------------------

    /// Milliseconds per one-pixel step; takes effect on the next tick.
    pub fn set_determinate_rate(&self, millis: f32) -> Result<(), IndicatorError> {
        self.model
            .set_determinate_rate(millis)
            .map_err(Self::rejected)
    }

    pub fn determinate_rate(&self) -> DeterminateRate {
        self.model.determinate_rate()
    }

    /// Sweep duration; takes effect on each bar's next cycle.
    pub fn set_indeterminate_rate(&self, millis: u32) {
        self.model.set_indeterminate_rate_ms(millis);
    }

    pub fn indeterminate_rate(&self) -> u32 {
        self.model.indeterminate_rate_ms()
    }

    // --- direction ----------------------------------------------------------

    /// Change the sweep direction. A running engine restarts.
    pub fn set_sweep_direction(&self, direction: SweepDirection) {
        let mut lifecycle = self.lifecycle();
        if self.model.set_sweep_direction(direction) {
            lifecycle.stop(StopReason::DirectionChange);
        }
    }

    pub fn is_sweep_rtl(&self) -> bool {
        self.model.sweep_direction().is_rtl()
    }

    // --- visibility and lifecycle -------------------------------------------

    /// Show or hide the indicator.
    ///
    /// Showing plays the reveal animation unless an engine is already live,
    /// then starts the engine. Hiding plays the collapse animation and stops
    /// the engine.
    pub fn show(&self, visible: bool) {
        let mut lifecycle = self.lifecycle();
        if visible {
            let replay = !lifecycle.has_engine();
            lifecycle.set_visible(true);
            if replay {
                self.animate(0.0, 1.0);
            }
            Self::report_start(lifecycle.request_start());
        } else {
            lifecycle.set_visible(false);
            self.animate(1.0, 0.0);
            lifecycle.stop(StopReason::Hidden);
        }
    }

    fn animate(&self, from: f32, to: f32) {
        if let Err(err) = self.bridge.animate_visibility(from, to, VISIBILITY_DURATION) {
            tracing::debug!(%err, "visibility animation dropped");
        }
    }

    pub fn is_visible(&self) -> bool {
        self.lifecycle().is_visible()
    }

    /// Halt animation and reset the bars to their pre-start pose.
    pub fn stop(&self) {
        self.lifecycle().stop(StopReason::Requested);
    }

    /// Host layout callback.
    pub fn on_layout(&self, track_px: u32) {
        let mut lifecycle = self.lifecycle();
        self.model.set_track_width(track_px);
        Self::report_start(lifecycle.on_layout(track_px));
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle().state()
    }

    pub fn engine_stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn track_width(&self) -> u32 {
        self.model.track_width()
    }

    /// Repaint the bars and track.
    pub fn set_colors(&self, bar: Color, track: Color) {
        let _lifecycle = self.lifecycle();
        self.model.set_colors(bar, track);
        if let Err(err) = self.bridge.post(SurfaceUpdate::Colors { bar, track }) {
            tracing::warn!(%err, "colors not delivered");
        }
    }

    pub fn bar_color(&self) -> Color {
        self.model.bar_color()
    }

    pub fn track_color(&self) -> Color {
        self.model.track_color()
    }

    /// Current settings.
    pub fn config(&self) -> IndicatorConfig {
        self.model.snapshot()
    }

    /// Wait until every update queued so far has reached the surface.
    pub fn flush(&self) -> Result<(), BridgeError> {
        self.bridge.flush()
    }
}
