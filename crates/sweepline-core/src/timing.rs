#![forbid(unsafe_code)]

//! Shared timing model.
//!
//! [`TimingModel`] is the set of cells the host writes (from any thread) and
//! the running driver reads every tick. Each cell is an independent atomic:
//! a driver reads a field, uses it, and reads it again on the next tick.
//! There is no multi-field transaction and none is needed, because every
//! tick derives its output from one consistent read of each field it uses.
//!
//! Setters that could break the `min < max` invariant validate before
//! storing; rates are validated by [`DeterminateRate`]. Range writers
//! serialize on a lock so that the check and the store happen as one step.
//! Readers never take it.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::config::{
    Color, DeterminateRate, IndicatorConfig, IndicatorMode, SweepDirection, check_range,
};
use crate::error::ConfigError;
use crate::geometry::determinate_width;

/// An `f64` stored as its bit pattern.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Host-mutable state read by the drivers.
#[derive(Debug)]
pub struct TimingModel {
    value: AtomicF64,
    min_value: AtomicF64,
    max_value: AtomicF64,
    range_writer: Mutex<()>,
    determinate_rate_bits: AtomicU32,
    indeterminate_rate_ms: AtomicU32,
    rtl: AtomicBool,
    mode: AtomicU8,
    track_width: AtomicU32,
    target_generation: AtomicU64,
    bar_color: AtomicU32,
    track_color: AtomicU32,
}

impl TimingModel {
    /// Build the model from a configuration.
    ///
    /// The caller is expected to have validated `config`; an invalid range is
    /// stored as given and simply yields zero-width bars.
    pub fn new(config: &IndicatorConfig) -> Self {
        let rate = config.determinate_rate().unwrap_or_default();
        Self {
            value: AtomicF64::new(config.value),
            min_value: AtomicF64::new(config.min_value),
            max_value: AtomicF64::new(config.max_value),
            range_writer: Mutex::new(()),
            determinate_rate_bits: AtomicU32::new(rate.as_millis_f32().to_bits()),
            indeterminate_rate_ms: AtomicU32::new(config.indeterminate_rate_ms),
            rtl: AtomicBool::new(config.sweep_direction.is_rtl()),
            mode: AtomicU8::new(config.mode.to_u8()),
            track_width: AtomicU32::new(0),
            target_generation: AtomicU64::new(0),
            bar_color: AtomicU32::new(config.bar_color.argb()),
            track_color: AtomicU32::new(config.track_color.argb()),
        }
    }

    // --- value ---------------------------------------------------------

    /// Current determinate value, as set by the host.
    pub fn value(&self) -> f64 {
        self.value.load()
    }

    /// Store a new value and bump the target generation.
    pub fn set_value(&self, value: f64) {
        self.value.store(value);
        self.bump_target();
    }

    fn bump_target(&self) {
        self.target_generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Incremented whenever the determinate target may have moved: every
    /// value store (even an unchanged value) and every accepted range change.
    pub fn target_generation(&self) -> u64 {
        self.target_generation.load(Ordering::Acquire)
    }

    /// Lower bound of the value range.
    pub fn min_value(&self) -> f64 {
        self.min_value.load()
    }

    /// Upper bound of the value range.
    pub fn max_value(&self) -> f64 {
        self.max_value.load()
    }

    fn lock_range(&self) -> MutexGuard<'_, ()> {
        self.range_writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace both bounds at once.
    pub fn set_range(&self, min: f64, max: f64) -> Result<(), ConfigError> {
        let _writer = self.lock_range();
        check_range(min, max)?;
        self.min_value.store(min);
        self.max_value.store(max);
        self.bump_target();
        Ok(())
    }

    /// Replace the lower bound, keeping `min < max`.
    pub fn set_min_value(&self, min: f64) -> Result<(), ConfigError> {
        let _writer = self.lock_range();
        check_range(min, self.max_value())?;
        self.min_value.store(min);
        self.bump_target();
        Ok(())
    }

    /// Replace the upper bound, keeping `min < max`.
    pub fn set_max_value(&self, max: f64) -> Result<(), ConfigError> {
        let _writer = self.lock_range();
        check_range(self.min_value(), max)?;
        self.max_value.store(max);
        self.bump_target();
        Ok(())
    }

    // --- rates -----------------------------------------------------------

    /// Determinate step rate.
    pub fn determinate_rate(&self) -> DeterminateRate {
        let millis = f32::from_bits(self.determinate_rate_bits.load(Ordering::Acquire));
        DeterminateRate::from_millis(millis).unwrap_or_default()
    }

    /// Replace the determinate step rate.
    pub fn set_determinate_rate(&self, millis: f32) -> Result<(), ConfigError> {
        let rate = DeterminateRate::from_millis(millis)?;
        self.determinate_rate_bits
            .store(rate.as_millis_f32().to_bits(), Ordering::Release);
        Ok(())
    }

    /// Sweep duration in milliseconds.
    pub fn indeterminate_rate_ms(&self) -> u32 {
        self.indeterminate_rate_ms.load(Ordering::Acquire)
    }

    /// Sweep duration.
    pub fn sweep_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.indeterminate_rate_ms()))
    }

    /// Replace the sweep duration. Running cycles keep their duration.
    pub fn set_indeterminate_rate_ms(&self, millis: u32) {
        self.indeterminate_rate_ms.store(millis, Ordering::Release);
    }

    // --- mode and direction ------------------------------------------------

    /// Current mode.
    pub fn mode(&self) -> IndicatorMode {
        IndicatorMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Store a mode. Returns `true` when it differs from the previous mode.
    pub fn set_mode(&self, mode: IndicatorMode) -> bool {
        self.mode.swap(mode.to_u8(), Ordering::AcqRel) != mode.to_u8()
    }

    /// Current sweep direction.
    pub fn sweep_direction(&self) -> SweepDirection {
        SweepDirection::from_rtl(self.rtl.load(Ordering::Acquire))
    }

    /// Store a direction. Returns `true` when it differs from the previous one.
    pub fn set_sweep_direction(&self, direction: SweepDirection) -> bool {
        self.rtl.swap(direction.is_rtl(), Ordering::AcqRel) != direction.is_rtl()
    }

    // --- layout --------------------------------------------------------------

    /// Track width in pixels; zero until the host reports a layout.
    pub fn track_width(&self) -> u32 {
        self.track_width.load(Ordering::Acquire)
    }

    /// Store the track width reported by layout.
    pub fn set_track_width(&self, width_px: u32) {
        self.track_width.store(width_px, Ordering::Release);
    }

    /// Determinate bar width for the current value, range and track.
    pub fn target_width(&self) -> u32 {
        determinate_width(
            self.value(),
            self.min_value(),
            self.max_value(),
            self.track_width(),
        )
    }

    // --- colors ----------------------------------------------------------

    /// Bar color.
    pub fn bar_color(&self) -> Color {
        Color::from_argb(self.bar_color.load(Ordering::Relaxed))
    }

    /// Track color.
    pub fn track_color(&self) -> Color {
        Color::from_argb(self.track_color.load(Ordering::Relaxed))
    }

    /// Replace both colors.
    pub fn set_colors(&self, bar: Color, track: Color) {
        self.bar_color.store(bar.argb(), Ordering::Relaxed);
        self.track_color.store(track.argb(), Ordering::Relaxed);
    }

    /// Current settings as a configuration value.
    pub fn snapshot(&self) -> IndicatorConfig {
        IndicatorConfig {
            mode: self.mode(),
            min_value: self.min_value(),
            max_value: self.max_value(),
            value: self.value(),
            determinate_rate_ms: self.determinate_rate().as_millis_f32(),
            indeterminate_rate_ms: self.indeterminate_rate_ms(),
            sweep_direction: self.sweep_direction(),
            bar_color: self.bar_color(),
            track_color: self.track_color(),
        }
    }
}

impl Default for TimingModel {
    fn default() -> Self {
        Self::new(&IndicatorConfig::default())
    }
}
