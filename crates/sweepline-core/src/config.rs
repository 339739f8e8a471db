#![forbid(unsafe_code)]

//! Indicator configuration.
//!
//! [`IndicatorConfig`] carries everything the host supplies at construction:
//! mode, value range, both animation rates, sweep direction, and the two
//! colors. Every field maps onto a runtime setter with the same effect.
//!
//! Configuration can also be overlaid from the environment with
//! [`IndicatorConfig::from_env`], which is handy for tuning rates without
//! rebuilding the host:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `SWEEPLINE_MODE` | `determinate` or `indeterminate` |
//! | `SWEEPLINE_DETERMINATE_RATE_MS` | fractional ms per pixel step |
//! | `SWEEPLINE_INDETERMINATE_RATE_MS` | sweep duration in ms |
//! | `SWEEPLINE_SWEEP_RTL` | `1`/`0`/`true`/`false` |
//! | `SWEEPLINE_MIN_VALUE`, `SWEEPLINE_MAX_VALUE` | value range |

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{ConfigError, EnvConfigError};

/// Default time per one-pixel step in determinate mode.
pub const DEFAULT_DETERMINATE_RATE_MS: f32 = 1.5;
/// Default sweep duration in indeterminate mode.
pub const DEFAULT_INDETERMINATE_RATE_MS: u32 = 800;

const ENV_MODE: &str = "SWEEPLINE_MODE";
const ENV_DETERMINATE_RATE: &str = "SWEEPLINE_DETERMINATE_RATE_MS";
const ENV_INDETERMINATE_RATE: &str = "SWEEPLINE_INDETERMINATE_RATE_MS";
const ENV_SWEEP_RTL: &str = "SWEEPLINE_SWEEP_RTL";
const ENV_MIN_VALUE: &str = "SWEEPLINE_MIN_VALUE";
const ENV_MAX_VALUE: &str = "SWEEPLINE_MAX_VALUE";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which driver renders the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IndicatorMode {
    /// Bar width tracks a value.
    #[default]
    Determinate,
    /// Two bars sweep continuously.
    Indeterminate,
}

impl IndicatorMode {
    /// Parse `determinate` / `indeterminate` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "determinate" => Some(Self::Determinate),
            "indeterminate" => Some(Self::Indeterminate),
            _ => None,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Determinate => 0,
            Self::Indeterminate => 1,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        if raw == 1 {
            Self::Indeterminate
        } else {
            Self::Determinate
        }
    }
}

impl fmt::Display for IndicatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Determinate => f.write_str("determinate"),
            Self::Indeterminate => f.write_str("indeterminate"),
        }
    }
}

/// Direction of travel for indeterminate sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SweepDirection {
    /// Bars enter at the left edge and leave at the right.
    #[default]
    Ltr,
    /// Bars enter at the right edge and leave at the left.
    Rtl,
}

impl SweepDirection {
    /// `Rtl` when `rtl` is set, otherwise `Ltr`.
    pub fn from_rtl(rtl: bool) -> Self {
        if rtl { Self::Rtl } else { Self::Ltr }
    }

    /// Whether this is right-to-left.
    pub fn is_rtl(self) -> bool {
        self == Self::Rtl
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// A packed ARGB color, handed to the surface untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color(u32);

impl Color {
    /// Default color of the animated bars.
    pub const DEFAULT_BAR: Self = Self(0xFF03_A9F4);
    /// Default color of the track behind the bars.
    pub const DEFAULT_TRACK: Self = Self(0xFFB3_E5FC);

    /// Build from packed `0xAARRGGBB`.
    pub const fn from_argb(argb: u32) -> Self {
        Self(argb)
    }

    /// Opaque color from channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    /// Packed `0xAARRGGBB`.
    pub const fn argb(self) -> u32 {
        self.0
    }

    /// Alpha channel.
    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }
}

// ---------------------------------------------------------------------------
// Determinate rate
// ---------------------------------------------------------------------------

/// Time per one-pixel step in determinate mode.
///
/// Stored as fractional milliseconds and split into a whole-millisecond
/// component and a sub-millisecond component when converted to a sleep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeterminateRate {
    millis: f32,
}

impl DeterminateRate {
    /// No delay between steps.
    pub const IMMEDIATE: Self = Self { millis: 0.0 };

    /// Validate and wrap a fractional millisecond rate.
    pub fn from_millis(millis: f32) -> Result<Self, ConfigError> {
        if !millis.is_finite() || millis < 0.0 {
            return Err(ConfigError::InvalidRate {
                field: "determinate rate",
                value: f64::from(millis),
            });
        }
        Ok(Self { millis })
    }

    /// The rate as given, in fractional milliseconds.
    pub fn as_millis_f32(self) -> f32 {
        self.millis
    }

    /// Whole milliseconds.
    pub fn millis_part(self) -> u64 {
        self.millis.trunc() as u64
    }

    /// Sub-millisecond remainder, in nanoseconds.
    pub fn nanos_part(self) -> u32 {
        ((self.millis % 1.0) * 1_000_000.0) as u32
    }

    /// Both components are zero: steps run back to back.
    pub fn is_immediate(self) -> bool {
        self.millis_part() == 0 && self.nanos_part() == 0
    }

    /// Sleep between steps.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.millis_part()) + Duration::from_nanos(u64::from(self.nanos_part()))
    }
}

impl Default for DeterminateRate {
    fn default() -> Self {
        Self {
            millis: DEFAULT_DETERMINATE_RATE_MS,
        }
    }
}

// ---------------------------------------------------------------------------
// IndicatorConfig
// ---------------------------------------------------------------------------

/// Construction-time configuration of a progress indicator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IndicatorConfig {
    /// Initial mode.
    pub mode: IndicatorMode,
    /// Value mapped to an empty bar.
    pub min_value: f64,
    /// Value mapped to a full bar.
    pub max_value: f64,
    /// Initial determinate value.
    pub value: f64,
    /// Fractional milliseconds per one-pixel step.
    pub determinate_rate_ms: f32,
    /// Duration of one sweep cycle in milliseconds.
    pub indeterminate_rate_ms: u32,
    /// Direction of indeterminate sweeps.
    pub sweep_direction: SweepDirection,
    /// Color of the animated bars.
    pub bar_color: Color,
    /// Color of the track.
    pub track_color: Color,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            mode: IndicatorMode::Determinate,
            min_value: 0.0,
            max_value: 100.0,
            value: 0.0,
            determinate_rate_ms: DEFAULT_DETERMINATE_RATE_MS,
            indeterminate_rate_ms: DEFAULT_INDETERMINATE_RATE_MS,
            sweep_direction: SweepDirection::Ltr,
            bar_color: Color::DEFAULT_BAR,
            track_color: Color::DEFAULT_TRACK,
        }
    }
}

/// Result of reading configuration from the environment.
#[derive(Debug, Clone)]
pub struct ConfigParse {
    /// Defaults with every valid override applied.
    pub config: IndicatorConfig,
    /// One entry per variable that failed to parse.
    pub errors: Vec<EnvConfigError>,
}

impl IndicatorConfig {
    /// Set the initial mode.
    #[must_use]
    pub fn with_mode(mut self, mode: IndicatorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the value range.
    #[must_use]
    pub fn with_range(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    /// Set the initial determinate value.
    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    /// Set the determinate step rate in fractional milliseconds.
    #[must_use]
    pub fn with_determinate_rate(mut self, millis: f32) -> Self {
        self.determinate_rate_ms = millis;
        self
    }

    /// Set the sweep duration in milliseconds.
    #[must_use]
    pub fn with_indeterminate_rate(mut self, millis: u32) -> Self {
        self.indeterminate_rate_ms = millis;
        self
    }

    /// Set the sweep direction.
    #[must_use]
    pub fn with_sweep_direction(mut self, direction: SweepDirection) -> Self {
        self.sweep_direction = direction;
        self
    }

    /// Set the bar and track colors.
    #[must_use]
    pub fn with_colors(mut self, bar: Color, track: Color) -> Self {
        self.bar_color = bar;
        self.track_color = track;
        self
    }

    /// Validated determinate rate.
    pub fn determinate_rate(&self) -> Result<DeterminateRate, ConfigError> {
        DeterminateRate::from_millis(self.determinate_rate_ms)
    }

    /// Check every invariant and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if let Err(err) = check_range(self.min_value, self.max_value) {
            errors.push(err);
        }
        if let Err(err) = self.determinate_rate() {
            errors.push(err);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Defaults overlaid with `SWEEPLINE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with_diagnostics().config
    }

    /// Like [`from_env`](Self::from_env), also returning parse diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> ConfigParse {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Overlay defaults using an arbitrary variable lookup.
    pub fn from_env_with<F>(mut get: F) -> ConfigParse
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut errors = Vec::new();

        if let Some(value) = get(ENV_MODE) {
            match IndicatorMode::parse(&value) {
                Some(mode) => config.mode = mode,
                None => errors.push(EnvConfigError::new(
                    ENV_MODE,
                    value,
                    "expected determinate|indeterminate",
                )),
            }
        }

        if let Some(value) = get(ENV_DETERMINATE_RATE) {
            match value.trim().parse::<f32>().ok().filter(|v| v.is_finite() && *v >= 0.0) {
                Some(rate) => config.determinate_rate_ms = rate,
                None => errors.push(EnvConfigError::new(
                    ENV_DETERMINATE_RATE,
                    value,
                    "expected non-negative milliseconds",
                )),
            }
        }

        if let Some(value) = get(ENV_INDETERMINATE_RATE) {
            match value.trim().parse::<u32>() {
                Ok(rate) => config.indeterminate_rate_ms = rate,
                Err(_) => errors.push(EnvConfigError::new(
                    ENV_INDETERMINATE_RATE,
                    value,
                    "expected whole milliseconds",
                )),
            }
        }

        if let Some(value) = get(ENV_SWEEP_RTL) {
            match parse_bool(&value) {
                Some(rtl) => config.sweep_direction = SweepDirection::from_rtl(rtl),
                None => errors.push(EnvConfigError::new(
                    ENV_SWEEP_RTL,
                    value,
                    "expected bool (1/0/true/false)",
                )),
            }
        }

        let mut min_value = config.min_value;
        let mut max_value = config.max_value;
        for (key, slot) in [(ENV_MIN_VALUE, &mut min_value), (ENV_MAX_VALUE, &mut max_value)] {
            if let Some(value) = get(key) {
                match value.trim().parse::<f64>().ok().filter(|v| v.is_finite()) {
                    Some(parsed) => *slot = parsed,
                    None => errors.push(EnvConfigError::new(key, value, "expected a number")),
                }
            }
        }
        if check_range(min_value, max_value).is_ok() {
            config.min_value = min_value;
            config.max_value = max_value;
        } else {
            errors.push(EnvConfigError::new(
                ENV_MIN_VALUE,
                format!("{min_value}..{max_value}"),
                "min must be below max",
            ));
        }

        ConfigParse { config, errors }
    }
}

/// `Ok` when `min < max` and both are finite.
pub fn check_range(min: f64, max: f64) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(ConfigError::InvalidRange { min, max })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> ConfigParse {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        IndicatorConfig::from_env_with(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_widget_defaults() {
        let config = IndicatorConfig::default();
        assert_eq!(config.mode, IndicatorMode::Determinate);
        assert_eq!(config.min_value, 0.0);
        assert_eq!(config.max_value, 100.0);
        assert_eq!(config.indeterminate_rate_ms, 800);
        assert!((config.determinate_rate_ms - 1.5).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn determinate_rate_splits_components() {
        let rate = DeterminateRate::from_millis(1.5).expect("valid");
        assert_eq!(rate.millis_part(), 1);
        assert_eq!(rate.nanos_part(), 500_000);
        assert_eq!(rate.as_duration(), Duration::from_micros(1500));
        assert!(!rate.is_immediate());
    }

    #[test]
    fn determinate_rate_sub_millisecond_only() {
        let rate = DeterminateRate::from_millis(0.25).expect("valid");
        assert_eq!(rate.millis_part(), 0);
        assert_eq!(rate.nanos_part(), 250_000);
        assert!(!rate.is_immediate());
    }

    #[test]
    fn zero_rate_is_immediate() {
        assert!(DeterminateRate::IMMEDIATE.is_immediate());
        assert_eq!(DeterminateRate::IMMEDIATE.as_duration(), Duration::ZERO);
    }

    #[test]
    fn negative_or_nan_rate_rejected() {
        assert!(DeterminateRate::from_millis(-1.0).is_err());
        assert!(DeterminateRate::from_millis(f32::NAN).is_err());
        assert!(DeterminateRate::from_millis(f32::INFINITY).is_err());
    }

    #[test]
    fn validate_reports_every_violation() {
        let config = IndicatorConfig::default()
            .with_range(5.0, 5.0)
            .with_determinate_rate(-2.0);
        let errors = config.validate().expect_err("two violations");
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ConfigError::InvalidRange { .. }));
        assert!(matches!(errors[1], ConfigError::InvalidRate { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let parsed = parse(&[
            ("SWEEPLINE_MODE", "Indeterminate"),
            ("SWEEPLINE_DETERMINATE_RATE_MS", "0.5"),
            ("SWEEPLINE_INDETERMINATE_RATE_MS", "1200"),
            ("SWEEPLINE_SWEEP_RTL", "true"),
            ("SWEEPLINE_MIN_VALUE", "10"),
            ("SWEEPLINE_MAX_VALUE", "20"),
        ]);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let config = parsed.config;
        assert_eq!(config.mode, IndicatorMode::Indeterminate);
        assert!((config.determinate_rate_ms - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.indeterminate_rate_ms, 1200);
        assert_eq!(config.sweep_direction, SweepDirection::Rtl);
        assert_eq!((config.min_value, config.max_value), (10.0, 20.0));
    }

    #[test]
    fn env_invalid_values_keep_defaults() {
        let parsed = parse(&[
            ("SWEEPLINE_MODE", "buffer"),
            ("SWEEPLINE_DETERMINATE_RATE_MS", "-1"),
            ("SWEEPLINE_SWEEP_RTL", "maybe"),
        ]);
        assert_eq!(parsed.errors.len(), 3);
        assert_eq!(parsed.config, IndicatorConfig::default());
    }

    #[test]
    fn env_inverted_range_is_rejected_as_a_pair() {
        let parsed = parse(&[("SWEEPLINE_MIN_VALUE", "500")]);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.config.min_value, 0.0);
        assert_eq!(parsed.config.max_value, 100.0);
    }

    #[test]
    fn mode_round_trips_through_u8() {
        for mode in [IndicatorMode::Determinate, IndicatorMode::Indeterminate] {
            assert_eq!(IndicatorMode::from_u8(mode.to_u8()), mode);
        }
    }

    #[test]
    fn color_channels() {
        let c = Color::rgb(0x12, 0x34, 0x56);
        assert_eq!(c.argb(), 0xFF12_3456);
        assert_eq!(c.alpha(), 0xFF);
    }
}
