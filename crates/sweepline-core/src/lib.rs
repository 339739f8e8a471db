#![forbid(unsafe_code)]

//! Core: configuration, shared timing model, animation primitives and bar
//! geometry for the Sweepline progress indicator.
//!
//! Nothing in this crate spawns threads or reads a clock. The runtime crate
//! owns the engine threads and drives these types.

pub mod animation;
pub mod config;
pub mod error;
pub mod geometry;
pub mod threshold;
pub mod timing;

pub use config::{Color, DeterminateRate, IndicatorConfig, IndicatorMode, SweepDirection};
pub use error::{ConfigError, EnvConfigError};
pub use geometry::{SweepBar, SweepGeometry, SweepPath, determinate_width};
pub use threshold::ThresholdSampler;
pub use timing::TimingModel;
