#![forbid(unsafe_code)]

//! Sweepline public facade crate.
//!
//! Re-exports the indicator, its configuration and the surface trait, and
//! offers a prelude for day-to-day usage.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use sweepline_core::{
    Color, ConfigError, DeterminateRate, EnvConfigError, IndicatorConfig, IndicatorMode,
    SweepBar, SweepDirection, SweepGeometry,
};

// --- Runtime re-exports ----------------------------------------------------

pub use sweepline_runtime::{
    BridgeError, EngineStatsSnapshot, IndicatorError, LifecycleState, ProgressIndicator,
    RecordingSurface, Surface, SurfaceLog, SurfaceUpdate,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for Sweepline hosts.
#[derive(Debug)]
pub enum Error {
    /// A configuration value was rejected.
    Config(ConfigError),
    /// The initial configuration failed validation.
    InvalidConfig(Vec<ConfigError>),
    /// A thread could not be spawned.
    Spawn(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::InvalidConfig(errors) => {
                write!(f, "invalid indicator configuration ({} errors)", errors.len())?;
                if let Some(first) = errors.first() {
                    write!(f, ": {first}")?;
                }
                Ok(())
            }
            Self::Spawn(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Spawn(err)
    }
}

impl From<IndicatorError> for Error {
    fn from(err: IndicatorError) -> Self {
        match err {
            IndicatorError::Config(err) => Self::Config(err),
            IndicatorError::InvalidConfig(errors) => Self::InvalidConfig(errors),
            IndicatorError::Spawn(err) => Self::Spawn(err),
        }
    }
}

/// Standard result type for Sweepline APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Color, Error, IndicatorConfig, IndicatorMode, LifecycleState, ProgressIndicator, Result,
        Surface, SurfaceUpdate, SweepDirection,
    };

    pub use crate::{core, runtime};
}

pub use sweepline_core as core;
pub use sweepline_runtime as runtime;
