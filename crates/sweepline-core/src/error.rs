#![forbid(unsafe_code)]

//! Configuration errors.

use std::fmt;

/// A rejected configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `min` is not strictly below `max`.
    InvalidRange {
        /// Requested minimum value.
        min: f64,
        /// Requested maximum value.
        max: f64,
    },
    /// A rate was negative or not finite.
    InvalidRate {
        /// Which rate was rejected.
        field: &'static str,
        /// The rejected value in milliseconds.
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange { min, max } => {
                write!(f, "invalid range: min ({min}) must be below max ({max})")
            }
            Self::InvalidRate { field, value } => {
                write!(f, "invalid {field}: {value} ms (expected a finite value >= 0)")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A diagnostic produced while reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfigError {
    /// Environment variable name.
    pub field: &'static str,
    /// Raw value that failed to parse.
    pub value: String,
    /// What was expected.
    pub message: String,
}

impl EnvConfigError {
    pub(crate) fn new(
        field: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for EnvConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for EnvConfigError {}
