#![forbid(unsafe_code)]

//! Errors surfaced to the host by [`ProgressIndicator`](crate::ProgressIndicator).

use std::fmt;
use std::io;

use sweepline_core::ConfigError;

/// Construction and configuration failures.
#[derive(Debug)]
pub enum IndicatorError {
    /// A setter rejected its argument; the previous setting is kept.
    Config(ConfigError),
    /// The initial configuration failed validation.
    InvalidConfig(Vec<ConfigError>),
    /// The UI context thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for IndicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::InvalidConfig(errors) => {
                f.write_str("invalid indicator configuration: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{err}")?;
                }
                Ok(())
            }
            Self::Spawn(err) => write!(f, "failed to spawn ui context: {err}"),
        }
    }
}

impl std::error::Error for IndicatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::InvalidConfig(_) => None,
            Self::Spawn(err) => Some(err),
        }
    }
}

impl From<ConfigError> for IndicatorError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<io::Error> for IndicatorError {
    fn from(err: io::Error) -> Self {
        Self::Spawn(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_lists_every_error() {
        let err = IndicatorError::InvalidConfig(vec![
            ConfigError::InvalidRange {
                min: 5.0,
                max: 1.0,
            },
            ConfigError::InvalidRate {
                field: "determinate_rate_ms",
                value: -1.0,
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("; "), "{msg}");
        assert!(msg.starts_with("invalid indicator configuration"));
    }

    #[test]
    fn spawn_error_has_source() {
        use std::error::Error as _;
        let err = IndicatorError::from(io::Error::other("no threads"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("no threads"));
    }
}
