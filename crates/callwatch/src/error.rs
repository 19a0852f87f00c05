//! Error types for callwatch.

use thiserror::Error;

/// Errors raised by monitor construction and queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The target is not callable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No predicate is registered under this name.
    #[error("unknown predicate: {0}")]
    UnknownPredicate(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while loading [`MonitorConfig`](crate::MonitorConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Failed to parse TOML.
    #[error("parse error: {0}")]
    Parse(String),

    /// Failed to read file.
    #[error("IO error: {0}")]
    Io(String),

    /// A setting has an unrecognised value.
    #[error("invalid value for `{key}`: {value}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = MonitorError::InvalidArgument("must be a function".to_string());
        assert_eq!(err.to_string(), "invalid argument: must be a function");
    }

    #[test]
    fn test_unknown_predicate_display() {
        let err = MonitorError::UnknownPredicate("called_twice".to_string());
        assert!(err.to_string().contains("called_twice"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: MonitorError = ConfigError::Parse("bad".to_string()).into();
        assert!(matches!(err, MonitorError::Config(ConfigError::Parse(_))));
        assert_eq!(err.to_string(), "configuration error: parse error: bad");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "clock".to_string(),
            value: "sundial".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value for `clock`: sundial");
    }
}
