//! Monitor configuration.
//!
//! Settings come from, in order of precedence: explicit factory builder
//! calls, the environment (see [`MonitorConfig::from_env`]), and a TOML
//! file ([`MonitorConfig::CONFIG_FILE`] in the working directory, or any
//! path passed to [`MonitorConfig::load_from_file`]).
//!
//! ```toml
//! error_policy = "capture-and-rethrow"
//! clock = "monotonic"
//! serialize_args = true
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use callwatch_core::{default_clock, Clock, MonotonicClock, WallClock};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable selecting the [`ErrorPolicy`].
pub const ENV_ERROR_POLICY: &str = "CALLWATCH_ERROR_POLICY";
/// Environment variable selecting the [`ClockChoice`].
pub const ENV_CLOCK: &str = "CALLWATCH_CLOCK";
/// Environment variable toggling argument serialization.
pub const ENV_SERIALIZE_ARGS: &str = "CALLWATCH_SERIALIZE_ARGS";

/// What a monitor does after recording a call that threw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Record the error and return `Undefined` to the caller.
    #[default]
    Capture,
    /// Record the error and hand it back to the caller.
    CaptureAndRethrow,
}

impl ErrorPolicy {
    #[must_use]
    pub const fn rethrows(self) -> bool {
        matches!(self, Self::CaptureAndRethrow)
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture => write!(f, "capture"),
            Self::CaptureAndRethrow => write!(f, "capture-and-rethrow"),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "capture" => Ok(Self::Capture),
            "capture-and-rethrow" | "rethrow" => Ok(Self::CaptureAndRethrow),
            other => Err(ConfigError::InvalidValue {
                key: "error_policy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Which clock monitors time calls with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockChoice {
    /// Probe the platform for the best clock.
    #[default]
    Auto,
    /// Always use the high-resolution clock.
    Monotonic,
    /// Always use the wall clock.
    Wall,
}

impl ClockChoice {
    /// Instantiate the chosen clock. `Auto` shares the process default.
    #[must_use]
    pub fn build(self) -> Arc<dyn Clock> {
        match self {
            Self::Auto => default_clock(),
            Self::Monotonic => Arc::new(MonotonicClock::new()),
            Self::Wall => Arc::new(WallClock::new()),
        }
    }
}

impl FromStr for ClockChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "monotonic" => Ok(Self::Monotonic),
            "wall" => Ok(Self::Wall),
            other => Err(ConfigError::InvalidValue {
                key: "clock".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Settings applied by a [`MonitorFactory`](crate::MonitorFactory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Whether errors thrown by the wrapped function reach the caller.
    pub error_policy: ErrorPolicy,
    /// Clock used for timestamps and execution times.
    pub clock: ClockChoice,
    /// Render arguments to JSON on every call.
    pub serialize_args: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Capture,
            clock: ClockChoice::Auto,
            serialize_args: true,
        }
    }
}

impl MonitorConfig {
    /// Default config file name.
    pub const CONFIG_FILE: &'static str = ".callwatch.toml";

    /// Parse a configuration from TOML.
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize to TOML.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Load from a file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Load from default config file in current directory.
    ///
    /// Returns default config if file doesn't exist or cannot be parsed.
    #[must_use]
    pub fn load_default() -> Self {
        let path = std::path::Path::new(Self::CONFIG_FILE);
        Self::load_from_file(path).unwrap_or_default()
    }

    /// Build from the `CALLWATCH_*` environment variables.
    ///
    /// Unset or unparseable variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay(lookup)
    }

    /// Replace settings that `lookup` provides; keep the rest.
    #[must_use]
    pub fn overlay<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            error_policy: lookup(ENV_ERROR_POLICY)
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.error_policy),
            clock: lookup(ENV_CLOCK)
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.clock),
            serialize_args: lookup(ENV_SERIALIZE_ARGS)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(self.serialize_args),
        }
    }

    /// [`CONFIG_FILE`](Self::CONFIG_FILE) with environment overrides, read
    /// once per process.
    #[must_use]
    pub fn process_default() -> &'static Self {
        static PROCESS_DEFAULT: OnceLock<MonitorConfig> = OnceLock::new();
        PROCESS_DEFAULT.get_or_init(|| {
            Self::load_default().overlay(|key| std::env::var(key).ok())
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
