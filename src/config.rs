//! Trace capture configuration.
//!
//! Traces are rendering metadata: they never take part in equality or
//! hashing. Capturing them costs an allocation per leaf, so production
//! deployments may disable capture or bound how many frames a combined trace
//! keeps.
//!
//! # Environment
//!
//! [`TraceConfig::from_env`] reads:
//!
//! - `ASUPERSYNC_CAUSE_TRACE`: `1`/`true`/`on` or `0`/`false`/`off`
//! - `ASUPERSYNC_CAUSE_TRACE_MAX_FRAMES`: positive integer

use crate::error::ConfigError;
use crate::tracing_compat::debug;
use parking_lot::{const_rwlock, RwLock};

/// Environment variable toggling trace capture.
pub const TRACE_ENV: &str = "ASUPERSYNC_CAUSE_TRACE";
/// Environment variable bounding retained trace frames.
pub const TRACE_MAX_FRAMES_ENV: &str = "ASUPERSYNC_CAUSE_TRACE_MAX_FRAMES";

static GLOBAL: RwLock<TraceConfig> = const_rwlock(TraceConfig::new());

/// Configuration for trace capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceConfig {
    /// Whether `Trace::capture` records the caller location.
    pub enabled: bool,
    /// Maximum frames kept when traces are combined (most recent win).
    pub max_frames: usize,
}

impl TraceConfig {
    /// Default number of retained frames.
    pub const DEFAULT_MAX_FRAMES: usize = 64;

    /// Creates the default configuration: capture enabled, 64 frames.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            max_frames: Self::DEFAULT_MAX_FRAMES,
        }
    }

    /// Creates a configuration with capture disabled.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            max_frames: Self::DEFAULT_MAX_FRAMES,
        }
    }

    /// Sets whether capture is enabled.
    #[must_use]
    pub const fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }

    /// Sets the maximum number of retained frames (at least one).
    #[must_use]
    pub const fn max_frames(mut self, frames: usize) -> Self {
        self.max_frames = if frames == 0 { 1 } else { frames };
        self
    }

    /// Loads the configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(raw) = lookup(TRACE_ENV) {
            config.enabled = parse_flag(TRACE_ENV, &raw)?;
        }
        if let Some(raw) = lookup(TRACE_MAX_FRAMES_ENV) {
            config.max_frames = parse_frames(TRACE_MAX_FRAMES_ENV, &raw)?;
        }

        debug!(
            enabled = config.enabled,
            max_frames = config.max_frames,
            "loaded trace configuration"
        );
        Ok(config)
    }

    /// Returns the process-wide configuration.
    #[must_use]
    pub fn global() -> Self {
        *GLOBAL.read()
    }

    /// Replaces the process-wide configuration.
    pub fn set_global(config: Self) {
        debug!(
            enabled = config.enabled,
            max_frames = config.max_frames,
            "installed global trace configuration"
        );
        *GLOBAL.write() = config;
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            expected: "one of 1/true/on/yes or 0/false/off/no",
        }),
    }
}

fn parse_frames(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(frames) if frames > 0 => Ok(frames),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            expected: "a positive integer",
        }),
    }
}
