//! Generator configuration.
//!
//! Read from the `[config]` table of a TOML file. Missing keys fall back to
//! [`GeneratorConfig::default`]:
//!
//! ```toml
//! [config]
//! temperature_range = [20.0, 30.0]
//! humidity_range = [40.0, 60.0]
//! temperature_spike = 10
//! humidity_drop = 20
//! spike_interval = 60
//! spike_countdown = 5
//! spike_timeout = 2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Inclusive `[min, max]` pair, written as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn check(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.min.is_finite() && self.max.is_finite() && self.min <= self.max {
            Ok(())
        } else {
            Err(ConfigError::InvalidRange {
                field,
                min: self.min,
                max: self.max,
            })
        }
    }
}

impl From<(f64, f64)> for ValueRange {
    fn from((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }
}

impl From<ValueRange> for (f64, f64) {
    fn from(r: ValueRange) -> Self {
        (r.min, r.max)
    }
}

/// Parameters of the spike-injecting telemetry generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Baseline temperature band.
    pub temperature_range: ValueRange,
    /// Baseline humidity band.
    pub humidity_range: ValueRange,
    /// Temperature rise at the top of a ramp.
    pub temperature_spike: f64,
    /// Humidity fall at the top of a ramp.
    pub humidity_drop: f64,
    /// Seconds after which ramp state is reset.
    pub spike_interval: f64,
    /// Ticks in one ramp. Must be greater than 1.
    pub spike_countdown: u32,
    /// Seconds between samples; also the numerator of the trigger probability.
    pub spike_timeout: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature_range: ValueRange::new(20.0, 30.0),
            humidity_range: ValueRange::new(40.0, 60.0),
            temperature_spike: 10.0,
            humidity_drop: 20.0,
            spike_interval: 60.0,
            spike_countdown: 5,
            spike_timeout: 2.0,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    config: GeneratorConfig,
}

impl GeneratorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        file.config.validate()?;
        Ok(file.config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check every precondition the generator relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spike_countdown <= 1 {
            return Err(ConfigError::SpikeCountdown(self.spike_countdown));
        }
        for (field, value) in [
            ("spike_interval", self.spike_interval),
            ("spike_timeout", self.spike_timeout),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        for (field, value) in [
            ("temperature_spike", self.temperature_spike),
            ("humidity_drop", self.humidity_drop),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::NegativeMagnitude { field, value });
            }
        }
        self.temperature_range.check("temperature_range")?;
        self.humidity_range.check("humidity_range")?;
        Ok(())
    }

    /// Per-tick chance of starting a ramp: `(timeout / interval) * countdown`.
    /// May exceed 1, in which case every tick triggers.
    pub fn trigger_probability(&self) -> f64 {
        (self.spike_timeout / self.spike_interval) * f64::from(self.spike_countdown)
    }

    /// Sleep between two samples.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.spike_timeout)
    }
}
