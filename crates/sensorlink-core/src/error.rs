//! Error taxonomy shared by the generator, the gateway and the device client.
//!
//! Every error is scoped to the instance that raised it: a generator, one
//! session, or one registry call. Nothing here is process-wide.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid generator or service configuration. Always raised at load or
/// construction time, never while generating samples.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("spike_countdown must be greater than 1, got {0}")]
    SpikeCountdown(u32),

    #[error("{field} must be a positive, finite number of seconds, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be a finite, non-negative magnitude, got {value}")]
    NegativeMagnitude { field: &'static str, value: f64 },

    #[error("{field} must satisfy min <= max with finite bounds, got [{min}, {max}]")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure that ends (or prevents) one device session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication failed for device {sn:?}")]
    Auth { sn: String },

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("malformed telemetry: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SessionError {
    /// Stable text safe to put on the wire. Diagnostics stay in the log.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Auth { .. } => crate::telemetry::AUTH_FAILED_MESSAGE,
            Self::Transport(_) => "connection error",
            Self::Parse(_) => "malformed telemetry",
        }
    }
}

/// Device registry failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("device id must not be empty")]
    MissingId,

    #[error("no device with id {0:?}")]
    NotFound(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid device list: {0}")]
    Seed(#[from] serde_json::Error),
}
