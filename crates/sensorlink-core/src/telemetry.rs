//! Wire format shared by devices and the gateway.
//!
//! Telemetry travels as a JSON object in both directions:
//!
//! ```json
//! {"sn": "DEV001", "temperature": 23.41, "humidity": 51.07}
//! ```
//!
//! Gateway status replies (handshake acknowledgement, auth failure) use a
//! `{status, message}` envelope where `status` is `1` on success and `0` on
//! failure.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Acknowledgement text sent once a device has authenticated.
pub const AUTH_OK_MESSAGE: &str = "authenticated";
/// Failure text sent before a rejected connection is closed.
pub const AUTH_FAILED_MESSAGE: &str = "authentication failed";

/// One sensor reading. Also the body forwarded to the downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub sn: String,
    pub temperature: f64,
    pub humidity: f64,
}

impl TelemetrySample {
    /// Copy with both readings rounded to two decimals, as devices report them.
    pub fn rounded(&self) -> Self {
        Self {
            sn: self.sn.clone(),
            temperature: round2(self.temperature),
            humidity: round2(self.humidity),
        }
    }

    /// Serialize for the wire (rounded).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.rounded())
    }

    /// Parse an inbound message. All three fields are required.
    pub fn parse(bytes: &[u8]) -> Result<Self, SessionError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `{status, message}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: u8,
    pub message: String,
}

impl StatusMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: 1,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status != 0
    }

    /// Compact JSON, `status` first.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
