//! Gateway configuration, read from TOML:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9000
//!
//! [registry]
//! devices = "devices.json"
//!
//! [downstream]
//! callback_url = "http://127.0.0.1:8000/report"
//! timeout_ms = 5000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sensorlink_core::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub registry: RegistryConfig,
    pub downstream: DownstreamConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON array of devices to seed the registry with.
    pub devices: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Where validated telemetry is POSTed. Reports are discarded when unset.
    pub callback_url: Option<String>,
    /// Upper bound on one delivery, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            callback_url: None,
            timeout_ms: 5000,
        }
    }
}

impl DownstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.downstream.timeout_ms == 0 {
            return Err(ConfigError::NonPositive {
                field: "downstream.timeout_ms",
                value: 0.0,
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
        assert_eq!(cfg.downstream.timeout(), Duration::from_secs(5));
        assert!(cfg.downstream.callback_url.is_none());
        assert!(cfg.registry.devices.is_none());
    }

    #[test]
    fn test_full_file() {
        let cfg = ServerConfig::from_toml_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9100

            [registry]
            devices = "/etc/sensorlink/devices.json"

            [downstream]
            callback_url = "http://127.0.0.1:8000/report"
            timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9100");
        assert_eq!(
            cfg.registry.devices.as_deref(),
            Some(Path::new("/etc/sensorlink/devices.json"))
        );
        assert_eq!(
            cfg.downstream.callback_url.as_deref(),
            Some("http://127.0.0.1:8000/report")
        );
        assert_eq!(cfg.downstream.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ServerConfig::from_toml_str("[downstream]\ntimeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::NonPositive { .. }));
    }

    #[test]
    fn test_bad_toml_rejected() {
        assert!(matches!(
            ServerConfig::from_toml_str("[server]\nport = \"ninety\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }
}
