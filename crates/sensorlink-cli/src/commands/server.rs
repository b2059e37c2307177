use std::path::{Path, PathBuf};

use sensorlink_server::{DEVICE_WS_PATH, ServerConfig};

/// Command-line values that take precedence over the config file.
pub struct ServerOverrides<'a> {
    pub config_path: Option<&'a Path>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub devices: Option<PathBuf>,
    pub callback_url: Option<String>,
    pub forward_timeout_ms: Option<u64>,
}

fn resolve(overrides: ServerOverrides<'_>) -> ServerConfig {
    let mut config = match overrides.config_path {
        Some(path) => {
            ServerConfig::load(path).unwrap_or_else(|e| super::fail(format!("{}: {e}", path.display())))
        }
        None => ServerConfig::default(),
    };
    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if overrides.devices.is_some() {
        config.registry.devices = overrides.devices;
    }
    if overrides.callback_url.is_some() {
        config.downstream.callback_url = overrides.callback_url;
    }
    if let Some(ms) = overrides.forward_timeout_ms {
        config.downstream.timeout_ms = ms;
    }
    if let Err(e) = config.validate() {
        super::fail(e);
    }
    config
}

pub fn run(overrides: ServerOverrides<'_>) {
    let config = resolve(overrides);
    let addr = config.bind_addr();
    let base = format!("http://{addr}");

    println!("sensorlink gateway v{}", sensorlink_core::VERSION);
    println!("   {base}");
    match &config.registry.devices {
        Some(path) => println!("   devices from {}", path.display()),
        None => println!("   no device file, registry starts empty"),
    }
    match &config.downstream.callback_url {
        Some(url) => println!(
            "   forwarding to {url} ({} ms budget)",
            config.downstream.timeout_ms
        ),
        None => println!("   no downstream consumer, readings are only echoed"),
    }
    println!();
    println!("   Endpoints:");
    println!("     WS  {DEVICE_WS_PATH}?sn=..&passwd=..   Device telemetry stream");
    println!("     GET    /devices[?ids=a,b]   List devices");
    println!("     POST   /devices             Register devices");
    println!("     PUT    /devices             Update devices");
    println!("     DELETE /devices             Remove devices");
    println!("     GET    /health              Health check");
    println!();
    println!("   Try:");
    println!("     curl {base}/health");
    println!("     sensorlink simulate ws://{addr}{DEVICE_WS_PATH} <sn> <passwd>");
    println!();

    let rt = tokio::runtime::Runtime::new()
        .unwrap_or_else(|e| super::fail(format!("failed to start runtime: {e}")));
    if let Err(e) = rt.block_on(sensorlink_server::run_server(config)) {
        super::fail(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overrides() -> ServerOverrides<'static> {
        ServerOverrides {
            config_path: None,
            host: None,
            port: None,
            devices: None,
            callback_url: None,
            forward_timeout_ms: None,
        }
    }

    #[test]
    fn test_defaults_without_file_or_flags() {
        assert_eq!(resolve(no_overrides()), ServerConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = resolve(ServerOverrides {
            host: Some("0.0.0.0".to_string()),
            port: Some(8123),
            callback_url: Some("http://consumer/report".to_string()),
            forward_timeout_ms: Some(250),
            ..no_overrides()
        });
        assert_eq!(config.bind_addr(), "0.0.0.0:8123");
        assert_eq!(
            config.downstream.callback_url.as_deref(),
            Some("http://consumer/report")
        );
        assert_eq!(config.downstream.timeout_ms, 250);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "[server]\nport = 7000\n\n[downstream]\ntimeout_ms = 900\n").unwrap();

        let config = resolve(ServerOverrides {
            config_path: Some(&path),
            port: Some(7001),
            ..no_overrides()
        });
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.downstream.timeout_ms, 900);
    }
}
