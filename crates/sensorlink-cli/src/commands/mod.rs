pub mod sample;
pub mod server;
pub mod simulate;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sensorlink_core::GeneratorConfig;

/// Print `msg` to stderr and exit non-zero.
pub fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(1);
}

/// Generator config from `path`, or defaults when no file is given.
pub fn load_generator_config(path: Option<&Path>) -> GeneratorConfig {
    match path {
        Some(path) => GeneratorConfig::load(path)
            .unwrap_or_else(|e| fail(format!("{}: {e}", path.display()))),
        None => GeneratorConfig::default(),
    }
}

/// Set `stop` on Ctrl+C.
pub fn stop_on_ctrlc(stop: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
        log::warn!("Ctrl+C handler not installed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_config_defaults_without_file() {
        assert_eq!(load_generator_config(None), GeneratorConfig::default());
    }

    #[test]
    fn test_generator_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "[config]\nspike_timeout = 0.5\nspike_countdown = 4\n").unwrap();

        let config = load_generator_config(Some(&path));
        assert_eq!(config.spike_timeout, 0.5);
        assert_eq!(config.spike_countdown, 4);
        assert_eq!(config.spike_interval, GeneratorConfig::default().spike_interval);
    }
}
