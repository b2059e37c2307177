//! # sensorlink-core
//!
//! **Simulated sensors, real protocol.**
//!
//! `sensorlink-core` holds everything the device side and the gateway side
//! agree on: the spike-injecting telemetry generator, its configuration, the
//! JSON wire format, the device registry contract and the error taxonomy.
//!
//! ## Quick Start
//!
//! ```
//! use sensorlink_core::{GeneratorConfig, SpikeGenerator};
//!
//! let mut generator = SpikeGenerator::new("DEV001", GeneratorConfig::default()).unwrap();
//! let sample = generator.generate_sample();
//! assert_eq!(sample.sn, "DEV001");
//! println!("{}", sample.to_json().unwrap());
//! ```
//!
//! ## Architecture
//!
//! Generator → Session Client → WebSocket → Auth Gateway → Forwarding Relay
//! → Downstream Consumer
//!
//! The generator and the registry live here. The gateway and relay live in
//! `sensorlink-server`; the device-side client in `sensorlink-client`.

pub mod config;
pub mod error;
pub mod generator;
pub mod registry;
pub mod telemetry;

pub use config::{GeneratorConfig, ValueRange};
pub use error::{ConfigError, RegistryError, SessionError};
pub use generator::{JITTER, SpikeGenerator, SpikeState};
pub use registry::{Device, DeviceRegistry, MemoryRegistry, NewDevice};
pub use telemetry::{AUTH_FAILED_MESSAGE, AUTH_OK_MESSAGE, StatusMessage, TelemetrySample};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
