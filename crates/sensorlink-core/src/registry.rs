//! Device registry: credential lookup plus the CRUD surface behind
//! `/devices`.
//!
//! The gateway only ever talks to the [`DeviceRegistry`] trait. Lookups are
//! exact, case-sensitive matches on both serial number and shared secret.
//! [`MemoryRegistry`] is the bundled implementation, seeded from a JSON array
//! of devices.

use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RegistryError;

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub sn: String,
    pub passwd: String,
}

/// A device to be registered; the registry assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub sn: String,
    pub passwd: String,
}

/// Registry collaborator. Implementations must tolerate concurrent calls from
/// many sessions.
pub trait DeviceRegistry: Send + Sync {
    /// Device whose serial and secret both match exactly, if any.
    fn lookup(&self, sn: &str, passwd: &str) -> Option<Device>;

    /// All devices, or only those whose id is in `ids` when non-empty.
    fn list(&self, ids: &[String]) -> Vec<Device>;

    /// Register devices, returning them with their new ids.
    fn add(&self, devices: Vec<NewDevice>) -> Vec<Device>;

    /// Replace devices by id. Either every update applies or none does.
    fn update(&self, devices: Vec<Device>) -> Result<usize, RegistryError>;

    /// Remove devices by id, returning how many were removed.
    fn delete(&self, ids: &[String]) -> usize;

    /// Number of registered devices.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory registry guarded by a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    devices: RwLock<Vec<Device>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `devices`. Seed entries without an id get one.
    pub fn from_devices(devices: Vec<Device>) -> Self {
        let devices = devices
            .into_iter()
            .map(|mut d| {
                if d.id.is_empty() {
                    d.id = new_device_id();
                }
                d
            })
            .collect();
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Load a JSON array of devices.
    pub fn from_json_str(s: &str) -> Result<Self, RegistryError> {
        let devices: Vec<Device> = serde_json::from_str(s)?;
        Ok(Self::from_devices(devices))
    }

    /// Load a JSON array of devices from a file.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json_str(&text)?;
        log::info!(
            "loaded {} device(s) from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Copy of the current device list.
    pub fn snapshot(&self) -> Vec<Device> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Device>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Device>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceRegistry for MemoryRegistry {
    fn lookup(&self, sn: &str, passwd: &str) -> Option<Device> {
        self.read()
            .iter()
            .find(|d| d.sn == sn && d.passwd == passwd)
            .cloned()
    }

    fn list(&self, ids: &[String]) -> Vec<Device> {
        let devices = self.read();
        if ids.is_empty() {
            return devices.clone();
        }
        devices
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect()
    }

    fn add(&self, devices: Vec<NewDevice>) -> Vec<Device> {
        let added: Vec<Device> = devices
            .into_iter()
            .map(|d| Device {
                id: new_device_id(),
                name: d.name,
                device_type: d.device_type,
                sn: d.sn,
                passwd: d.passwd,
            })
            .collect();
        self.write().extend(added.iter().cloned());
        added
    }

    fn update(&self, devices: Vec<Device>) -> Result<usize, RegistryError> {
        let mut current = self.write();
        let mut positions = Vec::with_capacity(devices.len());
        for d in &devices {
            if d.id.is_empty() {
                return Err(RegistryError::MissingId);
            }
            let pos = current
                .iter()
                .position(|c| c.id == d.id)
                .ok_or_else(|| RegistryError::NotFound(d.id.clone()))?;
            positions.push(pos);
        }
        let n = devices.len();
        for (pos, d) in positions.into_iter().zip(devices) {
            current[pos] = d;
        }
        Ok(n)
    }

    fn delete(&self, ids: &[String]) -> usize {
        let mut current = self.write();
        let before = current.len();
        current.retain(|d| !ids.contains(&d.id));
        before - current.len()
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

fn new_device_id() -> String {
    Uuid::new_v4().to_string()
}
