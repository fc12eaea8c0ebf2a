//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (thermocouple, actuators, event sinks, storage) implement
//! these traits.  The [`NodeService`](super::service::NodeService) consumes
//! them at call sites, so the domain core never touches hardware directly.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** writes report the byte count so a short write is
//!   visible to the caller.

use core::fmt;

use crate::config::SystemConfig;

// ───────────────────────────────────────────────────────────────
// Thermocouple port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One raw conversion from the thermocouple interface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThermocoupleSample {
    /// Cold-junction (board) temperature in °C.
    pub cold_junction_c: f32,
    /// Hot-junction (process) temperature in °C.
    pub thermocouple_c: f32,
    /// Device fault register; zero means the conversion is valid.
    pub fault_bits: u8,
}

/// Read-side port: the domain calls this to sample the oven temperature.
pub trait ThermocouplePort {
    fn read_sample(&mut self) -> Result<ThermocoupleSample, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command outputs.
/// Every operation is a level set; repeating a level is harmless.
pub trait ActuatorPort {
    /// Energise (`true`) or release the door-lock relay.
    fn set_door_lock(&mut self, open: bool);

    /// Auxiliary relay next to the lock.
    fn set_aux_relay(&mut self, on: bool);

    /// Solid-state relay feeding the heating elements.
    fn set_ssr(&mut self, on: bool);

    fn set_fan(&mut self, on: bool);

    fn set_lamp(&mut self, on: bool);

    /// Release every output for a safe shutdown.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Persisted [`SystemConfig`].
///
/// `save` runs [`SystemConfig::validate`] first and fails with
/// [`ConfigError::ValidationFailed`]; nothing is clamped.
pub trait ConfigPort {
    /// Defaults when nothing is stored yet.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Namespaced blob store holding the schedule records.  Writes are
/// atomic per key.
pub trait StoragePort {
    /// Copy the blob into `buf`; returns the byte count.  A blob larger
    /// than `buf` is truncated.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Returns how many bytes were stored.  Fewer than `data.len()` is a
    /// short write for the caller to handle.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<usize, StorageError>;

    /// Removing a missing key succeeds.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Port errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// SPI transaction with the converter failed.
    Bus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NotFound,
    /// The stored blob did not decode or held out-of-range values.
    Corrupted,
    /// Names the offending field.
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    /// Backend failure, or a namespace/key the backend cannot address.
    IoError,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("thermocouple bus error")
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("no stored config"),
            Self::Corrupted => f.write_str("stored config corrupted"),
            Self::ValidationFailed(why) => write!(f, "invalid config: {why}"),
            Self::StorageFull => f.write_str("config storage full"),
            Self::IoError => f.write_str("config I/O error"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("key not found"),
            Self::Full => f.write_str("partition full"),
            Self::IoError => f.write_str("storage I/O error"),
        }
    }
}
