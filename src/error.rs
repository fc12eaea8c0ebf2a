//! Unified error types for the kiln node firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! service layer and web handlers report failures uniformly.  All variants
//! are `Copy` so they pass through the supervisor and the access machine
//! without allocation.

use core::fmt;

use crate::access::StateId;
use crate::app::ports::ConfigError;
use crate::sensors::thermocouple::SensorFault;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible domain operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The thermocouple could not be read or reported a fault.
    Sensor(SensorFault),
    /// A schedule record could not be loaded or saved.
    Storage(StorageFault),
    /// The oven refused to start.
    StartRefused(StartRefused),
    /// A safety limit stopped the run.
    Safety(SafetyFault),
    /// An access state exceeded its dwell time.
    ProtocolTimeout(StateId),
    /// The request is not allowed while a schedule is running.
    RunActive,
    /// Configuration is invalid or could not be persisted.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::StartRefused(e) => write!(f, "start refused: {e}"),
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::ProtocolTimeout(state) => write!(f, "timeout in state '{}'", state.label()),
            Self::RunActive => write!(f, "not allowed while the oven is running"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::StorageFull => Self::Config("storage full"),
            ConfigError::IoError => Self::Config("I/O error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage faults
// ---------------------------------------------------------------------------

/// Failure to move a schedule record to or from the blob store.
/// Never fatal: the in-memory copy stays authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFault {
    /// Backend not mounted or returned an I/O error.
    Unavailable,
    /// No record stored under the key.
    NotFound,
    /// Fewer bytes than a full record came back.
    ShortRead { got: usize },
    /// Fewer bytes than a full record were written.
    ShortWrite { written: usize },
    /// The record header or payload did not decode.
    Corrupted,
    /// The schedule did not fit in a record.
    Encode,
    /// Index outside the schedule table.
    BadIndex(usize),
}

impl fmt::Display for StorageFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage unavailable"),
            Self::NotFound => write!(f, "record not found"),
            Self::ShortRead { got } => write!(f, "short read ({got} bytes)"),
            Self::ShortWrite { written } => write!(f, "short write ({written} bytes)"),
            Self::Corrupted => write!(f, "record corrupted"),
            Self::Encode => write!(f, "record encode failed"),
            Self::BadIndex(i) => write!(f, "no schedule slot {i}"),
        }
    }
}

impl From<StorageFault> for Error {
    fn from(e: StorageFault) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Start refusals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRefused {
    /// No approved user is present.
    NotApproved,
    /// The selected schedule has no segment in use.
    ScheduleEmpty,
    /// The thermocouple fault is latched.
    SensorFault,
}

impl fmt::Display for StartRefused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApproved => write!(f, "user not approved"),
            Self::ScheduleEmpty => write!(f, "schedule is empty"),
            Self::SensorFault => write!(f, "thermocouple fault"),
        }
    }
}

impl From<StartRefused> for Error {
    fn from(e: StartRefused) -> Self {
        Self::StartRefused(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults are accumulated in a bitfield by the thermal supervisor so
/// that simultaneous faults can be tracked and individually cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Consecutive faulty thermocouple reads reached the limit.
    ThermocoupleFault = 0b0000_0001,
    /// The run exceeded the maximum oven-on time.
    RunTimeExceeded = 0b0000_0010,
}

impl SafetyFault {
    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThermocoupleFault => write!(f, "thermocouple fault"),
            Self::RunTimeExceeded => write!(f, "maximum oven-on time exceeded"),
        }
    }
}

impl From<SafetyFault> for Error {
    fn from(e: SafetyFault) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
