//! Thermocouple reader with fault classification and debouncing.
//!
//! Wraps a [`ThermocouplePort`] and turns raw conversions into validated
//! temperatures.  A non-zero fault register increments a consecutive-fault
//! counter; reaching `max_faults` latches the persistent `temp_fault` flag
//! that stops heating.  One good conversion clears both.
//!
//! Only changes of the fault pattern are logged, so a sensor that stays
//! broken produces one burst of lines rather than one per sample.

use core::fmt;

use log::{info, warn};

use crate::app::ports::ThermocouplePort;

/// Reported in place of a temperature when no valid conversion exists.
pub const INVALID_TEMPERATURE_C: f32 = -300.0;

// ── Fault flags ───────────────────────────────────────────────

/// Fault register of the converter, plus a synthetic bus-error bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultFlags(u16);

impl FaultFlags {
    pub const NONE: Self = Self(0);
    pub const OPEN: Self = Self(0x01);
    pub const OVUV: Self = Self(0x02);
    pub const TC_LOW: Self = Self(0x04);
    pub const TC_HIGH: Self = Self(0x08);
    pub const CJ_LOW: Self = Self(0x10);
    pub const CJ_HIGH: Self = Self(0x20);
    pub const TC_RANGE: Self = Self(0x40);
    pub const CJ_RANGE: Self = Self(0x80);
    pub const BUS: Self = Self(0x100);

    const NAMED: [(Self, &'static str); 9] = [
        (Self::CJ_RANGE, "cold junction range fault"),
        (Self::TC_RANGE, "thermocouple range fault"),
        (Self::CJ_HIGH, "cold junction high fault"),
        (Self::CJ_LOW, "cold junction low fault"),
        (Self::TC_HIGH, "thermocouple high fault"),
        (Self::TC_LOW, "thermocouple low fault"),
        (Self::OVUV, "over/under voltage fault"),
        (Self::OPEN, "thermocouple open fault"),
        (Self::BUS, "bus error"),
    ];

    pub const fn from_register(reg: u8) -> Self {
        Self(reg as u16)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Human-readable names of every set flag.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl core::ops::BitOr for FaultFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ── Results ───────────────────────────────────────────────────

/// A validated conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub cold_junction_c: f32,
    pub thermocouple_c: f32,
}

/// A faulty conversion.  `persistent` is set once the consecutive-fault
/// limit has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFault {
    pub flags: FaultFlags,
    pub persistent: bool,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thermocouple fault 0x{:03x}", self.flags.bits())?;
        if self.persistent {
            write!(f, " (persistent)")?;
        }
        Ok(())
    }
}

// ── Reader ────────────────────────────────────────────────────

pub struct ThermocoupleReader {
    max_faults: u8,
    fault_count: u8,
    temp_fault: bool,
    prev_flags: FaultFlags,
    last: Option<Reading>,
}

impl ThermocoupleReader {
    pub fn new(max_faults: u8) -> Self {
        Self {
            max_faults: max_faults.max(1),
            fault_count: 0,
            temp_fault: false,
            prev_flags: FaultFlags::NONE,
            last: None,
        }
    }

    /// Sample the probe once and classify the result.
    pub fn measure(
        &mut self,
        probe: &mut (impl ThermocouplePort + ?Sized),
    ) -> Result<Reading, SensorFault> {
        let flags = match probe.read_sample() {
            Ok(sample) if sample.fault_bits == 0 => {
                let reading = Reading {
                    cold_junction_c: sample.cold_junction_c,
                    thermocouple_c: sample.thermocouple_c,
                };
                self.record_good(reading);
                return Ok(reading);
            }
            Ok(sample) => FaultFlags::from_register(sample.fault_bits),
            Err(_) => FaultFlags::BUS,
        };
        Err(self.record_fault(flags))
    }

    /// Latched after `max_faults` consecutive faulty reads.
    pub fn temp_fault(&self) -> bool {
        self.temp_fault
    }

    /// Whether the most recent read produced a valid temperature.
    pub fn valid(&self) -> bool {
        self.last.is_some()
    }

    pub fn fault_count(&self) -> u8 {
        self.fault_count
    }

    /// Last valid cold-junction temperature, or [`INVALID_TEMPERATURE_C`].
    pub fn cold_junction_c(&self) -> f32 {
        self.last.map_or(INVALID_TEMPERATURE_C, |r| r.cold_junction_c)
    }

    /// Last valid thermocouple temperature, or [`INVALID_TEMPERATURE_C`].
    pub fn thermocouple_c(&self) -> f32 {
        self.last.map_or(INVALID_TEMPERATURE_C, |r| r.thermocouple_c)
    }

    pub fn set_max_faults(&mut self, max_faults: u8) {
        self.max_faults = max_faults.max(1);
    }

    // ── Internal ──────────────────────────────────────────────

    fn record_good(&mut self, reading: Reading) {
        if self.fault_count > 0 {
            info!(
                "Thermocouple: fault resolved after {} faulty read(s)",
                self.fault_count
            );
        }
        self.fault_count = 0;
        self.temp_fault = false;
        self.prev_flags = FaultFlags::NONE;
        self.last = Some(reading);
    }

    fn record_fault(&mut self, flags: FaultFlags) -> SensorFault {
        if flags != self.prev_flags {
            for name in flags.names() {
                warn!("Thermocouple: {}", name);
            }
            self.prev_flags = flags;
        }
        self.fault_count = self.fault_count.saturating_add(1);
        if self.fault_count >= self.max_faults && !self.temp_fault {
            warn!(
                "Thermocouple: {} consecutive faults, heating inhibited",
                self.fault_count
            );
            self.temp_fault = true;
        }
        self.last = None;
        SensorFault {
            flags,
            persistent: self.temp_fault,
        }
    }
}
