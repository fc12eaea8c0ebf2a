//! Thermal supervisor.
//!
//! Runs on its own cadence, independent of whether a schedule is active:
//!
//! - fan on while the board (cold junction) is above `fan_on_temp_c`
//! - signal lamp on while the kiln (thermocouple) is above `lamp_on_temp_c`
//!
//! There is no dead-band; each output simply follows its comparison.
//! When a measurement fails, both outputs hold their last level.
//!
//! ## Fault lifecycle
//!
//! The supervisor keeps a latched fault bitmask, the same way for every
//! [`SafetyFault`]:
//!
//! 1. A condition is raised (reader fault latched, run-time cap hit).
//! 2. The bit is set and logged once.
//! 3. When the condition clears, the bit is cleared and logged once.
//!
//! The schedule engine treats a set `ThermocoupleFault` bit as an
//! immediate shutdown.

use crate::app::ports::{ActuatorPort, ThermocouplePort};
use crate::config::SystemConfig;
use crate::error::SafetyFault;
use crate::sensors::thermocouple::ThermocoupleReader;
use log::{error, info};

/// Thermal supervisor.
pub struct ThermalSupervisor {
    fan_on_c: f32,
    lamp_on_c: f32,
    interval_ms: u64,
    last_check_ms: Option<u64>,
    fan_on: bool,
    lamp_on: bool,
    /// Latched fault bitmask.
    faults: u8,
}

impl ThermalSupervisor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            fan_on_c: config.fan_on_temp_c,
            lamp_on_c: config.lamp_on_temp_c,
            interval_ms: u64::from(config.check_temp_interval_ms),
            last_check_ms: None,
            fan_on: false,
            lamp_on: false,
            faults: 0,
        }
    }

    pub fn apply_config(&mut self, config: &SystemConfig) {
        self.fan_on_c = config.fan_on_temp_c;
        self.lamp_on_c = config.lamp_on_temp_c;
        self.interval_ms = u64::from(config.check_temp_interval_ms);
    }

    /// Measure and drive fan and lamp when the cadence is due.
    /// Returns the updated fault bitmask.
    pub fn check(
        &mut self,
        now: u64,
        reader: &mut ThermocoupleReader,
        probe: &mut (impl ThermocouplePort + ?Sized),
        hw: &mut (impl ActuatorPort + ?Sized),
    ) -> u8 {
        if self
            .last_check_ms
            .is_some_and(|t| now.saturating_sub(t) < self.interval_ms)
        {
            return self.faults;
        }
        self.last_check_ms = Some(now);

        if let Ok(reading) = reader.measure(probe) {
            // ── Fan (board temperature) ───────────────────────
            let fan = reading.cold_junction_c > self.fan_on_c;
            if fan != self.fan_on {
                hw.set_fan(fan);
                self.fan_on = fan;
                info!("Fan switched {}", if fan { "on" } else { "off" });
            }

            // ── Signal lamp (kiln temperature) ────────────────
            let lamp = reading.thermocouple_c > self.lamp_on_c;
            if lamp != self.lamp_on {
                hw.set_lamp(lamp);
                self.lamp_on = lamp;
                info!("Signal lamp switched {}", if lamp { "on" } else { "off" });
            }
        }

        self.eval_fault(SafetyFault::ThermocoupleFault, reader.temp_fault());
        self.faults
    }

    /// Raise or clear a fault from outside the periodic check.
    pub fn set_fault(&mut self, fault: SafetyFault, active: bool) {
        self.eval_fault(fault, active);
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    pub fn fan_on(&self) -> bool {
        self.fan_on
    }

    pub fn lamp_on(&self) -> bool {
        self.lamp_on
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
