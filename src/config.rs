//! System configuration parameters
//!
//! All tunable parameters for the kiln node.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- PID ---
    pub pid_kp: f32,
    pub pid_ki: f32,
    pub pid_kd: f32,
    /// Interval between PID computations (milliseconds)
    pub pid_sample_time_ms: u32,
    /// Interval between thermocouple samples inside the PID loop (milliseconds)
    pub measure_interval_ms: u32,
    /// SSR time-proportioning window; also the upper output limit (milliseconds)
    pub ssr_pulse_period_ms: u32,

    // --- Schedule ---
    /// Ramp interpolation step (milliseconds)
    pub schedule_sample_time_ms: u32,
    /// Hard cap on a single oven run (hours)
    pub max_oven_on_hours: u32,

    // --- Safety ---
    /// Consecutive faulty reads before the thermocouple fault latches
    pub max_temp_faults: u8,
    /// Thermal supervisor cadence (milliseconds)
    pub check_temp_interval_ms: u32,
    /// Fan switches on above this cold-junction temperature (Celsius)
    pub fan_on_temp_c: f32,
    /// Lamp switches on above this thermocouple temperature (Celsius)
    pub lamp_on_temp_c: f32,

    // --- Access ---
    /// Time the door lock stays open after approval (seconds)
    pub door_open_secs: u32,

    // --- Timing ---
    /// Main loop pass interval (milliseconds)
    pub loop_interval_ms: u32,
    /// Status report interval (seconds)
    pub report_interval_secs: u32,

    // --- Web ---
    /// Expose the direct oven on/off pages (debug aid)
    pub allow_web_oven_switch: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // PID
            pid_kp: 2.0,
            pid_ki: 5.0,
            pid_kd: 1.0,
            pid_sample_time_ms: 1000,
            measure_interval_ms: 500,
            ssr_pulse_period_ms: 10_000,

            // Schedule
            schedule_sample_time_ms: 1000,
            max_oven_on_hours: 100,

            // Safety
            max_temp_faults: 5,
            check_temp_interval_ms: 1000,
            fan_on_temp_c: 50.0,
            lamp_on_temp_c: 40.0,

            // Access
            door_open_secs: 15,

            // Timing
            loop_interval_ms: 100,
            report_interval_secs: 20,

            allow_web_oven_switch: false,
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Called before persisting and before a
    /// runtime update is accepted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gains = [self.pid_kp, self.pid_ki, self.pid_kd];
        if gains.iter().any(|g| !g.is_finite() || !(0.0..=1000.0).contains(g)) {
            return Err(ConfigError::ValidationFailed("PID gains must be 0.0–1000.0"));
        }
        if !(100..=60_000).contains(&self.pid_sample_time_ms) {
            return Err(ConfigError::ValidationFailed(
                "pid_sample_time_ms must be 100–60000",
            ));
        }
        if !(100..=60_000).contains(&self.measure_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "measure_interval_ms must be 100–60000",
            ));
        }
        if !(1000..=120_000).contains(&self.ssr_pulse_period_ms) {
            return Err(ConfigError::ValidationFailed(
                "ssr_pulse_period_ms must be 1000–120000",
            ));
        }
        if !(100..=60_000).contains(&self.schedule_sample_time_ms) {
            return Err(ConfigError::ValidationFailed(
                "schedule_sample_time_ms must be 100–60000",
            ));
        }
        if !(1..=100).contains(&self.max_oven_on_hours) {
            return Err(ConfigError::ValidationFailed(
                "max_oven_on_hours must be 1–100",
            ));
        }
        if !(1..=50).contains(&self.max_temp_faults) {
            return Err(ConfigError::ValidationFailed("max_temp_faults must be 1–50"));
        }
        if !(100..=60_000).contains(&self.check_temp_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "check_temp_interval_ms must be 100–60000",
            ));
        }
        if !(0.0..=150.0).contains(&self.fan_on_temp_c) {
            return Err(ConfigError::ValidationFailed("fan_on_temp_c must be 0.0–150.0"));
        }
        if !(0.0..=150.0).contains(&self.lamp_on_temp_c) {
            return Err(ConfigError::ValidationFailed("lamp_on_temp_c must be 0.0–150.0"));
        }
        if !(1..=120).contains(&self.door_open_secs) {
            return Err(ConfigError::ValidationFailed("door_open_secs must be 1–120"));
        }
        if !(10..=1000).contains(&self.loop_interval_ms) {
            return Err(ConfigError::ValidationFailed("loop_interval_ms must be 10–1000"));
        }
        if self.loop_interval_ms > self.schedule_sample_time_ms {
            return Err(ConfigError::ValidationFailed(
                "loop_interval_ms must not exceed schedule_sample_time_ms",
            ));
        }
        if !(5..=3600).contains(&self.report_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "report_interval_secs must be 5–3600",
            ));
        }
        Ok(())
    }
}
