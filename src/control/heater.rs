//! Closed-loop heater control: thermocouple → PID → SSR pulse window.
//!
//! The PID output is an on-time in milliseconds within a fixed pulse
//! window (`ssr_pulse_period_ms`).  The SSR is on for the first
//! `output_power` ms of each window and off for the remainder.  Window
//! boundaries advance in whole periods so the duty cycle never drifts
//! with loop jitter.
//!
//! ```text
//!  window_start        window_start + output      window_start + period
//!      │████████████████████│──────────────────────────│
//!           SSR on                   SSR off
//! ```

use log::{info, warn};

use crate::app::ports::{ActuatorPort, ThermocouplePort};
use crate::config::SystemConfig;
use crate::control::pid::PidController;
use crate::sensors::thermocouple::{SensorFault, ThermocoupleReader};

/// Upper bound used for the momentary limit pulse that drops the integrator.
const LIMIT_PULSE_MAX: f32 = 0.0001;

/// Snapshot of the loop, readable by reporting and the web UI.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub setpoint_c: f32,
    pub measured_c: f32,
    /// Current SSR on-time per window (ms).
    pub output_power: f32,
    pub window_start_ms: u64,
    pub ssr_on: bool,
    pub enabled: bool,
}

pub struct HeaterLoop {
    pid: PidController,
    state: ControllerState,
    measure_interval_ms: u64,
    pid_sample_ms: u64,
    pulse_period_ms: u64,
    last_measure_ms: Option<u64>,
    last_compute_ms: Option<u64>,
    has_measurement: bool,
}

impl HeaterLoop {
    pub fn new(config: &SystemConfig) -> Self {
        let mut pid = PidController::new(config.pid_kp, config.pid_ki, config.pid_kd, 0.0);
        pid.set_limits(0.0, config.ssr_pulse_period_ms as f32);
        Self {
            pid,
            state: ControllerState::default(),
            measure_interval_ms: u64::from(config.measure_interval_ms),
            pid_sample_ms: u64::from(config.pid_sample_time_ms),
            pulse_period_ms: u64::from(config.ssr_pulse_period_ms),
            last_measure_ms: None,
            last_compute_ms: None,
            has_measurement: false,
        }
    }

    /// Pick up new gains and cadences.
    pub fn apply_config(&mut self, config: &SystemConfig) {
        self.pid
            .set_tunings(config.pid_kp, config.pid_ki, config.pid_kd);
        self.pid.set_limits(0.0, config.ssr_pulse_period_ms as f32);
        self.measure_interval_ms = u64::from(config.measure_interval_ms);
        self.pid_sample_ms = u64::from(config.pid_sample_time_ms);
        self.pulse_period_ms = u64::from(config.ssr_pulse_period_ms);
    }

    // ── Enable / disable ──────────────────────────────────────

    /// Start closed-loop control.  The first pulse window opens at `now`.
    /// No effect while already enabled.
    pub fn enable(&mut self, now: u64) {
        if self.state.enabled {
            return;
        }
        self.pid.reset();
        self.state.enabled = true;
        self.state.window_start_ms = now;
        self.last_measure_ms = None;
        self.last_compute_ms = None;
        self.has_measurement = false;
        info!("Heater: control enabled");
    }

    /// Stop control and force the SSR off.
    pub fn disable(&mut self, hw: &mut (impl ActuatorPort + ?Sized)) {
        if self.state.enabled {
            info!("Heater: control disabled");
        }
        self.state.enabled = false;
        self.state.output_power = 0.0;
        self.state.ssr_on = false;
        hw.set_ssr(false);
    }

    // ── Setpoint ──────────────────────────────────────────────

    /// Change the goal temperature.
    ///
    /// A drop without `override_drop` pulses the output limits to ~0 so the
    /// integrator lets go and the oven coasts down instead of overshooting.
    /// Ramp updates pass `override_drop` to keep their accumulated state.
    pub fn set_goal(&mut self, goal_c: f32, override_drop: bool) {
        if goal_c < self.state.setpoint_c && !override_drop {
            let (min, max) = self.pid.limits();
            self.pid.set_limits(min, LIMIT_PULSE_MAX);
            self.pid.set_limits(min, max);
        }
        self.state.setpoint_c = goal_c;
        self.pid.set_target(goal_c);
        self.state.output_power = 0.0;
    }

    // ── Per-tick step ─────────────────────────────────────────

    /// Advance the loop.  Returns the sensor fault when this step's
    /// measurement failed.  A persistent fault disables the loop; a
    /// transient one skips the step with the SSR held at its level.
    pub fn step(
        &mut self,
        now: u64,
        reader: &mut ThermocoupleReader,
        probe: &mut (impl ThermocouplePort + ?Sized),
        hw: &mut (impl ActuatorPort + ?Sized),
    ) -> Result<(), SensorFault> {
        if !self.state.enabled {
            return Ok(());
        }

        if self
            .last_measure_ms
            .is_none_or(|t| now.saturating_sub(t) >= self.measure_interval_ms)
        {
            self.last_measure_ms = Some(now);
            match reader.measure(probe) {
                Ok(reading) => {
                    self.state.measured_c = reading.thermocouple_c;
                    self.has_measurement = true;
                }
                Err(fault) if fault.persistent => {
                    warn!("Heater: persistent thermocouple fault, SSR forced off");
                    self.disable(hw);
                    return Err(fault);
                }
                Err(fault) => return Err(fault),
            }
        }

        if !self.has_measurement {
            return Ok(());
        }

        if self
            .last_compute_ms
            .is_none_or(|t| now.saturating_sub(t) >= self.pid_sample_ms)
        {
            let dt_ms = self
                .last_compute_ms
                .map_or(self.pid_sample_ms, |t| now.saturating_sub(t));
            self.last_compute_ms = Some(now);
            self.state.output_power = self
                .pid
                .compute(self.state.measured_c, dt_ms as f32 / 1000.0);
        }

        while now.saturating_sub(self.state.window_start_ms) > self.pulse_period_ms {
            self.state.window_start_ms += self.pulse_period_ms;
        }

        let on_for = now.saturating_sub(self.state.window_start_ms) as f32;
        let ssr_on = on_for < self.state.output_power;
        if ssr_on != self.state.ssr_on {
            hw.set_ssr(ssr_on);
            self.state.ssr_on = ssr_on;
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn setpoint(&self) -> f32 {
        self.state.setpoint_c
    }

    pub fn ssr_on(&self) -> bool {
        self.state.ssr_on
    }
}
