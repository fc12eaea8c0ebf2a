//! Schedule execution engine.
//!
//! Drives the [`HeaterLoop`] goal through the in-use segments of the
//! selected schedule.
//!
//! ```text
//!            switch_on (approved, non-empty, sensor ok)
//!   ┌─────┐ ─────────────────────────────────────────▶ ┌─────────┐
//!   │ Off │                                             │ Running │──┐ segment
//!   └─────┘ ◀───────────────────────────────────────── └─────────┘◀─┘ advance
//!            switch_off / sensor fault / max run time /
//!            no further segment
//! ```
//!
//! Segment ends are cumulative from the run start, so a late tick never
//! stretches the schedule.  Safety checks run before anything else on
//! every tick.

use core::fmt;

use log::{error, info, warn};

use super::store::{ScheduleStore, step_index};
use super::{ControlMode, Schedule, ScheduleSegment};
use crate::app::ports::ActuatorPort;
use crate::config::SystemConfig;
use crate::control::heater::HeaterLoop;
use crate::error::{Error, SafetyFault, StartRefused};
use crate::sensors::thermocouple::ThermocoupleReader;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Switched off by a user or the access flow.
    Requested,
    /// The thermocouple fault latched.
    SensorFault,
    /// The run exceeded the maximum oven-on time.
    MaxRunTime,
    /// No in-use segment remained.
    ScheduleComplete,
}

impl ShutdownReason {
    /// The safety fault behind this shutdown, if any.
    pub fn safety_fault(self) -> Option<SafetyFault> {
        match self {
            Self::SensorFault => Some(SafetyFault::ThermocoupleFault),
            Self::MaxRunTime => Some(SafetyFault::RunTimeExceeded),
            Self::Requested | Self::ScheduleComplete => None,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::SensorFault => write!(f, "thermocouple fault"),
            Self::MaxRunTime => write!(f, "maximum run time"),
            Self::ScheduleComplete => write!(f, "schedule complete"),
        }
    }
}

/// Bookkeeping of the current run.  Rebuilt on every switch-on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScheduleRunState {
    pub selected: usize,
    pub segment: usize,
    pub running: bool,
    pub run_start_ms: u64,
    pub segment_start_ms: u64,
    /// End of the current segment, relative to `run_start_ms`.
    pub segment_end_ms: u64,
    pub previous_goal_c: f32,
    pub next_goal_c: f32,
    pub ramp_active: bool,
    pub ramp_value_c: f32,
    pub ramp_delta_c: f32,
    pub ramp_window_start_ms: u64,
    /// Sample windows applied since the ramp started.
    pub ramp_steps: u64,
}

pub struct ScheduleEngine {
    run: ScheduleRunState,
    user_approved: bool,
    switched_on: bool,
    switched_off: bool,
    sample_ms: u64,
    max_run_ms: u64,
}

impl ScheduleEngine {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            run: ScheduleRunState::default(),
            user_approved: false,
            switched_on: false,
            switched_off: false,
            sample_ms: u64::from(config.schedule_sample_time_ms).max(1),
            max_run_ms: u64::from(config.max_oven_on_hours) * 3_600_000,
        }
    }

    pub fn apply_config(&mut self, config: &SystemConfig) {
        self.sample_ms = u64::from(config.schedule_sample_time_ms).max(1);
        self.max_run_ms = u64::from(config.max_oven_on_hours) * 3_600_000;
    }

    // ── Approval ──────────────────────────────────────────────

    pub fn set_user_approved(&mut self, approved: bool) {
        self.user_approved = approved;
    }

    pub fn user_approved(&self) -> bool {
        self.user_approved
    }

    // ── Selection ─────────────────────────────────────────────

    /// Select the neighbouring schedule.  Refused while running.
    pub fn select_schedule(&mut self, forward: bool) -> Result<usize, Error> {
        if self.run.running {
            return Err(Error::RunActive);
        }
        self.run.selected = step_index(self.run.selected, forward);
        info!("Schedule {} selected", self.run.selected);
        Ok(self.run.selected)
    }

    // ── On / off ──────────────────────────────────────────────

    /// Start the selected schedule at its first in-use segment.
    /// Already running is not an error.
    pub fn switch_on(
        &mut self,
        now: u64,
        store: &ScheduleStore,
        heater: &mut HeaterLoop,
        reader: &ThermocoupleReader,
        hw: &mut (impl ActuatorPort + ?Sized),
    ) -> Result<(), StartRefused> {
        if !self.user_approved {
            warn!("Oven: switch-on refused, user not approved");
            return Err(StartRefused::NotApproved);
        }
        if self.run.running {
            return Ok(());
        }
        if reader.temp_fault() {
            warn!("Oven: switch-on refused, thermocouple fault");
            return Err(StartRefused::SensorFault);
        }
        let schedule = store.get(self.run.selected);
        let Some(first) = schedule.next_in_use(0) else {
            warn!("Oven: unable to switch on, schedule {} is empty", self.run.selected);
            return Err(StartRefused::ScheduleEmpty);
        };

        info!(
            "Oven: switched on, schedule {} '{}' from segment {}",
            self.run.selected, schedule.name, first
        );
        self.run = ScheduleRunState {
            selected: self.run.selected,
            segment: first,
            running: true,
            run_start_ms: now,
            segment_end_ms: schedule.segments[first].duration_ms(),
            ..ScheduleRunState::default()
        };
        self.switched_on = true;
        self.switched_off = false;
        self.enter_segment(now, now, schedule.segments[first], heater, hw);
        Ok(())
    }

    /// Stop the run.  Returns `false` when nothing was running.
    pub fn switch_off(
        &mut self,
        reason: ShutdownReason,
        heater: &mut HeaterLoop,
        hw: &mut (impl ActuatorPort + ?Sized),
    ) -> bool {
        if !self.run.running {
            return false;
        }
        heater.disable(hw);
        self.run.running = false;
        self.run.ramp_active = false;
        self.switched_on = false;
        self.switched_off = true;
        if reason.safety_fault().is_some() {
            error!("Oven: switched off ({})", reason);
        } else {
            info!("Oven: switched off ({})", reason);
        }
        true
    }

    /// One-shot: true once after each switch-on.
    pub fn take_switched_on(&mut self) -> bool {
        core::mem::take(&mut self.switched_on)
    }

    /// One-shot: true once after each switch-off.
    pub fn take_switched_off(&mut self) -> bool {
        core::mem::take(&mut self.switched_off)
    }

    // ── Per-tick step ─────────────────────────────────────────

    /// Advance the run.  Returns the reason when this tick ended it.
    pub fn tick(
        &mut self,
        now: u64,
        store: &ScheduleStore,
        heater: &mut HeaterLoop,
        reader: &ThermocoupleReader,
        hw: &mut (impl ActuatorPort + ?Sized),
    ) -> Option<ShutdownReason> {
        if !self.run.running {
            return None;
        }

        if reader.temp_fault() {
            self.switch_off(ShutdownReason::SensorFault, heater, hw);
            return Some(ShutdownReason::SensorFault);
        }

        let elapsed = now.saturating_sub(self.run.run_start_ms);
        if elapsed > self.max_run_ms {
            self.switch_off(ShutdownReason::MaxRunTime, heater, hw);
            return Some(ShutdownReason::MaxRunTime);
        }

        let schedule = store.get(self.run.selected);
        while elapsed > self.run.segment_end_ms {
            let Some(next) = schedule.next_in_use(self.run.segment + 1) else {
                self.switch_off(ShutdownReason::ScheduleComplete, heater, hw);
                return Some(ShutdownReason::ScheduleComplete);
            };
            info!("Oven: segment {} started", next);
            let start = self.run.run_start_ms + self.run.segment_end_ms;
            self.run.segment = next;
            self.run.segment_end_ms += schedule.segments[next].duration_ms();
            self.enter_segment(now, start, schedule.segments[next], heater, hw);
        }

        if self.run.ramp_active {
            self.advance_ramp(now, heater);
        }
        None
    }

    /// Catch the ramp up with every sample window that closed since the
    /// last tick, however coarse the ticks are.
    fn advance_ramp(&mut self, now: u64, heater: &mut HeaterLoop) {
        let windows = now.saturating_sub(self.run.ramp_window_start_ms) / self.sample_ms;
        if windows == 0 {
            return;
        }
        self.run.ramp_window_start_ms += windows * self.sample_ms;
        self.run.ramp_steps += windows;
        self.run.ramp_value_c = ramp_point(
            self.run.previous_goal_c,
            self.run.ramp_delta_c,
            self.run.ramp_steps,
            self.run.next_goal_c,
        );
        heater.set_goal(self.run.ramp_value_c, true);
    }

    /// `start` is the segment's scheduled start, which a late tick may
    /// already have passed.
    fn enter_segment(
        &mut self,
        now: u64,
        start: u64,
        segment: ScheduleSegment,
        heater: &mut HeaterLoop,
        hw: &mut (impl ActuatorPort + ?Sized),
    ) {
        self.run.segment_start_ms = start;
        self.run.previous_goal_c = self.run.next_goal_c;
        self.run.next_goal_c = segment.goal_c;
        self.run.ramp_active = false;

        match segment.mode {
            ControlMode::Off => {
                self.run.next_goal_c = 0.0;
                heater.set_goal(0.0, false);
                heater.disable(hw);
                info!("Oven: mode SWITCHED_OFF");
            }
            ControlMode::Hold => {
                heater.enable(now);
                heater.set_goal(self.run.next_goal_c, false);
                info!("Oven: mode HOLD at {:.0} °C", self.run.next_goal_c);
            }
            ControlMode::Ramp if segment.duration_min < 1 => {
                heater.enable(now);
                heater.set_goal(self.run.next_goal_c, false);
                info!("Oven: mode HOLD (ramp without duration)");
            }
            ControlMode::Ramp => {
                heater.enable(now);
                let steps = segment.duration_ms() as f32 / self.sample_ms as f32;
                self.run.ramp_value_c = self.run.previous_goal_c;
                self.run.ramp_delta_c = (self.run.next_goal_c - self.run.previous_goal_c) / steps;
                self.run.ramp_window_start_ms = start;
                self.run.ramp_steps = 0;
                self.run.ramp_active = true;
                info!(
                    "Oven: mode RAMP from {:.0} °C to {:.0} °C",
                    self.run.previous_goal_c, self.run.next_goal_c
                );
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.run.running
    }

    pub fn run_state(&self) -> &ScheduleRunState {
        &self.run
    }

    pub fn selected(&self) -> usize {
        self.run.selected
    }

    pub fn current_segment(&self) -> usize {
        self.run.segment
    }

    fn current<'s>(&self, store: &'s ScheduleStore) -> &'s ScheduleSegment {
        let schedule: &Schedule = store.get(self.run.selected);
        &schedule.segments[self.run.segment]
    }

    pub fn current_mode(&self, store: &ScheduleStore) -> ControlMode {
        self.current(store).mode
    }

    /// Goal of the current segment (the ramp target while ramping).
    pub fn current_goal(&self, store: &ScheduleStore) -> f32 {
        self.current(store).goal_c
    }

    /// Whole seconds left in the current segment.
    pub fn time_left_secs(&self, now: u64, store: &ScheduleStore) -> u64 {
        let total = u64::from(self.current(store).duration_min) * 60;
        let spent = now.saturating_sub(self.run.segment_start_ms) / 1000;
        total.saturating_sub(spent)
    }
}

/// `start + delta * steps`, never past `target`.
fn ramp_point(start: f32, delta: f32, steps: u64, target: f32) -> f32 {
    let value = start + delta * steps as f32;
    if delta >= 0.0 {
        value.min(target)
    } else {
        value.max(target)
    }
}
