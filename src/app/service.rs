//! Node service, the hexagonal core.
//!
//! [`NodeService`] owns the access machine, the thermocouple reader, the
//! heater loop, the schedule store and engine, and the thermal
//! supervisor.  It exposes a hardware-agnostic API; all I/O flows through
//! port traits injected at call sites, so the whole node runs against
//! mock adapters in tests.
//!
//! ```text
//!  ThermocouplePort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                       │         NodeService          │
//!     ActuatorPort ◀──  │ Access · Supervisor · Heater │ ◀─▶ StoragePort
//!                       │   Schedule engine · Report   │ ◀─▶ ConfigPort
//!                       └──────────────────────────────┘
//! ```
//!
//! One [`tick`](NodeService::tick) is one cooperative pass, in a fixed
//! order: access machine, door outputs, thermal supervisor, heater loop,
//! schedule engine, periodic report.

use core::fmt::Write as _;

use log::{info, warn};

use crate::access::context::{AccessContext, DoorCommands};
use crate::access::{AccessFsm, StateId, TickOutcome};
use crate::config::SystemConfig;
use crate::control::heater::{ControllerState, HeaterLoop};
use crate::error::{Error, Result, SafetyFault};
use crate::safety::ThermalSupervisor;
use crate::schedule::engine::{ScheduleEngine, ShutdownReason};
use crate::schedule::store::ScheduleStore;
use crate::schedule::{ControlMode, Schedule};
use crate::sensors::thermocouple::ThermocoupleReader;

use super::commands::AppCommand;
use super::events::{AppEvent, NodeReport};
use super::ports::{ActuatorPort, ConfigPort, EventSink, StoragePort, ThermocouplePort};

/// Quiet time after the last config change before it is auto-saved.
const CONFIG_SAVE_DELAY_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    config: SystemConfig,

    access: AccessFsm,
    access_ctx: AccessContext,
    /// Door outputs last written to the actuators.
    applied_doors: Option<DoorCommands>,

    reader: ThermocoupleReader,
    heater: HeaterLoop,
    store: ScheduleStore,
    engine: ScheduleEngine,
    supervisor: ThermalSupervisor,

    ip: Option<[u8; 4]>,
    report_interval_ms: u64,
    last_report_ms: u64,
    reboot_requested: bool,

    tick_count: u64,
    now_ms: u64,
    config_dirty_since: Option<u64>,
}

impl NodeService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the access machine; call [`start`](Self::start).
    pub fn new(config: SystemConfig) -> Self {
        Self {
            access: AccessFsm::with_config(&config),
            access_ctx: AccessContext::new(),
            applied_doors: None,
            reader: ThermocoupleReader::new(config.max_temp_faults),
            heater: HeaterLoop::new(&config),
            store: ScheduleStore::new(),
            engine: ScheduleEngine::new(&config),
            supervisor: ThermalSupervisor::new(&config),
            ip: None,
            report_interval_ms: u64::from(config.report_interval_secs) * 1000,
            last_report_ms: 0,
            reboot_requested: false,
            tick_count: 0,
            now_ms: 0,
            config_dirty_since: None,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load every schedule slot.  Missing or broken records stay empty.
    pub fn load_schedules(&mut self, storage: &(impl StoragePort + ?Sized)) -> usize {
        self.store.load_all(storage)
    }

    /// Start the access machine in BOOTING.
    pub fn start(&mut self, now: u64, sink: &mut (impl EventSink + ?Sized)) {
        self.now_ms = now;
        self.last_report_ms = now;
        self.access.start(now, &mut self.access_ctx);
        sink.emit(&AppEvent::Started(self.access.current_state()));
        info!("NodeService started in {:?}", self.access.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cooperative pass.
    pub fn tick(
        &mut self,
        now: u64,
        probe: &mut (impl ThermocouplePort + ?Sized),
        hw: &mut (impl ActuatorPort + ?Sized),
        sink: &mut (impl EventSink + ?Sized),
    ) {
        self.tick_count += 1;
        self.now_ms = now;

        // 1. Access machine
        match self.access.tick(now, &mut self.access_ctx) {
            TickOutcome::Registered { from, to } => {
                sink.emit(&AppEvent::AccessStateChanged { from, to });
            }
            TickOutcome::TimedOut { from, to } => {
                warn!("{}", Error::ProtocolTimeout(from));
                sink.emit(&AppEvent::AccessTimeout {
                    state: from,
                    next: to,
                });
            }
            TickOutcome::Updated => {}
        }
        if self.access_ctx.take_reboot_request() && !self.reboot_requested {
            self.reboot_requested = true;
            self.engine
                .switch_off(ShutdownReason::Requested, &mut self.heater, hw);
            self.drain_oven_flags(ShutdownReason::Requested, sink);
            sink.emit(&AppEvent::RebootRequested);
        }
        let report_due = self.access_ctx.take_report_request();

        // 2. Door outputs
        self.apply_door_outputs(hw);

        // 3. Thermal supervisor
        let faults_before = self.supervisor.faults();
        self.supervisor
            .check(now, &mut self.reader, probe, hw);

        // 4. Heater loop (failures are logged by the reader)
        let _ = self.heater.step(now, &mut self.reader, probe, hw);

        // 5. Schedule engine
        if let Some(reason) =
            self.engine
                .tick(now, &self.store, &mut self.heater, &self.reader, hw)
        {
            if let Some(fault) = reason.safety_fault() {
                self.supervisor.set_fault(fault, true);
            }
            self.drain_oven_flags(reason, sink);
        }
        self.emit_fault_change(faults_before, sink);

        // 6. Periodic report
        if report_due || now.saturating_sub(self.last_report_ms) >= self.report_interval_ms {
            self.last_report_ms = now;
            sink.emit(&AppEvent::Report(self.build_report()));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut (impl ActuatorPort + ?Sized),
        sink: &mut (impl EventSink + ?Sized),
    ) -> Result<()> {
        match cmd {
            AppCommand::CardSwiped => {
                self.access.card_swiped(&mut self.access_ctx);
            }
            AppCommand::ApprovalGranted => {
                if self.access.approval_granted(&mut self.access_ctx) {
                    self.engine.set_user_approved(true);
                    self.apply_door_outputs(hw);
                }
            }
            AppCommand::ApprovalDenied => {
                if self.access.approval_denied(&mut self.access_ctx) {
                    self.engine.set_user_approved(false);
                }
            }
            AppCommand::NetworkConnected { ip } => {
                self.ip = Some(ip);
                self.access.network_connected(&mut self.access_ctx);
            }
            AppCommand::NetworkError => {
                self.access.network_error(&mut self.access_ctx);
                self.apply_door_outputs(hw);
            }
            AppCommand::SetUserApproved(approved) => {
                self.engine.set_user_approved(approved);
            }
            AppCommand::SwitchOvenOn => {
                let faults_before = self.supervisor.faults();
                let started = self.engine.switch_on(
                    self.now_ms,
                    &self.store,
                    &mut self.heater,
                    &self.reader,
                    hw,
                );
                if let Err(refused) = started {
                    sink.emit(&AppEvent::StartRefused(refused));
                    return Err(refused.into());
                }
                self.supervisor
                    .set_fault(SafetyFault::RunTimeExceeded, false);
                self.drain_oven_flags(ShutdownReason::Requested, sink);
                self.emit_fault_change(faults_before, sink);
            }
            AppCommand::SwitchOvenOff => {
                self.engine
                    .switch_off(ShutdownReason::Requested, &mut self.heater, hw);
                self.drain_oven_flags(ShutdownReason::Requested, sink);
            }
            AppCommand::SelectSchedule { forward } => {
                self.engine.select_schedule(forward)?;
            }
            AppCommand::SetAuxRelay(on) => {
                self.access_ctx.commands.aux_relay = on;
                self.apply_door_outputs(hw);
            }
            AppCommand::UpdateConfig(new_config) => {
                if self.engine.is_running() {
                    warn!("Config update refused while the oven runs");
                    return Err(Error::RunActive);
                }
                new_config.validate()?;
                self.apply_config(new_config);
                self.mark_config_dirty();
                info!("Configuration updated at runtime");
            }
            AppCommand::SaveConfig => {
                self.config_dirty_since = Some(0);
                info!("Explicit config save requested (will flush on next auto-save check)");
            }
        }
        Ok(())
    }

    /// Replace schedule `index` with an edited copy and persist it.
    /// Refused while the oven runs.  A failed save keeps the edit in memory.
    pub fn apply_schedule_edit(
        &mut self,
        index: usize,
        schedule: Schedule,
        storage: &mut (impl StoragePort + ?Sized),
    ) -> Result<()> {
        if self.engine.is_running() {
            warn!("Schedule edit refused while the oven runs");
            return Err(Error::RunActive);
        }
        self.store.replace(index, schedule)?;
        self.store.save(index, storage)?;
        info!("Schedule {} stored", index);
        Ok(())
    }

    /// Move the edit-page cursor.  Refused while the oven runs.
    pub fn step_edit_cursor(&mut self, forward: bool) -> Result<usize> {
        if self.engine.is_running() {
            return Err(Error::RunActive);
        }
        Ok(self.store.step_edit_cursor(forward))
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a status snapshot.
    pub fn build_report(&self) -> NodeReport {
        let mut ip = heapless::String::new();
        if let Some([a, b, c, d]) = self.ip {
            let _ = write!(ip, "{a}.{b}.{c}.{d}");
        }
        let selected = self.engine.selected();
        let oven_on = self.engine.is_running();
        NodeReport {
            state: self.access.current_state().label(),
            approved_cards: self.access_ctx.approved_cards,
            rejected_cards: self.access_ctx.rejected_cards,
            ip,
            oven_on,
            schedule: selected,
            schedule_name: self.store.get(selected).name.clone(),
            segment: self.engine.current_segment(),
            mode: if oven_on {
                self.engine.current_mode(&self.store).label()
            } else {
                ControlMode::Off.label()
            },
            goal_c: self.engine.run_state().next_goal_c,
            setpoint_c: self.heater.setpoint(),
            thermocouple_c: self.reader.thermocouple_c(),
            cold_junction_c: self.reader.cold_junction_c(),
            temp_fault: self.reader.temp_fault(),
            fault_flags: self.supervisor.faults(),
            time_left_s: if oven_on {
                self.engine.time_left_secs(self.now_ms, &self.store)
            } else {
                0
            },
        }
    }

    pub fn access_state(&self) -> StateId {
        self.access.current_state()
    }

    pub fn access(&self) -> &AccessFsm {
        &self.access
    }

    pub fn door_commands(&self) -> DoorCommands {
        self.access_ctx.commands
    }

    pub fn engine(&self) -> &ScheduleEngine {
        &self.engine
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn reader(&self) -> &ThermocoupleReader {
        &self.reader
    }

    pub fn controller(&self) -> &ControllerState {
        self.heater.state()
    }

    pub fn supervisor(&self) -> &ThermalSupervisor {
        &self.supervisor
    }

    /// Read-and-clear: the REBOOT state asked for a restart.
    pub fn take_reboot_request(&mut self) -> bool {
        core::mem::take(&mut self.reboot_requested)
    }

    /// Time of the most recent tick.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Total passes executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    /// Write door and aux relay levels when they changed.
    fn apply_door_outputs(&mut self, hw: &mut (impl ActuatorPort + ?Sized)) {
        let cmds = self.access_ctx.commands;
        let last = self.applied_doors;
        if last.map(|l| l.door_open) != Some(cmds.door_open) {
            hw.set_door_lock(cmds.door_open);
        }
        if last.map(|l| l.aux_relay) != Some(cmds.aux_relay) {
            hw.set_aux_relay(cmds.aux_relay);
        }
        self.applied_doors = Some(cmds);
    }

    /// Consume the engine's one-shot flags and turn them into events.
    fn drain_oven_flags(&mut self, reason: ShutdownReason, sink: &mut (impl EventSink + ?Sized)) {
        if self.engine.take_switched_on() {
            sink.emit(&AppEvent::OvenSwitchedOn {
                schedule: self.engine.selected(),
            });
        }
        if self.engine.take_switched_off() {
            sink.emit(&AppEvent::OvenSwitchedOff { reason });
        }
    }

    fn emit_fault_change(&self, before: u8, sink: &mut (impl EventSink + ?Sized)) {
        let after = self.supervisor.faults();
        if after == before {
            return;
        }
        if after == 0 {
            sink.emit(&AppEvent::FaultCleared);
        } else {
            sink.emit(&AppEvent::FaultDetected(after));
        }
    }

    fn apply_config(&mut self, config: SystemConfig) {
        self.access.apply_config(&config);
        self.reader.set_max_faults(config.max_temp_faults);
        self.heater.apply_config(&config);
        self.engine.apply_config(&config);
        self.supervisor.apply_config(&config);
        self.report_interval_ms = u64::from(config.report_interval_secs) * 1000;
        self.config = config;
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.
    pub fn mark_config_dirty(&mut self) {
        if self.config_dirty_since.is_none() {
            self.config_dirty_since = Some(self.now_ms);
        }
    }

    /// Save once the config has been quiet for a few seconds.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        let Some(since) = self.config_dirty_since else {
            return false;
        };
        if self.now_ms.saturating_sub(since) < CONFIG_SAVE_DELAY_MS {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty_since = None;
                info!("Config auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty_since.is_some()
    }
}
