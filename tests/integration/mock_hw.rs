//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO or SPI.

use kilnnode::app::events::AppEvent;
use kilnnode::app::ports::{
    ActuatorPort, ConfigError, ConfigPort, EventSink, SensorError, StorageError, StoragePort,
    ThermocouplePort, ThermocoupleSample,
};
use kilnnode::app::service::NodeService;
use kilnnode::config::SystemConfig;
use kilnnode::schedule::{ControlMode, Schedule, ScheduleSegment};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Once;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    DoorLock(bool),
    AuxRelay(bool),
    Ssr(bool),
    Fan(bool),
    Lamp(bool),
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent level written through `pick`, `AllOff` counting as off.
    fn level(&self, pick: fn(&ActuatorCall) -> Option<bool>) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::AllOff => Some(false),
                other => pick(other),
            })
            .unwrap_or(false)
    }

    pub fn door_open(&self) -> bool {
        self.level(|c| match c {
            ActuatorCall::DoorLock(open) => Some(*open),
            _ => None,
        })
    }

    pub fn ssr_on(&self) -> bool {
        self.level(|c| match c {
            ActuatorCall::Ssr(on) => Some(*on),
            _ => None,
        })
    }

    pub fn fan_on(&self) -> bool {
        self.level(|c| match c {
            ActuatorCall::Fan(on) => Some(*on),
            _ => None,
        })
    }

    pub fn lamp_on(&self) -> bool {
        self.level(|c| match c {
            ActuatorCall::Lamp(on) => Some(*on),
            _ => None,
        })
    }

    pub fn door_writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ActuatorCall::DoorLock(_)))
            .count()
    }
}

impl ActuatorPort for MockHardware {
    fn set_door_lock(&mut self, open: bool) {
        self.calls.push(ActuatorCall::DoorLock(open));
    }

    fn set_aux_relay(&mut self, on: bool) {
        self.calls.push(ActuatorCall::AuxRelay(on));
    }

    fn set_ssr(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Ssr(on));
    }

    fn set_fan(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Fan(on));
    }

    fn set_lamp(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Lamp(on));
    }

    fn all_off(&mut self) {
        self.calls.push(ActuatorCall::AllOff);
    }
}

// ── MockProbe ─────────────────────────────────────────────────

/// Thermocouple that returns whatever the test last set.
pub struct MockProbe {
    pub cold_junction_c: f32,
    pub thermocouple_c: f32,
    pub fault_bits: u8,
    pub bus_error: bool,
    pub reads: u32,
}

impl Default for MockProbe {
    fn default() -> Self {
        Self {
            cold_junction_c: 25.0,
            thermocouple_c: 20.0,
            fault_bits: 0,
            bus_error: false,
            reads: 0,
        }
    }
}

impl ThermocouplePort for MockProbe {
    fn read_sample(&mut self) -> Result<ThermocoupleSample, SensorError> {
        self.reads += 1;
        if self.bus_error {
            return Err(SensorError::Bus);
        }
        Ok(ThermocoupleSample {
            cold_junction_c: self.cold_junction_c,
            thermocouple_c: self.thermocouple_c,
            fault_bits: self.fault_bits,
        })
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    config: RefCell<Option<SystemConfig>>,
    /// Accept only this many bytes per write.
    pub write_limit: Option<usize>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved_config(&self) -> Option<SystemConfig> {
        self.config.borrow().clone()
    }

    pub fn keys(&self) -> usize {
        self.store.len()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.get(&k) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<usize, StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        let n = self.write_limit.map_or(data.len(), |l| l.min(data.len()));
        self.store
            .insert(format!("{}::{}", namespace, key), data[..n].to_vec());
        Ok(n)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.config.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Log capture ───────────────────────────────────────────────

thread_local! {
    static CAPTURED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Records log lines per thread, so parallel tests never see each
/// other's output.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let line = record.args().to_string();
        CAPTURED.with(|c| c.borrow_mut().push(line));
    }

    fn flush(&self) {}
}

static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Install the capturing logger and forget this thread's earlier lines.
#[allow(dead_code)]
pub fn capture_logs() {
    INSTALL.call_once(|| {
        if log::set_logger(&CAPTURE_LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
    CAPTURED.with(|c| c.borrow_mut().clear());
}

/// Lines logged on this thread since [`capture_logs`].
#[allow(dead_code)]
pub fn captured_logs() -> Vec<String> {
    CAPTURED.with(|c| c.borrow().clone())
}

// ── Rig ───────────────────────────────────────────────────────

/// A started node plus every mock it talks to.
pub struct Rig {
    pub node: NodeService,
    pub hw: MockHardware,
    pub probe: MockProbe,
    pub nvs: MockNvs,
    pub sink: RecordingSink,
    pub now: u64,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: SystemConfig) -> Self {
        let mut rig = Self {
            node: NodeService::new(config),
            hw: MockHardware::new(),
            probe: MockProbe::default(),
            nvs: MockNvs::new(),
            sink: RecordingSink::new(),
            now: 0,
        };
        rig.node.start(0, &mut rig.sink);
        rig
    }

    pub fn tick_at(&mut self, now: u64) {
        self.now = now;
        self.node
            .tick(now, &mut self.probe, &mut self.hw, &mut self.sink);
    }

    /// Tick every `step` ms up to and including `until`.
    pub fn run_until(&mut self, until: u64, step: u64) {
        let mut t = self.now + step;
        while t <= until {
            self.tick_at(t);
            t += step;
        }
    }

    pub fn command(
        &mut self,
        cmd: kilnnode::app::commands::AppCommand,
    ) -> kilnnode::error::Result<()> {
        self.node.handle_command(cmd, &mut self.hw, &mut self.sink)
    }

    /// Put `schedule` in slot `index` through the normal edit path.
    pub fn install(&mut self, index: usize, schedule: Schedule) {
        self.node
            .apply_schedule_edit(index, schedule, &mut self.nvs)
            .expect("schedule edit");
    }
}

pub fn segment(mode: ControlMode, goal_c: f32, duration_min: u16) -> ScheduleSegment {
    ScheduleSegment {
        mode,
        goal_c,
        duration_min,
        in_use: true,
    }
}

pub fn schedule(name: &str, segments: &[ScheduleSegment]) -> Schedule {
    let mut s = Schedule::default();
    s.set_name(name);
    s.segments[..segments.len()].copy_from_slice(segments);
    s
}
