//! NodeService scenarios driven through the mock rig: full runs, safety
//! shutdowns, refusals and configuration persistence.

use crate::mock_hw::{ActuatorCall, Rig, schedule, segment};
use kilnnode::app::commands::AppCommand;
use kilnnode::app::events::AppEvent;
use kilnnode::app::service::NodeService;
use kilnnode::config::SystemConfig;
use kilnnode::error::{Error, SafetyFault, StartRefused, StorageFault};
use kilnnode::schedule::ControlMode;
use kilnnode::schedule::engine::ShutdownReason;

fn hold_then_off() -> kilnnode::schedule::Schedule {
    schedule(
        "Bisque",
        &[
            segment(ControlMode::Hold, 100.0, 10),
            segment(ControlMode::Off, 0.0, 0),
        ],
    )
}

fn switched_on(config: SystemConfig) -> Rig {
    let mut rig = Rig::new(config);
    rig.install(0, hold_then_off());
    rig.command(AppCommand::SetUserApproved(true)).unwrap();
    rig.command(AppCommand::SwitchOvenOn).unwrap();
    rig
}

fn shutdowns(rig: &Rig, reason: ShutdownReason) -> usize {
    rig.sink
        .count(|e| matches!(e, AppEvent::OvenSwitchedOff { reason: r } if *r == reason))
}

// ── Full run ──────────────────────────────────────────────────

#[test]
fn hold_schedule_runs_to_completion() {
    let mut rig = switched_on(SystemConfig::default());

    assert!(rig.node.engine().is_running());
    assert!(rig.node.controller().enabled);
    assert_eq!(rig.node.controller().setpoint_c, 100.0);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::OvenSwitchedOn { schedule: 0 })),
        1
    );

    // Cold kiln: the PID should fire the SSR at some point.
    rig.run_until(600_000, 1_000);
    assert!(rig.node.engine().is_running());
    assert!(rig.hw.calls.contains(&ActuatorCall::Ssr(true)));

    rig.tick_at(600_100);
    assert!(!rig.node.engine().is_running());
    assert!(!rig.node.controller().enabled);
    assert_eq!(rig.node.controller().setpoint_c, 0.0);
    assert!(!rig.hw.ssr_on());
    assert_eq!(shutdowns(&rig, ShutdownReason::ScheduleComplete), 1);

    // Completion is reported once, not on every later tick.
    rig.run_until(610_000, 1_000);
    assert_eq!(shutdowns(&rig, ShutdownReason::ScheduleComplete), 1);
}

#[test]
fn switch_on_twice_keeps_the_run() {
    let mut rig = switched_on(SystemConfig::default());
    rig.run_until(5_000, 500);
    rig.command(AppCommand::SwitchOvenOn).unwrap();
    assert_eq!(rig.node.engine().run_state().run_start_ms, 0);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::OvenSwitchedOn { .. })),
        1
    );
}

#[test]
fn switch_off_stops_heating() {
    let mut rig = switched_on(SystemConfig::default());
    rig.run_until(3_000, 500);
    rig.command(AppCommand::SwitchOvenOff).unwrap();

    assert!(!rig.node.engine().is_running());
    assert!(!rig.hw.ssr_on());
    assert_eq!(shutdowns(&rig, ShutdownReason::Requested), 1);
}

#[test]
fn switch_off_while_off_is_a_noop() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::SwitchOvenOff).unwrap();
    assert!(rig.hw.calls.is_empty());
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::OvenSwitchedOff { .. })),
        0
    );
}

// ── Refusals ──────────────────────────────────────────────────

#[test]
fn empty_schedule_is_refused() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::SetUserApproved(true)).unwrap();

    let result = rig.command(AppCommand::SwitchOvenOn);
    assert_eq!(
        result,
        Err(Error::StartRefused(StartRefused::ScheduleEmpty))
    );
    assert!(!rig.node.engine().is_running());
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::StartRefused(StartRefused::ScheduleEmpty)
        )),
        1
    );
}

#[test]
fn unapproved_start_is_refused() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.install(0, hold_then_off());

    assert_eq!(
        rig.command(AppCommand::SwitchOvenOn),
        Err(Error::StartRefused(StartRefused::NotApproved))
    );
    assert!(!rig.node.controller().enabled);
}

#[test]
fn selection_is_frozen_while_running() {
    let mut rig = switched_on(SystemConfig::default());
    assert_eq!(
        rig.command(AppCommand::SelectSchedule { forward: true }),
        Err(Error::RunActive)
    );
    assert_eq!(rig.node.engine().selected(), 0);

    rig.command(AppCommand::SwitchOvenOff).unwrap();
    rig.command(AppCommand::SelectSchedule { forward: false })
        .unwrap();
    assert_eq!(rig.node.engine().selected(), 19);
}

// ── Safety shutdowns ──────────────────────────────────────────

#[test]
fn persistent_probe_fault_switches_the_oven_off() {
    let mut rig = switched_on(SystemConfig::default());
    rig.run_until(2_000, 100);
    assert!(rig.node.reader().valid());

    rig.probe.fault_bits = 0x01;
    let mut latched = false;
    for _ in 0..100 {
        let t = rig.now + 100;
        rig.tick_at(t);
        if rig.node.reader().temp_fault() {
            latched = true;
            break;
        }
        assert!(rig.node.engine().is_running());
    }
    assert!(latched);

    // Off within the same pass that latched the fault.
    assert!(!rig.node.engine().is_running());
    assert!(!rig.node.controller().enabled);
    assert!(!rig.hw.ssr_on());
    assert_eq!(shutdowns(&rig, ShutdownReason::SensorFault), 1);
    assert!(rig
        .node
        .supervisor()
        .has_fault(SafetyFault::ThermocoupleFault));
    assert!(rig.sink.count(|e| matches!(e, AppEvent::FaultDetected(_))) >= 1);

    assert_eq!(
        rig.command(AppCommand::SwitchOvenOn),
        Err(Error::StartRefused(StartRefused::SensorFault))
    );
}

#[test]
fn probe_fault_clears_after_a_good_read() {
    let mut rig = switched_on(SystemConfig::default());
    rig.probe.bus_error = true;
    rig.run_until(10_000, 100);
    assert!(rig.node.reader().temp_fault());
    assert!(!rig.node.engine().is_running());

    rig.probe.bus_error = false;
    rig.run_until(12_000, 100);
    assert!(!rig.node.reader().temp_fault());
    assert!(!rig.node.supervisor().has_faults());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::FaultCleared)), 1);
}

#[test]
fn a_single_bad_read_does_not_stop_the_run() {
    let mut rig = switched_on(SystemConfig::default());
    rig.run_until(1_000, 100);

    // 1_100 was the last heater read; the next one is due at 1_600.
    rig.probe.fault_bits = 0x02;
    rig.tick_at(1_600);
    assert_eq!(rig.node.reader().fault_count(), 1);
    rig.probe.fault_bits = 0;
    rig.run_until(5_000, 100);

    assert!(rig.node.engine().is_running());
    assert!(!rig.node.reader().temp_fault());
    assert_eq!(rig.node.reader().fault_count(), 0);
}

#[test]
fn run_time_limit_switches_the_oven_off() {
    let config = SystemConfig {
        max_oven_on_hours: 1,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.install(
        0,
        schedule("Long soak", &[segment(ControlMode::Hold, 500.0, 1440)]),
    );
    rig.command(AppCommand::SetUserApproved(true)).unwrap();
    rig.command(AppCommand::SwitchOvenOn).unwrap();

    rig.tick_at(3_600_000);
    assert!(rig.node.engine().is_running());

    rig.tick_at(3_600_001);
    assert!(!rig.node.engine().is_running());
    assert_eq!(shutdowns(&rig, ShutdownReason::MaxRunTime), 1);
    assert!(rig
        .node
        .supervisor()
        .has_fault(SafetyFault::RunTimeExceeded));

    // A fresh start clears the run-time fault.
    rig.command(AppCommand::SwitchOvenOn).unwrap();
    assert!(!rig
        .node
        .supervisor()
        .has_fault(SafetyFault::RunTimeExceeded));
}

#[test]
fn reboot_switches_a_running_oven_off() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.install(0, hold_then_off());
    rig.command(AppCommand::SetUserApproved(true)).unwrap();
    rig.command(AppCommand::SwitchOvenOn).unwrap();

    // Never connected: BOOTING times out into REBOOT.
    rig.run_until(125_000, 1_000);
    assert!(!rig.node.engine().is_running());
    assert_eq!(shutdowns(&rig, ShutdownReason::Requested), 1);
    assert!(rig.node.take_reboot_request());
}

// ── Fan and lamp ──────────────────────────────────────────────

#[test]
fn fan_and_lamp_follow_their_thresholds() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.probe.cold_junction_c = 60.0;
    rig.probe.thermocouple_c = 45.0;
    rig.tick_at(100);
    assert!(rig.hw.fan_on());
    assert!(rig.hw.lamp_on());

    rig.probe.cold_junction_c = 30.0;
    rig.probe.thermocouple_c = 20.0;
    rig.tick_at(600);
    assert!(rig.hw.fan_on(), "checked once per interval");

    rig.tick_at(1_100);
    assert!(!rig.hw.fan_on());
    assert!(!rig.hw.lamp_on());
}

// ── Reports ───────────────────────────────────────────────────

#[test]
fn periodic_report_carries_the_run() {
    let mut rig = switched_on(SystemConfig::default());
    rig.run_until(20_000, 500);

    let report = rig
        .sink
        .events
        .iter()
        .rev()
        .find_map(|e| match e {
            AppEvent::Report(r) => Some(r.clone()),
            _ => None,
        })
        .expect("a report within the interval");
    assert!(report.oven_on);
    assert_eq!(report.schedule_name.as_str(), "Bisque");
    assert_eq!(report.mode, "HOLD");
    assert_eq!(report.goal_c, 100.0);
    assert_eq!(report.thermocouple_c, 20.0);
    assert!(report.time_left_s <= 600 && report.time_left_s >= 580);

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"state\":\"Booting\""));
}

// ── Schedules and config persistence ──────────────────────────

#[test]
fn stored_schedules_load_into_a_fresh_node() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.install(3, hold_then_off());

    let mut fresh = NodeService::new(SystemConfig::default());
    assert_eq!(fresh.load_schedules(&rig.nvs), 1);
    assert_eq!(fresh.store().get(3), &hold_then_off());
    assert!(fresh.store().get(0).is_empty());
}

#[test]
fn short_write_keeps_the_edit_in_memory() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.nvs.write_limit = Some(10);

    let result = rig
        .node
        .apply_schedule_edit(0, hold_then_off(), &mut rig.nvs);
    assert_eq!(
        result,
        Err(Error::Storage(StorageFault::ShortWrite { written: 10 }))
    );
    assert_eq!(rig.node.store().get(0), &hold_then_off());
}

#[test]
fn schedule_edit_refused_while_running() {
    let mut rig = switched_on(SystemConfig::default());
    let result = rig.node.apply_schedule_edit(
        0,
        schedule("Other", &[segment(ControlMode::Hold, 50.0, 5)]),
        &mut rig.nvs,
    );
    assert_eq!(result, Err(Error::RunActive));
    assert_eq!(rig.node.store().get(0).name.as_str(), "Bisque");
}

#[test]
fn config_update_applies_and_auto_saves() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.tick_at(1_000);

    let updated = SystemConfig {
        door_open_secs: 30,
        ..SystemConfig::default()
    };
    rig.command(AppCommand::UpdateConfig(updated.clone()))
        .unwrap();
    assert!(rig.node.is_config_dirty());
    assert_eq!(rig.node.config().door_open_secs, 30);

    rig.tick_at(3_000);
    assert!(!rig.node.auto_save_if_needed(&rig.nvs));

    rig.tick_at(6_000);
    assert!(rig.node.auto_save_if_needed(&rig.nvs));
    assert!(!rig.node.is_config_dirty());
    assert_eq!(rig.nvs.saved_config(), Some(updated));
}

#[test]
fn invalid_config_update_is_rejected() {
    let mut rig = Rig::new(SystemConfig::default());
    let bad = SystemConfig {
        max_temp_faults: 0,
        ..SystemConfig::default()
    };
    assert!(matches!(
        rig.command(AppCommand::UpdateConfig(bad)),
        Err(Error::Config(_))
    ));
    assert!(!rig.node.is_config_dirty());
}

#[test]
fn config_update_refused_while_running() {
    let mut rig = switched_on(SystemConfig::default());
    assert_eq!(
        rig.command(AppCommand::UpdateConfig(SystemConfig::default())),
        Err(Error::RunActive)
    );
}

#[test]
fn explicit_save_flushes_on_next_check() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::SaveConfig).unwrap();
    rig.tick_at(5_000);
    assert!(rig.node.auto_save_if_needed(&rig.nvs));
    assert_eq!(rig.nvs.saved_config(), Some(SystemConfig::default()));
}
