//! Web page handlers against a live NodeService and mock storage.

use crate::mock_hw::{Rig, capture_logs, captured_logs, schedule, segment};
use kilnnode::app::commands::AppCommand;
use kilnnode::app::events::AppEvent;
use kilnnode::app::ports::StoragePort;
use kilnnode::config::SystemConfig;
use kilnnode::error::StartRefused;
use kilnnode::schedule::form::FormFields;
use kilnnode::schedule::store::SCHEDULE_NAMESPACE;
use kilnnode::schedule::{ControlMode, ScheduleSegment};
use kilnnode::web::{RootView, RouteId, WebContext, WebView, dispatch};

const GLAZE_FORM: [(&str, &str); 9] = [
    ("scheduleName", "Glaze"),
    ("mode_0", "ramp"),
    ("tempGoal_0", "1200"),
    ("timeToNextPoint_0", "300"),
    ("segmentIsUsed_0", "on"),
    ("mode_1", "hold"),
    ("tempGoal_1", "1200"),
    ("timeToNextPoint_1", "15"),
    ("segmentIsUsed_1", "on"),
];

fn serve<'a>(rig: &'a mut Rig, route: RouteId, form: FormFields<'a>) -> Option<WebView> {
    let mut ctx = WebContext {
        node: &mut rig.node,
        storage: &mut rig.nvs,
        hw: &mut rig.hw,
        sink: &mut rig.sink,
        form,
    };
    dispatch(route, &mut ctx)
}

fn root(view: Option<WebView>) -> RootView {
    match view {
        Some(WebView::Root(r)) => r,
        other => panic!("expected the root page, got {other:?}"),
    }
}

fn running_rig(config: SystemConfig) -> Rig {
    let mut rig = Rig::new(config);
    rig.install(
        0,
        schedule("Bisque", &[segment(ControlMode::Hold, 100.0, 10)]),
    );
    rig.command(AppCommand::SetUserApproved(true)).unwrap();
    rig.command(AppCommand::SwitchOvenOn).unwrap();
    rig.tick_at(100);
    rig
}

// ── Root ──────────────────────────────────────────────────────

#[test]
fn root_hides_temperatures_until_the_first_read() {
    let mut rig = Rig::new(SystemConfig::default());
    let view = root(serve(&mut rig, RouteId::Root, FormFields::EMPTY));
    assert_eq!(view.internal_c, None);
    assert_eq!(view.oven_c, None);
    assert!(view.schedule_empty);
    assert!(view.segments.is_empty());
    assert!(view.controls_enabled);
    assert!(!view.oven_switch_enabled);

    rig.tick_at(100);
    let view = root(serve(&mut rig, RouteId::Root, FormFields::EMPTY));
    assert_eq!(view.internal_c, Some(25.0));
    assert_eq!(view.oven_c, Some(20.0));
}

#[test]
fn root_lists_only_segments_in_use() {
    let mut rig = Rig::new(SystemConfig::default());
    let mut sched = schedule("Sparse", &[segment(ControlMode::Hold, 600.0, 30)]);
    sched.segments[4] = ScheduleSegment {
        mode: ControlMode::Ramp,
        goal_c: 900.0,
        duration_min: 60,
        in_use: true,
    };
    rig.install(0, sched);

    let view = root(serve(&mut rig, RouteId::Root, FormFields::EMPTY));
    let indices: Vec<usize> = view.segments.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 4]);
    assert_eq!(view.segments[1].mode, "RAMP");
    assert_eq!(view.schedule_name.as_str(), "Sparse");
    assert!(!view.schedule_empty);
}

#[test]
fn root_shows_the_active_run() {
    let mut rig = running_rig(SystemConfig::default());
    let view = root(serve(&mut rig, RouteId::Root, FormFields::EMPTY));

    assert!(view.oven_on);
    assert!(!view.controls_enabled);
    let run = view.run.expect("run details while on");
    assert_eq!(run.segment, 0);
    assert_eq!(run.mode, "HOLD");
    assert_eq!(run.next_goal_c, 100.0);
    assert_eq!(run.ramp_goal_c, None);
    assert_eq!(run.duration_min, 10);
    assert_eq!(run.time_left_s, 600);
}

#[test]
fn views_serialize_with_a_page_tag() {
    let mut rig = Rig::new(SystemConfig::default());
    let view = serve(&mut rig, RouteId::Root, FormFields::EMPTY).unwrap();
    let json = serde_json::to_string(&view).unwrap();
    assert!(json.starts_with("{\"page\":\"root\""));

    let view = serve(&mut rig, RouteId::EditSchedules, FormFields::EMPTY).unwrap();
    let json = serde_json::to_string(&view).unwrap();
    assert!(json.starts_with("{\"page\":\"edit\""));
}

// ── Editing ───────────────────────────────────────────────────

#[test]
fn action_stores_and_persists_the_form() {
    let mut rig = Rig::new(SystemConfig::default());
    let view = serve(&mut rig, RouteId::Action, FormFields::new(&GLAZE_FORM));

    let Some(WebView::Edit(edit)) = view else {
        panic!("expected the edit page");
    };
    assert_eq!(edit.index, 0);
    assert_eq!(edit.schedule.name.as_str(), "Glaze");
    assert_eq!(
        edit.schedule.segments[0],
        segment(ControlMode::Ramp, 1200.0, 300)
    );
    assert_eq!(
        edit.schedule.segments[1],
        segment(ControlMode::Hold, 1200.0, 15)
    );
    assert!(!edit.schedule.segments[2].in_use);

    assert!(rig.nvs.exists(SCHEDULE_NAMESPACE, "schedules0"));
    assert_eq!(rig.node.store().get(0), &edit.schedule);
}

#[test]
fn action_is_refused_while_running() {
    let mut rig = running_rig(SystemConfig::default());
    let view = root(serve(&mut rig, RouteId::Action, FormFields::new(&GLAZE_FORM)));
    assert!(view.oven_on);
    assert_eq!(rig.node.store().get(0).name.as_str(), "Bisque");
}

#[test]
fn edit_pages_wrap_around() {
    let mut rig = Rig::new(SystemConfig::default());

    let Some(WebView::Edit(edit)) = serve(&mut rig, RouteId::NextEdit, FormFields::EMPTY) else {
        panic!("expected the edit page");
    };
    assert_eq!(edit.index, 1);

    serve(&mut rig, RouteId::PrevEdit, FormFields::EMPTY);
    let Some(WebView::Edit(edit)) = serve(&mut rig, RouteId::PrevEdit, FormFields::EMPTY) else {
        panic!("expected the edit page");
    };
    assert_eq!(edit.index, 19);

    // Bare paging stores nothing.
    assert_eq!(rig.nvs.keys(), 0);
}

#[test]
fn paging_keeps_the_posted_form() {
    let mut rig = Rig::new(SystemConfig::default());
    let Some(WebView::Edit(edit)) =
        serve(&mut rig, RouteId::NextEdit, FormFields::new(&GLAZE_FORM))
    else {
        panic!("expected the edit page");
    };
    assert_eq!(edit.index, 1);
    assert_eq!(rig.node.store().get(0).name.as_str(), "Glaze");
    assert!(rig.nvs.exists(SCHEDULE_NAMESPACE, "schedules0"));
}

#[test]
fn edit_pages_fall_back_to_root_while_running() {
    let mut rig = running_rig(SystemConfig::default());
    assert!(matches!(
        serve(&mut rig, RouteId::EditSchedules, FormFields::EMPTY),
        Some(WebView::Root(_))
    ));
    assert!(matches!(
        serve(&mut rig, RouteId::NextEdit, FormFields::EMPTY),
        Some(WebView::Root(_))
    ));
    assert_eq!(rig.node.store().edit_cursor(), 0);
}

// ── Selection ─────────────────────────────────────────────────

#[test]
fn selection_steps_and_wraps() {
    let mut rig = Rig::new(SystemConfig::default());
    assert_eq!(root(serve(&mut rig, RouteId::NextSelect, FormFields::EMPTY)).selected, 1);
    assert_eq!(root(serve(&mut rig, RouteId::PrevSelect, FormFields::EMPTY)).selected, 0);
    assert_eq!(root(serve(&mut rig, RouteId::PrevSelect, FormFields::EMPTY)).selected, 19);
}

#[test]
fn selection_is_frozen_while_running() {
    let mut rig = running_rig(SystemConfig::default());
    let view = root(serve(&mut rig, RouteId::NextSelect, FormFields::EMPTY));
    assert_eq!(view.selected, 0);
    assert!(view.oven_on);
}

// ── Oven switch routes ────────────────────────────────────────

#[test]
fn oven_routes_are_hidden_by_default() {
    let mut rig = Rig::new(SystemConfig::default());
    assert_eq!(serve(&mut rig, RouteId::SwitchOvenOn, FormFields::EMPTY), None);
    assert_eq!(serve(&mut rig, RouteId::SwitchOvenOff, FormFields::EMPTY), None);
}

#[test]
fn oven_routes_switch_when_enabled() {
    let config = SystemConfig {
        allow_web_oven_switch: true,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.install(
        0,
        schedule("Bisque", &[segment(ControlMode::Hold, 100.0, 10)]),
    );

    let view = root(serve(&mut rig, RouteId::SwitchOvenOn, FormFields::EMPTY));
    assert!(!view.oven_on);
    assert!(view.oven_switch_enabled);
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::StartRefused(StartRefused::NotApproved)
        )),
        1
    );

    rig.command(AppCommand::SetUserApproved(true)).unwrap();
    assert!(root(serve(&mut rig, RouteId::SwitchOvenOn, FormFields::EMPTY)).oven_on);
    assert!(!root(serve(&mut rig, RouteId::SwitchOvenOff, FormFields::EMPTY)).oven_on);
}

#[test]
fn switch_off_route_logs_what_happened() {
    let config = SystemConfig {
        allow_web_oven_switch: true,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(config);
    capture_logs();

    assert!(!root(serve(&mut rig, RouteId::SwitchOvenOff, FormFields::EMPTY)).oven_on);
    let logs = captured_logs();
    assert!(logs.iter().any(|l| l == "Web: oven already off"));
    assert!(!logs.iter().any(|l| l == "Web: oven switched off"));

    rig.install(
        0,
        schedule("Bisque", &[segment(ControlMode::Hold, 100.0, 10)]),
    );
    rig.command(AppCommand::SetUserApproved(true)).unwrap();
    assert!(root(serve(&mut rig, RouteId::SwitchOvenOn, FormFields::EMPTY)).oven_on);
    capture_logs();
    assert!(!root(serve(&mut rig, RouteId::SwitchOvenOff, FormFields::EMPTY)).oven_on);
    let logs = captured_logs();
    assert!(logs.iter().any(|l| l == "Web: oven switched off"));
    assert!(!logs.iter().any(|l| l == "Web: oven already off"));
}
