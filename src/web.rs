//! Web route table.
//!
//! Each page is a plain `fn` handler keyed by [`RouteId`].  Handlers work
//! on a [`WebContext`] (the node plus the ports a request may touch) and
//! return a serialisable view model; turning that into HTML is left to
//! whatever serves the pages.
//!
//! ```text
//!   path ──▶ RouteId::from_path ──▶ dispatch ──▶ ROUTES[id] ──▶ WebView
//! ```
//!
//! Editing is refused while the oven runs: every edit route falls back
//! to the root page instead.

use log::{info, warn};
use serde::Serialize;

use crate::app::commands::AppCommand;
use crate::app::ports::{ActuatorPort, EventSink, StoragePort};
use crate::app::service::NodeService;
use crate::schedule::form::{FormFields, parse_schedule};
use crate::schedule::{MAX_SEGMENTS, NAME_CAPACITY, Schedule};

// ── Routes ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteId {
    Root,
    PrevEdit,
    NextEdit,
    PrevSelect,
    NextSelect,
    EditSchedules,
    Action,
    SwitchOvenOn,
    SwitchOvenOff,
}

impl RouteId {
    pub const ALL: [RouteId; 9] = [
        Self::Root,
        Self::PrevEdit,
        Self::NextEdit,
        Self::PrevSelect,
        Self::NextSelect,
        Self::EditSchedules,
        Self::Action,
        Self::SwitchOvenOn,
        Self::SwitchOvenOff,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Root => "/",
            Self::PrevEdit => "/prev_page",
            Self::NextEdit => "/next_page",
            Self::PrevSelect => "/prev_select_schedule_page",
            Self::NextSelect => "/next_select_schedule_page",
            Self::EditSchedules => "/edit_schedules_page",
            Self::Action => "/action_page",
            Self::SwitchOvenOn => "/switch_oven_on_page",
            Self::SwitchOvenOff => "/switch_oven_off_page",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Direct oven switching, only exposed with `allow_web_oven_switch`.
    pub fn is_debug_only(self) -> bool {
        matches!(self, Self::SwitchOvenOn | Self::SwitchOvenOff)
    }
}

/// Everything a handler may touch while serving one request.
pub struct WebContext<'a> {
    pub node: &'a mut NodeService,
    pub storage: &'a mut dyn StoragePort,
    pub hw: &'a mut dyn ActuatorPort,
    pub sink: &'a mut dyn EventSink,
    /// Decoded request arguments.
    pub form: FormFields<'a>,
}

pub type RouteHandler = fn(&mut WebContext<'_>) -> WebView;

/// Dispatch table, one entry per [`RouteId`] in declaration order.
pub const ROUTES: [(RouteId, RouteHandler); 9] = [
    (RouteId::Root, root_page),
    (RouteId::PrevEdit, prev_edit_page),
    (RouteId::NextEdit, next_edit_page),
    (RouteId::PrevSelect, prev_select_page),
    (RouteId::NextSelect, next_select_page),
    (RouteId::EditSchedules, edit_schedules_page),
    (RouteId::Action, action_page),
    (RouteId::SwitchOvenOn, switch_oven_on_page),
    (RouteId::SwitchOvenOff, switch_oven_off_page),
];

/// Serve `route`.  `None` when the route is not exposed by the current
/// configuration.
pub fn dispatch(route: RouteId, ctx: &mut WebContext<'_>) -> Option<WebView> {
    if route.is_debug_only() && !ctx.node.config().allow_web_oven_switch {
        return None;
    }
    ROUTES
        .iter()
        .find(|(id, _)| *id == route)
        .map(|(_, handler)| handler(ctx))
}

// ── View models ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum WebView {
    Root(RootView),
    Edit(EditView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootView {
    /// Hard cap shown as a warning on the home page.
    pub max_oven_on_hours: u32,
    pub oven_on: bool,
    /// Edit and selection buttons are live only while the oven is off.
    pub controls_enabled: bool,
    pub oven_switch_enabled: bool,
    pub selected: usize,
    pub schedule_name: heapless::String<NAME_CAPACITY>,
    pub segments: heapless::Vec<SegmentView, MAX_SEGMENTS>,
    pub schedule_empty: bool,
    /// `None` while the thermocouple is faulted or unread.
    pub internal_c: Option<f32>,
    pub oven_c: Option<f32>,
    pub run: Option<RunView>,
}

/// One in-use segment of the selected schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentView {
    pub index: usize,
    pub mode: &'static str,
    pub goal_c: f32,
    pub duration_min: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunView {
    pub segment: usize,
    pub mode: &'static str,
    pub previous_goal_c: f32,
    pub next_goal_c: f32,
    /// Interpolated goal, only while ramping.
    pub ramp_goal_c: Option<f32>,
    pub duration_min: u16,
    pub time_left_s: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditView {
    pub index: usize,
    pub schedule: Schedule,
}

fn root_view(node: &NodeService) -> RootView {
    let store = node.store();
    let engine = node.engine();
    let reader = node.reader();
    let selected = engine.selected();
    let schedule = store.get(selected);
    let oven_on = engine.is_running();

    let mut segments = heapless::Vec::new();
    for (index, seg) in schedule.segments.iter().enumerate().filter(|(_, s)| s.in_use) {
        // Capacity equals the segment count.
        let _ = segments.push(SegmentView {
            index,
            mode: seg.mode.label(),
            goal_c: seg.goal_c,
            duration_min: seg.duration_min,
        });
    }

    let temps_ok = reader.valid() && !reader.temp_fault();
    let run = oven_on.then(|| {
        let state = engine.run_state();
        let current = schedule.segments[state.segment];
        RunView {
            segment: state.segment,
            mode: current.mode.label(),
            previous_goal_c: state.previous_goal_c,
            next_goal_c: state.next_goal_c,
            ramp_goal_c: state.ramp_active.then_some(state.ramp_value_c),
            duration_min: current.duration_min,
            time_left_s: engine.time_left_secs(node.now_ms(), store),
        }
    });

    RootView {
        max_oven_on_hours: node.config().max_oven_on_hours,
        oven_on,
        controls_enabled: !oven_on,
        oven_switch_enabled: node.config().allow_web_oven_switch,
        selected,
        schedule_name: schedule.name.clone(),
        schedule_empty: schedule.is_empty(),
        segments,
        internal_c: temps_ok.then(|| reader.cold_junction_c()),
        oven_c: temps_ok.then(|| reader.thermocouple_c()),
        run,
    }
}

fn edit_view(node: &NodeService) -> EditView {
    let index = node.store().edit_cursor();
    EditView {
        index,
        schedule: node.store().get(index).clone(),
    }
}

// ── Handlers ──────────────────────────────────────────────────

fn root_page(ctx: &mut WebContext<'_>) -> WebView {
    WebView::Root(root_view(ctx.node))
}

/// Store the posted form into the slot under the edit cursor.
fn store_posted_form(ctx: &mut WebContext<'_>) {
    let index = ctx.node.store().edit_cursor();
    let schedule = parse_schedule(&ctx.form);
    if let Err(e) = ctx.node.apply_schedule_edit(index, schedule, &mut *ctx.storage) {
        warn!("Web: schedule {} not stored ({})", index, e);
    }
}

fn step_edit(ctx: &mut WebContext<'_>, forward: bool) -> WebView {
    if ctx.node.engine().is_running() {
        return root_page(ctx);
    }
    // Paging away from the edit form keeps what was typed on it.
    if ctx.form.has("scheduleName") {
        store_posted_form(ctx);
    }
    match ctx.node.step_edit_cursor(forward) {
        Ok(_) => WebView::Edit(edit_view(ctx.node)),
        Err(_) => root_page(ctx),
    }
}

fn prev_edit_page(ctx: &mut WebContext<'_>) -> WebView {
    step_edit(ctx, false)
}

fn next_edit_page(ctx: &mut WebContext<'_>) -> WebView {
    step_edit(ctx, true)
}

fn step_select(ctx: &mut WebContext<'_>, forward: bool) -> WebView {
    let cmd = AppCommand::SelectSchedule { forward };
    if let Err(e) = ctx.node.handle_command(cmd, &mut *ctx.hw, &mut *ctx.sink) {
        warn!("Web: selection refused ({})", e);
    }
    root_page(ctx)
}

fn prev_select_page(ctx: &mut WebContext<'_>) -> WebView {
    step_select(ctx, false)
}

fn next_select_page(ctx: &mut WebContext<'_>) -> WebView {
    step_select(ctx, true)
}

fn edit_schedules_page(ctx: &mut WebContext<'_>) -> WebView {
    if ctx.node.engine().is_running() {
        return root_page(ctx);
    }
    WebView::Edit(edit_view(ctx.node))
}

fn action_page(ctx: &mut WebContext<'_>) -> WebView {
    if ctx.node.engine().is_running() {
        return root_page(ctx);
    }
    store_posted_form(ctx);
    WebView::Edit(edit_view(ctx.node))
}

fn switch_oven_on_page(ctx: &mut WebContext<'_>) -> WebView {
    match ctx
        .node
        .handle_command(AppCommand::SwitchOvenOn, &mut *ctx.hw, &mut *ctx.sink)
    {
        Ok(()) => info!("Web: oven switched on"),
        Err(e) => warn!("Web: oven not switched on ({})", e),
    }
    root_page(ctx)
}

fn switch_oven_off_page(ctx: &mut WebContext<'_>) -> WebView {
    let was_running = ctx.node.engine().is_running();
    match ctx
        .node
        .handle_command(AppCommand::SwitchOvenOff, &mut *ctx.hw, &mut *ctx.sink)
    {
        Ok(()) if was_running => info!("Web: oven switched off"),
        Ok(()) => info!("Web: oven already off"),
        Err(e) => warn!("Web: switch-off failed ({})", e),
    }
    root_page(ctx)
}
