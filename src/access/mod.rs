//! Table-driven door access state machine.
//!
//! Same function-pointer layout as a classic embedded FSM, extended with
//! per-state dwell limits:
//!
//! ```text
//! ┌─────────────────┬───────────┬────────────┬──────────┬──────────┬────────────┐
//! │ StateId         │ max dwell │ fail state │ report   │ on_enter │ on_update  │
//! ├─────────────────┼───────────┼────────────┼──────────┼──────────┼────────────┤
//! │ Booting         │ 120 s     │ Reboot     │          │          │ fn(ctx)    │
//! │ CheckingCard    │ 5 s       │ Rejected   │          │          │ fn(ctx)    │
//! │ LockOpen        │ door time │ LockClosed │          │          │ fn(ctx)    │
//! │ ...             │           │            │          │          │            │
//! └─────────────────┴───────────┴────────────┴──────────┴──────────┴────────────┘
//! ```
//!
//! A state change is *requested* (by a handler, a timeout or an inbound
//! signal) and *registered* at the start of the next [`AccessFsm::tick`].
//! A pass that registers a change does nothing else.  Otherwise the pass
//! checks the dwell limit (a timeout ends the pass), then the periodic
//! self-report, then runs `on_update`.

pub mod context;
pub mod states;

use crate::config::SystemConfig;
use context::AccessContext;
use log::{info, warn};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// All access states, in ordinal order.
/// Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum StateId {
    Booting = 0,
    OutOfOrder = 1,
    Reboot = 2,
    TransientError = 3,
    NoConn = 4,
    WaitingForCard = 5,
    CheckingCard = 6,
    ClearStatus = 7,
    Approved = 8,
    Rejected = 9,
    LockOpen = 10,
    LockClosed = 11,
}

impl StateId {
    pub const COUNT: usize = 12;

    /// Convert an index back to `StateId`.  Out-of-range maps to
    /// `OutOfOrder` in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Booting,
            1 => Self::OutOfOrder,
            2 => Self::Reboot,
            3 => Self::TransientError,
            4 => Self::NoConn,
            5 => Self::WaitingForCard,
            6 => Self::CheckingCard,
            7 => Self::ClearStatus,
            8 => Self::Approved,
            9 => Self::Rejected,
            10 => Self::LockOpen,
            11 => Self::LockClosed,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::OutOfOrder
            }
        }
    }

    /// Human-readable label, as shown in reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Booting => "Booting",
            Self::OutOfOrder => "Out of order",
            Self::Reboot => "Rebooting",
            Self::TransientError => "Transient Error",
            Self::NoConn => "No network",
            Self::WaitingForCard => "Waiting for card",
            Self::CheckingCard => "Checking card",
            Self::ClearStatus => "Clear status",
            Self::Approved => "Approved card",
            Self::Rejected => "Rejected",
            Self::LockOpen => "Door lock is open",
            Self::LockClosed => "Door lock is closed",
        }
    }

    /// The door is unlocked in these states.
    pub fn door_is_open(self) -> bool {
        matches!(self, Self::Approved | Self::LockOpen)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Runs once when a state is requested.
pub type StateActionFn = fn(&mut AccessContext);

/// Per-pass handler.  `Some(next)` requests a transition.
pub type StateUpdateFn = fn(&mut AccessContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: StateId,
    /// `None` = may stay forever.
    pub max_dwell_ms: Option<u64>,
    /// Where a timeout leads.
    pub fail_state: StateId,
    /// Periodic self-report while in this state.
    pub report_every_ms: Option<u64>,
    pub on_enter: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// Accumulated per-state telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateStats {
    pub time_in_state_ms: u64,
    pub timeouts: u32,
}

/// What a single pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A requested change was registered; nothing else ran.
    Registered { from: StateId, to: StateId },
    /// The dwell limit was exceeded and the fail state requested.
    TimedOut { from: StateId, to: StateId },
    /// The state's update handler ran.
    Updated,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct AccessFsm {
    table: [StateDescriptor; StateId::COUNT],
    /// Requested state.
    current: usize,
    /// State whose entry has been accounted for.
    registered: usize,
    entered_at_ms: u64,
    last_report_ms: u64,
    stats: [StateStats; StateId::COUNT],
}

impl AccessFsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            registered: initial as usize,
            entered_at_ms: 0,
            last_report_ms: 0,
            stats: [StateStats::default(); StateId::COUNT],
        }
    }

    pub fn with_config(config: &SystemConfig) -> Self {
        Self::new(states::build_state_table(config), StateId::Booting)
    }

    /// Rebuild the table (door-open time) without touching the current state.
    pub fn apply_config(&mut self, config: &SystemConfig) {
        self.table = states::build_state_table(config);
    }

    /// Run the initial `on_enter` and register the starting state at `now`.
    pub fn start(&mut self, now: u64, ctx: &mut AccessContext) {
        info!("Access FSM starting in state: {}", self.current_state().label());
        self.entered_at_ms = now;
        self.last_report_ms = now;
        ctx.now_ms = now;
        ctx.ms_in_state = 0;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// One pass of the machine.
    pub fn tick(&mut self, now: u64, ctx: &mut AccessContext) -> TickOutcome {
        ctx.now_ms = now;

        // ── Register a pending change ─────────────────────────────
        if self.current != self.registered {
            let from = StateId::from_index(self.registered);
            let to = StateId::from_index(self.current);
            self.stats[self.registered].time_in_state_ms += now.saturating_sub(self.entered_at_ms);
            self.registered = self.current;
            self.entered_at_ms = now;
            ctx.ms_in_state = 0;
            info!("Changed from state <{}> to state <{}>", from.label(), to.label());
            return TickOutcome::Registered { from, to };
        }

        ctx.ms_in_state = now.saturating_sub(self.entered_at_ms);
        let desc = &self.table[self.current];

        // ── Dwell limit ───────────────────────────────────────────
        if let Some(limit) = desc.max_dwell_ms {
            if ctx.ms_in_state > limit {
                let from = desc.id;
                let to = desc.fail_state;
                self.stats[self.current].timeouts += 1;
                warn!("Time-out; transition from <{}> to <{}>", from.label(), to.label());
                if to == from {
                    // Same state: restart its dwell clock instead.
                    self.stats[self.current].time_in_state_ms += ctx.ms_in_state;
                    self.entered_at_ms = now;
                    ctx.ms_in_state = 0;
                } else {
                    self.request(to, ctx);
                }
                return TickOutcome::TimedOut { from, to };
            }
        }

        // ── Periodic self-report ──────────────────────────────────
        if let Some(every) = desc.report_every_ms {
            if now.saturating_sub(self.last_report_ms) > every {
                self.last_report_ms = now;
                ctx.report_requested = true;
            }
        }

        // ── Per-state action ──────────────────────────────────────
        if let Some(next) = (desc.on_update)(ctx) {
            self.request(next, ctx);
        }
        TickOutcome::Updated
    }

    /// Request a transition regardless of the current state.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut AccessContext) {
        self.request(next, ctx);
    }

    // ── Inbound signals ───────────────────────────────────────────

    /// A card was presented.  Only starts a check while waiting.
    pub fn card_swiped(&mut self, ctx: &mut AccessContext) -> bool {
        if self.current_state() != StateId::WaitingForCard {
            info!(
                "Ignoring swipe in state <{}>",
                self.current_state().label()
            );
            return false;
        }
        self.request(StateId::CheckingCard, ctx);
        true
    }

    /// Backend approved the presented card.
    pub fn approval_granted(&mut self, ctx: &mut AccessContext) -> bool {
        if !self.accepts_verdict() {
            info!("Approval ignored in state <{}>", self.current_state().label());
            return false;
        }
        ctx.approved_cards += 1;
        self.request(StateId::Approved, ctx);
        true
    }

    /// Backend denied the presented card.
    pub fn approval_denied(&mut self, ctx: &mut AccessContext) -> bool {
        if !self.accepts_verdict() {
            info!("Denial ignored in state <{}>", self.current_state().label());
            return false;
        }
        ctx.rejected_cards += 1;
        self.request(StateId::Rejected, ctx);
        true
    }

    /// Network link is up.  Leaves BOOTING on the first connect only.
    pub fn network_connected(&mut self, ctx: &mut AccessContext) -> bool {
        if ctx.connected_once {
            return false;
        }
        ctx.connected_once = true;
        if self.current_state() != StateId::Booting {
            return false;
        }
        self.request(StateId::WaitingForCard, ctx);
        true
    }

    /// Protocol error from the backend.  Drops back to waiting unless
    /// the door is open.
    pub fn network_error(&mut self, ctx: &mut AccessContext) -> bool {
        let state = self.current_state();
        if state.door_is_open() || state == StateId::Reboot {
            return false;
        }
        self.request(StateId::WaitingForCard, ctx);
        true
    }

    // ── Queries ───────────────────────────────────────────────────

    /// The requested (machine) state.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// True while a requested change waits for registration.
    pub fn change_pending(&self) -> bool {
        self.current != self.registered
    }

    pub fn ms_in_state(&self, now: u64) -> u64 {
        now.saturating_sub(self.entered_at_ms)
    }

    pub fn stats(&self, state: StateId) -> StateStats {
        self.stats[state as usize]
    }

    pub fn descriptor(&self, state: StateId) -> &StateDescriptor {
        &self.table[state as usize]
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn accepts_verdict(&self) -> bool {
        matches!(
            self.current_state(),
            StateId::WaitingForCard | StateId::CheckingCard
        )
    }

    fn request(&mut self, next: StateId, ctx: &mut AccessContext) {
        let next_idx = next as usize;
        if next_idx == self.current {
            return;
        }
        self.current = next_idx;
        if let Some(enter) = self.table[next_idx].on_enter {
            enter(ctx);
        }
    }
}
